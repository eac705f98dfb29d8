use astar::observer::LogObserver;
use astar::{astar_query, AStar, Destination, Journey, ParetoSet, Query, ResultRetention, SearchSettings, SearchState};
use chrono::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let scenario = dev_utils::direct_or_transfer();
    let network = &scenario.network;
    network.print_stats();
    println!("Segment graph has {} segments and {} transfers.", scenario.graph.num_segments(), scenario.graph.num_transfers());

    for retention in [ResultRetention::SingleBest, ResultRetention::Pareto] {
        let settings = SearchSettings::default().with_transfer_factor(30.0).with_retention(retention);
        let mut state = SearchState::new(&scenario.graph, &settings)?;
        let query = Query::new(scenario.start_time, scenario.start, scenario.destination);
        let result = astar_query(network, &scenario.graph, &mut state, &query)?;

        println!("{retention:?}: {} journeys.", result.journeys.len());
        for journey in &result.journeys {
            println!("{}", journey.display(network));
        }
        println!("{:?}", result.stats.to_map());
    }

    // Same search driven step by step, tracing every label with RUST_LOG=trace.
    let mut state = SearchState::new(&scenario.graph, &SearchSettings::default())?;
    let (base, _) = network.day_idx_mam(scenario.start_time).ok_or("Start time outside the timetable.")?;
    let dest = [scenario.destination];
    let mut astar = AStar::new(network, &scenario.graph, &mut state, Destination::Locations(&dest), base)
        .with_observer(LogObserver);
    astar.add_start(scenario.start, scenario.start_time);
    let mut results: ParetoSet<Journey> = ParetoSet::new();
    astar.execute(scenario.start_time, 7, scenario.start_time + Duration::days(1), 0, &mut results)?;
    let query = Query::new(scenario.start_time, scenario.start, scenario.destination);
    for mut journey in results {
        astar.reconstruct(&query, &mut journey)?;
        println!("{}", journey.display(network));
    }

    Ok(())
}

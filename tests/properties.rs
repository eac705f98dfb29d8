use astar::network::SegmentIndex;
use astar::observer::SearchObserver;
use astar::state::SegmentLabel;
use astar::{
    astar_query, AStar, Destination, Journey, Network, ParetoSet, Query, ResultRetention, SearchSettings, SearchState,
    SegmentGraph,
};
use chrono::Duration;
use dev_utils::*;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    Update(SegmentIndex),
    Settle(SegmentIndex, u32),
    Destination(SegmentIndex, u32),
}

#[derive(Default)]
struct Recorder {
    events: Vec<Event>,
}

impl SearchObserver for Recorder {
    fn on_update(&mut self, segment: SegmentIndex, _label: &SegmentLabel, _cost: u32) {
        self.events.push(Event::Update(segment));
    }

    fn on_settle(&mut self, segment: SegmentIndex, _label: &SegmentLabel, cost: u32) {
        self.events.push(Event::Settle(segment, cost));
    }

    fn on_destination(&mut self, segment: SegmentIndex, _label: &SegmentLabel, bucket: u32) {
        self.events.push(Event::Destination(segment, bucket));
    }
}

fn record(scenario: &Scenario, settings: SearchSettings) -> (Vec<Event>, ParetoSet<Journey>) {
    let mut state = SearchState::new(&scenario.graph, &settings).unwrap();
    let (base, _) = scenario.network.day_idx_mam(scenario.start_time).unwrap();
    let dest = [scenario.destination];
    let mut recorder = Recorder::default();
    let mut astar = AStar::new(&scenario.network, &scenario.graph, &mut state, Destination::Locations(&dest), base)
        .with_observer(&mut recorder);
    astar.add_start(scenario.start, scenario.start_time);
    let mut results = ParetoSet::new();
    let worst = scenario.start_time + Duration::days(1);
    astar.execute(scenario.start_time, 7, worst, 0, &mut results).unwrap();
    (recorder.events, results)
}

fn check_settle_order(events: &[Event]) {
    let mut settled = Vec::new();
    let mut last_cost = 0;
    for event in events {
        match *event {
            Event::Update(segment) => assert!(!settled.contains(&segment), "settled segment {segment} updated"),
            Event::Settle(segment, cost) => {
                assert!(cost >= last_cost, "settled at {cost} after {last_cost}");
                assert!(!settled.contains(&segment), "segment {segment} settled twice");
                last_cost = cost;
                settled.push(segment);
            }
            Event::Destination(..) => {}
        }
    }
}

#[test]
fn nearer_destination_segment_is_replaced() {
    let scenario = dev_utils::two_destination_segments();
    let (events, results) = record(&scenario, SearchSettings::default());
    let destinations: Vec<_> =
        events.iter().filter(|event| matches!(event, Event::Destination(..))).copied().collect();
    // The walk from A is found first but the direct run is cheaper.
    assert_eq!(destinations, vec![Event::Destination(0, 110), Event::Destination(1, 105)]);
    assert_eq!(results.len(), 1);
    assert_eq!(results.as_slice()[0].dest_time, at(0, "05:45"));
    check_settle_order(&events);
}

#[test]
fn search_stops_after_the_best_bucket() {
    let scenario = dev_utils::direct_or_transfer();
    let (events, _) = record(&scenario, SearchSettings::default());
    // The slow run costs more than the transfer connection and stays unsettled.
    assert!(!events.contains(&Event::Settle(0, 60)));
    check_settle_order(&events);
}

#[test]
fn settle_order_is_monotone() {
    for scenario in [
        dev_utils::same_day_transfer(),
        dev_utils::next_day_transfer(),
        dev_utils::previous_day_transfer(),
        dev_utils::direct_or_transfer(),
    ] {
        let settings = SearchSettings::default().with_transfer_factor(10.0).with_retention(ResultRetention::Pareto);
        let (events, results) = record(&scenario, settings);
        check_settle_order(&events);
        assert!(!results.is_empty());
    }
}

fn random_queries(network: &Network, seed: u64, count: usize) -> Vec<Query> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let num_locations = network.num_locations() as u32;
    (0..count)
        .map(|_| {
            let start = rng.u32(..num_locations);
            let mut dest = rng.u32(..num_locations);
            if dest == start {
                dest = (dest + 1) % num_locations;
            }
            let day = rng.u16(..4);
            let time = at(day, "05:00") + Duration::minutes(rng.i64(..900));
            Query::new(time, start, dest)
        })
        .collect()
}

fn check_journey(network: &Network, query: &Query, journey: &Journey) {
    let start_time = query.start_time.earliest();
    assert!(journey.transfers <= query.max_transfers);
    assert_eq!(journey.num_rides(), journey.transfers as usize + 1);
    assert!(journey.dest_time <= start_time + Duration::days(1));

    let legs = &journey.legs;
    let first = legs.first().unwrap();
    let last = legs.last().unwrap();
    assert!(first.departure >= start_time);
    assert!(query.is_start(network, first.from));
    assert_eq!(last.arrival, journey.dest_time);
    assert_eq!(Some(last.to), journey.dest);
    assert!(query.is_destination(network, last.to));

    for leg in legs {
        assert!(leg.departure <= leg.arrival, "{leg:?}");
    }
    for pair in legs.windows(2) {
        assert_eq!(pair[0].to, pair[1].from);
        assert!(pair[0].arrival <= pair[1].departure, "{:?} then {:?}", pair[0], pair[1]);
    }
}

#[test]
fn random_networks() {
    let mut found = 0;
    for seed in 0..12 {
        let network = generate_network(seed, 20, 12, 6);
        let graph = SegmentGraph::build(&network, 0, 1);
        let mut state = SearchState::new(&graph, &SearchSettings::default()).unwrap();
        for query in random_queries(&network, seed, 10) {
            let result = astar_query(&network, &graph, &mut state, &query).unwrap();
            assert!(result.journeys.len() <= 1);
            for journey in &result.journeys {
                check_journey(&network, &query, journey);
                found += 1;
            }
        }
    }
    assert!(found > 0);
}

#[test]
fn random_networks_with_transfer_penalty() {
    let settings = SearchSettings::default().with_transfer_factor(15.0).with_retention(ResultRetention::Pareto);
    for seed in 20..26 {
        let network = generate_network(seed, 15, 10, 5);
        let graph = SegmentGraph::build(&network, 0, 1);
        let mut state = SearchState::new(&graph, &settings).unwrap();
        for query in random_queries(&network, seed, 10) {
            let result = astar_query(&network, &graph, &mut state, &query).unwrap();
            for journey in &result.journeys {
                check_journey(&network, &query, journey);
            }
            for (i, a) in result.journeys.iter().enumerate() {
                for b in &result.journeys[i + 1..] {
                    assert!(!(a.dest_time <= b.dest_time && a.transfers <= b.transfers));
                    assert!(!(b.dest_time <= a.dest_time && b.transfers <= a.transfers));
                }
            }
        }
    }
}

#[test]
fn searches_are_deterministic() {
    let network = generate_network(3, 25, 15, 8);
    let graph = SegmentGraph::build(&network, 0, 1);
    let settings = SearchSettings::default().with_transfer_factor(5.0);
    for query in random_queries(&network, 3, 10) {
        let mut first = SearchState::new(&graph, &settings).unwrap();
        let mut second = SearchState::new(&graph, &settings).unwrap();
        let a = astar_query(&network, &graph, &mut first, &query).unwrap();
        let b = astar_query(&network, &graph, &mut second, &query).unwrap();
        assert_eq!(a.journeys, b.journeys);
        assert_eq!(a.stats, b.stats);
    }
}

#[test]
fn reused_state_matches_a_fresh_one() {
    let network = generate_network(5, 20, 12, 6);
    let graph = SegmentGraph::build(&network, 0, 1);
    let mut reused = SearchState::new(&graph, &SearchSettings::default()).unwrap();
    for query in random_queries(&network, 5, 15) {
        let mut fresh = SearchState::new(&graph, &SearchSettings::default()).unwrap();
        let expected = astar_query(&network, &graph, &mut fresh, &query).unwrap();
        let result = astar_query(&network, &graph, &mut reused, &query).unwrap();
        assert_eq!(result.journeys, expected.journeys);
    }
}

#[test]
fn reconstruction_matches_the_search() {
    let scenario = dev_utils::same_day_transfer();
    let mut state = SearchState::new(&scenario.graph, &SearchSettings::default()).unwrap();
    let query = Query::new(scenario.start_time, scenario.start, scenario.destination);
    let dest = [scenario.destination];
    let mut astar = AStar::new(&scenario.network, &scenario.graph, &mut state, Destination::Locations(&dest), 0);
    astar.add_start(scenario.start, scenario.start_time);
    let mut results: ParetoSet<Journey> = ParetoSet::new();
    astar.execute(scenario.start_time, 7, at(1, "04:00"), 0, &mut results).unwrap();

    let mut journey = results.into_vec().remove(0);
    astar.reconstruct(&query, &mut journey).unwrap();
    let last_ride = journey.legs.iter().filter(|leg| leg.is_ride()).last().unwrap();
    assert_eq!(last_ride.arrival, journey.dest_time);
    assert_eq!(journey.num_rides(), journey.transfers as usize + 1);

    // A journey the search never reported cannot be reconstructed.
    let mut unknown = Journey::new(scenario.start_time, at(0, "13:01"), 1);
    assert!(astar.reconstruct(&query, &mut unknown).is_err());
}

use std::collections::BTreeSet;

use chrono::Duration;

use crate::astar::{AStar, AStarStats, Destination, UNREACHABLE};
use crate::config::{ConfigError, ResultRetention};
use crate::delta::DeltaError;
use crate::journey::{Journey, ReconstructionError};
use crate::multicriteria::ParetoSet;
use crate::network::{EventType, LocationIndex, Minutes, ProfileIndex, StopIndex, UnixTime};
use crate::query::{expand, LocationMatchMode, Query, StartLocation, StartTime};
use crate::segments::SegmentGraph;
use crate::state::SearchState;
use crate::Network;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Query has no start location.")]
    EmptyStart,
    #[error("Query has no destination.")]
    EmptyDestination,
    #[error("Start time {0} lies outside the timetable.")]
    StartOutsideTimetable(UnixTime),
    #[error("Location {0} is not part of the network.")]
    UnknownLocation(LocationIndex),
    #[error("Segment graph was built for profile {graph}, not {query}.")]
    ProfileMismatch { graph: ProfileIndex, query: ProfileIndex },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Delta(#[from] DeltaError),
    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),
}

#[derive(Clone, Debug)]
pub struct QueryResult {
    /// Non-dominated journeys over departure time, arrival time and transfers.
    pub journeys: Vec<Journey>,
    pub stats: AStarStats,
}

fn validate(network: &Network, graph: &SegmentGraph, query: &Query) -> Result<(), SearchError> {
    if query.start.is_empty() {
        return Err(SearchError::EmptyStart);
    }
    if query.destination.is_empty() {
        return Err(SearchError::EmptyDestination);
    }
    for offset in query.start.iter().chain(&query.destination) {
        if offset.target as usize >= network.num_locations() {
            return Err(SearchError::UnknownLocation(offset.target));
        }
    }
    if query.profile != graph.profile {
        return Err(SearchError::ProfileMismatch { graph: graph.profile, query: query.profile });
    }
    let earliest = query.start_time.earliest();
    if network.day_idx_mam(earliest).is_none() {
        return Err(SearchError::StartOutsideTimetable(earliest));
    }
    Ok(())
}

fn dest_locations(network: &Network, query: &Query) -> Vec<LocationIndex> {
    let mut locations: Vec<_> = query
        .destination
        .iter()
        .flat_map(|offset| expand(network, query.dest_match_mode, offset))
        .collect();
    locations.sort_unstable();
    locations.dedup();
    locations
}

fn dest_distances(network: &Network, query: &Query) -> Vec<Minutes> {
    let mut distances = vec![UNREACHABLE; network.num_locations()];
    for offset in &query.destination {
        let distance = &mut distances[offset.target as usize];
        *distance = (*distance).min(offset.duration);
    }
    distances
}

// Start times in `from..to` at which a run leaves one of the start locations, latest first.
fn departure_times(network: &Network, query: &Query, from: UnixTime, to: UnixTime) -> Vec<UnixTime> {
    let mut times = BTreeSet::new();
    for StartLocation { location, access, .. } in query.start_locations(network) {
        for &route in network.location_routes(location) {
            let stops = network.route_stops(route);
            for (stop_idx, stop) in stops.iter().enumerate().take(stops.len() - 1) {
                if stop.location != location || !stop.in_allowed {
                    continue;
                }
                for transport in network.route_transports(route) {
                    let departure = network.event_mam(transport, stop_idx as StopIndex, EventType::Departure);
                    for day in 0..network.num_days {
                        if !network.operates_on(transport, day as i32) {
                            continue;
                        }
                        let time = network.to_unixtime(day, departure) - Duration::minutes(access as i64);
                        if from <= time && time < to {
                            times.insert(time);
                        }
                    }
                }
            }
        }
    }
    times.into_iter().rev().collect()
}

/// Answers a query: discovers the destination frontier once, then searches every start time and merges
/// the reconstructed journeys into one Pareto set.
///
/// With [`ResultRetention::Pareto`] every start time is searched once per transfer limit, so that each
/// transfer count contributes its earliest arrival.
pub fn astar_query(
    network: &Network,
    graph: &SegmentGraph,
    state: &mut SearchState,
    query: &Query,
) -> Result<QueryResult, SearchError> {
    validate(network, graph, query)?;
    state.reset();
    state.use_transfer_factor(query.transfer_factor)?;
    let settings = state.active_settings();

    let max_transfers = if query.max_transfers > settings.max_transfers {
        log::warn!("Limiting {} transfers to {}.", query.max_transfers, settings.max_transfers);
        settings.max_transfers
    } else {
        query.max_transfers
    };
    let transfer_limits = match settings.retention {
        ResultRetention::SingleBest => max_transfers..=max_transfers,
        ResultRetention::Pareto => 0..=max_transfers,
    };

    let earliest = query.start_time.earliest();
    let (base, _) = network.day_idx_mam(earliest).ok_or(SearchError::StartOutsideTimetable(earliest))?;

    let intermodal = query.dest_match_mode == LocationMatchMode::Intermodal;
    let distances = if intermodal { dest_distances(network, query) } else { Vec::new() };
    let dest_locations = if intermodal { Vec::new() } else { dest_locations(network, query) };
    let destination = if intermodal {
        Destination::Distances(&distances)
    } else {
        Destination::Locations(&dest_locations)
    };

    let start_times = match query.start_time {
        StartTime::Instant(time) => vec![time],
        StartTime::Interval { from, to } => departure_times(network, query, from, to),
    };
    log::debug!("Searching {} start times.", start_times.len());

    let starts = query.start_locations(network);
    let mut astar = AStar::new(network, graph, state, destination, base);
    let mut journeys: ParetoSet<Journey> = ParetoSet::new();
    let mut stats = AStarStats::default();
    for start_time in start_times {
        // Every start time gets its own day window.
        let (base, _) = network.day_idx_mam(start_time).ok_or(SearchError::StartOutsideTimetable(start_time))?;
        let worst_arrival =
            query.worst_arrival.unwrap_or(start_time + Duration::days(settings.max_travel_days as i64));

        for transfer_limit in transfer_limits.clone() {
            astar.reset(base);
            let mut num_starts = 0;
            for start in &starts {
                num_starts += astar.add_start(start.location, start_time + Duration::minutes(start.access as i64));
            }
            log::debug!("{num_starts} start segments for {start_time} with at most {transfer_limit} transfers.");

            let mut results: ParetoSet<Journey> = ParetoSet::new();
            astar.execute(start_time, transfer_limit, worst_arrival, query.profile, &mut results)?;
            for mut journey in results {
                if !intermodal {
                    astar.reconstruct(query, &mut journey)?;
                }
                journeys.add(journey);
            }

            let mut run_stats = *astar.stats();
            let limited = run_stats.max_transfers_reached;
            if transfer_limit < max_transfers {
                run_stats.max_transfers_reached = false;
            }
            stats.merge(&run_stats);
            // Higher limits repeat the same search unless this one cut off a transfer.
            if !limited {
                break;
            }
        }
    }

    let mut journeys = journeys.into_vec();
    journeys.sort_by_key(|journey| (journey.start_time, journey.dest_time, journey.transfers));
    stats.no_journey_found = journeys.is_empty();
    log::debug!("Found {} journeys.", journeys.len());
    Ok(QueryResult { journeys, stats })
}

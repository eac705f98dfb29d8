use std::collections::BTreeMap;

use chrono::Duration;

use crate::config::ResultRetention;
use crate::delta::{Delta, DeltaError, TimeFrame, MINUTES_PER_DAY};
use crate::journey::{Journey, Leg, LegKind, ReconstructionError};
use crate::multicriteria::JourneySink;
use crate::network::{
    is_active, DayIndex, EventType, LocationIndex, Minutes, ProfileIndex, SegmentIndex, StopIndex, TransportRun,
    UnixTime,
};
use crate::observer::{NoopObserver, SearchObserver};
use crate::query::{LocationMatchMode, Query};
use crate::segments::SegmentGraph;
use crate::state::{SearchState, SegmentLabel};
use crate::Network;

/// Distance marking a location from which the destination cannot be reached.
pub const UNREACHABLE: Minutes = Minutes::MAX;

pub enum Destination<'d> {
    /// Destination stops, also reached from every location with a footpath to them.
    Locations(&'d [LocationIndex]),
    /// Remaining travel time from each location to a destination coordinate.
    Distances(&'d [Minutes]),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AStarStats {
    pub segments_settled: u64,
    pub dest_segments_reached: u64,
    pub max_transfers_reached: bool,
    pub max_travel_time_reached: bool,
    pub no_journey_found: bool,
}

impl AStarStats {
    /// Adds the counters of another search and keeps every limit it hit.
    pub fn merge(&mut self, other: &AStarStats) {
        self.segments_settled += other.segments_settled;
        self.dest_segments_reached += other.dest_segments_reached;
        self.max_transfers_reached |= other.max_transfers_reached;
        self.max_travel_time_reached |= other.max_travel_time_reached;
        self.no_journey_found |= other.no_journey_found;
    }

    pub fn to_map(&self) -> BTreeMap<String, u64> {
        BTreeMap::from([
            ("segments_settled".to_owned(), self.segments_settled),
            ("dest_segments_reached".to_owned(), self.dest_segments_reached),
            ("max_transfers_reached".to_owned(), self.max_transfers_reached as u64),
            ("max_travel_time_reached".to_owned(), self.max_travel_time_reached as u64),
            ("no_journey_found".to_owned(), self.no_journey_found as u64),
        ])
    }
}

/// Label-setting search over a segment graph, ordered by a transfer-weighted travel time.
pub struct AStar<'a, O = NoopObserver> {
    network: &'a Network,
    graph: &'a SegmentGraph,
    state: &'a mut SearchState,
    frame: TimeFrame,
    stats: AStarStats,
    observer: O,
}

impl<'a> AStar<'a, NoopObserver> {
    /// Marks the destination frontier in `state`. Times are expressed relative to day `base`.
    pub fn new(
        network: &'a Network,
        graph: &'a SegmentGraph,
        state: &'a mut SearchState,
        destination: Destination<'_>,
        base: DayIndex,
    ) -> Self {
        let frame = TimeFrame::new(network.first_day, base, state.settings().max_day_offset);
        let mut astar = Self { network, graph, state, frame, stats: AStarStats::default(), observer: NoopObserver };
        astar.mark_destinations(destination);
        astar
    }
}

impl<'a, O: SearchObserver> AStar<'a, O> {
    pub fn with_observer<P: SearchObserver>(self, observer: P) -> AStar<'a, P> {
        AStar {
            network: self.network,
            graph: self.graph,
            state: self.state,
            frame: self.frame,
            stats: self.stats,
            observer,
        }
    }

    pub fn stats(&self) -> &AStarStats { &self.stats }

    pub fn state(&self) -> &SearchState { &*self.state }

    pub fn frame(&self) -> &TimeFrame { &self.frame }

    pub fn observer(&self) -> &O { &self.observer }

    /// Prepares the state for the next start time, expressing times relative to day `base`. The destination
    /// frontier is kept.
    pub fn reset(&mut self, base: DayIndex) {
        self.state.reset();
        self.frame = TimeFrame::new(self.network.first_day, base, self.frame.max_day_offset());
        self.stats = AStarStats::default();
    }

    fn mark_destinations(&mut self, destination: Destination<'_>) {
        let network = self.network;
        let profile = self.graph.profile;
        self.state.clear_destinations();
        match destination {
            Destination::Locations(locations) => {
                for &location in locations {
                    self.mark_dest_segments(location, 0);
                    for footpath in network.footpaths_in(profile, location) {
                        self.mark_dest_segments(footpath.target, footpath.duration);
                    }
                }
            }
            Destination::Distances(distances) => {
                for (location, &distance) in distances.iter().enumerate() {
                    if distance != UNREACHABLE {
                        self.mark_dest_segments(location as LocationIndex, distance);
                    }
                }
            }
        }
        log::debug!("{} segments reach the destination.", self.state.num_destination_segments());
    }

    // Marks every segment ending at `location` where alighting is allowed.
    fn mark_dest_segments(&mut self, location: LocationIndex, extra: Minutes) {
        let network = self.network;
        for &route in network.location_routes(location) {
            for (stop_idx, stop) in network.route_stops(route).iter().enumerate().skip(1) {
                if stop.location != location || !stop.out_allowed {
                    continue;
                }
                for transport in network.route_transports(route) {
                    let segment = self.graph.transport_first_segment(transport) + stop_idx as SegmentIndex - 1;
                    self.state.mark_destination(segment, extra);
                }
            }
        }
    }

    /// Discovers the segments leaving `location` on the earliest run of every route departing at or after
    /// `time`. Returns the number of start segments found.
    pub fn add_start(&mut self, location: LocationIndex, time: UnixTime) -> usize {
        let network = self.network;
        let Some((day, mam)) = network.day_idx_mam(time) else {
            log::debug!("Start time {time} lies outside the timetable.");
            return 0;
        };
        let horizon_days = self.state.settings().max_travel_days;
        let max_day_offset = self.frame.max_day_offset() as i32;

        let mut found = 0;
        for &route in network.location_routes(location) {
            let stops = network.route_stops(route);
            for (stop_idx, stop) in stops.iter().enumerate().take(stops.len() - 1) {
                if stop.location != location || !stop.in_allowed {
                    continue;
                }
                let stop_idx = stop_idx as StopIndex;
                let Some(run) = network.earliest_transport(route, stop_idx, day, mam, horizon_days) else {
                    continue;
                };

                let run_offset = run.day as i32 - self.frame.base() as i32;
                if run_offset < 0 || run_offset >= max_day_offset {
                    continue;
                }
                let arrival_mam = network.event_mam(run.transport, stop_idx + 1, EventType::Arrival);
                let Ok(arrival) = self.frame.event_delta(run_offset, arrival_mam) else {
                    continue;
                };

                let segment = self.graph.transport_first_segment(run.transport) + stop_idx as SegmentIndex;
                self.state.add_start_segment(segment, arrival);
                self.state.set_transport_day_offset(run.transport, run_offset as i16);
                found += 1;
            }
        }
        found
    }

    // Day offset of the run a labelled segment belongs to, relative to the base day.
    fn run_offset(&self, segment: SegmentIndex, label: &SegmentLabel) -> i32 {
        let transport = self.graph.segment_transport(segment);
        let arrival_stop = self.graph.segment_stop(segment) + 1;
        let arrival = self.network.event_mam(transport, arrival_stop, EventType::Arrival);
        label.arrival.days() as i32 - (arrival / MINUTES_PER_DAY) as i32
    }

    fn update(&mut self, segment: SegmentIndex, arrival: Delta, transfers: u8, predecessor: SegmentIndex) -> bool {
        if !self.state.improve(segment, arrival, transfers, predecessor) {
            return false;
        }
        let cost = self.state.cost(segment);
        if let Some(label) = self.state.label(segment) {
            self.observer.on_update(segment, label, cost);
        }
        true
    }

    /// Runs the search from the start segments discovered since the last reset.
    ///
    /// Destination labels are written to `results`; with [`ResultRetention::SingleBest`] the sink is cleared
    /// before every strictly better label. Finding nothing is not an error.
    pub fn execute<S: JourneySink>(
        &mut self,
        start_time: UnixTime,
        max_transfers: u8,
        worst_time_at_dest: UnixTime,
        profile: ProfileIndex,
        results: &mut S,
    ) -> Result<(), DeltaError> {
        debug_assert_eq!(profile, self.graph.profile, "Segment graph was built for another profile.");
        let network = self.network;
        let graph = self.graph;
        let settings = self.state.active_settings();
        let max_transfers = if max_transfers > settings.max_transfers {
            log::warn!("Limiting {max_transfers} transfers to {}.", settings.max_transfers);
            settings.max_transfers
        } else {
            max_transfers
        };

        let start = self.frame.to_delta(start_time)?;
        let travel_bound = start
            .checked_add_minutes(settings.max_travel_minutes())
            .unwrap_or(Delta::new(u16::MAX, MINUTES_PER_DAY - 1));
        let worst = match self.frame.to_delta(worst_time_at_dest) {
            Ok(worst) => worst.min(travel_bound),
            Err(DeltaError::OutsideWindow { .. }) => travel_bound,
            Err(DeltaError::BeforeBase { .. }) => {
                log::debug!("Worst arrival {worst_time_at_dest} lies before the base day.");
                self.stats.no_journey_found = true;
                return Ok(());
            }
        };

        self.state.setup(start);
        log::debug!("Searching from {} start entries.", self.state.queue_len());

        let mut best_bucket = u32::MAX;
        while let Some(key) = self.state.top_key() {
            if key as u32 > best_bucket {
                log::debug!("Stopping at bucket {key}, best destination bucket is {best_bucket}.");
                break;
            }
            let Some(entry) = self.state.pop() else {
                break;
            };
            let segment = entry.segment;
            if self.state.is_settled(segment) {
                continue;
            }
            let label = self.state.settle(segment);
            debug_assert_eq!(label.transfers, entry.transfers);
            self.stats.segments_settled += 1;
            self.observer.on_settle(segment, &label, key as u32);

            if label.arrival > worst {
                self.stats.max_travel_time_reached = true;
                continue;
            }

            let transport = graph.segment_transport(segment);
            let arrival_stop = graph.segment_stop(segment) + 1;
            let run_offset = self.run_offset(segment, &label);
            self.state.set_transport_day_offset(transport, run_offset as i16);

            if self.state.is_destination(segment) {
                self.stats.dest_segments_reached += 1;
                let dist = self.state.dist_to_dest(segment).unwrap_or(0);
                let bucket = self.state.cost(segment) + dist as u32;
                let dest_time = self.frame.from_delta(label.arrival) + Duration::minutes(dist as i64);
                self.observer.on_destination(segment, &label, bucket);
                if dest_time <= worst_time_at_dest {
                    let journey = Journey::new(start_time, dest_time, label.transfers);
                    match settings.retention {
                        ResultRetention::SingleBest => {
                            if bucket < best_bucket {
                                best_bucket = bucket;
                                results.clear();
                                results.add(journey);
                            }
                        }
                        ResultRetention::Pareto => {
                            best_bucket = best_bucket.min(bucket);
                            results.add(journey);
                        }
                    }
                }
            }

            // Stay on the transport.
            if !graph.is_last_segment(segment) {
                let next_arrival = network.event_mam(transport, arrival_stop + 1, EventType::Arrival);
                match self.frame.event_delta(run_offset, next_arrival) {
                    Ok(arrival) if arrival <= worst => {
                        self.update(segment + 1, arrival, label.transfers, segment);
                    }
                    Ok(_) => self.stats.max_travel_time_reached = true,
                    Err(_) => {}
                }
            }

            let transfers = graph.transfers(segment);
            if label.transfers >= max_transfers {
                if !transfers.is_empty() {
                    self.stats.max_transfers_reached = true;
                }
                continue;
            }
            let arrival_day = self.frame.absolute_day(label.arrival.days() as i32);
            for transfer in transfers {
                let target = transfer.to_segment;
                if self.state.is_settled(target) || !is_active(graph.bitfield(transfer.traffic_days), arrival_day) {
                    continue;
                }
                let target_transport = graph.segment_transport(target);
                let target_offset = run_offset + transfer.day_offset as i32;
                let target_arrival =
                    network.event_mam(target_transport, graph.segment_stop(target) + 1, EventType::Arrival);
                match self.frame.event_delta(target_offset, target_arrival) {
                    Ok(arrival) if arrival <= worst => {
                        if self.update(target, arrival, label.transfers + 1, segment) {
                            self.state.set_transport_day_offset(target_transport, target_offset as i16);
                        }
                    }
                    Ok(_) => self.stats.max_travel_time_reached = true,
                    Err(_) => {}
                }
            }
        }

        if best_bucket == u32::MAX {
            self.stats.no_journey_found = true;
            log::debug!("No journey found after settling {} segments.", self.stats.segments_settled);
        } else {
            log::debug!("Best destination bucket {best_bucket}.");
        }
        Ok(())
    }

    // Ride leg covering the segments `first..=last` of one run.
    fn ride_leg(&self, first: SegmentIndex, last: SegmentIndex) -> Result<Leg, ReconstructionError> {
        let network = self.network;
        let label = self.state.label(last).ok_or(ReconstructionError::Unreached(last))?;
        let transport = self.graph.segment_transport(last);
        let run_offset = self.run_offset(last, label);
        let from_stop = self.graph.segment_stop(first);
        let to_stop = self.graph.segment_stop(last) + 1;
        Ok(Leg {
            from: network.transport_location(transport, from_stop),
            to: network.transport_location(transport, to_stop),
            departure: self.frame.at(run_offset, network.event_mam(transport, from_stop, EventType::Departure)),
            arrival: self.frame.from_delta(label.arrival),
            kind: LegKind::Ride {
                run: TransportRun { transport, day: self.frame.absolute_day(run_offset) as DayIndex },
                from_stop,
                to_stop,
            },
        })
    }

    // First settled destination segment whose arrival, plus a trailing footpath, matches the journey.
    fn last_leg(&self, query: &Query, journey: &Journey) -> Result<(SegmentIndex, Leg), ReconstructionError> {
        let network = self.network;
        for segment in 0..self.graph.num_segments() as SegmentIndex {
            if !self.state.is_destination(segment) || !self.state.is_settled(segment) {
                continue;
            }
            let Some(label) = self.state.label(segment) else {
                continue;
            };
            if label.transfers != journey.transfers {
                continue;
            }
            let transport = self.graph.segment_transport(segment);
            let location = network.transport_location(transport, self.graph.segment_stop(segment) + 1);
            let arrival = self.frame.from_delta(label.arrival);
            let candidates = std::iter::once((location, 0)).chain(
                network
                    .footpaths_out(query.profile, location)
                    .iter()
                    .map(|footpath| (footpath.target, footpath.duration)),
            );
            for (target, duration) in candidates {
                if arrival + Duration::minutes(duration as i64) == journey.dest_time
                    && query.is_destination(network, target)
                {
                    let leg = Leg {
                        from: location,
                        to: target,
                        departure: arrival,
                        arrival: journey.dest_time,
                        kind: LegKind::Footpath { duration },
                    };
                    return Ok((segment, leg));
                }
            }
        }
        Err(ReconstructionError::NoDestinationSegment { dest_time: journey.dest_time, transfers: journey.transfers })
    }

    /// Fills in the legs of a journey reported by the last `execute`.
    pub fn reconstruct(&self, query: &Query, journey: &mut Journey) -> Result<(), ReconstructionError> {
        if query.dest_match_mode == LocationMatchMode::Intermodal {
            return Err(ReconstructionError::Intermodal);
        }
        let network = self.network;
        let graph = self.graph;

        let (dest_segment, last_leg) = self.last_leg(query, journey)?;
        let dest = last_leg.to;
        let mut legs = vec![last_leg];

        // Walk back run by run.
        let mut run_end = dest_segment;
        let mut current = dest_segment;
        let mut steps = 0;
        let (departure_location, departure) = loop {
            steps += 1;
            if steps > graph.num_segments() {
                return Err(ReconstructionError::PredecessorCycle);
            }
            let label = self.state.label(current).ok_or(ReconstructionError::Unreached(current))?;
            let transport = graph.segment_transport(current);
            match label.predecessor {
                Some(predecessor) if graph.segment_transport(predecessor) == transport => {
                    current = predecessor;
                }
                predecessor => {
                    let ride = self.ride_leg(current, run_end)?;
                    let (board_location, board_time) = (ride.from, ride.departure);
                    legs.push(ride);
                    let Some(predecessor) = predecessor else {
                        break (board_location, board_time);
                    };

                    let predecessor_label =
                        self.state.label(predecessor).ok_or(ReconstructionError::Unreached(predecessor))?;
                    let from = network
                        .transport_location(graph.segment_transport(predecessor), graph.segment_stop(predecessor) + 1);
                    let duration = if from == board_location {
                        network.transfer_time(from)
                    } else {
                        network
                            .footpaths_out(query.profile, from)
                            .iter()
                            .find(|footpath| footpath.target == board_location)
                            .map(|footpath| footpath.duration)
                            .ok_or(ReconstructionError::MissingFootpath { from, to: board_location })?
                    };
                    let walk_start = self.frame.from_delta(predecessor_label.arrival);
                    legs.push(Leg {
                        from,
                        to: board_location,
                        departure: walk_start,
                        arrival: walk_start + Duration::minutes(duration as i64),
                        kind: LegKind::Footpath { duration },
                    });
                    run_end = predecessor;
                    current = predecessor;
                }
            }
        };

        // Board where the query starts if possible, else walk in from the start location that seeded it.
        let starts = query.start_locations(network);
        let start = starts
            .iter()
            .filter(|start| {
                start.location == departure_location
                    && journey.start_time + Duration::minutes(start.access as i64) <= departure
            })
            .min_by_key(|start| start.walk.is_some());
        let Some(start) = start else {
            return Err(ReconstructionError::MissingStartFootpath(departure_location));
        };
        if let Some(walk) = start.walk {
            legs.push(Leg {
                from: walk.target,
                to: departure_location,
                departure: departure - Duration::minutes(walk.duration as i64),
                arrival: departure,
                kind: LegKind::Footpath { duration: walk.duration },
            });
        }

        legs.reverse();
        journey.legs = legs;
        journey.dest = Some(dest);
        Ok(())
    }
}

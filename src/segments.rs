use std::collections::{BTreeMap, HashMap};

use crate::delta::MINUTES_PER_DAY;
use crate::network::{
    BitfieldIndex, DayIndex, Network, ProfileIndex, SegmentIndex, StopIndex, TrafficDays, TransportIndex, MAX_DAYS,
};

/// Edge from one segment to a segment of another transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub to_segment: SegmentIndex,
    /// Service day of the target transport minus the service day of the source transport.
    pub day_offset: i8,
    /// Bit `d` is set iff the transfer is valid when the source segment arrives on absolute day `d`.
    pub traffic_days: BitfieldIndex,
}

/// Segment graph: every hop between two consecutive stops of a transport is a segment.
///
/// Segments of one transport are numbered consecutively starting at its first segment.
pub struct SegmentGraph {
    pub profile: ProfileIndex,
    transport_first_segment: Vec<SegmentIndex>,
    segment_transport: Vec<TransportIndex>,
    segment_transfers_idx: Vec<usize>,
    transfers: Vec<Transfer>,
    bitfields: Vec<TrafficDays>,
}

/// Transfers of one segment before bitfield deduplication: `(to_segment, day_offset, days)`.
pub type PendingTransfers = Vec<(SegmentIndex, i8, TrafficDays)>;

impl SegmentGraph {
    /// Builds the graph from explicit per-segment transfer lists.
    pub fn from_transfers(network: &Network, profile: ProfileIndex, segment_transfers: Vec<PendingTransfers>) -> Self {
        let mut transport_first_segment = Vec::with_capacity(network.num_transports());
        let mut segment_transport = Vec::new();
        for transport in 0..network.num_transports() as TransportIndex {
            transport_first_segment.push(segment_transport.len() as SegmentIndex);
            let num_segments = network.transport_stop_count(transport) - 1;
            segment_transport.extend(std::iter::repeat(transport).take(num_segments));
        }
        assert_eq!(
            segment_transfers.len(),
            segment_transport.len(),
            "Expected one transfer list per segment."
        );

        let mut bitfield_index: HashMap<TrafficDays, BitfieldIndex> = HashMap::new();
        let mut bitfields = Vec::new();
        let mut segment_transfers_idx = Vec::with_capacity(segment_transport.len() + 1);
        let mut transfers = Vec::new();
        for pending in segment_transfers {
            segment_transfers_idx.push(transfers.len());
            for (to_segment, day_offset, days) in pending {
                debug_assert!((to_segment as usize) < segment_transport.len());
                let traffic_days = *bitfield_index.entry(days).or_insert_with(|| {
                    bitfields.push(days);
                    (bitfields.len() - 1) as BitfieldIndex
                });
                transfers.push(Transfer { to_segment, day_offset, traffic_days });
            }
        }
        segment_transfers_idx.push(transfers.len());

        Self {
            profile,
            transport_first_segment,
            segment_transport,
            segment_transfers_idx,
            transfers,
            bitfields,
        }
    }

    /// Computes all transfers without any reduction. From the arrival stop of every segment, on every
    /// service day of its transport, walk (own transfer time or an outbound footpath) and connect to the
    /// earliest run of every route boardable at the reached location within `horizon_days`.
    pub fn build(network: &Network, profile: ProfileIndex, horizon_days: u16) -> Self {
        let mut first_segments = Vec::with_capacity(network.num_transports());
        let mut num_segments = 0;
        for transport in 0..network.num_transports() as TransportIndex {
            first_segments.push(num_segments as SegmentIndex);
            num_segments += network.transport_stop_count(transport) - 1;
        }

        let mut segment_transfers = Vec::with_capacity(num_segments);
        for transport in 0..network.num_transports() as TransportIndex {
            let stops = network.route_stops(network.transport_route(transport));
            let stop_times = network.get_stop_times(transport);

            for arrival_stop in 1..stops.len() {
                let mut found: BTreeMap<(SegmentIndex, i8), TrafficDays> = BTreeMap::new();
                if stops[arrival_stop].out_allowed {
                    let location = stops[arrival_stop].location;
                    let walks = std::iter::once((location, network.transfer_time(location))).chain(
                        network
                            .footpaths_out(profile, location)
                            .iter()
                            .map(|footpath| (footpath.target, footpath.duration)),
                    );
                    let walks: Vec<_> = walks.collect();

                    for service_day in 0..network.num_days {
                        if !network.operates_on(transport, service_day as i32) {
                            continue;
                        }
                        let arrival = service_day as u32 * MINUTES_PER_DAY as u32 + stop_times[arrival_stop].arrival as u32;
                        let arrival_day = (arrival / MINUTES_PER_DAY as u32) as usize;
                        if arrival_day >= MAX_DAYS {
                            continue;
                        }

                        for &(target, duration) in &walks {
                            let ready = arrival + duration as u32;
                            let ready_day = ready / MINUTES_PER_DAY as u32;
                            if ready_day >= network.num_days as u32 {
                                continue;
                            }
                            let ready_mam = (ready % MINUTES_PER_DAY as u32) as u16;

                            for &route in network.location_routes(target) {
                                let route_stops = network.route_stops(route);
                                for (board_stop, stop) in route_stops.iter().enumerate().take(route_stops.len() - 1) {
                                    if stop.location != target || !stop.in_allowed {
                                        continue;
                                    }
                                    let Some(run) = network.earliest_transport(
                                        route,
                                        board_stop as StopIndex,
                                        ready_day as DayIndex,
                                        ready_mam,
                                        horizon_days,
                                    ) else {
                                        continue;
                                    };
                                    if run.transport == transport {
                                        continue;
                                    }
                                    let Ok(day_offset) = i8::try_from(run.day as i32 - service_day as i32) else {
                                        continue;
                                    };
                                    let to_segment = first_segments[run.transport as usize] + board_stop as SegmentIndex;
                                    let days = found.entry((to_segment, day_offset)).or_insert(TrafficDays::ZERO);
                                    *days |= TrafficDays::ONE << arrival_day as u32;
                                }
                            }
                        }
                    }
                }
                segment_transfers.push(
                    found
                        .into_iter()
                        .map(|((to_segment, day_offset), days)| (to_segment, day_offset, days))
                        .collect(),
                );
            }
        }

        let graph = Self::from_transfers(network, profile, segment_transfers);
        log::debug!(
            "Built segment graph with {} segments, {} transfers and {} distinct bitfields.",
            graph.num_segments(),
            graph.transfers.len(),
            graph.bitfields.len()
        );
        graph
    }

    pub fn num_segments(&self) -> usize { self.segment_transport.len() }

    pub fn num_transfers(&self) -> usize { self.transfers.len() }

    pub fn transport_first_segment(&self, transport: TransportIndex) -> SegmentIndex {
        self.transport_first_segment[transport as usize]
    }

    pub fn segment_transport(&self, segment: SegmentIndex) -> TransportIndex {
        self.segment_transport[segment as usize]
    }

    /// Stop position the segment departs from; it arrives at the next one.
    pub fn segment_stop(&self, segment: SegmentIndex) -> StopIndex {
        (segment - self.transport_first_segment(self.segment_transport(segment))) as StopIndex
    }

    /// Whether the segment is the last hop of its transport.
    pub fn is_last_segment(&self, segment: SegmentIndex) -> bool {
        let next = segment as usize + 1;
        next >= self.segment_transport.len() || self.segment_transport[next] != self.segment_transport(segment)
    }

    pub fn transfers(&self, segment: SegmentIndex) -> &[Transfer] {
        let segment = segment as usize;
        &self.transfers[self.segment_transfers_idx[segment]..self.segment_transfers_idx[segment + 1]]
    }

    pub fn bitfield(&self, index: BitfieldIndex) -> &TrafficDays { &self.bitfields[index as usize] }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::network::{is_active, traffic_days, NetworkBuilder};

    // Day 0 is Monday 2021-03-01.
    fn network() -> Network {
        let mut builder = NetworkBuilder::new(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(), 7, 2).unwrap();
        let s0 = builder.add_location("S0");
        let s1 = builder.add_location("S1");
        let s2 = builder.add_location("S2");
        let s3 = builder.add_location("S3");
        let r0 = builder.add_route("R0", &[s3, s1, s2]).unwrap();
        builder.add_transport(r0, "R0_MON", &[(1320, 1320), (1800, 1800), (1860, 1860)], traffic_days([0])).unwrap();
        let r1 = builder.add_route("R1", &[s0, s1]).unwrap();
        builder.add_transport(r1, "R1_TUE", &[(120, 120), (180, 180)], traffic_days([1])).unwrap();
        builder.build()
    }

    #[test]
    fn lays_out_segments_per_transport() {
        let network = network();
        let graph = SegmentGraph::build(&network, 0, 1);
        assert_eq!(graph.num_segments(), 3);
        assert_eq!(graph.transport_first_segment(0), 0);
        assert_eq!(graph.transport_first_segment(1), 2);
        assert_eq!(graph.segment_transport(1), 0);
        assert_eq!(graph.segment_stop(1), 1);
        assert!(!graph.is_last_segment(0));
        assert!(graph.is_last_segment(1));
        assert!(graph.is_last_segment(2));
    }

    #[test]
    fn connects_to_run_of_previous_service_day() {
        let network = network();
        let graph = SegmentGraph::build(&network, 0, 1);
        // R1_TUE arrives at S1 at 03:00 on Tuesday and R0_MON leaves S1 at 06:00 on Tuesday.
        let transfers = graph.transfers(2);
        assert_eq!(transfers.len(), 1);
        let transfer = transfers[0];
        assert_eq!(transfer.to_segment, 1);
        assert_eq!(transfer.day_offset, -1);
        let days = graph.bitfield(transfer.traffic_days);
        assert!(is_active(days, 1));
        assert!(!is_active(days, 0));
    }

    #[test]
    fn never_transfers_to_same_transport() {
        let network = network();
        let graph = SegmentGraph::build(&network, 0, 1);
        for segment in 0..graph.num_segments() as SegmentIndex {
            for transfer in graph.transfers(segment) {
                assert_ne!(graph.segment_transport(transfer.to_segment), graph.segment_transport(segment));
            }
        }
    }

    #[test]
    fn deduplicates_bitfields() {
        let network = network();
        let days = traffic_days([1]);
        let graph = SegmentGraph::from_transfers(
            &network,
            0,
            vec![vec![(2, 0, days)], vec![(2, 0, days)], Vec::new()],
        );
        assert_eq!(graph.num_transfers(), 2);
        assert_eq!(graph.transfers(0)[0].traffic_days, graph.transfers(1)[0].traffic_days);
        assert!(graph.transfers(2).is_empty());
    }
}

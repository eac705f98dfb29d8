use std::collections::HashMap;

use crate::config::{ConfigError, SearchSettings};
use crate::delta::Delta;
use crate::dial::Dial;
use crate::network::{Minutes, SegmentIndex, TransportIndex};
use crate::segments::SegmentGraph;

/// Label of a discovered segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentLabel {
    /// Arrival at the stop the segment ends at.
    pub arrival: Delta,
    pub transfers: u8,
    /// `None` for start segments.
    pub predecessor: Option<SegmentIndex>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueEntry {
    pub segment: SegmentIndex,
    pub transfers: u8,
}

/// Mutable tables of one search, reusable across queries on the same segment graph.
pub struct SearchState {
    settings: SearchSettings,
    // Transfer factor of the running query, `settings.transfer_factor` unless overridden.
    transfer_factor: f32,
    labels: Vec<Option<SegmentLabel>>,
    settled: Vec<bool>,
    start_segments: Vec<bool>,
    destination_reachable: Vec<bool>,
    dist_to_dest: HashMap<SegmentIndex, Minutes>,
    transport_day_offset: HashMap<TransportIndex, i16>,
    // Unset between `reset` and `setup`.
    start: Option<Delta>,
    queue: Dial<QueueEntry>,
}

impl SearchState {
    pub fn new(graph: &SegmentGraph, settings: &SearchSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let num_segments = graph.num_segments();
        Ok(Self {
            settings: *settings,
            transfer_factor: settings.transfer_factor,
            labels: vec![None; num_segments],
            settled: vec![false; num_segments],
            start_segments: vec![false; num_segments],
            destination_reachable: vec![false; num_segments],
            dist_to_dest: HashMap::new(),
            transport_day_offset: HashMap::new(),
            start: None,
            queue: Dial::new(settings.max_bucket() as usize),
        })
    }

    /// Settings the state was created with. Query overrides never change them.
    pub fn settings(&self) -> &SearchSettings { &self.settings }

    /// Settings of the running query.
    pub fn active_settings(&self) -> SearchSettings { self.settings.with_transfer_factor(self.transfer_factor) }

    pub fn transfer_factor(&self) -> f32 { self.transfer_factor }

    /// Overrides the transfer penalty until the next call. Only valid while no search is running.
    pub fn set_transfer_factor(&mut self, transfer_factor: f32) -> Result<(), ConfigError> {
        debug_assert!(self.start.is_none(), "Transfer factor changed during a search.");
        let settings = self.settings.with_transfer_factor(transfer_factor);
        settings.validate()?;
        self.transfer_factor = transfer_factor;
        self.queue.reserve_keys(settings.max_bucket() as usize);
        Ok(())
    }

    /// Applies a query's transfer factor, or the configured one when the query has none.
    pub fn use_transfer_factor(&mut self, transfer_factor: Option<f32>) -> Result<(), ConfigError> {
        self.set_transfer_factor(transfer_factor.unwrap_or(self.settings.transfer_factor))
    }

    pub fn num_segments(&self) -> usize { self.labels.len() }

    pub fn start(&self) -> Option<Delta> { self.start }

    pub fn label(&self, segment: SegmentIndex) -> Option<&SegmentLabel> { self.labels[segment as usize].as_ref() }

    pub fn arrival(&self, segment: SegmentIndex) -> Option<Delta> { self.label(segment).map(|label| label.arrival) }

    pub fn is_settled(&self, segment: SegmentIndex) -> bool { self.settled[segment as usize] }

    pub fn is_start_segment(&self, segment: SegmentIndex) -> bool { self.start_segments[segment as usize] }

    pub fn is_destination(&self, segment: SegmentIndex) -> bool { self.destination_reachable[segment as usize] }

    pub fn dist_to_dest(&self, segment: SegmentIndex) -> Option<Minutes> { self.dist_to_dest.get(&segment).copied() }

    pub fn num_destination_segments(&self) -> usize { self.destination_reachable.iter().filter(|&&d| d).count() }

    pub fn transport_day_offset(&self, transport: TransportIndex) -> Option<i16> {
        self.transport_day_offset.get(&transport).copied()
    }

    pub(crate) fn set_transport_day_offset(&mut self, transport: TransportIndex, day_offset: i16) {
        self.transport_day_offset.insert(transport, day_offset);
    }

    pub(crate) fn mark_destination(&mut self, segment: SegmentIndex, extra: Minutes) {
        self.destination_reachable[segment as usize] = true;
        self.dist_to_dest
            .entry(segment)
            .and_modify(|dist| *dist = (*dist).min(extra))
            .or_insert(extra);
    }

    pub(crate) fn clear_destinations(&mut self) {
        self.destination_reachable.fill(false);
        self.dist_to_dest.clear();
    }

    /// Cost of arriving at `arrival` after `transfers` transfers.
    pub fn cost_of(&self, arrival: Delta, transfers: u8) -> u32 {
        let start = self.start.expect("Cost requested before setup.");
        arrival.minutes_since(start) + self.active_settings().transfer_penalty(transfers)
    }

    /// Cost of the current label of a discovered segment.
    pub fn cost(&self, segment: SegmentIndex) -> u32 {
        let label = self.label(segment).expect("Cost requested for an undiscovered segment.");
        self.cost_of(label.arrival, label.transfers)
    }

    /// Records a start segment. Keeps the earlier arrival if the segment is discovered twice.
    pub(crate) fn add_start_segment(&mut self, segment: SegmentIndex, arrival: Delta) {
        let slot = &mut self.labels[segment as usize];
        if slot.map_or(true, |label| arrival < label.arrival) {
            *slot = Some(SegmentLabel { arrival, transfers: 0, predecessor: None });
        }
        self.start_segments[segment as usize] = true;
    }

    /// Seeds the queue with every start segment.
    pub fn setup(&mut self, start: Delta) {
        assert!(self.start.is_none(), "Search state has not been reset before setup.");
        self.start = Some(start);
        let max_key = self.queue.max_key();
        for segment in 0..self.start_segments.len() {
            if !self.start_segments[segment] {
                continue;
            }
            let Some(label) = self.labels[segment].as_mut() else {
                debug_assert!(false, "Start segment {segment} has no label.");
                continue;
            };
            label.predecessor = None;
            if label.arrival < start {
                continue;
            }
            let key = label.arrival.minutes_since(start) as usize;
            if key > max_key {
                continue;
            }
            self.queue.push(key, QueueEntry { segment: segment as SegmentIndex, transfers: 0 });
        }
    }

    /// Overwrites the label of `segment` if the new arrival is strictly cheaper, pushing a fresh queue entry.
    /// Settled segments are never changed.
    pub fn improve(
        &mut self,
        segment: SegmentIndex,
        arrival: Delta,
        transfers: u8,
        predecessor: SegmentIndex,
    ) -> bool {
        if self.is_settled(segment) {
            return false;
        }
        let cost = self.cost_of(arrival, transfers);
        if let Some(label) = self.label(segment) {
            if cost >= self.cost_of(label.arrival, label.transfers) {
                return false;
            }
        }
        self.labels[segment as usize] = Some(SegmentLabel { arrival, transfers, predecessor: Some(predecessor) });
        self.queue.push(cost as usize, QueueEntry { segment, transfers });
        true
    }

    pub fn queue_len(&self) -> usize { self.queue.len() }

    pub(crate) fn top_key(&mut self) -> Option<usize> { self.queue.top_key() }

    pub(crate) fn pop(&mut self) -> Option<QueueEntry> { self.queue.pop() }

    /// Finalizes the label of a segment and returns it.
    pub(crate) fn settle(&mut self, segment: SegmentIndex) -> SegmentLabel {
        let label = self.labels[segment as usize].expect("Settled an undiscovered segment.");
        self.settled[segment as usize] = true;
        label
    }

    /// Clears everything but the destination frontier, keeping all allocations.
    pub fn reset(&mut self) {
        self.labels.fill(None);
        self.settled.fill(false);
        self.start_segments.fill(false);
        self.transport_day_offset.clear();
        self.queue.clear();
        self.start = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::network::{traffic_days, Network, NetworkBuilder};

    fn network() -> Network {
        let mut builder = NetworkBuilder::new(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(), 2, 2).unwrap();
        let a = builder.add_location("A");
        let b = builder.add_location("B");
        let c = builder.add_location("C");
        let route = builder.add_route("R", &[a, b, c]).unwrap();
        builder.add_transport(route, "T", &[(360, 360), (420, 420), (480, 480)], traffic_days([0, 1])).unwrap();
        builder.build()
    }

    fn state(settings: SearchSettings) -> SearchState {
        let network = network();
        let graph = SegmentGraph::build(&network, 0, 1);
        SearchState::new(&graph, &settings).unwrap()
    }

    #[test]
    fn setup_seeds_start_segments() {
        let mut state = state(SearchSettings::default());
        state.add_start_segment(0, Delta::new(0, 420));
        state.setup(Delta::new(0, 350));
        assert!(state.is_start_segment(0));
        assert_eq!(state.queue_len(), 1);
        assert_eq!(state.top_key(), Some(70));
        assert_eq!(state.pop(), Some(QueueEntry { segment: 0, transfers: 0 }));
        assert_eq!(state.label(0).unwrap().predecessor, None);
    }

    #[test]
    fn keeps_earlier_start_arrival() {
        let mut state = state(SearchSettings::default());
        state.add_start_segment(1, Delta::new(0, 480));
        state.add_start_segment(1, Delta::new(1, 480));
        assert_eq!(state.arrival(1), Some(Delta::new(0, 480)));
    }

    #[test]
    fn improves_only_on_strictly_lower_cost() {
        let mut state = state(SearchSettings::default().with_transfer_factor(10.0));
        state.setup(Delta::new(0, 300));
        assert!(state.improve(1, Delta::new(0, 480), 1, 0));
        assert_eq!(state.cost(1), 190);
        // Five minutes earlier but one more transfer.
        assert!(!state.improve(1, Delta::new(0, 475), 2, 0));
        assert!(state.improve(1, Delta::new(0, 475), 0, 0));
        assert_eq!(state.label(1).unwrap().transfers, 0);
        assert_eq!(state.cost(1), 175);
        assert_eq!(state.queue_len(), 2);
    }

    #[test]
    fn never_improves_settled_segments() {
        let mut state = state(SearchSettings::default());
        state.setup(Delta::new(0, 300));
        assert!(state.improve(1, Delta::new(0, 480), 0, 0));
        let label = state.settle(1);
        assert!(!state.improve(1, Delta::new(0, 400), 0, 0));
        assert_eq!(state.label(1), Some(&label));
    }

    #[test]
    fn destination_keeps_minimum_distance() {
        let mut state = state(SearchSettings::default());
        state.mark_destination(1, 10);
        state.mark_destination(1, 4);
        state.mark_destination(1, 7);
        assert!(state.is_destination(1));
        assert_eq!(state.dist_to_dest(1), Some(4));
        assert_eq!(state.num_destination_segments(), 1);
    }

    #[test]
    fn reset_clears_search_but_keeps_destinations() {
        let mut state = state(SearchSettings::default());
        state.mark_destination(1, 0);
        state.add_start_segment(0, Delta::new(0, 420));
        state.setup(Delta::new(0, 360));
        state.set_transport_day_offset(0, 0);
        state.settle(0);
        state.reset();
        assert_eq!(state.start(), None);
        assert_eq!(state.label(0), None);
        assert!(!state.is_settled(0));
        assert!(!state.is_start_segment(0));
        assert_eq!(state.transport_day_offset(0), None);
        assert_eq!(state.queue_len(), 0);
        assert!(state.is_destination(1));
        // A reset state can be set up again.
        state.setup(Delta::new(0, 100));
    }

    #[test]
    #[should_panic(expected = "not been reset")]
    fn setup_requires_reset() {
        let mut state = state(SearchSettings::default());
        state.setup(Delta::new(0, 100));
        state.setup(Delta::new(0, 100));
    }

    #[test]
    fn transfer_factor_grows_queue_range() {
        let mut state = state(SearchSettings::default());
        state.set_transfer_factor(30.0).unwrap();
        assert_eq!(state.transfer_factor(), 30.0);
        assert_eq!(state.active_settings().max_bucket(), 1440 + 210);
        assert!(state.queue.max_key() >= 1440 + 210);
        assert!(state.set_transfer_factor(f32::NAN).is_err());
        assert_eq!(state.transfer_factor(), 30.0);
    }

    #[test]
    fn transfer_factor_override_keeps_the_configured_one() {
        let mut state = state(SearchSettings::default().with_transfer_factor(10.0));
        state.use_transfer_factor(Some(60.0)).unwrap();
        assert_eq!(state.transfer_factor(), 60.0);
        assert_eq!(state.settings().transfer_factor, 10.0);
        state.setup(Delta::new(0, 300));
        assert_eq!(state.cost_of(Delta::new(0, 400), 1), 160);

        state.reset();
        state.use_transfer_factor(None).unwrap();
        assert_eq!(state.transfer_factor(), 10.0);
        state.setup(Delta::new(0, 300));
        assert_eq!(state.cost_of(Delta::new(0, 400), 1), 110);
    }
}

use crate::network::SegmentIndex;
use crate::state::SegmentLabel;

/// Hooks into the relaxation loop. All methods default to doing nothing.
pub trait SearchObserver {
    fn on_update(&mut self, _segment: SegmentIndex, _label: &SegmentLabel, _cost: u32) {}

    fn on_settle(&mut self, _segment: SegmentIndex, _label: &SegmentLabel, _cost: u32) {}

    fn on_destination(&mut self, _segment: SegmentIndex, _label: &SegmentLabel, _bucket: u32) {}
}

#[derive(Default, Clone, Copy, Debug)]
pub struct NoopObserver;

impl SearchObserver for NoopObserver {}

/// Traces every hook at `trace` level.
#[derive(Default, Clone, Copy, Debug)]
pub struct LogObserver;

impl SearchObserver for LogObserver {
    fn on_update(&mut self, segment: SegmentIndex, label: &SegmentLabel, cost: u32) {
        log::trace!("update segment {segment}: {label:?} cost {cost}");
    }

    fn on_settle(&mut self, segment: SegmentIndex, label: &SegmentLabel, cost: u32) {
        log::trace!("settle segment {segment}: {label:?} cost {cost}");
    }

    fn on_destination(&mut self, segment: SegmentIndex, label: &SegmentLabel, bucket: u32) {
        log::trace!("destination segment {segment}: {label:?} bucket {bucket}");
    }
}

impl<O: SearchObserver + ?Sized> SearchObserver for &mut O {
    fn on_update(&mut self, segment: SegmentIndex, label: &SegmentLabel, cost: u32) {
        (**self).on_update(segment, label, cost)
    }

    fn on_settle(&mut self, segment: SegmentIndex, label: &SegmentLabel, cost: u32) {
        (**self).on_settle(segment, label, cost)
    }

    fn on_destination(&mut self, segment: SegmentIndex, label: &SegmentLabel, bucket: u32) {
        (**self).on_destination(segment, label, bucket)
    }
}

use crate::network::{Footpath, LocationIndex, Minutes, ProfileIndex, UnixTime};
use crate::Network;

/// How query locations are matched against network locations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LocationMatchMode {
    #[default]
    Exact,
    /// A location also matches its equivalent locations.
    Equivalent,
    /// Offsets describe access times from or to a coordinate.
    Intermodal,
}

/// A query location together with the time needed to reach it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Offset {
    pub target: LocationIndex,
    pub duration: Minutes,
}

impl Offset {
    pub fn new(target: LocationIndex, duration: Minutes) -> Self { Self { target, duration } }
}

/// A location the search boards from, `access` minutes after the start time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartLocation {
    pub location: LocationIndex,
    pub access: Minutes,
    /// Footpath from the matched start location, `None` when `location` is matched itself.
    pub walk: Option<Footpath>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartTime {
    Instant(UnixTime),
    /// Every departure in `from..to` is searched.
    Interval { from: UnixTime, to: UnixTime },
}

impl StartTime {
    pub fn earliest(&self) -> UnixTime {
        match *self {
            StartTime::Instant(time) => time,
            StartTime::Interval { from, .. } => from,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub start_time: StartTime,
    pub start_match_mode: LocationMatchMode,
    pub dest_match_mode: LocationMatchMode,
    pub start: Vec<Offset>,
    pub destination: Vec<Offset>,
    pub max_transfers: u8,
    /// Arrivals after this time are not reported.
    pub worst_arrival: Option<UnixTime>,
    /// Overrides the transfer factor of the search state.
    pub transfer_factor: Option<f32>,
    /// Also board at locations reachable from a start location by footpath.
    pub use_start_footpaths: bool,
    pub profile: ProfileIndex,
}

impl Query {
    /// Query from one location to another at a fixed time.
    pub fn new(start_time: UnixTime, start: LocationIndex, destination: LocationIndex) -> Self {
        Self {
            start_time: StartTime::Instant(start_time),
            start_match_mode: LocationMatchMode::Exact,
            dest_match_mode: LocationMatchMode::Exact,
            start: vec![Offset::new(start, 0)],
            destination: vec![Offset::new(destination, 0)],
            max_transfers: 7,
            worst_arrival: None,
            transfer_factor: None,
            use_start_footpaths: true,
            profile: 0,
        }
    }

    pub fn with_interval(mut self, from: UnixTime, to: UnixTime) -> Self {
        self.start_time = StartTime::Interval { from, to };
        self
    }

    pub fn with_max_transfers(mut self, max_transfers: u8) -> Self {
        self.max_transfers = max_transfers;
        self
    }

    pub fn with_worst_arrival(mut self, worst_arrival: UnixTime) -> Self {
        self.worst_arrival = Some(worst_arrival);
        self
    }

    pub fn with_transfer_factor(mut self, transfer_factor: f32) -> Self {
        self.transfer_factor = Some(transfer_factor);
        self
    }

    pub fn with_match_modes(mut self, start: LocationMatchMode, destination: LocationMatchMode) -> Self {
        self.start_match_mode = start;
        self.dest_match_mode = destination;
        self
    }

    pub fn with_start_footpaths(mut self, use_start_footpaths: bool) -> Self {
        self.use_start_footpaths = use_start_footpaths;
        self
    }

    /// Every location the search may board at. Matched start locations come before the locations reached
    /// from them by footpath.
    pub fn start_locations(&self, network: &Network) -> Vec<StartLocation> {
        let mut locations = Vec::new();
        for offset in &self.start {
            for location in expand(network, self.start_match_mode, offset) {
                locations.push(StartLocation { location, access: offset.duration, walk: None });
            }
        }
        if self.use_start_footpaths {
            let matched = locations.len();
            for i in 0..matched {
                let StartLocation { location, access, .. } = locations[i];
                for footpath in network.footpaths_out(self.profile, location) {
                    locations.push(StartLocation {
                        location: footpath.target,
                        access: access + footpath.duration,
                        walk: Some(Footpath { target: location, duration: footpath.duration }),
                    });
                }
            }
        }
        locations
    }

    pub fn is_start(&self, network: &Network, location: LocationIndex) -> bool {
        matches(network, self.start_match_mode, &self.start, location)
    }

    pub fn is_destination(&self, network: &Network, location: LocationIndex) -> bool {
        matches(network, self.dest_match_mode, &self.destination, location)
    }
}

/// Whether `location` is one of the offset targets under the given match mode.
pub fn matches(network: &Network, mode: LocationMatchMode, offsets: &[Offset], location: LocationIndex) -> bool {
    offsets.iter().any(|offset| match mode {
        LocationMatchMode::Exact | LocationMatchMode::Intermodal => offset.target == location,
        LocationMatchMode::Equivalent => {
            offset.target == location || network.equivalences(offset.target).contains(&location)
        }
    })
}

/// Locations an offset stands for under the given match mode.
pub fn expand(network: &Network, mode: LocationMatchMode, offset: &Offset) -> Vec<LocationIndex> {
    let mut locations = vec![offset.target];
    if mode == LocationMatchMode::Equivalent {
        locations.extend(network.equivalences(offset.target).iter().copied());
    }
    locations
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::network::NetworkBuilder;

    #[test]
    fn equivalent_mode_matches_equivalences() {
        let mut builder = NetworkBuilder::new(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(), 1, 2).unwrap();
        let a = builder.add_location("A");
        let a2 = builder.add_location("A platform 2");
        let b = builder.add_location("B");
        builder.add_equivalence(a, a2).unwrap();
        let network = builder.build();

        let offsets = [Offset::new(a, 0)];
        assert!(matches(&network, LocationMatchMode::Exact, &offsets, a));
        assert!(!matches(&network, LocationMatchMode::Exact, &offsets, a2));
        assert!(matches(&network, LocationMatchMode::Equivalent, &offsets, a2));
        assert!(!matches(&network, LocationMatchMode::Equivalent, &offsets, b));
        assert_eq!(expand(&network, LocationMatchMode::Equivalent, &offsets[0]), vec![a, a2]);
        assert_eq!(expand(&network, LocationMatchMode::Exact, &offsets[0]), vec![a]);
    }

    #[test]
    fn start_locations_include_walks_from_every_match() {
        let mut builder = NetworkBuilder::new(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(), 1, 2).unwrap();
        let a = builder.add_location("A");
        let b = builder.add_location("B");
        let p = builder.add_location("P");
        builder.add_footpath(a, p, 5).unwrap();
        builder.add_footpath(b, p, 7).unwrap();
        let network = builder.build();

        let mut query = Query::new(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap().and_hms_opt(5, 0, 0).unwrap(), a, p);
        query.start = vec![Offset::new(a, 40), Offset::new(b, 0)];
        let starts = query.start_locations(&network);
        assert_eq!(
            starts,
            vec![
                StartLocation { location: a, access: 40, walk: None },
                StartLocation { location: b, access: 0, walk: None },
                StartLocation { location: p, access: 45, walk: Some(Footpath { target: a, duration: 5 }) },
                StartLocation { location: p, access: 7, walk: Some(Footpath { target: b, duration: 7 }) },
            ]
        );
        assert_eq!(query.with_start_footpaths(false).start_locations(&network).len(), 2);
    }
}

use std::collections::HashMap;
use std::ops::Range;

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};

use crate::delta::MINUTES_PER_DAY;

// Absolute times are UTC.
pub type UnixTime = chrono::NaiveDateTime;
pub type Minutes = u16;
pub type DayIndex = u16;
pub type LocationIndex = u32;
pub type RouteIndex = u32;
pub type TransportIndex = u32;
pub type SegmentIndex = u32;
pub type BitfieldIndex = u32;
pub type StopIndex = u16;
pub type ProfileIndex = u8;

const TRAFFIC_DAYS_DIGITS: usize = 8;
pub const MAX_DAYS: usize = TRAFFIC_DAYS_DIGITS * 64;

/// One bit per day of the timetable.
pub type TrafficDays = bnum::BUint<TRAFFIC_DAYS_DIGITS>;

pub fn traffic_days(days: impl IntoIterator<Item = DayIndex>) -> TrafficDays {
    let mut bits = TrafficDays::ZERO;
    for day in days {
        assert!((day as usize) < MAX_DAYS, "Day {day} does not fit a {MAX_DAYS}-day bitfield.");
        bits |= TrafficDays::ONE << day as u32;
    }
    bits
}

pub fn is_active(days: &TrafficDays, day: i32) -> bool {
    day >= 0 && (day as usize) < MAX_DAYS && days.bit(day as u32)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    Arrival,
    Departure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteStop {
    pub location: LocationIndex,
    pub in_allowed: bool,
    pub out_allowed: bool,
}

impl RouteStop {
    pub fn new(location: LocationIndex) -> Self {
        Self { location, in_allowed: true, out_allowed: true }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footpath {
    // For inbound tables this is the location the footpath starts at.
    pub target: LocationIndex,
    pub duration: Minutes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopTime {
    pub arrival: Minutes,
    pub departure: Minutes,
}

/// A transport on a concrete service day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransportRun {
    pub transport: TransportIndex,
    pub day: DayIndex,
}

pub struct Route {
    pub name: Box<str>,
    pub num_stops: StopIndex,
    pub route_stops_idx: usize,
    pub first_transport: TransportIndex,
    pub num_transports: u32,
}

impl Route {
    pub fn get_stops<'a>(&self, route_stops: &'a [RouteStop]) -> &'a [RouteStop] {
        &route_stops[self.route_stops_idx..(self.route_stops_idx + self.num_stops as usize)]
    }

    pub fn transports(&self) -> Range<TransportIndex> {
        self.first_transport..(self.first_transport + self.num_transports)
    }
}

pub struct Transport {
    pub name: Box<str>,
    pub route: RouteIndex,
    pub stop_times_idx: usize,
    pub traffic_days: TrafficDays,
}

pub struct Location {
    pub name: Box<str>,
    pub transfer_time: Minutes,
    pub routes_idx: usize,
    pub num_routes: usize,
}

impl Location {
    pub fn get_routes<'a>(&self, location_routes: &'a [RouteIndex]) -> &'a [RouteIndex] {
        &location_routes[self.routes_idx..(self.routes_idx + self.num_routes)]
    }
}

/// Read-only timetable: locations, routes, transports and footpaths.
pub struct Network {
    pub first_day: NaiveDate,
    pub num_days: u16,
    pub locations: Vec<Location>,
    pub location_index: HashMap<String, LocationIndex>,
    pub routes: Vec<Route>,
    pub route_stops: Vec<RouteStop>,
    pub location_routes: Vec<RouteIndex>,
    pub transports: Vec<Transport>,
    pub stop_times: Vec<StopTime>,
    footpaths_out: Vec<Vec<Vec<Footpath>>>,
    footpaths_in: Vec<Vec<Vec<Footpath>>>,
    equivalences: Vec<Vec<LocationIndex>>,
}

impl Network {
    pub fn get_location(&self, location: LocationIndex) -> &Location { &self.locations[location as usize] }

    pub fn get_location_idx(&self, name: &str) -> Option<LocationIndex> { self.location_index.get(name).copied() }

    pub fn location_name(&self, location: LocationIndex) -> &str { &self.get_location(location).name }

    pub fn num_locations(&self) -> usize { self.locations.len() }

    pub fn num_routes(&self) -> usize { self.routes.len() }

    pub fn num_transports(&self) -> usize { self.transports.len() }

    pub fn num_profiles(&self) -> usize { self.footpaths_out.len() }

    pub fn location_routes(&self, location: LocationIndex) -> &[RouteIndex] {
        self.get_location(location).get_routes(&self.location_routes)
    }

    pub fn route_stops(&self, route: RouteIndex) -> &[RouteStop] {
        self.routes[route as usize].get_stops(&self.route_stops)
    }

    pub fn route_transports(&self, route: RouteIndex) -> Range<TransportIndex> {
        self.routes[route as usize].transports()
    }

    pub fn get_transport(&self, transport: TransportIndex) -> &Transport { &self.transports[transport as usize] }

    pub fn transport_name(&self, transport: TransportIndex) -> &str { &self.get_transport(transport).name }

    pub fn transport_route(&self, transport: TransportIndex) -> RouteIndex { self.get_transport(transport).route }

    pub fn transport_stop_count(&self, transport: TransportIndex) -> usize {
        self.routes[self.transport_route(transport) as usize].num_stops as usize
    }

    pub fn get_stop_times(&self, transport: TransportIndex) -> &[StopTime] {
        let start = self.get_transport(transport).stop_times_idx;
        &self.stop_times[start..(start + self.transport_stop_count(transport))]
    }

    /// Event time in minutes after the midnight of the transport's service day.
    pub fn event_mam(&self, transport: TransportIndex, stop: StopIndex, event_type: EventType) -> Minutes {
        let stop_time = &self.get_stop_times(transport)[stop as usize];
        match event_type {
            EventType::Arrival => stop_time.arrival,
            EventType::Departure => stop_time.departure,
        }
    }

    pub fn transport_location(&self, transport: TransportIndex, stop: StopIndex) -> LocationIndex {
        self.route_stops(self.transport_route(transport))[stop as usize].location
    }

    pub fn transfer_time(&self, location: LocationIndex) -> Minutes { self.get_location(location).transfer_time }

    pub fn footpaths_out(&self, profile: ProfileIndex, location: LocationIndex) -> &[Footpath] {
        &self.footpaths_out[profile as usize][location as usize]
    }

    pub fn footpaths_in(&self, profile: ProfileIndex, location: LocationIndex) -> &[Footpath] {
        &self.footpaths_in[profile as usize][location as usize]
    }

    pub fn equivalences(&self, location: LocationIndex) -> &[LocationIndex] {
        &self.equivalences[location as usize]
    }

    pub fn operates_on(&self, transport: TransportIndex, day: i32) -> bool {
        day < self.num_days as i32 && is_active(&self.get_transport(transport).traffic_days, day)
    }

    /// Day index and minutes after midnight of an absolute time, if inside the timetable.
    pub fn day_idx_mam(&self, time: UnixTime) -> Option<(DayIndex, Minutes)> {
        let day = time.date().signed_duration_since(self.first_day).num_days();
        if day < 0 || day >= self.num_days as i64 {
            return None;
        }
        Some((day as DayIndex, (time.hour() * 60 + time.minute()) as Minutes))
    }

    pub fn to_unixtime(&self, day: DayIndex, minutes: Minutes) -> UnixTime {
        self.first_day.and_time(NaiveTime::MIN) + Duration::days(day as i64) + Duration::minutes(minutes as i64)
    }

    pub fn event_time(&self, run: TransportRun, stop: StopIndex, event_type: EventType) -> UnixTime {
        self.to_unixtime(run.day, self.event_mam(run.transport, stop, event_type))
    }

    /// Earliest run of `route` departing from stop position `stop` at or after `mam` on `day`,
    /// looking at most `horizon_days` days ahead.
    pub fn earliest_transport(
        &self,
        route: RouteIndex,
        stop: StopIndex,
        day: DayIndex,
        mam: Minutes,
        horizon_days: u16,
    ) -> Option<TransportRun> {
        for day_offset in 0..=horizon_days {
            let event_day = day as i32 + day_offset as i32;
            let mut best: Option<(Minutes, TransportRun)> = None;
            for transport in self.route_transports(route) {
                let departure = self.event_mam(transport, stop, EventType::Departure);
                let event_mam = departure % MINUTES_PER_DAY;
                if day_offset == 0 && event_mam < mam {
                    continue;
                }
                // The run departing on `event_day` started `departure / 1440` days earlier.
                let service_day = event_day - (departure / MINUTES_PER_DAY) as i32;
                if !self.operates_on(transport, service_day) {
                    continue;
                }
                if best.map_or(true, |(best_mam, _)| event_mam < best_mam) {
                    best = Some((event_mam, TransportRun { transport, day: service_day as DayIndex }));
                }
            }
            if let Some((_, run)) = best {
                return Some(run);
            }
        }
        None
    }

    pub fn print_stats(&self) {
        println!("Network with {} locations, {} routes, {} transports over {} days.",
                 self.num_locations(), self.num_routes(), self.num_transports(), self.num_days);
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Unknown location {0}.")]
    UnknownLocation(LocationIndex),
    #[error("Unknown route {0}.")]
    UnknownRoute(RouteIndex),
    #[error("Route {0} needs at least two stops.")]
    RouteTooShort(String),
    #[error("Transport {transport} has {found} stop times but its route has {expected} stops.")]
    StopTimeCount { transport: String, expected: usize, found: usize },
    #[error("Transport {0} goes back in time.")]
    DecreasingTimes(String),
    #[error("Timetables can span at most {MAX_DAYS} days, not {0}.")]
    TooManyDays(u16),
}

struct PendingTransport {
    name: String,
    stop_times: Vec<StopTime>,
    traffic_days: TrafficDays,
}

struct PendingRoute {
    name: String,
    stops: Vec<RouteStop>,
    transports: Vec<PendingTransport>,
}

/// Assembles a [`Network`] in memory.
pub struct NetworkBuilder {
    first_day: NaiveDate,
    num_days: u16,
    default_transfer_time: Minutes,
    locations: Vec<(String, Minutes)>,
    footpaths: Vec<Vec<(LocationIndex, Footpath)>>,
    routes: Vec<PendingRoute>,
    equivalences: Vec<(LocationIndex, LocationIndex)>,
}

impl NetworkBuilder {
    pub fn new(first_day: NaiveDate, num_days: u16, default_transfer_time: Minutes) -> Result<Self, NetworkError> {
        if num_days as usize > MAX_DAYS {
            return Err(NetworkError::TooManyDays(num_days));
        }
        Ok(Self {
            first_day,
            num_days,
            default_transfer_time,
            locations: Vec::new(),
            footpaths: vec![Vec::new()],
            routes: Vec::new(),
            equivalences: Vec::new(),
        })
    }

    pub fn add_location(&mut self, name: &str) -> LocationIndex {
        self.locations.push((name.to_owned(), self.default_transfer_time));
        (self.locations.len() - 1) as LocationIndex
    }

    fn check_location(&self, location: LocationIndex) -> Result<(), NetworkError> {
        if (location as usize) < self.locations.len() {
            Ok(())
        } else {
            Err(NetworkError::UnknownLocation(location))
        }
    }

    pub fn set_transfer_time(&mut self, location: LocationIndex, transfer_time: Minutes) -> Result<(), NetworkError> {
        self.check_location(location)?;
        self.locations[location as usize].1 = transfer_time;
        Ok(())
    }

    pub fn add_footpath(&mut self, from: LocationIndex, to: LocationIndex, duration: Minutes) -> Result<(), NetworkError> {
        self.add_profile_footpath(0, from, to, duration)
    }

    pub fn add_profile_footpath(
        &mut self,
        profile: ProfileIndex,
        from: LocationIndex,
        to: LocationIndex,
        duration: Minutes,
    ) -> Result<(), NetworkError> {
        self.check_location(from)?;
        self.check_location(to)?;
        if self.footpaths.len() <= profile as usize {
            self.footpaths.resize_with(profile as usize + 1, Vec::new);
        }
        self.footpaths[profile as usize].push((from, Footpath { target: to, duration }));
        Ok(())
    }

    /// Marks two locations as interchangeable for equivalent-location matching.
    pub fn add_equivalence(&mut self, a: LocationIndex, b: LocationIndex) -> Result<(), NetworkError> {
        self.check_location(a)?;
        self.check_location(b)?;
        self.equivalences.push((a, b));
        Ok(())
    }

    pub fn add_route(&mut self, name: &str, stops: &[LocationIndex]) -> Result<RouteIndex, NetworkError> {
        self.add_route_stops(name, stops.iter().map(|&location| RouteStop::new(location)).collect())
    }

    pub fn add_route_stops(&mut self, name: &str, stops: Vec<RouteStop>) -> Result<RouteIndex, NetworkError> {
        if stops.len() < 2 {
            return Err(NetworkError::RouteTooShort(name.to_owned()));
        }
        for stop in &stops {
            self.check_location(stop.location)?;
        }
        self.routes.push(PendingRoute { name: name.to_owned(), stops, transports: Vec::new() });
        Ok((self.routes.len() - 1) as RouteIndex)
    }

    /// Adds a transport given `(arrival, departure)` minutes per stop of its route.
    pub fn add_transport(
        &mut self,
        route: RouteIndex,
        name: &str,
        times: &[(Minutes, Minutes)],
        traffic_days: TrafficDays,
    ) -> Result<(), NetworkError> {
        let pending = self.routes.get_mut(route as usize).ok_or(NetworkError::UnknownRoute(route))?;
        if times.len() != pending.stops.len() {
            return Err(NetworkError::StopTimeCount {
                transport: name.to_owned(),
                expected: pending.stops.len(),
                found: times.len(),
            });
        }
        let goes_back = times.iter().any(|&(arrival, departure)| departure < arrival)
            || times.windows(2).any(|pair| pair[1].0 < pair[0].1);
        if goes_back {
            return Err(NetworkError::DecreasingTimes(name.to_owned()));
        }
        pending.transports.push(PendingTransport {
            name: name.to_owned(),
            stop_times: times.iter().map(|&(arrival, departure)| StopTime { arrival, departure }).collect(),
            traffic_days,
        });
        Ok(())
    }

    pub fn build(self) -> Network {
        let num_locations = self.locations.len();
        let mut locations: Vec<Location> = self
            .locations
            .into_iter()
            .map(|(name, transfer_time)| Location {
                name: name.into_boxed_str(),
                transfer_time,
                routes_idx: 0,
                num_routes: 0,
            })
            .collect();

        let mut location_index = HashMap::with_capacity(num_locations);
        for (i, location) in locations.iter().enumerate() {
            location_index.insert(location.name.to_string(), i as LocationIndex);
        }

        let mut routes = Vec::with_capacity(self.routes.len());
        let mut route_stops = Vec::new();
        let mut transports = Vec::new();
        let mut stop_times = Vec::new();
        for (route_idx, mut pending) in self.routes.into_iter().enumerate() {
            // Sort transports in route based on first departure.
            pending.transports.sort_by_key(|transport| transport.stop_times[0].departure);

            routes.push(Route {
                name: pending.name.into_boxed_str(),
                num_stops: pending.stops.len() as StopIndex,
                route_stops_idx: route_stops.len(),
                first_transport: transports.len() as TransportIndex,
                num_transports: pending.transports.len() as u32,
            });
            route_stops.extend(pending.stops);

            for transport in pending.transports {
                transports.push(Transport {
                    name: transport.name.into_boxed_str(),
                    route: route_idx as RouteIndex,
                    stop_times_idx: stop_times.len(),
                    traffic_days: transport.traffic_days,
                });
                stop_times.extend(transport.stop_times);
            }
        }

        // Index the routes for a given location.
        let mut location_routes = Vec::new();
        for (location_idx, location) in locations.iter_mut().enumerate() {
            location.routes_idx = location_routes.len();

            for (route_idx, route) in routes.iter().enumerate() {
                if route
                    .get_stops(&route_stops)
                    .iter()
                    .any(|stop| stop.location == location_idx as LocationIndex)
                {
                    location_routes.push(route_idx as RouteIndex);
                }
            }
            location.num_routes = location_routes.len() - location.routes_idx;
        }

        let mut footpaths_out = Vec::with_capacity(self.footpaths.len());
        let mut footpaths_in = Vec::with_capacity(self.footpaths.len());
        for profile_footpaths in self.footpaths {
            let mut outbound = vec![Vec::new(); num_locations];
            let mut inbound = vec![Vec::new(); num_locations];
            for (from, footpath) in profile_footpaths {
                outbound[from as usize].push(footpath);
                inbound[footpath.target as usize].push(Footpath { target: from, duration: footpath.duration });
            }
            footpaths_out.push(outbound);
            footpaths_in.push(inbound);
        }

        let mut equivalences = vec![Vec::new(); num_locations];
        for (a, b) in self.equivalences {
            equivalences[a as usize].push(b);
            equivalences[b as usize].push(a);
        }

        Network {
            first_day: self.first_day,
            num_days: self.num_days,
            locations,
            location_index,
            routes,
            route_stops,
            location_routes,
            transports,
            stop_times,
            footpaths_out,
            footpaths_in,
            equivalences,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Day 0 is Monday 2021-03-01.
    fn build() -> (Network, RouteIndex, RouteIndex) {
        let mut builder = NetworkBuilder::new(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(), 7, 2).unwrap();
        let s0 = builder.add_location("S0");
        let s1 = builder.add_location("S1");
        let s2 = builder.add_location("S2");
        builder.add_footpath(s0, s1, 15).unwrap();
        let r0 = builder.add_route("R0", &[s0, s1, s2]).unwrap();
        builder.add_transport(r0, "late", &[(600, 600), (660, 660), (700, 700)], traffic_days([1])).unwrap();
        builder.add_transport(r0, "early", &[(300, 300), (360, 360), (400, 400)], traffic_days([1, 2])).unwrap();
        let r1 = builder.add_route("R1", &[s2, s1]).unwrap();
        builder.add_transport(r1, "overnight", &[(1320, 1320), (1800, 1800)], traffic_days([0])).unwrap();
        (builder.build(), r0, r1)
    }

    #[test]
    fn indexes_routes_and_footpaths() {
        let (network, r0, r1) = build();
        let s1 = network.get_location_idx("S1").unwrap();
        assert_eq!(network.location_routes(s1), &[r0, r1]);
        assert_eq!(network.footpaths_in(0, s1), &[Footpath { target: 0, duration: 15 }]);
        assert_eq!(network.footpaths_out(0, 0), &[Footpath { target: s1, duration: 15 }]);
        // Transports are sorted by first departure.
        let first = network.route_transports(r0).start;
        assert_eq!(network.transport_name(first), "early");
        assert_eq!(network.transfer_time(s1), 2);
    }

    #[test]
    fn finds_earliest_transport() {
        let (network, r0, _) = build();
        let run = network.earliest_transport(r0, 0, 1, 301, 1).unwrap();
        assert_eq!(network.transport_name(run.transport), "late");
        assert_eq!(run.day, 1);
        // Nothing left on day 1 after 10:01, the early run of day 2 is next.
        let run = network.earliest_transport(r0, 0, 1, 601, 1).unwrap();
        assert_eq!(network.transport_name(run.transport), "early");
        assert_eq!(run.day, 2);
        assert_eq!(network.earliest_transport(r0, 0, 2, 301, 1), None);
    }

    #[test]
    fn finds_run_of_previous_service_day() {
        let (network, _, r1) = build();
        // Stop 1 of the overnight run is at 30:00 of Monday, i.e. Tuesday 06:00.
        let run = network.earliest_transport(r1, 1, 1, 120, 0).unwrap();
        assert_eq!(run.day, 0);
        assert_eq!(network.event_time(run, 1, EventType::Departure), network.to_unixtime(1, 360));
    }

    #[test]
    fn rejects_inconsistent_transports() {
        let mut builder = NetworkBuilder::new(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(), 7, 2).unwrap();
        let a = builder.add_location("A");
        let b = builder.add_location("B");
        let route = builder.add_route("R", &[a, b]).unwrap();
        assert!(matches!(
            builder.add_transport(route, "short", &[(0, 0)], traffic_days([0])),
            Err(NetworkError::StopTimeCount { expected: 2, found: 1, .. })
        ));
        assert_eq!(
            builder.add_transport(route, "back", &[(10, 10), (5, 5)], traffic_days([0])),
            Err(NetworkError::DecreasingTimes("back".to_owned()))
        );
        assert_eq!(builder.add_route("tiny", &[a]), Err(NetworkError::RouteTooShort("tiny".to_owned())));
    }

    #[test]
    fn converts_day_and_minutes() {
        let (network, _, _) = build();
        let time = NaiveDate::from_ymd_opt(2021, 3, 3).unwrap().and_hms_opt(7, 5, 0).unwrap();
        assert_eq!(network.day_idx_mam(time), Some((2, 425)));
        assert_eq!(network.to_unixtime(2, 425), time);
        let outside = NaiveDate::from_ymd_opt(2021, 2, 28).unwrap().and_hms_opt(7, 5, 0).unwrap();
        assert_eq!(network.day_idx_mam(outside), None);
    }
}

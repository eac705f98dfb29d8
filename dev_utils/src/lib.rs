use std::collections::HashSet;

use astar::network::{traffic_days, DayIndex, LocationIndex, Minutes, TrafficDays, UnixTime};
use astar::{utils, Network, NetworkBuilder, SegmentGraph};
use chrono::{Duration, NaiveDate, NaiveTime};

// Common example data for the tests, demos and benchmarks.

pub const NUM_DAYS: u16 = 7;

// Day 0 is a Monday.
pub fn get_example_date() -> NaiveDate {
    const { utils::const_unwrap(NaiveDate::from_ymd_opt(2021, 3, 1)) }
}

pub fn get_example_transfer_time() -> Minutes {
    2 // 2 minutes transfer time.
}

/// Absolute time of `hh_mm` on timetable day `day`.
pub fn at(day: DayIndex, hh_mm: &str) -> UnixTime {
    let minutes = utils::parse_time(hh_mm).unwrap();
    get_example_date().and_time(NaiveTime::MIN) + Duration::days(day as i64) + Duration::minutes(minutes as i64)
}

/// Minutes after midnight of the service day.
pub fn mam(hh_mm: &str) -> Minutes {
    utils::parse_time(hh_mm).unwrap()
}

pub fn every_day() -> TrafficDays {
    traffic_days(0..NUM_DAYS)
}

fn builder() -> NetworkBuilder {
    NetworkBuilder::new(get_example_date(), NUM_DAYS, get_example_transfer_time()).unwrap()
}

pub struct Scenario {
    pub network: Network,
    pub graph: SegmentGraph,
    pub start: LocationIndex,
    pub destination: LocationIndex,
    pub start_time: UnixTime,
}

impl Scenario {
    fn new(network: Network, start: &str, destination: &str, start_time: UnixTime) -> Self {
        let graph = SegmentGraph::build(&network, 0, 1);
        let start = network.get_location_idx(start).unwrap();
        let destination = network.get_location_idx(destination).unwrap();
        Self { network, graph, start, destination, start_time }
    }

    pub fn location(&self, name: &str) -> LocationIndex {
        self.network.get_location_idx(name).unwrap()
    }
}

/// S0 -> S1 departing 05:31, arriving 07:00 every day.
pub fn direct_run() -> Scenario {
    let mut builder = builder();
    let s0 = builder.add_location("S0");
    let s1 = builder.add_location("S1");
    let route = builder.add_route("R0", &[s0, s1]).unwrap();
    builder.add_transport(route, "T0", &[(mam("05:31"), mam("05:31")), (mam("07:00"), mam("07:00"))], every_day()).unwrap();
    Scenario::new(builder.build(), "S0", "S1", at(0, "05:00"))
}

/// One transport calling at four stops.
pub fn multi_hop_run() -> Scenario {
    let mut builder = builder();
    let stops: Vec<_> = ["S0", "S1", "S2", "S3"].iter().map(|name| builder.add_location(name)).collect();
    let route = builder.add_route("R0", &stops).unwrap();
    let times = [
        (mam("10:00"), mam("10:00")),
        (mam("10:10"), mam("10:11")),
        (mam("10:20"), mam("10:21")),
        (mam("10:30"), mam("10:30")),
    ];
    builder.add_transport(route, "T0", &times, every_day()).unwrap();
    Scenario::new(builder.build(), "S0", "S3", at(0, "09:00"))
}

/// S0 -> S1 arriving 06:00, then S1 -> S2 departing 12:00.
pub fn same_day_transfer() -> Scenario {
    let mut builder = builder();
    let s0 = builder.add_location("S0");
    let s1 = builder.add_location("S1");
    let s2 = builder.add_location("S2");
    let r0 = builder.add_route("R0", &[s0, s1]).unwrap();
    builder.add_transport(r0, "T0", &[(mam("05:00"), mam("05:00")), (mam("06:00"), mam("06:00"))], every_day()).unwrap();
    let r1 = builder.add_route("R1", &[s1, s2]).unwrap();
    builder.add_transport(r1, "T1", &[(mam("12:00"), mam("12:00")), (mam("13:00"), mam("13:00"))], every_day()).unwrap();
    Scenario::new(builder.build(), "S0", "S2", at(0, "04:00"))
}

/// Departure 23:00, arrival 01:00 the next day.
pub fn midnight_crossing() -> Scenario {
    let mut builder = builder();
    let s0 = builder.add_location("S0");
    let s1 = builder.add_location("S1");
    let route = builder.add_route("R0", &[s0, s1]).unwrap();
    builder.add_transport(route, "T0", &[(mam("23:00"), mam("23:00")), (mam("25:00"), mam("25:00"))], every_day()).unwrap();
    Scenario::new(builder.build(), "S0", "S1", at(0, "22:00"))
}

/// The Tuesday night run reaches S1 on Wednesday, where the only connection runs on Wednesdays.
pub fn next_day_transfer() -> Scenario {
    let mut builder = builder();
    let s0 = builder.add_location("S0");
    let s1 = builder.add_location("S1");
    let s2 = builder.add_location("S2");
    let r0 = builder.add_route("R0", &[s0, s1]).unwrap();
    builder.add_transport(r0, "T0", &[(mam("23:00"), mam("23:00")), (mam("25:00"), mam("25:00"))], traffic_days([1])).unwrap();
    let r1 = builder.add_route("R1", &[s1, s2]).unwrap();
    builder.add_transport(r1, "T1", &[(mam("02:00"), mam("02:00")), (mam("03:00"), mam("03:00"))], traffic_days([2])).unwrap();
    Scenario::new(builder.build(), "S0", "S2", at(1, "22:00"))
}

/// On Tuesday morning, connect to a run that started on Monday evening.
pub fn previous_day_transfer() -> Scenario {
    let mut builder = builder();
    let s0 = builder.add_location("S0");
    let s1 = builder.add_location("S1");
    let s2 = builder.add_location("S2");
    let s3 = builder.add_location("S3");
    let r0 = builder.add_route("R0", &[s0, s1]).unwrap();
    builder.add_transport(r0, "T0", &[(mam("05:00"), mam("05:00")), (mam("06:00"), mam("06:00"))], traffic_days([1])).unwrap();
    let r1 = builder.add_route("R1", &[s2, s1, s3]).unwrap();
    let times = [(mam("22:00"), mam("22:00")), (mam("30:00"), mam("30:05")), (mam("31:00"), mam("31:00"))];
    builder.add_transport(r1, "T1", &times, traffic_days([0])).unwrap();
    Scenario::new(builder.build(), "S0", "S3", at(1, "04:00"))
}

/// D is reached directly at 05:45, or via A at 05:30 plus a 20 minute walk.
pub fn two_destination_segments() -> Scenario {
    let mut builder = builder();
    let s0 = builder.add_location("S0");
    let a = builder.add_location("A");
    let d = builder.add_location("D");
    builder.add_footpath(a, d, 20).unwrap();
    let r0 = builder.add_route("R0", &[s0, a]).unwrap();
    builder.add_transport(r0, "T0", &[(mam("05:00"), mam("05:00")), (mam("05:30"), mam("05:30"))], every_day()).unwrap();
    let r1 = builder.add_route("R1", &[s0, d]).unwrap();
    builder.add_transport(r1, "T1", &[(mam("05:00"), mam("05:00")), (mam("05:45"), mam("05:45"))], every_day()).unwrap();
    Scenario::new(builder.build(), "S0", "D", at(0, "04:00"))
}

/// Walk 15 minutes from S0 to S1, ride to S3 and walk 10 minutes to S2.
pub fn start_and_end_footpaths() -> Scenario {
    let mut builder = builder();
    let s0 = builder.add_location("S0");
    let s1 = builder.add_location("S1");
    let s2 = builder.add_location("S2");
    let s3 = builder.add_location("S3");
    builder.add_footpath(s0, s1, 15).unwrap();
    builder.add_footpath(s3, s2, 10).unwrap();
    let route = builder.add_route("R0", &[s1, s3]).unwrap();
    builder.add_transport(route, "T0", &[(mam("06:00"), mam("06:00")), (mam("07:00"), mam("07:00"))], every_day()).unwrap();
    Scenario::new(builder.build(), "S0", "S2", at(0, "05:30"))
}

/// A slow direct run, and a faster connection with one transfer at X.
pub fn direct_or_transfer() -> Scenario {
    let mut builder = builder();
    let s0 = builder.add_location("S0");
    let x = builder.add_location("X");
    let d = builder.add_location("D");
    let r0 = builder.add_route("R0", &[s0, d]).unwrap();
    builder.add_transport(r0, "SLOW", &[(mam("05:00"), mam("05:00")), (mam("06:00"), mam("06:00"))], every_day()).unwrap();
    let r1 = builder.add_route("R1", &[s0, x]).unwrap();
    builder.add_transport(r1, "FEEDER", &[(mam("05:00"), mam("05:00")), (mam("05:10"), mam("05:10"))], every_day()).unwrap();
    let r2 = builder.add_route("R2", &[x, d]).unwrap();
    builder.add_transport(r2, "EXPRESS", &[(mam("05:15"), mam("05:15")), (mam("05:30"), mam("05:30"))], every_day()).unwrap();
    Scenario::new(builder.build(), "S0", "D", at(0, "05:00"))
}

/// Hourly runs S0 -> S1 from 06:00 to 09:00.
pub fn hourly_runs() -> Scenario {
    let mut builder = builder();
    let s0 = builder.add_location("S0");
    let s1 = builder.add_location("S1");
    let route = builder.add_route("R0", &[s0, s1]).unwrap();
    for hour in 6..=9 {
        let departure = hour * 60;
        builder
            .add_transport(route, &format!("T{hour}"), &[(departure, departure), (departure + 50, departure + 50)], every_day())
            .unwrap();
    }
    Scenario::new(builder.build(), "S0", "S1", at(0, "05:30"))
}

/// Random network for benchmarks and property tests. Identical seeds give identical networks.
pub fn generate_network(seed: u64, num_locations: usize, num_routes: usize, transports_per_route: usize) -> Network {
    assert!(num_locations >= 3);
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut builder = builder();
    let locations: Vec<_> = (0..num_locations).map(|i| builder.add_location(&format!("L{i}"))).collect();

    let mut footpaths = HashSet::new();
    for _ in 0..num_locations {
        let from = rng.usize(..num_locations);
        let to = rng.usize(..num_locations);
        if from == to || !footpaths.insert((from.min(to), from.max(to))) {
            continue;
        }
        let duration = rng.u16(3..15);
        builder.add_footpath(locations[from], locations[to], duration).unwrap();
        builder.add_footpath(locations[to], locations[from], duration).unwrap();
    }

    for r in 0..num_routes {
        let mut stops = locations.clone();
        rng.shuffle(&mut stops);
        stops.truncate(rng.usize(3..=num_locations.min(8)));
        let route = builder.add_route(&format!("R{r}"), &stops).unwrap();

        let hops: Vec<Minutes> = (1..stops.len()).map(|_| rng.u16(2..15)).collect();
        for t in 0..transports_per_route {
            let mut time = rng.u16(300..1200);
            let mut times = vec![(time, time)];
            for hop in &hops {
                let arrival = time + hop;
                time = arrival + rng.u16(0..2);
                times.push((arrival, time));
            }
            let last = times.len() - 1;
            times[last].1 = times[last].0;
            let days = traffic_days((0..NUM_DAYS).filter(|_| rng.u8(..10) < 8).chain([0]));
            builder.add_transport(route, &format!("R{r}T{t}"), &times, days).unwrap();
        }
    }
    builder.build()
}

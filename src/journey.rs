use std::fmt::Display;

use crate::multicriteria::Dominates;
use crate::network::{LocationIndex, Minutes, SegmentIndex, StopIndex, TransportRun, UnixTime};
use crate::{utils, Network};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegKind {
    Ride {
        run: TransportRun,
        from_stop: StopIndex,
        to_stop: StopIndex,
    },
    Footpath {
        duration: Minutes,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Leg {
    pub from: LocationIndex,
    pub to: LocationIndex,
    pub departure: UnixTime,
    pub arrival: UnixTime,
    pub kind: LegKind,
}

impl Leg {
    pub fn is_ride(&self) -> bool { matches!(self.kind, LegKind::Ride { .. }) }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconstructionError {
    #[error("No settled destination segment arrives at {dest_time} with {transfers} transfers.")]
    NoDestinationSegment { dest_time: UnixTime, transfers: u8 },
    #[error("Segment {0} has no label.")]
    Unreached(SegmentIndex),
    #[error("No footpath from location {from} to location {to}.")]
    MissingFootpath { from: LocationIndex, to: LocationIndex },
    #[error("No start location reaches location {0} in time.")]
    MissingStartFootpath(LocationIndex),
    #[error("Infinite loop in journey reconstruction.")]
    PredecessorCycle,
    #[error("Journeys to intermodal destinations cannot be reconstructed.")]
    Intermodal,
}

/// A journey found by the search. `legs` stays empty until the journey is reconstructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Journey {
    pub legs: Vec<Leg>,
    pub start_time: UnixTime,
    pub dest_time: UnixTime,
    pub dest: Option<LocationIndex>,
    pub transfers: u8,
}

impl Journey {
    pub fn new(start_time: UnixTime, dest_time: UnixTime, transfers: u8) -> Self {
        Self { legs: Vec::new(), start_time, dest_time, dest: None, transfers }
    }

    /// Minutes from the query's start time to the arrival at the destination.
    pub fn travel_time(&self) -> i64 { (self.dest_time - self.start_time).num_minutes() }

    pub fn num_rides(&self) -> usize { self.legs.iter().filter(|leg| leg.is_ride()).count() }

    pub fn display<'a>(&'a self, network: &'a Network) -> JourneyDisplay<'a> {
        JourneyDisplay { journey: self, network }
    }
}

// Later departure, earlier arrival and fewer transfers are better.
impl Dominates for Journey {
    fn dominates(&self, other: &Self) -> bool {
        self.start_time >= other.start_time && self.dest_time <= other.dest_time && self.transfers <= other.transfers
    }
}

pub struct JourneyDisplay<'a> {
    journey: &'a Journey,
    network: &'a Network,
}

impl Display for JourneyDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let network = self.network;
        write!(f, "-----------------------------------------------")?;
        if !self.journey.legs.is_empty() {
            for leg in self.journey.legs.iter() {
                writeln!(f)?;
                match leg.kind {
                    LegKind::Ride { run, .. } => {
                        writeln!(f,
                                 "Board at {} at {} ({}).",
                                 network.location_name(leg.from),
                                 utils::get_datetime_str(leg.departure),
                                 network.transport_name(run.transport),
                        )?;
                        write!(f,
                               "Arrive at {} at {}.",
                               network.location_name(leg.to),
                               utils::get_datetime_str(leg.arrival),
                        )?;
                    }
                    LegKind::Footpath { duration } if leg.from == leg.to => {
                        write!(f, "Transfer at {} ({} minutes).", network.location_name(leg.from), duration)?;
                    }
                    LegKind::Footpath { duration } => {
                        write!(f,
                               "Walk from {} to {} ({} minutes).",
                               network.location_name(leg.from),
                               network.location_name(leg.to),
                               duration,
                        )?;
                    }
                }
            }
            writeln!(f)?;
        } else {
            writeln!(f)?;
            writeln!(f, "Journey not reconstructed.")?;
        }
        writeln!(f)?;
        writeln!(f,
                 "Total journey time: {} minutes, {} transfers.",
                 self.journey.travel_time(),
                 self.journey.transfers,
        )?;
        writeln!(f, "-----------------------------------------------")?;
        Ok(())
    }
}

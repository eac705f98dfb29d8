pub mod network;

pub use network::{Network, NetworkBuilder};

pub mod delta;

pub use delta::{Delta, TimeFrame};

pub mod dial;
pub mod segments;

pub use segments::SegmentGraph;

pub mod config;

pub use config::{ResultRetention, SearchSettings};

pub mod state;

pub use state::SearchState;

pub mod observer;
pub mod astar;

pub use astar::{AStar, AStarStats, Destination};

pub mod journey;

pub use journey::{Journey, Leg, LegKind};

pub mod query;

pub use query::{LocationMatchMode, Offset, Query, StartLocation, StartTime};

pub mod search;

pub use search::{astar_query, QueryResult, SearchError};

pub mod multicriteria;

pub use multicriteria::ParetoSet;

pub mod utils;

//! Exploration machinery over the ARG

pub mod coverage;
pub mod explorer;
pub mod export;
pub mod reached;
pub mod waitlist;

pub use coverage::CoverageIndex;
pub use explorer::{ExplorationLimits, ExplorationResult, ExplorationStats, Explorer};
pub use export::{to_dot, ArgNodeSnapshot, ArgSnapshot};
pub use reached::ReachedSet;
pub use waitlist::Waitlist;

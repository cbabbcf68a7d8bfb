//! Analysis orchestration

pub mod cegar_driver;
pub mod statistics;
pub mod task;
pub mod verdict;

pub use cegar_driver::{CegarDriver, VerificationOutcome};
pub use statistics::CegarStatistics;
pub use task::VerificationTask;
pub use verdict::{Resource, UnknownReason, Verdict, Witness, WitnessStep};

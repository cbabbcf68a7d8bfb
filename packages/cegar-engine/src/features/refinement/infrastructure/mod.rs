pub mod candidates;
pub mod interpolation;
pub mod refiner;

pub use candidates::{Candidate, CandidateGenerator};
pub use interpolation::{Interpolant, SequenceInterpolator};
pub use refiner::{RefinementResult, Refiner};

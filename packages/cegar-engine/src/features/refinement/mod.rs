//! Counterexample-guided precision refinement
//!
//! ## Architecture
//! ```text
//! refinement/
//! ├── domain/
//! │   └── precision.rs      # Predicate, Precision (monotone)
//! └── infrastructure/
//!     ├── candidates.rs     # template predicates along a path
//!     ├── interpolation.rs  # inductive sequence interpolants
//!     └── refiner.rs        # strategy, scope, restart, stall detection
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::{Precision, Predicate};
pub use infrastructure::{Interpolant, RefinementResult, Refiner, SequenceInterpolator};

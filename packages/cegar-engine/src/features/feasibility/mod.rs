//! Concrete checks of abstract counterexamples
//!
//! ## Architecture
//! ```text
//! feasibility/
//! ├── domain/          # Counterexample, Feasibility
//! └── infrastructure/  # FeasibilityChecker (path formula + witness replay)
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::{Counterexample, CounterexampleStep, Feasibility, InfeasibleCounterexample};
pub use infrastructure::FeasibilityChecker;

//! Path formulas over SSA-indexed bit-vector symbols
//!
//! ## Architecture
//! ```text
//! path_formula/
//! ├── domain/
//! │   ├── term.rs          # QF_BV terms
//! │   ├── ssa.rs           # SSA maps and symbols
//! │   └── path_formula.rs  # block formulas, encoded paths
//! └── infrastructure/
//!     ├── encoder.rs       # CFA edge -> term
//!     └── evaluator.rs     # term evaluation under a model
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::*;

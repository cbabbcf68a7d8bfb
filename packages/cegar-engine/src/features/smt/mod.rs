//! Satisfiability checking for bit-vector path formulas
//!
//! ## Architecture
//! ```text
//! smt/
//! ├── domain/          # Model, SolverResult
//! ├── ports/           # DecisionProcedure trait, QueryLimits
//! └── infrastructure/
//!     ├── bitblast/    # Tseitin circuit + CDCL SAT core
//!     ├── z3_backend.rs
//!     └── instrumented.rs
//! ```

pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use domain::{Model, ModelValue, SolverResult, UnknownCause};
pub use infrastructure::{
    create_decision_procedure, BitBlastSolver, Decided, InstrumentedSolver, SolverStats,
};
pub use ports::{DecisionProcedure, QueryLimits};

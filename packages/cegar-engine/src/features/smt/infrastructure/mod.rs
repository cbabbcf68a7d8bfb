//! Decision procedure backends
//!
//! - [`bitblast::BitBlastSolver`]: in-house bit-blasting + CDCL (default)
//! - [`z3_backend::Z3Backend`]: Z3 (optional, `--features z3`)
//! - [`instrumented::InstrumentedSolver`]: retries and query counters on
//!   top of either backend

pub mod bitblast;
pub mod instrumented;

#[cfg(feature = "z3")]
pub mod z3_backend;

pub use bitblast::BitBlastSolver;
pub use instrumented::{Decided, InstrumentedSolver, SolverStats};

#[cfg(feature = "z3")]
pub use z3_backend::Z3Backend;

use crate::config::{ConfigError, ConfigResult, SolverBackend};
use crate::features::smt::ports::DecisionProcedure;
use std::sync::Arc;

/// Instantiate the configured backend
pub fn create_decision_procedure(backend: SolverBackend) -> ConfigResult<Arc<dyn DecisionProcedure>> {
    match backend {
        SolverBackend::BitBlast => Ok(Arc::new(BitBlastSolver::new())),
        #[cfg(feature = "z3")]
        SolverBackend::Z3 => Ok(Arc::new(Z3Backend::new())),
        #[cfg(not(feature = "z3"))]
        SolverBackend::Z3 => Err(ConfigError::Validation(
            "solver backend 'z3' requires building with --features z3".to_string(),
        )),
    }
}

//! Decision procedure port
//!
//! The engine only ever asks one question: is this conjunction of
//! quantifier-free bit-vector terms satisfiable? Backends are swappable
//! behind this trait.

use crate::features::path_formula::domain::Term;
use crate::features::smt::domain::SolverResult;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-query resource limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub timeout: Option<Duration>,
    pub conflict_limit: Option<u64>,
}

impl QueryLimits {
    pub const UNLIMITED: QueryLimits = QueryLimits {
        timeout: None,
        conflict_limit: None,
    };

    /// Limits multiplied by `2^attempt` for a retry
    pub fn scaled(&self, attempt: u32) -> QueryLimits {
        let factor = 1u32 << attempt.min(16);
        QueryLimits {
            timeout: self.timeout.map(|t| t * factor),
            conflict_limit: self
                .conflict_limit
                .map(|c| c.saturating_mul(u64::from(factor))),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|t| Instant::now() + t)
    }
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self::UNLIMITED
    }
}

pub trait DecisionProcedure: Send + Sync {
    /// Name of this backend
    fn name(&self) -> &'static str;

    /// Decide the conjunction of `conjuncts`
    ///
    /// On `Unsat` the returned indices point into `conjuncts`.
    fn check(&self, conjuncts: &[Arc<Term>], limits: &QueryLimits) -> SolverResult;
}

//! Query accounting and bounded retries around a decision procedure
//!
//! Every query of the engine goes through [`InstrumentedSolver`]. An
//! `unknown` answer is retried with doubled limits until the retry budget
//! is spent; after that the query surfaces as a solver failure, never as
//! a guess about feasibility.

use crate::errors::{EngineError, Result};
use crate::features::path_formula::domain::Term;
use crate::features::smt::domain::{Model, SolverResult};
use crate::features::smt::ports::{DecisionProcedure, QueryLimits};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Decided answer of a query
#[derive(Debug, Clone, PartialEq)]
pub enum Decided {
    Sat(Model),
    Unsat(Vec<usize>),
}

impl Decided {
    pub fn is_sat(&self) -> bool {
        matches!(self, Decided::Sat(_))
    }
}

/// Snapshot of solver counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverStats {
    pub queries: u64,
    pub sat: u64,
    pub unsat: u64,
    pub unknown: u64,
    pub retries: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queries: AtomicU64,
    sat: AtomicU64,
    unsat: AtomicU64,
    unknown: AtomicU64,
    retries: AtomicU64,
}

pub struct InstrumentedSolver {
    inner: Arc<dyn DecisionProcedure>,
    limits: QueryLimits,
    retries: u32,
    counters: Counters,
}

impl std::fmt::Debug for InstrumentedSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedSolver")
            .field("backend", &self.inner.name())
            .field("limits", &self.limits)
            .field("retries", &self.retries)
            .finish()
    }
}

impl InstrumentedSolver {
    pub fn new(inner: Arc<dyn DecisionProcedure>, limits: QueryLimits, retries: u32) -> Self {
        Self {
            inner,
            limits,
            retries,
            counters: Counters::default(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.name()
    }

    /// Decide `conjuncts`; `context` names the query in errors and logs
    pub fn decide(&self, conjuncts: &[Arc<Term>], context: &str) -> Result<Decided> {
        let mut last_cause = None;
        for attempt in 0..=self.retries {
            if attempt > 0 {
                self.counters.retries.fetch_add(1, Ordering::Relaxed);
                debug!(context, attempt, "retrying undecided query");
            }
            self.counters.queries.fetch_add(1, Ordering::Relaxed);
            match self.inner.check(conjuncts, &self.limits.scaled(attempt)) {
                SolverResult::Sat(model) => {
                    self.counters.sat.fetch_add(1, Ordering::Relaxed);
                    return Ok(Decided::Sat(model));
                }
                SolverResult::Unsat(core) => {
                    self.counters.unsat.fetch_add(1, Ordering::Relaxed);
                    return Ok(Decided::Unsat(core));
                }
                SolverResult::Unknown(cause) => {
                    self.counters.unknown.fetch_add(1, Ordering::Relaxed);
                    last_cause = Some(cause);
                }
            }
        }
        let detail = last_cause.map(|c| c.to_string()).unwrap_or_default();
        warn!(
            context,
            backend = self.inner.name(),
            retries = self.retries,
            %detail,
            "decision procedure gave up"
        );
        Err(EngineError::solver_failure(context, detail))
    }

    /// Satisfiability only
    pub fn is_sat(&self, conjuncts: &[Arc<Term>], context: &str) -> Result<bool> {
        Ok(self.decide(conjuncts, context)?.is_sat())
    }

    pub fn stats(&self) -> SolverStats {
        SolverStats {
            queries: self.counters.queries.load(Ordering::Relaxed),
            sat: self.counters.sat.load(Ordering::Relaxed),
            unsat: self.counters.unsat.load(Ordering::Relaxed),
            unknown: self.counters.unknown.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::smt::domain::UnknownCause;
    use std::sync::atomic::AtomicU32;

    /// Answers unknown for the first `fail` calls, then unsat
    struct Flaky {
        fail: u32,
        calls: AtomicU32,
        seen_limits: parking_lot::Mutex<Vec<QueryLimits>>,
    }

    impl DecisionProcedure for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn check(&self, _conjuncts: &[Arc<Term>], limits: &QueryLimits) -> SolverResult {
            self.seen_limits.lock().push(*limits);
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail {
                SolverResult::Unknown(UnknownCause::ConflictLimit(10))
            } else {
                SolverResult::Unsat(vec![0])
            }
        }
    }

    fn flaky(fail: u32) -> Arc<Flaky> {
        Arc::new(Flaky {
            fail,
            calls: AtomicU32::new(0),
            seen_limits: parking_lot::Mutex::new(Vec::new()),
        })
    }

    fn limits() -> QueryLimits {
        QueryLimits {
            timeout: None,
            conflict_limit: Some(10),
        }
    }

    #[test]
    fn test_retry_doubles_budget_until_decided() {
        let backend = flaky(2);
        let solver = InstrumentedSolver::new(backend.clone(), limits(), 3);
        let answer = solver.decide(&[Arc::new(Term::Bool(false))], "test").unwrap();
        assert_eq!(answer, Decided::Unsat(vec![0]));

        let seen: Vec<Option<u64>> = backend
            .seen_limits
            .lock()
            .iter()
            .map(|l| l.conflict_limit)
            .collect();
        assert_eq!(seen, vec![Some(10), Some(20), Some(40)]);

        let stats = solver.stats();
        assert_eq!(stats.queries, 3);
        assert_eq!(stats.unknown, 2);
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.unsat, 1);
    }

    #[test]
    fn test_exhausted_retries_are_a_solver_failure() {
        let solver = InstrumentedSolver::new(flaky(5), limits(), 1);
        let err = solver
            .decide(&[Arc::new(Term::Bool(true))], "feasibility")
            .unwrap_err();
        assert!(err.is_inconclusive());
        assert!(err.to_string().contains("feasibility"));
        assert_eq!(solver.stats().queries, 2);
    }
}

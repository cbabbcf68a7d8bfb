//! Decision procedure answers

use super::model::Model;
use std::fmt;

/// Why a query could not be decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownCause {
    Timeout,
    ConflictLimit(u64),
    Unsupported(String),
    Backend(String),
}

impl fmt::Display for UnknownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownCause::Timeout => f.write_str("timeout"),
            UnknownCause::ConflictLimit(n) => write!(f, "conflict limit {} reached", n),
            UnknownCause::Unsupported(what) => write!(f, "unsupported: {}", what),
            UnknownCause::Backend(msg) => write!(f, "backend error: {}", msg),
        }
    }
}

/// Result of checking a conjunction of terms
#[derive(Debug, Clone, PartialEq)]
pub enum SolverResult {
    /// Satisfiable, with a model over the query's symbols
    Sat(Model),

    /// Unsatisfiable; the indices of a conjunct subset that is already
    /// unsatisfiable on its own
    Unsat(Vec<usize>),

    Unknown(UnknownCause),
}

impl SolverResult {
    pub fn is_sat(&self) -> bool {
        matches!(self, SolverResult::Sat(_))
    }

    pub fn is_unsat(&self) -> bool {
        matches!(self, SolverResult::Unsat(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, SolverResult::Unknown(_))
    }
}

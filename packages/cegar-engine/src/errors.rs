//! Error types for cegar-engine
//!
//! Provides unified error handling across the crate. Two failure families
//! are kept apart:
//! - [`ModelingError`] and [`EngineError::RefinementStall`] are hard errors
//!   returned to the caller.
//! - [`EngineError::SolverFailure`] and [`EngineError::ResourceExhausted`]
//!   are raised inside the engine and converted by the driver into an
//!   `UNKNOWN` verdict.

use crate::config::ConfigError;
use crate::features::range::RangeError;
use crate::pipeline::verdict::Resource;
use thiserror::Error;

/// The input program or property automaton cannot be analysed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelingError {
    /// A variable is read while its SSA index is still 0
    #[error("variable '{variable}' is used before definition ({edge})")]
    UseBeforeDef { variable: String, edge: String },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("call to '{callee}' passes {found} argument(s), expected {expected}")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("recursive call to '{0}' is not supported")]
    Recursion(String),

    #[error("malformed control-flow automaton: {0}")]
    MalformedCfa(String),

    #[error("malformed automaton '{automaton}': {reason}")]
    MalformedAutomaton { automaton: String, reason: String },

    #[error("unsupported construct: {0}")]
    Unsupported(String),
}

impl ModelingError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ModelingError::MalformedCfa(msg.into())
    }

    pub fn use_before_def(variable: impl Into<String>, edge: impl Into<String>) -> Self {
        ModelingError::UseBeforeDef {
            variable: variable.into(),
            edge: edge.into(),
        }
    }
}

/// Main error type for cegar-engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("modeling error: {0}")]
    Modeling(#[from] ModelingError),

    /// Refinement could not rule out a spurious counterexample
    #[error("refinement stalled: {reason}")]
    RefinementStall { reason: String },

    /// The decision procedure answered `unknown` after all retries
    #[error("solver failure during {context}: {detail}")]
    SolverFailure { context: String, detail: String },

    #[error("resource exhausted: {resource} (limit {limit})")]
    ResourceExhausted { resource: Resource, limit: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("range error: {0}")]
    Range(#[from] RangeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn stall(reason: impl Into<String>) -> Self {
        EngineError::RefinementStall {
            reason: reason.into(),
        }
    }

    pub fn solver_failure(context: impl Into<String>, detail: impl Into<String>) -> Self {
        EngineError::SolverFailure {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn exhausted(resource: Resource, limit: impl ToString) -> Self {
        EngineError::ResourceExhausted {
            resource,
            limit: limit.to_string(),
        }
    }

    /// Errors the driver turns into an `UNKNOWN` verdict
    pub fn is_inconclusive(&self) -> bool {
        matches!(
            self,
            EngineError::SolverFailure { .. } | EngineError::ResourceExhausted { .. }
        )
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

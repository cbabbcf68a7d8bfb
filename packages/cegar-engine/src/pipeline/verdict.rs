//! Analysis verdicts
//!
//! ```text
//! Verdict
//! ├── Safe
//! ├── Unsafe(Witness)         path + model, optionally replay-validated
//! └── Unknown(UnknownReason)
//!     ├── SolverFailure       decision procedure gave up
//!     └── ResourceExhaustion  budget hit (time, ARG size, refinements, ...)
//! ```
//!
//! A verdict of `Safe` is only ever produced when the frontier is empty
//! under a sound abstraction; every uncertainty ends in `Unknown`.

use crate::errors::EngineError;
use crate::features::path_formula::domain::SsaSymbol;
use crate::features::smt::domain::Model;
use crate::shared::models::{Cfa, CfaNodeId, EdgeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Budgets whose exhaustion ends an analysis with `UNKNOWN`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Time,
    ArgNodes,
    Refinements,
    Predicates,
    CallDepth,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Time => "analysis time",
            Resource::ArgNodes => "ARG nodes",
            Resource::Refinements => "refinements",
            Resource::Predicates => "tracked predicates",
            Resource::CallDepth => "call depth",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnknownReason {
    SolverFailure { context: String, detail: String },
    ResourceExhaustion { resource: Resource, limit: String },
}

impl UnknownReason {
    /// The reason behind an inconclusive engine error
    pub fn from_error(error: &EngineError) -> Option<Self> {
        match error {
            EngineError::SolverFailure { context, detail } => Some(UnknownReason::SolverFailure {
                context: context.clone(),
                detail: detail.clone(),
            }),
            EngineError::ResourceExhausted { resource, limit } => {
                Some(UnknownReason::ResourceExhaustion {
                    resource: *resource,
                    limit: limit.clone(),
                })
            }
            _ => None,
        }
    }

    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, UnknownReason::ResourceExhaustion { .. })
    }
}

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownReason::SolverFailure { context, detail } => {
                write!(f, "solver failure during {}: {}", context, detail)
            }
            UnknownReason::ResourceExhaustion { resource, limit } => {
                write!(f, "{} exhausted (limit {})", resource, limit)
            }
        }
    }
}

/// One edge of a counterexample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessStep {
    pub edge: EdgeId,
    pub source: CfaNodeId,
    pub target: CfaNodeId,
    pub operation: String,
}

/// Concrete counterexample: the path to the violation and a model of its
/// path formula
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub steps: Vec<WitnessStep>,
    pub model: Model,
    /// `Some(true)` when replaying the path on the model's inputs reached
    /// the violation with the same values
    pub validated: Option<bool>,
}

impl Witness {
    pub fn new(cfa: &Cfa, edges: &[EdgeId], model: Model) -> Self {
        let steps = edges
            .iter()
            .map(|id| {
                let edge = cfa.edge(*id);
                WitnessStep {
                    edge: *id,
                    source: edge.source,
                    target: edge.target,
                    operation: edge.kind.to_string(),
                }
            })
            .collect();
        Self {
            steps,
            model,
            validated: None,
        }
    }

    pub fn edges(&self) -> Vec<EdgeId> {
        self.steps.iter().map(|s| s.edge).collect()
    }

    /// First version of every program variable, i.e. the path's inputs
    pub fn inputs(&self) -> BTreeMap<String, u64> {
        first_versions(self.model.iter().map(|(s, v)| (s, v.bits)))
    }
}

/// `name -> value` of the lowest SSA version per variable, skipping return
/// slots and solver temporaries
pub fn first_versions<'a>(
    entries: impl IntoIterator<Item = (&'a SsaSymbol, u64)>,
) -> BTreeMap<String, u64> {
    let mut out: BTreeMap<String, (u32, u64)> = BTreeMap::new();
    for (symbol, bits) in entries {
        if is_internal(&symbol.name) {
            continue;
        }
        let slot = out.entry(symbol.name.clone()).or_insert((symbol.index, bits));
        if symbol.index < slot.0 {
            *slot = (symbol.index, bits);
        }
    }
    out.into_iter().map(|(k, (_, v))| (k, v)).collect()
}

fn is_internal(name: &str) -> bool {
    let base = name.rsplit("::").next().unwrap_or(name);
    base == crate::shared::models::RETVAL
        || base.starts_with("__nondet")
        || base.starts_with("__tmp")
}

/// Outcome of one analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Safe,
    Unsafe { witness: Box<Witness> },
    Unknown { reason: UnknownReason },
}

impl Verdict {
    pub fn unsafe_with(witness: Witness) -> Self {
        Verdict::Unsafe {
            witness: Box::new(witness),
        }
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Verdict::Safe)
    }

    pub fn is_unsafe(&self) -> bool {
        matches!(self, Verdict::Unsafe { .. })
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Verdict::Unknown { .. })
    }

    pub fn witness(&self) -> Option<&Witness> {
        match self {
            Verdict::Unsafe { witness } => Some(witness),
            _ => None,
        }
    }

    /// Process exit code used by the command line tool
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Safe => 0,
            Verdict::Unsafe { .. } => 1,
            Verdict::Unknown { .. } => 2,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Safe => f.write_str("SAFE"),
            Verdict::Unsafe { witness } => {
                write!(f, "UNSAFE ({} steps, model {})", witness.steps.len(), witness.model)
            }
            Verdict::Unknown { reason } => write!(f, "UNKNOWN ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_versions_skip_internal_symbols() {
        let mut model = Model::new();
        model.insert(SsaSymbol::new("main::a", 2), 7, 32);
        model.insert(SsaSymbol::new("main::a", 1), 3, 32);
        model.insert(SsaSymbol::new("main::b", 1), 9, 32);
        model.insert(SsaSymbol::new("__nondet", 1), 4, 32);
        model.insert(SsaSymbol::new("f::__retval__", 1), 5, 32);
        let witness = Witness {
            steps: Vec::new(),
            model,
            validated: None,
        };
        let inputs: Vec<_> = witness.inputs().into_iter().collect();
        assert_eq!(
            inputs,
            vec![("main::a".to_string(), 3), ("main::b".to_string(), 9)]
        );
    }

    #[test]
    fn test_unknown_reason_from_errors() {
        let exhausted = EngineError::exhausted(Resource::ArgNodes, 10);
        assert_eq!(
            UnknownReason::from_error(&exhausted),
            Some(UnknownReason::ResourceExhaustion {
                resource: Resource::ArgNodes,
                limit: "10".to_string()
            })
        );
        assert_eq!(UnknownReason::from_error(&EngineError::stall("loop")), None);
    }

    #[test]
    fn test_verdict_exit_codes_and_json() {
        let unknown = Verdict::Unknown {
            reason: UnknownReason::SolverFailure {
                context: "feasibility".into(),
                detail: "timeout".into(),
            },
        };
        assert_eq!(Verdict::Safe.exit_code(), 0);
        assert_eq!(unknown.exit_code(), 2);
        let json = serde_json::to_string(&unknown).unwrap();
        assert!(json.contains("\"verdict\":\"UNKNOWN\""));
        let back: Verdict = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unknown);
    }
}

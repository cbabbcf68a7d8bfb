//! Abstract counterexamples
//!
//! The ARG path from the root to a target node. Step `i` is the edge
//! leading into `nodes[i + 1]`; the encoded path has one conjunct per step.

use crate::features::arg::domain::{Arg, ArgNodeId};
use crate::features::path_formula::domain::EncodedPath;
use crate::features::refinement::domain::Precision;
use crate::features::smt::domain::Model;
use crate::shared::models::{Cfa, CfaEdge, CfaNodeId, EdgeId, Expr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterexampleStep {
    pub edge: EdgeId,
    pub assumptions: Vec<(Expr, bool)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterexample {
    pub target: ArgNodeId,
    pub nodes: Vec<ArgNodeId>,
    pub steps: Vec<CounterexampleStep>,
}

impl Counterexample {
    pub fn from_arg(arg: &Arg, target: ArgNodeId) -> Self {
        let nodes = arg.path_to(target);
        let steps = arg
            .edges_to(target)
            .into_iter()
            .map(|e| CounterexampleStep {
                edge: e.edge,
                assumptions: e.assumptions.clone(),
            })
            .collect();
        Self {
            target,
            nodes,
            steps,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn edges(&self) -> Vec<EdgeId> {
        self.steps.iter().map(|s| s.edge).collect()
    }

    /// (edge, assumptions) pairs for the encoder and the executor
    pub fn cfa_steps<'a>(
        &'a self,
        cfa: &'a Cfa,
    ) -> impl Iterator<Item = (&'a CfaEdge, &'a [(Expr, bool)])> + 'a {
        self.steps
            .iter()
            .map(move |s| (cfa.edge(s.edge), s.assumptions.as_slice()))
    }

    /// CFA location of the node reached after `steps` steps
    pub fn location_at(&self, cfa: &Cfa, steps: usize) -> CfaNodeId {
        match steps.checked_sub(1).and_then(|i| self.steps.get(i)) {
            Some(step) => cfa.edge(step.edge).target,
            None => cfa.start(),
        }
    }

    /// Digest of the path together with a precision; equal fingerprints
    /// mean refinement made no progress on this path
    pub fn fingerprint(&self, precision: &Precision) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for step in &self.steps {
            hasher.update(&step.edge.0.to_le_bytes());
            for (expr, truth) in &step.assumptions {
                hasher.update(format!("{}={}", expr, truth).as_bytes());
            }
            hasher.update(b";");
        }
        hasher.update(b"|");
        precision.hash_into(&mut hasher);
        hasher.finalize()
    }
}

/// Result of checking a counterexample concretely
#[derive(Debug, Clone)]
pub enum Feasibility {
    /// Real violation, with a model of the path formula
    Feasible { model: Model },
    /// Spurious counterexample, handed to refinement
    Infeasible(InfeasibleCounterexample),
}

#[derive(Debug, Clone)]
pub struct InfeasibleCounterexample {
    pub counterexample: Counterexample,
    pub encoded: EncodedPath,
    /// Indices of conjuncts (steps) in an unsatisfiable core
    pub core: Vec<usize>,
}

//! Feasibility of abstract counterexamples
//!
//! The full path formula of the counterexample goes to the decision
//! procedure. `sat` means the violation is real; `unsat` means the path is
//! spurious and the core is kept for refinement. An undecided query is a
//! solver failure (propagated as an error), never a guess.

use crate::errors::Result;
use crate::features::execution::{ConcreteExecutor, ExecutionOutcome};
use crate::features::feasibility::domain::{Counterexample, Feasibility, InfeasibleCounterexample};
use crate::features::path_formula::domain::EncodedPath;
use crate::features::path_formula::infrastructure::PathFormulaEncoder;
use crate::features::smt::domain::Model;
use crate::features::smt::{Decided, InstrumentedSolver};
use crate::shared::models::Cfa;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FeasibilityChecker {
    cfa: Arc<Cfa>,
    solver: Arc<InstrumentedSolver>,
    encoder: PathFormulaEncoder,
}

impl FeasibilityChecker {
    pub fn new(cfa: Arc<Cfa>, solver: Arc<InstrumentedSolver>, encoder: PathFormulaEncoder) -> Self {
        Self {
            cfa,
            solver,
            encoder,
        }
    }

    pub fn encode(&self, counterexample: &Counterexample) -> Result<EncodedPath> {
        Ok(self
            .encoder
            .encode_path(&self.cfa, counterexample.cfa_steps(&self.cfa))?)
    }

    pub fn check(&self, counterexample: &Counterexample) -> Result<Feasibility> {
        let encoded = self.encode(counterexample)?;
        match self.solver.decide(&encoded.conjuncts, "feasibility")? {
            Decided::Sat(model) => {
                debug!(steps = counterexample.len(), "counterexample is feasible");
                Ok(Feasibility::Feasible { model })
            }
            Decided::Unsat(core) => {
                debug!(
                    steps = counterexample.len(),
                    core = core.len(),
                    "counterexample is spurious"
                );
                Ok(Feasibility::Infeasible(InfeasibleCounterexample {
                    counterexample: counterexample.clone(),
                    encoded,
                    core,
                }))
            }
        }
    }

    /// Replay the path on the model's inputs: every step must be taken and
    /// every computed value must agree with the model
    pub fn validate_witness(&self, counterexample: &Counterexample, model: &Model) -> Result<bool> {
        let executor = ConcreteExecutor::new(self.encoder);
        let execution = executor.execute(&self.cfa, counterexample.cfa_steps(&self.cfa), model)?;
        if execution.outcome != ExecutionOutcome::Completed {
            warn!(outcome = ?execution.outcome, "witness replay did not complete");
            return Ok(false);
        }
        let mismatch = execution.run.values().iter().find(|(symbol, bits)| {
            model
                .get(&symbol.name, symbol.index)
                .is_some_and(|expected| expected != **bits)
        });
        if let Some((symbol, bits)) = mismatch {
            warn!(%symbol, replayed = bits, "witness value differs from the model");
            return Ok(false);
        }
        Ok(true)
    }
}

//! Remaining range after an interrupted analysis
//!
//! When a budget runs out, the part of the input space not yet covered
//! starts at the first unexplored path. A model of that path's formula,
//! reduced to the inputs, becomes the start bound of the remaining range;
//! the end bound is the one the analysis started with.

use crate::errors::Result;
use crate::features::path_formula::domain::EncodedPath;
use crate::features::range::domain::{RangeInterval, RangeValue};
use crate::features::smt::{Decided, InstrumentedSolver};
use crate::pipeline::verdict::first_versions;
use crate::shared::models::{CType, Cfa};
use tracing::{info, warn};

pub struct PathRangeGenerator<'a> {
    cfa: &'a Cfa,
    solver: &'a InstrumentedSolver,
}

impl<'a> PathRangeGenerator<'a> {
    pub fn new(cfa: &'a Cfa, solver: &'a InstrumentedSolver) -> Self {
        Self { cfa, solver }
    }

    /// `[inputs of path, initial end]`, or the initial interval when the
    /// path has no model
    pub fn generate(&self, path: &EncodedPath, initial: &RangeInterval) -> Result<RangeInterval> {
        match self.solver.decide(&path.conjuncts, "path range")? {
            Decided::Sat(model) => {
                let widths: Vec<_> = model.iter().map(|(s, v)| (s, v.width)).collect();
                let inputs = first_versions(model.iter().map(|(s, v)| (s, v.bits)));
                let assignment = inputs.into_iter().map(|(name, bits)| {
                    let ty = self.cfa.variable_type(&name).unwrap_or_else(|| {
                        let width = widths
                            .iter()
                            .find(|(s, _)| s.name == name)
                            .map(|(_, w)| *w)
                            .unwrap_or(32);
                        CType::new(width, true)
                    });
                    (name, ty.interpret(bits) as i64)
                });
                let start = RangeValue::from_assignment(assignment);
                let start = match start.assignment() {
                    Some(values) if values.is_empty() => RangeValue::unbounded(),
                    _ => start,
                };
                let range = RangeInterval::new(start, initial.end.clone());
                info!(%range, "generated remaining range");
                Ok(range)
            }
            Decided::Unsat(_) => {
                warn!("unexplored path has no model, keeping the initial range");
                Ok(initial.clone())
            }
        }
    }
}

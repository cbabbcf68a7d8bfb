//! Transfer of the range sub-state
//!
//! Paths are ordered by their branch decisions, the then-side of an
//! assumption before its else-side. At an assumption edge each tied bound
//! decides:
//!
//! | bound | edge | bound's run takes | result          |
//! |-------|------|-------------------|-----------------|
//! | start | then | then              | stay tied       |
//! | start | then | else              | prune (< start) |
//! | start | else | then              | untie start     |
//! | start | else | else              | stay tied       |
//! | end   | then | then              | stay tied       |
//! | end   | then | else              | untie end       |
//! | end   | else | then              | prune (> end)   |
//! | end   | else | else              | stay tied       |

use crate::errors::ModelingError;
use crate::features::execution::{ConcreteExecutor, ConcreteRun, InputSource, StepOutcome};
use crate::features::path_formula::infrastructure::PathFormulaEncoder;
use crate::features::range::domain::{RangeInterval, RangeState, RangeValue};
use crate::shared::models::{Cfa, CfaEdge, EdgeKind};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

#[derive(Debug, Clone)]
pub struct RangeRestriction {
    interval: RangeInterval,
    executor: ConcreteExecutor,
}

impl RangeRestriction {
    pub fn new(interval: RangeInterval, encoder: PathFormulaEncoder) -> Self {
        Self {
            interval,
            executor: ConcreteExecutor::new(encoder),
        }
    }

    pub fn interval(&self) -> &RangeInterval {
        &self.interval
    }

    /// Range state of the root: bounded sides start tied
    pub fn initial(&self) -> RangeState {
        let tie = |value: &RangeValue| (!value.is_unbounded()).then(ConcreteRun::new);
        RangeState::new(tie(&self.interval.start), tie(&self.interval.end))
    }

    /// Successor range state, `None` when the edge leaves the range
    pub fn successor(
        &self,
        cfa: &Cfa,
        edge: &CfaEdge,
        state: &RangeState,
    ) -> Result<Option<RangeState>, ModelingError> {
        let mut next = state.clone();

        if let EdgeKind::Assumption { condition, truth } = &edge.kind {
            for bound in [Bound::Start, Bound::End] {
                let slot = match bound {
                    Bound::Start => &mut next.start,
                    Bound::End => &mut next.end,
                };
                let Some(run) = slot.as_ref() else {
                    continue;
                };
                match self.executor.evaluate_condition(condition, run) {
                    None => {
                        trace!(?bound, %edge, "bound execution undetermined, untying");
                        *slot = None;
                    }
                    Some(holds) if holds == *truth => {}
                    Some(_) => {
                        let prune = match bound {
                            Bound::Start => *truth,
                            Bound::End => !*truth,
                        };
                        if prune {
                            trace!(?bound, %edge, "path leaves the range");
                            return Ok(None);
                        }
                        *slot = None;
                    }
                }
            }
        }

        for (slot, inputs) in [
            (&mut next.start, &self.interval.start as &dyn InputSource),
            (&mut next.end, &self.interval.end as &dyn InputSource),
        ] {
            if let Some(run) = slot.as_mut() {
                let outcome = self.executor.step(cfa, edge, &[], run, inputs)?;
                if outcome != StepOutcome::Continue {
                    *slot = None;
                }
            }
        }
        Ok(Some(next))
    }
}

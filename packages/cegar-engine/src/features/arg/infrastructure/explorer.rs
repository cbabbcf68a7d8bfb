//! ARG exploration
//!
//! Frontier nodes are expanded in batches. Successor computation
//! (transfer + abstraction) is pure and runs in parallel over a batch;
//! insertion into the ARG, coverage checks and waitlist updates run
//! sequentially in batch order, so every coverage check sees a complete
//! index and the resulting graph does not depend on thread timing.

use super::reached::ReachedSet;
use crate::errors::{EngineError, Result};
use crate::features::abstract_state::domain::CompositeState;
use crate::features::abstract_state::infrastructure::{
    AbstractionPolicy, PredicateAbstractor, TransferRelation,
};
use crate::features::arg::domain::ArgNodeId;
use crate::features::refinement::domain::Precision;
use crate::pipeline::verdict::Resource;
use crate::shared::models::{EdgeId, Expr};
use rayon::prelude::*;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorationResult {
    /// A node whose automaton state is an error state
    TargetReached(ArgNodeId),
    /// The frontier is empty
    Exhausted,
}

#[derive(Debug, Clone, Copy)]
pub struct ExplorationLimits {
    pub max_arg_nodes: usize,
    pub deadline: Option<Instant>,
    pub timeout: Option<Duration>,
}

impl ExplorationLimits {
    pub fn unlimited() -> Self {
        Self {
            max_arg_nodes: usize::MAX,
            deadline: None,
            timeout: None,
        }
    }

    pub fn check_time(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(EngineError::exhausted(
                Resource::Time,
                format!("{}s", self.timeout.unwrap_or_default().as_secs()),
            )),
            _ => Ok(()),
        }
    }
}

/// Counters of one exploration round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplorationStats {
    pub nodes_created: usize,
    pub covered: usize,
    pub bottom: usize,
    pub expanded: usize,
}

/// Successor ready for insertion
struct Prepared {
    edge: EdgeId,
    assumptions: Vec<(Expr, bool)>,
    state: CompositeState,
    is_abstraction: bool,
    is_target: bool,
}

pub struct Explorer<'a> {
    transfer: &'a TransferRelation,
    abstractor: &'a PredicateAbstractor,
    policy: AbstractionPolicy,
    batch_size: usize,
    pool: Option<&'a rayon::ThreadPool>,
}

impl<'a> Explorer<'a> {
    pub fn new(
        transfer: &'a TransferRelation,
        abstractor: &'a PredicateAbstractor,
        policy: AbstractionPolicy,
        batch_size: usize,
    ) -> Self {
        Self {
            transfer,
            abstractor,
            policy,
            batch_size: batch_size.max(1),
            pool: None,
        }
    }

    /// Compute batch successors on `pool`
    pub fn with_pool(mut self, pool: &'a rayon::ThreadPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Expand until a target is reached or the frontier is empty
    pub fn explore(
        &self,
        reached: &mut ReachedSet,
        precision: &Precision,
        limits: &ExplorationLimits,
        stats: &mut ExplorationStats,
    ) -> Result<ExplorationResult> {
        // Targets left over from a batch whose first target was refined
        if let Some(target) = reached
            .arg
            .nodes()
            .find(|n| n.is_target && !n.state.is_bottom())
        {
            return Ok(ExplorationResult::TargetReached(target.id));
        }

        loop {
            limits.check_time()?;

            let batch: Vec<ArgNodeId> = reached
                .waitlist
                .pop_batch(self.batch_size)
                .into_iter()
                .filter(|id| reached.arg.node(*id).is_frontier())
                .collect();
            if batch.is_empty() {
                if reached.waitlist.is_empty() {
                    debug!(nodes = reached.arg.len(), "frontier exhausted");
                    return Ok(ExplorationResult::Exhausted);
                }
                continue;
            }

            let results = {
                let states: Vec<&CompositeState> =
                    batch.iter().map(|id| &reached.arg.node(*id).state).collect();
                self.expand_all(&states, precision)
            };

            let mut target = None;
            for (id, result) in batch.iter().zip(results) {
                let prepared = result?;
                if reached.arg.len() + prepared.len() > limits.max_arg_nodes {
                    return Err(EngineError::exhausted(
                        Resource::ArgNodes,
                        limits.max_arg_nodes,
                    ));
                }
                reached.arg.node_mut(*id).expanded = true;
                stats.expanded += 1;

                for p in prepared {
                    let bottom = p.state.is_bottom();
                    let key = p.state.coverage_key();
                    let child = reached.arg.add_child(
                        *id,
                        p.edge,
                        p.assumptions,
                        p.state,
                        p.is_abstraction,
                        p.is_target,
                    );
                    stats.nodes_created += 1;

                    if bottom {
                        stats.bottom += 1;
                        continue;
                    }
                    if p.is_target {
                        trace!(node = %child, "target reached");
                        target.get_or_insert(child);
                        continue;
                    }
                    if p.is_abstraction {
                        if let Some(cover) = reached.coverage.find_cover(&reached.arg, child) {
                            reached.arg.cover(child, cover);
                            stats.covered += 1;
                            continue;
                        }
                        reached.coverage.insert(key, child);
                    }
                    reached.waitlist.push(child);
                }
            }

            if let Some(target) = target {
                return Ok(ExplorationResult::TargetReached(target));
            }
        }
    }

    fn expand_all(
        &self,
        states: &[&CompositeState],
        precision: &Precision,
    ) -> Vec<Result<Vec<Prepared>>> {
        match self.pool {
            Some(pool) if states.len() > 1 => pool.install(|| {
                states
                    .par_iter()
                    .map(|state| self.expand(state, precision))
                    .collect()
            }),
            _ => states
                .iter()
                .map(|state| self.expand(state, precision))
                .collect(),
        }
    }

    fn expand(&self, state: &CompositeState, precision: &Precision) -> Result<Vec<Prepared>> {
        let cfa = self.transfer.cfa();
        let product = self.transfer.product();
        let mut out = Vec::new();
        for successor in self.transfer.successors(state)? {
            let location = successor.state.location;
            let is_target = product.is_target(&successor.state.automata);
            let is_abstraction = self.policy.is_abstraction_point(cfa, location, is_target);
            let state = if is_abstraction {
                self.abstractor
                    .abstract_state(&successor.state, &precision.at(location))?
            } else {
                successor.state
            };
            out.push(Prepared {
                edge: successor.edge,
                assumptions: successor.assumptions,
                state,
                is_abstraction,
                is_target,
            });
        }
        Ok(out)
    }
}

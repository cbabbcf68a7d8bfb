//! Reached set: ARG, frontier and coverage index kept in step

use super::coverage::CoverageIndex;
use super::waitlist::Waitlist;
use crate::config::SearchOrder;
use crate::features::abstract_state::domain::CompositeState;
use crate::features::arg::domain::{Arg, ArgNodeId, Pruned};
use tracing::debug;

#[derive(Debug)]
pub struct ReachedSet {
    pub arg: Arg,
    pub waitlist: Waitlist,
    pub coverage: CoverageIndex,
}

impl ReachedSet {
    pub fn new(root: CompositeState, order: SearchOrder) -> Self {
        let arg = Arg::new(root);
        let mut waitlist = Waitlist::new(order);
        waitlist.push(arg.root());
        Self {
            arg,
            waitlist,
            coverage: CoverageIndex::new(),
        }
    }

    /// Drop everything below `id` and queue `id` for re-expansion
    pub fn prune_below(&mut self, id: ArgNodeId) -> Pruned {
        let pruned = self.arg.prune_below(id);
        for removed in &pruned.removed {
            let key = self.arg.node(*removed).state.coverage_key();
            self.coverage.remove(&key, *removed);
        }
        let arg = &self.arg;
        self.waitlist.retain(|n| !arg.node(*n).removed);
        for id in pruned.uncovered.clone() {
            // Another surviving candidate may still stand in for it
            if let Some(cover) = self.coverage.find_cover(&self.arg, id) {
                self.arg.cover(id, cover);
                continue;
            }
            let key = self.arg.node(id).state.coverage_key();
            self.coverage.insert(key, id);
            self.waitlist.push(id);
        }
        if self.arg.node(id).is_frontier() {
            self.waitlist.push(id);
        }
        debug!(
            pivot = %id,
            removed = pruned.removed.len(),
            uncovered = pruned.uncovered.len(),
            "pruned ARG"
        );
        pruned
    }

    /// First node still waiting for expansion
    pub fn first_frontier(&self) -> Option<ArgNodeId> {
        self.waitlist
            .peek()
            .filter(|id| self.arg.node(*id).is_frontier())
            .or_else(|| self.arg.nodes().find(|n| n.is_frontier()).map(|n| n.id))
    }
}

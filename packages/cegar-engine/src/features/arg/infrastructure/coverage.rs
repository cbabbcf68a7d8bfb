//! Coverage index
//!
//! Abstraction nodes that may cover later nodes, sharded by
//! (location, callstack). Only the driver thread writes; candidate lists
//! are kept in creation order so the earliest cover wins.

use crate::features::abstract_state::domain::CoverageKey;
use crate::features::arg::domain::{Arg, ArgNode, ArgNodeId};
use dashmap::DashMap;
use tracing::trace;

#[derive(Debug, Default)]
pub struct CoverageIndex {
    /// (location, callstack) → candidate node ids
    candidates: DashMap<CoverageKey, Vec<ArgNodeId>>,
}

impl CoverageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` as a potential cover
    pub fn insert(&self, key: CoverageKey, id: ArgNodeId) {
        let mut entry = self.candidates.entry(key).or_default();
        // Keep creation order (ids are monotone)
        let position = entry.partition_point(|other| *other < id);
        if entry.get(position) != Some(&id) {
            entry.insert(position, id);
        }
    }

    pub fn remove(&self, key: &CoverageKey, id: ArgNodeId) {
        if let Some(mut entry) = self.candidates.get_mut(key) {
            entry.retain(|other| *other != id);
        }
    }

    pub fn candidates(&self, key: &CoverageKey) -> Vec<ArgNodeId> {
        self.candidates
            .get(key)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    /// Number of registered candidates
    pub fn len(&self) -> usize {
        self.candidates.iter().map(|entry| entry.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.candidates.clear();
    }

    /// Earliest node covering `id`, if any
    pub fn find_cover(&self, arg: &Arg, id: ArgNodeId) -> Option<ArgNodeId> {
        let node = arg.node(id);
        if !node.is_abstraction || node.removed {
            return None;
        }
        let key = node.state.coverage_key();
        let cover = self
            .candidates(&key)
            .into_iter()
            .take_while(|candidate| *candidate < id)
            .find(|candidate| covers(arg.node(*candidate), node));
        if let Some(cover) = cover {
            trace!(node = %id, by = %cover, "covered");
        }
        cover
    }
}

/// `candidate` covers `node`: same automaton states, at least as
/// permissive a range, and `node`'s abstraction implies `candidate`'s
fn covers(candidate: &ArgNode, node: &ArgNode) -> bool {
    if candidate.removed
        || candidate.is_covered()
        || !candidate.is_abstraction
        || candidate.state.is_bottom()
    {
        return false;
    }
    if candidate.state.automata != node.state.automata {
        return false;
    }
    let range_ok = match (&candidate.state.range, &node.state.range) {
        (None, _) => true,
        (Some(mine), Some(theirs)) => mine.is_unrestricted() || mine == theirs,
        (Some(mine), None) => mine.is_unrestricted(),
    };
    range_ok && node.state.abstraction.entails(&candidate.state.abstraction)
}

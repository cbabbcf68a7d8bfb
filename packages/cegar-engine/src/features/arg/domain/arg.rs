//! Abstract reachability graph
//!
//! Arena of nodes addressed by [`ArgNodeId`]; parent, children and the
//! covering relation are stored as ids. Ids grow monotonically and are
//! never reused, so pruned nodes stay in the arena marked `removed`.

use crate::features::abstract_state::domain::CompositeState;
use crate::shared::models::{EdgeId, Expr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArgNodeId(pub u32);

impl ArgNodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ArgNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Incoming ARG edge: CFA edge plus the automaton assumptions taken on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgEdge {
    pub parent: ArgNodeId,
    pub edge: EdgeId,
    pub assumptions: Vec<(Expr, bool)>,
}

#[derive(Debug, Clone)]
pub struct ArgNode {
    pub id: ArgNodeId,
    pub state: CompositeState,
    pub incoming: Option<ArgEdge>,
    pub children: Vec<ArgNodeId>,
    pub covered_by: Option<ArgNodeId>,
    pub covers: BTreeSet<ArgNodeId>,
    pub is_abstraction: bool,
    pub is_target: bool,
    pub expanded: bool,
    pub removed: bool,
}

impl ArgNode {
    pub fn parent(&self) -> Option<ArgNodeId> {
        self.incoming.as_ref().map(|e| e.parent)
    }

    pub fn is_covered(&self) -> bool {
        self.covered_by.is_some()
    }

    /// Leaf that still needs expansion
    pub fn is_frontier(&self) -> bool {
        !self.removed
            && !self.expanded
            && !self.is_covered()
            && !self.is_target
            && !self.state.is_bottom()
    }
}

/// Result of pruning a subtree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pruned {
    pub removed: Vec<ArgNodeId>,
    /// Live nodes that were covered by a removed node
    pub uncovered: Vec<ArgNodeId>,
}

#[derive(Debug, Clone)]
pub struct Arg {
    nodes: Vec<ArgNode>,
    live: usize,
}

impl Arg {
    pub fn new(root: CompositeState) -> Self {
        let node = ArgNode {
            id: ArgNodeId(0),
            state: root,
            incoming: None,
            children: Vec::new(),
            covered_by: None,
            covers: BTreeSet::new(),
            is_abstraction: true,
            is_target: false,
            expanded: false,
            removed: false,
        };
        Self {
            nodes: vec![node],
            live: 1,
        }
    }

    pub fn root(&self) -> ArgNodeId {
        ArgNodeId(0)
    }

    pub fn node(&self, id: ArgNodeId) -> &ArgNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: ArgNodeId) -> &mut ArgNode {
        &mut self.nodes[id.index()]
    }

    /// Live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Nodes ever created, pruned ones included
    pub fn created(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ArgNode> {
        self.nodes.iter().filter(|n| !n.removed)
    }

    pub fn add_child(
        &mut self,
        parent: ArgNodeId,
        edge: EdgeId,
        assumptions: Vec<(Expr, bool)>,
        state: CompositeState,
        is_abstraction: bool,
        is_target: bool,
    ) -> ArgNodeId {
        let id = ArgNodeId(self.nodes.len() as u32);
        self.nodes.push(ArgNode {
            id,
            state,
            incoming: Some(ArgEdge {
                parent,
                edge,
                assumptions,
            }),
            children: Vec::new(),
            covered_by: None,
            covers: BTreeSet::new(),
            is_abstraction,
            is_target,
            expanded: false,
            removed: false,
        });
        self.nodes[parent.index()].children.push(id);
        self.live += 1;
        id
    }

    /// Record that `by` covers `node`
    pub fn cover(&mut self, node: ArgNodeId, by: ArgNodeId) {
        self.nodes[node.index()].covered_by = Some(by);
        self.nodes[by.index()].covers.insert(node);
    }

    pub fn uncover(&mut self, node: ArgNodeId) {
        if let Some(by) = self.nodes[node.index()].covered_by.take() {
            self.nodes[by.index()].covers.remove(&node);
        }
    }

    /// Nodes from the root to `id`, both included
    pub fn path_to(&self, id: ArgNodeId) -> Vec<ArgNodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.node(current).parent() {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Incoming edges along the path to `id`
    pub fn edges_to(&self, id: ArgNodeId) -> Vec<&ArgEdge> {
        self.path_to(id)
            .into_iter()
            .filter_map(|n| self.node(n).incoming.as_ref())
            .collect()
    }

    /// `id` and all its live descendants, in creation order
    pub fn subtree(&self, id: ArgNodeId) -> Vec<ArgNodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current);
            if node.removed {
                continue;
            }
            out.push(current);
            stack.extend(node.children.iter().copied());
        }
        out.sort();
        out
    }

    /// Remove every child subtree of `id` and mark `id` for re-expansion
    pub fn prune_below(&mut self, id: ArgNodeId) -> Pruned {
        let mut pruned = Pruned::default();
        let children = std::mem::take(&mut self.nodes[id.index()].children);
        for child in children {
            for removed in self.subtree(child) {
                self.remove(removed, &mut pruned);
            }
        }
        self.nodes[id.index()].expanded = false;

        pruned.uncovered.retain(|n| !self.nodes[n.index()].removed);
        pruned.uncovered.sort();
        pruned.uncovered.dedup();
        pruned.removed.sort();
        pruned
    }

    fn remove(&mut self, id: ArgNodeId, pruned: &mut Pruned) {
        self.uncover(id);
        let covers = std::mem::take(&mut self.nodes[id.index()].covers);
        for covered in covers {
            self.nodes[covered.index()].covered_by = None;
            pruned.uncovered.push(covered);
        }
        let node = &mut self.nodes[id.index()];
        node.removed = true;
        node.children.clear();
        self.live -= 1;
        pruned.removed.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::automaton::{Automaton, AutomatonProduct};
    use crate::shared::models::{CType, Cfa, CfaBuilder};

    fn root_state() -> (Cfa, CompositeState) {
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("main", &[], None);
        let mut main = cfa.body("main");
        let n1 = main.declare(main.entry(), "x", CType::INT, Some(Expr::int(0)));
        main.ret(n1, None);
        let cfa = cfa.entry_function("main").build().unwrap();
        let product = AutomatonProduct::new(vec![Automaton::reach_error()]).unwrap();
        let state = CompositeState::initial(&cfa, &product, None);
        (cfa, state)
    }

    #[test]
    fn test_paths_and_subtrees() {
        let (_, state) = root_state();
        let mut arg = Arg::new(state.clone());
        let a = arg.add_child(arg.root(), EdgeId(0), vec![], state.clone(), false, false);
        let b = arg.add_child(a, EdgeId(1), vec![], state.clone(), true, false);
        let c = arg.add_child(a, EdgeId(2), vec![], state, true, false);

        assert_eq!(arg.path_to(b), vec![arg.root(), a, b]);
        let edges: Vec<EdgeId> = arg.edges_to(c).iter().map(|e| e.edge).collect();
        assert_eq!(edges, vec![EdgeId(0), EdgeId(2)]);
        assert_eq!(arg.subtree(a), vec![a, b, c]);
        assert_eq!(arg.len(), 4);
    }

    #[test]
    fn test_prune_uncovers_nodes_covered_by_pruned_nodes() {
        let (_, state) = root_state();
        let mut arg = Arg::new(state.clone());
        let root = arg.root();
        let left = arg.add_child(root, EdgeId(0), vec![], state.clone(), true, false);
        let right = arg.add_child(root, EdgeId(1), vec![], state.clone(), true, false);
        let below = arg.add_child(left, EdgeId(2), vec![], state.clone(), true, false);
        let other = arg.add_child(right, EdgeId(3), vec![], state, true, false);
        arg.node_mut(root).expanded = true;
        arg.node_mut(left).expanded = true;
        arg.cover(other, below);

        let pruned = arg.prune_below(left);
        assert_eq!(pruned.removed, vec![below]);
        assert_eq!(pruned.uncovered, vec![other]);
        assert!(!arg.node(other).is_covered());
        assert!(arg.node(left).is_frontier());
        assert!(arg.node(left).children.is_empty());
        assert_eq!(arg.len(), 4);
        assert_eq!(arg.created(), 5);
    }
}

//! ARG diagnostics: Graphviz DOT and JSON snapshots

use crate::features::arg::domain::{Arg, ArgNode, ArgNodeId};
use crate::features::automaton::AutomatonProduct;
use crate::shared::models::{Cfa, CfaNodeId};
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, EdgeReference, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgNodeSnapshot {
    pub id: ArgNodeId,
    pub location: CfaNodeId,
    pub callstack: String,
    pub abstraction: String,
    pub automata: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ArgNodeId>,
    /// Operation of the incoming CFA edge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<String>,
    pub children: Vec<ArgNodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covered_by: Option<ArgNodeId>,
    pub is_abstraction: bool,
    pub is_target: bool,
    pub is_bottom: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSnapshot {
    pub nodes: Vec<ArgNodeSnapshot>,
}

impl ArgSnapshot {
    pub fn new(arg: &Arg, cfa: &Cfa, product: &AutomatonProduct) -> Self {
        let nodes = arg
            .nodes()
            .map(|node| ArgNodeSnapshot {
                id: node.id,
                location: node.state.location,
                callstack: node.state.callstack.to_string(),
                abstraction: node.state.abstraction.to_string(),
                automata: product.describe(&node.state.automata),
                parent: node.parent(),
                edge: node
                    .incoming
                    .as_ref()
                    .map(|e| cfa.edge(e.edge).kind.to_string()),
                children: node.children.clone(),
                covered_by: node.covered_by,
                is_abstraction: node.is_abstraction,
                is_target: node.is_target,
                is_bottom: node.state.is_bottom(),
            })
            .collect();
        Self { nodes }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone)]
struct GraphNode {
    label: String,
    style: &'static str,
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[derive(Debug, Clone)]
enum GraphEdge {
    Step(String),
    Covers,
}

impl fmt::Display for GraphEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphEdge::Step(op) => f.write_str(op),
            GraphEdge::Covers => f.write_str("covered by"),
        }
    }
}

fn node_style(node: &ArgNode) -> &'static str {
    if node.is_target {
        "color = red, style = filled, fillcolor = mistyrose"
    } else if node.state.is_bottom() {
        "color = gray"
    } else if node.is_covered() {
        "style = dashed"
    } else if node.is_abstraction {
        "shape = box"
    } else {
        ""
    }
}

/// Graphviz rendering of the live ARG; covering edges are dashed
pub fn to_dot(arg: &Arg, cfa: &Cfa, product: &AutomatonProduct) -> String {
    let mut graph: DiGraph<GraphNode, GraphEdge> = DiGraph::new();
    let mut index: HashMap<ArgNodeId, NodeIndex> = HashMap::new();

    for node in arg.nodes() {
        let label = format!("{} {}", node.id, node.state.describe(product));
        let idx = graph.add_node(GraphNode {
            label,
            style: node_style(node),
        });
        index.insert(node.id, idx);
    }
    for node in arg.nodes() {
        if let Some(incoming) = &node.incoming {
            if let (Some(from), Some(to)) = (index.get(&incoming.parent), index.get(&node.id)) {
                let op = cfa.edge(incoming.edge).kind.to_string();
                graph.add_edge(*from, *to, GraphEdge::Step(op));
            }
        }
        if let Some(by) = node.covered_by {
            if let (Some(from), Some(to)) = (index.get(&node.id), index.get(&by)) {
                graph.add_edge(*from, *to, GraphEdge::Covers);
            }
        }
    }

    let edge_attrs = |_: &DiGraph<GraphNode, GraphEdge>, edge: EdgeReference<'_, GraphEdge>| {
        match edge.weight() {
            GraphEdge::Covers => "style = dashed, constraint = false".to_string(),
            GraphEdge::Step(_) => String::new(),
        }
    };
    let node_attrs = |_: &DiGraph<GraphNode, GraphEdge>, (_, node): (NodeIndex, &GraphNode)| {
        node.style.to_string()
    };
    format!(
        "{}",
        Dot::with_attr_getters(&graph, &[], &edge_attrs, &node_attrs)
    )
}

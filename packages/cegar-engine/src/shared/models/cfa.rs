//! Control-flow automaton
//!
//! The CFA is the program model consumed by the engine: one node per
//! program location, one edge per atomic operation. It is produced by an
//! external front end (JSON) or assembled in code with [`CfaBuilder`].
//!
//! ## Layout
//! ```text
//! start ─[globals]─[entry params]─ Function start dummy edge ─▶ main entry
//!                                                                  │
//!   f entry ◀── Call(f, args, return_node) ──────────────────── call site
//!   f exit  ─── Return(f, result) ──────────────────────────▶ return_node
//! ```
//! Node and edge ids are dense indices, so lookups are plain slice accesses.

use super::expr::Expr;
use super::types::CType;
use crate::errors::ModelingError;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, DfsEvent};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Name of the implicit variable carrying a function's return value
pub const RETVAL: &str = "__retval__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CfaNodeId(pub u32);

impl CfaNodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CfaNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u32);

impl EdgeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfaNode {
    pub id: CfaNodeId,
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Typed variable reference (declaration site or assignment target)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub ty: CType,
}

impl VarDecl {
    pub fn new(name: impl Into<String>, ty: CType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn as_expr(&self) -> Expr {
        Expr::var(self.name.clone(), self.ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub entry: CfaNodeId,
    pub exit: CfaNodeId,
    #[serde(default)]
    pub parameters: Vec<VarDecl>,
    #[serde(default)]
    pub return_type: Option<CType>,
}

impl FunctionDef {
    /// `f::__retval__`, present only for non-void functions
    pub fn retval(&self) -> Option<VarDecl> {
        self.return_type
            .map(|ty| VarDecl::new(format!("{}::{}", self.name, RETVAL), ty))
    }
}

/// Atomic operation labelling a CFA edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeKind {
    Blank {
        #[serde(default)]
        description: String,
    },
    Declaration {
        variable: VarDecl,
        #[serde(default)]
        initializer: Option<Expr>,
    },
    Assignment {
        target: VarDecl,
        value: Expr,
    },
    /// Branch guard; `truth` selects the then (true) or else (false) side
    Assumption {
        condition: Expr,
        truth: bool,
    },
    /// Call into a function with a body; binds formals and pushes a frame
    Call {
        callee: String,
        arguments: Vec<Expr>,
        return_node: CfaNodeId,
    },
    /// Leaves `callee`, copying its return value into `result`
    Return {
        callee: String,
        #[serde(default)]
        result: Option<VarDecl>,
    },
    /// `return value;` inside `function`
    ReturnValue {
        function: String,
        value: Expr,
    },
    /// Call without a body; the result becomes unconstrained
    ExternalCall {
        callee: String,
        #[serde(default)]
        arguments: Vec<Expr>,
        #[serde(default)]
        result: Option<VarDecl>,
    },
}

impl EdgeKind {
    /// Expressions evaluated by this edge
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            EdgeKind::Blank { .. } | EdgeKind::Return { .. } => Vec::new(),
            EdgeKind::Declaration { initializer, .. } => initializer.iter().collect(),
            EdgeKind::Assignment { value, .. } => vec![value],
            EdgeKind::Assumption { condition, .. } => vec![condition],
            EdgeKind::ReturnValue { value, .. } => vec![value],
            EdgeKind::Call { arguments, .. } | EdgeKind::ExternalCall { arguments, .. } => {
                arguments.iter().collect()
            }
        }
    }
}

fn join_args(arguments: &[Expr]) -> String {
    arguments
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Blank { description } => f.write_str(description),
            EdgeKind::Declaration {
                variable,
                initializer: None,
            } => write!(f, "{} {};", variable.ty, variable.name),
            EdgeKind::Declaration {
                variable,
                initializer: Some(init),
            } => write!(f, "{} {} = {};", variable.ty, variable.name, init),
            EdgeKind::Assignment { target, value } => write!(f, "{} = {};", target.name, value),
            EdgeKind::Assumption { condition, truth } => {
                if *truth {
                    write!(f, "[{}]", condition)
                } else {
                    write!(f, "[!({})]", condition)
                }
            }
            EdgeKind::Call {
                callee, arguments, ..
            } => write!(f, "{}({});", callee, join_args(arguments)),
            EdgeKind::Return {
                callee,
                result: None,
            } => write!(f, "Return edge from {}", callee),
            EdgeKind::Return {
                callee,
                result: Some(r),
            } => write!(f, "{} = {}::{};", r.name, callee, RETVAL),
            EdgeKind::ReturnValue { value, .. } => write!(f, "return {};", value),
            EdgeKind::ExternalCall {
                callee,
                arguments,
                result: None,
            } => write!(f, "{}({});", callee, join_args(arguments)),
            EdgeKind::ExternalCall {
                callee,
                arguments,
                result: Some(r),
            } => write!(f, "{} = {}({});", r.name, callee, join_args(arguments)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfaEdge {
    pub id: EdgeId,
    pub source: CfaNodeId,
    pub target: CfaNodeId,
    /// Operation payload, nested so its fields never clash with the edge's
    #[serde(rename = "op")]
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl fmt::Display for CfaEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}:\t", line)?;
        }
        write!(f, "{} -{{{}}}-> {}", self.source, self.kind, self.target)
    }
}

/// Serialized form of a [`Cfa`] (what the front end writes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfaDocument {
    pub entry_function: String,
    pub start: CfaNodeId,
    pub nodes: Vec<CfaNode>,
    pub edges: Vec<CfaEdge>,
    pub functions: Vec<FunctionDef>,
    #[serde(default)]
    pub globals: Vec<VarDecl>,
}

/// Validated, indexed control-flow automaton
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CfaDocument", into = "CfaDocument")]
pub struct Cfa {
    entry_function: String,
    start: CfaNodeId,
    nodes: Vec<CfaNode>,
    edges: Vec<CfaEdge>,
    functions: BTreeMap<String, FunctionDef>,
    globals: Vec<VarDecl>,
    outgoing: Vec<Vec<EdgeId>>,
    variables: BTreeMap<String, CType>,
    loop_heads: BTreeSet<CfaNodeId>,
}

impl TryFrom<CfaDocument> for Cfa {
    type Error = ModelingError;

    fn try_from(doc: CfaDocument) -> Result<Self, Self::Error> {
        Cfa::from_document(doc)
    }
}

impl From<Cfa> for CfaDocument {
    fn from(cfa: Cfa) -> Self {
        CfaDocument {
            entry_function: cfa.entry_function,
            start: cfa.start,
            nodes: cfa.nodes,
            edges: cfa.edges,
            functions: cfa.functions.into_values().collect(),
            globals: cfa.globals,
        }
    }
}

impl Cfa {
    /// Validate a document and build the lookup indices
    pub fn from_document(doc: CfaDocument) -> Result<Self, ModelingError> {
        let node_count = doc.nodes.len();
        for (i, node) in doc.nodes.iter().enumerate() {
            if node.id.index() != i {
                return Err(ModelingError::malformed(format!(
                    "node at position {} has id {}",
                    i, node.id
                )));
            }
        }
        let exists = |id: CfaNodeId| id.index() < node_count;
        if !exists(doc.start) {
            return Err(ModelingError::malformed(format!(
                "start node {} does not exist",
                doc.start
            )));
        }

        let mut functions = BTreeMap::new();
        for function in doc.functions {
            if !exists(function.entry) || !exists(function.exit) {
                return Err(ModelingError::malformed(format!(
                    "function '{}' refers to missing entry/exit node",
                    function.name
                )));
            }
            if functions.contains_key(&function.name) {
                return Err(ModelingError::malformed(format!(
                    "function '{}' defined twice",
                    function.name
                )));
            }
            functions.insert(function.name.clone(), function);
        }
        if !functions.contains_key(&doc.entry_function) {
            return Err(ModelingError::UnknownFunction(doc.entry_function));
        }

        let mut variables = BTreeMap::new();
        let mut declare = |decl: &VarDecl| -> Result<(), ModelingError> {
            match variables.insert(decl.name.clone(), decl.ty) {
                Some(previous) if previous != decl.ty => Err(ModelingError::malformed(format!(
                    "variable '{}' declared as both {} and {}",
                    decl.name, previous, decl.ty
                ))),
                _ => Ok(()),
            }
        };
        for global in &doc.globals {
            declare(global)?;
        }
        for function in functions.values() {
            for param in &function.parameters {
                declare(param)?;
            }
            if let Some(retval) = function.retval() {
                declare(&retval)?;
            }
        }
        for edge in &doc.edges {
            if let EdgeKind::Declaration { variable, .. } = &edge.kind {
                declare(variable)?;
            }
        }

        let mut outgoing = vec![Vec::new(); node_count];
        for (i, edge) in doc.edges.iter().enumerate() {
            if edge.id.index() != i {
                return Err(ModelingError::malformed(format!(
                    "edge at position {} has id {}",
                    i, edge.id.0
                )));
            }
            if !exists(edge.source) || !exists(edge.target) {
                return Err(ModelingError::malformed(format!(
                    "edge {} connects missing nodes {} -> {}",
                    i, edge.source, edge.target
                )));
            }
            Self::validate_edge(edge, &functions, &variables, exists)?;
            outgoing[edge.source.index()].push(edge.id);
        }

        let loop_heads = Self::compute_loop_heads(doc.start, &doc.edges, &functions, node_count);

        Ok(Self {
            entry_function: doc.entry_function,
            start: doc.start,
            nodes: doc.nodes,
            edges: doc.edges,
            functions,
            globals: doc.globals,
            outgoing,
            variables,
            loop_heads,
        })
    }

    fn validate_edge(
        edge: &CfaEdge,
        functions: &BTreeMap<String, FunctionDef>,
        variables: &BTreeMap<String, CType>,
        exists: impl Fn(CfaNodeId) -> bool,
    ) -> Result<(), ModelingError> {
        let check_var = |decl: &VarDecl| {
            if variables.contains_key(&decl.name) {
                Ok(())
            } else {
                Err(ModelingError::UnknownVariable(decl.name.clone()))
            }
        };
        for expr in edge.kind.expressions() {
            for name in expr.variables().keys() {
                if !variables.contains_key(name) {
                    return Err(ModelingError::UnknownVariable(name.clone()));
                }
            }
        }
        match &edge.kind {
            EdgeKind::Assignment { target, .. } => check_var(target)?,
            EdgeKind::Call {
                callee,
                arguments,
                return_node,
            } => {
                let function = functions
                    .get(callee)
                    .ok_or_else(|| ModelingError::UnknownFunction(callee.clone()))?;
                if edge.target != function.entry {
                    return Err(ModelingError::malformed(format!(
                        "call edge to '{}' does not end at its entry node",
                        callee
                    )));
                }
                if !exists(*return_node) {
                    return Err(ModelingError::malformed(format!(
                        "call to '{}' has missing return node {}",
                        callee, return_node
                    )));
                }
                if arguments.len() != function.parameters.len() {
                    return Err(ModelingError::ArityMismatch {
                        callee: callee.clone(),
                        expected: function.parameters.len(),
                        found: arguments.len(),
                    });
                }
            }
            EdgeKind::Return { callee, result } => {
                let function = functions
                    .get(callee)
                    .ok_or_else(|| ModelingError::UnknownFunction(callee.clone()))?;
                if edge.source != function.exit {
                    return Err(ModelingError::malformed(format!(
                        "return edge of '{}' does not start at its exit node",
                        callee
                    )));
                }
                if let Some(result) = result {
                    check_var(result)?;
                    if function.return_type.is_none() {
                        return Err(ModelingError::malformed(format!(
                            "result of void function '{}' is used",
                            callee
                        )));
                    }
                }
            }
            EdgeKind::ReturnValue { function, .. } => {
                let def = functions
                    .get(function)
                    .ok_or_else(|| ModelingError::UnknownFunction(function.clone()))?;
                if def.return_type.is_none() {
                    return Err(ModelingError::malformed(format!(
                        "void function '{}' returns a value",
                        function
                    )));
                }
            }
            EdgeKind::ExternalCall {
                result: Some(result),
                ..
            } => check_var(result)?,
            _ => {}
        }
        Ok(())
    }

    /// Targets of DFS back edges, computed per function. Call edges are
    /// replaced by a summary edge to their return node, so a function
    /// called twice does not look like a loop.
    fn compute_loop_heads(
        start: CfaNodeId,
        edges: &[CfaEdge],
        functions: &BTreeMap<String, FunctionDef>,
        node_count: usize,
    ) -> BTreeSet<CfaNodeId> {
        let mut graph: DiGraph<CfaNodeId, ()> = DiGraph::with_capacity(node_count, edges.len());
        for i in 0..node_count {
            graph.add_node(CfaNodeId(i as u32));
        }
        for edge in edges {
            let (from, to) = match &edge.kind {
                EdgeKind::Return { .. } => continue,
                EdgeKind::Call { return_node, .. } => (edge.source, *return_node),
                _ => (edge.source, edge.target),
            };
            graph.add_edge(NodeIndex::new(from.index()), NodeIndex::new(to.index()), ());
        }

        let mut roots = vec![NodeIndex::new(start.index())];
        roots.extend(functions.values().map(|f| NodeIndex::new(f.entry.index())));

        let mut heads = BTreeSet::new();
        depth_first_search(&graph, roots, |event| {
            if let DfsEvent::BackEdge(_, target) = event {
                heads.insert(CfaNodeId(target.index() as u32));
            }
        });
        heads
    }

    // ═══════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════

    pub fn entry_function(&self) -> &str {
        &self.entry_function
    }

    /// Program start node (root of every analysis)
    pub fn start(&self) -> CfaNodeId {
        self.start
    }

    pub fn node(&self, id: CfaNodeId) -> &CfaNode {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> &[CfaNode] {
        &self.nodes
    }

    pub fn edge(&self, id: EdgeId) -> &CfaEdge {
        &self.edges[id.index()]
    }

    pub fn edges(&self) -> &[CfaEdge] {
        &self.edges
    }

    pub fn outgoing(&self, node: CfaNodeId) -> impl Iterator<Item = &CfaEdge> + '_ {
        self.outgoing[node.index()].iter().map(|id| self.edge(*id))
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.functions.values()
    }

    pub fn globals(&self) -> &[VarDecl] {
        &self.globals
    }

    /// Declared type of a qualified variable
    pub fn variable_type(&self, name: &str) -> Option<CType> {
        self.variables.get(name).copied()
    }

    pub fn variables(&self) -> &BTreeMap<String, CType> {
        &self.variables
    }

    pub fn loop_heads(&self) -> &BTreeSet<CfaNodeId> {
        &self.loop_heads
    }

    pub fn is_function_entry(&self, node: CfaNodeId) -> bool {
        self.functions.values().any(|f| f.entry == node)
    }

    pub fn is_function_exit(&self, node: CfaNodeId) -> bool {
        self.functions.values().any(|f| f.exit == node)
    }

    /// Nodes carrying `label`
    pub fn labeled<'a>(&'a self, label: &'a str) -> impl Iterator<Item = CfaNodeId> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.label.as_deref() == Some(label))
            .map(|n| n.id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════════

/// Assembles a [`Cfa`] in code
///
/// ```rust,ignore
/// let mut cfa = CfaBuilder::new();
/// cfa.declare_function("main", &[], Some(CType::INT));
/// let mut main = cfa.body("main");
/// let n1 = main.declare(main.entry(), "x", CType::INT, Some(Expr::int(0)));
/// main.ret(n1, Some(Expr::int(0)));
/// let cfa = cfa.entry_function("main").build()?;
/// ```
#[derive(Debug, Default)]
pub struct CfaBuilder {
    nodes: Vec<CfaNode>,
    edges: Vec<CfaEdge>,
    functions: BTreeMap<String, FunctionDef>,
    globals: Vec<(VarDecl, Option<Expr>)>,
    entry: Option<String>,
    line: Option<u32>,
}

impl CfaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_node(&mut self, function: &str) -> CfaNodeId {
        let id = CfaNodeId(self.nodes.len() as u32);
        self.nodes.push(CfaNode {
            id,
            function: function.to_string(),
            line: self.line,
            label: None,
        });
        id
    }

    fn add_edge(&mut self, source: CfaNodeId, target: CfaNodeId, kind: EdgeKind) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(CfaEdge {
            id,
            source,
            target,
            kind,
            line: self.line,
        });
        id
    }

    /// Source line attached to nodes and edges created from now on
    pub fn at_line(&mut self, line: u32) -> &mut Self {
        self.line = Some(line);
        self
    }

    pub fn global(&mut self, name: &str, ty: CType, initializer: Option<Expr>) -> &mut Self {
        self.globals.push((VarDecl::new(name, ty), initializer));
        self
    }

    pub fn global_var(&self, name: &str) -> Option<Expr> {
        self.globals
            .iter()
            .find(|(decl, _)| decl.name == name)
            .map(|(decl, _)| decl.as_expr())
    }

    /// Register a function signature; creates its entry and exit nodes
    pub fn declare_function(
        &mut self,
        name: &str,
        params: &[(&str, CType)],
        return_type: Option<CType>,
    ) -> (CfaNodeId, CfaNodeId) {
        let entry = self.add_node(name);
        let exit = self.add_node(name);
        let parameters = params
            .iter()
            .map(|(p, ty)| VarDecl::new(format!("{}::{}", name, p), *ty))
            .collect();
        self.functions.insert(
            name.to_string(),
            FunctionDef {
                name: name.to_string(),
                entry,
                exit,
                parameters,
                return_type,
            },
        );
        (entry, exit)
    }

    /// Builder for the body of a declared function
    pub fn body(&mut self, function: &str) -> FunctionBuilder<'_> {
        let locals = self
            .functions
            .get(function)
            .map(|f| {
                f.parameters
                    .iter()
                    .map(|p| (p.name.clone(), p.ty))
                    .collect()
            })
            .unwrap_or_default();
        FunctionBuilder {
            cfa: self,
            function: function.to_string(),
            locals,
        }
    }

    pub fn entry_function(&mut self, name: &str) -> &mut Self {
        self.entry = Some(name.to_string());
        self
    }

    /// Prepend the start chain (globals, entry parameters) and validate
    pub fn build(&mut self) -> Result<Cfa, ModelingError> {
        let entry_name = self
            .entry
            .clone()
            .or_else(|| self.functions.keys().next().cloned())
            .ok_or_else(|| ModelingError::malformed("no functions defined"))?;
        let entry = self
            .functions
            .get(&entry_name)
            .cloned()
            .ok_or_else(|| ModelingError::UnknownFunction(entry_name.clone()))?;

        self.line = None;
        let start = self.add_node(&entry_name);
        let mut cursor = start;
        for (decl, init) in std::mem::take(&mut self.globals) {
            let next = self.add_node(&entry_name);
            self.add_edge(
                cursor,
                next,
                EdgeKind::Declaration {
                    variable: decl.clone(),
                    initializer: init.clone(),
                },
            );
            self.globals.push((decl, init));
            cursor = next;
        }
        for param in &entry.parameters {
            let next = self.add_node(&entry_name);
            self.add_edge(
                cursor,
                next,
                EdgeKind::Declaration {
                    variable: param.clone(),
                    initializer: None,
                },
            );
            cursor = next;
        }
        self.add_edge(
            cursor,
            entry.entry,
            EdgeKind::Blank {
                description: "Function start dummy edge".to_string(),
            },
        );

        Cfa::from_document(CfaDocument {
            entry_function: entry_name,
            start,
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            functions: self.functions.values().cloned().collect(),
            globals: self.globals.iter().map(|(d, _)| d.clone()).collect(),
        })
    }
}

/// Edge-by-edge construction of one function body
///
/// Every statement method takes the node to start from and returns the
/// freshly created node after the statement.
pub struct FunctionBuilder<'a> {
    cfa: &'a mut CfaBuilder,
    function: String,
    locals: BTreeMap<String, CType>,
}

impl<'a> FunctionBuilder<'a> {
    fn qualify(&self, name: &str) -> String {
        format!("{}::{}", self.function, name)
    }

    pub fn entry(&self) -> CfaNodeId {
        self.cfa
            .functions
            .get(&self.function)
            .map(|f| f.entry)
            .unwrap_or(CfaNodeId(0))
    }

    pub fn exit(&self) -> CfaNodeId {
        self.cfa
            .functions
            .get(&self.function)
            .map(|f| f.exit)
            .unwrap_or(CfaNodeId(0))
    }

    /// Reference to a local (falls back to globals, then to an undeclared
    /// `int` that validation will reject)
    pub fn var(&self, name: &str) -> Expr {
        let qualified = self.qualify(name);
        if let Some(ty) = self.locals.get(&qualified) {
            return Expr::var(qualified, *ty);
        }
        self.cfa
            .global_var(name)
            .unwrap_or_else(|| Expr::var(qualified, CType::INT))
    }

    fn target(&self, name: &str) -> VarDecl {
        match self.var(name) {
            Expr::Var { name, ty } => VarDecl::new(name, ty),
            _ => VarDecl::new(self.qualify(name), CType::INT),
        }
    }

    pub fn at_line(&mut self, line: u32) -> &mut Self {
        self.cfa.at_line(line);
        self
    }

    pub fn node(&mut self) -> CfaNodeId {
        let function = self.function.clone();
        self.cfa.add_node(&function)
    }

    pub fn label(&mut self, node: CfaNodeId, label: &str) {
        self.cfa.nodes[node.index()].label = Some(label.to_string());
    }

    pub fn edge(&mut self, from: CfaNodeId, to: CfaNodeId, kind: EdgeKind) -> EdgeId {
        self.cfa.add_edge(from, to, kind)
    }

    pub fn blank(&mut self, from: CfaNodeId, to: CfaNodeId) -> EdgeId {
        self.edge(
            from,
            to,
            EdgeKind::Blank {
                description: String::new(),
            },
        )
    }

    pub fn declare(
        &mut self,
        from: CfaNodeId,
        name: &str,
        ty: CType,
        initializer: Option<Expr>,
    ) -> CfaNodeId {
        let qualified = self.qualify(name);
        self.locals.insert(qualified.clone(), ty);
        let next = self.node();
        self.edge(
            from,
            next,
            EdgeKind::Declaration {
                variable: VarDecl::new(qualified, ty),
                initializer,
            },
        );
        next
    }

    pub fn assign(&mut self, from: CfaNodeId, name: &str, value: Expr) -> CfaNodeId {
        let target = self.target(name);
        let next = self.node();
        self.edge(from, next, EdgeKind::Assignment { target, value });
        next
    }

    pub fn assume_edge(&mut self, from: CfaNodeId, to: CfaNodeId, condition: Expr, truth: bool) {
        self.edge(from, to, EdgeKind::Assumption { condition, truth });
    }

    /// Two-way branch; returns the (then, else) successor nodes
    pub fn branch(&mut self, from: CfaNodeId, condition: Expr) -> (CfaNodeId, CfaNodeId) {
        let then_node = self.node();
        let else_node = self.node();
        self.assume_edge(from, then_node, condition.clone(), true);
        self.assume_edge(from, else_node, condition, false);
        (then_node, else_node)
    }

    /// `return value;` (or falling off the end when `value` is `None`)
    pub fn ret(&mut self, from: CfaNodeId, value: Option<Expr>) {
        let exit = self.exit();
        let kind = match value {
            Some(value) => EdgeKind::ReturnValue {
                function: self.function.clone(),
                value,
            },
            None => EdgeKind::Blank {
                description: "default return".to_string(),
            },
        };
        self.edge(from, exit, kind);
    }

    /// Call a function with a body; returns the node after the call
    pub fn call(
        &mut self,
        from: CfaNodeId,
        callee: &str,
        arguments: Vec<Expr>,
        result: Option<&str>,
    ) -> CfaNodeId {
        let return_node = self.node();
        let (entry, exit) = self
            .cfa
            .functions
            .get(callee)
            .map(|f| (f.entry, f.exit))
            .unwrap_or((CfaNodeId(u32::MAX), CfaNodeId(u32::MAX)));
        let result = result.map(|r| self.target(r));
        self.edge(
            from,
            entry,
            EdgeKind::Call {
                callee: callee.to_string(),
                arguments,
                return_node,
            },
        );
        self.edge(
            exit,
            return_node,
            EdgeKind::Return {
                callee: callee.to_string(),
                result,
            },
        );
        return_node
    }

    /// Call a function without a body
    pub fn call_external(
        &mut self,
        from: CfaNodeId,
        callee: &str,
        arguments: Vec<Expr>,
        result: Option<&str>,
    ) -> CfaNodeId {
        let result = result.map(|r| self.target(r));
        let next = self.node();
        self.edge(
            from,
            next,
            EdgeKind::ExternalCall {
                callee: callee.to_string(),
                arguments,
                result,
            },
        );
        next
    }
}

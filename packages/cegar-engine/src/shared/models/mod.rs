//! Program model: C integer types, expressions and the control-flow automaton

pub mod cfa;
pub mod expr;
pub mod types;

pub use cfa::{
    Cfa, CfaBuilder, CfaDocument, CfaEdge, CfaNode, CfaNodeId, EdgeId, EdgeKind, FunctionBuilder,
    FunctionDef, VarDecl, RETVAL,
};
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use types::CType;

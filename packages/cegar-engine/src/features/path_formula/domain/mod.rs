//! Path formula domain: terms, SSA maps and formulas

pub mod path_formula;
pub mod ssa;
pub mod term;

pub use path_formula::{EncodedPath, PathFormula};
pub use ssa::{SsaEntry, SsaMap, SsaSymbol};
pub use term::{BvBinaryOp, BvCmpOp, BvUnaryOp, Sort, Term};

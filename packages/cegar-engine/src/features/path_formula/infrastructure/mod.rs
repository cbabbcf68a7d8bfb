//! Encoding of CFA edges into terms, and concrete term evaluation

pub mod encoder;
pub mod evaluator;

pub use encoder::{convert, PathFormulaEncoder, NONDET};
pub use evaluator::{evaluate, EvalError, Value};

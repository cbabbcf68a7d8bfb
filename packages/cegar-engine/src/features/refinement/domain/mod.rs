//! Refinement domain: predicates and precision

pub mod precision;

pub use precision::{Precision, Predicate};

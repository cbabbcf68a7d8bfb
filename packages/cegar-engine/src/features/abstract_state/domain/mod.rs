//! Composite abstract state and its sub-states

pub mod callstack;
pub mod composite;
pub mod predicate_state;

pub use callstack::{CallFrame, CallStack};
pub use composite::{CompositeState, CoverageKey};
pub use predicate_state::PredicateState;

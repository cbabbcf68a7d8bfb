//! Feature modules (vertical slices)
//!
//! path_formula → smt → automaton → abstract_state → arg → feasibility →
//! refinement, with execution and range used by ranged analysis and
//! witness validation.

pub mod abstract_state;
pub mod arg;
pub mod automaton;
pub mod execution;
pub mod feasibility;
pub mod path_formula;
pub mod range;
pub mod refinement;
pub mod smt;

pub mod model;
pub mod solver_result;

pub use model::{Model, ModelValue};
pub use solver_result::{SolverResult, UnknownCause};

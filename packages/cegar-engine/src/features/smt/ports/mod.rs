pub mod decision_procedure;

pub use decision_procedure::{DecisionProcedure, QueryLimits};

//! Concrete execution of program paths
//!
//! Used to validate `UNSAFE` witnesses and to follow the bound executions
//! of a ranged analysis.

pub mod executor;

pub use executor::{
    ConcreteExecutor, ConcreteRun, Execution, ExecutionOutcome, InputSource, NoInputs,
    StepOutcome,
};

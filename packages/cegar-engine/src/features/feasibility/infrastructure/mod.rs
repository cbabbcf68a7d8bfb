pub mod checker;

pub use checker::FeasibilityChecker;

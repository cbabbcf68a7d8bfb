pub mod counterexample;

pub use counterexample::{Counterexample, CounterexampleStep, Feasibility, InfeasibleCounterexample};

//! Common test utilities for cegar-engine
//!
//! Benchmark programs built with the CFA builder, plus helpers to walk
//! a program along chosen branches and to run the engine on it.

#![allow(dead_code)]

mod fixtures;
mod paths;

pub use fixtures::*;
pub use paths::*;

//! Shared program model and arithmetic helpers

pub mod bitvec;
pub mod models;

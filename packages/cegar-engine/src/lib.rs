/*
 * CEGAR Engine - Predicate Abstraction Verifier
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Program model (CType, Expr, Cfa) and bit-vector helpers
 * - features/    : Vertical slices (path_formula → smt → abstract_state → arg → feasibility → refinement)
 * - config/      : Presets, stage configs, YAML schema
 * - pipeline/    : CEGAR driver, verdicts, statistics
 *
 * Performance:
 * - Rayon batch expansion of the frontier
 * - Sharded coverage index, LRU abstraction cache
 */

#![allow(clippy::too_many_arguments)] // Transfer functions thread many contexts
#![allow(clippy::type_complexity)] // Refinement results pair locations and predicates
#![allow(clippy::new_without_default)] // Default impl not always meaningful
#![allow(clippy::module_inception)] // arg::domain::arg

pub mod config;
pub mod errors;
pub mod features;
pub mod pipeline;
pub mod shared;

pub use config::{EngineConfig, Preset, ValidatedConfig};
pub use errors::{EngineError, ModelingError, Result};
pub use features::automaton::Automaton;
pub use features::range::RangeInterval;
pub use features::refinement::{Precision, Predicate};
pub use pipeline::{
    CegarDriver, CegarStatistics, UnknownReason, VerificationOutcome, VerificationTask, Verdict,
    Witness,
};
pub use shared::models::{CType, Cfa, CfaBuilder, Expr};

/// Check `task` against its automata with `config`
pub fn verify(task: VerificationTask, config: ValidatedConfig) -> Result<VerificationOutcome> {
    CegarDriver::new(task.cfa, task.automata, config)?.run()
}

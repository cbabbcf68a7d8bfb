//! Engine configuration
//!
//! A [`Preset`] fixes every stage at once. Individual stages are adjusted
//! with closures on [`EngineConfig`], or from a versioned YAML file that
//! lists only the keys it changes. Either way [`EngineConfig::build`]
//! checks every bound before the driver sees a [`ValidatedConfig`].
//!
//! ```rust,ignore
//! use cegar_engine::config::{EngineConfig, PrecisionScope, Preset};
//!
//! let quick = EngineConfig::preset(Preset::Fast).build()?;
//!
//! let tuned = EngineConfig::preset(Preset::Balanced)
//!     .refinement(|r| r.scope(PrecisionScope::Global))
//!     .budget(|b| b.max_refinements(20))
//!     .build()?;
//!
//! let from_file = EngineConfig::from_yaml("verify.yaml")?;
//! ```

pub mod engine_config;
pub mod error;
pub mod io;
pub mod preset;
pub mod stage_configs;
pub mod validation;

pub use engine_config::{EngineConfig, ValidatedConfig};
pub use error::{ConfigError, ConfigResult};
pub use io::{ConfigExportV1, ConfigOverrides};
pub use preset::Preset;
pub use stage_configs::{
    AbstractionPoints, BudgetConfig, ExplorationConfig, PrecisionScope, RefinementConfig,
    RefinementStrategy, RestartStrategy, SearchOrder, SolverBackend, SolverConfig,
};
pub use validation::Validatable;

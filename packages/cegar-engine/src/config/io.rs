//! On-disk YAML layout
//!
//! A file names a preset and, optionally, a partial mapping per stage.
//! Keys left out keep the preset's value:
//!
//! ```yaml
//! version: 1
//! preset: fast
//! overrides:
//!   refinement:
//!     scope: global
//!   budget:
//!     max_refinements: 20
//! ```
//!
//! Parsing and merging happen in [`super::EngineConfig::from_yaml_str`].

use serde::{Deserialize, Serialize};

/// The only layout this build reads and writes
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigExportV1 {
    /// Absent in hand-written files that forgot it; rejected on load
    #[serde(default)]
    pub version: Option<u32>,

    pub preset: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<ConfigOverrides>,
}

/// Raw YAML per stage, merged key by key over the preset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exploration: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinement: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<serde_yaml::Value>,
}

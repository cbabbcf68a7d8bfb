//! Errors raised while assembling an engine configuration

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric setting outside its accepted bounds
    #[error("{field} = {value} is outside {min}..={max} ({reason})")]
    Range {
        field: String,
        value: String,
        min: String,
        max: String,
        reason: String,
    },

    #[error("configuration file has no `version` key; start it with `version: {}`", super::io::SCHEMA_VERSION)]
    MissingVersion,

    #[error("configuration schema version {found} is not readable by this build (expects {})", super::io::SCHEMA_VERSION)]
    UnsupportedVersion { found: u32 },

    #[error("no preset named '{0}' (choose one of {})", super::preset::Preset::NAMES.join(", "))]
    UnknownPreset(String),

    /// Settings of two stages that cannot hold together
    #[error("conflicting settings: {detail}; {remedy}")]
    Conflict { detail: String, remedy: String },

    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Fails with [`ConfigError::Range`] when `value` leaves `min..=max`
pub(crate) fn check_range<T>(field: &str, value: T, min: T, max: T, reason: &str) -> ConfigResult<()>
where
    T: PartialOrd + ToString,
{
    if value >= min && value <= max {
        return Ok(());
    }
    Err(ConfigError::Range {
        field: field.to_string(),
        value: value.to_string(),
        min: min.to_string(),
        max: max.to_string(),
        reason: reason.to_string(),
    })
}

//! Named starting points for a configuration

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every stage derives its defaults from one of these.
///
/// | preset   | ARG nodes | refinements | query timeout | run timeout |
/// |----------|-----------|-------------|---------------|-------------|
/// | fast     | 10k       | 10          | 2s            | 30s         |
/// | balanced | 100k      | 50          | 10s           | 5m          |
/// | thorough | 1M        | 200         | 60s           | 1h          |
///
/// `custom` starts from the balanced values and is meant to be overridden
/// in YAML.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Fast,
    #[default]
    Balanced,
    Thorough,
    Custom,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Self::Fast, Self::Balanced, Self::Thorough, Self::Custom];
    pub const NAMES: [&'static str; 4] = ["fast", "balanced", "thorough", "custom"];

    pub fn as_str(&self) -> &'static str {
        Self::NAMES[*self as usize]
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

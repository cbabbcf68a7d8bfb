//! Engine configuration
//!
//! Preset-based defaults with closure overrides per stage, validated once
//! by [`EngineConfig::build`].

use super::{
    error::{ConfigError, ConfigResult},
    io::{ConfigExportV1, ConfigOverrides, SCHEMA_VERSION},
    preset::Preset,
    stage_configs::*,
    validation::validate_stage,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Engine configuration under construction
#[derive(Debug, Clone)]
pub struct EngineConfig {
    preset: Preset,
    exploration: Option<ExplorationConfig>,
    solver: Option<SolverConfig>,
    refinement: Option<RefinementConfig>,
    budget: Option<BudgetConfig>,
}

impl EngineConfig {
    /// Start from the values of `preset`
    pub fn preset(preset: Preset) -> Self {
        Self {
            preset,
            exploration: None,
            solver: None,
            refinement: None,
            budget: None,
        }
    }

    /// Adjust the exploration settings
    pub fn exploration<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ExplorationConfig) -> ExplorationConfig,
    {
        let base = self
            .exploration
            .take()
            .unwrap_or_else(|| ExplorationConfig::from_preset(self.preset));
        self.exploration = Some(f(base));
        self
    }

    /// Adjust the solver settings
    pub fn solver<F>(mut self, f: F) -> Self
    where
        F: FnOnce(SolverConfig) -> SolverConfig,
    {
        let base = self
            .solver
            .take()
            .unwrap_or_else(|| SolverConfig::from_preset(self.preset));
        self.solver = Some(f(base));
        self
    }

    /// Adjust the refinement settings
    pub fn refinement<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RefinementConfig) -> RefinementConfig,
    {
        let base = self
            .refinement
            .take()
            .unwrap_or_else(|| RefinementConfig::from_preset(self.preset));
        self.refinement = Some(f(base));
        self
    }

    /// Adjust the resource budget
    pub fn budget<F>(mut self, f: F) -> Self
    where
        F: FnOnce(BudgetConfig) -> BudgetConfig,
    {
        let base = self
            .budget
            .take()
            .unwrap_or_else(|| BudgetConfig::from_preset(self.preset));
        self.budget = Some(f(base));
        self
    }

    /// Validate every stage and cross-stage constraints
    pub fn build(self) -> ConfigResult<ValidatedConfig> {
        let preset = self.preset;
        let resolved = ValidatedConfig {
            preset,
            exploration: self
                .exploration
                .unwrap_or_else(|| ExplorationConfig::from_preset(preset)),
            solver: self
                .solver
                .unwrap_or_else(|| SolverConfig::from_preset(preset)),
            refinement: self
                .refinement
                .unwrap_or_else(|| RefinementConfig::from_preset(preset)),
            budget: self
                .budget
                .unwrap_or_else(|| BudgetConfig::from_preset(preset)),
        };

        validate_stage(&resolved.exploration)?;
        validate_stage(&resolved.solver)?;
        validate_stage(&resolved.refinement)?;
        validate_stage(&resolved.budget)?;
        resolved.cross_validate()?;
        Ok(resolved)
    }

    /// Read a versioned YAML file (see [`super::io`])
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<ValidatedConfig> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<ValidatedConfig> {
        let export: ConfigExportV1 = serde_yaml::from_str(content)?;

        match export.version {
            None => return Err(ConfigError::MissingVersion),
            Some(SCHEMA_VERSION) => {}
            Some(found) => return Err(ConfigError::UnsupportedVersion { found }),
        }

        let preset: Preset = export.preset.parse()?;
        let mut config = Self::preset(preset);

        if let Some(overrides) = export.overrides {
            if let Some(patch) = overrides.exploration {
                config.exploration = Some(overlay(
                    &ExplorationConfig::from_preset(preset),
                    patch,
                    "exploration",
                )?);
            }
            if let Some(patch) = overrides.solver {
                config.solver = Some(overlay(&SolverConfig::from_preset(preset), patch, "solver")?);
            }
            if let Some(patch) = overrides.refinement {
                config.refinement = Some(overlay(
                    &RefinementConfig::from_preset(preset),
                    patch,
                    "refinement",
                )?);
            }
            if let Some(patch) = overrides.budget {
                config.budget = Some(overlay(&BudgetConfig::from_preset(preset), patch, "budget")?);
            }
        }

        config.build()
    }
}

/// Replace the keys of `base` that appear in `patch`
fn overlay<T>(base: &T, patch: serde_yaml::Value, stage: &str) -> ConfigResult<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_yaml::to_value(base)?;
    match (&mut value, patch) {
        (_, serde_yaml::Value::Null) => {}
        (serde_yaml::Value::Mapping(fields), serde_yaml::Value::Mapping(patch)) => {
            for (key, v) in patch {
                fields.insert(key, v);
            }
        }
        _ => {
            return Err(ConfigError::Validation(format!(
                "overrides.{} must be a mapping",
                stage
            )))
        }
    }
    Ok(serde_yaml::from_value(value)?)
}

/// Configuration whose every bound has been checked
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    preset: Preset,
    exploration: ExplorationConfig,
    solver: SolverConfig,
    refinement: RefinementConfig,
    budget: BudgetConfig,
}

impl Default for ValidatedConfig {
    fn default() -> Self {
        let preset = Preset::Balanced;
        Self {
            preset,
            exploration: ExplorationConfig::from_preset(preset),
            solver: SolverConfig::from_preset(preset),
            refinement: RefinementConfig::from_preset(preset),
            budget: BudgetConfig::from_preset(preset),
        }
    }
}

impl ValidatedConfig {
    fn cross_validate(&self) -> ConfigResult<()> {
        let analysis_ms = self.budget.analysis_timeout_secs.saturating_mul(1000);
        if analysis_ms > 0 && self.solver.timeout_ms > analysis_ms {
            return Err(ConfigError::Conflict {
                detail: format!(
                    "solver timeout {}ms exceeds the analysis timeout {}s",
                    self.solver.timeout_ms, self.budget.analysis_timeout_secs
                ),
                remedy: "lower solver.timeout_ms or raise budget.analysis_timeout_secs".to_string(),
            });
        }
        if self.exploration.order == SearchOrder::Dfs && self.exploration.batch_size > 1 {
            tracing::debug!("batch_size is ignored for depth-first exploration");
        }
        Ok(())
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn exploration(&self) -> &ExplorationConfig {
        &self.exploration
    }

    pub fn solver(&self) -> &SolverConfig {
        &self.solver
    }

    pub fn refinement(&self) -> &RefinementConfig {
        &self.refinement
    }

    pub fn budget(&self) -> &BudgetConfig {
        &self.budget
    }

    /// One-line description for logs
    pub fn describe(&self) -> String {
        format!(
            "{} [order={:?}, solver={:?}, refinement={:?}/{:?}/{:?}, nodes<={}, refinements<={}]",
            self.preset,
            self.exploration.order,
            self.solver.backend,
            self.refinement.strategy,
            self.refinement.scope,
            self.refinement.restart,
            self.budget.max_arg_nodes,
            self.budget.max_refinements,
        )
    }

    /// Export to YAML (every stage written out in full)
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let export = ConfigExportV1 {
            version: Some(SCHEMA_VERSION),
            preset: self.preset.to_string(),
            overrides: Some(ConfigOverrides {
                exploration: Some(serde_yaml::to_value(&self.exploration)?),
                solver: Some(serde_yaml::to_value(&self.solver)?),
                refinement: Some(serde_yaml::to_value(&self.refinement)?),
                budget: Some(serde_yaml::to_value(&self.budget)?),
            }),
        };
        Ok(serde_yaml::to_string(&export)?)
    }
}

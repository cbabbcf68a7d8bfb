//! Per-stage validation

use super::error::{ConfigError, ConfigResult};

/// A stage configuration that can check its own bounds
pub trait Validatable {
    /// Key of the stage under `overrides:` in the YAML file
    fn stage(&self) -> &'static str;

    fn validate(&self) -> ConfigResult<()>;
}

/// Validate `config`, prefixing out-of-range fields with the stage key so
/// the message points at the YAML path (`budget.max_arg_nodes`)
pub(crate) fn validate_stage<C: Validatable>(config: &C) -> ConfigResult<()> {
    config.validate().map_err(|err| match err {
        ConfigError::Range {
            field,
            value,
            min,
            max,
            reason,
        } => ConfigError::Range {
            field: format!("{}.{}", config.stage(), field),
            value,
            min,
            max,
            reason,
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BudgetConfig;

    #[test]
    fn test_range_errors_carry_the_stage_key() {
        let budget = BudgetConfig::default().max_refinements(0);
        let err = validate_stage(&budget).unwrap_err();
        assert!(err.to_string().starts_with("budget.max_refinements = 0"));
    }

    #[test]
    fn test_valid_stage_passes() {
        assert!(validate_stage(&BudgetConfig::default()).is_ok());
    }
}

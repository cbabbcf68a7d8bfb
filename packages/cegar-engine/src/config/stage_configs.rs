//! Settings of the four engine stages
//!
//! One struct per engine stage, each with its own validation, preset
//! values and builder setters.

use super::error::{check_range, ConfigResult};
use super::preset::Preset;
use super::validation::Validatable;
use serde::{Deserialize, Serialize};

// ============================================================================
// Exploration
// ============================================================================

/// Order in which frontier nodes are expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOrder {
    /// Breadth-first; frontier batches are expanded in parallel
    Bfs,
    /// Depth-first; one node at a time
    Dfs,
}

/// Where the predicate abstraction is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstractionPoints {
    /// Loop heads, function entries/exits and error locations
    LoopHeads,
    /// Every CFA node (single-block encoding)
    EveryNode,
}

/// ARG exploration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExplorationConfig {
    pub order: SearchOrder,

    pub abstraction_points: AbstractionPoints,

    /// Frontier nodes expanded per step (1..=10000, BFS only)
    pub batch_size: usize,

    /// Compute successors of a batch with rayon
    pub parallel: bool,

    /// Worker threads (0 = 75% of the available cores, 0..=256)
    pub num_threads: usize,

    /// Encode `x * 2^k` as a left shift
    pub shift_for_power_of_two: bool,

    /// Replay counterexamples concretely before reporting them
    pub validate_witness: bool,
}

impl ExplorationConfig {
    pub fn from_preset(preset: Preset) -> Self {
        let base = Self {
            order: SearchOrder::Bfs,
            abstraction_points: AbstractionPoints::LoopHeads,
            batch_size: 64,
            parallel: true,
            num_threads: 0,
            shift_for_power_of_two: true,
            validate_witness: true,
        };
        match preset {
            Preset::Fast => Self {
                batch_size: 128,
                validate_witness: false,
                ..base
            },
            Preset::Balanced | Preset::Custom => base,
            Preset::Thorough => Self {
                batch_size: 32,
                ..base
            },
        }
    }

    /// Builder: Set order
    pub fn order(mut self, v: SearchOrder) -> Self {
        self.order = v;
        self
    }

    /// Builder: Set abstraction_points
    pub fn abstraction_points(mut self, v: AbstractionPoints) -> Self {
        self.abstraction_points = v;
        self
    }

    /// Builder: Set batch_size
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Builder: Set parallel
    pub fn parallel(mut self, v: bool) -> Self {
        self.parallel = v;
        self
    }

    /// Builder: Set num_threads
    pub fn num_threads(mut self, v: usize) -> Self {
        self.num_threads = v;
        self
    }

    /// Builder: Set shift_for_power_of_two
    pub fn shift_for_power_of_two(mut self, v: bool) -> Self {
        self.shift_for_power_of_two = v;
        self
    }

    /// Builder: Set validate_witness
    pub fn validate_witness(mut self, v: bool) -> Self {
        self.validate_witness = v;
        self
    }
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}

impl Validatable for ExplorationConfig {
    fn validate(&self) -> ConfigResult<()> {
        check_range(
            "batch_size",
            self.batch_size,
            1,
            10_000,
            "a batch holds at least one frontier node",
        )?;
        check_range(
            "num_threads",
            self.num_threads,
            0,
            256,
            "0 sizes the pool from the core count",
        )
    }

    fn stage(&self) -> &'static str {
        "exploration"
    }
}

// ============================================================================
// Solver
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverBackend {
    /// In-house bit-blasting + CDCL
    BitBlast,
    /// Z3 (requires the `z3` feature)
    Z3,
}

/// Decision procedure configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    pub backend: SolverBackend,

    /// Per-query timeout in milliseconds (1..=3600000)
    pub timeout_ms: u64,

    /// Per-query SAT conflict budget (None = unlimited)
    pub conflict_limit: Option<u64>,

    /// Retries of an undecided query, each with doubled limits (0..=10)
    pub retries: u32,

    /// Cached abstraction results (0 disables the cache, 0..=1000000)
    pub abstraction_cache_size: usize,
}

impl SolverConfig {
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                backend: SolverBackend::BitBlast,
                timeout_ms: 2_000,
                conflict_limit: Some(100_000),
                retries: 0,
                abstraction_cache_size: 1_024,
            },
            Preset::Balanced | Preset::Custom => Self {
                backend: SolverBackend::BitBlast,
                timeout_ms: 10_000,
                conflict_limit: None,
                retries: 1,
                abstraction_cache_size: 4_096,
            },
            Preset::Thorough => Self {
                backend: SolverBackend::BitBlast,
                timeout_ms: 60_000,
                conflict_limit: None,
                retries: 2,
                abstraction_cache_size: 16_384,
            },
        }
    }

    /// Builder: Set backend
    pub fn backend(mut self, v: SolverBackend) -> Self {
        self.backend = v;
        self
    }

    /// Builder: Set timeout_ms
    pub fn timeout_ms(mut self, v: u64) -> Self {
        self.timeout_ms = v;
        self
    }

    /// Builder: Set conflict_limit
    pub fn conflict_limit(mut self, v: Option<u64>) -> Self {
        self.conflict_limit = v;
        self
    }

    /// Builder: Set retries
    pub fn retries(mut self, v: u32) -> Self {
        self.retries = v;
        self
    }

    /// Builder: Set abstraction_cache_size
    pub fn abstraction_cache_size(mut self, v: usize) -> Self {
        self.abstraction_cache_size = v;
        self
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}

impl Validatable for SolverConfig {
    fn validate(&self) -> ConfigResult<()> {
        check_range(
            "timeout_ms",
            self.timeout_ms,
            1,
            3_600_000,
            "Solver timeout should be at most 1 hour",
        )?;
        if let Some(limit) = self.conflict_limit {
            check_range(
                "conflict_limit",
                limit,
                1,
                u64::MAX >> 16,
                "A zero conflict budget cannot decide anything",
            )?;
        }
        check_range(
            "retries",
            self.retries,
            0,
            10,
            "Each retry doubles the budget; more than 10 is never useful",
        )?;
        check_range(
            "abstraction_cache_size",
            self.abstraction_cache_size,
            0,
            1_000_000,
            "Cache size must be reasonable (0=disabled)",
        )
    }

    fn stage(&self) -> &'static str {
        "solver"
    }
}

// ============================================================================
// Refinement
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementStrategy {
    /// Template interpolants per abstraction point, core as fallback
    Interpolation,
    /// Atoms of the unsat core only
    UnsatCore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionScope {
    /// Predicates are tracked where they were discovered
    Local,
    /// Predicates are tracked at every location
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartStrategy {
    /// Re-explore below the first node whose precision changed
    Pivot,
    /// Rebuild the whole ARG
    Root,
}

/// Predicate refinement configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefinementConfig {
    pub strategy: RefinementStrategy,
    pub scope: PrecisionScope,
    pub restart: RestartStrategy,

    /// Interpolant candidates examined per cut point (1..=4096)
    pub max_candidates: usize,
}

impl RefinementConfig {
    pub fn from_preset(preset: Preset) -> Self {
        let base = Self {
            strategy: RefinementStrategy::Interpolation,
            scope: PrecisionScope::Local,
            restart: RestartStrategy::Pivot,
            max_candidates: 64,
        };
        match preset {
            Preset::Fast => Self {
                max_candidates: 32,
                ..base
            },
            Preset::Balanced | Preset::Custom => base,
            Preset::Thorough => Self {
                max_candidates: 256,
                ..base
            },
        }
    }

    /// Builder: Set strategy
    pub fn strategy(mut self, v: RefinementStrategy) -> Self {
        self.strategy = v;
        self
    }

    /// Builder: Set scope
    pub fn scope(mut self, v: PrecisionScope) -> Self {
        self.scope = v;
        self
    }

    /// Builder: Set restart
    pub fn restart(mut self, v: RestartStrategy) -> Self {
        self.restart = v;
        self
    }

    /// Builder: Set max_candidates
    pub fn max_candidates(mut self, v: usize) -> Self {
        self.max_candidates = v;
        self
    }
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}

impl Validatable for RefinementConfig {
    fn validate(&self) -> ConfigResult<()> {
        check_range(
            "max_candidates",
            self.max_candidates,
            1,
            4_096,
            "Each candidate costs two solver queries",
        )
    }

    fn stage(&self) -> &'static str {
        "refinement"
    }
}

// ============================================================================
// Budget
// ============================================================================

/// Resource bounds; exceeding any of them ends the run with UNKNOWN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetConfig {
    /// Live ARG nodes (1..=100000000)
    pub max_arg_nodes: usize,

    /// CEGAR refinements (1..=100000)
    pub max_refinements: usize,

    /// Distinct tracked predicates (1..=1000000)
    pub max_predicates: usize,

    /// Wall-clock limit in seconds (0 = unlimited, 0..=86400)
    pub analysis_timeout_secs: u64,

    /// Nesting depth of the call stack (1..=10000)
    pub max_call_depth: usize,
}

impl BudgetConfig {
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                max_arg_nodes: 10_000,
                max_refinements: 10,
                max_predicates: 100,
                analysis_timeout_secs: 30,
                max_call_depth: 32,
            },
            Preset::Balanced | Preset::Custom => Self {
                max_arg_nodes: 100_000,
                max_refinements: 50,
                max_predicates: 500,
                analysis_timeout_secs: 300,
                max_call_depth: 64,
            },
            Preset::Thorough => Self {
                max_arg_nodes: 1_000_000,
                max_refinements: 200,
                max_predicates: 2_000,
                analysis_timeout_secs: 3_600,
                max_call_depth: 128,
            },
        }
    }

    /// Builder: Set max_arg_nodes
    pub fn max_arg_nodes(mut self, v: usize) -> Self {
        self.max_arg_nodes = v;
        self
    }

    /// Builder: Set max_refinements
    pub fn max_refinements(mut self, v: usize) -> Self {
        self.max_refinements = v;
        self
    }

    /// Builder: Set max_predicates
    pub fn max_predicates(mut self, v: usize) -> Self {
        self.max_predicates = v;
        self
    }

    /// Builder: Set analysis_timeout_secs
    pub fn analysis_timeout_secs(mut self, v: u64) -> Self {
        self.analysis_timeout_secs = v;
        self
    }

    /// Builder: Set max_call_depth
    pub fn max_call_depth(mut self, v: usize) -> Self {
        self.max_call_depth = v;
        self
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}

impl Validatable for BudgetConfig {
    fn validate(&self) -> ConfigResult<()> {
        check_range(
            "max_arg_nodes",
            self.max_arg_nodes,
            1,
            100_000_000,
            "The ARG needs room for at least the root",
        )?;
        check_range(
            "max_refinements",
            self.max_refinements,
            1,
            100_000,
            "Refinement count must be finite",
        )?;
        check_range(
            "max_predicates",
            self.max_predicates,
            1,
            1_000_000,
            "Predicate count must be reasonable",
        )?;
        check_range(
            "analysis_timeout_secs",
            self.analysis_timeout_secs,
            0,
            86_400,
            "Analysis timeout should be at most one day (0=unlimited)",
        )?;
        check_range(
            "max_call_depth",
            self.max_call_depth,
            1,
            10_000,
            "Call depth must allow at least the entry function",
        )
    }

    fn stage(&self) -> &'static str {
        "budget"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_scale_budgets() {
        let fast = BudgetConfig::from_preset(Preset::Fast);
        let balanced = BudgetConfig::from_preset(Preset::Balanced);
        let thorough = BudgetConfig::from_preset(Preset::Thorough);
        assert_eq!(fast.max_arg_nodes, 10_000);
        assert_eq!(balanced.max_arg_nodes, 100_000);
        assert_eq!(thorough.max_arg_nodes, 1_000_000);
        assert!(fast.max_refinements < balanced.max_refinements);
        assert!(balanced.analysis_timeout_secs < thorough.analysis_timeout_secs);
    }

    #[test]
    fn test_all_presets_validate() {
        for preset in [Preset::Fast, Preset::Balanced, Preset::Thorough, Preset::Custom] {
            ExplorationConfig::from_preset(preset).validate().unwrap();
            SolverConfig::from_preset(preset).validate().unwrap();
            RefinementConfig::from_preset(preset).validate().unwrap();
            BudgetConfig::from_preset(preset).validate().unwrap();
        }
    }

    #[test]
    fn test_builder_setters() {
        let cfg = RefinementConfig::default()
            .scope(PrecisionScope::Global)
            .restart(RestartStrategy::Root)
            .max_candidates(8);
        assert_eq!(cfg.scope, PrecisionScope::Global);
        assert_eq!(cfg.restart, RestartStrategy::Root);
        assert_eq!(cfg.max_candidates, 8);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = ExplorationConfig::default().batch_size(0).validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_zero_conflict_limit_is_rejected() {
        let cfg = SolverConfig::default().conflict_limit(Some(0));
        assert!(cfg.validate().is_err());
        assert!(SolverConfig::default().conflict_limit(None).validate().is_ok());
    }
}

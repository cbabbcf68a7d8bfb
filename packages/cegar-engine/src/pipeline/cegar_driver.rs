//! CEGAR driver
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     CegarDriver::run()                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Exploring ──target──▶ Checking ──spurious──▶ Refining       │
//! │      │                    │                      │           │
//! │      │ frontier empty     │ feasible             │ pivot /   │
//! │      ▼                    ▼                      │ root      │
//! │  Done(SAFE)          Done(UNSAFE)                ▼           │
//! │                                              Exploring       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Solver failures and exhausted budgets end the run with `UNKNOWN`
//! (plus the remaining range when a budget ran out). Modeling errors and
//! refinement stalls are returned as errors.

use super::statistics::CegarStatistics;
use super::verdict::{Resource, UnknownReason, Verdict, Witness};
use crate::config::{BudgetConfig, SearchOrder, ValidatedConfig};
use crate::errors::{EngineError, Result};
use crate::features::abstract_state::domain::CompositeState;
use crate::features::abstract_state::infrastructure::{
    AbstractionPolicy, PredicateAbstractor, TransferRelation,
};
use crate::features::arg::domain::{Arg, ArgNodeId};
use crate::features::arg::infrastructure::{
    ExplorationLimits, ExplorationResult, ExplorationStats, Explorer, ReachedSet,
};
use crate::features::automaton::{Automaton, AutomatonProduct};
use crate::features::feasibility::{
    Counterexample, Feasibility, FeasibilityChecker, InfeasibleCounterexample,
};
use crate::features::path_formula::infrastructure::PathFormulaEncoder;
use crate::features::range::{PathRangeGenerator, RangeInterval, RangeRestriction};
use crate::features::refinement::{Precision, Refiner};
use crate::features::smt::{create_decision_procedure, InstrumentedSolver, QueryLimits};
use crate::shared::models::Cfa;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything a finished analysis reports
#[derive(Debug)]
pub struct VerificationOutcome {
    pub verdict: Verdict,
    pub statistics: CegarStatistics,
    /// Final precision
    pub precision: Precision,
    /// Final ARG
    pub arg: Arg,
    /// Input range not yet analysed (budget exhaustion only)
    pub remaining_range: Option<RangeInterval>,
}

#[derive(Debug)]
enum Phase {
    Exploring,
    Checking(ArgNodeId),
    Refining(Box<InfeasibleCounterexample>),
    Done(Verdict),
}

pub struct CegarDriver {
    cfa: Arc<Cfa>,
    product: Arc<AutomatonProduct>,
    config: ValidatedConfig,
    range: Option<RangeInterval>,
    initial_precision: Precision,
}

impl CegarDriver {
    pub fn new(cfa: Cfa, automata: Vec<Automaton>, config: ValidatedConfig) -> Result<Self> {
        let product = AutomatonProduct::new(automata)?;
        Ok(Self {
            cfa: Arc::new(cfa),
            product: Arc::new(product),
            config,
            range: None,
            initial_precision: Precision::new(),
        })
    }

    /// Only analyse the paths between the executions of the two bounds
    pub fn with_range(mut self, range: RangeInterval) -> Self {
        self.range = Some(range);
        self
    }

    /// Start from `precision` instead of the empty precision
    pub fn with_initial_precision(mut self, precision: Precision) -> Self {
        self.initial_precision = precision;
        self
    }

    pub fn cfa(&self) -> &Cfa {
        &self.cfa
    }

    pub fn product(&self) -> &AutomatonProduct {
        &self.product
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    pub fn run(&self) -> Result<VerificationOutcome> {
        let started = Instant::now();
        info!(config = %self.config.describe(), "starting analysis");

        let exploration = self.config.exploration();
        let solver_config = self.config.solver();
        let budget = self.config.budget();
        let encoder = PathFormulaEncoder::new(exploration.shift_for_power_of_two);

        let backend = create_decision_procedure(solver_config.backend)?;
        let query_limits = QueryLimits {
            timeout: Some(Duration::from_millis(solver_config.timeout_ms)),
            conflict_limit: solver_config.conflict_limit,
        };
        let solver = Arc::new(InstrumentedSolver::new(
            backend,
            query_limits,
            solver_config.retries,
        ));

        let mut transfer = TransferRelation::new(
            self.cfa.clone(),
            self.product.clone(),
            encoder,
            budget.max_call_depth,
        );
        let initial_range = self.range.clone().unwrap_or_else(RangeInterval::unbounded);
        if !initial_range.is_unbounded() {
            info!(range = %initial_range, "restricting analysis to range");
            transfer = transfer.with_range(RangeRestriction::new(initial_range.clone(), encoder));
        }
        let abstractor = PredicateAbstractor::new(
            solver.clone(),
            encoder,
            solver_config.abstraction_cache_size,
        );

        let pool = thread_pool(exploration.parallel, exploration.num_threads);
        let mut explorer = Explorer::new(
            &transfer,
            &abstractor,
            AbstractionPolicy::new(exploration.abstraction_points),
            exploration.batch_size,
        );
        if let Some(pool) = &pool {
            explorer = explorer.with_pool(pool);
        }

        let timeout = (budget.analysis_timeout_secs > 0)
            .then(|| Duration::from_secs(budget.analysis_timeout_secs));
        let limits = ExplorationLimits {
            max_arg_nodes: budget.max_arg_nodes,
            deadline: timeout.map(|t| started + t),
            timeout,
        };

        let initial = transfer.initial_state();
        let mut session = Session {
            cfa: &self.cfa,
            explorer,
            checker: FeasibilityChecker::new(self.cfa.clone(), solver.clone(), encoder),
            refiner: Refiner::new(self.config.refinement().clone(), solver.clone(), encoder),
            limits,
            budget,
            validate_witness: exploration.validate_witness,
            order: exploration.order,
            reached: ReachedSet::new(initial.clone(), exploration.order),
            initial,
            precision: self.initial_precision.clone(),
            statistics: CegarStatistics::new(),
            explored: ExplorationStats::default(),
        };

        let (verdict, remaining_range) = match session.drive() {
            Ok(verdict) => (verdict, None),
            Err(err) => match UnknownReason::from_error(&err) {
                Some(reason) => {
                    warn!(%reason, "analysis inconclusive");
                    let remaining = if reason.is_resource_exhaustion() {
                        session.remaining_range(&solver, &initial_range)
                    } else {
                        None
                    };
                    (Verdict::Unknown { reason }, remaining)
                }
                None => return Err(err),
            },
        };

        let mut statistics = session.statistics;
        statistics.arg_nodes_created = session.explored.nodes_created + 1;
        statistics.arg_nodes_final = session.reached.arg.len();
        statistics.covered_nodes = session.explored.covered;
        statistics.bottom_nodes = session.explored.bottom;
        statistics.refinements = session.refiner.refinements();
        statistics.predicates = session.precision.distinct_predicates();
        statistics.abstractions = abstractor.computed();
        statistics.abstraction_cache_hits = abstractor.cache_hits();
        statistics.solver = solver.stats();
        statistics.total_duration = started.elapsed();

        info!(
            %verdict,
            iterations = statistics.iterations,
            refinements = statistics.refinements,
            nodes = statistics.arg_nodes_final,
            elapsed_ms = statistics.total_duration.as_millis() as u64,
            "analysis finished"
        );
        Ok(VerificationOutcome {
            verdict,
            statistics,
            precision: session.precision,
            arg: session.reached.arg,
            remaining_range,
        })
    }
}

/// Mutable state of one run
struct Session<'a> {
    cfa: &'a Cfa,
    explorer: Explorer<'a>,
    checker: FeasibilityChecker,
    refiner: Refiner,
    limits: ExplorationLimits,
    budget: &'a BudgetConfig,
    validate_witness: bool,
    order: SearchOrder,
    initial: CompositeState,
    reached: ReachedSet,
    precision: Precision,
    statistics: CegarStatistics,
    explored: ExplorationStats,
}

impl Session<'_> {
    fn drive(&mut self) -> Result<Verdict> {
        let mut phase = Phase::Exploring;
        loop {
            phase = match phase {
                Phase::Exploring => self.explore()?,
                Phase::Checking(target) => self.check(target)?,
                Phase::Refining(infeasible) => self.refine(&infeasible)?,
                Phase::Done(verdict) => return Ok(verdict),
            };
        }
    }

    fn explore(&mut self) -> Result<Phase> {
        self.statistics.iterations += 1;
        debug!(iteration = self.statistics.iterations, "exploring");
        let started = Instant::now();
        let result = self.explorer.explore(
            &mut self.reached,
            &self.precision,
            &self.limits,
            &mut self.explored,
        );
        self.statistics.record_phase("exploration", started.elapsed());
        Ok(match result? {
            ExplorationResult::TargetReached(target) => Phase::Checking(target),
            ExplorationResult::Exhausted => Phase::Done(Verdict::Safe),
        })
    }

    fn check(&mut self, target: ArgNodeId) -> Result<Phase> {
        self.limits.check_time()?;
        let started = Instant::now();
        let counterexample = Counterexample::from_arg(&self.reached.arg, target);
        let feasibility = self.checker.check(&counterexample);
        self.statistics.record_phase("feasibility", started.elapsed());

        match feasibility? {
            Feasibility::Feasible { model } => {
                self.statistics.feasible_counterexamples += 1;
                let mut witness = Witness::new(self.cfa, &counterexample.edges(), model);
                if self.validate_witness {
                    let valid = self.checker.validate_witness(&counterexample, &witness.model)?;
                    if !valid {
                        warn!(%target, "witness replay disagrees with the model");
                    }
                    witness.validated = Some(valid);
                }
                info!(%target, steps = counterexample.len(), "feasible counterexample");
                Ok(Phase::Done(Verdict::unsafe_with(witness)))
            }
            Feasibility::Infeasible(infeasible) => {
                self.statistics.spurious_counterexamples += 1;
                debug!(%target, steps = counterexample.len(), "spurious counterexample");
                Ok(Phase::Refining(Box::new(infeasible)))
            }
        }
    }

    fn refine(&mut self, infeasible: &InfeasibleCounterexample) -> Result<Phase> {
        self.limits.check_time()?;
        if self.refiner.refinements() >= self.budget.max_refinements {
            return Err(EngineError::exhausted(
                Resource::Refinements,
                self.budget.max_refinements,
            ));
        }

        let started = Instant::now();
        let result = self
            .refiner
            .refine(self.cfa, &self.reached.arg, infeasible, &mut self.precision);
        self.statistics.record_phase("refinement", started.elapsed());
        let result = result?;

        if self.precision.distinct_predicates() > self.budget.max_predicates {
            return Err(EngineError::exhausted(
                Resource::Predicates,
                self.budget.max_predicates,
            ));
        }

        match result.pivot {
            Some(pivot) => {
                self.reached.prune_below(pivot);
            }
            None => {
                debug!("restarting from the root");
                self.reached = ReachedSet::new(self.initial.clone(), self.order);
            }
        }
        Ok(Phase::Exploring)
    }

    /// `[model of the first unexplored path, initial end]`
    fn remaining_range(
        &self,
        solver: &InstrumentedSolver,
        initial: &RangeInterval,
    ) -> Option<RangeInterval> {
        let Some(frontier) = self.reached.first_frontier() else {
            return Some(initial.clone());
        };
        let path = Counterexample::from_arg(&self.reached.arg, frontier);
        let generated = self
            .checker
            .encode(&path)
            .and_then(|encoded| PathRangeGenerator::new(self.cfa, solver).generate(&encoded, initial));
        match generated {
            Ok(range) => Some(range),
            Err(err) => {
                warn!(%err, "could not compute the remaining range");
                None
            }
        }
    }
}

/// Worker pool for batch expansion; `None` runs sequentially
fn thread_pool(parallel: bool, num_threads: usize) -> Option<rayon::ThreadPool> {
    if !parallel || !cfg!(feature = "parallel") {
        return None;
    }
    let threads = match num_threads {
        0 => (num_cpus::get() * 3 / 4).max(1),
        n => n,
    };
    if threads == 1 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("cegar-worker-{}", i))
        .build()
    {
        Ok(pool) => {
            debug!(threads, "expansion pool ready");
            Some(pool)
        }
        Err(err) => {
            warn!(%err, "could not build the worker pool, expanding sequentially");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, Preset, RestartStrategy};
    use crate::shared::models::{CType, CfaBuilder, Expr};

    /// `x = 0; while (x < 10) x++; if (x != 10) ERROR;`
    fn counter(bound: i64) -> Cfa {
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("main", &[], Some(CType::INT));
        let mut main = cfa.body("main");
        let n1 = main.declare(main.entry(), "x", CType::INT, Some(Expr::int(0)));
        let head = main.node();
        main.blank(n1, head);
        let x = main.var("x");
        let (body, done) = main.branch(head, Expr::lt(x.clone(), Expr::int(10)));
        let incremented = main.assign(body, "x", Expr::add(x.clone(), Expr::int(1)));
        main.blank(incremented, head);
        let (bad, good) = main.branch(done, Expr::ne(x, Expr::int(bound)));
        let error = main.node();
        main.label(error, "ERROR");
        main.blank(bad, error);
        main.ret(error, Some(Expr::int(1)));
        main.ret(good, Some(Expr::int(0)));
        cfa.entry_function("main").build().unwrap()
    }

    fn run(cfa: Cfa, config: ValidatedConfig) -> VerificationOutcome {
        CegarDriver::new(cfa, vec![Automaton::reach_error()], config)
            .unwrap()
            .run()
            .unwrap()
    }

    #[test]
    fn test_counter_loop_is_safe_after_refinement() {
        let outcome = run(counter(10), EngineConfig::preset(Preset::Balanced).build().unwrap());
        assert!(outcome.verdict.is_safe(), "got {}", outcome.verdict);
        assert_eq!(outcome.statistics.refinements, 2);
        assert_eq!(outcome.statistics.spurious_counterexamples, 2);
        assert_eq!(outcome.statistics.iterations, 3);
        assert!(outcome.statistics.covered_nodes >= 1);
        assert!(outcome.remaining_range.is_none());
    }

    #[test]
    fn test_reachable_error_is_unsafe_with_validated_witness() {
        // x = nondet(); if (x > 5) if (x < 7) ERROR;
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("main", &[], None);
        let mut main = cfa.body("main");
        let n1 = main.declare(main.entry(), "x", CType::INT, Some(Expr::nondet(CType::INT)));
        let x = main.var("x");
        let (big, other) = main.branch(n1, Expr::gt(x.clone(), Expr::int(5)));
        let (six, _) = main.branch(big, Expr::lt(x, Expr::int(7)));
        let error = main.node();
        main.label(error, "ERROR");
        main.blank(six, error);
        main.ret(error, None);
        main.ret(other, None);
        let cfa = cfa.entry_function("main").build().unwrap();

        let outcome = run(cfa, EngineConfig::preset(Preset::Balanced).build().unwrap());
        let witness = outcome.verdict.witness().expect("counterexample");
        assert_eq!(witness.validated, Some(true));
        assert_eq!(witness.inputs().get("main::x"), Some(&6));
        assert_eq!(outcome.statistics.feasible_counterexamples, 1);
        assert_eq!(outcome.statistics.refinements, 0);
    }

    #[test]
    fn test_root_restart_reaches_the_same_verdict() {
        let config = EngineConfig::preset(Preset::Balanced)
            .refinement(|c| c.restart(RestartStrategy::Root))
            .exploration(|c| c.parallel(false))
            .build()
            .unwrap();
        let outcome = run(counter(10), config);
        assert!(outcome.verdict.is_safe());
    }

    #[test]
    fn test_refinement_budget_gives_unknown_with_remaining_range() {
        let config = EngineConfig::preset(Preset::Balanced)
            .budget(|c| c.max_refinements(1))
            .build()
            .unwrap();
        let outcome = run(counter(10), config);
        assert!(matches!(
            outcome.verdict,
            Verdict::Unknown {
                reason: UnknownReason::ResourceExhaustion {
                    resource: Resource::Refinements,
                    ..
                }
            }
        ));
        assert_eq!(outcome.verdict.exit_code(), 2);
        assert!(outcome.remaining_range.is_some());
    }

    #[test]
    fn test_sequential_pool_when_disabled() {
        assert!(thread_pool(false, 8).is_none());
        assert!(thread_pool(true, 1).is_none());
    }
}

//! Precision refinement from spurious counterexamples
//!
//! - `Interpolation`: sequence interpolants at every abstraction node of
//!   the path; when they add nothing, the unsat-core atoms are used
//! - `UnsatCore`: relational atoms of the guards in the unsat core, added
//!   at every abstraction location of the path where their variables are
//!   in scope
//!
//! A refinement that adds no predicate, or that meets a (path, precision)
//! pair it has already refined, is a stall: the same spurious path would
//! come back forever.

use super::interpolation::SequenceInterpolator;
use crate::config::{PrecisionScope, RefinementConfig, RefinementStrategy, RestartStrategy};
use crate::errors::{EngineError, Result};
use crate::features::arg::domain::{Arg, ArgNodeId};
use crate::features::feasibility::domain::InfeasibleCounterexample;
use crate::features::path_formula::infrastructure::PathFormulaEncoder;
use crate::features::refinement::domain::{Precision, Predicate};
use crate::features::smt::InstrumentedSolver;
use crate::shared::models::{Cfa, CfaNodeId, EdgeKind, Expr};
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// What one refinement changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementResult {
    /// Newly tracked predicates with their location (`None` = global)
    pub added: Vec<(Option<CfaNodeId>, Predicate)>,
    /// Re-explore below this node; `None` restarts from the root
    pub pivot: Option<ArgNodeId>,
}

#[derive(Debug)]
pub struct Refiner {
    config: RefinementConfig,
    interpolator: SequenceInterpolator,
    seen: FxHashSet<blake3::Hash>,
    refinements: usize,
}

impl Refiner {
    pub fn new(config: RefinementConfig, solver: Arc<InstrumentedSolver>, encoder: PathFormulaEncoder) -> Self {
        let interpolator = SequenceInterpolator::new(solver, encoder, config.max_candidates);
        Self {
            config,
            interpolator,
            seen: FxHashSet::default(),
            refinements: 0,
        }
    }

    pub fn refinements(&self) -> usize {
        self.refinements
    }

    pub fn refine(
        &mut self,
        cfa: &Cfa,
        arg: &Arg,
        infeasible: &InfeasibleCounterexample,
        precision: &mut Precision,
    ) -> Result<RefinementResult> {
        let counterexample = &infeasible.counterexample;
        let fingerprint = counterexample.fingerprint(precision);
        if !self.seen.insert(fingerprint) {
            return Err(EngineError::stall(format!(
                "counterexample to {} repeated under the same precision",
                counterexample.target
            )));
        }

        let mut changed: BTreeSet<CfaNodeId> = BTreeSet::new();
        let mut added = Vec::new();
        let global = self.config.scope == PrecisionScope::Global;

        if self.config.strategy == RefinementStrategy::Interpolation {
            let interpolants =
                self.interpolator
                    .interpolate(cfa, arg, infeasible, precision, self.config.scope)?;
            for interpolant in interpolants {
                for predicate in interpolant.added {
                    changed.insert(interpolant.location);
                    added.push(((!global).then_some(interpolant.location), predicate));
                }
            }
        }
        if added.is_empty() {
            if self.config.strategy == RefinementStrategy::Interpolation {
                debug!("interpolants added nothing, using unsat-core atoms");
            }
            for (location, predicate) in self.core_predicates(cfa, arg, infeasible, precision) {
                changed.insert(location);
                added.push(((!global).then_some(location), predicate));
            }
        }
        if added.is_empty() {
            return Err(EngineError::stall(format!(
                "no new predicate rules out the counterexample to {}",
                counterexample.target
            )));
        }

        let pivot = match self.config.restart {
            RestartStrategy::Root => None,
            RestartStrategy::Pivot => counterexample.nodes.iter().skip(1).find_map(|id| {
                let node = arg.node(*id);
                let hit = node.is_abstraction && (global || changed.contains(&node.state.location));
                hit.then(|| node.parent()).flatten()
            }),
        };

        self.refinements += 1;
        info!(
            refinement = self.refinements,
            added = added.len(),
            predicates = precision.distinct_predicates(),
            pivot = ?pivot,
            "precision refined"
        );
        for (location, predicate) in &added {
            match location {
                Some(location) => debug!(%location, %predicate, "new predicate"),
                None => debug!(%predicate, "new global predicate"),
            }
        }
        Ok(RefinementResult { added, pivot })
    }

    /// Atoms of the guards in the unsat core, tracked at each abstraction
    /// location of the path that can express them
    fn core_predicates(
        &self,
        cfa: &Cfa,
        arg: &Arg,
        infeasible: &InfeasibleCounterexample,
        precision: &mut Precision,
    ) -> Vec<(CfaNodeId, Predicate)> {
        let counterexample = &infeasible.counterexample;
        let steps: Vec<usize> = if infeasible.core.is_empty() {
            (0..counterexample.len()).collect()
        } else {
            infeasible.core.clone()
        };

        let mut atoms: Vec<Expr> = Vec::new();
        for i in steps {
            let Some(step) = counterexample.steps.get(i) else {
                continue;
            };
            let mut conditions: Vec<&Expr> = step.assumptions.iter().map(|(c, _)| c).collect();
            if let EdgeKind::Assumption { condition, .. } = &cfa.edge(step.edge).kind {
                conditions.push(condition);
            }
            for atom in conditions.into_iter().flat_map(Expr::atoms) {
                if !atoms.contains(&atom) {
                    atoms.push(atom);
                }
            }
        }

        // Each location with the number of path steps before its first visit
        let last = counterexample.nodes.len().saturating_sub(1);
        let mut sites: BTreeMap<CfaNodeId, usize> = BTreeMap::new();
        for (step, id) in counterexample.nodes.iter().enumerate().take(last).skip(1) {
            let node = arg.node(*id);
            if node.is_abstraction {
                sites.entry(node.state.location).or_insert(step);
            }
        }

        let encoder = self.interpolator.encoder();
        let mut added = Vec::new();
        for atom in atoms {
            // Only where every variable of the atom is declared
            let usable: Vec<CfaNodeId> = sites
                .iter()
                .filter(|(_, step)| encoder.instantiate(&atom, &infeasible.encoded.ssa_at(**step)).is_ok())
                .map(|(location, _)| *location)
                .collect();
            if usable.is_empty() {
                trace!(%atom, "atom not expressible at any abstraction location");
                continue;
            }
            let predicate = Predicate(atom);
            match self.config.scope {
                PrecisionScope::Global => {
                    if precision.add_global(predicate.clone()) {
                        added.push((usable[0], predicate));
                    }
                }
                PrecisionScope::Local => {
                    for location in usable {
                        if precision.add_local(location, predicate.clone()) {
                            added.push((location, predicate.clone()));
                        }
                    }
                }
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::abstract_state::domain::CompositeState;
    use crate::features::automaton::{Automaton, AutomatonProduct};
    use crate::features::feasibility::domain::{Counterexample, Feasibility};
    use crate::features::feasibility::infrastructure::FeasibilityChecker;
    use crate::features::smt::{BitBlastSolver, QueryLimits};
    use crate::shared::models::{CType, CfaBuilder};

    type Setup = (Cfa, Arg, InfeasibleCounterexample, CfaNodeId, Arc<InstrumentedSolver>);

    fn setup() -> Setup {
        setup_with(false)
    }

    /// `x = 0; if (x > 5) ERROR;` explored without predicates; the branch
    /// node is an abstraction node, as is the function entry when
    /// `entry_is_cut`
    fn setup_with(entry_is_cut: bool) -> Setup {
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("main", &[], None);
        let mut main = cfa.body("main");
        let entry = main.entry();
        let n1 = main.declare(entry, "x", CType::INT, Some(Expr::int(0)));
        let head = main.node();
        main.blank(n1, head);
        let x = main.var("x");
        let (bad, good) = main.branch(head, Expr::gt(x, Expr::int(5)));
        main.ret(bad, None);
        main.ret(good, None);
        let cfa = cfa.entry_function("main").build().unwrap();

        let product = AutomatonProduct::new(vec![Automaton::reach_error()]).unwrap();
        let mut state = CompositeState::initial(&cfa, &product, None);
        let mut arg = Arg::new(state.clone());
        let mut node = arg.root();
        let mut location = cfa.start();
        while location != bad {
            let edge = cfa
                .outgoing(location)
                .find(|e| !matches!(e.kind, EdgeKind::Assumption { truth: false, .. }))
                .unwrap();
            location = edge.target;
            state.location = location;
            let cut = location == head || (entry_is_cut && location == entry);
            node = arg.add_child(node, edge.id, vec![], state.clone(), cut, location == bad);
        }

        let solver = Arc::new(InstrumentedSolver::new(
            Arc::new(BitBlastSolver::new()),
            QueryLimits::UNLIMITED,
            0,
        ));
        let checker = FeasibilityChecker::new(
            Arc::new(cfa.clone()),
            solver.clone(),
            PathFormulaEncoder::default(),
        );
        let cex = Counterexample::from_arg(&arg, node);
        let Feasibility::Infeasible(infeasible) = checker.check(&cex).unwrap() else {
            panic!("x = 0 never exceeds 5");
        };
        (cfa, arg, infeasible, head, solver)
    }

    #[test]
    fn test_interpolation_refines_and_picks_pivot() {
        let (cfa, arg, infeasible, head, solver) = setup();
        let mut refiner = Refiner::new(RefinementConfig::default(), solver, PathFormulaEncoder::default());
        let mut precision = Precision::new();
        let result = refiner.refine(&cfa, &arg, &infeasible, &mut precision).unwrap();

        let expected = Predicate(Expr::le(Expr::var("main::x", CType::INT), Expr::int(0)));
        assert_eq!(result.added, vec![(Some(head), expected)]);
        let head_node = infeasible
            .counterexample
            .nodes
            .iter()
            .copied()
            .find(|id| arg.node(*id).state.location == head)
            .unwrap();
        assert_eq!(result.pivot, arg.node(head_node).parent());
        assert_eq!(result.pivot, Some(infeasible.counterexample.nodes[2]));
        assert_eq!(refiner.refinements(), 1);
    }

    #[test]
    fn test_repeated_counterexample_is_a_stall() {
        let (cfa, arg, infeasible, _, solver) = setup();
        let mut refiner = Refiner::new(RefinementConfig::default(), solver, PathFormulaEncoder::default());
        refiner.refine(&cfa, &arg, &infeasible, &mut Precision::new()).unwrap();
        let err = refiner.refine(&cfa, &arg, &infeasible, &mut Precision::new()).unwrap_err();
        assert!(matches!(err, EngineError::RefinementStall { .. }));
    }

    #[test]
    fn test_refinement_without_new_predicates_stalls() {
        let (cfa, arg, infeasible, _, solver) = setup();
        let mut refiner = Refiner::new(RefinementConfig::default(), solver, PathFormulaEncoder::default());
        let mut precision = Precision::new();
        // Interpolant first, then the core atoms, then nothing is left
        let outcomes: Vec<bool> = (0..3)
            .map(|_| refiner.refine(&cfa, &arg, &infeasible, &mut precision).is_ok())
            .collect();
        assert_eq!(outcomes, vec![true, true, false]);
    }

    #[test]
    fn test_unsat_core_strategy_with_root_restart() {
        let (cfa, arg, infeasible, head, solver) = setup();
        let config = RefinementConfig::default()
            .strategy(RefinementStrategy::UnsatCore)
            .restart(RestartStrategy::Root);
        let mut refiner = Refiner::new(config, solver, PathFormulaEncoder::default());
        let mut precision = Precision::new();
        let result = refiner.refine(&cfa, &arg, &infeasible, &mut precision).unwrap();

        let guard = Predicate(Expr::gt(Expr::var("main::x", CType::INT), Expr::int(5)));
        assert!(result.added.contains(&(Some(head), guard)));
        assert_eq!(result.pivot, None);
    }

    #[test]
    fn test_core_atoms_skip_locations_before_declaration() {
        let (cfa, arg, infeasible, head, solver) = setup_with(true);
        let entry = arg.node(infeasible.counterexample.nodes[1]).state.location;
        let config = RefinementConfig::default().strategy(RefinementStrategy::UnsatCore);
        let mut refiner = Refiner::new(config, solver, PathFormulaEncoder::default());
        let mut precision = Precision::new();
        let result = refiner.refine(&cfa, &arg, &infeasible, &mut precision).unwrap();

        let guard = Predicate(Expr::gt(Expr::var("main::x", CType::INT), Expr::int(5)));
        assert_eq!(result.added, vec![(Some(head), guard)]);
        // x is not declared yet at the entry
        assert!(precision.at(entry).is_empty());
    }

    #[test]
    fn test_global_core_atom_is_anchored_where_declared() {
        let (cfa, arg, infeasible, head, solver) = setup_with(true);
        let config = RefinementConfig::default()
            .strategy(RefinementStrategy::UnsatCore)
            .scope(PrecisionScope::Global);
        let mut refiner = Refiner::new(config, solver, PathFormulaEncoder::default());
        let mut precision = Precision::new();
        let result = refiner.refine(&cfa, &arg, &infeasible, &mut precision).unwrap();

        let guard = Predicate(Expr::gt(Expr::var("main::x", CType::INT), Expr::int(5)));
        assert_eq!(result.added, vec![(None, guard.clone())]);
        assert!(precision.contains(head, &guard));
        // Global predicates re-explore from the first abstraction node
        assert_eq!(result.pivot, Some(infeasible.counterexample.nodes[0]));
    }
}

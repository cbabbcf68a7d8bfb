//! Cartesian predicate abstraction at abstraction points
//!
//! At an abstraction point the block formula (together with the previous
//! abstraction) is summarized by the tracked predicates:
//!
//! 1. `abstraction ∧ block` unsatisfiable → `Bottom`
//! 2. otherwise, per predicate `p`, the model of step 1 says which
//!    polarity is possible; one more query checks whether the other
//!    polarity is impossible (`p` implied) or not (`p` unknown)
//!
//! The block formula is then reset, keeping the SSA map. Results are
//! cached by a blake3 digest of the instantiated query.

use crate::errors::Result;
use crate::features::abstract_state::domain::{CompositeState, PredicateState};
use crate::features::path_formula::domain::{PathFormula, SsaMap, Term};
use crate::features::path_formula::infrastructure::PathFormulaEncoder;
use crate::features::refinement::domain::Predicate;
use crate::features::smt::{Decided, InstrumentedSolver};
use crate::shared::models::{Cfa, CfaNodeId};
use crate::config::AbstractionPoints;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Where blocks end
#[derive(Debug, Clone, Copy)]
pub struct AbstractionPolicy {
    points: AbstractionPoints,
}

impl AbstractionPolicy {
    pub fn new(points: AbstractionPoints) -> Self {
        Self { points }
    }

    pub fn is_abstraction_point(&self, cfa: &Cfa, location: CfaNodeId, is_target: bool) -> bool {
        match self.points {
            AbstractionPoints::EveryNode => true,
            AbstractionPoints::LoopHeads => {
                is_target
                    || cfa.loop_heads().contains(&location)
                    || cfa.is_function_entry(location)
                    || cfa.is_function_exit(location)
            }
        }
    }
}

pub struct PredicateAbstractor {
    solver: Arc<InstrumentedSolver>,
    encoder: PathFormulaEncoder,
    cache: Option<Mutex<LruCache<blake3::Hash, PredicateState>>>,
    computed: AtomicU64,
    cache_hits: AtomicU64,
}

impl std::fmt::Debug for PredicateAbstractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateAbstractor")
            .field("computed", &self.computed.load(Ordering::Relaxed))
            .field("cache_hits", &self.cache_hits.load(Ordering::Relaxed))
            .finish()
    }
}

impl PredicateAbstractor {
    /// `cache_size == 0` disables the cache
    pub fn new(solver: Arc<InstrumentedSolver>, encoder: PathFormulaEncoder, cache_size: usize) -> Self {
        Self {
            solver,
            encoder,
            cache: NonZeroUsize::new(cache_size).map(|n| Mutex::new(LruCache::new(n))),
            computed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    pub fn computed(&self) -> u64 {
        self.computed.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Abstract `state` with `predicates`, starting a new block
    pub fn abstract_state(&self, state: &CompositeState, predicates: &[Predicate]) -> Result<CompositeState> {
        self.computed.fetch_add(1, Ordering::Relaxed);
        let ssa = state.path_formula.ssa();
        let query = state.block_query();

        // Predicates over variables not defined yet stay unknown
        let instantiated: Vec<(&Predicate, Arc<Term>)> = predicates
            .iter()
            .filter_map(|p| match self.encoder.instantiate(p.expr(), ssa) {
                Ok(term) => Some((p, Arc::new(term))),
                Err(err) => {
                    trace!(predicate = %p, %err, "predicate not instantiable here");
                    None
                }
            })
            .collect();

        let key = cache_key(&query, &instantiated);
        let cached = self.cache.as_ref().and_then(|c| c.lock().get(&key).cloned());
        let abstraction = match cached {
            Some(abstraction) => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                abstraction
            }
            None => {
                let abstraction = self.compute(&query, &instantiated)?;
                if let Some(cache) = &self.cache {
                    cache.lock().put(key, abstraction.clone());
                }
                abstraction
            }
        };

        let abstraction_formula = self.formula_of(&abstraction, ssa);
        Ok(CompositeState {
            location: state.location,
            callstack: state.callstack.clone(),
            path_formula: PathFormula::with_ssa(ssa.clone()),
            abstraction,
            abstraction_formula: Arc::new(abstraction_formula),
            automata: state.automata.clone(),
            range: state.range.clone(),
        })
    }

    fn compute(&self, query: &[Arc<Term>], predicates: &[(&Predicate, Arc<Term>)]) -> Result<PredicateState> {
        let model = match self.solver.decide(query, "abstraction")? {
            Decided::Unsat(_) => return Ok(PredicateState::Bottom),
            Decided::Sat(model) => model,
        };

        let mut cube = BTreeMap::new();
        let mut extended = query.to_vec();
        for (predicate, term) in predicates {
            // The model already witnesses one polarity
            let observed = model.satisfies(term);
            let other = if observed {
                Term::not((**term).clone())
            } else {
                (**term).clone()
            };
            extended.push(Arc::new(other));
            if !self.solver.is_sat(&extended, "abstraction")? {
                cube.insert((*predicate).clone(), observed);
            }
            extended.pop();
        }
        Ok(PredicateState::Cube(cube))
    }

    /// The cube as a term over the current SSA map
    fn formula_of(&self, abstraction: &PredicateState, ssa: &SsaMap) -> Term {
        match abstraction {
            PredicateState::Bottom => Term::Bool(false),
            PredicateState::Cube(cube) => Term::and(cube.iter().filter_map(|(p, value)| {
                let term = self.encoder.instantiate(p.expr(), ssa).ok()?;
                Some(if *value { term } else { Term::not(term) })
            })),
        }
    }
}

fn cache_key(query: &[Arc<Term>], predicates: &[(&Predicate, Arc<Term>)]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for term in query {
        hasher.update(term.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(b"--\n");
    for (predicate, term) in predicates {
        hasher.update(predicate.to_string().as_bytes());
        hasher.update(b"=");
        hasher.update(term.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::abstract_state::infrastructure::TransferRelation;
    use crate::features::automaton::{Automaton, AutomatonProduct};
    use crate::features::smt::{BitBlastSolver, QueryLimits};
    use crate::shared::models::{CType, CfaBuilder, EdgeKind, Expr};

    fn solver() -> Arc<InstrumentedSolver> {
        Arc::new(InstrumentedSolver::new(
            Arc::new(BitBlastSolver::new()),
            QueryLimits::UNLIMITED,
            0,
        ))
    }

    /// `x = 0; if (x > 0) { ... }`: state before and after each branch
    fn states() -> (CompositeState, CompositeState) {
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("main", &[], None);
        let mut main = cfa.body("main");
        let n1 = main.declare(main.entry(), "x", CType::INT, Some(Expr::int(0)));
        let x = main.var("x");
        let (then_node, else_node) = main.branch(n1, Expr::gt(x, Expr::int(0)));
        main.ret(then_node, None);
        main.ret(else_node, None);
        let cfa = cfa.entry_function("main").build().unwrap();
        let product = AutomatonProduct::new(vec![Automaton::reach_error()]).unwrap();
        let relation = TransferRelation::new(
            Arc::new(cfa),
            Arc::new(product),
            PathFormulaEncoder::default(),
            4,
        );

        let mut state = relation.initial_state();
        loop {
            let succs = relation.successors(&state).unwrap();
            if succs.len() == 2 {
                let cfa = relation.cfa();
                let mut then_state = None;
                let mut else_state = None;
                for succ in succs {
                    match &cfa.edge(succ.edge).kind {
                        EdgeKind::Assumption { truth: true, .. } => then_state = Some(succ.state),
                        _ => else_state = Some(succ.state),
                    }
                }
                return (then_state.unwrap(), else_state.unwrap());
            }
            state = succs.into_iter().next().unwrap().state;
        }
    }

    fn x_is(value: i64) -> Predicate {
        Predicate(Expr::eq(Expr::var("main::x", CType::INT), Expr::int(value)))
    }

    #[test]
    fn test_infeasible_block_is_bottom() {
        let (then_state, _) = states();
        let abstractor = PredicateAbstractor::new(solver(), PathFormulaEncoder::default(), 16);
        let abstracted = abstractor.abstract_state(&then_state, &[]).unwrap();
        assert!(abstracted.is_bottom());
    }

    #[test]
    fn test_cartesian_abstraction_and_block_reset() {
        let (_, else_state) = states();
        let abstractor = PredicateAbstractor::new(solver(), PathFormulaEncoder::default(), 16);
        let unknown = Predicate(Expr::lt(Expr::var("main::y", CType::INT), Expr::int(1)));
        let abstracted = abstractor
            .abstract_state(&else_state, &[x_is(0), x_is(1), unknown.clone()])
            .unwrap();
        let cube = abstracted.abstraction.cube().unwrap();
        assert_eq!(cube.get(&x_is(0)), Some(&true));
        assert_eq!(cube.get(&x_is(1)), Some(&false));
        assert!(!cube.contains_key(&unknown));
        assert!(abstracted.path_formula.is_empty());
        assert_eq!(abstracted.path_formula.ssa(), else_state.path_formula.ssa());
    }

    #[test]
    fn test_repeated_abstraction_hits_the_cache() {
        let (_, else_state) = states();
        let abstractor = PredicateAbstractor::new(solver(), PathFormulaEncoder::default(), 16);
        let first = abstractor.abstract_state(&else_state, &[x_is(0)]).unwrap();
        let second = abstractor.abstract_state(&else_state, &[x_is(0)]).unwrap();
        assert_eq!(first, second);
        assert_eq!(abstractor.cache_hits(), 1);
        assert_eq!(abstractor.computed(), 2);
    }
}

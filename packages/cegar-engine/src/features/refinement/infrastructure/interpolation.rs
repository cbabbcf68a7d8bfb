//! Sequence interpolation over a spurious counterexample
//!
//! The path is cut at every abstraction node between the root and the
//! target. At cut `k` the interpolant `I_k` must satisfy
//!
//! ```text
//! I_{k-1} ∧ block(k-1, k)  ⟹  I_k        (inductive)
//! I_k ∧ suffix(k)          is unsat       (blocks the error)
//! ```
//!
//! where `block` holds the path conjuncts since the previous cut. Both
//! conditions are checked by the decision procedure, so every `I_k` is a
//! conjunction of template predicates that the Cartesian abstraction at
//! the cut can prove once they are tracked.
//!
//! The first pass walks forward and keeps each `I_k` as small as
//! possible. A small `I_k` can lose facts that a later cut needs; when
//! no conjunction of candidates implied by `I_{k-1}` blocks the suffix,
//! the sequence is rebuilt from the strongest template facts:
//!
//! 1. forward, `S_k` is every candidate implied by `S_{k-1} ∧ block`
//! 2. the last cut whose `S_k` blocks its suffix ends the sequence
//! 3. backward, `I_k ⊆ S_k` is a minimal subset with
//!    `I_k ∧ block(k, k+1) ∧ ¬I_{k+1}` unsat

use super::candidates::{Candidate, CandidateGenerator};
use crate::config::PrecisionScope;
use crate::errors::Result;
use crate::features::arg::domain::{Arg, ArgNodeId};
use crate::features::feasibility::domain::InfeasibleCounterexample;
use crate::features::path_formula::domain::{EncodedPath, Term};
use crate::features::path_formula::infrastructure::PathFormulaEncoder;
use crate::features::refinement::domain::{Precision, Predicate};
use crate::features::smt::InstrumentedSolver;
use crate::shared::models::{Cfa, CfaNodeId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

const CONTEXT: &str = "interpolation";

/// Interpolant at one cut point of the path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolant {
    /// Number of path steps before the cut
    pub step: usize,
    pub node: ArgNodeId,
    pub location: CfaNodeId,
    /// Conjuncts of `I_k`; empty means `true`
    pub predicates: Vec<Predicate>,
    /// Conjuncts that were not tracked at `location` before
    pub added: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy)]
struct Cut {
    step: usize,
    node: ArgNodeId,
    location: CfaNodeId,
}

/// Strongest template facts at a cut
struct Level {
    cut: Cut,
    /// Conjuncts since the previous cut
    segment: Vec<Arc<Term>>,
    kept: Vec<Candidate>,
}

type Sequence = Vec<(Cut, Vec<Candidate>)>;

#[derive(Debug, Clone)]
pub struct SequenceInterpolator {
    solver: Arc<InstrumentedSolver>,
    encoder: PathFormulaEncoder,
    max_candidates: usize,
}

impl SequenceInterpolator {
    pub fn new(solver: Arc<InstrumentedSolver>, encoder: PathFormulaEncoder, max_candidates: usize) -> Self {
        Self {
            solver,
            encoder,
            max_candidates,
        }
    }

    pub fn encoder(&self) -> PathFormulaEncoder {
        self.encoder
    }

    /// Compute interpolants along the path and add the new conjuncts to
    /// `precision` (at the cut location, or everywhere for `Global`)
    pub fn interpolate(
        &self,
        cfa: &Cfa,
        arg: &Arg,
        infeasible: &InfeasibleCounterexample,
        precision: &mut Precision,
        scope: PrecisionScope,
    ) -> Result<Vec<Interpolant>> {
        let counterexample = &infeasible.counterexample;
        let generator =
            CandidateGenerator::new(cfa, counterexample, self.encoder, self.max_candidates);
        let target_step = counterexample.nodes.len().saturating_sub(1);
        let cuts: Vec<Cut> = counterexample
            .nodes
            .iter()
            .enumerate()
            .take(target_step)
            .skip(1)
            .filter_map(|(step, id)| {
                let node = arg.node(*id);
                node.is_abstraction.then_some(Cut {
                    step,
                    node: *id,
                    location: node.state.location,
                })
            })
            .collect();

        let encoded = &infeasible.encoded;
        let sequence = match self.smallest(&generator, encoded, &cuts, precision)? {
            Some(sequence) if adds_any(&sequence, precision) => sequence,
            stuck => {
                debug!(
                    stuck = stuck.is_none(),
                    "rebuilding interpolants from the strongest template facts"
                );
                self.chained(&generator, encoded, &cuts, precision)?
            }
        };

        let mut interpolants = Vec::with_capacity(sequence.len());
        for (cut, chosen) in sequence {
            let mut added = Vec::new();
            for candidate in &chosen {
                let predicate = candidate.predicate.clone();
                let new = match scope {
                    PrecisionScope::Local => precision.add_local(cut.location, predicate.clone()),
                    PrecisionScope::Global => precision.add_global(predicate.clone()),
                };
                if new {
                    added.push(predicate);
                }
            }
            trace!(
                step = cut.step,
                location = %cut.location,
                chosen = chosen.len(),
                added = added.len(),
                "interpolant"
            );
            interpolants.push(Interpolant {
                step: cut.step,
                node: cut.node,
                location: cut.location,
                predicates: chosen.into_iter().map(|c| c.predicate).collect(),
                added,
            });
        }
        Ok(interpolants)
    }

    /// Forward pass carrying only the chosen `I_{k-1}`; `None` when a cut
    /// has no blocking conjunction
    fn smallest(
        &self,
        generator: &CandidateGenerator,
        encoded: &EncodedPath,
        cuts: &[Cut],
        precision: &Precision,
    ) -> Result<Option<Sequence>> {
        let mut sequence = Vec::new();
        let mut previous: Vec<Arc<Term>> = Vec::new();
        let mut from = 0;

        for cut in cuts {
            let mut block = std::mem::take(&mut previous);
            block.extend_from_slice(&encoded.conjuncts[from..cut.step]);
            from = cut.step;
            let suffix = encoded.suffix(cut.step);

            if !self.solver.is_sat(&block, CONTEXT)? {
                // I_k = false; later cuts add nothing
                debug!(step = cut.step, "path infeasible before the cut");
                break;
            }
            if !self.solver.is_sat(suffix, CONTEXT)? {
                sequence.push((*cut, Vec::new()));
                continue;
            }

            let kept = self.implied(generator, encoded, cut.step, &mut block)?;
            let tracked = tracked_at(&kept, cut.location, precision);
            let Some(chosen) = self.select(&kept, &tracked, suffix)? else {
                trace!(step = cut.step, kept = kept.len(), "no blocking conjunction");
                return Ok(None);
            };
            previous = chosen.iter().map(|i| kept[*i].term.clone()).collect();
            sequence.push((*cut, chosen.into_iter().map(|i| kept[i].clone()).collect()));
        }
        Ok(Some(sequence))
    }

    /// Strongest facts forward, minimal inductive subsets backward
    fn chained(
        &self,
        generator: &CandidateGenerator,
        encoded: &EncodedPath,
        cuts: &[Cut],
        precision: &Precision,
    ) -> Result<Sequence> {
        let mut levels: Vec<Level> = Vec::new();
        let mut carry: Vec<Arc<Term>> = Vec::new();
        let mut from = 0;
        for cut in cuts {
            let segment = encoded.conjuncts[from..cut.step].to_vec();
            from = cut.step;
            let mut block = std::mem::take(&mut carry);
            block.extend_from_slice(&segment);
            if !self.solver.is_sat(&block, CONTEXT)? {
                break;
            }
            let kept = self.implied(generator, encoded, cut.step, &mut block)?;
            carry = kept.iter().map(|c| c.term.clone()).collect();
            levels.push(Level {
                cut: *cut,
                segment,
                kept,
            });
        }

        let mut last = None;
        for (i, level) in levels.iter().enumerate().rev() {
            let all: Vec<&Candidate> = level.kept.iter().collect();
            if self.blocks(&all, encoded.suffix(level.cut.step))? {
                last = Some(i);
                break;
            }
        }
        let Some(last) = last else {
            return Ok(Vec::new());
        };

        let mut sequence: Sequence = Vec::with_capacity(last + 1);
        let mut next: Option<Vec<Arc<Term>>> = None;
        for i in (0..=last).rev() {
            let level = &levels[i];
            let goal: Vec<Arc<Term>> = match &next {
                None => encoded.suffix(level.cut.step).to_vec(),
                Some(terms) if terms.is_empty() => {
                    sequence.push((level.cut, Vec::new()));
                    continue;
                }
                Some(terms) => {
                    let conjunction = Term::and(terms.iter().map(|t| (**t).clone()));
                    let mut goal = levels[i + 1].segment.clone();
                    goal.push(Arc::new(Term::not(conjunction)));
                    goal
                }
            };
            let tracked = tracked_at(&level.kept, level.cut.location, precision);
            let chosen = self.select(&level.kept, &tracked, &goal)?.unwrap_or_default();
            next = Some(chosen.iter().map(|j| level.kept[*j].term.clone()).collect());
            sequence.push((level.cut, chosen.into_iter().map(|j| level.kept[j].clone()).collect()));
        }
        sequence.reverse();
        Ok(sequence)
    }

    /// Candidates at the cut that `block` implies
    fn implied(
        &self,
        generator: &CandidateGenerator,
        encoded: &EncodedPath,
        step: usize,
        block: &mut Vec<Arc<Term>>,
    ) -> Result<Vec<Candidate>> {
        let mut relevant = BTreeMap::new();
        for conjunct in encoded.suffix(step) {
            conjunct.collect_symbols(&mut relevant);
        }
        let ssa = encoded.ssa_at(step);
        let mut kept = Vec::new();
        for candidate in generator.candidates_at(&ssa, &relevant) {
            block.push(Arc::new(Term::not((*candidate.term).clone())));
            let implied = !self.solver.is_sat(block, CONTEXT)?;
            block.pop();
            if implied {
                kept.push(candidate);
            }
        }
        Ok(kept)
    }

    /// Indices into `kept` whose conjunction makes `goal` unsat, preferring
    /// tracked predicates and single predicates over conjunctions
    fn select(&self, kept: &[Candidate], tracked: &[bool], goal: &[Arc<Term>]) -> Result<Option<Vec<usize>>> {
        if !self.solver.is_sat(goal, CONTEXT)? {
            return Ok(Some(Vec::new()));
        }
        for want_tracked in [true, false] {
            for (i, candidate) in kept.iter().enumerate() {
                if tracked[i] == want_tracked && self.blocks(&[candidate], goal)? {
                    return Ok(Some(vec![i]));
                }
            }
        }

        let all: Vec<&Candidate> = kept.iter().collect();
        if kept.len() < 2 || !self.blocks(&all, goal)? {
            return Ok(None);
        }
        let mut chosen: Vec<usize> = (0..kept.len()).collect();
        // Drop new predicates first so tracked ones survive
        let order = (0..kept.len())
            .filter(|i| !tracked[*i])
            .chain((0..kept.len()).filter(|i| tracked[*i]));
        for drop in order.collect::<Vec<_>>() {
            let trial: Vec<usize> = chosen.iter().copied().filter(|i| *i != drop).collect();
            let terms: Vec<&Candidate> = trial.iter().map(|i| &kept[*i]).collect();
            if self.blocks(&terms, goal)? {
                chosen = trial;
            }
        }
        Ok(Some(chosen))
    }

    fn blocks(&self, candidates: &[&Candidate], goal: &[Arc<Term>]) -> Result<bool> {
        let query: Vec<Arc<Term>> = candidates
            .iter()
            .map(|c| c.term.clone())
            .chain(goal.iter().cloned())
            .collect();
        Ok(!self.solver.is_sat(&query, CONTEXT)?)
    }
}

fn tracked_at(kept: &[Candidate], location: CfaNodeId, precision: &Precision) -> Vec<bool> {
    kept.iter()
        .map(|c| precision.contains(location, &c.predicate))
        .collect()
}

fn adds_any(sequence: &Sequence, precision: &Precision) -> bool {
    sequence.iter().any(|(cut, chosen)| {
        chosen
            .iter()
            .any(|c| !precision.contains(cut.location, &c.predicate))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::abstract_state::domain::CompositeState;
    use crate::features::automaton::{Automaton, AutomatonProduct};
    use crate::features::feasibility::domain::{Counterexample, Feasibility};
    use crate::features::feasibility::infrastructure::FeasibilityChecker;
    use crate::features::smt::{BitBlastSolver, QueryLimits};
    use crate::shared::models::{CType, CfaBuilder, EdgeId, Expr};

    struct Loop {
        cfa: Cfa,
        start: EdgeId,
        init: EdgeId,
        enter: EdgeId,
        body: EdgeId,
        back: EdgeId,
        exit: EdgeId,
        check: EdgeId,
        to_error: EdgeId,
        head: CfaNodeId,
    }

    fn edge_between(cfa: &Cfa, from: CfaNodeId, to: CfaNodeId) -> EdgeId {
        cfa.outgoing(from).find(|e| e.target == to).unwrap().id
    }

    /// `x = 0; while (x < 10) x++; if (x != 10) ERROR;`
    fn counter() -> Loop {
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("main", &[], None);
        let mut main = cfa.body("main");
        let entry = main.entry();
        let n1 = main.declare(entry, "x", CType::INT, Some(Expr::int(0)));
        let head = main.node();
        main.blank(n1, head);
        let x = main.var("x");
        let (body, done) = main.branch(head, Expr::lt(x.clone(), Expr::int(10)));
        let incremented = main.assign(body, "x", Expr::add(x.clone(), Expr::int(1)));
        main.blank(incremented, head);
        let (bad, good) = main.branch(done, Expr::ne(x, Expr::int(10)));
        let error = main.node();
        main.label(error, "ERROR");
        main.blank(bad, error);
        main.ret(error, None);
        main.ret(good, None);
        let cfa = cfa.entry_function("main").build().unwrap();

        let edge = |from, to| edge_between(&cfa, from, to);
        Loop {
            start: edge(cfa.start(), entry),
            init: edge(entry, n1),
            enter: edge(n1, head),
            body: edge(head, body),
            back: edge(incremented, head),
            exit: edge(head, done),
            check: edge(done, bad),
            to_error: edge(bad, error),
            head,
            cfa,
        }
    }

    /// ARG path along `edges`; nodes at `cuts` are abstraction nodes
    fn spurious(cfa: &Cfa, cuts: &[CfaNodeId], edges: &[EdgeId]) -> (Arg, InfeasibleCounterexample) {
        let product = AutomatonProduct::new(vec![Automaton::reach_error()]).unwrap();
        let mut state = CompositeState::initial(cfa, &product, None);
        let mut arg = Arg::new(state.clone());
        let mut node = arg.root();
        for (i, edge) in edges.iter().enumerate() {
            state.location = cfa.edge(*edge).target;
            let at_cut = cuts.contains(&state.location);
            node = arg.add_child(node, *edge, vec![], state.clone(), at_cut, i + 1 == edges.len());
        }
        let cex = Counterexample::from_arg(&arg, node);
        let checker = FeasibilityChecker::new(Arc::new(cfa.clone()), solver(), PathFormulaEncoder::default());
        match checker.check(&cex).unwrap() {
            Feasibility::Infeasible(infeasible) => (arg, infeasible),
            Feasibility::Feasible { .. } => panic!("path should be spurious"),
        }
    }

    fn solver() -> Arc<InstrumentedSolver> {
        Arc::new(InstrumentedSolver::new(
            Arc::new(BitBlastSolver::new()),
            QueryLimits::UNLIMITED,
            0,
        ))
    }

    fn interpolator() -> SequenceInterpolator {
        SequenceInterpolator::new(solver(), PathFormulaEncoder::default(), 64)
    }

    fn x() -> Expr {
        Expr::var("main::x", CType::INT)
    }

    /// Conjunction of `predicates` instantiated after `step` path steps
    fn at_step(encoded: &EncodedPath, step: usize, predicates: &[Predicate]) -> Term {
        let ssa = encoded.ssa_at(step);
        Term::and(predicates.iter().map(|p| {
            PathFormulaEncoder::default()
                .instantiate(p.expr(), &ssa)
                .unwrap()
        }))
    }

    #[test]
    fn test_loop_exit_learns_guard() {
        let l = counter();
        let path = [l.start, l.init, l.enter, l.exit, l.check, l.to_error];
        let (arg, infeasible) = spurious(&l.cfa, &[l.head], &path);
        let mut precision = Precision::new();
        let interpolants = interpolator()
            .interpolate(&l.cfa, &arg, &infeasible, &mut precision, PrecisionScope::Local)
            .unwrap();

        assert_eq!(interpolants.len(), 1);
        let expected = Predicate(Expr::lt(x(), Expr::int(10)));
        assert_eq!(interpolants[0].predicates, vec![expected.clone()]);
        assert_eq!(interpolants[0].added, vec![expected.clone()]);
        assert_eq!(precision.at(l.head), vec![expected]);
    }

    #[test]
    fn test_second_iteration_learns_inductive_bound() {
        let l = counter();
        let path = [l.start, l.init, l.enter, l.body, l.back, l.exit, l.check, l.to_error];
        let (arg, infeasible) = spurious(&l.cfa, &[l.head], &path);
        let mut precision = Precision::new();
        precision.add_local(l.head, Predicate(Expr::lt(x(), Expr::int(10))));

        let interpolants = interpolator()
            .interpolate(&l.cfa, &arg, &infeasible, &mut precision, PrecisionScope::Local)
            .unwrap();

        assert_eq!(interpolants.len(), 2);
        // The loop body and exit alone cannot reach the error
        assert!(interpolants[0].predicates.is_empty());
        let bound = Predicate(Expr::le(x(), Expr::int(10)));
        assert_eq!(interpolants[1].added, vec![bound.clone()]);
        assert!(precision.contains(l.head, &bound));
    }

    #[test]
    fn test_global_scope_adds_everywhere() {
        let l = counter();
        let path = [l.start, l.init, l.enter, l.exit, l.check, l.to_error];
        let (arg, infeasible) = spurious(&l.cfa, &[l.head], &path);
        let mut precision = Precision::new();
        interpolator()
            .interpolate(&l.cfa, &arg, &infeasible, &mut precision, PrecisionScope::Global)
            .unwrap();
        assert_eq!(precision.global().len(), 1);
        assert!(precision.local().is_empty());
    }

    /// `x = 0; y = 0; A: x = x + 1; B: if (x == y + 2) ERROR;`
    ///
    /// `x == y` alone blocks the error at `A`, but after the increment no
    /// template over `x` and `y` rules out `x == y + 2`.
    #[test]
    fn test_later_cut_is_supported_by_earlier_interpolant() {
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("main", &[], None);
        let mut main = cfa.body("main");
        let entry = main.entry();
        let n1 = main.declare(entry, "x", CType::INT, Some(Expr::int(0)));
        let a = main.declare(n1, "y", CType::INT, Some(Expr::int(0)));
        let x = main.var("x");
        let y = main.var("y");
        let b = main.assign(a, "x", Expr::add(x.clone(), Expr::int(1)));
        let (bad, good) = main.branch(b, Expr::eq(x, Expr::add(y, Expr::int(2))));
        main.ret(bad, None);
        main.ret(good, None);
        let cfa = cfa.entry_function("main").build().unwrap();

        let path = [
            edge_between(&cfa, cfa.start(), entry),
            edge_between(&cfa, entry, n1),
            edge_between(&cfa, n1, a),
            edge_between(&cfa, a, b),
            edge_between(&cfa, b, bad),
        ];
        let (arg, infeasible) = spurious(&cfa, &[a, b], &path);
        let mut precision = Precision::new();
        let interpolants = interpolator()
            .interpolate(&cfa, &arg, &infeasible, &mut precision, PrecisionScope::Local)
            .unwrap();

        assert_eq!(interpolants.len(), 2);
        let (first, second) = (&interpolants[0], &interpolants[1]);
        assert_eq!((first.location, second.location), (a, b));
        assert!(!first.added.is_empty());
        assert!(!second.added.is_empty());

        let encoded = &infeasible.encoded;
        let checker = solver();
        // I_A ∧ (x = x + 1) ⟹ I_B
        let mut inductive: Vec<Arc<Term>> = vec![Arc::new(at_step(encoded, first.step, &first.predicates))];
        inductive.extend_from_slice(&encoded.conjuncts[first.step..second.step]);
        inductive.push(Arc::new(Term::not(at_step(encoded, second.step, &second.predicates))));
        assert!(!checker.is_sat(&inductive, "test").unwrap());
        // I_B ∧ (x == y + 2) is unsat
        let mut blocking: Vec<Arc<Term>> = vec![Arc::new(at_step(encoded, second.step, &second.predicates))];
        blocking.extend_from_slice(encoded.suffix(second.step));
        assert!(!checker.is_sat(&blocking, "test").unwrap());
    }
}

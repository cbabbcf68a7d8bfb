//! Interpolant candidates
//!
//! Candidates at a cut point come from three template families, in this
//! order:
//!
//! 1. relational atoms of the guards taken along the path (branch
//!    conditions and automaton assumptions)
//! 2. comparisons between two variables of the same type
//! 3. bounds `v <= c`, `v >= c`, `v == c` for literals `c` of the path
//!    (and 0)
//!
//! A candidate is only offered when it can be instantiated at the cut
//! point and mentions a symbol that the rest of the path talks about.

use crate::features::feasibility::domain::Counterexample;
use crate::features::path_formula::domain::{SsaMap, SsaSymbol, Term};
use crate::features::path_formula::infrastructure::PathFormulaEncoder;
use crate::features::refinement::domain::Predicate;
use crate::shared::models::{CType, Cfa, EdgeKind, Expr};
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A candidate predicate with its instantiation at the cut point
#[derive(Debug, Clone)]
pub struct Candidate {
    pub predicate: Predicate,
    pub term: Arc<Term>,
}

#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    guards: Vec<Expr>,
    constants: BTreeSet<i64>,
    encoder: PathFormulaEncoder,
    max_candidates: usize,
}

impl CandidateGenerator {
    pub fn new(
        cfa: &Cfa,
        counterexample: &Counterexample,
        encoder: PathFormulaEncoder,
        max_candidates: usize,
    ) -> Self {
        let mut guards = Vec::new();
        let mut constants = BTreeSet::from([0]);
        for (edge, assumptions) in counterexample.cfa_steps(cfa) {
            for expr in edge.kind.expressions() {
                constants.extend(expr.constants());
            }
            if let EdgeKind::Assumption { condition, .. } = &edge.kind {
                push_atoms(&mut guards, condition);
            }
            for (condition, _) in assumptions {
                constants.extend(condition.constants());
                push_atoms(&mut guards, condition);
            }
        }
        Self {
            guards,
            constants,
            encoder,
            max_candidates: max_candidates.max(1),
        }
    }

    pub fn guards(&self) -> &[Expr] {
        &self.guards
    }

    pub fn constants(&self) -> &BTreeSet<i64> {
        &self.constants
    }

    /// Candidates instantiated over `ssa` that mention a symbol in `relevant`
    pub fn candidates_at(
        &self,
        ssa: &SsaMap,
        relevant: &BTreeMap<SsaSymbol, u32>,
    ) -> Vec<Candidate> {
        let variables: Vec<(&str, CType)> = ssa
            .iter()
            .filter(|(name, entry)| {
                entry.index > 0 && relevant.contains_key(&SsaSymbol::new(*name, entry.index))
            })
            .map(|(name, entry)| (name, entry.ty))
            .collect();

        let pairs = variables.iter().enumerate().flat_map(|(i, (a, ta))| {
            variables[i + 1..]
                .iter()
                .filter(move |(_, tb)| tb == ta)
                .flat_map(move |(b, tb)| {
                    let a = Expr::var(*a, *ta);
                    let b = Expr::var(*b, *tb);
                    [
                        Expr::eq(a.clone(), b.clone()),
                        Expr::lt(a.clone(), b.clone()),
                        Expr::lt(b.clone(), a.clone()),
                        Expr::le(a.clone(), b.clone()),
                        Expr::le(b, a),
                    ]
                })
        });

        let bounds = variables.iter().flat_map(|(name, ty)| {
            self.constants
                .iter()
                .filter(move |c| ty.interpret(ty.normalize(**c)) == i128::from(**c))
                .flat_map(move |c| {
                    let v = Expr::var(*name, *ty);
                    let c = Expr::constant(*c, *ty);
                    [
                        Expr::le(v.clone(), c.clone()),
                        Expr::ge(v.clone(), c.clone()),
                        Expr::eq(v, c),
                    ]
                })
        });

        let mut seen = FxHashSet::default();
        self.guards
            .iter()
            .cloned()
            .chain(pairs)
            .chain(bounds)
            .filter(|expr| seen.insert(expr.clone()))
            .filter_map(|expr| {
                let term = self.encoder.instantiate(&expr, ssa).ok()?;
                let mentions_relevant = term.symbols().keys().any(|s| relevant.contains_key(s));
                mentions_relevant.then(|| Candidate {
                    predicate: Predicate(expr),
                    term: Arc::new(term),
                })
            })
            .take(self.max_candidates)
            .collect()
    }
}

fn push_atoms(out: &mut Vec<Expr>, condition: &Expr) {
    for atom in condition.atoms() {
        if !out.contains(&atom) {
            out.push(atom);
        }
    }
}

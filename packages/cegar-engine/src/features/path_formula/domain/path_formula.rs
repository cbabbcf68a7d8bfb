//! Path formulas
//!
//! A path formula is the conjunction of the per-edge constraints along a
//! path segment plus the SSA map reached at its end. Conjuncts are shared
//! (`Arc`) because successor states copy their parent's formula.

use super::ssa::SsaMap;
use super::term::Term;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFormula {
    conjuncts: Vec<Arc<Term>>,
    ssa: SsaMap,
}

impl PathFormula {
    /// `true` with every variable undefined
    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` continuing from an existing SSA map (start of a new block)
    pub fn with_ssa(ssa: SsaMap) -> Self {
        Self {
            conjuncts: Vec::new(),
            ssa,
        }
    }

    pub fn conjuncts(&self) -> &[Arc<Term>] {
        &self.conjuncts
    }

    pub fn ssa(&self) -> &SsaMap {
        &self.ssa
    }

    pub fn ssa_mut(&mut self) -> &mut SsaMap {
        &mut self.ssa
    }

    pub fn push(&mut self, conjunct: Arc<Term>) {
        self.conjuncts.push(conjunct);
    }

    pub fn len(&self) -> usize {
        self.conjuncts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conjuncts.is_empty()
    }

    /// The whole conjunction as one term
    pub fn formula(&self) -> Term {
        Term::and(self.conjuncts.iter().map(|c| (**c).clone()))
    }
}

impl fmt::Display for PathFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formula())
    }
}

/// A fully encoded counterexample path: one conjunct per step, with the
/// SSA map reached after each step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedPath {
    pub conjuncts: Vec<Arc<Term>>,
    pub ssa_after: Vec<SsaMap>,
}

impl EncodedPath {
    pub fn len(&self) -> usize {
        self.conjuncts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conjuncts.is_empty()
    }

    /// SSA map after `steps` steps (`0` is the empty map)
    pub fn ssa_at(&self, steps: usize) -> SsaMap {
        if steps == 0 {
            SsaMap::new()
        } else {
            self.ssa_after
                .get(steps - 1)
                .cloned()
                .unwrap_or_default()
        }
    }

    pub fn prefix(&self, steps: usize) -> &[Arc<Term>] {
        &self.conjuncts[..steps.min(self.conjuncts.len())]
    }

    pub fn suffix(&self, steps: usize) -> &[Arc<Term>] {
        &self.conjuncts[steps.min(self.conjuncts.len())..]
    }
}

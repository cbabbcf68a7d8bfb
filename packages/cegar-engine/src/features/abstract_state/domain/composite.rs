//! Composite abstract state
//!
//! One explicit struct holding every sub-state. Each component evolves on
//! its own (see `TransferRelation`); nothing here dispatches dynamically.
//!
//! ```text
//! CompositeState
//! ├── location             CFA node reached
//! ├── callstack            active call frames
//! ├── path_formula         block formula since the last abstraction point
//! ├── abstraction          predicate cube at the last abstraction point
//! ├── abstraction_formula  the cube instantiated at the block's start SSA
//! ├── automata             one state index per property automaton
//! └── range                ranged-analysis bounds (when a range is set)
//! ```

use super::callstack::CallStack;
use super::predicate_state::PredicateState;
use crate::features::automaton::AutomatonProduct;
use crate::features::path_formula::domain::{PathFormula, Term};
use crate::features::range::domain::RangeState;
use crate::shared::models::{Cfa, CfaNodeId};
use std::sync::Arc;

/// Coverage candidates share this key
pub type CoverageKey = (CfaNodeId, CallStack);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeState {
    pub location: CfaNodeId,
    pub callstack: CallStack,
    pub path_formula: PathFormula,
    pub abstraction: PredicateState,
    pub abstraction_formula: Arc<Term>,
    pub automata: Vec<usize>,
    pub range: Option<RangeState>,
}

impl CompositeState {
    /// Program start: empty stack, every SSA index 0, abstraction `true`
    pub fn initial(cfa: &Cfa, product: &AutomatonProduct, range: Option<RangeState>) -> Self {
        Self {
            location: cfa.start(),
            callstack: CallStack::new(),
            path_formula: PathFormula::empty(),
            abstraction: PredicateState::top(),
            abstraction_formula: Arc::new(Term::Bool(true)),
            automata: product.initial(),
            range,
        }
    }

    pub fn coverage_key(&self) -> CoverageKey {
        (self.location, self.callstack.clone())
    }

    pub fn is_bottom(&self) -> bool {
        self.abstraction.is_bottom()
    }

    /// Abstraction formula followed by the block conjuncts
    pub fn block_query(&self) -> Vec<Arc<Term>> {
        let mut query = Vec::with_capacity(self.path_formula.len() + 1);
        if !self.abstraction_formula.is_true() {
            query.push(Arc::clone(&self.abstraction_formula));
        }
        query.extend(self.path_formula.conjuncts().iter().cloned());
        query
    }

    /// One-line summary used by ARG exports and logs
    pub fn describe(&self, product: &AutomatonProduct) -> String {
        let mut out = format!(
            "{} [{}] {} | {}",
            self.location,
            self.callstack,
            self.abstraction,
            product.describe(&self.automata)
        );
        if let Some(range) = &self.range {
            out.push_str(&format!(" | {}", range));
        }
        out
    }
}

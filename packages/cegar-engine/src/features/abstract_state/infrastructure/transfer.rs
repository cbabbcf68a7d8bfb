//! Composite transfer relation
//!
//! `successors(state)` applies every outgoing CFA edge of the state's
//! location. Per edge the sub-states advance independently:
//!
//! - location: edge target
//! - callstack: push on `Call`, pop on `Return` (a return to another
//!   caller's return node has no successor)
//! - range: restricted by the concrete bound executions (may prune)
//! - automata: product step, one successor per product move
//! - path formula: the edge plus the move's assumptions
//!
//! The predicate abstraction is carried unchanged here; it is recomputed
//! at abstraction points by the abstractor.

use crate::errors::Result;
use crate::features::abstract_state::domain::{CallFrame, CompositeState};
use crate::features::automaton::AutomatonProduct;
use crate::features::path_formula::infrastructure::PathFormulaEncoder;
use crate::features::range::infrastructure::RangeRestriction;
use crate::shared::models::{Cfa, CfaEdge, EdgeId, EdgeKind, Expr};
use std::sync::Arc;
use tracing::trace;

/// One successor along one edge
#[derive(Debug, Clone)]
pub struct Successor {
    pub edge: EdgeId,
    /// Automaton assumptions conjoined on this edge
    pub assumptions: Vec<(Expr, bool)>,
    pub state: CompositeState,
}

#[derive(Debug, Clone)]
pub struct TransferRelation {
    cfa: Arc<Cfa>,
    product: Arc<AutomatonProduct>,
    encoder: PathFormulaEncoder,
    max_call_depth: usize,
    range: Option<Arc<RangeRestriction>>,
}

impl TransferRelation {
    pub fn new(
        cfa: Arc<Cfa>,
        product: Arc<AutomatonProduct>,
        encoder: PathFormulaEncoder,
        max_call_depth: usize,
    ) -> Self {
        Self {
            cfa,
            product,
            encoder,
            max_call_depth,
            range: None,
        }
    }

    /// Restrict exploration to the paths of a range
    pub fn with_range(mut self, restriction: RangeRestriction) -> Self {
        self.range = Some(Arc::new(restriction));
        self
    }

    pub fn cfa(&self) -> &Cfa {
        &self.cfa
    }

    pub fn product(&self) -> &AutomatonProduct {
        &self.product
    }

    pub fn encoder(&self) -> PathFormulaEncoder {
        self.encoder
    }

    pub fn range(&self) -> Option<&RangeRestriction> {
        self.range.as_deref()
    }

    pub fn initial_state(&self) -> CompositeState {
        let range = self.range.as_ref().map(|r| r.initial());
        CompositeState::initial(&self.cfa, &self.product, range)
    }

    /// Successors along every outgoing edge, in edge order
    pub fn successors(&self, state: &CompositeState) -> Result<Vec<Successor>> {
        let mut out = Vec::new();
        for edge in self.cfa.outgoing(state.location) {
            out.extend(self.successors_on(state, edge)?);
        }
        Ok(out)
    }

    /// Successors along a single edge
    pub fn successors_on(&self, state: &CompositeState, edge: &CfaEdge) -> Result<Vec<Successor>> {
        let callstack = match &edge.kind {
            EdgeKind::Call {
                callee,
                return_node,
                ..
            } => state.callstack.push(
                CallFrame {
                    call_site: edge.source,
                    return_node: *return_node,
                    function: callee.clone(),
                },
                self.cfa.entry_function(),
                self.max_call_depth,
            )?,
            EdgeKind::Return { .. } => match state.callstack.pop_to(edge.target) {
                Some(callstack) => callstack,
                None => return Ok(Vec::new()),
            },
            _ => state.callstack.clone(),
        };

        let range = match (&self.range, &state.range) {
            (Some(restriction), Some(range)) => {
                match restriction.successor(&self.cfa, edge, range)? {
                    Some(next) => Some(next),
                    None => {
                        trace!(%edge, "outside the range");
                        return Ok(Vec::new());
                    }
                }
            }
            _ => state.range.clone(),
        };

        let mut out = Vec::new();
        for product_move in self.product.step(&self.cfa, &state.automata, edge) {
            let path_formula = self.encoder.encode_step(
                &self.cfa,
                edge,
                &product_move.assumptions,
                &state.path_formula,
            )?;
            out.push(Successor {
                edge: edge.id,
                assumptions: product_move.assumptions,
                state: CompositeState {
                    location: edge.target,
                    callstack: callstack.clone(),
                    path_formula,
                    abstraction: state.abstraction.clone(),
                    abstraction_formula: Arc::clone(&state.abstraction_formula),
                    automata: product_move.states,
                    range: range.clone(),
                },
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{EngineError, ModelingError};
    use crate::features::automaton::Automaton;
    use crate::shared::models::{CType, CfaBuilder};

    fn relation(cfa: Cfa, max_call_depth: usize) -> TransferRelation {
        let product = AutomatonProduct::new(vec![Automaton::reach_error()]).unwrap();
        TransferRelation::new(
            Arc::new(cfa),
            Arc::new(product),
            PathFormulaEncoder::default(),
            max_call_depth,
        )
    }

    /// Follow the unique successor until a node with `n` successors
    fn walk(relation: &TransferRelation, mut state: CompositeState) -> (CompositeState, Vec<Successor>) {
        loop {
            let succs = relation.successors(&state).unwrap();
            if succs.len() != 1 {
                return (state, succs);
            }
            state = succs.into_iter().next().unwrap().state;
        }
    }

    #[test]
    fn test_call_and_return_update_the_stack() {
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("inc", &[("v", CType::INT)], Some(CType::INT));
        cfa.declare_function("main", &[], Some(CType::INT));
        {
            let mut inc = cfa.body("inc");
            let v = inc.var("v");
            inc.ret(inc.entry(), Some(Expr::add(v, Expr::int(1))));
        }
        let mut main = cfa.body("main");
        let n1 = main.declare(main.entry(), "x", CType::INT, Some(Expr::int(1)));
        let x = main.var("x");
        let n2 = main.call(n1, "inc", vec![x], Some("x"));
        main.ret(n2, Some(Expr::int(0)));
        let cfa = cfa.entry_function("main").build().unwrap();
        let relation = relation(cfa, 4);

        let mut state = relation.initial_state();
        let mut max_depth = 0;
        loop {
            let succs = relation.successors(&state).unwrap();
            let Some(next) = succs.into_iter().next() else {
                break;
            };
            max_depth = max_depth.max(next.state.callstack.depth());
            state = next.state;
        }
        assert_eq!(max_depth, 1);
        assert!(state.callstack.is_empty());
        assert_eq!(state.path_formula.ssa().index("main::x"), 2);
    }

    #[test]
    fn test_recursion_is_a_modeling_error() {
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("main", &[], None);
        let mut main = cfa.body("main");
        let n1 = main.call(main.entry(), "main", vec![], None);
        main.ret(n1, None);
        let cfa = cfa.entry_function("main").build().unwrap();
        let relation = relation(cfa, 4);

        let mut state = relation.initial_state();
        let err = loop {
            match relation.successors(&state) {
                Ok(succs) => match succs.into_iter().next() {
                    Some(next) => state = next.state,
                    None => panic!("call edge never reached"),
                },
                Err(err) => break err,
            }
        };
        assert!(matches!(
            err,
            EngineError::Modeling(ModelingError::Recursion(_))
        ));
    }

    #[test]
    fn test_branch_has_two_successors_with_guards() {
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("main", &[], None);
        let mut main = cfa.body("main");
        let n1 = main.declare(main.entry(), "x", CType::INT, Some(Expr::nondet(CType::INT)));
        let x = main.var("x");
        let (then_node, else_node) = main.branch(n1, Expr::lt(x, Expr::int(3)));
        main.ret(then_node, None);
        main.ret(else_node, None);
        let cfa = cfa.entry_function("main").build().unwrap();
        let relation = relation(cfa, 4);

        let (at_branch, succs) = walk(&relation, relation.initial_state());
        assert_eq!(succs.len(), 2);
        for succ in &succs {
            assert_eq!(succ.state.path_formula.len(), at_branch.path_formula.len() + 1);
            assert_eq!(
                succ.state.path_formula.ssa(),
                at_branch.path_formula.ssa(),
                "assumptions allocate no SSA index"
            );
        }
    }
}

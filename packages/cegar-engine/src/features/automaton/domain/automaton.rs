/*
 * Safety-property automata
 *
 * An automaton observes the CFA edges taken by a path. Transitions are
 * tried in declaration order and the first whose guard matches fires; if
 * none matches the automaton stays where it is. A transition may carry an
 * assumption over program variables: the path then splits into the
 * branch where the assumption holds (transition taken) and the branch
 * where it does not (automaton stays).
 *
 * # Example: ReachError
 * ```text
 * States: {Init, Error}
 *   Init --[label ERROR]--> Error
 *   Init --__VERIFIER_error()--> Error
 *   Init --reach_error()--> Error
 * ```
 */

use crate::errors::ModelingError;
use crate::shared::models::{Cfa, CfaEdge, EdgeKind, Expr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Coarse classification of CFA edges for [`Guard::EdgeKindIs`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKindTag {
    Blank,
    Declaration,
    Assignment,
    Assumption,
    Call,
    Return,
    ReturnValue,
    ExternalCall,
}

impl From<&EdgeKind> for EdgeKindTag {
    fn from(kind: &EdgeKind) -> Self {
        match kind {
            EdgeKind::Blank { .. } => EdgeKindTag::Blank,
            EdgeKind::Declaration { .. } => EdgeKindTag::Declaration,
            EdgeKind::Assignment { .. } => EdgeKindTag::Assignment,
            EdgeKind::Assumption { .. } => EdgeKindTag::Assumption,
            EdgeKind::Call { .. } => EdgeKindTag::Call,
            EdgeKind::Return { .. } => EdgeKindTag::Return,
            EdgeKind::ReturnValue { .. } => EdgeKindTag::ReturnValue,
            EdgeKind::ExternalCall { .. } => EdgeKindTag::ExternalCall,
        }
    }
}

/// Condition on a CFA edge under which a transition may fire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Guard {
    /// The edge enters a node carrying `label`
    LabelReached { label: String },
    /// The edge calls `function`; with `argument = (i, v)` the i-th
    /// argument must be the literal `v`
    CallTo {
        function: String,
        #[serde(default)]
        argument: Option<(usize, i64)>,
    },
    EdgeKindIs { kind: EdgeKindTag },
    Any,
}

impl Guard {
    pub fn matches(&self, cfa: &Cfa, edge: &CfaEdge) -> bool {
        match self {
            Guard::LabelReached { label } => {
                cfa.node(edge.target).label.as_deref() == Some(label.as_str())
            }
            Guard::CallTo { function, argument } => {
                let (callee, arguments) = match &edge.kind {
                    EdgeKind::Call {
                        callee, arguments, ..
                    }
                    | EdgeKind::ExternalCall {
                        callee, arguments, ..
                    } => (callee, arguments),
                    _ => return false,
                };
                if callee != function {
                    return false;
                }
                match argument {
                    None => true,
                    Some((index, expected)) => matches!(
                        arguments.get(*index),
                        Some(Expr::Const { value, ty })
                            if ty.interpret(ty.normalize(*value)) == i128::from(*expected)
                    ),
                }
            }
            Guard::EdgeKindIs { kind } => EdgeKindTag::from(&edge.kind) == *kind,
            Guard::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub guard: Guard,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assume: Option<Expr>,
}

/// One automaton move: the next state and the assumption taken, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomatonMove {
    pub state: usize,
    pub assumption: Option<(Expr, bool)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Automaton {
    pub name: String,
    pub states: Vec<String>,
    pub initial: String,
    pub error_states: BTreeSet<String>,
    pub transitions: Vec<Transition>,
}

impl Automaton {
    /// "No ERROR label and no `__VERIFIER_error()`/`reach_error()` call is
    /// ever reached"
    pub fn reach_error() -> Self {
        let to_error = |guard| Transition {
            from: "Init".to_string(),
            to: "Error".to_string(),
            guard,
            assume: None,
        };
        Self {
            name: "ReachError".to_string(),
            states: vec!["Init".to_string(), "Error".to_string()],
            initial: "Init".to_string(),
            error_states: BTreeSet::from(["Error".to_string()]),
            transitions: vec![
                to_error(Guard::LabelReached {
                    label: "ERROR".to_string(),
                }),
                to_error(Guard::CallTo {
                    function: "__VERIFIER_error".to_string(),
                    argument: None,
                }),
                to_error(Guard::CallTo {
                    function: "reach_error".to_string(),
                    argument: None,
                }),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), ModelingError> {
        let malformed = |reason: String| ModelingError::MalformedAutomaton {
            automaton: self.name.clone(),
            reason,
        };
        if self.state_index(&self.initial).is_none() {
            return Err(malformed(format!("initial state '{}' is not declared", self.initial)));
        }
        for state in &self.error_states {
            if self.state_index(state).is_none() {
                return Err(malformed(format!("error state '{}' is not declared", state)));
            }
        }
        for t in &self.transitions {
            for state in [&t.from, &t.to] {
                if self.state_index(state).is_none() {
                    return Err(malformed(format!(
                        "transition uses undeclared state '{}'",
                        state
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s == name)
    }

    pub fn state_name(&self, index: usize) -> &str {
        self.states.get(index).map(String::as_str).unwrap_or("?")
    }

    pub fn initial_index(&self) -> usize {
        self.state_index(&self.initial).unwrap_or(0)
    }

    pub fn is_error(&self, index: usize) -> bool {
        self.error_states.contains(self.state_name(index))
    }

    /// Moves out of `state` on `edge`
    pub fn step(&self, cfa: &Cfa, state: usize, edge: &CfaEdge) -> Vec<AutomatonMove> {
        let current = self.state_name(state);
        let fired = self
            .transitions
            .iter()
            .find(|t| t.from == current && t.guard.matches(cfa, edge));
        let Some(transition) = fired else {
            return vec![AutomatonMove {
                state,
                assumption: None,
            }];
        };
        let to = self.state_index(&transition.to).unwrap_or(state);
        match &transition.assume {
            None => vec![AutomatonMove {
                state: to,
                assumption: None,
            }],
            Some(condition) => vec![
                AutomatonMove {
                    state: to,
                    assumption: Some((condition.clone(), true)),
                },
                AutomatonMove {
                    state,
                    assumption: Some((condition.clone(), false)),
                },
            ],
        }
    }
}

/// Successor of a product state: one state per automaton and the
/// assumptions collected on the way
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductMove {
    pub states: Vec<usize>,
    pub assumptions: Vec<(Expr, bool)>,
}

/// Several automata run in lockstep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutomatonProduct {
    automata: Vec<Automaton>,
}

impl AutomatonProduct {
    pub fn new(automata: Vec<Automaton>) -> Result<Self, ModelingError> {
        for automaton in &automata {
            automaton.validate()?;
        }
        Ok(Self { automata })
    }

    pub fn automata(&self) -> &[Automaton] {
        &self.automata
    }

    pub fn initial(&self) -> Vec<usize> {
        self.automata.iter().map(Automaton::initial_index).collect()
    }

    /// A product state is a target when any component is in an error state
    pub fn is_target(&self, states: &[usize]) -> bool {
        self.automata
            .iter()
            .zip(states)
            .any(|(a, s)| a.is_error(*s))
    }

    /// Cartesian product of the component moves
    pub fn step(&self, cfa: &Cfa, states: &[usize], edge: &CfaEdge) -> Vec<ProductMove> {
        let mut moves = vec![ProductMove {
            states: Vec::with_capacity(states.len()),
            assumptions: Vec::new(),
        }];
        for (automaton, state) in self.automata.iter().zip(states) {
            let component = automaton.step(cfa, *state, edge);
            moves = moves
                .into_iter()
                .flat_map(|partial| {
                    component.iter().map(move |m| {
                        let mut next = partial.clone();
                        next.states.push(m.state);
                        if let Some(a) = &m.assumption {
                            next.assumptions.push(a.clone());
                        }
                        next
                    })
                })
                .collect();
        }
        moves
    }

    /// `Name:State` list for diagnostics
    pub fn describe(&self, states: &[usize]) -> String {
        self.automata
            .iter()
            .zip(states)
            .map(|(a, s)| format!("{}:{}", a.name, a.state_name(*s)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{CType, CfaBuilder};

    fn program() -> Cfa {
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("main", &[], None);
        let mut main = cfa.body("main");
        let n1 = main.call_external(main.entry(), "mutex_lock", vec![Expr::int(1)], None);
        let n2 = main.call_external(n1, "mutex_lock", vec![Expr::int(2)], None);
        let err = main.node();
        main.label(err, "ERROR");
        main.blank(n2, err);
        main.ret(err, None);
        cfa.entry_function("main").build().unwrap()
    }

    fn edge_into<'a>(cfa: &'a Cfa, pred: impl Fn(&CfaEdge) -> bool) -> &'a CfaEdge {
        cfa.edges().iter().find(|e| pred(e)).unwrap()
    }

    #[test]
    fn test_reach_error_fires_on_label() {
        let cfa = program();
        let automaton = Automaton::reach_error();
        let into_error = edge_into(&cfa, |e| cfa.node(e.target).label.is_some());
        let moves = automaton.step(&cfa, automaton.initial_index(), into_error);
        assert_eq!(moves.len(), 1);
        assert!(automaton.is_error(moves[0].state));
    }

    #[test]
    fn test_call_guard_matches_constant_argument() {
        let cfa = program();
        let guard = Guard::CallTo {
            function: "mutex_lock".to_string(),
            argument: Some((0, 2)),
        };
        let calls: Vec<bool> = cfa
            .edges()
            .iter()
            .filter(|e| matches!(e.kind, EdgeKind::ExternalCall { .. }))
            .map(|e| guard.matches(&cfa, e))
            .collect();
        assert_eq!(calls, vec![false, true]);
    }

    #[test]
    fn test_assumption_splits_the_path() {
        let cfa = program();
        let condition = Expr::lt(Expr::var("main::x", CType::INT), Expr::int(0));
        let automaton = Automaton {
            name: "Guarded".to_string(),
            states: vec!["A".to_string(), "B".to_string()],
            initial: "A".to_string(),
            error_states: BTreeSet::new(),
            transitions: vec![Transition {
                from: "A".to_string(),
                to: "B".to_string(),
                guard: Guard::EdgeKindIs {
                    kind: EdgeKindTag::ExternalCall,
                },
                assume: Some(condition.clone()),
            }],
        };
        let call = edge_into(&cfa, |e| matches!(e.kind, EdgeKind::ExternalCall { .. }));
        let moves = automaton.step(&cfa, 0, call);
        assert_eq!(
            moves,
            vec![
                AutomatonMove {
                    state: 1,
                    assumption: Some((condition.clone(), true))
                },
                AutomatonMove {
                    state: 0,
                    assumption: Some((condition, false))
                },
            ]
        );
    }

    #[test]
    fn test_undeclared_state_is_rejected() {
        let mut automaton = Automaton::reach_error();
        automaton.initial = "Start".to_string();
        assert!(matches!(
            AutomatonProduct::new(vec![automaton]),
            Err(ModelingError::MalformedAutomaton { .. })
        ));
    }

    #[test]
    fn test_product_targets_if_any_component_errs() {
        let product =
            AutomatonProduct::new(vec![Automaton::reach_error(), Automaton::reach_error()])
                .unwrap();
        assert!(!product.is_target(&[0, 0]));
        assert!(product.is_target(&[0, 1]));
        assert_eq!(product.describe(&[0, 1]), "ReachError:Init, ReachError:Error");
    }
}

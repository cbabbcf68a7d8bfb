//! Predicate abstraction sub-state
//!
//! A Cartesian abstraction: a cube assigning `true` or `false` to the
//! tracked predicates that are implied at the abstraction point. Missing
//! predicates are unknown. `Bottom` is the unsatisfiable abstraction.

use crate::features::refinement::domain::Predicate;
use crate::shared::models::Expr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateState {
    Bottom,
    Cube(BTreeMap<Predicate, bool>),
}

impl Default for PredicateState {
    fn default() -> Self {
        PredicateState::top()
    }
}

impl PredicateState {
    /// The abstraction `true`
    pub fn top() -> Self {
        PredicateState::Cube(BTreeMap::new())
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, PredicateState::Bottom)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, PredicateState::Cube(cube) if cube.is_empty())
    }

    pub fn cube(&self) -> Option<&BTreeMap<Predicate, bool>> {
        match self {
            PredicateState::Cube(cube) => Some(cube),
            PredicateState::Bottom => None,
        }
    }

    /// `self` implies `other`: every literal of `other` appears in `self`
    pub fn entails(&self, other: &PredicateState) -> bool {
        match (self, other) {
            (PredicateState::Bottom, _) => true,
            (PredicateState::Cube(_), PredicateState::Bottom) => false,
            (PredicateState::Cube(mine), PredicateState::Cube(theirs)) => theirs
                .iter()
                .all(|(pred, value)| mine.get(pred) == Some(value)),
        }
    }

    /// Literals of the cube as expressions (negated for `false`)
    pub fn literals(&self) -> Vec<(Expr, bool)> {
        match self {
            PredicateState::Bottom => Vec::new(),
            PredicateState::Cube(cube) => cube
                .iter()
                .map(|(pred, value)| (pred.0.clone(), *value))
                .collect(),
        }
    }
}

impl fmt::Display for PredicateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateState::Bottom => f.write_str("false"),
            PredicateState::Cube(cube) if cube.is_empty() => f.write_str("true"),
            PredicateState::Cube(cube) => {
                let literals: Vec<String> = cube
                    .iter()
                    .map(|(pred, value)| {
                        if *value {
                            format!("({})", pred)
                        } else {
                            format!("!({})", pred)
                        }
                    })
                    .collect();
                f.write_str(&literals.join(" & "))
            }
        }
    }
}

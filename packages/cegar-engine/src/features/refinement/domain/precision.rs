//! Predicate precision
//!
//! The precision says which predicates the abstraction tracks at each
//! location. It only ever grows: a refinement may add predicates but never
//! drops one, so distinctions established earlier survive every later
//! iteration.

use crate::shared::models::{CfaNodeId, Expr};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A boolean expression over program variables
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(pub Expr);

impl Predicate {
    pub fn expr(&self) -> &Expr {
        &self.0
    }
}

impl From<Expr> for Predicate {
    fn from(expr: Expr) -> Self {
        Predicate(expr)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precision {
    #[serde(default)]
    global: BTreeSet<Predicate>,
    #[serde(default)]
    local: BTreeMap<CfaNodeId, BTreeSet<Predicate>>,
}

impl Precision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Predicates tracked at `location`, in a stable order
    pub fn at(&self, location: CfaNodeId) -> Vec<Predicate> {
        let mut out: BTreeSet<&Predicate> = self.global.iter().collect();
        if let Some(local) = self.local.get(&location) {
            out.extend(local.iter());
        }
        out.into_iter().cloned().collect()
    }

    pub fn contains(&self, location: CfaNodeId, predicate: &Predicate) -> bool {
        self.global.contains(predicate)
            || self
                .local
                .get(&location)
                .is_some_and(|preds| preds.contains(predicate))
    }

    /// Returns `true` when the predicate was not tracked at `location` yet
    pub fn add_local(&mut self, location: CfaNodeId, predicate: Predicate) -> bool {
        if self.global.contains(&predicate) {
            return false;
        }
        self.local.entry(location).or_default().insert(predicate)
    }

    /// Returns `true` when the predicate was not tracked everywhere yet
    pub fn add_global(&mut self, predicate: Predicate) -> bool {
        self.global.insert(predicate)
    }

    pub fn global(&self) -> &BTreeSet<Predicate> {
        &self.global
    }

    pub fn local(&self) -> &BTreeMap<CfaNodeId, BTreeSet<Predicate>> {
        &self.local
    }

    /// Number of distinct predicates tracked anywhere
    pub fn distinct_predicates(&self) -> usize {
        let mut all: BTreeSet<&Predicate> = self.global.iter().collect();
        for preds in self.local.values() {
            all.extend(preds.iter());
        }
        all.len()
    }

    /// Number of (location, predicate) entries plus global predicates
    pub fn size(&self) -> usize {
        self.global.len() + self.local.values().map(BTreeSet::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Every predicate tracked by `other` is also tracked here
    pub fn extends(&self, other: &Precision) -> bool {
        other.global.iter().all(|p| self.global.contains(p))
            && other
                .local
                .iter()
                .all(|(loc, preds)| preds.iter().all(|p| self.contains(*loc, p)))
    }

    /// Feed a canonical encoding into a fingerprint
    pub fn hash_into(&self, hasher: &mut blake3::Hasher) {
        for p in &self.global {
            hasher.update(b"g:");
            hasher.update(p.to_string().as_bytes());
            hasher.update(b"\n");
        }
        for (loc, preds) in &self.local {
            for p in preds {
                hasher.update(format!("{}:{}\n", loc, p).as_bytes());
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.global.is_empty() {
            let preds: Vec<String> = self.global.iter().map(|p| p.to_string()).collect();
            writeln!(f, "*: {}", preds.join(", "))?;
        }
        for (loc, preds) in &self.local {
            let preds: Vec<String> = preds.iter().map(|p| p.to_string()).collect();
            writeln!(f, "{}: {}", loc, preds.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::CType;

    fn pred(bound: i64) -> Predicate {
        Predicate(Expr::lt(Expr::var("main::x", CType::INT), Expr::int(bound)))
    }

    #[test]
    fn test_local_and_global_predicates() {
        let mut precision = Precision::new();
        assert!(precision.add_local(CfaNodeId(3), pred(10)));
        assert!(!precision.add_local(CfaNodeId(3), pred(10)));
        assert!(precision.add_global(pred(5)));
        assert!(!precision.add_local(CfaNodeId(4), pred(5)));

        assert_eq!(precision.at(CfaNodeId(3)), vec![pred(5), pred(10)]);
        assert_eq!(precision.at(CfaNodeId(4)), vec![pred(5)]);
        assert_eq!(precision.distinct_predicates(), 2);
    }

    #[test]
    fn test_extends_is_monotone() {
        let mut before = Precision::new();
        before.add_local(CfaNodeId(1), pred(1));
        let mut after = before.clone();
        after.add_global(pred(2));
        assert!(after.extends(&before));
        assert!(!before.extends(&after));
    }

    #[test]
    fn test_json_roundtrip_with_node_keys() {
        let mut precision = Precision::new();
        precision.add_local(CfaNodeId(7), pred(10));
        let json = precision.to_json().unwrap();
        let back: Precision = serde_json::from_str(&json).unwrap();
        assert_eq!(back, precision);
    }
}

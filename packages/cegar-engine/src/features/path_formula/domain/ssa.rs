//! SSA index maps
//!
//! Index 0 means "never defined on this path". Every definition
//! (declaration, assignment, havoc, parameter binding) moves the variable
//! to `index + 1`, so indices only ever grow along a path.

use crate::shared::models::CType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A variable at a specific SSA version, printed as `main::a@2`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SsaSymbol {
    pub name: String,
    pub index: u32,
}

impl SsaSymbol {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for SsaSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SsaEntry {
    pub index: u32,
    pub ty: CType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SsaMap {
    entries: BTreeMap<String, SsaEntry>,
}

impl SsaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current index (0 when undefined)
    pub fn index(&self, name: &str) -> u32 {
        self.entries.get(name).map(|e| e.index).unwrap_or(0)
    }

    pub fn ty(&self, name: &str) -> Option<CType> {
        self.entries.get(name).map(|e| e.ty)
    }

    /// Current symbol, `None` when the variable is undefined
    pub fn current(&self, name: &str) -> Option<SsaSymbol> {
        match self.index(name) {
            0 => None,
            index => Some(SsaSymbol::new(name, index)),
        }
    }

    /// Allocate the next version of `name`
    pub fn fresh(&mut self, name: &str, ty: CType) -> SsaSymbol {
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert(SsaEntry { index: 0, ty });
        entry.index += 1;
        entry.ty = ty;
        SsaSymbol::new(name, entry.index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SsaEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when no variable has a lower index here than in `earlier`
    pub fn dominates(&self, earlier: &SsaMap) -> bool {
        earlier
            .entries
            .iter()
            .all(|(name, entry)| self.index(name) >= entry.index)
    }
}

impl fmt::Display for SsaMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, entry)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}@{}", name, entry.index)?;
        }
        f.write_str("}")
    }
}

//! Input ranges
//!
//! A [`RangeValue`] is one concrete input assignment, written
//! `(main::a=0 main::b=2)`, or `null` for an open bound. A
//! [`RangeInterval`] `[start, end]` selects the program paths lying between
//! the execution of `start` and the execution of `end`.

use crate::features::path_formula::domain::SsaSymbol;
use crate::shared::models::CType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("malformed range '{text}': {reason}")]
    Syntax { text: String, reason: String },

    #[error("range file {0} contains no range")]
    Empty(String),
}

impl RangeError {
    fn syntax(text: &str, reason: impl Into<String>) -> Self {
        RangeError::Syntax {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

/// Concrete input assignment bounding a range, or `None` when unbounded
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RangeValue {
    assignment: Option<BTreeMap<String, i64>>,
}

impl RangeValue {
    pub fn unbounded() -> Self {
        Self { assignment: None }
    }

    pub fn from_assignment(values: impl IntoIterator<Item = (String, i64)>) -> Self {
        Self {
            assignment: Some(values.into_iter().collect()),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.assignment.is_none()
    }

    pub fn assignment(&self) -> Option<&BTreeMap<String, i64>> {
        self.assignment.as_ref()
    }

    /// Input bits for the first definition of a variable
    pub fn input(&self, symbol: &SsaSymbol, ty: CType) -> Option<u64> {
        if symbol.index != 1 {
            return None;
        }
        self.assignment
            .as_ref()?
            .get(&symbol.name)
            .map(|v| ty.normalize(*v))
    }

    pub fn parse(text: &str) -> Result<Self, RangeError> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Self::unbounded());
        }
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| RangeError::syntax(text, "expected '(' ... ')' or 'null'"))?;
        let mut assignment = BTreeMap::new();
        for pair in inner.split_whitespace() {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| RangeError::syntax(text, format!("'{}' is not name=value", pair)))?;
            let value = parse_integer(value)
                .ok_or_else(|| RangeError::syntax(text, format!("'{}' is not an integer", value)))?;
            assignment.insert(name.to_string(), value);
        }
        Ok(Self {
            assignment: Some(assignment),
        })
    }
}

/// Accepts signed values and unsigned values up to `u64::MAX` (kept as
/// their two's complement bit pattern)
fn parse_integer(text: &str) -> Option<i64> {
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<u64>().ok().map(|v| v as i64))
}

impl fmt::Display for RangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.assignment {
            None => f.write_str("null"),
            Some(values) if values.is_empty() => f.write_str("null"),
            Some(values) => {
                let pairs: Vec<String> = values
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect();
                write!(f, "({})", pairs.join(" "))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeInterval {
    pub start: RangeValue,
    pub end: RangeValue,
}

impl RangeInterval {
    pub fn new(start: RangeValue, end: RangeValue) -> Self {
        Self { start, end }
    }

    /// `[null, null]`: every path
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_unbounded() && self.end.is_unbounded()
    }

    /// Parse `[start, end]`; an empty side is `null`
    pub fn parse(text: &str) -> Result<Self, RangeError> {
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .or_else(|| trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')))
            .ok_or_else(|| RangeError::syntax(text, "expected '[start, end]'"))?;
        let (start, end) = inner
            .split_once(',')
            .ok_or_else(|| RangeError::syntax(text, "missing ',' between bounds"))?;
        Ok(Self {
            start: RangeValue::parse(start)?,
            end: RangeValue::parse(end)?,
        })
    }
}

impl fmt::Display for RangeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

impl std::str::FromStr for RangeInterval {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RangeInterval::parse(s)
    }
}

/// Read a range file: lines starting with `#` are comments, the remaining
/// lines are joined and parsed as one interval
pub fn load_range(path: impl AsRef<Path>) -> crate::errors::Result<RangeInterval> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let joined: String = content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("");
    if joined.trim().is_empty() {
        return Err(RangeError::Empty(path.display().to_string()).into());
    }
    Ok(RangeInterval::parse(&joined)?)
}

/// Write `range` in the notation [`load_range`] reads back
pub fn save_range(path: impl AsRef<Path>, range: &RangeInterval) -> crate::errors::Result<()> {
    std::fs::write(path, format!("{}\n", range))?;
    Ok(())
}

//! Satisfying assignments

use crate::features::path_formula::domain::SsaSymbol;
use crate::features::path_formula::infrastructure::{evaluate, EvalError, Value};
use crate::features::path_formula::domain::Term;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value of one symbol in a model (raw bits plus width)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelValue {
    pub bits: u64,
    pub width: u32,
}

/// Serialized form of one model entry (symbols are not valid JSON keys)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub symbol: SsaSymbol,
    pub bits: u64,
    pub width: u32,
}

/// Assignment to the SSA symbols of a satisfiable query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<ModelEntry>", from = "Vec<ModelEntry>")]
pub struct Model {
    values: BTreeMap<SsaSymbol, ModelValue>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: SsaSymbol, bits: u64, width: u32) {
        self.values.insert(symbol, ModelValue { bits, width });
    }

    pub fn get(&self, name: &str, index: u32) -> Option<u64> {
        self.values
            .get(&SsaSymbol::new(name, index))
            .map(|v| v.bits)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SsaSymbol, &ModelValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Evaluate a term; symbols missing from the model read as 0
    pub fn eval(&self, term: &Term) -> Result<Value, EvalError> {
        evaluate(term, &|name: &str, index: u32| {
            Some(self.get(name, index).unwrap_or(0))
        })
    }

    /// True when the term evaluates to `true` under this model
    pub fn satisfies(&self, term: &Term) -> bool {
        matches!(self.eval(term), Ok(Value::Bool(true)))
    }
}

impl From<Model> for Vec<ModelEntry> {
    fn from(model: Model) -> Self {
        model
            .values
            .into_iter()
            .map(|(symbol, v)| ModelEntry {
                symbol,
                bits: v.bits,
                width: v.width,
            })
            .collect()
    }
}

impl From<Vec<ModelEntry>> for Model {
    fn from(entries: Vec<ModelEntry>) -> Self {
        let mut model = Model::new();
        for entry in entries {
            model.insert(entry.symbol, entry.bits, entry.width);
        }
        model
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (symbol, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", symbol, value.bits)?;
        }
        f.write_str("]")
    }
}

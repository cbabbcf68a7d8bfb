//! Verification task input
//!
//! The front end hands over one JSON document:
//! ```json
//! { "cfa": { "entry_function": "main", ... }, "automata": [ ... ] }
//! ```
//! Without `automata` the reach-error property is checked.

use crate::errors::Result;
use crate::features::automaton::Automaton;
use crate::shared::models::Cfa;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationTask {
    pub cfa: Cfa,
    #[serde(default)]
    pub automata: Vec<Automaton>,
}

impl VerificationTask {
    pub fn new(cfa: Cfa, automata: Vec<Automaton>) -> Self {
        Self { cfa, automata }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut task: VerificationTask = serde_json::from_str(content)?;
        if task.automata.is_empty() {
            task.automata.push(Automaton::reach_error());
        }
        Ok(task)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

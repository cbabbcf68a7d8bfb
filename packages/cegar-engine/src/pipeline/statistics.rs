//! Analysis statistics

use crate::features::smt::SolverStats;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Counters of one CEGAR run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CegarStatistics {
    /// Exploration rounds (one per refinement, plus the last)
    pub iterations: usize,

    /// Successful refinements
    pub refinements: usize,

    /// ARG nodes created over all rounds (pruned ones included)
    pub arg_nodes_created: usize,

    /// Live ARG nodes at the end
    pub arg_nodes_final: usize,

    /// Nodes closed by coverage
    pub covered_nodes: usize,

    /// Successors with an unsatisfiable abstraction
    pub bottom_nodes: usize,

    /// Counterexamples found infeasible
    pub spurious_counterexamples: usize,

    /// Counterexamples found feasible
    pub feasible_counterexamples: usize,

    /// Distinct predicates in the final precision
    pub predicates: usize,

    /// Abstraction computations and how many came from the cache
    pub abstractions: u64,
    pub abstraction_cache_hits: u64,

    /// Decision procedure counters
    pub solver: SolverStats,

    /// Wall-clock time per phase (exploration, feasibility, refinement)
    #[serde(with = "phase_millis")]
    pub phase_durations: HashMap<String, Duration>,

    /// Total execution time
    #[serde(with = "millis")]
    pub total_duration: Duration,
}

impl CegarStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `duration` to the time spent in `phase`
    pub fn record_phase(&mut self, phase: impl Into<String>, duration: Duration) {
        *self.phase_durations.entry(phase.into()).or_default() += duration;
    }

    /// Share of abstractions answered from the cache (0.0-1.0)
    pub fn cache_hit_rate(&self) -> f64 {
        if self.abstractions == 0 {
            0.0
        } else {
            self.abstraction_cache_hits as f64 / self.abstractions as f64
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for CegarStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "iterations:            {}", self.iterations)?;
        writeln!(f, "refinements:           {}", self.refinements)?;
        writeln!(
            f,
            "ARG nodes:             {} created, {} final",
            self.arg_nodes_created, self.arg_nodes_final
        )?;
        writeln!(
            f,
            "covered / bottom:      {} / {}",
            self.covered_nodes, self.bottom_nodes
        )?;
        writeln!(
            f,
            "counterexamples:       {} spurious, {} feasible",
            self.spurious_counterexamples, self.feasible_counterexamples
        )?;
        writeln!(f, "predicates:            {}", self.predicates)?;
        writeln!(
            f,
            "abstractions:          {} ({:.1}% cached)",
            self.abstractions,
            self.cache_hit_rate() * 100.0
        )?;
        writeln!(
            f,
            "solver queries:        {} ({} sat, {} unsat, {} unknown, {} retries)",
            self.solver.queries,
            self.solver.sat,
            self.solver.unsat,
            self.solver.unknown,
            self.solver.retries
        )?;
        let mut phases: Vec<_> = self.phase_durations.iter().collect();
        phases.sort();
        for (phase, duration) in phases {
            writeln!(f, "  {:<20} {:.3}s", phase, duration.as_secs_f64())?;
        }
        write!(f, "total time:            {:.3}s", self.total_duration.as_secs_f64())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod phase_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(m: &HashMap<String, Duration>, s: S) -> Result<S::Ok, S::Error> {
        let millis: std::collections::BTreeMap<&String, u64> =
            m.iter().map(|(k, v)| (k, v.as_millis() as u64)).collect();
        millis.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<HashMap<String, Duration>, D::Error> {
        let millis = HashMap::<String, u64>::deserialize(d)?;
        Ok(millis
            .into_iter()
            .map(|(k, v)| (k, Duration::from_millis(v)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_durations_accumulate() {
        let mut stats = CegarStatistics::new();
        stats.record_phase("exploration", Duration::from_millis(5));
        stats.record_phase("exploration", Duration::from_millis(7));
        assert_eq!(stats.phase_durations["exploration"], Duration::from_millis(12));
    }

    #[test]
    fn test_json_and_display() {
        let mut stats = CegarStatistics::new();
        stats.refinements = 2;
        stats.abstractions = 4;
        stats.abstraction_cache_hits = 1;
        stats.total_duration = Duration::from_millis(1500);
        stats.record_phase("refinement", Duration::from_millis(20));

        let json = stats.to_json().unwrap();
        let back: CegarStatistics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);

        let text = stats.to_string();
        assert!(text.contains("refinements:           2"));
        assert!(text.contains("25.0% cached"));
    }
}

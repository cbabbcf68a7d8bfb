//! Path and engine helpers

use cegar_engine::config::{EngineConfig, Preset};
use cegar_engine::features::arg::ArgNodeId;
use cegar_engine::features::feasibility::{Counterexample, CounterexampleStep};
use cegar_engine::features::smt::{BitBlastSolver, InstrumentedSolver, QueryLimits};
use cegar_engine::shared::models::{Cfa, CfaEdge, EdgeKind};
use cegar_engine::{Automaton, CegarDriver, ValidatedConfig, VerificationOutcome};
use std::sync::Arc;

/// Follow `cfa` from its start, taking the given truth value at each
/// branch; stops at the first branch with no choice left or at a node
/// without successors
pub fn walk(cfa: &Cfa, branches: &[bool]) -> Counterexample {
    let mut location = cfa.start();
    let mut choices = branches.iter();
    let mut steps = Vec::new();
    loop {
        let edges: Vec<&CfaEdge> = cfa.outgoing(location).collect();
        let edge = match edges.as_slice() {
            [] => break,
            [only] => *only,
            _ => {
                let Some(truth) = choices.next() else { break };
                *edges
                    .iter()
                    .find(|e| matches!(e.kind, EdgeKind::Assumption { truth: t, .. } if t == *truth))
                    .expect("branching node has both assumption edges")
            }
        };
        steps.push(CounterexampleStep {
            edge: edge.id,
            assumptions: vec![],
        });
        location = edge.target;
    }
    let nodes = (0..=steps.len() as u32).map(ArgNodeId).collect();
    Counterexample {
        target: ArgNodeId(steps.len() as u32),
        nodes,
        steps,
    }
}

pub fn bitblast_solver() -> Arc<InstrumentedSolver> {
    Arc::new(InstrumentedSolver::new(
        Arc::new(BitBlastSolver::new()),
        QueryLimits::UNLIMITED,
        0,
    ))
}

pub fn balanced() -> ValidatedConfig {
    EngineConfig::preset(Preset::Balanced)
        .build()
        .expect("balanced preset is valid")
}

pub fn verify(cfa: Cfa, automata: Vec<Automaton>, config: ValidatedConfig) -> VerificationOutcome {
    CegarDriver::new(cfa, automata, config)
        .expect("valid automata")
        .run()
        .expect("analysis finishes")
}

pub fn verify_reach_error(cfa: Cfa) -> VerificationOutcome {
    verify(cfa, vec![Automaton::reach_error()], balanced())
}

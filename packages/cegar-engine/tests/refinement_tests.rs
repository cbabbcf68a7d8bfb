//! Feasibility checking and refinement progress

mod common;

use cegar_engine::config::{EngineConfig, Preset};
use cegar_engine::features::feasibility::{Feasibility, FeasibilityChecker};
use cegar_engine::features::path_formula::PathFormulaEncoder;
use cegar_engine::pipeline::{Resource, UnknownReason};
use cegar_engine::{Automaton, CegarDriver, Verdict};
use common::*;
use std::sync::Arc;

#[test]
fn test_executable_gcd_path_has_a_replayable_model() {
    let cfa = gcd();
    // a != b, a <= b (b -= a), a != b, a > b (a -= b)
    let path = walk(&cfa, &[true, false, true, true]);
    let checker = FeasibilityChecker::new(Arc::new(cfa), bitblast_solver(), PathFormulaEncoder::default());

    let Feasibility::Feasible { model } = checker.check(&path).unwrap() else {
        panic!("the path runs for a=2, b=3");
    };
    assert!(checker.validate_witness(&path, &model).unwrap());
    let a = model.get("main::a", 1).unwrap() as u32 as i32;
    let b = model.get("main::b", 1).unwrap() as u32 as i32;
    assert_ne!(a, b);
    assert!(a <= b);
}

#[test]
fn test_thursday_discount_never_leaves_range() {
    let cfa = discount();
    let path = walk(&cfa, &[true, true]);
    let checker = FeasibilityChecker::new(Arc::new(cfa), bitblast_solver(), PathFormulaEncoder::default());
    match checker.check(&path).unwrap() {
        Feasibility::Infeasible(infeasible) => assert!(!infeasible.core.is_empty()),
        Feasibility::Feasible { model } => panic!("discount 5 is in range, got model {}", model),
    }
}

#[test]
fn test_each_refinement_grows_the_precision() {
    let predicates: Vec<usize> = [1, 2]
        .into_iter()
        .map(|budget| {
            let config = EngineConfig::preset(Preset::Balanced)
                .budget(|c| c.max_refinements(budget))
                .build()
                .unwrap();
            verify(counter(10), vec![Automaton::reach_error()], config)
                .precision
                .distinct_predicates()
        })
        .collect();
    assert!(predicates[0] >= 1, "{:?}", predicates);
    assert!(predicates[0] < predicates[1], "{:?}", predicates);
}

#[test]
fn test_learned_precision_proves_without_refinement() {
    let first = verify_reach_error(counter(10));
    assert!(first.verdict.is_safe());

    let second = CegarDriver::new(counter(10), vec![Automaton::reach_error()], balanced())
        .unwrap()
        .with_initial_precision(first.precision.clone())
        .run()
        .unwrap();
    assert_eq!(second.verdict, Verdict::Safe);
    assert_eq!(second.statistics.refinements, 0);
    assert_eq!(second.statistics.iterations, 1);
}

#[test]
fn test_exhausted_budget_reports_a_resumable_range() {
    let config = EngineConfig::preset(Preset::Balanced)
        .budget(|c| c.max_arg_nodes(4))
        .build()
        .unwrap();
    let outcome = verify(gcd(), vec![Automaton::reach_error()], config);
    assert!(
        matches!(
            outcome.verdict,
            Verdict::Unknown {
                reason: UnknownReason::ResourceExhaustion {
                    resource: Resource::ArgNodes,
                    ..
                }
            }
        ),
        "got {}",
        outcome.verdict
    );
    let range = outcome.remaining_range.expect("remaining range");
    assert!(range.end.is_unbounded());
}

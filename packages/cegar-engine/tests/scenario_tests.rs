//! End-to-end verification scenarios on the benchmark programs

mod common;

use cegar_engine::config::{EngineConfig, Preset, PrecisionScope, RefinementStrategy};
use cegar_engine::features::range::RangeInterval;
use cegar_engine::{Automaton, CegarDriver, Verdict};
use common::*;
use pretty_assertions::assert_eq;

#[test]
fn test_discount_stays_within_bounds() {
    let outcome = verify_reach_error(discount());
    assert_eq!(outcome.verdict, Verdict::Safe);
    assert_eq!(outcome.statistics.feasible_counterexamples, 0);
}

#[test]
fn test_gcd_without_error_label_is_safe() {
    let outcome = verify_reach_error(gcd());
    assert!(outcome.verdict.is_safe());
    assert_eq!(outcome.statistics.refinements, 0);
    assert_eq!(outcome.statistics.iterations, 1);
}

#[test]
fn test_min_of_three_reaches_error() {
    let outcome = verify_reach_error(min_of_three());
    let witness = outcome.verdict.witness().expect("UNSAFE with a witness");
    assert_eq!(witness.validated, Some(true));

    // Replay the branch conditions with 32-bit wrap-around
    let inputs = witness.inputs();
    let value = |name: &str| inputs.get(name).copied().unwrap_or_default() as u32 as i32;
    let a = value("main::a").wrapping_add(2);
    let b = value("main::b").wrapping_mul(2);
    let c = value("main::c").wrapping_add(1);
    assert!(a < b, "a={} b={}", a, b);
    assert!(b >= c, "b={} c={}", b, c);
    assert!(a >= c, "a={} c={}", a, c);
    assert_eq!(outcome.verdict.exit_code(), 1);
}

#[test]
fn test_counter_loop_needs_two_refinements() {
    let outcome = verify_reach_error(counter(10));
    assert!(outcome.verdict.is_safe());
    assert_eq!(outcome.statistics.refinements, 2);
    assert!(outcome.precision.distinct_predicates() >= 2);
}

#[test]
fn test_mutex_with_global_unsat_core_refinement() {
    let config = EngineConfig::preset(Preset::Balanced)
        .refinement(|c| {
            c.strategy(RefinementStrategy::UnsatCore)
                .scope(PrecisionScope::Global)
        })
        .build()
        .unwrap();
    let outcome = verify(mutex(true), vec![mutex_automaton(1)], config);
    assert!(outcome.verdict.is_safe(), "got {}", outcome.verdict);
    assert!(outcome.precision.local().is_empty());
    assert!(!outcome.precision.global().is_empty());
}

#[test]
fn test_correlated_mutex_calls_are_safe_after_refinement() {
    let outcome = verify(mutex(true), vec![mutex_automaton(1)], balanced());
    assert!(outcome.verdict.is_safe(), "got {}", outcome.verdict);
    assert!(outcome.statistics.refinements >= 1);
    assert!(outcome.statistics.spurious_counterexamples >= 1);
}

#[test]
fn test_mismatched_mutex_calls_are_unsafe() {
    let outcome = verify(mutex(false), vec![mutex_automaton(1)], balanced());
    assert!(outcome.verdict.is_unsafe(), "got {}", outcome.verdict);
    assert_eq!(outcome.verdict.witness().unwrap().validated, Some(true));
}

#[test]
fn test_range_after_error_path_is_safe() {
    let range = RangeInterval::parse("[(main::a=5 main::b=3 main::c=2), null]").unwrap();
    let outcome = CegarDriver::new(min_of_three(), vec![Automaton::reach_error()], balanced())
        .unwrap()
        .with_range(range)
        .run()
        .unwrap();
    assert_eq!(outcome.verdict, Verdict::Safe);
}

#[test]
fn test_range_up_to_start_input_finds_error() {
    let range = RangeInterval::parse("[null, (main::a=5 main::b=3 main::c=2)]").unwrap();
    let outcome = CegarDriver::new(min_of_three(), vec![Automaton::reach_error()], balanced())
        .unwrap()
        .with_range(range)
        .run()
        .unwrap();
    assert!(outcome.verdict.is_unsafe(), "got {}", outcome.verdict);
}

#[test]
fn test_sequential_and_parallel_exploration_agree() {
    for parallel in [false, true] {
        let config = EngineConfig::preset(Preset::Balanced)
            .exploration(|c| c.parallel(parallel).num_threads(2))
            .build()
            .unwrap();
        let outcome = verify(counter(10), vec![Automaton::reach_error()], config);
        assert!(outcome.verdict.is_safe(), "parallel={}: {}", parallel, outcome.verdict);
    }
}

/// Every covering node in a final ARG must be able to stand in for the node
/// it covers, and no live unexpanded error state may remain
fn assert_coverage_sound(outcome: &cegar_engine::VerificationOutcome) {
    let arg = &outcome.arg;
    let mut covered = 0;
    for node in arg.nodes().filter(|n| !n.removed) {
        if let Some(by) = node.covered_by {
            covered += 1;
            let cover = arg.node(by);
            assert!(!cover.removed && !cover.is_covered(), "{:?} covered by a dead node", node.id);
            assert!(cover.id < node.id);
            assert_eq!(cover.state.coverage_key(), node.state.coverage_key());
            assert_eq!(cover.state.automata, node.state.automata);
            assert!(node.state.abstraction.entails(&cover.state.abstraction));
        }
        if node.is_target && !node.is_covered() {
            assert!(node.state.is_bottom(), "reachable error state {:?}", node.id);
        }
    }
    assert!(covered > 0, "the loop head should be closed by coverage");
}

#[test]
fn test_final_arg_coverage_is_sound() {
    assert_coverage_sound(&verify_reach_error(counter(10)));
    assert_coverage_sound(&verify(mutex(true), vec![mutex_automaton(1)], balanced()));
}

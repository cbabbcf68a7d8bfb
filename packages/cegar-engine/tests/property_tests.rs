//! Property-based tests
//!
//! Invariants that should hold for all generated inputs:
//! - SSA monotonicity: every write allocates the next version of its
//!   variable and never reuses one
//! - Path associativity: step-wise encoding equals whole-path encoding
//! - Bit-blaster agreement: the solver computes what the evaluator computes

mod common;

use cegar_engine::features::path_formula::{
    evaluate, BvBinaryOp, PathFormula, PathFormulaEncoder, SsaSymbol, Term,
};
use cegar_engine::features::smt::{BitBlastSolver, DecisionProcedure, QueryLimits, SolverResult};
use cegar_engine::{CType, Cfa, CfaBuilder, Expr};
use common::walk;
use proptest::prelude::*;
use std::sync::Arc;

const VARIABLES: [&str; 3] = ["x", "y", "z"];

/// Straight-line program: declare the variables, then one write per entry
fn straight_line(writes: &[(usize, i64, bool)]) -> Cfa {
    let mut cfa = CfaBuilder::new();
    cfa.declare_function("main", &[], None);
    let mut main = cfa.body("main");
    let mut node = main.entry();
    for name in VARIABLES {
        node = main.declare(node, name, CType::INT, Some(Expr::int(0)));
    }
    for (var, constant, accumulate) in writes {
        let name = VARIABLES[*var];
        let value = if *accumulate {
            Expr::add(main.var(name), Expr::int(*constant))
        } else {
            Expr::int(*constant)
        };
        node = main.assign(node, name, value);
    }
    main.ret(node, None);
    cfa.entry_function("main").build().unwrap()
}

fn writes() -> impl Strategy<Value = Vec<(usize, i64, bool)>> {
    prop::collection::vec((0..VARIABLES.len(), -100i64..100, any::<bool>()), 0..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_ssa_indices_grow_with_each_write(writes in writes()) {
        let cfa = straight_line(&writes);
        let path = walk(&cfa, &[]);
        let encoded = PathFormulaEncoder::default()
            .encode_path(&cfa, path.cfa_steps(&cfa))
            .unwrap();

        for name in VARIABLES {
            let qualified = format!("main::{}", name);
            let indices: Vec<u32> = encoded.ssa_after.iter().map(|ssa| ssa.index(&qualified)).collect();
            for pair in indices.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
                prop_assert!(pair[1] - pair[0] <= 1);
            }
            let expected = 1 + writes.iter().filter(|(v, _, _)| VARIABLES[*v] == name).count() as u32;
            prop_assert_eq!(indices.last().copied().unwrap_or(0), expected);
        }
        for pair in encoded.ssa_after.windows(2) {
            prop_assert!(pair[1].dominates(&pair[0]));
        }
    }

    #[test]
    fn test_stepwise_encoding_matches_whole_path(writes in writes()) {
        let cfa = straight_line(&writes);
        let path = walk(&cfa, &[]);
        let encoder = PathFormulaEncoder::default();
        let whole = encoder.encode_path(&cfa, path.cfa_steps(&cfa)).unwrap();

        let mut pf = PathFormula::empty();
        for (edge, assumptions) in path.cfa_steps(&cfa) {
            pf = encoder.encode_step(&cfa, edge, assumptions, &pf).unwrap();
        }
        let non_trivial: Vec<_> = whole.conjuncts.iter().filter(|t| !t.is_true()).cloned().collect();
        prop_assert_eq!(pf.conjuncts(), non_trivial.as_slice());
        prop_assert_eq!(pf.ssa(), &whole.ssa_at(whole.len()));
    }
}

fn no_symbols(_: &str, _: u32) -> Option<u64> {
    None
}

fn operator() -> impl Strategy<Value = BvBinaryOp> {
    prop::sample::select(vec![
        BvBinaryOp::Add,
        BvBinaryOp::Mul,
        BvBinaryOp::UDiv,
        BvBinaryOp::URem,
        BvBinaryOp::SDiv,
        BvBinaryOp::SRem,
        BvBinaryOp::Shl,
        BvBinaryOp::LShr,
        BvBinaryOp::AShr,
        BvBinaryOp::And,
        BvBinaryOp::Or,
        BvBinaryOp::Xor,
    ])
}

fn operand() -> impl Strategy<Value = u64> {
    prop_oneof![0u64..8, any::<u16>().prop_map(u64::from), Just(0xFFFF), Just(0x8000), Just(0x7FFF)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_bitblaster_agrees_with_evaluator(op in operator(), a in operand(), b in operand()) {
        const WIDTH: u32 = 16;
        let sa = SsaSymbol::new("a", 1);
        let sb = SsaSymbol::new("b", 1);
        let sr = SsaSymbol::new("r", 1);
        let applied = Term::binary(op, Term::symbol(&sa, WIDTH), Term::symbol(&sb, WIDTH));
        let query = vec![
            Arc::new(Term::eq(Term::symbol(&sa, WIDTH), Term::bv(a, WIDTH))),
            Arc::new(Term::eq(Term::symbol(&sb, WIDTH), Term::bv(b, WIDTH))),
            Arc::new(Term::eq(Term::symbol(&sr, WIDTH), applied)),
        ];

        let expected = evaluate(
            &Term::binary(op, Term::bv(a, WIDTH), Term::bv(b, WIDTH)),
            &no_symbols,
        )
        .unwrap()
        .as_bv()
        .unwrap()
        .0;

        match BitBlastSolver::new().check(&query, &QueryLimits::UNLIMITED) {
            SolverResult::Sat(model) => prop_assert_eq!(model.get("r", 1), Some(expected)),
            other => prop_assert!(false, "expected SAT, got {:?}", other),
        }
    }
}

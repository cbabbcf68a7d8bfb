//! Benchmark programs
//!
//! Each builder mirrors a small C program; the source is in the doc comment.

use cegar_engine::features::automaton::{Automaton, Guard, Transition};
use cegar_engine::{CType, Cfa, CfaBuilder, Expr};
use std::collections::BTreeSet;

/// ```c
/// int computeDiscount(unsigned int day, int isThursday) {
///   int discount;
///   if (isThursday) discount = 5; else discount = day % 7;
///   if (discount < 0 || discount > 7) ERROR: __VERIFIER_error();
///   return discount;
/// }
/// ```
pub fn discount() -> Cfa {
    let mut cfa = CfaBuilder::new();
    cfa.declare_function(
        "computeDiscount",
        &[("day", CType::UINT), ("isThursday", CType::INT)],
        Some(CType::INT),
    );
    let mut f = cfa.body("computeDiscount");
    let n1 = f.declare(f.entry(), "discount", CType::INT, None);
    let is_thursday = f.var("isThursday");
    let (thursday, other) = f.branch(n1, Expr::ne(is_thursday, Expr::int(0)));
    let fixed = f.assign(thursday, "discount", Expr::int(5));
    let day = f.var("day");
    let modulo = f.assign(
        other,
        "discount",
        Expr::cast(CType::INT, Expr::rem(day, Expr::uint(7))),
    );
    let check = f.node();
    f.blank(fixed, check);
    f.blank(modulo, check);
    let discount = f.var("discount");
    let out_of_range = Expr::or(
        Expr::lt(discount.clone(), Expr::int(0)),
        Expr::gt(discount.clone(), Expr::int(7)),
    );
    let (bad, good) = f.branch(check, out_of_range);
    let error = f.node();
    f.label(error, "ERROR");
    f.blank(bad, error);
    let after = f.call_external(error, "__VERIFIER_error", vec![], None);
    f.ret(after, Some(discount.clone()));
    f.ret(good, Some(discount));
    cfa.entry_function("computeDiscount").build().expect("discount program")
}

/// ```c
/// int main(int a, int b) {
///   while (a != b) { if (a > b) a = a - b; else b = b - a; }
///   return a;
/// }
/// ```
pub fn gcd() -> Cfa {
    let mut cfa = CfaBuilder::new();
    cfa.declare_function("main", &[("a", CType::INT), ("b", CType::INT)], Some(CType::INT));
    let mut main = cfa.body("main");
    let head = main.node();
    main.blank(main.entry(), head);
    let a = main.var("a");
    let b = main.var("b");
    let (body, done) = main.branch(head, Expr::ne(a.clone(), b.clone()));
    let (bigger, smaller) = main.branch(body, Expr::gt(a.clone(), b.clone()));
    let reduced_a = main.assign(bigger, "a", Expr::sub(a.clone(), b.clone()));
    let reduced_b = main.assign(smaller, "b", Expr::sub(b, a.clone()));
    main.blank(reduced_a, head);
    main.blank(reduced_b, head);
    main.ret(done, Some(a));
    cfa.entry_function("main").build().expect("gcd program")
}

/// ```c
/// int main(int a, int b, int c) {
///   int min = 0;
///   a = a + 2; b = b * 2; c = c + 1;
///   if (a < b) {
///     if (b < c) min = a;
///     else if (a < c) min = a;
///     else { ERROR: __VERIFIER_error(); min = c; }
///   } else {
///     if (c < b) min = c; else min = b;
///   }
///   return min;
/// }
/// ```
pub fn min_of_three() -> Cfa {
    let mut cfa = CfaBuilder::new();
    cfa.declare_function(
        "main",
        &[("a", CType::INT), ("b", CType::INT), ("c", CType::INT)],
        Some(CType::INT),
    );
    let mut main = cfa.body("main");
    let n1 = main.declare(main.entry(), "min", CType::INT, Some(Expr::int(0)));
    let a = main.var("a");
    let b = main.var("b");
    let c = main.var("c");
    let n2 = main.assign(n1, "a", Expr::add(a.clone(), Expr::int(2)));
    let n3 = main.assign(n2, "b", Expr::mul(b.clone(), Expr::int(2)));
    let n4 = main.assign(n3, "c", Expr::add(c.clone(), Expr::int(1)));
    let done = main.node();

    let (a_lt_b, a_ge_b) = main.branch(n4, Expr::lt(a.clone(), b.clone()));
    let (b_lt_c, b_ge_c) = main.branch(a_lt_b, Expr::lt(b.clone(), c.clone()));
    let m1 = main.assign(b_lt_c, "min", a.clone());
    main.blank(m1, done);
    let (a_lt_c, a_ge_c) = main.branch(b_ge_c, Expr::lt(a.clone(), c.clone()));
    let m2 = main.assign(a_lt_c, "min", a);
    main.blank(m2, done);
    let error = main.node();
    main.label(error, "ERROR");
    main.blank(a_ge_c, error);
    let reported = main.call_external(error, "__VERIFIER_error", vec![], None);
    let m3 = main.assign(reported, "min", c.clone());
    main.blank(m3, done);

    let (c_lt_b, c_ge_b) = main.branch(a_ge_b, Expr::lt(c.clone(), b.clone()));
    let m4 = main.assign(c_lt_b, "min", c);
    main.blank(m4, done);
    let m5 = main.assign(c_ge_b, "min", b);
    main.blank(m5, done);

    let min = main.var("min");
    main.ret(done, Some(min));
    cfa.entry_function("main").build().expect("min program")
}

/// `x = 0; while (x < 10) x++; if (x != bound) ERROR;`
pub fn counter(bound: i64) -> Cfa {
    let mut cfa = CfaBuilder::new();
    cfa.declare_function("main", &[], Some(CType::INT));
    let mut main = cfa.body("main");
    let n1 = main.declare(main.entry(), "x", CType::INT, Some(Expr::int(0)));
    let head = main.node();
    main.blank(n1, head);
    let x = main.var("x");
    let (body, done) = main.branch(head, Expr::lt(x.clone(), Expr::int(10)));
    let incremented = main.assign(body, "x", Expr::add(x.clone(), Expr::int(1)));
    main.blank(incremented, head);
    let (bad, good) = main.branch(done, Expr::ne(x, Expr::int(bound)));
    let error = main.node();
    main.label(error, "ERROR");
    main.blank(bad, error);
    main.ret(error, Some(Expr::int(1)));
    main.ret(good, Some(Expr::int(0)));
    cfa.entry_function("main").build().expect("counter program")
}

/// Lock discipline for mutex number `id`: no double lock, no unlock while
/// unlocked, unlocked again at `ldv_check_final_state()`
pub fn mutex_automaton(id: i64) -> Automaton {
    let call = |function: &str| Guard::CallTo {
        function: function.to_string(),
        argument: Some((0, id)),
    };
    let t = |from: &str, to: &str, guard: Guard| Transition {
        from: from.to_string(),
        to: to.to_string(),
        guard,
        assume: None,
    };
    Automaton {
        name: format!("Mutex{}", id),
        states: vec!["Unlocked".into(), "Locked".into(), "Error".into()],
        initial: "Unlocked".into(),
        error_states: BTreeSet::from(["Error".to_string()]),
        transitions: vec![
            t("Unlocked", "Locked", call("mutex_lock")),
            t("Unlocked", "Error", call("mutex_unlock")),
            t("Locked", "Error", call("mutex_lock")),
            t("Locked", "Unlocked", call("mutex_unlock")),
            t(
                "Locked",
                "Error",
                Guard::CallTo {
                    function: "ldv_check_final_state".to_string(),
                    argument: None,
                },
            ),
        ],
    }
}

/// ```c
/// void main(void) {
///   int flag = __VERIFIER_nondet_int();
///   if (flag) mutex_lock(1);
///   for (int i = 0; i < 3; i++) ;
///   if (flag) mutex_unlock(1);      /* `correct = false`: if (!flag) */
///   ldv_check_final_state();
/// }
/// ```
///
/// The lock and unlock are correlated only through `flag`, across a loop
/// head, so proving the correct variant needs a refinement.
pub fn mutex(correct: bool) -> Cfa {
    let mut cfa = CfaBuilder::new();
    cfa.declare_function("main", &[], None);
    let mut main = cfa.body("main");
    let n1 = main.declare(main.entry(), "flag", CType::INT, Some(Expr::nondet(CType::INT)));
    let flag = main.var("flag");
    let (lock, skip_lock) = main.branch(n1, Expr::ne(flag.clone(), Expr::int(0)));
    let locked = main.call_external(lock, "mutex_lock", vec![Expr::int(1)], None);

    let n2 = main.node();
    main.blank(locked, n2);
    main.blank(skip_lock, n2);
    let n3 = main.declare(n2, "i", CType::INT, Some(Expr::int(0)));
    let head = main.node();
    main.blank(n3, head);
    let i = main.var("i");
    let (body, done) = main.branch(head, Expr::lt(i.clone(), Expr::int(3)));
    let stepped = main.assign(body, "i", Expr::add(i, Expr::int(1)));
    main.blank(stepped, head);

    let unlock_condition = if correct {
        Expr::ne(flag, Expr::int(0))
    } else {
        Expr::eq(flag, Expr::int(0))
    };
    let (unlock, skip_unlock) = main.branch(done, unlock_condition);
    let unlocked = main.call_external(unlock, "mutex_unlock", vec![Expr::int(1)], None);
    let n4 = main.node();
    main.blank(unlocked, n4);
    main.blank(skip_unlock, n4);
    let checked = main.call_external(n4, "ldv_check_final_state", vec![], None);
    main.ret(checked, None);
    cfa.entry_function("main").build().expect("mutex program")
}

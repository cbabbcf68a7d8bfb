//! Concrete bit-vector execution of CFA paths
//!
//! The executor does not interpret expressions itself. It encodes each
//! edge with the same [`PathFormulaEncoder`] the analysis uses and then
//! evaluates the resulting step constraint: equalities defining a fresh
//! SSA symbol are assignments, everything else is a check. Concrete runs
//! and path formulas therefore agree on semantics and on SSA numbering by
//! construction.

use crate::errors::ModelingError;
use crate::features::path_formula::domain::{SsaMap, SsaSymbol, Term};
use crate::features::path_formula::infrastructure::{evaluate, PathFormulaEncoder, Value};
use crate::features::range::domain::RangeValue;
use crate::features::smt::domain::Model;
use crate::shared::models::{CType, Cfa, CfaEdge, Expr};
use std::collections::{BTreeMap, BTreeSet};

/// Supplies values for havocked symbols (inputs)
pub trait InputSource {
    fn input(&self, symbol: &SsaSymbol, ty: CType) -> Option<u64>;
}

impl InputSource for Model {
    fn input(&self, symbol: &SsaSymbol, _ty: CType) -> Option<u64> {
        self.get(&symbol.name, symbol.index)
    }
}

impl InputSource for RangeValue {
    fn input(&self, symbol: &SsaSymbol, ty: CType) -> Option<u64> {
        RangeValue::input(self, symbol, ty)
    }
}

/// No inputs at all: every havoc is unknown
pub struct NoInputs;

impl InputSource for NoInputs {
    fn input(&self, _symbol: &SsaSymbol, _ty: CType) -> Option<u64> {
        None
    }
}

/// Concrete state of one execution: SSA numbering plus the value of every
/// symbol defined so far (missing = unknown)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConcreteRun {
    ssa: SsaMap,
    values: BTreeMap<SsaSymbol, u64>,
}

impl ConcreteRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ssa(&self) -> &SsaMap {
        &self.ssa
    }

    pub fn values(&self) -> &BTreeMap<SsaSymbol, u64> {
        &self.values
    }

    /// Current value of a program variable
    pub fn value(&self, name: &str) -> Option<u64> {
        self.ssa
            .current(name)
            .and_then(|symbol| self.values.get(&symbol).copied())
    }

    fn lookup(&self, name: &str, index: u32) -> Option<u64> {
        self.values.get(&SsaSymbol::new(name, index)).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Every check of the step held
    Continue,
    /// A check evaluated to false: the run cannot take this edge
    Blocked,
    /// A check depends on an unknown value
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    Blocked { step: usize },
    Undetermined { step: usize },
}

#[derive(Debug, Clone)]
pub struct Execution {
    pub run: ConcreteRun,
    pub outcome: ExecutionOutcome,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConcreteExecutor {
    encoder: PathFormulaEncoder,
}

impl ConcreteExecutor {
    pub fn new(encoder: PathFormulaEncoder) -> Self {
        Self { encoder }
    }

    /// Execute one edge (plus automaton assumptions taken on it)
    pub fn step(
        &self,
        cfa: &Cfa,
        edge: &CfaEdge,
        assumptions: &[(Expr, bool)],
        run: &mut ConcreteRun,
        inputs: &dyn InputSource,
    ) -> Result<StepOutcome, ModelingError> {
        let before = run.ssa.clone();
        let constraint = self
            .encoder
            .step_constraint(cfa, edge, assumptions, &mut run.ssa)?;
        let conjuncts = match constraint {
            Term::And(parts) => parts,
            other => vec![other],
        };

        let is_fresh = |name: &str, index: u32| index > before.index(name);
        let defined: BTreeSet<SsaSymbol> = conjuncts
            .iter()
            .filter_map(|c| match c {
                Term::Eq { lhs, .. } => match lhs.as_ref() {
                    Term::Symbol { name, index, .. } if is_fresh(name, *index) => {
                        Some(SsaSymbol::new(name.clone(), *index))
                    }
                    _ => None,
                },
                _ => None,
            })
            .collect();

        // Fresh symbols without a defining equality are havocs
        for (name, entry) in run.ssa.iter() {
            for index in before.index(name) + 1..=entry.index {
                let symbol = SsaSymbol::new(name, index);
                if defined.contains(&symbol) {
                    continue;
                }
                if let Some(bits) = inputs.input(&symbol, entry.ty) {
                    run.values.insert(symbol, bits);
                }
            }
        }

        let mut outcome = StepOutcome::Continue;
        for conjunct in &conjuncts {
            if let Term::Eq { lhs, rhs } = conjunct {
                if let Term::Symbol { name, index, .. } = lhs.as_ref() {
                    let symbol = SsaSymbol::new(name.clone(), *index);
                    if defined.contains(&symbol) {
                        let env = |n: &str, i: u32| run.lookup(n, i);
                        if let Ok(Value::Bv { value, .. }) = evaluate(rhs, &env) {
                            run.values.insert(symbol, value);
                        }
                        continue;
                    }
                }
            }
            let env = |n: &str, i: u32| run.lookup(n, i);
            match evaluate(conjunct, &env).and_then(Value::as_bool) {
                Ok(true) => {}
                Ok(false) => return Ok(StepOutcome::Blocked),
                Err(_) => outcome = StepOutcome::Undetermined,
            }
        }
        Ok(outcome)
    }

    /// Truth value of `condition` in the run's current state
    pub fn evaluate_condition(&self, condition: &Expr, run: &ConcreteRun) -> Option<bool> {
        let term = self.encoder.instantiate(condition, &run.ssa).ok()?;
        let env = |n: &str, i: u32| run.lookup(n, i);
        evaluate(&term, &env).and_then(Value::as_bool).ok()
    }

    /// Execute a whole path from the program start
    pub fn execute<'a>(
        &self,
        cfa: &Cfa,
        steps: impl IntoIterator<Item = (&'a CfaEdge, &'a [(Expr, bool)])>,
        inputs: &dyn InputSource,
    ) -> Result<Execution, ModelingError> {
        let mut run = ConcreteRun::new();
        for (i, (edge, assumptions)) in steps.into_iter().enumerate() {
            match self.step(cfa, edge, assumptions, &mut run, inputs)? {
                StepOutcome::Continue => {}
                StepOutcome::Blocked => {
                    return Ok(Execution {
                        run,
                        outcome: ExecutionOutcome::Blocked { step: i },
                    })
                }
                StepOutcome::Undetermined => {
                    return Ok(Execution {
                        run,
                        outcome: ExecutionOutcome::Undetermined { step: i },
                    })
                }
            }
        }
        Ok(Execution {
            run,
            outcome: ExecutionOutcome::Completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::CfaBuilder;

    /// `x = nondet(); y = x * 2; if (y > 10) ...`
    fn program() -> Cfa {
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("main", &[], None);
        let mut main = cfa.body("main");
        let n1 = main.declare(main.entry(), "x", CType::INT, Some(Expr::nondet(CType::INT)));
        let x = main.var("x");
        let n2 = main.declare(n1, "y", CType::INT, Some(Expr::mul(x, Expr::int(2))));
        let y = main.var("y");
        let (big, small) = main.branch(n2, Expr::gt(y, Expr::int(10)));
        main.ret(big, None);
        main.ret(small, None);
        cfa.entry_function("main").build().unwrap()
    }

    fn path<'a>(cfa: &'a Cfa, truth: bool) -> Vec<&'a CfaEdge> {
        let mut node = cfa.start();
        let mut out = Vec::new();
        loop {
            let next = cfa.outgoing(node).find(|e| match &e.kind {
                crate::shared::models::EdgeKind::Assumption { truth: t, .. } => *t == truth,
                _ => true,
            });
            match next {
                Some(edge) if out.len() < 10 => {
                    out.push(edge);
                    node = edge.target;
                }
                _ => return out,
            }
        }
    }

    #[test]
    fn test_execution_follows_inputs() {
        let cfa = program();
        let inputs = RangeValue::parse("(main::x=6)").unwrap();
        let executor = ConcreteExecutor::default();
        let edges = path(&cfa, true);
        let steps = edges.iter().map(|e| (*e, &[][..]));
        let execution = executor.execute(&cfa, steps, &inputs).unwrap();
        assert_eq!(execution.outcome, ExecutionOutcome::Completed);
        assert_eq!(execution.run.value("main::y"), Some(12));

        let edges = path(&cfa, false);
        let steps = edges.iter().map(|e| (*e, &[][..]));
        let execution = executor.execute(&cfa, steps, &inputs).unwrap();
        assert!(matches!(execution.outcome, ExecutionOutcome::Blocked { .. }));
    }

    #[test]
    fn test_unknown_input_is_undetermined() {
        let cfa = program();
        let executor = ConcreteExecutor::default();
        let edges = path(&cfa, true);
        let steps = edges.iter().map(|e| (*e, &[][..]));
        let execution = executor.execute(&cfa, steps, &NoInputs).unwrap();
        assert!(matches!(
            execution.outcome,
            ExecutionOutcome::Undetermined { .. }
        ));
        assert_eq!(execution.run.value("main::y"), None);
    }

    #[test]
    fn test_condition_evaluation() {
        let cfa = program();
        let executor = ConcreteExecutor::default();
        let inputs = RangeValue::parse("(main::x=-1)").unwrap();
        let mut run = ConcreteRun::new();
        for edge in path(&cfa, true).into_iter().take(3) {
            executor.step(&cfa, edge, &[], &mut run, &inputs).unwrap();
        }
        let y = Expr::var("main::y", CType::INT);
        assert_eq!(
            executor.evaluate_condition(&Expr::lt(y.clone(), Expr::int(0)), &run),
            Some(true)
        );
        assert_eq!(
            executor.evaluate_condition(&Expr::lt(Expr::var("main::z", CType::INT), y), &run),
            None
        );
    }
}

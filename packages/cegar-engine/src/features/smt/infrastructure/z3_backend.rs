//! Z3 decision procedure
//!
//! Only available when compiled with `--features z3` (needs `libz3`).
//! A fresh context is created per query, so the backend itself holds no
//! solver state and can be shared across threads.

#![cfg(feature = "z3")]

use crate::features::path_formula::domain::{BvBinaryOp, BvCmpOp, BvUnaryOp, SsaSymbol, Term};
use crate::features::smt::domain::{Model, SolverResult, UnknownCause};
use crate::features::smt::ports::{DecisionProcedure, QueryLimits};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use z3::ast::{Ast, Bool, BV};
use z3::{Config, Context, SatResult, Solver};

enum Z3Term<'ctx> {
    Bool(Bool<'ctx>),
    Bv(BV<'ctx>),
}

struct Translator<'ctx> {
    ctx: &'ctx Context,
    symbols: BTreeMap<SsaSymbol, BV<'ctx>>,
}

impl<'ctx> Translator<'ctx> {
    fn boolean(&mut self, term: &Term) -> Result<Bool<'ctx>, UnknownCause> {
        match self.translate(term)? {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::Bv(_) => Err(UnknownCause::Unsupported(format!(
                "bit-vector term used as formula: {}",
                term
            ))),
        }
    }

    fn bits(&mut self, term: &Term) -> Result<BV<'ctx>, UnknownCause> {
        match self.translate(term)? {
            Z3Term::Bv(b) => Ok(b),
            Z3Term::Bool(_) => Err(UnknownCause::Unsupported(format!(
                "formula used as bit-vector: {}",
                term
            ))),
        }
    }

    fn translate(&mut self, term: &Term) -> Result<Z3Term<'ctx>, UnknownCause> {
        let ctx = self.ctx;
        Ok(match term {
            Term::Bool(b) => Z3Term::Bool(Bool::from_bool(ctx, *b)),
            Term::Const { value, width } => Z3Term::Bv(BV::from_u64(ctx, *value, *width)),
            Term::Symbol { name, index, width } => {
                let key = SsaSymbol::new(name.clone(), *index);
                let bv = self
                    .symbols
                    .entry(key.clone())
                    .or_insert_with(|| BV::new_const(ctx, key.to_string(), *width))
                    .clone();
                Z3Term::Bv(bv)
            }
            Term::Unary { op, arg } => {
                let a = self.bits(arg)?;
                Z3Term::Bv(match op {
                    BvUnaryOp::Neg => a.bvneg(),
                    BvUnaryOp::Not => a.bvnot(),
                })
            }
            Term::Binary { op, lhs, rhs } => {
                let a = self.bits(lhs)?;
                let b = self.bits(rhs)?;
                Z3Term::Bv(match op {
                    BvBinaryOp::Add => a.bvadd(&b),
                    BvBinaryOp::Mul => a.bvmul(&b),
                    BvBinaryOp::UDiv => a.bvudiv(&b),
                    BvBinaryOp::URem => a.bvurem(&b),
                    BvBinaryOp::SDiv => a.bvsdiv(&b),
                    BvBinaryOp::SRem => a.bvsrem(&b),
                    BvBinaryOp::Shl => a.bvshl(&b),
                    BvBinaryOp::LShr => a.bvlshr(&b),
                    BvBinaryOp::AShr => a.bvashr(&b),
                    BvBinaryOp::And => a.bvand(&b),
                    BvBinaryOp::Or => a.bvor(&b),
                    BvBinaryOp::Xor => a.bvxor(&b),
                })
            }
            Term::ZeroExtend { by, arg } => Z3Term::Bv(self.bits(arg)?.zero_ext(*by)),
            Term::SignExtend { by, arg } => Z3Term::Bv(self.bits(arg)?.sign_ext(*by)),
            Term::Extract { high, low, arg } => Z3Term::Bv(self.bits(arg)?.extract(*high, *low)),
            Term::Ite {
                cond,
                then,
                otherwise,
            } => {
                let c = self.boolean(cond)?;
                match (self.translate(then)?, self.translate(otherwise)?) {
                    (Z3Term::Bool(t), Z3Term::Bool(e)) => Z3Term::Bool(c.ite(&t, &e)),
                    (Z3Term::Bv(t), Z3Term::Bv(e)) => Z3Term::Bv(c.ite(&t, &e)),
                    _ => {
                        return Err(UnknownCause::Unsupported(format!(
                            "ite branches of different sorts: {}",
                            term
                        )))
                    }
                }
            }
            Term::Eq { lhs, rhs } => match (self.translate(lhs)?, self.translate(rhs)?) {
                (Z3Term::Bool(a), Z3Term::Bool(b)) => Z3Term::Bool(a._eq(&b)),
                (Z3Term::Bv(a), Z3Term::Bv(b)) => Z3Term::Bool(a._eq(&b)),
                _ => {
                    return Err(UnknownCause::Unsupported(format!(
                        "equality between different sorts: {}",
                        term
                    )))
                }
            },
            Term::Cmp { op, lhs, rhs } => {
                let a = self.bits(lhs)?;
                let b = self.bits(rhs)?;
                Z3Term::Bool(match op {
                    BvCmpOp::Ult => a.bvult(&b),
                    BvCmpOp::Ule => a.bvule(&b),
                    BvCmpOp::Slt => a.bvslt(&b),
                    BvCmpOp::Sle => a.bvsle(&b),
                })
            }
            Term::Not(arg) => Z3Term::Bool(self.boolean(arg)?.not()),
            Term::And(terms) | Term::Or(terms) => {
                let parts = terms
                    .iter()
                    .map(|t| self.boolean(t))
                    .collect::<Result<Vec<_>, _>>()?;
                let refs: Vec<&Bool<'ctx>> = parts.iter().collect();
                Z3Term::Bool(if matches!(term, Term::And(_)) {
                    Bool::and(ctx, &refs)
                } else {
                    Bool::or(ctx, &refs)
                })
            }
        })
    }
}

/// Z3-backed decision procedure
#[derive(Debug, Default, Clone, Copy)]
pub struct Z3Backend;

impl Z3Backend {
    pub fn new() -> Self {
        Self
    }
}

impl DecisionProcedure for Z3Backend {
    fn name(&self) -> &'static str {
        "z3"
    }

    fn check(&self, conjuncts: &[Arc<Term>], limits: &QueryLimits) -> SolverResult {
        let mut cfg = Config::new();
        if let Some(timeout) = limits.timeout {
            cfg.set_timeout_msec(timeout.as_millis() as u64);
        }
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        let mut translator = Translator {
            ctx: &ctx,
            symbols: BTreeMap::new(),
        };

        let mut selectors = Vec::with_capacity(conjuncts.len());
        let mut by_name = HashMap::with_capacity(conjuncts.len());
        for (i, conjunct) in conjuncts.iter().enumerate() {
            let root = match translator.boolean(conjunct) {
                Ok(b) => b,
                Err(cause) => return SolverResult::Unknown(cause),
            };
            let name = format!("__sel_{}", i);
            let selector = Bool::new_const(&ctx, name.clone());
            solver.assert(&selector.implies(&root));
            by_name.insert(name, i);
            selectors.push(selector);
        }

        match solver.check_assumptions(&selectors) {
            SatResult::Sat => {
                let mut model = Model::new();
                if let Some(z3_model) = solver.get_model() {
                    for (symbol, bv) in &translator.symbols {
                        let value = z3_model.eval(bv, true).and_then(|v| v.as_u64());
                        model.insert(symbol.clone(), value.unwrap_or(0), bv.get_size());
                    }
                }
                SolverResult::Sat(model)
            }
            SatResult::Unsat => {
                let mut core: Vec<usize> = solver
                    .get_unsat_core()
                    .iter()
                    .filter_map(|lit| by_name.get(&lit.to_string()).copied())
                    .collect();
                core.sort_unstable();
                if core.is_empty() {
                    core = (0..conjuncts.len()).collect();
                }
                SolverResult::Unsat(core)
            }
            SatResult::Unknown => SolverResult::Unknown(
                solver
                    .get_reason_unknown()
                    .map(UnknownCause::Backend)
                    .unwrap_or(UnknownCause::Timeout),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z3_agrees_on_overflow() {
        let x = Term::symbol(&SsaSymbol::new("x", 1), 32);
        let terms = vec![
            Arc::new(Term::cmp(BvCmpOp::Slt, Term::bv(0, 32), x.clone())),
            Arc::new(Term::cmp(
                BvCmpOp::Slt,
                Term::binary(BvBinaryOp::Add, x, Term::bv(1, 32)),
                Term::bv(0, 32),
            )),
        ];
        match Z3Backend.check(&terms, &QueryLimits::UNLIMITED) {
            SolverResult::Sat(model) => assert_eq!(model.get("x", 1), Some(0x7FFF_FFFF)),
            other => panic!("expected sat, got {:?}", other),
        }
    }
}

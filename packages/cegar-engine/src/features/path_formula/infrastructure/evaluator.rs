//! Concrete evaluation of terms under a symbol assignment
//!
//! Used to double-check solver models (witness validation, abstraction
//! shortcuts) and as the oracle for bit-blaster tests.

use crate::features::path_formula::domain::{BvBinaryOp, BvCmpOp, BvUnaryOp, Term};
use crate::shared::bitvec;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Bv { value: u64, width: u32 },
}

impl Value {
    pub fn as_bool(self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(b),
            Value::Bv { .. } => Err(EvalError::SortMismatch("expected boolean".into())),
        }
    }

    pub fn as_bv(self) -> Result<(u64, u32), EvalError> {
        match self {
            Value::Bv { value, width } => Ok((value, width)),
            Value::Bool(_) => Err(EvalError::SortMismatch("expected bit-vector".into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("symbol {0} has no value")]
    Unbound(String),
    #[error("sort mismatch: {0}")]
    SortMismatch(String),
}

/// Evaluate `term`; `env(name, index)` supplies symbol values
pub fn evaluate<F>(term: &Term, env: &F) -> Result<Value, EvalError>
where
    F: Fn(&str, u32) -> Option<u64>,
{
    let value = match term {
        Term::Bool(b) => Value::Bool(*b),
        Term::Const { value, width } => Value::Bv {
            value: *value,
            width: *width,
        },
        Term::Symbol { name, index, width } => {
            let value = env(name, *index).ok_or_else(|| unbound(name, *index))?;
            Value::Bv {
                value: bitvec::truncate(value, *width),
                width: *width,
            }
        }
        Term::Unary { op, arg } => {
            let (v, w) = evaluate(arg, env)?.as_bv()?;
            let value = match op {
                BvUnaryOp::Neg => bitvec::neg(v, w),
                BvUnaryOp::Not => bitvec::truncate(!v, w),
            };
            Value::Bv { value, width: w }
        }
        Term::Binary { op, lhs, rhs } => {
            let (a, w) = evaluate(lhs, env)?.as_bv()?;
            let (b, wb) = evaluate(rhs, env)?.as_bv()?;
            if w != wb {
                return Err(EvalError::SortMismatch(format!("{} vs {} bits", w, wb)));
            }
            let value = match op {
                BvBinaryOp::Add => bitvec::add(a, b, w),
                BvBinaryOp::Mul => bitvec::mul(a, b, w),
                BvBinaryOp::UDiv => bitvec::udiv(a, b, w),
                BvBinaryOp::URem => bitvec::urem(a, b, w),
                BvBinaryOp::SDiv => bitvec::sdiv(a, b, w),
                BvBinaryOp::SRem => bitvec::srem(a, b, w),
                BvBinaryOp::Shl => bitvec::shl(a, b, w),
                BvBinaryOp::LShr => bitvec::lshr(a, b, w),
                BvBinaryOp::AShr => bitvec::ashr(a, b, w),
                BvBinaryOp::And => a & b,
                BvBinaryOp::Or => a | b,
                BvBinaryOp::Xor => a ^ b,
            };
            Value::Bv { value, width: w }
        }
        Term::ZeroExtend { by, arg } => {
            let (v, w) = evaluate(arg, env)?.as_bv()?;
            Value::Bv {
                value: v,
                width: w + by,
            }
        }
        Term::SignExtend { by, arg } => {
            let (v, w) = evaluate(arg, env)?.as_bv()?;
            Value::Bv {
                value: bitvec::resize(v, w, w + by, true),
                width: w + by,
            }
        }
        Term::Extract { high, low, arg } => {
            let (v, _) = evaluate(arg, env)?.as_bv()?;
            let width = high - low + 1;
            Value::Bv {
                value: bitvec::truncate(v >> low, width),
                width,
            }
        }
        Term::Ite {
            cond,
            then,
            otherwise,
        } => {
            if evaluate(cond, env)?.as_bool()? {
                evaluate(then, env)?
            } else {
                evaluate(otherwise, env)?
            }
        }
        Term::Eq { lhs, rhs } => Value::Bool(evaluate(lhs, env)? == evaluate(rhs, env)?),
        Term::Cmp { op, lhs, rhs } => {
            let (a, w) = evaluate(lhs, env)?.as_bv()?;
            let (b, _) = evaluate(rhs, env)?.as_bv()?;
            Value::Bool(match op {
                BvCmpOp::Ult => bitvec::ult(a, b, w),
                BvCmpOp::Ule => !bitvec::ult(b, a, w),
                BvCmpOp::Slt => bitvec::slt(a, b, w),
                BvCmpOp::Sle => !bitvec::slt(b, a, w),
            })
        }
        Term::Not(arg) => Value::Bool(!evaluate(arg, env)?.as_bool()?),
        Term::And(terms) => {
            for t in terms {
                if !evaluate(t, env)?.as_bool()? {
                    return Ok(Value::Bool(false));
                }
            }
            Value::Bool(true)
        }
        Term::Or(terms) => {
            for t in terms {
                if evaluate(t, env)?.as_bool()? {
                    return Ok(Value::Bool(true));
                }
            }
            Value::Bool(false)
        }
    };
    Ok(value)
}

fn unbound(name: &str, index: u32) -> EvalError {
    EvalError::Unbound(format!("{}@{}", name, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::path_formula::domain::SsaSymbol;

    fn env(name: &str, _index: u32) -> Option<u64> {
        match name {
            "x" => Some(0xFFFF_FFFF),
            "y" => Some(2),
            _ => None,
        }
    }

    fn sym(name: &str) -> Term {
        Term::symbol(&SsaSymbol::new(name, 1), 32)
    }

    #[test]
    fn test_signed_and_unsigned_comparison_differ() {
        let slt = Term::cmp(BvCmpOp::Slt, sym("x"), sym("y"));
        let ult = Term::cmp(BvCmpOp::Ult, sym("x"), sym("y"));
        assert_eq!(evaluate(&slt, &env).unwrap(), Value::Bool(true));
        assert_eq!(evaluate(&ult, &env).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_arithmetic_wraps() {
        let sum = Term::binary(BvBinaryOp::Add, sym("x"), sym("y"));
        assert_eq!(evaluate(&sum, &env).unwrap(), Value::Bv { value: 1, width: 32 });
        let ext = Term::sign_extend(32, sym("x"));
        assert_eq!(evaluate(&ext, &env).unwrap(), Value::Bv { value: u64::MAX, width: 64 });
    }

    #[test]
    fn test_unbound_symbol() {
        assert_eq!(
            evaluate(&sym("z"), &env).unwrap_err(),
            EvalError::Unbound("z@1".into())
        );
    }
}

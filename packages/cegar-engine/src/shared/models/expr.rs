//! Typed C expressions
//!
//! Expressions are produced by the front end already typed: every variable
//! reference carries its declared type and its function-qualified name
//! (`main::x`, or a bare name for globals).

use super::types::CType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    BitNot,
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }
}

/// Side-effect free C expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// Integer literal; `value` is reduced to `ty` when encoded
    Const { value: i64, ty: CType },
    Var { name: String, ty: CType },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Cast { ty: CType, operand: Box<Expr> },
    /// Unconstrained input (`__VERIFIER_nondet_*()`)
    Nondet { ty: CType },
}

impl Expr {
    // ═══════════════════════════════════════════════════════════════════
    // Builders
    // ═══════════════════════════════════════════════════════════════════

    pub fn constant(value: i64, ty: CType) -> Self {
        Expr::Const { value, ty }
    }

    pub fn int(value: i64) -> Self {
        Expr::constant(value, CType::INT)
    }

    pub fn uint(value: i64) -> Self {
        Expr::constant(value, CType::UINT)
    }

    pub fn var(name: impl Into<String>, ty: CType) -> Self {
        Expr::Var {
            name: name.into(),
            ty,
        }
    }

    pub fn nondet(ty: CType) -> Self {
        Expr::Nondet { ty }
    }

    pub fn cast(ty: CType, operand: Expr) -> Self {
        Expr::Cast {
            ty,
            operand: Box::new(operand),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Add, lhs, rhs)
    }
    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Sub, lhs, rhs)
    }
    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Mul, lhs, rhs)
    }
    pub fn div(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Div, lhs, rhs)
    }
    pub fn rem(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Rem, lhs, rhs)
    }
    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Eq, lhs, rhs)
    }
    pub fn ne(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Ne, lhs, rhs)
    }
    pub fn lt(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Lt, lhs, rhs)
    }
    pub fn le(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Le, lhs, rhs)
    }
    pub fn gt(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Gt, lhs, rhs)
    }
    pub fn ge(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Ge, lhs, rhs)
    }
    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::LogicalAnd, lhs, rhs)
    }
    pub fn or(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::LogicalOr, lhs, rhs)
    }
    pub fn not(operand: Expr) -> Self {
        Expr::unary(UnaryOp::LogicalNot, operand)
    }
    pub fn neg(operand: Expr) -> Self {
        Expr::unary(UnaryOp::Neg, operand)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════

    /// C type of the expression value
    pub fn ty(&self) -> CType {
        match self {
            Expr::Const { ty, .. } | Expr::Var { ty, .. } | Expr::Nondet { ty } => *ty,
            Expr::Cast { ty, .. } => *ty,
            Expr::Unary { op, operand } => match op {
                UnaryOp::LogicalNot => CType::INT,
                UnaryOp::Neg | UnaryOp::BitNot => operand.ty().promoted(),
            },
            Expr::Binary { op, lhs, rhs } => {
                if op.is_comparison() || op.is_logical() {
                    CType::INT
                } else if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
                    lhs.ty().promoted()
                } else {
                    CType::common(lhs.ty(), rhs.ty())
                }
            }
        }
    }

    /// True when the expression denotes a truth value (comparison or logic)
    pub fn is_boolean(&self) -> bool {
        match self {
            Expr::Unary {
                op: UnaryOp::LogicalNot,
                ..
            } => true,
            Expr::Binary { op, .. } => op.is_comparison() || op.is_logical(),
            _ => false,
        }
    }

    pub fn contains_nondet(&self) -> bool {
        match self {
            Expr::Nondet { .. } => true,
            Expr::Const { .. } | Expr::Var { .. } => false,
            Expr::Unary { operand, .. } | Expr::Cast { operand, .. } => operand.contains_nondet(),
            Expr::Binary { lhs, rhs, .. } => lhs.contains_nondet() || rhs.contains_nondet(),
        }
    }

    /// Referenced variables with their types
    pub fn variables(&self) -> BTreeMap<String, CType> {
        let mut out = BTreeMap::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut BTreeMap<String, CType>) {
        match self {
            Expr::Var { name, ty } => {
                out.insert(name.clone(), *ty);
            }
            Expr::Const { .. } | Expr::Nondet { .. } => {}
            Expr::Unary { operand, .. } | Expr::Cast { operand, .. } => {
                operand.collect_variables(out)
            }
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
        }
    }

    /// Integer literals occurring in the expression
    pub fn constants(&self) -> BTreeSet<i64> {
        let mut out = BTreeSet::new();
        self.collect_constants(&mut out);
        out
    }

    fn collect_constants(&self, out: &mut BTreeSet<i64>) {
        match self {
            Expr::Const { value, ty } => {
                let normalized = ty.interpret(ty.normalize(*value));
                if let Ok(v) = i64::try_from(normalized) {
                    out.insert(v);
                }
            }
            Expr::Var { .. } | Expr::Nondet { .. } => {}
            Expr::Unary { operand, .. } | Expr::Cast { operand, .. } => {
                operand.collect_constants(out)
            }
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_constants(out);
                rhs.collect_constants(out);
            }
        }
    }

    /// Relational atoms of a condition, with negations and `!=` normalised
    /// away. `x != 10 || !(y < 3)` yields `x == 10` and `y < 3`.
    pub fn atoms(&self) -> Vec<Expr> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms(&self, out: &mut Vec<Expr>) {
        match self {
            Expr::Unary {
                op: UnaryOp::LogicalNot,
                operand,
            } => operand.collect_atoms(out),
            Expr::Binary { op, lhs, rhs } if op.is_logical() => {
                lhs.collect_atoms(out);
                rhs.collect_atoms(out);
            }
            Expr::Binary {
                op: BinaryOp::Ne,
                lhs,
                rhs,
            } => push_unique(out, Expr::eq((**lhs).clone(), (**rhs).clone())),
            Expr::Binary { op, .. } if op.is_comparison() => push_unique(out, self.clone()),
            Expr::Const { .. } | Expr::Nondet { .. } => {}
            other => {
                let zero = Expr::constant(0, other.ty());
                push_unique(out, Expr::eq(other.clone(), zero));
            }
        }
    }
}

fn push_unique(out: &mut Vec<Expr>, atom: Expr) {
    if !out.contains(&atom) {
        out.push(atom);
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const { value, ty } => write!(f, "{}", ty.interpret(ty.normalize(*value))),
            Expr::Var { name, .. } => f.write_str(name),
            Expr::Nondet { ty } => write!(f, "__VERIFIER_nondet_{}()", ty.to_string().replace(' ', "_")),
            Expr::Cast { ty, operand } => {
                write!(f, "({}) ", ty)?;
                fmt_operand(operand, f)
            }
            Expr::Unary { op, operand } => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::BitNot => "~",
                    UnaryOp::LogicalNot => "!",
                };
                f.write_str(symbol)?;
                fmt_operand(operand, f)
            }
            Expr::Binary { op, lhs, rhs } => {
                fmt_operand(lhs, f)?;
                write!(f, " {} ", op.symbol())?;
                fmt_operand(rhs, f)
            }
        }
    }
}

fn fmt_operand(expr: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match expr {
        Expr::Binary { .. } | Expr::Cast { .. } => write!(f, "({})", expr),
        _ => write!(f, "{}", expr),
    }
}

//! Quantifier-free bit-vector terms (`QF_BV`)
//!
//! Terms are the solver-facing language: program expressions are encoded
//! into terms over SSA-indexed symbols. Printing uses a compact
//! width-annotated prefix form, e.g. `(bvadd_32 main::b@2 (bvneg_32 main::c@2))`.

use super::ssa::SsaSymbol;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BvUnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BvBinaryOp {
    Add,
    Mul,
    UDiv,
    URem,
    SDiv,
    SRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
}

impl BvBinaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            BvBinaryOp::Add => "bvadd",
            BvBinaryOp::Mul => "bvmul",
            BvBinaryOp::UDiv => "bvudiv",
            BvBinaryOp::URem => "bvurem",
            BvBinaryOp::SDiv => "bvsdiv",
            BvBinaryOp::SRem => "bvsrem",
            BvBinaryOp::Shl => "bvshl",
            BvBinaryOp::LShr => "bvlshr",
            BvBinaryOp::AShr => "bvashr",
            BvBinaryOp::And => "bvand",
            BvBinaryOp::Or => "bvor",
            BvBinaryOp::Xor => "bvxor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BvCmpOp {
    Ult,
    Ule,
    Slt,
    Sle,
}

impl BvCmpOp {
    pub fn name(&self) -> &'static str {
        match self {
            BvCmpOp::Ult => "bvult",
            BvCmpOp::Ule => "bvule",
            BvCmpOp::Slt => "bvslt",
            BvCmpOp::Sle => "bvsle",
        }
    }
}

/// Sort of a term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    Bool,
    BitVec(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Bool(bool),
    Const {
        value: u64,
        width: u32,
    },
    Symbol {
        name: String,
        index: u32,
        width: u32,
    },
    Unary {
        op: BvUnaryOp,
        arg: Box<Term>,
    },
    Binary {
        op: BvBinaryOp,
        lhs: Box<Term>,
        rhs: Box<Term>,
    },
    ZeroExtend {
        by: u32,
        arg: Box<Term>,
    },
    SignExtend {
        by: u32,
        arg: Box<Term>,
    },
    Extract {
        high: u32,
        low: u32,
        arg: Box<Term>,
    },
    Ite {
        cond: Box<Term>,
        then: Box<Term>,
        otherwise: Box<Term>,
    },
    /// Equality of two terms of the same sort
    Eq {
        lhs: Box<Term>,
        rhs: Box<Term>,
    },
    Cmp {
        op: BvCmpOp,
        lhs: Box<Term>,
        rhs: Box<Term>,
    },
    Not(Box<Term>),
    And(Vec<Term>),
    Or(Vec<Term>),
}

impl Term {
    // ═══════════════════════════════════════════════════════════════════
    // Builders (with light boolean folding)
    // ═══════════════════════════════════════════════════════════════════

    pub fn bv(value: u64, width: u32) -> Self {
        Term::Const {
            value: crate::shared::bitvec::truncate(value, width),
            width,
        }
    }

    pub fn symbol(symbol: &SsaSymbol, width: u32) -> Self {
        Term::Symbol {
            name: symbol.name.clone(),
            index: symbol.index,
            width,
        }
    }

    pub fn unary(op: BvUnaryOp, arg: Term) -> Self {
        Term::Unary {
            op,
            arg: Box::new(arg),
        }
    }

    pub fn binary(op: BvBinaryOp, lhs: Term, rhs: Term) -> Self {
        Term::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn cmp(op: BvCmpOp, lhs: Term, rhs: Term) -> Self {
        Term::Cmp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn eq(lhs: Term, rhs: Term) -> Self {
        Term::Eq {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn ite(cond: Term, then: Term, otherwise: Term) -> Self {
        match cond {
            Term::Bool(true) => then,
            Term::Bool(false) => otherwise,
            cond => Term::Ite {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        }
    }

    pub fn zero_extend(by: u32, arg: Term) -> Self {
        if by == 0 {
            arg
        } else {
            Term::ZeroExtend {
                by,
                arg: Box::new(arg),
            }
        }
    }

    pub fn sign_extend(by: u32, arg: Term) -> Self {
        if by == 0 {
            arg
        } else {
            Term::SignExtend {
                by,
                arg: Box::new(arg),
            }
        }
    }

    pub fn extract(high: u32, low: u32, arg: Term) -> Self {
        Term::Extract {
            high,
            low,
            arg: Box::new(arg),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(arg: Term) -> Self {
        match arg {
            Term::Bool(b) => Term::Bool(!b),
            Term::Not(inner) => *inner,
            other => Term::Not(Box::new(other)),
        }
    }

    pub fn and(terms: impl IntoIterator<Item = Term>) -> Self {
        let mut out = Vec::new();
        for term in terms {
            match term {
                Term::Bool(true) => {}
                Term::Bool(false) => return Term::Bool(false),
                Term::And(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Term::Bool(true),
            1 => out.pop().unwrap_or(Term::Bool(true)),
            _ => Term::And(out),
        }
    }

    pub fn or(terms: impl IntoIterator<Item = Term>) -> Self {
        let mut out = Vec::new();
        for term in terms {
            match term {
                Term::Bool(false) => {}
                Term::Bool(true) => return Term::Bool(true),
                Term::Or(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Term::Bool(false),
            1 => out.pop().unwrap_or(Term::Bool(false)),
            _ => Term::Or(out),
        }
    }

    pub fn implies(lhs: Term, rhs: Term) -> Self {
        Term::or([Term::not(lhs), rhs])
    }

    // ═══════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════

    pub fn sort(&self) -> Sort {
        match self {
            Term::Bool(_)
            | Term::Eq { .. }
            | Term::Cmp { .. }
            | Term::Not(_)
            | Term::And(_)
            | Term::Or(_) => Sort::Bool,
            Term::Const { width, .. } | Term::Symbol { width, .. } => Sort::BitVec(*width),
            Term::Unary { arg, .. } => arg.sort(),
            Term::Binary { lhs, .. } => lhs.sort(),
            Term::ZeroExtend { by, arg } | Term::SignExtend { by, arg } => match arg.sort() {
                Sort::BitVec(w) => Sort::BitVec(w + by),
                Sort::Bool => Sort::Bool,
            },
            Term::Extract { high, low, .. } => Sort::BitVec(high - low + 1),
            Term::Ite { then, .. } => then.sort(),
        }
    }

    /// Bit width, or 0 for boolean terms
    pub fn width(&self) -> u32 {
        match self.sort() {
            Sort::BitVec(w) => w,
            Sort::Bool => 0,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Term::Bool(true))
    }

    /// SSA symbols occurring in the term with their widths
    pub fn symbols(&self) -> BTreeMap<SsaSymbol, u32> {
        let mut out = BTreeMap::new();
        self.collect_symbols(&mut out);
        out
    }

    pub fn collect_symbols(&self, out: &mut BTreeMap<SsaSymbol, u32>) {
        match self {
            Term::Bool(_) | Term::Const { .. } => {}
            Term::Symbol { name, index, width } => {
                out.insert(SsaSymbol::new(name.clone(), *index), *width);
            }
            Term::Unary { arg, .. }
            | Term::ZeroExtend { arg, .. }
            | Term::SignExtend { arg, .. }
            | Term::Extract { arg, .. }
            | Term::Not(arg) => arg.collect_symbols(out),
            Term::Binary { lhs, rhs, .. } | Term::Eq { lhs, rhs } | Term::Cmp { lhs, rhs, .. } => {
                lhs.collect_symbols(out);
                rhs.collect_symbols(out);
            }
            Term::Ite {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_symbols(out);
                then.collect_symbols(out);
                otherwise.collect_symbols(out);
            }
            Term::And(terms) | Term::Or(terms) => {
                for t in terms {
                    t.collect_symbols(out);
                }
            }
        }
    }

    /// Number of nodes in the term tree
    pub fn size(&self) -> usize {
        1 + match self {
            Term::Bool(_) | Term::Const { .. } | Term::Symbol { .. } => 0,
            Term::Unary { arg, .. }
            | Term::ZeroExtend { arg, .. }
            | Term::SignExtend { arg, .. }
            | Term::Extract { arg, .. }
            | Term::Not(arg) => arg.size(),
            Term::Binary { lhs, rhs, .. } | Term::Eq { lhs, rhs } | Term::Cmp { lhs, rhs, .. } => {
                lhs.size() + rhs.size()
            }
            Term::Ite {
                cond,
                then,
                otherwise,
            } => cond.size() + then.size() + otherwise.size(),
            Term::And(terms) | Term::Or(terms) => terms.iter().map(Term::size).sum(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Bool(b) => write!(f, "{}", b),
            Term::Const { value, width } => write!(f, "{}_{}", value, width),
            Term::Symbol { name, index, .. } => write!(f, "{}@{}", name, index),
            Term::Unary { op, arg } => {
                let name = match op {
                    BvUnaryOp::Neg => "bvneg",
                    BvUnaryOp::Not => "bvnot",
                };
                write!(f, "({}_{} {})", name, arg.width(), arg)
            }
            Term::Binary { op, lhs, rhs } => {
                write!(f, "({}_{} {} {})", op.name(), lhs.width(), lhs, rhs)
            }
            Term::ZeroExtend { by, arg } => write!(f, "(zero_extend_{} {})", by, arg),
            Term::SignExtend { by, arg } => write!(f, "(sign_extend_{} {})", by, arg),
            Term::Extract { high, low, arg } => write!(f, "(extract_{}_{} {})", high, low, arg),
            Term::Ite {
                cond,
                then,
                otherwise,
            } => write!(f, "(ite {} {} {})", cond, then, otherwise),
            Term::Eq { lhs, rhs } => write!(f, "(= {} {})", lhs, rhs),
            Term::Cmp { op, lhs, rhs } => {
                write!(f, "({}_{} {} {})", op.name(), lhs.width(), lhs, rhs)
            }
            Term::Not(arg) => write!(f, "(not {})", arg),
            Term::And(terms) | Term::Or(terms) => {
                f.write_str(if matches!(self, Term::And(_)) {
                    "(and"
                } else {
                    "(or"
                })?;
                for t in terms {
                    write!(f, " {}", t)?;
                }
                f.write_str(")")
            }
        }
    }
}

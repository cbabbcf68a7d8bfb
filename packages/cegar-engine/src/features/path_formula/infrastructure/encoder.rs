//! Edge-by-edge path formula encoding
//!
//! Translates CFA operations into bit-vector constraints over SSA symbols.
//!
//! ## Semantics
//! - Integers are fixed-width bit-vectors with wraparound; casts extend
//!   according to the source signedness or truncate.
//! - `a - b` is encoded as `bvadd(a, bvneg(b))`.
//! - Multiplication by a literal `2^k` (k >= 1) becomes `bvshl` by `k` when
//!   `shift_for_power_of_two` is enabled.
//! - Comparisons used as values become `ite(cond, 1, 0)`.
//! - Every definition allocates a fresh SSA index; reading a variable at
//!   index 0 is a [`ModelingError::UseBeforeDef`].

use crate::errors::ModelingError;
use crate::features::path_formula::domain::{
    BvBinaryOp, BvCmpOp, BvUnaryOp, EncodedPath, PathFormula, SsaMap, SsaSymbol, Term,
};
use crate::shared::models::{BinaryOp, CType, Cfa, CfaEdge, EdgeKind, Expr, UnaryOp, VarDecl};
use std::sync::Arc;

/// Name under which nondeterministic values inside expressions are havocked
pub const NONDET: &str = "__nondet";

/// Where variable reads resolve and whether fresh inputs may be created
trait SymbolScope {
    fn read(&self, name: &str) -> Option<SsaSymbol>;
    fn havoc(&mut self, ty: CType) -> Option<SsaSymbol>;
}

impl SymbolScope for SsaMap {
    fn read(&self, name: &str) -> Option<SsaSymbol> {
        self.current(name)
    }

    fn havoc(&mut self, ty: CType) -> Option<SsaSymbol> {
        Some(self.fresh(NONDET, ty))
    }
}

/// Read-only scope used to instantiate predicates
struct Frozen<'a>(&'a SsaMap);

impl SymbolScope for Frozen<'_> {
    fn read(&self, name: &str) -> Option<SsaSymbol> {
        self.0.current(name)
    }

    fn havoc(&mut self, _ty: CType) -> Option<SsaSymbol> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PathFormulaEncoder {
    shift_for_power_of_two: bool,
}

impl Default for PathFormulaEncoder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PathFormulaEncoder {
    pub fn new(shift_for_power_of_two: bool) -> Self {
        Self {
            shift_for_power_of_two,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Public entry points
    // ═══════════════════════════════════════════════════════════════════

    /// Extend `pf` by one step: the edge plus any automaton assumptions
    /// taken on it (evaluated after the edge)
    pub fn encode_step(
        &self,
        cfa: &Cfa,
        edge: &CfaEdge,
        assumptions: &[(Expr, bool)],
        pf: &PathFormula,
    ) -> Result<PathFormula, ModelingError> {
        let mut next = pf.clone();
        let conjunct = self.step_constraint(cfa, edge, assumptions, next.ssa_mut())?;
        if !conjunct.is_true() {
            next.push(Arc::new(conjunct));
        }
        Ok(next)
    }

    /// Encode a whole path from the all-undefined SSA map, keeping one
    /// conjunct per step
    pub fn encode_path<'a>(
        &self,
        cfa: &Cfa,
        steps: impl IntoIterator<Item = (&'a CfaEdge, &'a [(Expr, bool)])>,
    ) -> Result<EncodedPath, ModelingError> {
        let mut ssa = SsaMap::new();
        let mut out = EncodedPath::default();
        for (edge, assumptions) in steps {
            let conjunct = self.step_constraint(cfa, edge, assumptions, &mut ssa)?;
            out.conjuncts.push(Arc::new(conjunct));
            out.ssa_after.push(ssa.clone());
        }
        Ok(out)
    }

    pub fn step_constraint(
        &self,
        cfa: &Cfa,
        edge: &CfaEdge,
        assumptions: &[(Expr, bool)],
        ssa: &mut SsaMap,
    ) -> Result<Term, ModelingError> {
        let mut parts = vec![self.edge_constraint(cfa, edge, ssa)?];
        for (condition, truth) in assumptions {
            let context = edge.to_string();
            parts.push(self.assumption(condition, *truth, ssa, &context)?);
        }
        Ok(Term::and(parts))
    }

    /// Constraint contributed by a single CFA edge
    pub fn edge_constraint(
        &self,
        cfa: &Cfa,
        edge: &CfaEdge,
        ssa: &mut SsaMap,
    ) -> Result<Term, ModelingError> {
        let context = edge.to_string();
        match &edge.kind {
            EdgeKind::Blank { .. } => Ok(Term::Bool(true)),
            EdgeKind::Declaration {
                variable,
                initializer,
            } => self.define(variable, initializer.as_ref(), ssa, &context),
            EdgeKind::Assignment { target, value } => {
                self.define(target, Some(value), ssa, &context)
            }
            EdgeKind::Assumption { condition, truth } => {
                self.assumption(condition, *truth, ssa, &context)
            }
            EdgeKind::Call {
                callee, arguments, ..
            } => {
                let function = cfa
                    .function(callee)
                    .ok_or_else(|| ModelingError::UnknownFunction(callee.clone()))?;
                if arguments.len() != function.parameters.len() {
                    return Err(ModelingError::ArityMismatch {
                        callee: callee.clone(),
                        expected: function.parameters.len(),
                        found: arguments.len(),
                    });
                }
                // Arguments are read in the caller's SSA state before any
                // formal is rebound.
                let values = arguments
                    .iter()
                    .zip(&function.parameters)
                    .map(|(arg, param)| {
                        let value = self.bv(arg, ssa, &context)?;
                        Ok(convert(value, arg.ty(), param.ty))
                    })
                    .collect::<Result<Vec<_>, ModelingError>>()?;
                let bindings = function
                    .parameters
                    .iter()
                    .zip(values)
                    .map(|(param, value)| {
                        let symbol = ssa.fresh(&param.name, param.ty);
                        Term::eq(Term::symbol(&symbol, param.ty.width), value)
                    })
                    .collect::<Vec<_>>();
                Ok(Term::and(bindings))
            }
            EdgeKind::Return { callee, result } => {
                let Some(result) = result else {
                    return Ok(Term::Bool(true));
                };
                let retval = cfa
                    .function(callee)
                    .and_then(|f| f.retval())
                    .ok_or_else(|| ModelingError::UnknownFunction(callee.clone()))?;
                self.define(result, Some(&retval.as_expr()), ssa, &context)
            }
            EdgeKind::ReturnValue { function, value } => {
                let retval = cfa
                    .function(function)
                    .and_then(|f| f.retval())
                    .ok_or_else(|| ModelingError::UnknownFunction(function.clone()))?;
                self.define(&retval, Some(value), ssa, &context)
            }
            EdgeKind::ExternalCall {
                arguments, result, ..
            } => {
                for arg in arguments {
                    self.bv(arg, ssa, &context)?;
                }
                if let Some(result) = result {
                    ssa.fresh(&result.name, result.ty);
                }
                Ok(Term::Bool(true))
            }
        }
    }

    /// `condition` (or its negation) in the current SSA state
    pub fn assumption(
        &self,
        condition: &Expr,
        truth: bool,
        ssa: &mut SsaMap,
        context: &str,
    ) -> Result<Term, ModelingError> {
        let term = self.boolean(condition, ssa, context)?;
        Ok(if truth { term } else { Term::not(term) })
    }

    /// Instantiate a predicate at the given SSA map without modifying it
    pub fn instantiate(&self, predicate: &Expr, ssa: &SsaMap) -> Result<Term, ModelingError> {
        let context = format!("predicate {}", predicate);
        let mut scope = Frozen(ssa);
        self.boolean(predicate, &mut scope, &context)
    }

    /// Encode an expression as a bit-vector value under `ssa`
    pub fn instantiate_value(&self, expr: &Expr, ssa: &SsaMap) -> Result<Term, ModelingError> {
        let context = format!("expression {}", expr);
        let mut scope = Frozen(ssa);
        self.bv(expr, &mut scope, &context)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Expression encoding
    // ═══════════════════════════════════════════════════════════════════

    fn define(
        &self,
        target: &VarDecl,
        value: Option<&Expr>,
        ssa: &mut SsaMap,
        context: &str,
    ) -> Result<Term, ModelingError> {
        match value {
            None | Some(Expr::Nondet { .. }) => {
                ssa.fresh(&target.name, target.ty);
                Ok(Term::Bool(true))
            }
            Some(value) => {
                let encoded = convert(self.bv(value, ssa, context)?, value.ty(), target.ty);
                let symbol = ssa.fresh(&target.name, target.ty);
                Ok(Term::eq(Term::symbol(&symbol, target.ty.width), encoded))
            }
        }
    }

    fn bv<S: SymbolScope>(
        &self,
        expr: &Expr,
        scope: &mut S,
        context: &str,
    ) -> Result<Term, ModelingError> {
        match expr {
            Expr::Const { value, ty } => Ok(Term::bv(ty.normalize(*value), ty.width)),
            Expr::Var { name, ty } => {
                let symbol = scope
                    .read(name)
                    .ok_or_else(|| ModelingError::use_before_def(name.clone(), context))?;
                Ok(Term::symbol(&symbol, ty.width))
            }
            Expr::Nondet { ty } => {
                let symbol = scope.havoc(*ty).ok_or_else(|| {
                    ModelingError::Unsupported(format!("nondeterministic value in {}", context))
                })?;
                Ok(Term::symbol(&symbol, ty.width))
            }
            Expr::Cast { ty, operand } => {
                Ok(convert(self.bv(operand, scope, context)?, operand.ty(), *ty))
            }
            Expr::Unary { op, operand } => {
                let ty = expr.ty();
                match op {
                    UnaryOp::LogicalNot => {
                        let cond = Term::not(self.boolean(operand, scope, context)?);
                        Ok(bool_to_bv(cond, ty))
                    }
                    UnaryOp::Neg | UnaryOp::BitNot => {
                        let arg = convert(self.bv(operand, scope, context)?, operand.ty(), ty);
                        let op = if *op == UnaryOp::Neg {
                            BvUnaryOp::Neg
                        } else {
                            BvUnaryOp::Not
                        };
                        Ok(Term::unary(op, arg))
                    }
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                if op.is_comparison() || op.is_logical() {
                    let cond = self.boolean(expr, scope, context)?;
                    return Ok(bool_to_bv(cond, CType::INT));
                }
                let ty = expr.ty();
                let l = convert(self.bv(lhs, scope, context)?, lhs.ty(), ty);
                let r = convert(self.bv(rhs, scope, context)?, rhs.ty(), ty);
                let term = match op {
                    BinaryOp::Add => Term::binary(BvBinaryOp::Add, l, r),
                    BinaryOp::Sub => {
                        Term::binary(BvBinaryOp::Add, l, Term::unary(BvUnaryOp::Neg, r))
                    }
                    BinaryOp::Mul => self.multiply(lhs, rhs, l, r, ty),
                    BinaryOp::Div if ty.signed => Term::binary(BvBinaryOp::SDiv, l, r),
                    BinaryOp::Div => Term::binary(BvBinaryOp::UDiv, l, r),
                    BinaryOp::Rem if ty.signed => Term::binary(BvBinaryOp::SRem, l, r),
                    BinaryOp::Rem => Term::binary(BvBinaryOp::URem, l, r),
                    BinaryOp::Shl => Term::binary(BvBinaryOp::Shl, l, r),
                    BinaryOp::Shr if ty.signed => Term::binary(BvBinaryOp::AShr, l, r),
                    BinaryOp::Shr => Term::binary(BvBinaryOp::LShr, l, r),
                    BinaryOp::BitAnd => Term::binary(BvBinaryOp::And, l, r),
                    BinaryOp::BitOr => Term::binary(BvBinaryOp::Or, l, r),
                    BinaryOp::BitXor => Term::binary(BvBinaryOp::Xor, l, r),
                    _ => {
                        return Err(ModelingError::Unsupported(format!(
                            "operator {} in {}",
                            op.symbol(),
                            context
                        )))
                    }
                };
                Ok(term)
            }
        }
    }

    fn multiply(&self, lhs: &Expr, rhs: &Expr, l: Term, r: Term, ty: CType) -> Term {
        if self.shift_for_power_of_two {
            if let Some(k) = power_of_two_literal(rhs, ty) {
                return Term::binary(BvBinaryOp::Shl, l, Term::bv(u64::from(k), ty.width));
            }
            if let Some(k) = power_of_two_literal(lhs, ty) {
                return Term::binary(BvBinaryOp::Shl, r, Term::bv(u64::from(k), ty.width));
            }
        }
        Term::binary(BvBinaryOp::Mul, l, r)
    }

    fn boolean<S: SymbolScope>(
        &self,
        expr: &Expr,
        scope: &mut S,
        context: &str,
    ) -> Result<Term, ModelingError> {
        match expr {
            Expr::Const { value, ty } => Ok(Term::Bool(ty.normalize(*value) != 0)),
            Expr::Unary {
                op: UnaryOp::LogicalNot,
                operand,
            } => Ok(Term::not(self.boolean(operand, scope, context)?)),
            Expr::Binary { op, lhs, rhs } if op.is_logical() => {
                let l = self.boolean(lhs, scope, context)?;
                let r = self.boolean(rhs, scope, context)?;
                Ok(if *op == BinaryOp::LogicalAnd {
                    Term::and([l, r])
                } else {
                    Term::or([l, r])
                })
            }
            Expr::Binary { op, lhs, rhs } if op.is_comparison() => {
                let ty = CType::common(lhs.ty(), rhs.ty());
                let l = convert(self.bv(lhs, scope, context)?, lhs.ty(), ty);
                let r = convert(self.bv(rhs, scope, context)?, rhs.ty(), ty);
                let (lt, le) = if ty.signed {
                    (BvCmpOp::Slt, BvCmpOp::Sle)
                } else {
                    (BvCmpOp::Ult, BvCmpOp::Ule)
                };
                Ok(match op {
                    BinaryOp::Eq => Term::eq(l, r),
                    BinaryOp::Ne => Term::not(Term::eq(l, r)),
                    BinaryOp::Lt => Term::cmp(lt, l, r),
                    BinaryOp::Le => Term::cmp(le, l, r),
                    BinaryOp::Gt => Term::cmp(lt, r, l),
                    _ => Term::cmp(le, r, l),
                })
            }
            other => {
                let ty = other.ty();
                let value = self.bv(other, scope, context)?;
                Ok(Term::not(Term::eq(value, Term::bv(0, ty.width))))
            }
        }
    }
}

/// `k` when `expr` is the literal `2^k` with `k >= 1` under `ty`
fn power_of_two_literal(expr: &Expr, ty: CType) -> Option<u32> {
    match expr {
        Expr::Const { value, ty: lit_ty } => {
            let bits = ty.convert(lit_ty.normalize(*value), *lit_ty);
            (bits > 1 && bits.is_power_of_two()).then(|| bits.trailing_zeros())
        }
        _ => None,
    }
}

/// C conversion of a bit-vector term between integer types
pub fn convert(term: Term, from: CType, to: CType) -> Term {
    use std::cmp::Ordering;
    match to.width.cmp(&from.width) {
        Ordering::Equal => term,
        Ordering::Greater if from.signed => Term::sign_extend(to.width - from.width, term),
        Ordering::Greater => Term::zero_extend(to.width - from.width, term),
        Ordering::Less => match term {
            Term::Const { value, .. } => Term::bv(value, to.width),
            term => Term::extract(to.width - 1, 0, term),
        },
    }
}

fn bool_to_bv(cond: Term, ty: CType) -> Term {
    Term::ite(cond, Term::bv(1, ty.width), Term::bv(0, ty.width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::CfaBuilder;

    fn int(name: &str) -> Expr {
        Expr::var(name, CType::INT)
    }

    fn encode(expr: &Expr, ssa: &SsaMap) -> String {
        PathFormulaEncoder::default()
            .instantiate_value(expr, ssa)
            .unwrap()
            .to_string()
    }

    fn defined(names: &[&str]) -> SsaMap {
        let mut ssa = SsaMap::new();
        for name in names {
            ssa.fresh(name, CType::INT);
        }
        ssa
    }

    #[test]
    fn test_subtraction_is_addition_of_negation() {
        let mut ssa = defined(&["main::b", "main::c"]);
        ssa.fresh("main::b", CType::INT);
        ssa.fresh("main::c", CType::INT);
        let e = Expr::sub(int("main::b"), int("main::c"));
        assert_eq!(encode(&e, &ssa), "(bvadd_32 main::b@2 (bvneg_32 main::c@2))");
    }

    #[test]
    fn test_power_of_two_multiplication_becomes_shift() {
        let ssa = defined(&["main::a"]);
        assert_eq!(
            encode(&Expr::mul(int("main::a"), Expr::int(8)), &ssa),
            "(bvshl_32 main::a@1 3_32)"
        );
        assert_eq!(
            encode(&Expr::mul(Expr::int(2), int("main::a")), &ssa),
            "(bvshl_32 main::a@1 1_32)"
        );
        assert_eq!(
            encode(&Expr::mul(int("main::a"), Expr::int(6)), &ssa),
            "(bvmul_32 main::a@1 6_32)"
        );
        assert_eq!(
            encode(&Expr::mul(int("main::a"), Expr::int(1)), &ssa),
            "(bvmul_32 main::a@1 1_32)"
        );
        let plain = PathFormulaEncoder::new(false)
            .instantiate_value(&Expr::mul(int("main::a"), Expr::int(8)), &ssa)
            .unwrap();
        assert_eq!(plain.to_string(), "(bvmul_32 main::a@1 8_32)");
    }

    #[test]
    fn test_unsigned_remainder_and_comparison() {
        let mut ssa = SsaMap::new();
        ssa.fresh("f::day", CType::UINT);
        let e = Expr::rem(Expr::var("f::day", CType::UINT), Expr::int(7));
        assert_eq!(encode(&e, &ssa), "(bvurem_32 f::day@1 7_32)");
        let cmp = Expr::lt(Expr::var("f::day", CType::UINT), Expr::int(3));
        let t = PathFormulaEncoder::default().instantiate(&cmp, &ssa).unwrap();
        assert_eq!(t.to_string(), "(bvult_32 f::day@1 3_32)");
    }

    #[test]
    fn test_read_of_undefined_variable_is_modeling_error() {
        let err = PathFormulaEncoder::default()
            .instantiate(&Expr::lt(int("main::x"), Expr::int(1)), &SsaMap::new())
            .unwrap_err();
        assert!(matches!(err, ModelingError::UseBeforeDef { ref variable, .. } if variable == "main::x"));
    }

    #[test]
    fn test_char_operands_are_promoted() {
        let mut ssa = SsaMap::new();
        ssa.fresh("main::c", CType::CHAR);
        let e = Expr::add(Expr::var("main::c", CType::CHAR), Expr::int(1));
        assert_eq!(encode(&e, &ssa), "(bvadd_32 (sign_extend_24 main::c@1) 1_32)");
    }

    #[test]
    fn test_assignments_allocate_fresh_indices() {
        let mut cfa = CfaBuilder::new();
        cfa.declare_function("main", &[], None);
        let mut main = cfa.body("main");
        let n1 = main.declare(main.entry(), "x", CType::INT, Some(Expr::int(0)));
        let x = main.var("x");
        let n2 = main.assign(n1, "x", Expr::add(x, Expr::int(1)));
        main.ret(n2, None);
        let cfa = cfa.entry_function("main").build().unwrap();

        let encoder = PathFormulaEncoder::default();
        let mut pf = PathFormula::empty();
        let mut node = cfa.start();
        while let Some(edge) = cfa.outgoing(node).next() {
            pf = encoder.encode_step(&cfa, edge, &[], &pf).unwrap();
            node = edge.target;
        }
        assert_eq!(pf.ssa().index("main::x"), 2);
        let rendered: Vec<String> = pf.conjuncts().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["(= main::x@1 0_32)", "(= main::x@2 (bvadd_32 main::x@1 1_32))"]
        );
    }

    #[test]
    fn test_nondet_in_expression_havocs_fresh_symbol() {
        let mut ssa = defined(&["main::a"]);
        let e = Expr::add(int("main::a"), Expr::nondet(CType::INT));
        let encoder = PathFormulaEncoder::default();
        let t = encoder.bv(&e, &mut ssa, "test").unwrap();
        assert_eq!(t.to_string(), "(bvadd_32 main::a@1 __nondet@1)");
        assert!(encoder.instantiate_value(&e, &ssa).is_err());
    }
}

//! In-house `QF_BV` decision procedure
//!
//! Terms are bit-blasted into a Tseitin circuit and handed to the CDCL
//! core. Each conjunct is guarded by a selector literal that is passed as
//! an assumption, so an unsatisfiable answer comes with the subset of
//! conjuncts the solver actually needed.
//!
//! ```text
//! conjuncts ──blast──▶ circuit ──(sel_i → root_i)──▶ SAT(assume sel_*)
//!                                                      │
//!                  Sat(model) ◀──────── read symbol bits ┤
//!                  Unsat(core) ◀──── failed selectors ──┘
//! ```

pub mod circuit;
pub mod sat;

use crate::features::path_formula::domain::{BvBinaryOp, BvCmpOp, BvUnaryOp, SsaSymbol, Term};
use crate::features::smt::domain::{Model, SolverResult, UnknownCause};
use crate::features::smt::ports::{DecisionProcedure, QueryLimits};
use circuit::{Bits, Circuit, ShiftKind};
use rustc_hash::FxHashMap;
use sat::{Lit, SatLimits, SatOutcome, StopReason};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
enum Blasted {
    Bool(Lit),
    Bv(Bits),
}

/// Term to circuit translation for one query
struct Blaster {
    circuit: Circuit,
    symbols: BTreeMap<SsaSymbol, Bits>,
    /// Structural cache for repeated subterms
    cache: FxHashMap<Term, Lit>,
}

impl Blaster {
    fn new() -> Self {
        Self {
            circuit: Circuit::new(),
            symbols: BTreeMap::new(),
            cache: FxHashMap::default(),
        }
    }

    fn boolean(&mut self, term: &Term) -> Result<Lit, UnknownCause> {
        if let Some(lit) = self.cache.get(term) {
            return Ok(*lit);
        }
        let lit = match self.blast(term)? {
            Blasted::Bool(lit) => lit,
            Blasted::Bv(_) => {
                return Err(UnknownCause::Unsupported(format!(
                    "bit-vector term used as formula: {}",
                    term
                )))
            }
        };
        if matches!(term, Term::Eq { .. } | Term::Cmp { .. }) {
            self.cache.insert(term.clone(), lit);
        }
        Ok(lit)
    }

    fn bits(&mut self, term: &Term) -> Result<Bits, UnknownCause> {
        match self.blast(term)? {
            Blasted::Bv(bits) => Ok(bits),
            Blasted::Bool(_) => Err(UnknownCause::Unsupported(format!(
                "formula used as bit-vector: {}",
                term
            ))),
        }
    }

    fn same_width(lhs: &Bits, rhs: &Bits, term: &Term) -> Result<(), UnknownCause> {
        if lhs.len() == rhs.len() {
            Ok(())
        } else {
            Err(UnknownCause::Unsupported(format!(
                "width mismatch ({} vs {}) in {}",
                lhs.len(),
                rhs.len(),
                term
            )))
        }
    }

    fn blast(&mut self, term: &Term) -> Result<Blasted, UnknownCause> {
        Ok(match term {
            Term::Bool(b) => Blasted::Bool(self.circuit.constant(*b)),
            Term::Const { value, width } => Blasted::Bv(self.circuit.const_bits(*value, *width)),
            Term::Symbol { name, index, width } => {
                let key = SsaSymbol::new(name.clone(), *index);
                if let Some(bits) = self.symbols.get(&key) {
                    if bits.len() != *width as usize {
                        return Err(UnknownCause::Unsupported(format!(
                            "symbol {} used at widths {} and {}",
                            key,
                            bits.len(),
                            width
                        )));
                    }
                    return Ok(Blasted::Bv(bits.clone()));
                }
                let bits = self.circuit.fresh_bits(*width);
                self.symbols.insert(key, bits.clone());
                Blasted::Bv(bits)
            }
            Term::Unary { op, arg } => {
                let a = self.bits(arg)?;
                let c = &mut self.circuit;
                Blasted::Bv(match op {
                    BvUnaryOp::Neg => c.neg(&a),
                    BvUnaryOp::Not => c.not_bits(&a),
                })
            }
            Term::Binary { op, lhs, rhs } => {
                let a = self.bits(lhs)?;
                let b = self.bits(rhs)?;
                Self::same_width(&a, &b, term)?;
                let c = &mut self.circuit;
                Blasted::Bv(match op {
                    BvBinaryOp::Add => c.add(&a, &b),
                    BvBinaryOp::Mul => c.mul(&a, &b),
                    BvBinaryOp::UDiv => c.udivrem(&a, &b).0,
                    BvBinaryOp::URem => c.udivrem(&a, &b).1,
                    BvBinaryOp::SDiv => c.sdiv(&a, &b),
                    BvBinaryOp::SRem => c.srem(&a, &b),
                    BvBinaryOp::Shl => c.shift(&a, &b, ShiftKind::Left),
                    BvBinaryOp::LShr => c.shift(&a, &b, ShiftKind::LogicalRight),
                    BvBinaryOp::AShr => c.shift(&a, &b, ShiftKind::ArithmeticRight),
                    BvBinaryOp::And => c.bitwise(&a, &b, Circuit::and),
                    BvBinaryOp::Or => c.bitwise(&a, &b, Circuit::or),
                    BvBinaryOp::Xor => c.bitwise(&a, &b, Circuit::xor),
                })
            }
            Term::ZeroExtend { by, arg } => {
                let a = self.bits(arg)?;
                Blasted::Bv(self.circuit.zero_extend(&a, *by))
            }
            Term::SignExtend { by, arg } => {
                let a = self.bits(arg)?;
                Blasted::Bv(self.circuit.sign_extend(&a, *by))
            }
            Term::Extract { high, low, arg } => {
                let a = self.bits(arg)?;
                let (high, low) = (*high as usize, *low as usize);
                if low > high || high >= a.len() {
                    return Err(UnknownCause::Unsupported(format!(
                        "extract out of range: {}",
                        term
                    )));
                }
                Blasted::Bv(a[low..=high].to_vec())
            }
            Term::Ite {
                cond,
                then,
                otherwise,
            } => {
                let sel = self.boolean(cond)?;
                match (self.blast(then)?, self.blast(otherwise)?) {
                    (Blasted::Bool(t), Blasted::Bool(e)) => {
                        Blasted::Bool(self.circuit.mux(sel, t, e))
                    }
                    (Blasted::Bv(t), Blasted::Bv(e)) => {
                        Self::same_width(&t, &e, term)?;
                        Blasted::Bv(self.circuit.ite(sel, &t, &e))
                    }
                    _ => {
                        return Err(UnknownCause::Unsupported(format!(
                            "ite branches of different sorts: {}",
                            term
                        )))
                    }
                }
            }
            Term::Eq { lhs, rhs } => match (self.blast(lhs)?, self.blast(rhs)?) {
                (Blasted::Bool(a), Blasted::Bool(b)) => Blasted::Bool(self.circuit.xnor(a, b)),
                (Blasted::Bv(a), Blasted::Bv(b)) => {
                    Self::same_width(&a, &b, term)?;
                    Blasted::Bool(self.circuit.eq(&a, &b))
                }
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
                Self::same_width(&a, &b, term)?;
                let c = &mut self.circuit;
                Blasted::Bool(match op {
                    BvCmpOp::Ult => c.ult(&a, &b),
                    BvCmpOp::Ule => c.ule(&a, &b),
                    BvCmpOp::Slt => c.slt(&a, &b),
                    BvCmpOp::Sle => c.sle(&a, &b),
                })
            }
            Term::Not(arg) => Blasted::Bool(!self.boolean(arg)?),
            Term::And(terms) | Term::Or(terms) => {
                let lits = terms
                    .iter()
                    .map(|t| self.boolean(t))
                    .collect::<Result<Vec<_>, _>>()?;
                Blasted::Bool(if matches!(term, Term::And(_)) {
                    self.circuit.and_all(&lits)
                } else {
                    self.circuit.or_all(&lits)
                })
            }
        })
    }

    fn model(&self) -> Model {
        let mut model = Model::new();
        for (symbol, bits) in &self.symbols {
            let value = bits.iter().enumerate().fold(0u64, |acc, (i, lit)| {
                acc | (u64::from(self.circuit.sat().model_value(*lit)) << i)
            });
            model.insert(symbol.clone(), value, bits.len() as u32);
        }
        model
    }
}

/// Bit-blasting decision procedure (default backend)
#[derive(Debug, Default, Clone, Copy)]
pub struct BitBlastSolver;

impl BitBlastSolver {
    pub fn new() -> Self {
        Self
    }
}

impl DecisionProcedure for BitBlastSolver {
    fn name(&self) -> &'static str {
        "bitblast"
    }

    fn check(&self, conjuncts: &[Arc<Term>], limits: &QueryLimits) -> SolverResult {
        let mut blaster = Blaster::new();
        let mut selectors = Vec::with_capacity(conjuncts.len());
        for conjunct in conjuncts {
            let root = match blaster.boolean(conjunct) {
                Ok(lit) => lit,
                Err(cause) => return SolverResult::Unknown(cause),
            };
            let selector = blaster.circuit.fresh();
            blaster.circuit.add_clause(&[!selector, root]);
            selectors.push(selector);
        }

        let sat_limits = SatLimits {
            conflict_limit: limits.conflict_limit,
            deadline: limits.deadline(),
        };
        match blaster.circuit.sat_mut().solve(&selectors, sat_limits) {
            SatOutcome::Sat => SolverResult::Sat(blaster.model()),
            SatOutcome::Unsat { failed } => {
                let mut core: Vec<usize> = selectors
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| failed.contains(&!**s))
                    .map(|(i, _)| i)
                    .collect();
                if core.is_empty() {
                    core = (0..conjuncts.len()).collect();
                }
                SolverResult::Unsat(core)
            }
            SatOutcome::Unknown(StopReason::ConflictLimit(n)) => {
                SolverResult::Unknown(UnknownCause::ConflictLimit(n))
            }
            SatOutcome::Unknown(StopReason::Deadline) => {
                SolverResult::Unknown(UnknownCause::Timeout)
            }
        }
    }
}

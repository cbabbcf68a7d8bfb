//! Tseitin circuits over the SAT core
//!
//! Gates fold constants and are structurally hashed, so constant operands
//! (literals in the program, shift amounts, divisors) shrink the circuit
//! instead of producing dead clauses. Bit-vectors are `Vec<Lit>`, least
//! significant bit first.

use super::sat::{Lit, SatSolver};
use rustc_hash::FxHashMap;

pub type Bits = Vec<Lit>;

#[derive(Debug)]
pub struct Circuit {
    sat: SatSolver,
    true_lit: Lit,
    and_cache: FxHashMap<(Lit, Lit), Lit>,
    xor_cache: FxHashMap<(Lit, Lit), Lit>,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    pub fn new() -> Self {
        let mut sat = SatSolver::new();
        let true_lit = Lit::positive(sat.new_var());
        sat.add_clause(&[true_lit]);
        Self {
            sat,
            true_lit,
            and_cache: FxHashMap::default(),
            xor_cache: FxHashMap::default(),
        }
    }

    pub fn sat(&self) -> &SatSolver {
        &self.sat
    }

    pub fn sat_mut(&mut self) -> &mut SatSolver {
        &mut self.sat
    }

    // ═══════════════════════════════════════════════════════════════════
    // Single-bit gates
    // ═══════════════════════════════════════════════════════════════════

    pub fn constant(&self, value: bool) -> Lit {
        if value {
            self.true_lit
        } else {
            !self.true_lit
        }
    }

    /// Constant value of `lit`, if it is one
    pub fn as_constant(&self, lit: Lit) -> Option<bool> {
        if lit == self.true_lit {
            Some(true)
        } else if lit == !self.true_lit {
            Some(false)
        } else {
            None
        }
    }

    pub fn fresh(&mut self) -> Lit {
        Lit::positive(self.sat.new_var())
    }

    pub fn add_clause(&mut self, lits: &[Lit]) {
        self.sat.add_clause(lits);
    }

    /// Force `lit` to hold unconditionally
    pub fn assert(&mut self, lit: Lit) {
        if self.as_constant(lit) != Some(true) {
            self.sat.add_clause(&[lit]);
        }
    }

    pub fn and(&mut self, a: Lit, b: Lit) -> Lit {
        match (self.as_constant(a), self.as_constant(b)) {
            (Some(false), _) | (_, Some(false)) => return self.constant(false),
            (Some(true), _) => return b,
            (_, Some(true)) => return a,
            _ => {}
        }
        if a == b {
            return a;
        }
        if a == !b {
            return self.constant(false);
        }
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(out) = self.and_cache.get(&key) {
            return *out;
        }
        let out = self.fresh();
        self.sat.add_clause(&[!out, a]);
        self.sat.add_clause(&[!out, b]);
        self.sat.add_clause(&[out, !a, !b]);
        self.and_cache.insert(key, out);
        out
    }

    pub fn or(&mut self, a: Lit, b: Lit) -> Lit {
        !self.and(!a, !b)
    }

    pub fn xor(&mut self, a: Lit, b: Lit) -> Lit {
        match (self.as_constant(a), self.as_constant(b)) {
            (Some(x), Some(y)) => return self.constant(x != y),
            (Some(false), _) => return b,
            (Some(true), _) => return !b,
            (_, Some(false)) => return a,
            (_, Some(true)) => return !a,
            _ => {}
        }
        if a == b {
            return self.constant(false);
        }
        if a == !b {
            return self.constant(true);
        }
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(out) = self.xor_cache.get(&key) {
            return *out;
        }
        let out = self.fresh();
        self.sat.add_clause(&[!out, a, b]);
        self.sat.add_clause(&[!out, !a, !b]);
        self.sat.add_clause(&[out, !a, b]);
        self.sat.add_clause(&[out, a, !b]);
        self.xor_cache.insert(key, out);
        out
    }

    pub fn xnor(&mut self, a: Lit, b: Lit) -> Lit {
        !self.xor(a, b)
    }

    /// `sel ? then : otherwise`
    pub fn mux(&mut self, sel: Lit, then: Lit, otherwise: Lit) -> Lit {
        match self.as_constant(sel) {
            Some(true) => return then,
            Some(false) => return otherwise,
            None => {}
        }
        if then == otherwise {
            return then;
        }
        match (self.as_constant(then), self.as_constant(otherwise)) {
            (Some(true), Some(false)) => return sel,
            (Some(false), Some(true)) => return !sel,
            (Some(true), None) => return self.or(sel, otherwise),
            (Some(false), None) => return self.and(!sel, otherwise),
            (None, Some(true)) => return self.or(!sel, then),
            (None, Some(false)) => return self.and(sel, then),
            _ => {}
        }
        let out = self.fresh();
        self.sat.add_clause(&[!sel, !then, out]);
        self.sat.add_clause(&[!sel, then, !out]);
        self.sat.add_clause(&[sel, !otherwise, out]);
        self.sat.add_clause(&[sel, otherwise, !out]);
        out
    }

    pub fn and_all(&mut self, lits: &[Lit]) -> Lit {
        let mut acc = self.constant(true);
        for lit in lits {
            acc = self.and(acc, *lit);
        }
        acc
    }

    pub fn or_all(&mut self, lits: &[Lit]) -> Lit {
        let mut acc = self.constant(false);
        for lit in lits {
            acc = self.or(acc, *lit);
        }
        acc
    }

    // ═══════════════════════════════════════════════════════════════════
    // Bit-vector gadgets
    // ═══════════════════════════════════════════════════════════════════

    pub fn const_bits(&self, value: u64, width: u32) -> Bits {
        (0..width)
            .map(|i| self.constant(i < 64 && (value >> i) & 1 == 1))
            .collect()
    }

    pub fn fresh_bits(&mut self, width: u32) -> Bits {
        (0..width).map(|_| self.fresh()).collect()
    }

    pub fn not_bits(&self, a: &[Lit]) -> Bits {
        a.iter().map(|l| !*l).collect()
    }

    pub fn bitwise(&mut self, a: &[Lit], b: &[Lit], gate: fn(&mut Self, Lit, Lit) -> Lit) -> Bits {
        a.iter().zip(b).map(|(x, y)| gate(self, *x, *y)).collect()
    }

    /// Ripple-carry addition; returns the sum and the carry out
    pub fn add_with_carry(&mut self, a: &[Lit], b: &[Lit], carry_in: Lit) -> (Bits, Lit) {
        let mut carry = carry_in;
        let mut sum = Vec::with_capacity(a.len());
        for (x, y) in a.iter().zip(b) {
            let t = self.xor(*x, *y);
            sum.push(self.xor(t, carry));
            let both = self.and(*x, *y);
            let propagate = self.and(t, carry);
            carry = self.or(both, propagate);
        }
        (sum, carry)
    }

    pub fn add(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let zero = self.constant(false);
        self.add_with_carry(a, b, zero).0
    }

    pub fn neg(&mut self, a: &[Lit]) -> Bits {
        let inverted = self.not_bits(a);
        let zero = self.const_bits(0, a.len() as u32);
        let one = self.constant(true);
        self.add_with_carry(&inverted, &zero, one).0
    }

    /// Shift-and-add multiplier truncated to the operand width
    pub fn mul(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let width = a.len();
        let mut acc = self.const_bits(0, width as u32);
        for (i, bit) in b.iter().enumerate() {
            if self.as_constant(*bit) == Some(false) {
                continue;
            }
            let mut partial = Vec::with_capacity(width);
            for j in 0..width {
                if j < i {
                    partial.push(self.constant(false));
                } else {
                    let p = self.and(a[j - i], *bit);
                    partial.push(p);
                }
            }
            acc = self.add(&acc, &partial);
        }
        acc
    }

    pub fn eq(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let bits: Vec<Lit> = a
            .iter()
            .zip(b)
            .map(|(x, y)| self.xnor(*x, *y))
            .collect();
        self.and_all(&bits)
    }

    /// Unsigned `a < b` (no carry out of `a + !b + 1`)
    pub fn ult(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let inverted = self.not_bits(b);
        let one = self.constant(true);
        let (_, carry) = self.add_with_carry(a, &inverted, one);
        !carry
    }

    pub fn ule(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        !self.ult(b, a)
    }

    pub fn slt(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let (fa, fb) = (flip_sign(a), flip_sign(b));
        self.ult(&fa, &fb)
    }

    pub fn sle(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        !self.slt(b, a)
    }

    pub fn ite(&mut self, sel: Lit, then: &[Lit], otherwise: &[Lit]) -> Bits {
        then.iter()
            .zip(otherwise)
            .map(|(t, e)| self.mux(sel, *t, *e))
            .collect()
    }

    pub fn zero_extend(&self, a: &[Lit], by: u32) -> Bits {
        let mut out = a.to_vec();
        out.extend((0..by).map(|_| self.constant(false)));
        out
    }

    pub fn sign_extend(&self, a: &[Lit], by: u32) -> Bits {
        let mut out = a.to_vec();
        let sign = a.last().copied().unwrap_or_else(|| self.constant(false));
        out.extend((0..by).map(|_| sign));
        out
    }

    /// Barrel shifter; amounts at or above the width saturate
    pub fn shift(&mut self, a: &[Lit], amount: &[Lit], kind: ShiftKind) -> Bits {
        let width = a.len();
        if width == 0 {
            return Vec::new();
        }
        let fill = match kind {
            ShiftKind::Left | ShiftKind::LogicalRight => self.constant(false),
            ShiftKind::ArithmeticRight => a[width - 1],
        };
        let mut current = a.to_vec();
        let mut stage = 0usize;
        while (1usize << stage) < width && stage < amount.len() {
            let step = 1usize << stage;
            let shifted: Bits = (0..width)
                .map(|i| match kind {
                    ShiftKind::Left => {
                        if i >= step {
                            current[i - step]
                        } else {
                            fill
                        }
                    }
                    _ => {
                        if i + step < width {
                            current[i + step]
                        } else {
                            fill
                        }
                    }
                })
                .collect();
            current = self.ite(amount[stage], &shifted, &current);
            stage += 1;
        }
        let limit = self.const_bits(width as u64, amount.len() as u32);
        let too_far = !self.ult(amount, &limit);
        current.iter().map(|c| self.mux(too_far, fill, *c)).collect()
    }

    /// Unsigned division and remainder with SMT-LIB semantics for a zero
    /// divisor (`q = ~0`, `r = a`). Quotient and remainder are fresh bits
    /// tied to the operands by `a = q * b + r` (computed at double width,
    /// so it cannot overflow) and `r < b`.
    pub fn udivrem(&mut self, a: &[Lit], b: &[Lit]) -> (Bits, Bits) {
        let width = a.len() as u32;
        let q = self.fresh_bits(width);
        let r = self.fresh_bits(width);

        let qw = self.zero_extend(&q, width);
        let bw = self.zero_extend(b, width);
        let rw = self.zero_extend(&r, width);
        let aw = self.zero_extend(a, width);
        let product = self.mul(&qw, &bw);
        let sum = self.add(&product, &rw);
        let exact = self.eq(&sum, &aw);
        let bounded = self.ult(&r, b);
        let divides = self.and(exact, bounded);

        let zero = self.const_bits(0, width);
        let ones = self.const_bits(u64::MAX, width);
        let b_is_zero = self.eq(b, &zero);
        let q_ones = self.eq(&q, &ones);
        let r_is_a = self.eq(&r, a);
        let by_zero = self.and(q_ones, r_is_a);

        let definition = self.mux(b_is_zero, by_zero, divides);
        self.assert(definition);
        (q, r)
    }

    fn abs(&mut self, a: &[Lit]) -> (Bits, Lit) {
        let negative = a.last().copied().unwrap_or_else(|| self.constant(false));
        let negated = self.neg(a);
        (self.ite(negative, &negated, a), negative)
    }

    pub fn sdiv(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let (ua, na) = self.abs(a);
        let (ub, nb) = self.abs(b);
        let (q, _) = self.udivrem(&ua, &ub);
        let flip = self.xor(na, nb);
        let negated = self.neg(&q);
        self.ite(flip, &negated, &q)
    }

    pub fn srem(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let (ua, na) = self.abs(a);
        let (ub, _) = self.abs(b);
        let (_, r) = self.udivrem(&ua, &ub);
        let negated = self.neg(&r);
        self.ite(na, &negated, &r)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    Left,
    LogicalRight,
    ArithmeticRight,
}

fn flip_sign(a: &[Lit]) -> Bits {
    let mut out = a.to_vec();
    if let Some(msb) = out.last_mut() {
        *msb = !*msb;
    }
    out
}

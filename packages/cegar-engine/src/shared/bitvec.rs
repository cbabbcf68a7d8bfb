//! Fixed-width bit-vector arithmetic on `u64` carriers
//!
//! All operations follow SMT-LIB `QF_BV` semantics (two's complement,
//! wraparound, total division). Both the term evaluator and the concrete
//! executor go through these helpers so that the symbolic and concrete
//! readings of a program can never disagree on arithmetic.

/// Mask selecting the low `width` bits
#[inline]
pub fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[inline]
pub fn truncate(value: u64, width: u32) -> u64 {
    value & mask(width)
}

/// Interpret the low `width` bits as a two's complement number
#[inline]
pub fn to_signed(value: u64, width: u32) -> i64 {
    let value = truncate(value, width);
    if width == 0 {
        return 0;
    }
    if width >= 64 {
        return value as i64;
    }
    let sign_bit = 1u64 << (width - 1);
    if value & sign_bit != 0 {
        (value | !mask(width)) as i64
    } else {
        value as i64
    }
}

#[inline]
pub fn from_signed(value: i64, width: u32) -> u64 {
    truncate(value as u64, width)
}

#[inline]
pub fn is_negative(value: u64, width: u32) -> bool {
    width > 0 && (value >> (width - 1)) & 1 == 1
}

#[inline]
pub fn neg(value: u64, width: u32) -> u64 {
    truncate(value.wrapping_neg(), width)
}

#[inline]
pub fn add(a: u64, b: u64, width: u32) -> u64 {
    truncate(a.wrapping_add(b), width)
}

#[inline]
pub fn mul(a: u64, b: u64, width: u32) -> u64 {
    truncate(a.wrapping_mul(b), width)
}

/// `bvudiv`: division by zero yields all ones
pub fn udiv(a: u64, b: u64, width: u32) -> u64 {
    let (a, b) = (truncate(a, width), truncate(b, width));
    if b == 0 {
        mask(width)
    } else {
        a / b
    }
}

/// `bvurem`: remainder by zero yields the dividend
pub fn urem(a: u64, b: u64, width: u32) -> u64 {
    let (a, b) = (truncate(a, width), truncate(b, width));
    if b == 0 {
        a
    } else {
        a % b
    }
}

pub fn sdiv(a: u64, b: u64, width: u32) -> u64 {
    let (na, nb) = (is_negative(a, width), is_negative(b, width));
    let ua = if na { neg(a, width) } else { truncate(a, width) };
    let ub = if nb { neg(b, width) } else { truncate(b, width) };
    let q = udiv(ua, ub, width);
    if na != nb {
        neg(q, width)
    } else {
        q
    }
}

/// `bvsrem`: the sign of the result follows the dividend
pub fn srem(a: u64, b: u64, width: u32) -> u64 {
    let (na, nb) = (is_negative(a, width), is_negative(b, width));
    let ua = if na { neg(a, width) } else { truncate(a, width) };
    let ub = if nb { neg(b, width) } else { truncate(b, width) };
    let r = urem(ua, ub, width);
    if na {
        neg(r, width)
    } else {
        r
    }
}

pub fn shl(a: u64, amount: u64, width: u32) -> u64 {
    let amount = truncate(amount, width);
    if amount >= u64::from(width) {
        0
    } else {
        truncate(a << amount, width)
    }
}

pub fn lshr(a: u64, amount: u64, width: u32) -> u64 {
    let amount = truncate(amount, width);
    if amount >= u64::from(width) {
        0
    } else {
        truncate(a, width) >> amount
    }
}

pub fn ashr(a: u64, amount: u64, width: u32) -> u64 {
    let amount = truncate(amount, width);
    let negative = is_negative(a, width);
    if amount >= u64::from(width) {
        return if negative { mask(width) } else { 0 };
    }
    let shifted = truncate(a, width) >> amount;
    if negative && amount > 0 {
        let fill = mask(width) & !(mask(width) >> amount);
        shifted | fill
    } else {
        shifted
    }
}

pub fn ult(a: u64, b: u64, width: u32) -> bool {
    truncate(a, width) < truncate(b, width)
}

pub fn slt(a: u64, b: u64, width: u32) -> bool {
    to_signed(a, width) < to_signed(b, width)
}

/// Resize `value` from `from` bits to `to` bits, extending with the sign
/// bit when `signed` is set
pub fn resize(value: u64, from: u32, to: u32, signed: bool) -> u64 {
    if to <= from {
        truncate(value, to)
    } else if signed {
        from_signed(to_signed(value, from), to)
    } else {
        truncate(value, from)
    }
}

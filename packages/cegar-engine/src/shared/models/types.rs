//! C integer types
//!
//! The analysed language is C restricted to fixed-width integers, so a type
//! is fully described by its bit width and signedness.

use crate::shared::bitvec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-width C integer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CType {
    pub width: u32,
    pub signed: bool,
}

impl CType {
    pub const CHAR: CType = CType::new(8, true);
    pub const UCHAR: CType = CType::new(8, false);
    pub const SHORT: CType = CType::new(16, true);
    pub const USHORT: CType = CType::new(16, false);
    pub const INT: CType = CType::new(32, true);
    pub const UINT: CType = CType::new(32, false);
    pub const LONG: CType = CType::new(64, true);
    pub const ULONG: CType = CType::new(64, false);

    pub const fn new(width: u32, signed: bool) -> Self {
        Self { width, signed }
    }

    pub fn mask(&self) -> u64 {
        bitvec::mask(self.width)
    }

    /// Reduce an arbitrary literal to this type's bit pattern
    pub fn normalize(&self, value: i64) -> u64 {
        bitvec::from_signed(value, self.width)
    }

    /// Numeric value of a bit pattern under this type's signedness
    pub fn interpret(&self, bits: u64) -> i128 {
        if self.signed {
            i128::from(bitvec::to_signed(bits, self.width))
        } else {
            i128::from(bitvec::truncate(bits, self.width))
        }
    }

    /// Integer promotion: everything narrower than `int` becomes `int`
    pub fn promoted(&self) -> CType {
        if self.width < 32 {
            CType::INT
        } else {
            *self
        }
    }

    /// Usual arithmetic conversions for a binary operator
    pub fn common(lhs: CType, rhs: CType) -> CType {
        let (lhs, rhs) = (lhs.promoted(), rhs.promoted());
        match lhs.width.cmp(&rhs.width) {
            std::cmp::Ordering::Greater => lhs,
            std::cmp::Ordering::Less => rhs,
            std::cmp::Ordering::Equal => CType::new(lhs.width, lhs.signed && rhs.signed),
        }
    }

    /// Re-type a bit pattern of `from` into `self` (C cast semantics)
    pub fn convert(&self, bits: u64, from: CType) -> u64 {
        bitvec::resize(bits, from.width, self.width, from.signed)
    }
}

impl Default for CType {
    fn default() -> Self {
        CType::INT
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match (self.width, self.signed) {
            (8, true) => "char",
            (8, false) => "unsigned char",
            (16, true) => "short",
            (16, false) => "unsigned short",
            (32, true) => "int",
            (32, false) => "unsigned int",
            (64, true) => "long",
            (64, false) => "unsigned long",
            (w, true) => return write!(f, "int{}_t", w),
            (w, false) => return write!(f, "uint{}_t", w),
        };
        f.write_str(name)
    }
}

//! The machine's floating-point operand format.
//!
//! An operand word is laid out (MSB first) as:
//!
//! ```text
//!  0     1      2      3..9        9..48
//! flag  msign  esign  exponent(6)  mantissa(39, 13 octal digits)
//! ```
//!
//! The mantissa is an integer with the radix point at its right end and the
//! exponent is a power of eight, so integers are simply operands with a zero
//! exponent. All shifting is done an octal digit at a time.

use super::bitfield::{self, Word};
use serde::{Deserialize, Serialize};

/// Mask of the 39 mantissa bits (also the width of the extension register).
pub const MANTISSA_MASK: u64 = 0o7777_7777_7777_7;
/// Number of octal digits in a mantissa.
pub const MANTISSA_DIGITS: i32 = 13;
/// Largest exponent magnitude the 6-bit field holds.
pub const EXPONENT_MAX: i32 = 63;

const TOP_DIGIT_SHIFT: u32 = 36;
const TOP_DIGIT: u64 = 0o7 << TOP_DIGIT_SHIFT;
const ROUND_BIT: u64 = 0o4 << TOP_DIGIT_SHIFT;

/// Sign bit of the mantissa (bit 1).
pub const MANTISSA_SIGN_BIT: u32 = 1;
/// Sign bit of the exponent (bit 2).
pub const EXPONENT_SIGN_BIT: u32 = 2;

/// Which rounding and normalization rules the arithmetic unit follows.
///
/// Both rule sets change least-significant-bit results and neither is a
/// refinement of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingMode {
    /// Round only when the top bit of the shifted-out digit is set and the
    /// mantissa is not all ones.
    #[default]
    Legacy,
    /// Round on the extension's top bit; a mantissa carry-out is absorbed by
    /// shifting one more digit right.
    Emode,
}

/// Outcome of checking a result exponent against the 6-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExponentStatus {
    InRange,
    Overflow,
    Underflow,
}

/// A machine operand pulled apart for arithmetic.
///
/// `mantissa` and `extension` are both 39 bits wide; the extension holds the
/// digits shifted out the low end of the mantissa. `exponent` is an ordinary
/// signed integer here, not the sign-magnitude field of the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Number {
    pub mantissa: u64,
    pub extension: u64,
    pub exponent: i32,
    /// `true` when negative.
    pub sign: bool,
}

impl Number {
    /// The canonical zero.
    pub const fn zero() -> Self {
        Self { mantissa: 0, extension: 0, exponent: 0, sign: false }
    }

    /// Unpack an operand word. A zero mantissa yields the canonical zero.
    pub fn extract(word: Word) -> Self {
        let mantissa = word & MANTISSA_MASK;
        if mantissa == 0 {
            return Self::zero();
        }
        let magnitude = bitfield::isolate(word, 3, 6) as i32;
        let exponent = if bitfield::bit(word, EXPONENT_SIGN_BIT) { -magnitude } else { magnitude };
        Self {
            mantissa,
            extension: 0,
            exponent,
            sign: bitfield::bit(word, MANTISSA_SIGN_BIT),
        }
    }

    /// Pack back into an operand word with the flag bit clear.
    ///
    /// The exponent is truncated to its 6-bit magnitude; callers check range
    /// with [`Number::exponent_status`] first.
    pub fn compose(&self) -> Word {
        let mantissa = self.mantissa & MANTISSA_MASK;
        if mantissa == 0 {
            return 0;
        }
        let mut word = mantissa;
        word = bitfield::insert(word, 3, 6, self.exponent.unsigned_abs() as u64);
        word = bitfield::set_bit(word, EXPONENT_SIGN_BIT, self.exponent < 0);
        bitfield::set_bit(word, MANTISSA_SIGN_BIT, self.sign)
    }

    /// An integer operand (exponent zero). Values wider than 39 bits are
    /// truncated.
    pub fn from_i64(value: i64) -> Self {
        let magnitude = value.unsigned_abs() & MANTISSA_MASK;
        if magnitude == 0 {
            return Self::zero();
        }
        Self { mantissa: magnitude, extension: 0, exponent: 0, sign: value < 0 }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    /// True if the leading octal digit of the mantissa is nonzero.
    #[inline]
    pub fn is_normalized(&self) -> bool {
        self.mantissa & TOP_DIGIT != 0
    }

    /// Shift one octal digit right, moving the low mantissa digit into the
    /// top of the extension.
    pub fn shift_right_digit(&mut self) {
        self.extension = (self.extension >> 3) | ((self.mantissa & 0o7) << TOP_DIGIT_SHIFT);
        self.mantissa >>= 3;
        self.exponent += 1;
    }

    /// Shift one octal digit left, pulling the top extension digit into the
    /// bottom of the mantissa.
    pub fn shift_left_digit(&mut self) {
        self.mantissa = ((self.mantissa << 3) & MANTISSA_MASK) | (self.extension >> TOP_DIGIT_SHIFT);
        self.extension = (self.extension << 3) & MANTISSA_MASK;
        self.exponent -= 1;
    }

    /// Shift right by `count` digits.
    pub fn shift_right(&mut self, count: u32) {
        for _ in 0..count {
            self.shift_right_digit();
        }
    }

    /// Shift right until the exponent reaches `target`. If every digit would
    /// be lost the result is zero at that exponent.
    pub fn scale_to_exponent(&mut self, target: i32) {
        if target <= self.exponent {
            return;
        }
        let distance = target - self.exponent;
        if distance > 2 * MANTISSA_DIGITS {
            self.mantissa = 0;
            self.extension = 0;
            self.exponent = target;
            return;
        }
        self.shift_right(distance as u32);
    }

    /// Shift left until the leading digit is nonzero. Stops at the exponent
    /// floor so the exponent never leaves the representable range through
    /// normalization alone.
    pub fn normalize(&mut self) {
        if self.mantissa == 0 && self.extension == 0 {
            return;
        }
        while !self.is_normalized() && self.exponent > -EXPONENT_MAX {
            self.shift_left_digit();
        }
    }

    /// Shift left while the leading digit is zero and the exponent is above
    /// `floor`.
    pub fn normalize_toward(&mut self, floor: i32) {
        if self.mantissa == 0 {
            return;
        }
        while !self.is_normalized() && self.exponent > floor {
            self.shift_left_digit();
        }
    }

    /// Round the mantissa using the extension, then clear the extension.
    pub fn round(&mut self, mode: RoundingMode) {
        match mode {
            RoundingMode::Legacy => {
                if self.extension & ROUND_BIT != 0 && self.mantissa != MANTISSA_MASK {
                    self.mantissa += 1;
                }
            }
            RoundingMode::Emode => {
                if self.extension & ROUND_BIT != 0 {
                    self.mantissa += 1;
                    if self.mantissa > MANTISSA_MASK {
                        self.mantissa >>= 3;
                        self.exponent += 1;
                    }
                }
            }
        }
        self.extension = 0;
    }

    /// Check the exponent against the 6-bit field.
    pub fn exponent_status(&self) -> ExponentStatus {
        if self.mantissa == 0 {
            ExponentStatus::InRange
        } else if self.exponent > EXPONENT_MAX {
            ExponentStatus::Overflow
        } else if self.exponent < -EXPONENT_MAX {
            ExponentStatus::Underflow
        } else {
            ExponentStatus::InRange
        }
    }

    /// Fold an out-of-range exponent back into the 6-bit field, keeping its
    /// sign.
    pub fn wrap_exponent(&mut self) {
        let magnitude = (self.exponent.unsigned_abs() & EXPONENT_MAX as u32) as i32;
        self.exponent = if self.exponent < 0 { -magnitude } else { magnitude };
    }

    /// Convert to an integer by scaling the exponent to zero.
    ///
    /// When `round` is set the last digit shifted out rounds the result
    /// (digit 4 or above rounds up). Returns `None` if the integer does not
    /// fit in a 39-bit mantissa.
    pub fn integerize(&self, round: bool) -> Option<i64> {
        let mut n = *self;
        n.extension = 0;
        if n.is_zero() {
            return Some(0);
        }
        if n.exponent > 0 {
            for _ in 0..n.exponent {
                if n.mantissa & TOP_DIGIT != 0 {
                    return None;
                }
                n.mantissa <<= 3;
            }
        } else if n.exponent < 0 {
            let mut last = 0;
            for _ in 0..(-n.exponent).min(2 * MANTISSA_DIGITS) {
                last = n.mantissa & 0o7;
                n.mantissa >>= 3;
            }
            if round && last >= 4 {
                n.mantissa += 1;
                if n.mantissa > MANTISSA_MASK {
                    return None;
                }
            }
        }
        let magnitude = n.mantissa as i64;
        Some(if n.sign { -magnitude } else { magnitude })
    }
}

/// Bring two operands to a common exponent.
///
/// The operand with the larger exponent is first normalized downwards toward
/// the other's exponent; if that is not enough, the other is scaled right
/// (possibly to zero) to match.
pub fn align(a: &mut Number, b: &mut Number) {
    if a.is_zero() || b.is_zero() || a.exponent == b.exponent {
        return;
    }
    let (big, small) = if a.exponent > b.exponent { (a, b) } else { (b, a) };
    big.normalize_toward(small.exponent);
    small.scale_to_exponent(big.exponent);
}

//! Single-precision arithmetic.
//!
//! The free functions work on machine words and report faults in the
//! result; the `Processor` methods apply them to the top of stack and turn
//! faults into syllable-dependent interrupts. Every binary operator takes
//! its left operand from B and its right operand from A: subtraction is
//! `B - A`, division is `B / A`, and `compare(a, b)` orders B against A.

use crate::cpu::Processor;
use crate::word::number::{align, MANTISSA_MASK, MANTISSA_DIGITS};
use crate::word::{ExponentStatus, Number, RoundingMode, Word};
use std::cmp::Ordering;

/// Arithmetic conditions that interrupt the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithFault {
    ExponentUnderflow,
    ExponentOverflow,
    IntegerOverflow,
    DivideByZero,
}

impl ArithFault {
    /// Syllable-dependent interrupt code.
    pub fn code(self) -> u8 {
        match self {
            ArithFault::ExponentUnderflow => 0xA0,
            ArithFault::ExponentOverflow => 0xB0,
            ArithFault::IntegerOverflow => 0xC0,
            ArithFault::DivideByZero => 0xD0,
        }
    }
}

/// Result word and the fault raised producing it, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArithResult {
    pub word: Word,
    pub fault: Option<ArithFault>,
}

impl ArithResult {
    fn ok(word: Word) -> Self {
        Self { word, fault: None }
    }
}

/// Which quotient a divide develops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivideKind {
    Floating,
    Integer,
    Remainder,
}

/// Compare B against A: `Greater` when B > A.
///
/// Zero compares equal to zero whatever its sign or exponent bits.
pub fn compare(a: Word, b: Word) -> Ordering {
    let mut na = Number::extract(a);
    let mut nb = Number::extract(b);
    match (na.is_zero(), nb.is_zero()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return if nb.sign { Ordering::Less } else { Ordering::Greater },
        (false, true) => return if na.sign { Ordering::Greater } else { Ordering::Less },
        (false, false) => {}
    }
    if na.sign != nb.sign {
        return if nb.sign { Ordering::Less } else { Ordering::Greater };
    }
    align(&mut na, &mut nb);
    let magnitude = (nb.exponent, nb.mantissa, nb.extension).cmp(&(na.exponent, na.mantissa, na.extension));
    if nb.sign { magnitude.reverse() } else { magnitude }
}

/// Finish a result: round, then check the exponent range. An out-of-range
/// exponent is wrapped into the six-bit field.
fn finish(mut n: Number, mode: RoundingMode) -> ArithResult {
    n.round(mode);
    let fault = match n.exponent_status() {
        ExponentStatus::InRange => None,
        ExponentStatus::Overflow => Some(ArithFault::ExponentOverflow),
        ExponentStatus::Underflow => Some(ArithFault::ExponentUnderflow),
    };
    if fault.is_some() {
        n.wrap_exponent();
    }
    ArithResult { word: n.compose(), fault }
}

/// `B + A`, or `B - A` when `is_add` is false.
pub fn add(a: Word, b: Word, is_add: bool, mode: RoundingMode) -> ArithResult {
    let mut na = Number::extract(a);
    let mut nb = Number::extract(b);
    if !is_add && !na.is_zero() {
        na.sign = !na.sign;
    }
    if na.is_zero() {
        return ArithResult::ok(nb.compose());
    }
    if nb.is_zero() {
        return ArithResult::ok(na.compose());
    }

    align(&mut na, &mut nb);
    let mut n = Number { exponent: nb.exponent, ..Number::zero() };

    if na.sign == nb.sign {
        let mut extension = na.extension + nb.extension;
        let mut mantissa = na.mantissa + nb.mantissa;
        if extension > MANTISSA_MASK {
            extension &= MANTISSA_MASK;
            mantissa += 1;
        }
        n.mantissa = mantissa;
        n.extension = extension;
        n.sign = nb.sign;
        if n.mantissa > MANTISSA_MASK {
            n.shift_right_digit();
        }
    } else {
        let inverted = (na.mantissa, na.extension) > (nb.mantissa, nb.extension);
        let (big, small) = if inverted { (na, nb) } else { (nb, na) };
        let (extension, borrow) = if big.extension >= small.extension {
            (big.extension - small.extension, 0)
        } else {
            (big.extension + (MANTISSA_MASK + 1) - small.extension, 1)
        };
        n.mantissa = big.mantissa - small.mantissa - borrow;
        n.extension = extension;
        n.sign = if inverted { na.sign } else { nb.sign };
    }

    if n.mantissa == 0 && n.extension == 0 {
        return ArithResult::ok(0);
    }
    if mode == RoundingMode::Emode && n.extension != 0 {
        n.normalize();
    }
    finish(n, mode)
}

/// `B * A`.
pub fn multiply(a: Word, b: Word, mode: RoundingMode) -> ArithResult {
    let mut na = Number::extract(a);
    let mut nb = Number::extract(b);
    if na.is_zero() || nb.is_zero() {
        return ArithResult::ok(0);
    }
    let sign = na.sign != nb.sign;

    if na.exponent == 0 && nb.exponent == 0 {
        let product = na.mantissa as u128 * nb.mantissa as u128;
        if product <= MANTISSA_MASK as u128 {
            return ArithResult::ok(Number { mantissa: product as u64, extension: 0, exponent: 0, sign }.compose());
        }
        let mut n = split_product(product, MANTISSA_DIGITS, sign);
        n.normalize_toward(0);
        return finish(n, mode);
    }

    na.normalize();
    nb.normalize();
    let product = na.mantissa as u128 * nb.mantissa as u128;
    let mut n = split_product(product, na.exponent + nb.exponent + MANTISSA_DIGITS, sign);
    n.normalize_toward(i32::MIN);
    finish(n, mode)
}

/// A double-length product as mantissa and extension.
fn split_product(product: u128, exponent: i32, sign: bool) -> Number {
    Number {
        mantissa: (product >> 39) as u64,
        extension: (product as u64) & MANTISSA_MASK,
        exponent,
        sign,
    }
}

/// `B / A` as a floating quotient, an integer quotient, or the remainder.
///
/// Division by zero returns `DivideByZero` with the dividend unchanged.
pub fn divide(a: Word, b: Word, kind: DivideKind, mode: RoundingMode) -> ArithResult {
    let na = Number::extract(a);
    let nb = Number::extract(b);
    if na.is_zero() {
        return ArithResult { word: b, fault: Some(ArithFault::DivideByZero) };
    }
    if nb.is_zero() {
        return ArithResult::ok(0);
    }
    match kind {
        DivideKind::Floating => floating_quotient(na, nb, mode),
        DivideKind::Integer => integer_quotient(na, nb, mode),
        DivideKind::Remainder => remainder(na, nb, mode),
    }
}

fn floating_quotient(mut na: Number, mut nb: Number, mode: RoundingMode) -> ArithResult {
    na.normalize_toward(i32::MIN);
    nb.normalize_toward(i32::MIN);
    // Fourteen extra digits of dividend give at least thirteen quotient
    // digits and one rounding digit.
    let quotient = ((nb.mantissa as u128) << 42) / na.mantissa as u128;
    let mut n = Number {
        mantissa: 0,
        extension: 0,
        exponent: nb.exponent - na.exponent - 14,
        sign: na.sign != nb.sign,
    };
    let mut q = quotient;
    while q > MANTISSA_MASK as u128 {
        n.extension = (n.extension >> 3) | (((q & 0o7) as u64) << 36);
        q >>= 3;
        n.exponent += 1;
    }
    n.mantissa = q as u64;
    n.normalize_toward(i32::MIN);
    finish(n, mode)
}

/// Magnitudes of both operands scaled to their smaller exponent. `None`
/// when B's exponent is so much larger that the quotient overflows.
fn common_scale(na: &Number, nb: &Number) -> Option<(u128, u128)> {
    let e = na.exponent.min(nb.exponent);
    let scale = |n: &Number| -> Option<u128> {
        let digits = (n.exponent - e) as u32;
        if digits > 2 * MANTISSA_DIGITS as u32 {
            return None;
        }
        Some((n.mantissa as u128) << (3 * digits))
    };
    match (scale(na), scale(nb)) {
        (Some(a), Some(b)) => Some((a, b)),
        // A is vastly larger: the quotient is zero.
        (None, Some(b)) => Some((u128::MAX, b)),
        _ => None,
    }
}

fn integer_quotient(na: Number, nb: Number, mode: RoundingMode) -> ArithResult {
    let sign = na.sign != nb.sign;
    let quotient = match common_scale(&na, &nb) {
        Some((a, b)) => Some(b / a),
        None => None,
    };
    match quotient {
        Some(q) if q <= MANTISSA_MASK as u128 => {
            ArithResult::ok(Number { mantissa: q as u64, extension: 0, exponent: 0, sign }.compose())
        }
        _ => {
            let approx = floating_quotient(na, nb, mode);
            ArithResult { word: approx.word, fault: Some(ArithFault::IntegerOverflow) }
        }
    }
}

fn remainder(na: Number, nb: Number, mode: RoundingMode) -> ArithResult {
    let e = na.exponent.min(nb.exponent);
    let a_digits = (na.exponent - e) as u32;
    let b_digits = (nb.exponent - e) as u32;
    let rem = if a_digits > 2 * MANTISSA_DIGITS as u32 {
        // A is vastly larger: B is its own remainder.
        nb.mantissa as u128
    } else {
        let a = (na.mantissa as u128) << (3 * a_digits);
        // Scale B up one digit at a time, reducing modulo A as it goes.
        (0..b_digits).fold(nb.mantissa as u128 % a, |r, _| (r << 3) % a)
    };
    if rem == 0 {
        return ArithResult::ok(0);
    }
    // The remainder is no larger than one operand's mantissa, so it fits.
    let mut n = Number { mantissa: rem as u64, extension: 0, exponent: e, sign: nb.sign };
    match mode {
        RoundingMode::Legacy => n.normalize(),
        RoundingMode::Emode if n.exponent != 0 => n.normalize(),
        RoundingMode::Emode => {}
    }
    finish(n, mode)
}

/// Relational operators. Each leaves 1 in B when the relation of B to A
/// holds, else 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Geq,
    Gtr,
    Neq,
    Leq,
    Lss,
    Eql,
}

impl Relation {
    pub fn holds(self, order: Ordering) -> bool {
        match self {
            Relation::Geq => order != Ordering::Less,
            Relation::Gtr => order == Ordering::Greater,
            Relation::Neq => order != Ordering::Equal,
            Relation::Leq => order != Ordering::Greater,
            Relation::Lss => order == Ordering::Less,
            Relation::Eql => order == Ordering::Equal,
        }
    }
}

impl Processor {
    fn arith_result(&mut self, result: ArithResult) {
        self.regs.b = result.word;
        self.regs.brof = true;
        self.regs.arof = false;
        if let Some(fault) = result.fault {
            self.syllable_interrupt(fault.code());
        }
    }

    /// ADD / SUB.
    pub(crate) fn single_add(&mut self, is_add: bool) {
        self.adjust_ab_full();
        let r = add(self.regs.a, self.regs.b, is_add, self.rounding);
        self.arith_result(r);
    }

    /// MUL.
    pub(crate) fn single_multiply(&mut self) {
        self.adjust_ab_full();
        let r = multiply(self.regs.a, self.regs.b, self.rounding);
        self.arith_result(r);
    }

    /// DIV / IDV / RDV. Divide by zero leaves A and B as they were.
    pub(crate) fn single_divide(&mut self, kind: DivideKind) {
        self.adjust_ab_full();
        let r = divide(self.regs.a, self.regs.b, kind, self.rounding);
        if r.fault == Some(ArithFault::DivideByZero) {
            self.syllable_interrupt(ArithFault::DivideByZero.code());
            return;
        }
        self.arith_result(r);
    }

    /// GEQ, GTR, NEQ, LEQ, LSS, EQL.
    pub(crate) fn relational(&mut self, relation: Relation) {
        self.adjust_ab_full();
        let order = compare(self.regs.a, self.regs.b);
        self.regs.b = relation.holds(order) as Word;
        self.regs.arof = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::testing::processor;
    use proptest::prelude::*;

    fn int(v: i64) -> Word {
        Number::from_i64(v).compose()
    }

    fn float(mantissa: u64, exponent: i32, sign: bool) -> Word {
        Number { mantissa, extension: 0, exponent, sign }.compose()
    }

    const HALF: u64 = 0o4000_0000_0000_0;

    #[test]
    fn test_compare_equal_words() {
        assert_eq!(compare(int(42), int(42)), Ordering::Equal);
        assert_eq!(compare(float(0o1234, -3, true), float(0o1234, -3, true)), Ordering::Equal);
    }

    #[test]
    fn test_compare_larger_b_is_greater() {
        assert_eq!(compare(int(5), int(9)), Ordering::Greater);
        assert_eq!(compare(int(9), int(5)), Ordering::Less);
    }

    #[test]
    fn test_compare_signs_and_zero() {
        assert_eq!(compare(int(-3), int(2)), Ordering::Greater);
        assert_eq!(compare(int(-3), int(-2)), Ordering::Greater);
        assert_eq!(compare(int(1), 0), Ordering::Less);
        // Zero mantissa with stray sign and exponent bits is still zero.
        assert_eq!(compare(0o3700_0000_0000_0000, 0), Ordering::Equal);
    }

    #[test]
    fn test_compare_different_exponents() {
        // 0o100 vs 1 * 8^2
        assert_eq!(compare(int(0o100), float(1, 2, false)), Ordering::Equal);
        assert_eq!(compare(int(0o101), float(1, 2, false)), Ordering::Less);
    }

    #[test]
    fn test_add_integers() {
        assert_eq!(add(int(3), int(5), true, RoundingMode::Legacy).word, int(8));
        assert_eq!(add(int(3), int(5), false, RoundingMode::Legacy).word, int(2));
        assert_eq!(add(int(5), int(3), false, RoundingMode::Legacy).word, int(-2));
        assert_eq!(add(int(5), int(5), false, RoundingMode::Legacy).word, 0);
    }

    #[test]
    fn test_add_zero_shortcuts() {
        assert_eq!(add(0, int(7), true, RoundingMode::Legacy).word, int(7));
        assert_eq!(add(int(7), 0, false, RoundingMode::Legacy).word, int(-7));
    }

    #[test]
    fn test_add_carry_shifts_right() {
        let r = add(int(MANTISSA_MASK as i64), int(1), true, RoundingMode::Legacy);
        assert_eq!(r.word, float(0o1000_0000_0000_0, 1, false));
        assert_eq!(r.fault, None);
    }

    #[test]
    fn test_add_exponent_overflow_wraps() {
        let big = float(HALF, 63, false);
        let r = add(big, big, true, RoundingMode::Legacy);
        assert_eq!(r.fault, Some(ArithFault::ExponentOverflow));
        assert_eq!(Number::extract(r.word).exponent, 0);
    }

    #[test]
    fn test_emode_normalizes_only_with_extension() {
        // 0.5 + 1 at the fraction's scale.
        let r = add(float(HALF, -13, false), int(1), true, RoundingMode::Emode);
        let n = Number::extract(r.word);
        assert!(n.is_normalized());
        assert_eq!(compare(r.word, float(0o14, -1, false)), Ordering::Equal);
        // Integers stay integers.
        assert_eq!(add(int(2), int(3), true, RoundingMode::Emode).word, int(5));
    }

    #[test]
    fn test_multiply_two_by_three() {
        let r = multiply(int(2), int(3), RoundingMode::Legacy);
        assert_eq!(r.word, int(6));
        assert_eq!(Number::extract(r.word).exponent, 0);
        assert_eq!(r.fault, None);
    }

    #[test]
    fn test_multiply_signs_and_zero() {
        assert_eq!(multiply(int(-4), int(5), RoundingMode::Legacy).word, int(-20));
        assert_eq!(multiply(0, int(5), RoundingMode::Legacy).word, 0);
    }

    #[test]
    fn test_multiply_large_integers_scale() {
        let big = 1i64 << 30;
        let r = multiply(int(big), int(big), RoundingMode::Legacy);
        let n = Number::extract(r.word);
        assert!(n.exponent > 0);
        assert_eq!(compare(r.word, float(1 << 36, 8, false)), Ordering::Equal);
    }

    #[test]
    fn test_multiply_fractions() {
        // 0.5 * 0.5 = 0.25
        let half = float(HALF, -13, false);
        let r = multiply(half, half, RoundingMode::Legacy);
        assert_eq!(compare(r.word, float(0o2000_0000_0000_0, -13, false)), Ordering::Equal);
    }

    #[test]
    fn test_multiply_underflow() {
        let tiny = float(HALF, -63, false);
        let r = multiply(tiny, tiny, RoundingMode::Legacy);
        assert_eq!(r.fault, Some(ArithFault::ExponentUnderflow));
    }

    #[test]
    fn test_divide() {
        let r = divide(int(4), int(10), DivideKind::Floating, RoundingMode::Legacy);
        assert_eq!(compare(r.word, float(0o24, -1, false)), Ordering::Equal);
        let r = divide(int(3), int(-1), DivideKind::Floating, RoundingMode::Legacy);
        assert!(Number::extract(r.word).sign);
    }

    #[test]
    fn test_divide_by_zero_keeps_dividend() {
        let r = divide(0, int(10), DivideKind::Floating, RoundingMode::Legacy);
        assert_eq!(r.fault, Some(ArithFault::DivideByZero));
        assert_eq!(r.word, int(10));
        assert_eq!(divide(int(3), 0, DivideKind::Integer, RoundingMode::Legacy).word, 0);
    }

    #[test]
    fn test_integer_divide_truncates() {
        let r = divide(int(4), int(-10), DivideKind::Integer, RoundingMode::Legacy);
        assert_eq!(r.word, int(-2));
        let r = divide(float(1, -2, false), int(1), DivideKind::Integer, RoundingMode::Legacy);
        assert_eq!(r.word, int(0o100));
    }

    #[test]
    fn test_integer_divide_overflow() {
        let r = divide(float(1, -13, false), int(MANTISSA_MASK as i64), DivideKind::Integer, RoundingMode::Legacy);
        assert_eq!(r.fault, Some(ArithFault::IntegerOverflow));
    }

    #[test]
    fn test_remainder_keeps_dividend_sign() {
        let r = divide(int(4), int(-10), DivideKind::Remainder, RoundingMode::Emode);
        assert_eq!(r.word, int(-2));
        let r = divide(int(4), int(10), DivideKind::Remainder, RoundingMode::Legacy);
        assert_eq!(compare(r.word, int(2)), Ordering::Equal);
        assert!(Number::extract(r.word).is_normalized());
        assert_eq!(divide(int(5), int(10), DivideKind::Remainder, RoundingMode::Legacy).word, 0);
    }

    #[test]
    fn test_remainder_with_wide_exponent_gap() {
        // 8^27 mod 3: 8 is 2 mod 3, so odd powers leave 2.
        let r = divide(int(3), float(1, 27, false), DivideKind::Remainder, RoundingMode::Legacy);
        assert_eq!(r.fault, None);
        assert_eq!(compare(r.word, int(2)), Ordering::Equal);
        let r = divide(int(3), float(1, 40, true), DivideKind::Remainder, RoundingMode::Emode);
        assert_eq!(r.word, int(-1));
        // A far larger than B leaves B.
        let r = divide(float(1, 40, false), int(5), DivideKind::Remainder, RoundingMode::Emode);
        assert_eq!(r.word, int(5));
    }

    // Factors of 2^75 - 2^35: the product normalizes to an all-ones
    // mantissa with the rounding digit set.
    const ALL_ONES_LOW: u64 = (1 << 37) - (1 << 17);
    const ALL_ONES_HIGH: u64 = (1 << 38) + (1 << 18);

    #[test]
    fn test_multiply_all_ones_legacy_does_not_round() {
        let r = multiply(float(ALL_ONES_LOW, -13, false), float(ALL_ONES_HIGH, 0, false), RoundingMode::Legacy);
        assert_eq!(r.fault, None);
        assert_eq!(r.word, float(MANTISSA_MASK, -1, false));
    }

    #[test]
    fn test_multiply_all_ones_emode_carries() {
        let r = multiply(float(ALL_ONES_LOW, -13, false), float(ALL_ONES_HIGH, 0, false), RoundingMode::Emode);
        assert_eq!(r.fault, None);
        assert_eq!(r.word, float(1 << 36, 0, false));
    }

    #[test]
    fn test_emode_multiply_integers_and_fractions() {
        assert_eq!(multiply(int(-4), int(5), RoundingMode::Emode).word, int(-20));
        let half = float(HALF, -13, false);
        let r = multiply(half, half, RoundingMode::Emode);
        assert_eq!(compare(r.word, float(0o2000_0000_0000_0, -13, false)), Ordering::Equal);
    }

    #[test]
    fn test_divide_rounding_both_modes() {
        for mode in [RoundingMode::Legacy, RoundingMode::Emode] {
            // 1/3 = 0.2525..., the dropped digit 5 rounds up.
            let r = divide(int(3), int(1), DivideKind::Floating, mode);
            assert_eq!(r.word, float(0o2525_2525_2525_3, -13, false));
            // 2/3 = 0.5252..., the dropped digit 2 is truncated.
            let r = divide(int(3), int(2), DivideKind::Floating, mode);
            assert_eq!(r.word, float(0o5252_5252_5252_5, -13, false));
        }
    }

    #[test]
    fn test_emode_integer_divide() {
        assert_eq!(divide(int(4), int(-10), DivideKind::Integer, RoundingMode::Emode).word, int(-2));
        assert_eq!(divide(float(1, -1, false), int(1), DivideKind::Integer, RoundingMode::Emode).word, int(8));
        let r = divide(float(1, -13, false), int(MANTISSA_MASK as i64), DivideKind::Integer, RoundingMode::Emode);
        assert_eq!(r.fault, Some(ArithFault::IntegerOverflow));
        assert_eq!(r.word, float(MANTISSA_MASK, 13, false));
    }

    #[test]
    fn test_divide_by_zero_leaves_registers() {
        let mut p = processor();
        p.regs.ncsf = true;
        p.regs.a = 0;
        p.regs.b = int(10);
        p.regs.arof = true;
        p.regs.brof = true;
        p.single_divide(DivideKind::Floating);
        assert_eq!((p.regs.a, p.regs.b), (0, int(10)));
        assert!(p.regs.arof && p.regs.brof);
        assert_eq!(p.regs.i & 0xF0, 0xD0);
        assert_eq!(p.central_control().iar, 0x3D);
    }

    #[test]
    fn test_relational_leaves_truth_in_b() {
        let mut p = processor();
        p.regs.a = int(3);
        p.regs.b = int(5);
        p.regs.arof = true;
        p.regs.brof = true;
        p.relational(Relation::Gtr);
        assert_eq!(p.regs.b, 1);
        assert!(!p.regs.arof);
    }

    fn operand() -> impl Strategy<Value = Word> {
        (any::<bool>(), any::<bool>(), 0u64..64, 0u64..=MANTISSA_MASK).prop_map(|(ms, es, e, m)| {
            let exponent = if es { -(e as i32) } else { e as i32 };
            float(m, exponent, ms)
        })
    }

    fn normalized_mantissa() -> impl Strategy<Value = u64> {
        0o1000_0000_0000_0u64..=0o3777_7777_7777_7
    }

    proptest! {
        #[test]
        fn prop_compare_reflexive(a in operand()) {
            prop_assert_eq!(compare(a, a), Ordering::Equal);
        }

        #[test]
        fn prop_compare_antisymmetric(a in operand(), b in operand()) {
            prop_assert_eq!(compare(a, b), compare(b, a).reverse());
        }

        #[test]
        fn prop_integer_add_inverse(x in -(1i64 << 37)..(1i64 << 37), y in -(1i64 << 37)..(1i64 << 37)) {
            let (x, y) = (int(x), int(y));
            let sum = add(y, x, true, RoundingMode::Legacy);
            prop_assert_eq!(sum.fault, None);
            prop_assert_eq!(add(y, sum.word, false, RoundingMode::Legacy).word, x);
        }

        #[test]
        fn prop_legacy_floating_add_inverse(
            mx in normalized_mantissa(),
            my in normalized_mantissa(),
            sx in any::<bool>(),
            sy in any::<bool>(),
            e in (-40i32..40).prop_filter("nonzero exponent", |e| *e != 0),
        ) {
            let (x, y) = (float(mx, e, sx), float(my, e, sy));
            let sum = add(y, x, true, RoundingMode::Legacy);
            prop_assert_eq!(sum.fault, None);
            prop_assert_eq!(add(y, sum.word, false, RoundingMode::Legacy).word, x);
        }

        #[test]
        fn prop_emode_add_inverse(
            mx in normalized_mantissa(),
            my in normalized_mantissa(),
            sx in any::<bool>(),
            sy in any::<bool>(),
            e in -40i32..40,
        ) {
            let (x, y) = (float(mx, e, sx), float(my, e, sy));
            let sum = add(y, x, true, RoundingMode::Emode);
            prop_assert_eq!(add(y, sum.word, false, RoundingMode::Emode).word, x);
        }
    }
}

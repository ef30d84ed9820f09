//! Bit-field access inside a 48-bit machine word.
//!
//! Bits are numbered the way the hardware manuals number them: bit 0 is the
//! most significant bit of the word and bit 47 the least significant. A field
//! `[start, start + width)` therefore ends `47 - (start + width - 1)` places
//! above the low end of the host integer.

/// A 48-bit machine word held in the low bits of a `u64`.
pub type Word = u64;

/// Number of bits in a machine word.
pub const WORD_BITS: u32 = 48;

/// All 48 bits set.
pub const WORD_MASK: Word = (1 << WORD_BITS) - 1;

#[inline]
fn field_mask(width: u32) -> Word {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[inline]
fn field_shift(start: u32, width: u32) -> u32 {
    debug_assert!(start + width <= WORD_BITS, "field [{}, {}) past end of word", start, start + width);
    WORD_BITS - start - width
}

/// Return bits `[start, start + width)` right-justified.
#[inline]
pub fn isolate(word: Word, start: u32, width: u32) -> Word {
    if width == 0 {
        return 0;
    }
    (word >> field_shift(start, width)) & field_mask(width)
}

/// Return `word` with bits `[start, start + width)` replaced by the low
/// `width` bits of `value`.
#[inline]
pub fn insert(word: Word, start: u32, width: u32, value: Word) -> Word {
    if width == 0 {
        return word;
    }
    let shift = field_shift(start, width);
    let mask = field_mask(width) << shift;
    (word & !mask) | ((value << shift) & mask)
}

/// Copy `width` bits starting at `vstart` in `value` into `dest` at `wstart`.
#[inline]
pub fn transfer(dest: Word, wstart: u32, width: u32, value: Word, vstart: u32) -> Word {
    insert(dest, wstart, width, isolate(value, vstart, width))
}

/// Test a single bit.
#[inline]
pub fn bit(word: Word, n: u32) -> bool {
    isolate(word, n, 1) != 0
}

/// Set or clear a single bit.
#[inline]
pub fn set_bit(word: Word, n: u32, on: bool) -> Word {
    insert(word, n, 1, on as Word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_isolate_msb_numbering() {
        let w: Word = 0o4000_0000_0000_0000;
        assert_eq!(isolate(w, 0, 1), 1);
        assert_eq!(isolate(w, 1, 1), 0);
        assert_eq!(isolate(0o7, 45, 3), 0o7);
        assert_eq!(isolate(0o1234, 36, 12), 0o1234);
    }

    #[test]
    fn test_insert_field() {
        let w = insert(0, 33, 15, 0o77777);
        assert_eq!(w, 0o77777);
        let w = insert(w, 3, 6, 0o12);
        assert_eq!(isolate(w, 3, 6), 0o12);
        assert_eq!(isolate(w, 33, 15), 0o77777);
    }

    #[test]
    fn test_insert_truncates_value() {
        assert_eq!(insert(0, 45, 3, 0o17), 0o7);
    }

    #[test]
    fn test_transfer() {
        let src: Word = 0o5252_0000_0000_0000;
        let w = transfer(0, 36, 12, src, 0);
        assert_eq!(w, 0o5252);
    }

    #[test]
    fn test_single_bits() {
        let w = set_bit(0, 2, true);
        assert!(bit(w, 2));
        assert_eq!(w, 0x2000_0000_0000);
        assert!(!bit(set_bit(w, 2, false), 2));
    }

    fn field() -> impl Strategy<Value = (u32, u32)> {
        (1u32..=48).prop_flat_map(|width| (0..=(48 - width), Just(width)))
    }

    proptest! {
        #[test]
        fn prop_insert_of_isolate_is_identity(w in 0..=WORD_MASK, (s, n) in field()) {
            prop_assert_eq!(insert(w, s, n, isolate(w, s, n)), w);
        }

        #[test]
        fn prop_isolate_after_insert(w in 0..=WORD_MASK, v in any::<u64>(), (s, n) in field()) {
            let out = insert(w, s, n, v);
            prop_assert_eq!(isolate(out, s, n), v & field_mask(n));
            prop_assert_eq!(out & !WORD_MASK, 0);
        }

        #[test]
        fn prop_insert_leaves_other_bits(w in 0..=WORD_MASK, v in any::<u64>(), (s, n) in field()) {
            let out = insert(w, s, n, v);
            let mask = field_mask(n) << (48 - s - n);
            prop_assert_eq!(out & !mask, w & !mask);
        }
    }
}

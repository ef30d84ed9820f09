//! Character-mode operator dispatch.
//!
//! In character mode a syllable is a 6-bit opcode (`T & 0x3F`) and a 6-bit
//! repeat count (`T >> 6`); a preceding CRF can supply the count instead.
//! Characters are six bits, eight to a word, character 0 in the high bits.
//!
//! The source string is addressed by M (word), G (character) and H (bit),
//! with its current word buffered in A. The destination is S, K and V with
//! its word in B. AROF and BROF mean the buffered word is the one the
//! address registers name. Destination writes go through to memory.
//!
//! TFFF (the word-mode MSFF) holds the result of tests and comparisons.

use std::cmp::Ordering;

use crate::cpu::arith::Relation;
use crate::cpu::registers::ADDRESS_MASK;
use crate::cpu::{Processor, ProcessorError};
use crate::word::number::MANTISSA_MASK;
use crate::word::{bitfield, LoopWord, Number, ReturnWord, Word};
use tracing::warn;

/// Collating rank of each internal character code.
const COLLATION: [u8; 64] = [
    53, 54, 55, 56, 57, 58, 59, 60, 61, 62, 19, 20, 63, 21, 22, 23,
    24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 1, 2, 6, 3, 4, 5,
    34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 7, 8, 12, 9, 10, 11,
    0, 13, 45, 46, 47, 48, 49, 50, 51, 52, 14, 15, 16, 17, 18, 44,
];

const BLANK: u8 = 0o60;
/// Zone bits of a character.
const ZONE: u8 = 0o60;
/// Zone marking the last digit of a negative decimal field.
const NEGATIVE_ZONE: u8 = 0o40;
const FLAG_BIT_INTERRUPT: u8 = 0x80;

fn collate(c: u8) -> u8 {
    COLLATION[(c & 0x3F) as usize]
}

fn is_alphanumeric(c: u8) -> bool {
    matches!(c, 0o00..=0o11 | 0o21..=0o31 | 0o41..=0o51 | 0o62..=0o71)
}

/// Decimal digits of a field, most significant first, and its sign.
struct Decimal {
    digits: Vec<u8>,
    negative: bool,
}

impl Decimal {
    fn from_chars(chars: &[u8]) -> Self {
        let negative = chars.last().is_some_and(|&c| c & ZONE == NEGATIVE_ZONE);
        let digits = chars.iter().map(|&c| (c & 0o17).min(9)).collect();
        Self { digits, negative }
    }

    fn is_zero(&self) -> bool {
        self.digits.iter().all(|&d| d == 0)
    }

    fn to_chars(&self) -> Vec<u8> {
        let mut chars = self.digits.clone();
        if self.negative && !self.is_zero() {
            if let Some(last) = chars.last_mut() {
                *last |= NEGATIVE_ZONE;
            }
        }
        chars
    }

    /// Signed sum of two fields of equal length. Returns the sum and
    /// whether it overflowed the field.
    fn add(&self, other: &Decimal) -> (Decimal, bool) {
        if self.negative == other.negative {
            let mut digits = vec![0; self.digits.len()];
            let mut carry = 0;
            for i in (0..digits.len()).rev() {
                let sum = self.digits[i] + other.digits[i] + carry;
                digits[i] = sum % 10;
                carry = sum / 10;
            }
            (Decimal { digits, negative: self.negative }, carry != 0)
        } else {
            let (larger, smaller) = if self.digits >= other.digits { (self, other) } else { (other, self) };
            let mut digits = vec![0; self.digits.len()];
            let mut borrow = 0;
            for i in (0..digits.len()).rev() {
                let mut d = larger.digits[i] as i8 - smaller.digits[i] as i8 - borrow;
                borrow = 0;
                if d < 0 {
                    d += 10;
                    borrow = 1;
                }
                digits[i] = d as u8;
            }
            (Decimal { digits, negative: larger.negative }, false)
        }
    }
}

/// Pack an address, character and bit position into a stack word.
fn address_word(address: u16, char_index: u8, bit: u8) -> Word {
    let mut w = bitfield::insert(0, 33, 15, address as Word);
    w = bitfield::insert(w, 30, 3, char_index as Word);
    bitfield::insert(w, 27, 3, bit as Word)
}

fn unpack_address_word(w: Word) -> (u16, u8, u8) {
    (
        bitfield::isolate(w, 33, 15) as u16,
        bitfield::isolate(w, 30, 3) as u8,
        bitfield::isolate(w, 27, 3) as u8,
    )
}

impl Processor {
    /// Execute the character-mode syllable in T.
    pub(crate) fn execute_char_mode(&mut self) -> Result<(), ProcessorError> {
        let opcode = (self.regs.t & 0x3F) as u8;
        let variant = (self.regs.t >> 6) as u8 & 0x3F;
        let n = self.repeat_override.take().unwrap_or(variant);
        let count = n as i64;

        match opcode {
            0x00 => self.exit_char_mode(n != 0),
            0x02 => self.advance_destination_bits(count),
            0x03 => self.advance_source_bits(count),
            0x04 => {
                let w = self.stack_cell(n);
                self.set_destination(w);
            }
            0x05 => self.transfer_words(n),
            0x06 => {
                self.flush_destination();
                self.regs.s = self.frame_offset(n);
                self.regs.k = 0;
                self.regs.v = 0;
            }
            0x07 => {
                let (address, char_index) = self.source_address_field();
                self.flush_destination();
                self.regs.s = address;
                self.regs.k = char_index;
                self.regs.v = 0;
            }
            0x09 => {
                self.put_destination_char(n);
                self.advance_destination(1);
            }
            0x0A => self.transfer_blanks(n),
            0x0C => {
                let w = address_word(self.regs.s, self.regs.k, self.regs.v);
                self.store_stack_cell(n, w);
            }
            0x0D => {
                let w = address_word(self.regs.m, self.regs.g, self.regs.h);
                self.store_stack_cell(n, w);
            }
            0x0E => self.advance_destination(count),
            0x0F => self.advance_destination(-count),
            0x11 => {
                self.regs.m = self.frame_offset(n);
                self.regs.g = 0;
                self.regs.h = 0;
                self.regs.arof = false;
            }
            0x13 => self.test_character(n, Relation::Eql),
            0x14 => self.test_character(n, Relation::Neq),
            0x15 => self.test_character(n, Relation::Geq),
            0x16 => self.test_character(n, Relation::Gtr),
            0x1A => self.test_character(n, Relation::Leq),
            0x1B => self.test_character(n, Relation::Lss),
            0x17 => self.advance_source(-count),
            0x18 => self.advance_source(count),
            0x1C => {
                let c = self.source_char();
                self.regs.set_tfff(is_alphanumeric(c));
            }
            0x1D => {
                self.load_source();
                let position = self.regs.g as u32 * 6 + (self.regs.h as u32).min(5);
                let bit = bitfield::bit(self.regs.a, position);
                self.regs.set_tfff(bit == (n & 1 != 0));
            }
            0x1E => self.regs.tally = self.regs.tally.wrapping_add(n) & 0x3F,
            0x1F => {
                self.put_destination_char(self.regs.tally);
                self.advance_destination(1);
            }
            0x20 => self.regs.tally = n,
            0x21 => {
                let w = self.stack_cell(n);
                self.repeat_override = Some((w & 0x3F) as u8);
            }
            0x22 => {
                if !self.regs.tfff() {
                    self.leave_loop();
                    self.jump_syllables(n as i32);
                }
            }
            0x23 => {
                if !self.regs.tfff() {
                    self.jump_syllables(n as i32);
                }
            }
            0x24 => {
                self.leave_loop();
                self.jump_syllables(n as i32);
            }
            0x25 => self.jump_syllables(n as i32),
            0x26 => {
                let (address, l, _) = unpack_address_word(self.stack_cell(n));
                self.regs.c = address;
                self.regs.l = l & 3;
                self.regs.prof = false;
            }
            0x27 => self.end_loop(),
            0x28 => self.begin_loop(n),
            0x29 => {
                let (address, char_index, bit) = unpack_address_word(self.stack_cell(n));
                self.regs.m = address;
                self.regs.g = char_index;
                self.regs.h = bit;
                self.regs.arof = false;
            }
            0x2A => {
                let w = address_word(self.regs.c, self.regs.l, 0);
                self.store_stack_cell(n, w);
            }
            0x2B => {
                if !self.regs.tfff() {
                    self.jump_syllables(-(n as i32));
                }
            }
            0x2C => {
                let (address, char_index) = self.source_address_field();
                self.regs.m = address;
                self.regs.g = char_index;
                self.regs.h = 0;
                self.regs.arof = false;
            }
            0x2D => self.jump_syllables(-(n as i32)),
            0x2E => self.compare_characters(n, Relation::Eql),
            0x2F => self.compare_characters(n, Relation::Neq),
            0x30 => self.compare_characters(n, Relation::Geq),
            0x31 => self.compare_characters(n, Relation::Gtr),
            0x36 => self.compare_characters(n, Relation::Leq),
            0x37 => self.compare_characters(n, Relation::Lss),
            0x32 => self.set_destination_bits(n, true),
            0x33 => self.set_destination_bits(n, false),
            0x34 => self.output_convert(n),
            0x35 => self.input_convert(n),
            0x38 => self.field_add(n, false),
            0x39 => self.field_add(n, true),
            0x3A => self.transfer_program_characters(n),
            0x3B => self.transfer_characters(n, |src, _| src & 0o17, true),
            0x3C => self.transfer_characters(n, |src, dst| (src & ZONE) | (dst & 0o17), false),
            0x3D => self.transfer_characters(n, |src, _| src, false),
            _ => {}
        }
        Ok(())
    }

    // ==================== Source and destination strings ====================

    fn load_source(&mut self) {
        if !self.regs.arof {
            if let Some(w) = self.fetch_word(self.regs.m) {
                self.regs.a = w;
                self.regs.arof = true;
            }
        }
    }

    fn source_char(&mut self) -> u8 {
        self.load_source();
        bitfield::isolate(self.regs.a, self.regs.g as u32 * 6, 6) as u8
    }

    fn load_destination(&mut self) {
        if !self.regs.brof {
            if let Some(w) = self.fetch_word(self.regs.s) {
                self.regs.b = w;
                self.regs.brof = true;
            }
        }
    }

    fn destination_char(&mut self) -> u8 {
        self.load_destination();
        bitfield::isolate(self.regs.b, self.regs.k as u32 * 6, 6) as u8
    }

    fn put_destination_char(&mut self, c: u8) {
        self.load_destination();
        self.regs.b = bitfield::insert(self.regs.b, self.regs.k as u32 * 6, 6, c as Word);
        self.store_word(self.regs.s, self.regs.b);
        if self.regs.arof && self.regs.m == self.regs.s {
            self.regs.a = self.regs.b;
        }
    }

    /// Write back the destination buffer and drop it.
    pub(crate) fn flush_destination(&mut self) {
        if self.regs.brof {
            self.store_b_via_s();
            self.regs.brof = false;
        }
    }

    /// Move the source `count` characters (negative is backward).
    fn advance_source(&mut self, count: i64) {
        let position = self.regs.m as i64 * 8 + self.regs.g as i64 + count;
        let word = (position.div_euclid(8) as u16) & ADDRESS_MASK;
        if word != self.regs.m {
            self.regs.arof = false;
        }
        self.regs.m = word;
        self.regs.g = position.rem_euclid(8) as u8;
        self.regs.h = 0;
    }

    fn advance_destination(&mut self, count: i64) {
        let position = self.regs.s as i64 * 8 + self.regs.k as i64 + count;
        let word = (position.div_euclid(8) as u16) & ADDRESS_MASK;
        if word != self.regs.s {
            self.flush_destination();
        }
        self.regs.s = word;
        self.regs.k = position.rem_euclid(8) as u8;
        self.regs.v = 0;
    }

    fn advance_source_bits(&mut self, count: i64) {
        let bits = self.regs.g as i64 * 6 + self.regs.h as i64 + count;
        self.advance_source(bits.div_euclid(6) - self.regs.g as i64);
        self.regs.h = bits.rem_euclid(6) as u8;
    }

    fn advance_destination_bits(&mut self, count: i64) {
        let bits = self.regs.k as i64 * 6 + self.regs.v as i64 + count;
        self.advance_destination(bits.div_euclid(6) - self.regs.k as i64);
        self.regs.v = bits.rem_euclid(6) as u8;
    }

    /// Read `n` source characters, advancing past them.
    fn take_source_chars(&mut self, n: u8) -> Vec<u8> {
        (0..n)
            .map(|_| {
                let c = self.source_char();
                self.advance_source(1);
                c
            })
            .collect()
    }

    fn put_destination_chars(&mut self, chars: &[u8]) {
        for &c in chars {
            self.put_destination_char(c);
            self.advance_destination(1);
        }
    }

    /// Three source characters read as an address and character index.
    fn source_address_field(&mut self) -> (u16, u8) {
        let value = self
            .take_source_chars(3)
            .iter()
            .fold(0u32, |acc, &c| (acc << 6) | c as u32);
        (((value >> 3) as u16) & ADDRESS_MASK, (value & 7) as u8)
    }

    fn frame_offset(&self, n: u8) -> u16 {
        self.regs.f.wrapping_sub(n as u16) & ADDRESS_MASK
    }

    fn stack_cell(&mut self, n: u8) -> Word {
        let address = self.frame_offset(n);
        self.fetch_word(address).unwrap_or(0)
    }

    fn store_stack_cell(&mut self, n: u8, word: Word) {
        let address = self.frame_offset(n);
        self.store_word(address, word);
    }

    fn set_destination(&mut self, w: Word) {
        self.flush_destination();
        let (address, char_index, bit) = unpack_address_word(w);
        self.regs.s = address;
        self.regs.k = char_index;
        self.regs.v = bit;
    }

    // ==================== Operators ====================

    /// EXC. A zero count returns from the character-mode procedure; any
    /// other count is CMX, leaving in-line character mode entered by CMN.
    fn exit_char_mode(&mut self, inline: bool) {
        self.flush_destination();
        self.regs.arof = false;
        if inline {
            let rcw_address = self.regs.f;
            let Some(word) = self.fetch_word(rcw_address) else {
                return;
            };
            let Ok(rcw) = ReturnWord::decode(word) else {
                self.regs.b = word;
                self.regs.brof = true;
                self.syllable_interrupt(FLAG_BIT_INTERRUPT);
                return;
            };
            self.regs.f = rcw.f;
            self.regs.k = rcw.k;
            self.regs.g = rcw.g;
            self.regs.v = rcw.v;
            self.regs.h = rcw.h;
            self.regs.s = rcw_address.wrapping_sub(1) & ADDRESS_MASK;
        } else if !self.exit_subroutine(false) {
            return;
        }
        self.regs.brof = false;
        self.regs.cwmf = false;
    }

    /// TRW: transfer whole words, starting at the next word boundary of
    /// each string.
    fn transfer_words(&mut self, n: u8) {
        if self.regs.g != 0 || self.regs.h != 0 {
            self.advance_source(8 - self.regs.g as i64);
        }
        if self.regs.k != 0 || self.regs.v != 0 {
            self.advance_destination(8 - self.regs.k as i64);
        }
        self.flush_destination();
        for _ in 0..n {
            if let Some(w) = self.fetch_word(self.regs.m) {
                self.store_word(self.regs.s, w);
            }
            self.regs.m = self.regs.m.wrapping_add(1) & ADDRESS_MASK;
            self.regs.s = self.regs.s.wrapping_add(1) & ADDRESS_MASK;
        }
        self.regs.arof = false;
    }

    /// TBN: blank destination characters until a nonzero digit.
    fn transfer_blanks(&mut self, n: u8) {
        self.regs.set_tfff(true);
        for _ in 0..n {
            let c = self.destination_char();
            if (1..=9).contains(&c) {
                self.regs.set_tfff(false);
                return;
            }
            self.put_destination_char(BLANK);
            self.advance_destination(1);
        }
    }

    /// TEQ, TNE, TEG, TGR, TEL, TLS: compare the source character with the
    /// literal `n` in collating order. Neither string moves.
    fn test_character(&mut self, n: u8, relation: Relation) {
        let c = self.source_char();
        let order = collate(c).cmp(&collate(n));
        self.regs.set_tfff(relation.holds(order));
    }

    /// CEQ, CNE, CEG, CGR, CEL, CLS: compare `n` source characters with
    /// `n` destination characters. The first difference decides; both
    /// strings advance over all `n`.
    fn compare_characters(&mut self, n: u8, relation: Relation) {
        let mut order = Ordering::Equal;
        for _ in 0..n {
            if order == Ordering::Equal {
                let s = self.source_char();
                let d = self.destination_char();
                order = collate(s).cmp(&collate(d));
            }
            self.advance_source(1);
            self.advance_destination(1);
        }
        self.regs.set_tfff(relation.holds(order));
    }

    /// BIS / BIR: set or reset `n` destination bits.
    fn set_destination_bits(&mut self, n: u8, on: bool) {
        for _ in 0..n {
            self.load_destination();
            let position = self.regs.k as u32 * 6 + (self.regs.v as u32).min(5);
            self.regs.b = bitfield::set_bit(self.regs.b, position, on);
            self.store_word(self.regs.s, self.regs.b);
            self.advance_destination_bits(1);
        }
    }

    /// BNS: open a loop of `n` iterations over the syllables that follow.
    /// The enclosing loop word is saved just above F.
    fn begin_loop(&mut self, n: u8) {
        self.regs.f = self.regs.f.wrapping_add(1) & ADDRESS_MASK;
        self.store_word(self.regs.f, self.regs.x);
        self.regs.x = LoopWord {
            l: self.regs.l,
            repeat: n.saturating_sub(1),
            f: self.regs.f,
            c: self.regs.c,
        }
        .to_x();
    }

    /// ENS: close the innermost loop, repeating it if iterations remain.
    fn end_loop(&mut self) {
        let mut lw = LoopWord::from_x(self.regs.x);
        if lw.repeat == 0 {
            self.leave_loop();
        } else {
            lw.repeat -= 1;
            self.regs.x = lw.to_x();
            self.regs.c = lw.c;
            self.regs.l = lw.l;
            self.regs.prof = false;
        }
    }

    /// Drop the innermost loop, restoring the enclosing loop word.
    fn leave_loop(&mut self) {
        let lw = LoopWord::from_x(self.regs.x);
        if let Some(saved) = self.fetch_word(lw.f) {
            self.regs.x = saved & MANTISSA_MASK;
        }
        self.regs.f = lw.f.wrapping_sub(1) & ADDRESS_MASK;
    }

    /// OCV: convert the integer in the source word to `n` decimal
    /// characters. TFFF is cleared if the value does not fit.
    fn output_convert(&mut self, n: u8) {
        if self.regs.g != 0 || self.regs.h != 0 {
            self.advance_source(8 - self.regs.g as i64);
        }
        self.load_source();
        let (value, fits) = match Number::extract(self.regs.a).integerize(false) {
            Some(value) => (value, true),
            None => {
                warn!(processor = %self.id, m = self.regs.m, "OCV source is not a 39-bit integer, writing zeros");
                (0, false)
            }
        };
        let mut magnitude = value.unsigned_abs();
        let mut digits = vec![0u8; n as usize];
        for d in digits.iter_mut().rev() {
            *d = (magnitude % 10) as u8;
            magnitude /= 10;
        }
        self.regs.set_tfff(fits && magnitude == 0);
        let field = Decimal { digits, negative: value < 0 };
        self.put_destination_chars(&field.to_chars());
        self.advance_source(8);
    }

    /// ICV: convert `n` decimal source characters to an integer word at the
    /// next destination word boundary.
    fn input_convert(&mut self, n: u8) {
        let field = Decimal::from_chars(&self.take_source_chars(n));
        let magnitude = field
            .digits
            .iter()
            .fold(0u64, |acc, &d| (acc.wrapping_mul(10) + d as u64) & MANTISSA_MASK);
        let word = Number { mantissa: magnitude, extension: 0, exponent: 0, sign: field.negative }.compose();
        if self.regs.k != 0 || self.regs.v != 0 {
            self.advance_destination(8 - self.regs.k as i64);
        }
        self.flush_destination();
        self.store_word(self.regs.s, word);
        self.advance_destination(8);
    }

    /// FAD / FSU: add (or subtract) the `n`-digit source field to the
    /// destination field in place. TFFF reports overflow.
    fn field_add(&mut self, n: u8, add: bool) {
        let mut source = Decimal::from_chars(&self.take_source_chars(n));
        if !add {
            source.negative = !source.negative;
        }
        let (s, k) = (self.regs.s, self.regs.k);
        let mut destination = Vec::with_capacity(n as usize);
        for _ in 0..n {
            destination.push(self.destination_char());
            self.advance_destination(1);
        }
        let (sum, overflow) = Decimal::from_chars(&destination).add(&source);

        self.flush_destination();
        self.regs.s = s;
        self.regs.k = k;
        self.regs.v = 0;
        self.put_destination_chars(&sum.to_chars());
        self.regs.set_tfff(overflow);
    }

    /// TRP: transfer `n` characters taken from the program string after
    /// this syllable, then continue past them.
    fn transfer_program_characters(&mut self, n: u8) {
        let start = self.regs.l as u32 * 2;
        for i in 0..n as u32 {
            let position = start + i;
            let address = self.regs.c.wrapping_add((position / 8) as u16) & ADDRESS_MASK;
            let word = self.fetch_word(address).unwrap_or(0);
            let c = bitfield::isolate(word, (position % 8) * 6, 6) as u8;
            self.put_destination_char(c);
            self.advance_destination(1);
        }
        self.jump_syllables((n as i32 + 1) / 2);
    }

    /// TRS, TRN, TRZ: move `n` characters through `merge(source,
    /// destination)`. With `sign_test`, TFFF is set when the last source
    /// character carries the negative zone.
    fn transfer_characters(&mut self, n: u8, merge: fn(u8, u8) -> u8, sign_test: bool) {
        let mut last = 0;
        for _ in 0..n {
            let src = self.source_char();
            let dst = self.destination_char();
            self.put_destination_char(merge(src, dst));
            self.advance_source(1);
            self.advance_destination(1);
            last = src;
        }
        if sign_test && n > 0 {
            self.regs.set_tfff(last & ZONE == NEGATIVE_ZONE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{op, CMN};
    use crate::cpu::testing::{load_program, processor};
    use crate::word::DataDescriptor;

    /// Pack up to eight characters into a word.
    fn chars(cs: &[u8]) -> Word {
        cs.iter()
            .enumerate()
            .fold(0, |w, (i, &c)| bitfield::insert(w, i as u32 * 6, 6, c as Word))
    }

    fn char_mode() -> Processor {
        let mut p = processor();
        p.regs.cwmf = true;
        p.regs.m = 0o2000;
        p.regs.s = 0o3000;
        p.regs.f = 0o1000;
        p
    }

    fn execute(p: &mut Processor, t: u16) {
        p.regs.t = t;
        p.execute_char_mode().unwrap();
    }

    #[test]
    fn test_collation_is_a_permutation() {
        let mut seen = [false; 64];
        for &rank in COLLATION.iter() {
            assert!(!seen[rank as usize]);
            seen[rank as usize] = true;
        }
        assert!(collate(0o21) < collate(0o22));
        assert!(collate(0o71) < collate(0o00));
    }

    #[test]
    fn test_transfer_source_characters() {
        let mut p = char_mode();
        p.mem.store(0o2000, chars(&[1, 2, 3, 4, 5, 6, 7, 0o10]));
        p.mem.store(0o2001, chars(&[0o11, 0o21]));
        execute(&mut p, op(0x3D, 10));
        assert_eq!(p.mem.peek(0o3000), chars(&[1, 2, 3, 4, 5, 6, 7, 0o10]));
        assert_eq!(p.mem.peek(0o3001), chars(&[0o11, 0o21]));
        assert_eq!((p.regs.m, p.regs.g), (0o2001, 2));
        assert_eq!((p.regs.s, p.regs.k), (0o3001, 2));
    }

    #[test]
    fn test_transfer_numerics_and_zones() {
        let mut p = char_mode();
        p.mem.store(0o2000, chars(&[0o21, 0o42]));
        execute(&mut p, op(0x3B, 2));
        assert_eq!(p.mem.peek(0o3000), chars(&[0o01, 0o02]));
        assert!(p.regs.tfff());

        p.regs.m = 0o2000;
        p.regs.g = 0;
        p.regs.arof = false;
        p.regs.k = 0;
        execute(&mut p, op(0x3C, 2));
        assert_eq!(p.mem.peek(0o3000), chars(&[0o21, 0o42]));
    }

    #[test]
    fn test_compare_characters_uses_collation() {
        let mut p = char_mode();
        // "A" against "1": letters collate below digits.
        p.mem.store(0o2000, chars(&[0o21]));
        p.mem.store(0o3000, chars(&[0o01]));
        execute(&mut p, op(0x37, 1));
        assert!(p.regs.tfff());
        assert_eq!((p.regs.g, p.regs.k), (1, 1));
    }

    #[test]
    fn test_compare_equal_strings() {
        let mut p = char_mode();
        let text = chars(&[0o21, 0o22, 0o23]);
        p.mem.store(0o2000, text);
        p.mem.store(0o3000, text);
        execute(&mut p, op(0x2E, 3));
        assert!(p.regs.tfff());
        execute(&mut p, op(0x2F, 0));
        assert!(!p.regs.tfff());
    }

    #[test]
    fn test_test_character_does_not_advance() {
        let mut p = char_mode();
        p.mem.store(0o2000, chars(&[0o05]));
        execute(&mut p, op(0x13, 0o05));
        assert!(p.regs.tfff());
        execute(&mut p, op(0x16, 0o04));
        assert!(p.regs.tfff());
        execute(&mut p, op(0x1B, 0o04));
        assert!(!p.regs.tfff());
        assert_eq!((p.regs.m, p.regs.g), (0o2000, 0));
        execute(&mut p, op(0x1C, 0));
        assert!(p.regs.tfff());
    }

    #[test]
    fn test_skip_and_bit_operators() {
        let mut p = char_mode();
        execute(&mut p, op(0x0E, 9));
        assert_eq!((p.regs.s, p.regs.k), (0o3001, 1));
        execute(&mut p, op(0x0F, 2));
        assert_eq!((p.regs.s, p.regs.k), (0o3000, 7));
        execute(&mut p, op(0x02, 4));
        assert_eq!(p.regs.v, 4);
        execute(&mut p, op(0x32, 3));
        // Bits 4..6 of character 7 and bit 0 of the next word.
        assert_eq!(p.mem.peek(0o3000), 0b11);
        assert_eq!(p.mem.peek(0o3001), 1 << 47);
        assert_eq!((p.regs.s, p.regs.k, p.regs.v), (0o3001, 0, 1));
    }

    #[test]
    fn test_tally_operators() {
        let mut p = char_mode();
        execute(&mut p, op(0x20, 5));
        execute(&mut p, op(0x1E, 3));
        assert_eq!(p.regs.tally, 8);
        execute(&mut p, op(0x1F, 0));
        assert_eq!(p.mem.peek(0o3000), chars(&[8]));
    }

    #[test]
    fn test_address_save_and_recall() {
        let mut p = char_mode();
        p.regs.k = 3;
        execute(&mut p, op(0x0C, 2));
        p.regs.s = 0;
        p.regs.k = 0;
        execute(&mut p, op(0x04, 2));
        assert_eq!((p.regs.s, p.regs.k), (0o3000, 3));
        execute(&mut p, op(0x11, 2));
        assert_eq!(p.regs.m, 0o776);
    }

    #[test]
    fn test_transfer_words_aligns() {
        let mut p = char_mode();
        p.regs.g = 3;
        p.mem.store(0o2001, 11);
        p.mem.store(0o2002, 22);
        execute(&mut p, op(0x05, 2));
        assert_eq!(p.mem.peek(0o3000), 11);
        assert_eq!(p.mem.peek(0o3001), 22);
        assert_eq!((p.regs.m, p.regs.s), (0o2003, 0o3002));
    }

    #[test]
    fn test_field_add_and_subtract() {
        let mut p = char_mode();
        // 123 + 089 = 212
        p.mem.store(0o2000, chars(&[0, 8, 9]));
        p.mem.store(0o3000, chars(&[1, 2, 3]));
        execute(&mut p, op(0x39, 3));
        assert_eq!(p.mem.peek(0o3000), chars(&[2, 1, 2]));
        assert!(!p.regs.tfff());

        // 212 - 300 = -088
        p.mem.store(0o2000, chars(&[3, 0, 0]));
        p.regs.m = 0o2000;
        p.regs.g = 0;
        p.regs.arof = false;
        p.regs.s = 0o3000;
        p.regs.k = 0;
        execute(&mut p, op(0x38, 3));
        assert_eq!(p.mem.peek(0o3000), chars(&[0, 8, 8 | NEGATIVE_ZONE]));
    }

    #[test]
    fn test_field_add_overflow() {
        let mut p = char_mode();
        p.mem.store(0o2000, chars(&[9, 9]));
        p.mem.store(0o3000, chars(&[0, 1]));
        execute(&mut p, op(0x39, 2));
        assert_eq!(p.mem.peek(0o3000), chars(&[0, 0]));
        assert!(p.regs.tfff());
    }

    #[test]
    fn test_input_and_output_convert() {
        let mut p = char_mode();
        p.mem.store(0o2000, chars(&[0, 4, 2 | NEGATIVE_ZONE]));
        execute(&mut p, op(0x35, 3));
        assert_eq!(p.mem.peek(0o3000), Number::from_i64(-42).compose());
        assert_eq!((p.regs.s, p.regs.k), (0o3001, 0));

        p.mem.store(0o2001, Number::from_i64(1234).compose());
        p.regs.m = 0o2001;
        p.regs.g = 0;
        p.regs.arof = false;
        execute(&mut p, op(0x34, 5));
        assert_eq!(p.mem.peek(0o3001), chars(&[0, 1, 2, 3, 4]));
        assert!(p.regs.tfff());
        assert_eq!(p.regs.m, 0o2002);
    }

    #[test]
    fn test_output_convert_oversized_value() {
        let mut p = char_mode();
        // 8^20 has no 39-bit integer form.
        p.mem.store(0o2000, Number { mantissa: 1, extension: 0, exponent: 20, sign: false }.compose());
        p.mem.store(0o3000, chars(&[7, 7, 7, 7]));
        p.regs.arof = false;
        execute(&mut p, op(0x34, 3));
        assert_eq!(p.mem.peek(0o3000), chars(&[0, 0, 0, 7]));
        assert!(!p.regs.tfff());
        assert_eq!(p.regs.m, 0o2001);
    }

    #[test]
    fn test_transfer_blanks_stops_at_digit() {
        let mut p = char_mode();
        p.mem.store(0o3000, chars(&[0, 0, 5, 0]));
        execute(&mut p, op(0x0A, 4));
        assert_eq!(p.mem.peek(0o3000), chars(&[BLANK, BLANK, 5, 0]));
        assert!(!p.regs.tfff());
        assert_eq!(p.regs.k, 2);
    }

    #[test]
    fn test_loop_repeats_body() {
        let mut p = char_mode();
        p.regs.c = 0o100;
        p.regs.l = 1;
        // BNS 3: the body starts at the syllable after BNS.
        execute(&mut p, op(0x28, 3));
        assert_eq!(p.regs.f, 0o1001);
        for _ in 0..2 {
            p.regs.c = 0o101;
            execute(&mut p, op(0x27, 0));
            assert_eq!((p.regs.c, p.regs.l), (0o100, 1));
        }
        p.regs.c = 0o101;
        execute(&mut p, op(0x27, 0));
        assert_eq!(p.regs.c, 0o101);
        assert_eq!(p.regs.f, 0o1000);
        assert_eq!(p.regs.x, 0);
    }

    #[test]
    fn test_repeat_field_overrides_count() {
        let mut p = char_mode();
        p.mem.store(0o777, 2);
        p.mem.store(0o2000, chars(&[1, 2, 3]));
        execute(&mut p, op(0x21, 1));
        execute(&mut p, op(0x3D, 0));
        assert_eq!(p.mem.peek(0o3000), chars(&[1, 2]));
        assert!(p.repeat_override.is_none());
    }

    #[test]
    fn test_conditional_jumps_on_false() {
        let mut p = char_mode();
        p.regs.c = 0o100;
        p.regs.l = 0;
        p.regs.set_tfff(true);
        execute(&mut p, op(0x23, 5));
        assert_eq!((p.regs.c, p.regs.l), (0o100, 0));
        p.regs.set_tfff(false);
        execute(&mut p, op(0x23, 5));
        assert_eq!((p.regs.c, p.regs.l), (0o101, 1));
        execute(&mut p, op(0x2D, 5));
        assert_eq!((p.regs.c, p.regs.l), (0o100, 0));
    }

    #[test]
    fn test_transfer_program_characters() {
        let mut p = char_mode();
        load_program(&p, 0o100, &[op(0x3A, 3), (0o21 << 6) | 0o22, 0o23 << 6, 0]);
        p.regs.c = 0o100;
        p.regs.l = 1;
        execute(&mut p, op(0x3A, 3));
        assert_eq!(p.mem.peek(0o3000), chars(&[0o21, 0o22, 0o23]));
        assert_eq!((p.regs.c, p.regs.l), (0o100, 3));
    }

    #[test]
    fn test_cmn_and_cmx_round_trip() {
        let mut p = processor();
        p.regs.s = 0o1000;
        p.regs.f = 0o500;
        p.regs.c = 0o100;
        p.regs.l = 2;
        p.regs.a = DataDescriptor::new(0o3000, 0).encode();
        p.regs.b = DataDescriptor::new(0o2000, 0).encode();
        p.regs.arof = true;
        p.regs.brof = true;
        p.regs.t = CMN;
        p.execute_word_mode().unwrap();
        assert!(p.regs.cwmf);

        p.mem.store(0o2000, chars(&[0o31]));
        execute(&mut p, op(0x3D, 1));
        execute(&mut p, op(0x00, 1));
        assert!(!p.regs.cwmf);
        assert_eq!(p.mem.peek(0o3000), chars(&[0o31]));
        assert_eq!((p.regs.f, p.regs.s), (0o500, 0o1000));
        assert_eq!((p.regs.c, p.regs.l), (0o100, 2));
        assert!(!p.regs.arof && !p.regs.brof);
    }
}

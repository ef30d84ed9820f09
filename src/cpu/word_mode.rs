//! Word-mode operator dispatch.
//!
//! Literal, operand-call and descriptor-call syllables are handled directly;
//! operators are dispatched on their family (`T & 0x3F`) and then their
//! variant (`T >> 6`). Codes with no assigned operator do nothing.

use crate::cpu::arith::{DivideKind, Relation};
use crate::cpu::decode::Syllable;
use crate::cpu::registers::ADDRESS_MASK;
use crate::cpu::{Processor, ProcessorError};
use crate::word::control::{address_of, is_flagged, FLAG_BIT};
use crate::word::number::{EXPONENT_SIGN_BIT, MANTISSA_SIGN_BIT};
use crate::word::{bitfield, classify, Number, Word, WordClass, WORD_MASK};

const FLAG_MASK: Word = 1 << 47;
const INTEGER_OVERFLOW: u8 = 0xC0;

impl Processor {
    /// Execute the word-mode syllable in T.
    pub(crate) fn execute_word_mode(&mut self) -> Result<(), ProcessorError> {
        match Syllable::decode(self.regs.t) {
            Syllable::Literal(value) => {
                self.adjust_a_empty();
                self.regs.a = value as Word;
                self.regs.arof = true;
            }
            Syllable::OperandCall(offset) => {
                self.adjust_a_empty();
                self.regs.m = self.relative_address(offset, true);
                self.load_a_via_m();
                self.operand_call();
            }
            Syllable::DescriptorCall(offset) => {
                self.adjust_a_empty();
                self.regs.m = self.relative_address(offset, true);
                self.load_a_via_m();
                self.descriptor_call();
            }
            Syllable::Operator { family, variant } => self.word_operator(family, variant)?,
        }
        Ok(())
    }

    fn word_operator(&mut self, family: u8, variant: u8) -> Result<(), ProcessorError> {
        match family {
            0x01 => match variant {
                0x01 => self.single_add(true),
                0x03 => self.single_add(false),
                0x04 => self.single_multiply(),
                0x08 => self.single_divide(DivideKind::Floating),
                0x18 => self.single_divide(DivideKind::Integer),
                0x38 => self.single_divide(DivideKind::Remainder),
                _ => {}
            },
            0x05 => match variant {
                0x01 => self.double_add(true),
                0x03 => self.double_add(false),
                0x04 => self.double_multiply(),
                0x08 => self.double_divide(),
                _ => {}
            },
            0x09 => self.control_operator(variant)?,
            0x0D => self.logical_operator(variant),
            0x11 => match variant {
                0x01 => self.integer_store(true, true),
                0x02 => self.integer_store(true, false),
                0x04 => self.store(true),
                0x08 => self.store(false),
                0x10 => self.load(),
                0x21 => self.integer_store(false, true),
                0x22 => self.integer_store(false, false),
                _ => {}
            },
            0x15 => match variant {
                0x01 => self.relational(Relation::Geq),
                0x02 => self.relational(Relation::Gtr),
                0x04 => self.relational(Relation::Neq),
                0x21 => self.relational(Relation::Leq),
                0x22 => self.relational(Relation::Lss),
                0x24 => self.relational(Relation::Eql),
                0x08 => self.exchange_tos(),
                0x10 => self.duplicate(),
                0x20 => self.discard_top(),
                0x0C => self.field_transfer(18, 33),
                0x1C => self.field_transfer(18, 18),
                0x2C => self.field_transfer(33, 33),
                0x3C => self.field_transfer(33, 18),
                _ => {}
            },
            0x19 => match variant {
                0x04 => self.set_sign(Some(true)),
                0x24 => self.set_sign(Some(false)),
                0x08 => self.set_sign(None),
                0x10 => self.test_operand(),
                0x14 if !self.regs.ncsf => self.interrogate_unit_status(),
                0x34 if !self.regs.ncsf => self.interrogate_io_channel(),
                v if v & 0x03 != 0 => self.branch(v),
                _ => {}
            },
            0x1D => match variant {
                0x02 => self.return_value(false),
                0x04 => self.exit_procedure(),
                0x0A => self.return_value(true),
                _ => {}
            },
            0x21 => match variant {
                0x01 => self.index(),
                0x02 => self.construct_call(false),
                0x04 => self.mark_stack(),
                0x08 => self.construct_call(true),
                0x11 => self.set_store_frame(),
                0x24 => self.enter_char_mode_inline(),
                _ => {}
            },
            0x25 => {
                self.regs.g = (variant >> 3) & 7;
                self.regs.h = variant & 7;
            }
            0x29 => {
                self.regs.k = (variant >> 3) & 7;
                self.regs.v = variant & 7;
            }
            0x2D => self.transfer_bits(variant as u32),
            0x31 => self.field_compare(variant as u32, false),
            0x35 => self.field_compare(variant as u32, true),
            0x39 => self.isolate_field(variant as u32),
            _ => {}
        }
        Ok(())
    }

    /// Family 0x09. Most of these only act in control state.
    fn control_operator(&mut self, variant: u8) -> Result<(), ProcessorError> {
        let control = !self.regs.ncsf;
        match variant {
            0x01 => self.program_release(),
            0x08 => self.communicate(),
            0x14 => {
                if self.regs.halt_switch {
                    self.halt();
                }
            }
            0x18 => self.store_for_interrupt(false),
            0x02 if control => self.interrogate_interrupt(),
            0x04 if control => self.read_timer(),
            0x11 if control => self.io_release(),
            0x12 if control => self.halt_processor2(),
            0x1C if control => self.store_for_interrupt(true),
            0x21 if control => self.initiate(false)?,
            0x22 if control => self.initiate_processor2(),
            0x24 if control => self.initiate_io()?,
            0x29 if control => self.initiate(true)?,
            _ => {}
        }
        Ok(())
    }

    /// Family 0x0D. The flag bit of the result is B's, except for MOP and
    /// MDS which reset and set A's.
    fn logical_operator(&mut self, variant: u8) {
        match variant {
            0x01 => {
                self.adjust_a_full();
                self.regs.a = (!self.regs.a & !FLAG_MASK & WORD_MASK) | (self.regs.a & FLAG_MASK);
            }
            0x02 | 0x04 | 0x08 => {
                self.adjust_ab_full();
                let (a, b) = (self.regs.a, self.regs.b);
                let value = match variant {
                    0x02 => a | b,
                    0x04 => a & b,
                    _ => !(a ^ b),
                };
                self.regs.b = (value & !FLAG_MASK & WORD_MASK) | (b & FLAG_MASK);
                self.regs.arof = false;
            }
            0x10 => {
                self.adjust_a_full();
                self.regs.a &= !FLAG_MASK;
            }
            0x20 => {
                self.adjust_a_full();
                self.regs.a |= FLAG_MASK;
            }
            _ => {}
        }
    }

    /// Address named by A for a store or load. Returns `None` if A is an
    /// absent descriptor.
    fn store_address(&mut self) -> Option<u16> {
        if classify(self.regs.a) == WordClass::Operand {
            Some(self.relative_address((self.regs.a & 0x3FF) as u16, false))
        } else if self.presence_test(self.regs.a) {
            Some(address_of(self.regs.a))
        } else {
            None
        }
    }

    /// STD / SND: store B at the address in A. SND keeps B on the stack.
    fn store(&mut self, destructive: bool) {
        self.adjust_ab_full();
        let Some(address) = self.store_address() else {
            return;
        };
        self.regs.m = address;
        self.store_b_via_m();
        self.regs.arof = false;
        if destructive {
            self.regs.brof = false;
        }
    }

    /// ISD / ISN / CID / CIN: store B as an integer.
    ///
    /// The conditional forms only integerize when the word being replaced
    /// is itself an integer.
    fn integer_store(&mut self, conditional: bool, destructive: bool) {
        self.adjust_ab_full();
        let Some(address) = self.store_address() else {
            return;
        };
        self.regs.m = address;

        let integerize = if conditional {
            match self.fetch_word(address) {
                Some(current) => bitfield::isolate(current, EXPONENT_SIGN_BIT, 7) == 0,
                None => return,
            }
        } else {
            true
        };
        if integerize {
            match Number::extract(self.regs.b).integerize(true) {
                Some(value) => self.regs.b = Number::from_i64(value).compose(),
                None => {
                    self.syllable_interrupt(INTEGER_OVERFLOW);
                    return;
                }
            }
        }
        self.store_b_via_m();
        self.regs.arof = false;
        if destructive {
            self.regs.brof = false;
        }
    }

    /// LOD: replace the address in A by the word it names.
    fn load(&mut self) {
        self.adjust_a_full();
        let Some(address) = self.store_address() else {
            return;
        };
        self.regs.m = address;
        self.load_a_via_m();
    }

    /// DUP: leave copies of the top of stack in both A and B.
    fn duplicate(&mut self) {
        self.adjust_a_empty();
        self.adjust_b_full();
        self.regs.a = self.regs.b;
        self.regs.arof = true;
    }

    /// FTC, FTF, CTC, CTF: copy a 15-bit field of A into B.
    fn field_transfer(&mut self, from: u32, to: u32) {
        self.adjust_ab_full();
        self.regs.b = bitfield::transfer(self.regs.b, to, 15, self.regs.a, from);
        self.regs.arof = false;
    }

    /// SSN, SSP, CHS. `None` complements the sign.
    fn set_sign(&mut self, negative: Option<bool>) {
        self.adjust_a_full();
        let sign = negative.unwrap_or(!bitfield::bit(self.regs.a, MANTISSA_SIGN_BIT));
        self.regs.a = bitfield::set_bit(self.regs.a, MANTISSA_SIGN_BIT, sign);
    }

    /// TOP: push 1 if the top of stack is an operand, else 0.
    fn test_operand(&mut self) {
        self.adjust_a_full();
        let operand = !bitfield::bit(self.regs.a, FLAG_BIT);
        self.adjust_a_empty();
        self.regs.a = operand as Word;
        self.regs.arof = true;
    }

    /// Branch operators (family 0x19). Bit 0x10 selects word branches and
    /// bit 0x20 unconditional ones; the low bits give the direction, 1
    /// backward and 2 forward. A conditional branch is taken when B is
    /// false. A descriptor in A branches to its address.
    fn branch(&mut self, variant: u8) {
        let words = variant & 0x10 != 0;
        let conditional = variant & 0x20 == 0;
        let backward = variant & 0x03 == 0x01;

        if conditional {
            self.adjust_ab_full();
        } else {
            self.adjust_a_full();
        }
        let target = self.regs.a;
        let taken = !conditional || self.regs.b & 1 == 0;
        self.regs.arof = false;
        if conditional {
            self.regs.brof = false;
        }
        if !taken {
            return;
        }

        if is_flagged(target) {
            self.regs.c = address_of(target);
            self.regs.l = 0;
            self.regs.prof = false;
        } else if words {
            let count = (target & 0x3FF) as i32;
            // Word displacements count from the word holding the branch.
            let base = if self.regs.l == 0 { -1 } else { 0 };
            self.jump_words(base + if backward { -count } else { count });
        } else {
            let count = (target & 0xFFF) as i32;
            self.jump_syllables(if backward { -count } else { count });
        }
    }

    /// INX: add the index in A to the address field of B, leaving the
    /// result in A.
    fn index(&mut self) {
        self.adjust_ab_full();
        let address = (address_of(self.regs.a) as Word + address_of(self.regs.b) as Word) & ADDRESS_MASK as Word;
        self.regs.a = bitfield::insert(self.regs.b, 33, 15, address);
        self.regs.brof = false;
    }

    /// COC / CDC: exchange, flag the new top of stack, then call through it.
    fn construct_call(&mut self, descriptor: bool) {
        self.exchange_tos();
        self.regs.a |= FLAG_MASK;
        self.regs.brof = false;
        if descriptor {
            self.regs.m = address_of(self.regs.a);
            self.descriptor_call();
        } else {
            self.operand_call();
        }
    }

    /// SSF: read or set F or S through B, selected by A mod 4.
    fn set_store_frame(&mut self) {
        self.adjust_ab_full();
        match self.regs.a & 3 {
            0 => self.regs.b = bitfield::insert(self.regs.b, 18, 15, self.regs.f as Word),
            1 => {
                self.regs.f = bitfield::isolate(self.regs.b, 18, 15) as u16;
                self.regs.salf = true;
                self.regs.brof = false;
            }
            2 => self.regs.b = bitfield::insert(self.regs.b, 33, 15, self.regs.s as Word),
            _ => {
                self.regs.s = address_of(self.regs.b);
                self.regs.brof = false;
            }
        }
        self.regs.arof = false;
    }

    /// CMN: switch to character mode in line. A names the destination and
    /// B the source; a return word at the new F lets CMX come back.
    fn enter_char_mode_inline(&mut self) {
        self.adjust_ab_full();
        let destination = address_of(self.regs.a);
        let source = address_of(self.regs.b);
        self.regs.arof = false;
        self.regs.brof = false;

        let rcw = self.return_word(false).encode();
        self.push_control_word(rcw);
        self.regs.f = self.regs.s;

        self.regs.s = destination;
        self.regs.k = 0;
        self.regs.v = 0;
        self.regs.m = source;
        self.regs.g = 0;
        self.regs.h = 0;
        self.regs.x = 0;
        self.regs.cwmf = true;
    }

    /// Bit offsets selected by G/H (source) and K/V (destination).
    fn bit_positions(&self) -> (u32, u32) {
        let r = &self.regs;
        ((r.g as u32 * 6 + r.h as u32).min(48), (r.k as u32 * 6 + r.v as u32).min(48))
    }

    /// TRB: copy `count` bits of A at G/H into B at K/V.
    fn transfer_bits(&mut self, count: u32) {
        self.adjust_ab_full();
        let (from, to) = self.bit_positions();
        let width = count.min(48 - from).min(48 - to);
        if width > 0 {
            self.regs.b = bitfield::transfer(self.regs.b, to, width, self.regs.a, from);
        }
        self.regs.arof = false;
    }

    /// FCL / FCE: compare the field of B at K/V with the field of A at G/H.
    /// The truth value replaces A; B is kept.
    fn field_compare(&mut self, count: u32, equal: bool) {
        self.adjust_ab_full();
        let (from, to) = self.bit_positions();
        let width = count.min(48 - from).min(48 - to);
        let a = bitfield::isolate(self.regs.a, from, width);
        let b = bitfield::isolate(self.regs.b, to, width);
        let truth = if equal { b == a } else { b < a };
        self.regs.a = truth as Word;
    }

    /// ISO: isolate `count` bits of A starting at G/H and advance G/H past
    /// them.
    fn isolate_field(&mut self, count: u32) {
        self.adjust_a_full();
        let (from, _) = self.bit_positions();
        let width = count.min(48 - from);
        self.regs.a = bitfield::isolate(self.regs.a, from, width);
        let end = from + width;
        self.regs.g = ((end / 6) % 8) as u8;
        self.regs.h = (end % 6) as u8;
    }
}

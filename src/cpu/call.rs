//! Relative addressing, descriptor calls and subroutine linkage.
//!
//! Operand and descriptor calls fetch the word at a relative address into A
//! and act on what they find there: operands are used as they are, data
//! descriptors are indexed and followed, and program descriptors enter a
//! subroutine.
//!
//! A subroutine frame on the stack is a mark-stack word, the parameters,
//! and a return control word; F points at the return control word, whose
//! F field points back at the mark-stack word, whose F field holds the
//! caller's F.

use crate::cpu::registers::ADDRESS_MASK;
use crate::cpu::Processor;
use crate::word::control::{address_of, is_flagged, PRESENT_DATA_DESCRIPTOR};
use crate::word::{
    classify, insert, MarkStackWord, Number, ProgramDescriptor, ReturnWord, Word, WordClass,
};
use tracing::debug;

/// Interrupt codes.
const FLAG_BIT_INTERRUPT: u8 = 0x80;
const INVALID_INDEX: u8 = 0x90;

/// PRT cell that caches the last subroutine-level mark-stack word.
const MSCW_CELL: u16 = 7;
/// Longest mark-stack chain followed on return.
const CHAIN_LIMIT: usize = 1024;

impl Processor {
    /// Effective address of a 10-bit relative address.
    ///
    /// Outside subroutine level the address is PRT-relative. At subroutine
    /// level the top three bits select the base: PRT (0-3), F forward (4-5),
    /// C (6, when `c_enabled`, else F forward) or F backward (7).
    pub(crate) fn relative_address(&self, offset: u16, c_enabled: bool) -> u16 {
        let r = &self.regs;
        let offset = offset & 0x3FF;
        let address = if r.salf {
            match offset >> 7 {
                0..=3 => r.prt_base() + (offset & 0x1FF),
                4 | 5 => r.f.wrapping_add(offset & 0xFF),
                6 if c_enabled => {
                    let word = if r.l == 0 { r.c.wrapping_sub(1) } else { r.c };
                    word.wrapping_add(offset & 0x7F)
                }
                6 => r.f.wrapping_add(offset & 0xFF),
                _ => r.f.wrapping_sub(offset & 0x7F),
            }
        } else {
            r.prt_base() + offset
        };
        address & ADDRESS_MASK
    }

    /// Act on the word just loaded into A by an operand call.
    pub(crate) fn operand_call(&mut self) {
        match classify(self.regs.a) {
            WordClass::Operand | WordClass::Control => {}
            WordClass::DataDescriptor { present: true } => {
                if !self.index_if_sized() {
                    return;
                }
                self.regs.m = address_of(self.regs.a);
                self.load_a_via_m();
                if is_flagged(self.regs.a) && self.regs.ncsf {
                    self.syllable_interrupt(FLAG_BIT_INTERRUPT);
                }
            }
            WordClass::ProgramDescriptor { present: true } => self.enter_subroutine(false),
            WordClass::DataDescriptor { present: false } | WordClass::ProgramDescriptor { present: false } => {
                self.presence_test(self.regs.a);
            }
        }
    }

    /// Act on the word just loaded into A by a descriptor call. M still
    /// holds the address it came from.
    pub(crate) fn descriptor_call(&mut self) {
        match classify(self.regs.a) {
            WordClass::Operand => self.regs.a = PRESENT_DATA_DESCRIPTOR | self.regs.m as Word,
            WordClass::Control => {}
            WordClass::DataDescriptor { present: true } => {
                if self.index_if_sized() {
                    self.regs.a = insert(self.regs.a, 8, 10, 0);
                }
            }
            WordClass::ProgramDescriptor { present: true } => self.enter_subroutine(true),
            WordClass::DataDescriptor { present: false } | WordClass::ProgramDescriptor { present: false } => {
                self.presence_test(self.regs.a);
            }
        }
    }

    /// Index the data descriptor in A when it declares a word count.
    /// Returns false if indexing failed.
    fn index_if_sized(&mut self) -> bool {
        let word_count = crate::word::isolate(self.regs.a, 8, 10);
        if word_count != 0 && !self.regs.varf {
            self.index_descriptor(word_count)
        } else {
            true
        }
    }

    /// Add the index in B to the address of the descriptor in A.
    ///
    /// The index is rounded to an integer and must lie in `0..word_count`;
    /// otherwise invalid index is raised and A is left as it was.
    pub(crate) fn index_descriptor(&mut self, word_count: Word) -> bool {
        self.adjust_b_full();
        let index = Number::extract(self.regs.b).integerize(true);
        match index {
            Some(i) if i >= 0 && (i as Word) < word_count => {
                let address = (address_of(self.regs.a) as i64 + i) as Word & ADDRESS_MASK as Word;
                self.regs.a = insert(self.regs.a, 33, 15, address);
                self.regs.brof = false;
                true
            }
            _ => {
                self.syllable_interrupt(INVALID_INDEX);
                false
            }
        }
    }

    /// Build the mark-stack word for the current state.
    pub(crate) fn mark_stack_word(&self) -> MarkStackWord {
        MarkStackWord {
            r: self.regs.r,
            msff: self.regs.msff(),
            salf: self.regs.salf,
            f: self.regs.f,
        }
    }

    /// Build a return control word for the current state.
    pub(crate) fn return_word(&self, descriptor_call: bool) -> ReturnWord {
        let r = &self.regs;
        ReturnWord {
            descriptor_call,
            h: r.h,
            v: r.v,
            l: r.l,
            g: r.g,
            k: r.k,
            f: r.f,
            c: r.c,
        }
    }

    pub(crate) fn push_control_word(&mut self, word: Word) {
        self.regs.b = word;
        self.regs.brof = true;
        self.adjust_b_empty();
    }

    /// MKS: mark the stack ahead of pushing parameters.
    pub(crate) fn mark_stack(&mut self) {
        self.adjust_ab_empty();
        let mscw = self.mark_stack_word().encode();
        self.push_control_word(mscw);
        self.regs.f = self.regs.s;
        if !self.regs.msff() {
            if self.regs.salf {
                self.store_word(self.regs.prt_base() + MSCW_CELL, mscw);
            }
            self.regs.set_msff(true);
        }
    }

    /// Enter the subroutine whose program descriptor is in A.
    ///
    /// An argument-bearing descriptor needs a prior MKS, and a
    /// character-mode descriptor must take arguments; otherwise the
    /// descriptor is left on the stack.
    pub(crate) fn enter_subroutine(&mut self, descriptor_call: bool) {
        let Ok(pd) = ProgramDescriptor::decode(self.regs.a) else {
            return;
        };
        if (pd.arguments && !self.regs.msff()) || (pd.char_mode && !pd.arguments) {
            return;
        }

        self.adjust_b_empty();
        if !pd.arguments {
            let mscw = self.mark_stack_word().encode();
            self.push_control_word(mscw);
            self.regs.f = self.regs.s;
        }
        let rcw = self.return_word(descriptor_call).encode();
        self.push_control_word(rcw);
        self.regs.f = self.regs.s;

        debug!(processor = %self.id, from = self.regs.c, to = pd.address, char_mode = pd.char_mode, "enter subroutine");
        self.regs.c = pd.address;
        self.regs.l = 0;
        self.regs.prof = false;
        self.regs.arof = false;
        self.regs.salf = true;
        self.regs.set_msff(false);
        if pd.char_mode {
            self.regs.cwmf = true;
            self.regs.x = 0;
        }
    }

    /// Leave the current subroutine through the return control word at F.
    ///
    /// `inline` keeps C and L where they are. Returns false, after raising
    /// the flag-bit interrupt, if F does not address a control word.
    pub(crate) fn exit_subroutine(&mut self, inline: bool) -> bool {
        self.exit_through(self.regs.f, inline)
    }

    /// Leave through the return control word at `rcw_address`.
    pub(crate) fn exit_through(&mut self, rcw_address: u16, inline: bool) -> bool {
        self.regs.s = rcw_address;
        let Some(word) = self.fetch_word(self.regs.s) else {
            return false;
        };
        let rcw = match ReturnWord::decode(word) {
            Ok(rcw) => rcw,
            Err(_) => {
                self.regs.b = word;
                self.regs.brof = true;
                self.syllable_interrupt(FLAG_BIT_INTERRUPT);
                return false;
            }
        };

        if !inline {
            self.regs.c = rcw.c;
            self.regs.l = rcw.l;
            self.regs.prof = false;
        }
        self.regs.f = rcw.f;
        self.regs.k = rcw.k;
        self.regs.g = rcw.g;
        self.regs.v = rcw.v;
        self.regs.h = rcw.h;

        self.regs.s = self.regs.f;
        if let Some(word) = self.fetch_word(self.regs.s) {
            let mscw = MarkStackWord::unpack(word);
            self.regs.f = mscw.f;
            self.regs.r = mscw.r;
            self.regs.set_msff(mscw.msff);
            self.regs.salf = mscw.salf;
            if mscw.msff && mscw.salf {
                self.cache_outer_mark(mscw.f);
            }
        }

        self.regs.s = rcw.f.wrapping_sub(1) & ADDRESS_MASK;
        self.regs.brof = false;
        debug!(processor = %self.id, to = self.regs.c, "exit subroutine");
        true
    }

    /// Follow the mark-stack chain from `link` to the first word with both
    /// MSFF and SALF clear and cache it in the PRT.
    fn cache_outer_mark(&mut self, mut link: u16) {
        for _ in 0..CHAIN_LIMIT {
            let Some(word) = self.fetch_word(link) else {
                return;
            };
            let mscw = MarkStackWord::unpack(word);
            if !mscw.msff && !mscw.salf {
                self.store_word(self.regs.prt_base() + MSCW_CELL, word);
                return;
            }
            link = mscw.f;
        }
    }

    /// RTN / RTS: return with the value in A.
    pub(crate) fn return_value(&mut self, special: bool) {
        self.adjust_a_full();
        let rcw_address = if special { self.regs.s } else { self.regs.f };
        self.exit_through(rcw_address, false);
    }

    /// XIT: return without a value.
    pub(crate) fn exit_procedure(&mut self) {
        self.regs.arof = false;
        if self.exit_subroutine(false) {
            self.regs.brof = false;
        }
    }
}

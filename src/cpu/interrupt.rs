//! Interrupts, context save and restore, and the control-state operators.
//!
//! A fault sets bits in the processor's I register and signals Central
//! Control; nothing else happens until SECL, where a pending interrupt in
//! normal state becomes a store-for-interrupt. That pushes the processor's
//! context as control words and drops into control state. Initiate pops the
//! same words back.
//!
//! Saved context, from the top of stack down:
//!
//! ```text
//! ICW    interrupt control word        VARF CWMF R MSFF SALF N AROF BROF M
//! IRCW   return control word           C L F G H K V
//! ILCW   loop control word (char mode) X
//! DAW    destination address (char mode) S K V tally
//! A, B   if they were full (word mode)
//! ```
//!
//! and an initiate control word holding the final S is left in PRT cell 8.

use crate::control::{lock, ProcessorId};
use crate::cpu::decode::ITI;
use crate::cpu::execute::ProcessorState;
use crate::cpu::{Processor, ProcessorError};
use crate::io::{self, IoError};
use crate::machine::P2Command;
use crate::word::control::{address_of, CONTROL_TAG, PRESENCE_BIT};
use crate::word::{
    bitfield, classify, InitiateWord, InterruptLoopWord, InterruptWord, IoDescriptor, ReturnWord,
    Word, WordClass,
};
use tracing::{debug, warn};

/// PRT cell holding the initiate control word.
const INCW_CELL: u16 = 8;
/// PRT cell for the communicate and program-release argument.
const COMMUNICATE_CELL: u16 = 9;
/// Absolute cell holding the I/O descriptor for IIO and the INCW for IP2.
const IO_DESCRIPTOR_CELL: u16 = 8;
/// Stack base after interrogate interrupt.
const INTERRUPT_STACK: u16 = 0x40;

const PRESENCE_INTERRUPT: u8 = 0x70;
const COMMUNICATE: u8 = 0x40;
const PROGRAM_RELEASE: u8 = 0x50;

impl Processor {
    /// Report the I register to Central Control. Only normal-state
    /// interrupts are delivered.
    pub(crate) fn signal_interrupt(&mut self) {
        if self.regs.ncsf {
            lock(&self.control).signal_interrupt(self.id, self.regs.i);
        }
    }

    /// Raise a syllable-dependent interrupt, replacing any earlier one.
    pub(crate) fn syllable_interrupt(&mut self, code: u8) {
        if self.regs.ncsf {
            self.regs.i = (self.regs.i & 0x0F) | code;
            self.signal_interrupt();
        }
    }

    /// True if `word` is present; otherwise raises the presence-bit
    /// interrupt in normal state.
    pub(crate) fn presence_test(&mut self, word: Word) -> bool {
        if bitfield::bit(word, PRESENCE_BIT) {
            return true;
        }
        if self.regs.ncsf {
            self.syllable_interrupt(PRESENCE_INTERRUPT);
        }
        false
    }

    /// Store the processor's context for an interrupt and enter control
    /// state.
    ///
    /// With `for_test` the top of stack is a descriptor naming where
    /// processor 1 continues; otherwise processor 1 goes on to interrogate
    /// the interrupt. Processor 2 stops once its context is stored.
    pub(crate) fn store_for_interrupt(&mut self, for_test: bool) {
        let mut resume = 0;
        if for_test {
            self.adjust_a_full();
            resume = address_of(self.regs.a);
            self.regs.arof = false;
        }

        let saved_arof = self.regs.arof;
        let saved_brof = self.regs.brof;
        self.regs.ncsf = false;

        if self.regs.cwmf {
            self.flush_destination();
            self.regs.arof = false;
            let daw = self.destination_word();
            self.regs.s = self.regs.f;
            self.push_control_word(daw);
            let ilcw = InterruptLoopWord { x: self.regs.x }.encode();
            self.push_control_word(ilcw);
        } else {
            self.adjust_ab_empty();
        }

        let ircw = self.return_word(false).encode();
        self.push_control_word(ircw);
        let icw = InterruptWord {
            varf: self.regs.varf,
            cwmf: self.regs.cwmf,
            r: self.regs.r,
            msff: self.regs.msff(),
            salf: self.regs.salf,
            n: self.regs.n,
            arof: saved_arof,
            brof: saved_brof,
            m: self.regs.m,
        }
        .encode();
        self.push_control_word(icw);
        let incw = InitiateWord { s: self.regs.s }.encode();
        self.store_word(self.regs.prt_base() + INCW_CELL, incw);

        debug!(processor = %self.id, c = self.regs.c, s = self.regs.s, for_test, "store for interrupt");

        self.regs.r = 0;
        self.regs.m = 0;
        self.regs.set_msff(false);
        self.regs.salf = false;
        self.regs.arof = false;
        self.regs.brof = false;
        self.regs.cwmf = false;

        match self.id {
            ProcessorId::P1 => {
                if for_test {
                    self.regs.c = resume;
                    self.regs.l = 0;
                    self.regs.prof = false;
                } else {
                    self.regs.t = ITI;
                    self.regs.trof = true;
                }
            }
            ProcessorId::P2 => {
                {
                    let mut cc = lock(&self.control);
                    cc.p2bf = false;
                    cc.hp2f = false;
                }
                self.state = ProcessorState::Halted;
            }
        }
    }

    /// The character-mode destination state as a stack word.
    fn destination_word(&self) -> Word {
        let r = &self.regs;
        let mut w = bitfield::insert(CONTROL_TAG, 33, 15, r.s as Word);
        w = bitfield::insert(w, 30, 3, r.k as Word);
        w = bitfield::insert(w, 27, 3, r.v as Word);
        bitfield::insert(w, 21, 6, r.tally as Word)
    }

    fn restore_destination(&mut self, w: Word) {
        self.regs.s = address_of(w);
        self.regs.k = bitfield::isolate(w, 30, 3) as u8;
        self.regs.v = bitfield::isolate(w, 27, 3) as u8;
        self.regs.tally = bitfield::isolate(w, 21, 6) as u8;
    }

    fn pop_word(&mut self) -> Word {
        let s = self.regs.s;
        let word = self.fetch_word(s).unwrap_or_else(|| {
            warn!(processor = %self.id, s, "memory fault reading stored context, using zero");
            0
        });
        self.decrement_s();
        word
    }

    /// Restore the context stored by [`Processor::store_for_interrupt`].
    /// The initiate control word is in A.
    ///
    /// `for_test` leaves the processor in control state.
    pub(crate) fn initiate(&mut self, for_test: bool) -> Result<(), ProcessorError> {
        self.adjust_a_full();
        let incw = InitiateWord::decode(self.regs.a)?;
        self.regs.arof = false;
        self.regs.s = incw.s;

        let icw = InterruptWord::decode(self.pop_word())?;
        let ircw = ReturnWord::decode(self.pop_word())?;

        self.regs.varf = icw.varf;
        self.regs.cwmf = icw.cwmf;
        self.regs.r = icw.r;
        self.regs.set_msff(icw.msff);
        self.regs.salf = icw.salf;
        self.regs.n = icw.n;
        self.regs.m = icw.m;

        self.regs.c = ircw.c;
        self.regs.l = ircw.l;
        self.regs.f = ircw.f;
        self.regs.g = ircw.g;
        self.regs.h = ircw.h;
        self.regs.k = ircw.k;
        self.regs.v = ircw.v;

        self.regs.arof = false;
        self.regs.brof = false;
        if icw.cwmf {
            let ilcw = InterruptLoopWord::decode(self.pop_word())?;
            self.regs.x = ilcw.x;
            let daw = self.pop_word();
            self.restore_destination(daw);
        } else {
            if icw.arof {
                self.pop_a();
            }
            if icw.brof {
                self.pop_b();
            }
        }

        self.regs.ncsf = !for_test;
        if !for_test {
            self.regs.i = 0;
        }
        self.regs.prof = false;
        self.regs.trof = false;
        debug!(processor = %self.id, c = self.regs.c, l = self.regs.l, for_test, "initiate");
        Ok(())
    }

    /// Start processor 2 from the initiate control word in cell 8.
    pub fn initiate_p2(&mut self) -> Result<(), ProcessorError> {
        self.regs.a = self.mem.peek(IO_DESCRIPTOR_CELL);
        self.regs.arof = true;
        self.regs.brof = false;
        self.initiate(false)?;
        self.start();
        Ok(())
    }

    // ==================== Control-state operators ====================

    /// ITI: branch to the highest-priority interrupt's vector.
    pub(crate) fn interrogate_interrupt(&mut self) {
        let mut cc = lock(&self.control);
        let iar = cc.iar;
        if iar == 0 {
            return;
        }
        cc.clear_interrupt();
        if self.id == ProcessorId::P1 {
            self.regs.i = cc.p1_i;
        }
        drop(cc);
        debug!(processor = %self.id, vector = iar, "interrogate interrupt");
        self.regs.c = iar as u16;
        self.regs.l = 0;
        self.regs.s = INTERRUPT_STACK;
        self.regs.prof = false;
    }

    /// IP2: hand the initiate control word in A to processor 2.
    pub(crate) fn initiate_processor2(&mut self) {
        self.adjust_a_full();
        self.store_word(IO_DESCRIPTOR_CELL, self.regs.a);
        self.regs.arof = false;

        let mut cc = lock(&self.control);
        let sent = !cc.p2bf
            && self
                .p2_link
                .as_ref()
                .is_some_and(|link| link.send(P2Command::Initiate).is_ok());
        if sent {
            cc.p2bf = true;
        } else {
            cc.cci12f = true;
            cc.update_iar();
        }
    }

    /// HP2: ask a busy processor 2 to stop at its next syllable boundary.
    pub(crate) fn halt_processor2(&mut self) {
        let mut cc = lock(&self.control);
        if cc.p2bf {
            cc.hp2f = true;
        }
    }

    /// IIO: start the I/O described by the word in cell 8.
    ///
    /// With every channel busy the I/O-busy interrupt is raised instead.
    pub(crate) fn initiate_io(&mut self) -> Result<(), ProcessorError> {
        let word = self.mem.peek(IO_DESCRIPTOR_CELL);
        let request = IoDescriptor::decode(word).map_err(|_| {
            warn!(processor = %self.id, word, "malformed I/O descriptor");
            IoError::MalformedDescriptor(word)
        })?;

        let channel = {
            let mut cc = lock(&self.control);
            let channel = cc.interrogate_io_channel();
            if channel == 0 {
                cc.cci04f = true;
                cc.update_iar();
                return Ok(());
            }
            cc.set_channel_busy(channel, true);
            channel
        };
        debug!(processor = %self.id, channel, unit = request.unit, address = request.address, "initiate I/O");
        io::lock(&self.io).initiate_io(channel, request)?;
        Ok(())
    }

    /// TIO: push the number of a free channel, 0 if none.
    pub(crate) fn interrogate_io_channel(&mut self) {
        self.adjust_a_empty();
        self.regs.a = lock(&self.control).interrogate_io_channel() as Word;
        self.regs.arof = true;
    }

    /// TUS: push the unit ready mask.
    pub(crate) fn interrogate_unit_status(&mut self) {
        self.adjust_a_empty();
        self.regs.a = io::lock(&self.io).interrogate_unit_status() & crate::word::number::MANTISSA_MASK;
        self.regs.arof = true;
    }

    /// RTR: push the real-time clock.
    pub(crate) fn read_timer(&mut self) {
        self.adjust_a_empty();
        self.regs.a = lock(&self.control).read_timer() as Word;
        self.regs.arof = true;
    }

    /// COM: leave the argument in A for the executive and interrupt.
    pub(crate) fn communicate(&mut self) {
        if !self.regs.ncsf {
            return;
        }
        self.adjust_a_full();
        self.store_word(self.regs.prt_base() + COMMUNICATE_CELL, self.regs.a);
        self.regs.arof = false;
        self.syllable_interrupt(COMMUNICATE);
    }

    /// Address named by the top of stack: an operand is a relative
    /// address, a descriptor carries its own.
    fn top_address(&mut self) -> u16 {
        self.adjust_a_full();
        if classify(self.regs.a) == WordClass::Operand {
            self.relative_address((self.regs.a & 0x3FF) as u16, false)
        } else {
            address_of(self.regs.a)
        }
    }

    /// PRL: program release. In normal state the argument goes to the
    /// executive; in control state the descriptor it names is made absent.
    pub(crate) fn program_release(&mut self) {
        if self.regs.ncsf {
            self.adjust_a_full();
            self.store_word(self.regs.prt_base() + COMMUNICATE_CELL, self.regs.a);
            self.regs.arof = false;
            self.syllable_interrupt(PROGRAM_RELEASE);
        } else {
            let address = self.top_address();
            self.set_presence(address, false);
            self.regs.arof = false;
        }
    }

    /// IOR: I/O release. Marks the descriptor named by A present.
    pub(crate) fn io_release(&mut self) {
        let address = self.top_address();
        self.set_presence(address, true);
        self.regs.arof = false;
    }

    fn set_presence(&mut self, address: u16, present: bool) {
        if let Some(word) = self.fetch_word(address) {
            self.store_word(address, bitfield::set_bit(word, PRESENCE_BIT, present));
        }
    }
}

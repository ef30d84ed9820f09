//! The execution driver.
//!
//! A [`Processor`] executes one syllable at a time. After every syllable it
//! reaches SECL (syllable execution complete): pending interrupts are polled
//! there and, if one is due in normal state, a store-for-interrupt is
//! synthesized in place of the next syllable. Otherwise the next syllable is
//! fetched from P, reloading P from memory when it is stale.

use crate::control::{lock, CentralControl, ProcessorId};
use crate::cpu::decode::{self, SFI};
use crate::cpu::double::{DoublePrecisionPolicy, StackRearrangement};
use crate::cpu::registers::{Registers, ADDRESS_MASK};
use crate::cpu::Memory;
use crate::io::{self, IoError, SharedIo, RESULT_BASE};
use crate::machine::P2Command;
use crate::word::{bitfield, DecodeError, RoundingMode};
use serde::{Serialize, Deserialize};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Processor execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorState {
    /// Executing syllables.
    Running,
    /// Stopped: not started, operator halt, or halted by the other processor.
    Halted,
}

/// Conditions the emulator cannot express as a machine interrupt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("processor not running (state: {0:?})")]
    NotRunning(ProcessorState),

    #[error("cycle budget must be at least one syllable")]
    ZeroBudget,

    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("corrupt control word: {0}")]
    Decode(#[from] DecodeError),
}

/// One central processor.
pub struct Processor {
    pub id: ProcessorId,
    pub regs: Registers,
    pub state: ProcessorState,
    /// Syllables executed since creation.
    pub cycles: u64,
    pub(crate) mem: Arc<Memory>,
    pub(crate) control: Arc<Mutex<CentralControl>>,
    pub(crate) io: SharedIo,
    pub(crate) rounding: RoundingMode,
    pub(crate) double: Arc<dyn DoublePrecisionPolicy>,
    /// Command channel to processor 2, held by processor 1.
    pub(crate) p2_link: Option<Sender<P2Command>>,
    /// Repeat count for the next character-mode syllable, set by CRF.
    pub(crate) repeat_override: Option<u8>,
}

impl Processor {
    /// Create a halted processor with cleared registers.
    pub fn new(id: ProcessorId, mem: Arc<Memory>, control: Arc<Mutex<CentralControl>>, io: SharedIo) -> Self {
        Self {
            id,
            regs: Registers::new(),
            state: ProcessorState::Halted,
            cycles: 0,
            mem,
            control,
            io,
            rounding: RoundingMode::default(),
            double: Arc::new(StackRearrangement),
            p2_link: None,
            repeat_override: None,
        }
    }

    /// Select legacy or emode rounding.
    pub fn with_rounding(mut self, rounding: RoundingMode) -> Self {
        self.rounding = rounding;
        self
    }

    /// Replace the double-precision implementation.
    pub fn with_double_precision(mut self, policy: Arc<dyn DoublePrecisionPolicy>) -> Self {
        self.double = policy;
        self
    }

    pub(crate) fn set_p2_link(&mut self, link: Sender<P2Command>) {
        self.p2_link = Some(link);
    }

    pub fn rounding(&self) -> RoundingMode {
        self.rounding
    }

    /// Shared memory this processor addresses.
    pub fn memory(&self) -> &Arc<Memory> {
        &self.mem
    }

    /// Snapshot of Central Control.
    pub fn central_control(&self) -> CentralControl {
        lock(&self.control).clone()
    }

    /// Clear all registers.
    pub fn clear(&mut self) {
        self.regs.reset();
        self.repeat_override = None;
    }

    /// Cold-start: clear, then load the first syllable of the word at
    /// `address`. The processor is left in control state; call
    /// [`Processor::start`] to run it.
    pub fn preset(&mut self, address: u16) {
        self.clear();
        self.regs.c = address & ADDRESS_MASK;
        self.load_p_via_c();
        self.regs.t = bitfield::isolate(self.regs.p, 0, 12) as u16;
        self.regs.l = 1;
        self.regs.trof = true;
        self.regs.r = 0;
        self.regs.s = 0;
        debug!(processor = %self.id, address, "preset");
    }

    /// Mark the processor running (and busy, for processor 2).
    pub fn start(&mut self) {
        self.state = ProcessorState::Running;
        self.regs.hltf = false;
        if self.id == ProcessorId::P2 {
            lock(&self.control).p2bf = true;
        }
    }

    /// Stop the processor at the current syllable boundary.
    pub fn stop(&mut self) {
        self.state = ProcessorState::Halted;
        if self.id == ProcessorId::P2 {
            lock(&self.control).p2bf = false;
        }
    }

    /// Operator halt.
    pub fn halt(&mut self) {
        self.regs.hltf = true;
        self.stop();
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == ProcessorState::Running
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.state == ProcessorState::Halted
    }

    /// Execute one syllable and complete it at SECL.
    ///
    /// Returns the syllable that was executed.
    pub fn step(&mut self) -> Result<u16, ProcessorError> {
        if self.state != ProcessorState::Running {
            return Err(ProcessorError::NotRunning(self.state));
        }
        if !self.regs.trof {
            self.fetch_next_syllable();
        }

        let t = self.regs.t;
        self.regs.trof = false;
        trace!(
            processor = %self.id,
            c = self.regs.c,
            l = self.regs.l,
            t,
            op = %decode::disassemble(t, self.regs.cwmf),
            "execute"
        );

        let result = if self.regs.cwmf {
            self.execute_char_mode()
        } else {
            self.execute_word_mode()
        };
        self.cycles += 1;

        if let Err(e) = result {
            warn!(processor = %self.id, c = self.regs.c, t, error = %e, "processor stopped");
            self.stop();
            return Err(e);
        }

        if self.state == ProcessorState::Running {
            self.secl();
        }
        Ok(t)
    }

    /// Run for at most `budget` syllables, or until halted.
    ///
    /// Returns the number of syllables executed.
    pub fn run(&mut self, budget: u64) -> Result<u64, ProcessorError> {
        if budget == 0 {
            return Err(ProcessorError::ZeroBudget);
        }
        if self.state != ProcessorState::Running {
            return Err(ProcessorError::NotRunning(self.state));
        }
        let start = self.cycles;
        while self.state == ProcessorState::Running && self.cycles - start < budget {
            self.step()?;
        }
        Ok(self.cycles - start)
    }

    /// Syllable execution complete: poll interrupts, then fetch.
    fn secl(&mut self) {
        if self.id == ProcessorId::P1 {
            self.service_io();
        }

        let pending = {
            let cc = lock(&self.control);
            match self.id {
                ProcessorId::P1 => cc.iar != 0,
                ProcessorId::P2 => self.regs.i != 0 || cc.hp2f,
            }
        };
        if pending && self.regs.ncsf {
            self.regs.t = SFI;
            self.store_for_interrupt(false);
        }

        if self.state == ProcessorState::Running && !self.regs.trof {
            self.fetch_next_syllable();
        }
    }

    /// Load T with the syllable at C/L and advance C/L.
    pub(crate) fn fetch_next_syllable(&mut self) {
        if !self.regs.prof {
            self.load_p_via_c();
        }
        let l = self.regs.l as u32 & 3;
        self.regs.t = bitfield::isolate(self.regs.p, l * 12, 12) as u16;
        self.regs.trof = true;
        if l == 3 {
            self.regs.l = 0;
            self.regs.c = self.regs.c.wrapping_add(1) & ADDRESS_MASK;
            self.regs.prof = false;
        } else {
            self.regs.l += 1;
        }
    }

    /// Move the syllable pointer by `count` syllables (negative is backward).
    pub(crate) fn jump_syllables(&mut self, count: i32) {
        let target = (self.regs.syllable_address() as i32 + count) & 0x1FFFF;
        self.regs.c = ((target >> 2) as u16) & ADDRESS_MASK;
        self.regs.l = (target & 3) as u8;
        self.regs.prof = false;
    }

    /// Move to the first syllable of the word `count` words away.
    pub(crate) fn jump_words(&mut self, count: i32) {
        self.regs.c = ((self.regs.c as i32 + count) & ADDRESS_MASK as i32) as u16;
        self.regs.l = 0;
        self.regs.prof = false;
    }

    /// Deliver finished I/O: leave each result descriptor in its channel's
    /// cell and raise the I/O-finished interrupt.
    fn service_io(&mut self) {
        let done = io::lock(&self.io).poll();
        for completion in done {
            let cell = RESULT_BASE + completion.channel.saturating_sub(1) as u16;
            self.mem.store(cell, completion.result);
            lock(&self.control).io_finished(completion.channel);
            debug!(channel = completion.channel, result = completion.result, "I/O finished");
        }
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{ADD, LBU, MUL, ZPI};
    use crate::cpu::testing::{lit, load_program, processor};
    use crate::word::Number;

    #[test]
    fn test_new_processor_is_halted() {
        let mut p = processor();
        assert!(p.is_halted());
        assert_eq!(p.step(), Err(ProcessorError::NotRunning(ProcessorState::Halted)));
        assert_eq!(p.run(10), Err(ProcessorError::NotRunning(ProcessorState::Halted)));
    }

    #[test]
    fn test_zero_budget_is_rejected() {
        let mut p = processor();
        p.start();
        assert_eq!(p.run(0), Err(ProcessorError::ZeroBudget));
    }

    #[test]
    fn test_preset_loads_first_syllable() {
        let mut p = processor();
        load_program(&p, 0o100, &[lit(7), lit(1), lit(2), lit(3), lit(4)]);
        p.preset(0o100);
        assert_eq!(p.regs.t, lit(7));
        assert_eq!(p.regs.l, 1);
        assert_eq!(p.regs.c, 0o100);
        assert!(p.regs.trof);
        assert!(!p.regs.ncsf);
    }

    #[test]
    fn test_syllables_advance_across_words() {
        let mut p = processor();
        load_program(&p, 0o100, &[lit(1), lit(2), lit(3), lit(4), lit(5)]);
        p.preset(0o100);
        p.start();
        for _ in 0..4 {
            p.step().unwrap();
        }
        assert_eq!(p.regs.c, 0o101);
        assert_eq!(p.regs.l, 1);
        assert_eq!(p.regs.t, lit(5));
    }

    #[test]
    fn test_multiply_program() {
        let mut p = processor();
        load_program(&p, 0o100, &[lit(2), lit(3), MUL, ZPI]);
        p.regs.halt_switch = true;
        p.preset(0o100);
        p.regs.s = 0o1000;
        p.start();
        let executed = p.run(100).unwrap();
        assert_eq!(executed, 4);
        assert!(p.is_halted());
        assert!(p.regs.brof);
        assert_eq!(p.regs.b, Number::from_i64(6).compose());
    }

    #[test]
    fn test_run_respects_budget() {
        let mut p = processor();
        // LBU 0 branches back to the start of the current word.
        load_program(&p, 0o100, &[lit(0), LBU, 0, 0]);
        p.preset(0o100);
        p.regs.s = 0o1000;
        p.start();
        assert_eq!(p.run(25).unwrap(), 25);
        assert!(p.is_running());
        assert_eq!(p.regs.s, 0o1000);
    }

    #[test]
    fn test_jump_syllables_wraps_words() {
        let mut p = processor();
        p.regs.c = 0o100;
        p.regs.l = 3;
        p.regs.prof = true;
        p.jump_syllables(2);
        assert_eq!((p.regs.c, p.regs.l), (0o101, 1));
        assert!(!p.regs.prof);
        p.jump_syllables(-6);
        assert_eq!((p.regs.c, p.regs.l), (0o77, 3));
    }

    #[test]
    fn test_interrupt_pending_in_control_state_is_ignored() {
        let mut p = processor();
        load_program(&p, 0o100, &[lit(1), lit(2), ADD, lit(3)]);
        p.preset(0o100);
        p.regs.s = 0o1000;
        lock(&p.control).cci05f = true;
        lock(&p.control).update_iar();
        p.start();
        p.run(3).unwrap();
        assert_eq!(p.regs.t, lit(3));
        assert!(!p.regs.ncsf);
    }
}

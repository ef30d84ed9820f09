//! Central Control: interrupt requests, the interrupt address register,
//! I/O channel busy flags, the real-time clock and processor 2 control.
//!
//! One instance is shared by both processors behind a mutex. The pending
//! interrupt with the highest priority is always available in `iar`, which
//! is the address of its interrupt vector cell.

use serde::{Serialize, Deserialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Number of I/O channels.
pub const CHANNELS: usize = 4;

/// Which physical processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorId {
    P1,
    P2,
}

impl std::fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessorId::P1 => write!(f, "P1"),
            ProcessorId::P2 => write!(f, "P2"),
        }
    }
}

/// Shared interrupt and coordination state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CentralControl {
    /// Vector address of the highest-priority pending interrupt, 0 if none.
    pub iar: u8,

    /// Real-time clock interrupt.
    pub cci03f: bool,
    /// I/O busy.
    pub cci04f: bool,
    /// Keyboard request.
    pub cci05f: bool,
    /// Printer 1 finished.
    pub cci06f: bool,
    /// Printer 2 finished.
    pub cci07f: bool,
    /// I/O finished on channels 1 to 4.
    pub cci08f: bool,
    pub cci09f: bool,
    pub cci10f: bool,
    pub cci11f: bool,
    /// Processor 2 busy.
    pub cci12f: bool,
    /// Inquiry request.
    pub cci13f: bool,
    /// Special interrupt 1.
    pub cci14f: bool,
    /// Disk file 1 read check finished.
    pub cci15f: bool,
    /// Disk file 2 read check finished.
    pub cci16f: bool,

    /// Interrupt code registers last reported by each processor.
    pub p1_i: u8,
    pub p2_i: u8,

    pub channel_busy: [bool; CHANNELS],
    /// Real-time clock, counts 0..63.
    pub rtc: u8,

    /// Halt processor 2 requested.
    pub hp2f: bool,
    /// Processor 2 busy.
    pub p2bf: bool,
    /// Processor 2 installed.
    pub p2_present: bool,
}

impl CentralControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processor's interrupt code and recompute the IAR.
    pub fn signal_interrupt(&mut self, id: ProcessorId, code: u8) -> u8 {
        match id {
            ProcessorId::P1 => self.p1_i = code,
            ProcessorId::P2 => self.p2_i = code,
        }
        self.update_iar();
        debug!(processor = %id, code, iar = self.iar, "interrupt signalled");
        self.iar
    }

    /// Recompute the IAR from the request flags, in hardware priority order.
    pub fn update_iar(&mut self) -> u8 {
        let p1 = self.p1_i;
        let p2 = self.p2_i;
        self.iar = if p1 & 0x01 != 0 {
            0x30 // P1 memory parity
        } else if p1 & 0x02 != 0 {
            0x31 // P1 invalid address
        } else if self.cci03f {
            0x12 // real-time clock
        } else if self.cci04f {
            0x13 // I/O busy
        } else if self.cci05f {
            0x14 // keyboard request
        } else if self.cci08f {
            0x17
        } else if self.cci09f {
            0x18
        } else if self.cci10f {
            0x19
        } else if self.cci11f {
            0x1A
        } else if self.cci06f {
            0x15
        } else if self.cci07f {
            0x16
        } else if self.cci12f {
            0x1B
        } else if self.cci13f {
            0x1C
        } else if self.cci14f {
            0x1D
        } else if self.cci15f {
            0x1E
        } else if self.cci16f {
            0x1F
        } else if p1 & 0x04 != 0 {
            0x32 // P1 stack overflow
        } else if p1 & 0xF0 != 0 {
            (p1 >> 4) + 0x30 // P1 syllable-dependent
        } else if p2 & 0x01 != 0 {
            0x20
        } else if p2 & 0x02 != 0 {
            0x21
        } else if p2 & 0x04 != 0 {
            0x22
        } else if p2 & 0xF0 != 0 {
            (p2 >> 4) + 0x20
        } else {
            0
        };
        self.iar
    }

    /// Clear the request behind the current IAR and recompute it.
    pub fn clear_interrupt(&mut self) -> u8 {
        match self.iar {
            0x12 => self.cci03f = false,
            0x13 => self.cci04f = false,
            0x14 => self.cci05f = false,
            0x15 => self.cci06f = false,
            0x16 => self.cci07f = false,
            0x17 => self.cci08f = false,
            0x18 => self.cci09f = false,
            0x19 => self.cci10f = false,
            0x1A => self.cci11f = false,
            0x1B => self.cci12f = false,
            0x1C => self.cci13f = false,
            0x1D => self.cci14f = false,
            0x1E => self.cci15f = false,
            0x1F => self.cci16f = false,
            0x20 => self.p2_i &= !0x01,
            0x21 => self.p2_i &= !0x02,
            0x22 => self.p2_i &= !0x04,
            0x24..=0x2F => self.p2_i &= 0x0F,
            0x30 => self.p1_i &= !0x01,
            0x31 => self.p1_i &= !0x02,
            0x32 => self.p1_i &= !0x04,
            0x34..=0x3F => self.p1_i &= 0x0F,
            _ => {}
        }
        self.update_iar()
    }

    /// Advance the real-time clock one tick. Wrapping to zero requests the
    /// clock interrupt.
    pub fn tick(&mut self) {
        self.rtc = (self.rtc + 1) & 0x3F;
        if self.rtc == 0 {
            self.cci03f = true;
            self.update_iar();
        }
    }

    /// The clock as read by the read-timer operator: the count, plus 64 if
    /// the clock interrupt is still pending.
    pub fn read_timer(&self) -> u8 {
        self.rtc | if self.cci03f { 0x40 } else { 0 }
    }

    /// Number (1..=4) of the first idle channel, or 0 if all are busy.
    pub fn interrogate_io_channel(&self) -> u8 {
        self.channel_busy
            .iter()
            .position(|busy| !busy)
            .map_or(0, |i| i as u8 + 1)
    }

    /// Mark a channel (1..=4) busy or idle.
    pub fn set_channel_busy(&mut self, channel: u8, busy: bool) {
        if let Some(flag) = channel.checked_sub(1).and_then(|i| self.channel_busy.get_mut(i as usize)) {
            *flag = busy;
        }
    }

    /// Record completion on a channel (1..=4): free it and raise its I/O
    /// finished interrupt.
    pub fn io_finished(&mut self, channel: u8) {
        self.set_channel_busy(channel, false);
        match channel {
            1 => self.cci08f = true,
            2 => self.cci09f = true,
            3 => self.cci10f = true,
            4 => self.cci11f = true,
            _ => {}
        }
        self.update_iar();
    }
}

/// Lock shared Central Control. A poisoned lock is taken over as is; the
/// flags stay meaningful even if the other processor's thread panicked.
pub fn lock(control: &Mutex<CentralControl>) -> MutexGuard<'_, CentralControl> {
    control.lock().unwrap_or_else(PoisonError::into_inner)
}

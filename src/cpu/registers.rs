//! Processor register file.
//!
//! One instance per processor. Widths follow the hardware:
//! - A, B: 48-bit top-of-stack registers, with occupancy flags AROF/BROF
//! - C (15 bits) and L (0..3): address of the next program syllable
//! - T: current 12-bit syllable, P: current program word
//! - F, S, M: frame, stack and memory address registers (15 bits)
//! - R: PRT base (9 bits); the PRT starts at `R * 64`
//! - G/H, K/V: source and destination character/bit indexes
//! - X: 39-bit mantissa extension, also the character-mode loop word
//! - I: interrupt code register

use crate::word::Word;
use serde::{Serialize, Deserialize};

/// Mask for a 15-bit address.
pub const ADDRESS_MASK: u16 = 0x7FFF;

/// The processor register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub a: Word,
    pub b: Word,
    pub c: u16,
    pub l: u8,
    pub t: u16,
    pub p: Word,
    pub f: u16,
    pub s: u16,
    pub m: u16,
    pub r: u16,

    pub g: u8,
    pub h: u8,
    pub k: u8,
    pub v: u8,
    pub n: u8,
    /// Character-mode tally.
    pub tally: u8,
    pub x: u64,
    pub i: u8,

    pub arof: bool,
    pub brof: bool,
    /// Character mode.
    pub cwmf: bool,
    /// Normal state (clear means control state).
    pub ncsf: bool,
    /// Subroutine level.
    pub salf: bool,
    pub prof: bool,
    pub trof: bool,
    pub varf: bool,
    pub hltf: bool,
    /// Last memory access was below address 512 outside normal state.
    pub mail: bool,
    /// Operator halt switch.
    pub halt_switch: bool,

    /// MSFF in word mode, TFFF in character mode. One flip-flop in the
    /// hardware; use the accessors.
    #[serde(rename = "msff_tfff")]
    ms_tf: bool,
}

impl Registers {
    /// Create a cleared register file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything except the operator halt switch.
    pub fn reset(&mut self) {
        let halt_switch = self.halt_switch;
        *self = Self { halt_switch, ..Self::default() };
    }

    /// Mark-stack flip-flop (word mode).
    #[inline]
    pub fn msff(&self) -> bool {
        self.ms_tf
    }

    #[inline]
    pub fn set_msff(&mut self, on: bool) {
        self.ms_tf = on;
    }

    /// True/false flip-flop (character mode). Same storage as MSFF.
    #[inline]
    pub fn tfff(&self) -> bool {
        self.ms_tf
    }

    #[inline]
    pub fn set_tfff(&mut self, on: bool) {
        self.ms_tf = on;
    }

    /// First address of the program reference table.
    #[inline]
    pub fn prt_base(&self) -> u16 {
        (self.r & 0x1FF) << 6
    }

    /// Syllable address (`C * 4 + L`) of the next syllable.
    #[inline]
    pub fn syllable_address(&self) -> u32 {
        ((self.c as u32) << 2) | (self.l as u32 & 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msff_tfff_share_storage() {
        let mut regs = Registers::new();
        regs.set_msff(true);
        assert!(regs.tfff());
        regs.set_tfff(false);
        assert!(!regs.msff());
    }

    #[test]
    fn test_reset_keeps_halt_switch() {
        let mut regs = Registers::new();
        regs.halt_switch = true;
        regs.a = 5;
        regs.arof = true;
        regs.reset();
        assert!(regs.halt_switch);
        assert_eq!(regs.a, 0);
        assert!(!regs.arof);
    }

    #[test]
    fn test_prt_base() {
        let mut regs = Registers::new();
        regs.r = 3;
        assert_eq!(regs.prt_base(), 192);
    }

    #[test]
    fn test_register_file_serializes() {
        let mut regs = Registers::new();
        regs.c = 0o1234;
        regs.set_msff(true);
        let json = serde_json::to_string(&regs).unwrap();
        let back: Registers = serde_json::from_str(&json).unwrap();
        assert_eq!(back, regs);
    }
}

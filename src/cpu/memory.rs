//! Main memory and the processor's memory access layer.
//!
//! Memory is up to eight 4096-word modules, 32768 words in all, addressed by
//! 15 bits. Both processors share one [`Memory`]; every cell is an atomic
//! 64-bit integer so a word is always read or written whole.

use crate::cpu::registers::ADDRESS_MASK;
use crate::cpu::Processor;
use crate::word::{Word, WORD_MASK};
use serde::{Serialize, Deserialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Words in one memory module.
pub const MODULE_SIZE: usize = 4096;
/// Words in a fully populated memory.
pub const MEMORY_SIZE: usize = 8 * MODULE_SIZE;
/// Addresses below this are flagged MAIL outside normal state.
pub const MAIL_LIMIT: u16 = 512;

/// Fault report for one memory access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryFault {
    /// The address is beyond the installed modules.
    pub address: bool,
    /// Parity error. Never raised; no physical parity is modelled.
    pub parity: bool,
}

impl MemoryFault {
    #[inline]
    pub fn any(&self) -> bool {
        self.address || self.parity
    }
}

/// Shared main memory.
pub struct Memory {
    cells: Vec<AtomicU64>,
}

impl Memory {
    /// Create a fully populated, zeroed memory.
    pub fn new() -> Self {
        Self::with_modules(8)
    }

    /// Create a memory with `modules` (1..=8) modules installed. Addresses
    /// past the last module fault.
    pub fn with_modules(modules: usize) -> Self {
        let size = modules.clamp(1, 8) * MODULE_SIZE;
        Self {
            cells: (0..size).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Installed size in words.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Read a word. The address is masked to 15 bits first.
    pub fn fetch(&self, address: u16) -> (Word, MemoryFault) {
        match self.cells.get((address & ADDRESS_MASK) as usize) {
            Some(cell) => (cell.load(Ordering::Acquire), MemoryFault::default()),
            None => (0, MemoryFault { address: true, parity: false }),
        }
    }

    /// Write a word. The address is masked to 15 bits first.
    pub fn store(&self, address: u16, word: Word) -> MemoryFault {
        match self.cells.get((address & ADDRESS_MASK) as usize) {
            Some(cell) => {
                cell.store(word & WORD_MASK, Ordering::Release);
                MemoryFault::default()
            }
            None => MemoryFault { address: true, parity: false },
        }
    }

    /// Read a word, ignoring faults (zero past the end).
    #[inline]
    pub fn peek(&self, address: u16) -> Word {
        self.fetch(address).0
    }

    /// Clear all memory to zeros.
    pub fn clear(&self) {
        for cell in &self.cells {
            cell.store(0, Ordering::Release);
        }
    }

    /// Copy `words` into memory starting at `start`.
    pub fn load(&self, start: u16, words: &[Word]) -> Result<(), MemoryError> {
        let start = start as usize;
        if start + words.len() > self.cells.len() {
            return Err(MemoryError::ImageTooLarge {
                start,
                size: words.len(),
                available: self.cells.len().saturating_sub(start),
            });
        }
        for (cell, &word) in self.cells[start..].iter().zip(words) {
            cell.store(word & WORD_MASK, Ordering::Release);
        }
        Ok(())
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, Word)> {
        let end = (start as usize + count).min(self.cells.len());
        (start as usize..end)
            .map(|i| (i as u16, self.cells[i].load(Ordering::Acquire)))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells
            .iter()
            .filter(|cell| cell.load(Ordering::Relaxed) != 0)
            .count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

/// Errors from bulk memory operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("image of {size} words at {start:#o} exceeds available space {available}")]
    ImageTooLarge { start: usize, size: usize, available: usize },
}

// ==================== Register-targeted access ====================

/// Interrupt code bits for memory faults.
const PARITY_ERROR: u8 = 0x01;
const INVALID_ADDRESS: u8 = 0x02;

impl Processor {
    fn note_access(&mut self, address: u16) {
        self.regs.mail = (address & ADDRESS_MASK) < MAIL_LIMIT && !self.regs.ncsf;
    }

    /// Memory faults are interrupts in normal state only.
    fn memory_fault(&mut self, fault: MemoryFault) {
        if !self.regs.ncsf {
            return;
        }
        if fault.parity {
            self.regs.i |= PARITY_ERROR;
        }
        if fault.address {
            self.regs.i |= INVALID_ADDRESS;
        }
        self.signal_interrupt();
    }

    /// Fetch through the fault path. Returns `None` on a fault, after
    /// signalling it.
    pub(crate) fn fetch_word(&mut self, address: u16) -> Option<Word> {
        self.note_access(address);
        let (word, fault) = self.mem.fetch(address);
        if fault.any() {
            self.memory_fault(fault);
            None
        } else {
            Some(word)
        }
    }

    /// Store through the fault path. Returns false on a fault.
    pub(crate) fn store_word(&mut self, address: u16, word: Word) -> bool {
        self.note_access(address);
        let fault = self.mem.store(address, word);
        if fault.any() {
            self.memory_fault(fault);
            false
        } else {
            true
        }
    }

    pub(crate) fn load_a_via_s(&mut self) {
        if let Some(w) = self.fetch_word(self.regs.s) {
            self.regs.a = w;
            self.regs.arof = true;
        }
    }

    pub(crate) fn load_b_via_s(&mut self) {
        if let Some(w) = self.fetch_word(self.regs.s) {
            self.regs.b = w;
            self.regs.brof = true;
        }
    }

    pub(crate) fn load_a_via_m(&mut self) {
        if let Some(w) = self.fetch_word(self.regs.m) {
            self.regs.a = w;
            self.regs.arof = true;
        }
    }

    pub(crate) fn load_b_via_m(&mut self) {
        if let Some(w) = self.fetch_word(self.regs.m) {
            self.regs.b = w;
            self.regs.brof = true;
        }
    }

    /// Load the program word at C into P.
    pub(crate) fn load_p_via_c(&mut self) {
        if let Some(w) = self.fetch_word(self.regs.c) {
            self.regs.p = w;
            self.regs.prof = true;
        }
    }

    pub(crate) fn store_b_via_s(&mut self) {
        self.store_word(self.regs.s, self.regs.b);
    }

    pub(crate) fn store_b_via_m(&mut self) {
        self.store_word(self.regs.m, self.regs.b);
    }
}

//! Central processor emulation.
//!
//! One [`Processor`] holds a register file and executes syllables against a
//! shared [`Memory`] and shared Central Control. The execution units are
//! split by role:
//! - [`stack`]: the A/B top-of-stack occupancy discipline
//! - [`arith`] and [`double`]: floating and integer arithmetic
//! - [`call`]: relative addressing, descriptors and subroutine linkage
//! - [`interrupt`]: interrupt save/restore and control-state operators
//! - [`word_mode`] and [`char_mode`]: operator dispatch
//! - [`execute`]: the driver and SECL

pub mod registers;
pub mod memory;
pub mod decode;
pub mod stack;
pub mod arith;
pub mod double;
pub mod call;
pub mod interrupt;
pub mod word_mode;
pub mod char_mode;
pub mod execute;

pub use memory::{Memory, MemoryFault, MemoryError};
pub use registers::Registers;
pub use decode::Syllable;
pub use double::{DoublePrecisionPolicy, StackRearrangement};
pub use execute::{Processor, ProcessorState, ProcessorError};

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::control::{CentralControl, ProcessorId};
    use crate::io::{self, RecordingIo};
    use crate::word::Word;
    use std::sync::{Arc, Mutex};

    /// A processor 1 on a full, zeroed memory.
    pub fn processor() -> Processor {
        processor_with(Memory::new())
    }

    pub fn processor_with(mem: Memory) -> Processor {
        Processor::new(
            ProcessorId::P1,
            Arc::new(mem),
            Arc::new(Mutex::new(CentralControl::new())),
            io::shared(RecordingIo::new()),
        )
    }

    /// Literal-call syllable.
    pub fn lit(value: u16) -> u16 {
        (value & 0x3FF) << 2
    }

    /// Pack syllables four to a word, first syllable in the high bits.
    pub fn load_program(p: &Processor, address: u16, syllables: &[u16]) {
        for (i, chunk) in syllables.chunks(4).enumerate() {
            let word = chunk
                .iter()
                .enumerate()
                .fold(0 as Word, |w, (j, &s)| {
                    crate::word::insert(w, j as u32 * 12, 12, s as Word)
                });
            p.mem.store(address + i as u16, word);
        }
    }
}

//! The 48-bit machine word and the formats packed into it.
//!
//! - [`bitfield`]: field isolate/insert with MSB-first bit numbering
//! - [`number`]: the base-8 floating-point operand format
//! - [`control`]: descriptors and stack control words

pub mod bitfield;
pub mod number;
pub mod control;

pub use bitfield::{isolate, insert, transfer, Word, WORD_MASK};
pub use number::{Number, RoundingMode, ExponentStatus};
pub use control::{
    classify, WordClass, DecodeError, ControlWordKind,
    DataDescriptor, ProgramDescriptor, MarkStackWord, ReturnWord, LoopWord,
    InterruptWord, InterruptLoopWord, InitiateWord, IoDescriptor,
};

//! # B5500 Emulator
//!
//! An instruction-level emulator of the Burroughs B5500 central processor.
//!
//! The B5500 is a 48-bit stack machine. Programs run in word mode, on a
//! hardware stack whose top two cells are the A and B registers, or in
//! character mode, moving 6-bit characters between memory strings. Two
//! processors share memory, Central Control and the I/O subsystem.

pub mod word;
pub mod cpu;
pub mod control;
pub mod io;
pub mod machine;
pub mod image;
pub mod config;

// Re-export commonly used types
pub use word::{Word, Number, RoundingMode};
pub use cpu::{Processor, ProcessorState, ProcessorError, Memory, Registers};
pub use control::{CentralControl, ProcessorId};
pub use io::{IoSubsystem, NullIo, RecordingIo};
pub use machine::{Machine, MachineError};
pub use image::{load_image, MemoryImage, ImageError};
pub use config::{MachineConfig, ConfigError};

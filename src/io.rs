//! The processor's view of the I/O subsystem.
//!
//! Devices themselves are outside this crate. A processor hands an I/O
//! descriptor to an [`IoSubsystem`] and carries on; the subsystem reports
//! finished operations later through [`IoSubsystem::poll`], and the
//! processor turns each into a result descriptor and an I/O-finished
//! interrupt in Central Control.

use crate::word::{IoDescriptor, Word};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// First of the four result descriptor cells, one per channel.
pub const RESULT_BASE: u16 = 0o14;

/// A finished I/O operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoCompletion {
    /// Channel (1..=4) the operation ran on.
    pub channel: u8,
    /// Result descriptor to leave for the interrupt handler.
    pub result: Word,
}

/// Errors the emulator cannot turn into a machine interrupt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IoError {
    #[error("malformed I/O descriptor {0:#018o}")]
    MalformedDescriptor(Word),
    #[error("no device for unit designate {0}")]
    Unsupported(u8),
}

/// External I/O subsystem.
pub trait IoSubsystem: Send {
    /// Start an operation on `channel`. Must not block until it finishes.
    fn initiate_io(&mut self, channel: u8, request: IoDescriptor) -> Result<(), IoError>;

    /// Ready status of the units, bit `n` for unit designate `n`.
    fn interrogate_unit_status(&self) -> u64;

    /// Operations that finished since the last poll.
    fn poll(&mut self) -> Vec<IoCompletion> {
        Vec::new()
    }
}

/// An I/O subsystem shared by both processors.
pub type SharedIo = Arc<Mutex<dyn IoSubsystem>>;

/// No devices attached: every initiate fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullIo;

impl IoSubsystem for NullIo {
    fn initiate_io(&mut self, _channel: u8, request: IoDescriptor) -> Result<(), IoError> {
        Err(IoError::Unsupported(request.unit))
    }

    fn interrogate_unit_status(&self) -> u64 {
        0
    }
}

/// Accepts every request, remembers it, and completes it without error on
/// the next poll. Useful for exercising the processor's I/O path.
#[derive(Debug, Clone, Default)]
pub struct RecordingIo {
    pub requests: Vec<(u8, IoDescriptor)>,
    pending: Vec<(u8, IoDescriptor)>,
    /// Units reported ready.
    pub ready: u64,
}

impl RecordingIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the given unit designates as ready.
    pub fn with_ready_units(units: &[u8]) -> Self {
        let ready = units.iter().fold(0u64, |acc, &u| acc | (1 << (u & 0x3F)));
        Self { ready, ..Self::default() }
    }
}

impl IoSubsystem for RecordingIo {
    fn initiate_io(&mut self, channel: u8, request: IoDescriptor) -> Result<(), IoError> {
        self.requests.push((channel, request));
        self.pending.push((channel, request));
        Ok(())
    }

    fn interrogate_unit_status(&self) -> u64 {
        self.ready
    }

    fn poll(&mut self) -> Vec<IoCompletion> {
        self.pending
            .drain(..)
            .map(|(channel, request)| {
                let end = request.address.wrapping_add(request.word_count) & 0x7FFF;
                IoCompletion { channel, result: request.result(0, end) }
            })
            .collect()
    }
}

/// Wrap an I/O subsystem for sharing between processors.
pub fn shared<T: IoSubsystem + 'static>(io: T) -> SharedIo {
    Arc::new(Mutex::new(io))
}

/// Lock a shared I/O subsystem, taking over a poisoned lock.
pub fn lock<'a>(io: &'a Mutex<dyn IoSubsystem + 'static>) -> MutexGuard<'a, dyn IoSubsystem + 'static> {
    io.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> IoDescriptor {
        IoDescriptor { unit: 14, word_count: 10, read: true, address: 0o2000, ..IoDescriptor::default() }
    }

    #[test]
    fn test_null_io_rejects() {
        let mut io = NullIo;
        assert_eq!(io.initiate_io(1, request()), Err(IoError::Unsupported(14)));
        assert!(io.poll().is_empty());
    }

    #[test]
    fn test_recording_io_completes_on_poll() {
        let mut io = RecordingIo::new();
        io.initiate_io(2, request()).unwrap();
        assert_eq!(io.requests.len(), 1);
        let done = io.poll();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].channel, 2);
        assert_eq!(crate::word::control::address_of(done[0].result), 0o2012);
        assert!(io.poll().is_empty());
    }

    #[test]
    fn test_shared_io_lock() {
        let io: SharedIo = shared(RecordingIo::with_ready_units(&[3]));
        assert_eq!(lock(&io).interrogate_unit_status(), 1 << 3);
        lock(&io).initiate_io(1, request()).unwrap();
        assert_eq!(lock(&io).poll().len(), 1);
    }

    #[test]
    fn test_ready_units() {
        let io = RecordingIo::with_ready_units(&[1, 14]);
        assert_eq!(io.interrogate_unit_status(), (1 << 1) | (1 << 14));
    }
}

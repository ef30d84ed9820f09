//! Typed control words.
//!
//! Every non-operand word the processor manipulates has a fixed layout. Each
//! kind gets its own struct with an `encode` that produces the machine word
//! and a `decode` that checks the leading tag bits before unpacking, so a
//! mislabelled word is reported instead of being silently misread.
//!
//! Tag bits (MSB numbering):
//!
//! ```text
//! bit 0  bit 1  bit 2    bit 3
//!   0      -      -        -      operand
//!   1      0    present  0        data descriptor
//!   1      0    present  1        program descriptor
//!   1      1      0        -      stack control word (MSCW, RCW, LCW, ICW, INCW)
//! ```
//!
//! Stack control words share one tag; which kind a word is depends on where
//! it sits on the stack.

use super::bitfield::{self, Word};
use thiserror::Error;

/// Flag bit: set on every descriptor and control word.
pub const FLAG_BIT: u32 = 0;
/// Presence bit of a descriptor.
pub const PRESENCE_BIT: u32 = 2;
/// Tag of a present data descriptor (`101 0`), OR-ed onto an address.
pub const PRESENT_DATA_DESCRIPTOR: Word = 0o5000_0000_0000_0000;
/// Tag shared by all stack control words (`11 0`).
pub const CONTROL_TAG: Word = 0o6000_0000_0000_0000;

/// The kinds of word the tag bits distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordClass {
    Operand,
    DataDescriptor { present: bool },
    ProgramDescriptor { present: bool },
    Control,
}

/// Classify a word by its tag bits.
pub fn classify(word: Word) -> WordClass {
    if !bitfield::bit(word, FLAG_BIT) {
        return WordClass::Operand;
    }
    if bitfield::bit(word, 1) {
        if bitfield::bit(word, 2) {
            // 111x is not a legal tag; treat it like an absent descriptor so
            // the presence interrupt catches it.
            WordClass::DataDescriptor { present: false }
        } else {
            WordClass::Control
        }
    } else if bitfield::bit(word, 3) {
        WordClass::ProgramDescriptor { present: bitfield::bit(word, PRESENCE_BIT) }
    } else {
        WordClass::DataDescriptor { present: bitfield::bit(word, PRESENCE_BIT) }
    }
}

/// True if the flag bit is set.
#[inline]
pub fn is_flagged(word: Word) -> bool {
    bitfield::bit(word, FLAG_BIT)
}

/// The address field shared by descriptors and most control words.
#[inline]
pub fn address_of(word: Word) -> u16 {
    bitfield::isolate(word, 33, 15) as u16
}

/// Which control word a decode was attempting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlWordKind {
    DataDescriptor,
    ProgramDescriptor,
    MarkStack,
    Return,
    Loop,
    Interrupt,
    InterruptLoop,
    Initiate,
    IoDescriptor,
}

/// A word whose tag bits do not match the layout it was decoded as.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{kind:?} expected, found {word:#018o}")]
    TagMismatch { kind: ControlWordKind, word: Word },
}

fn expect_control(word: Word, kind: ControlWordKind) -> Result<(), DecodeError> {
    if classify(word) == WordClass::Control {
        Ok(())
    } else {
        Err(DecodeError::TagMismatch { kind, word })
    }
}

// ==================== Descriptors ====================

/// Data descriptor: a reference to an array (`word_count` > 0) or a single
/// word in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDescriptor {
    pub present: bool,
    /// Bits 4..8: continuity, read-only and similar marks, carried untouched.
    pub flags: u8,
    pub word_count: u16,
    /// Bits 18..33: disk address or other system-software bits.
    pub payload: u16,
    pub address: u16,
}

impl DataDescriptor {
    pub fn new(address: u16, word_count: u16) -> Self {
        Self { present: true, address, word_count, ..Self::default() }
    }

    pub fn encode(&self) -> Word {
        let mut w = bitfield::set_bit(0, FLAG_BIT, true);
        w = bitfield::set_bit(w, PRESENCE_BIT, self.present);
        w = bitfield::insert(w, 4, 4, self.flags as Word);
        w = bitfield::insert(w, 8, 10, self.word_count as Word);
        w = bitfield::insert(w, 18, 15, self.payload as Word);
        bitfield::insert(w, 33, 15, self.address as Word)
    }

    pub fn decode(word: Word) -> Result<Self, DecodeError> {
        match classify(word) {
            WordClass::DataDescriptor { present } if !bitfield::bit(word, 1) => Ok(Self {
                present,
                flags: bitfield::isolate(word, 4, 4) as u8,
                word_count: bitfield::isolate(word, 8, 10) as u16,
                payload: bitfield::isolate(word, 18, 15) as u16,
                address: address_of(word),
            }),
            _ => Err(DecodeError::TagMismatch { kind: ControlWordKind::DataDescriptor, word }),
        }
    }
}

/// Program descriptor: the entry point of a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgramDescriptor {
    pub present: bool,
    /// Enter the procedure in character mode.
    pub char_mode: bool,
    /// The caller has already marked the stack and pushed arguments.
    pub arguments: bool,
    /// Bits 6..33, carried untouched.
    pub payload: u32,
    pub address: u16,
}

impl ProgramDescriptor {
    pub fn new(address: u16) -> Self {
        Self { present: true, address, ..Self::default() }
    }

    pub fn encode(&self) -> Word {
        let mut w = bitfield::set_bit(0, FLAG_BIT, true);
        w = bitfield::set_bit(w, PRESENCE_BIT, self.present);
        w = bitfield::set_bit(w, 3, true);
        w = bitfield::set_bit(w, 4, self.char_mode);
        w = bitfield::set_bit(w, 5, self.arguments);
        w = bitfield::insert(w, 6, 27, self.payload as Word);
        bitfield::insert(w, 33, 15, self.address as Word)
    }

    pub fn decode(word: Word) -> Result<Self, DecodeError> {
        match classify(word) {
            WordClass::ProgramDescriptor { present } => Ok(Self {
                present,
                char_mode: bitfield::bit(word, 4),
                arguments: bitfield::bit(word, 5),
                payload: bitfield::isolate(word, 6, 27) as u32,
                address: address_of(word),
            }),
            _ => Err(DecodeError::TagMismatch { kind: ControlWordKind::ProgramDescriptor, word }),
        }
    }
}

// ==================== Stack control words ====================

/// Mark-stack control word: the caller's frame linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarkStackWord {
    /// PRT base (9 bits).
    pub r: u16,
    pub msff: bool,
    pub salf: bool,
    /// Previous frame address.
    pub f: u16,
}

impl MarkStackWord {
    pub fn encode(&self) -> Word {
        let mut w = CONTROL_TAG;
        w = bitfield::insert(w, 6, 9, self.r as Word);
        w = bitfield::set_bit(w, 16, self.msff);
        w = bitfield::set_bit(w, 17, self.salf);
        bitfield::insert(w, 18, 15, self.f as Word)
    }

    pub fn decode(word: Word) -> Result<Self, DecodeError> {
        expect_control(word, ControlWordKind::MarkStack)?;
        Ok(Self::unpack(word))
    }

    /// Read the fields without checking the tag. Used when chasing the
    /// stack-history chain, where the link word is trusted.
    pub fn unpack(word: Word) -> Self {
        Self {
            r: bitfield::isolate(word, 6, 9) as u16,
            msff: bitfield::bit(word, 16),
            salf: bitfield::bit(word, 17),
            f: bitfield::isolate(word, 18, 15) as u16,
        }
    }
}

/// Return control word: where to resume the caller.
///
/// The same layout serves as the interrupt return control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReturnWord {
    /// Entered through a descriptor call rather than an operand call.
    pub descriptor_call: bool,
    pub h: u8,
    pub v: u8,
    pub l: u8,
    pub g: u8,
    pub k: u8,
    pub f: u16,
    pub c: u16,
}

impl ReturnWord {
    pub fn encode(&self) -> Word {
        let mut w = CONTROL_TAG;
        w = bitfield::set_bit(w, 3, self.descriptor_call);
        w = bitfield::insert(w, 4, 3, self.h as Word);
        w = bitfield::insert(w, 7, 3, self.v as Word);
        w = bitfield::insert(w, 10, 2, self.l as Word);
        w = bitfield::insert(w, 12, 3, self.g as Word);
        w = bitfield::insert(w, 15, 3, self.k as Word);
        w = bitfield::insert(w, 18, 15, self.f as Word);
        bitfield::insert(w, 33, 15, self.c as Word)
    }

    pub fn decode(word: Word) -> Result<Self, DecodeError> {
        expect_control(word, ControlWordKind::Return)?;
        Ok(Self {
            descriptor_call: bitfield::bit(word, 3),
            h: bitfield::isolate(word, 4, 3) as u8,
            v: bitfield::isolate(word, 7, 3) as u8,
            l: bitfield::isolate(word, 10, 2) as u8,
            g: bitfield::isolate(word, 12, 3) as u8,
            k: bitfield::isolate(word, 15, 3) as u8,
            f: bitfield::isolate(word, 18, 15) as u16,
            c: address_of(word),
        })
    }
}

/// Character-mode loop control word. The low 39 bits are what the X
/// register holds while the loop is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopWord {
    pub l: u8,
    /// Remaining repetitions (6 bits).
    pub repeat: u8,
    /// Address of the enclosing loop word.
    pub f: u16,
    pub c: u16,
}

impl LoopWord {
    pub fn encode(&self) -> Word {
        let mut w = CONTROL_TAG;
        w = bitfield::insert(w, 10, 2, self.l as Word);
        w = bitfield::insert(w, 12, 6, self.repeat as Word);
        w = bitfield::insert(w, 18, 15, self.f as Word);
        bitfield::insert(w, 33, 15, self.c as Word)
    }

    pub fn decode(word: Word) -> Result<Self, DecodeError> {
        expect_control(word, ControlWordKind::Loop)?;
        Ok(Self::from_x(word))
    }

    /// Unpack from the X register image (no tag present).
    pub fn from_x(x: Word) -> Self {
        Self {
            l: bitfield::isolate(x, 10, 2) as u8,
            repeat: bitfield::isolate(x, 12, 6) as u8,
            f: bitfield::isolate(x, 18, 15) as u16,
            c: address_of(x),
        }
    }

    /// The X register image: the encoded word without its tag.
    pub fn to_x(&self) -> Word {
        self.encode() & super::number::MANTISSA_MASK
    }
}

/// Interrupt control word: processor state not covered by the return word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterruptWord {
    pub varf: bool,
    pub cwmf: bool,
    pub r: u16,
    pub msff: bool,
    pub salf: bool,
    pub n: u8,
    pub arof: bool,
    pub brof: bool,
    pub m: u16,
}

impl InterruptWord {
    pub fn encode(&self) -> Word {
        let mut w = CONTROL_TAG;
        w = bitfield::set_bit(w, 4, self.varf);
        w = bitfield::set_bit(w, 5, self.cwmf);
        w = bitfield::insert(w, 6, 9, self.r as Word);
        w = bitfield::set_bit(w, 16, self.msff);
        w = bitfield::set_bit(w, 17, self.salf);
        w = bitfield::insert(w, 18, 4, self.n as Word);
        w = bitfield::set_bit(w, 22, self.arof);
        w = bitfield::set_bit(w, 23, self.brof);
        bitfield::insert(w, 33, 15, self.m as Word)
    }

    pub fn decode(word: Word) -> Result<Self, DecodeError> {
        expect_control(word, ControlWordKind::Interrupt)?;
        Ok(Self {
            varf: bitfield::bit(word, 4),
            cwmf: bitfield::bit(word, 5),
            r: bitfield::isolate(word, 6, 9) as u16,
            msff: bitfield::bit(word, 16),
            salf: bitfield::bit(word, 17),
            n: bitfield::isolate(word, 18, 4) as u8,
            arof: bitfield::bit(word, 22),
            brof: bitfield::bit(word, 23),
            m: address_of(word),
        })
    }
}

/// Interrupt loop control word: the X register of an interrupted
/// character-mode program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterruptLoopWord {
    pub x: u64,
}

impl InterruptLoopWord {
    pub fn encode(&self) -> Word {
        CONTROL_TAG | (self.x & super::number::MANTISSA_MASK)
    }

    pub fn decode(word: Word) -> Result<Self, DecodeError> {
        expect_control(word, ControlWordKind::InterruptLoop)?;
        Ok(Self { x: word & super::number::MANTISSA_MASK })
    }
}

/// Initiate control word, left in the PRT so an interrupted program can be
/// restarted: the stack address of its saved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InitiateWord {
    pub s: u16,
}

impl InitiateWord {
    pub fn encode(&self) -> Word {
        bitfield::insert(CONTROL_TAG, 33, 15, self.s as Word)
    }

    pub fn decode(word: Word) -> Result<Self, DecodeError> {
        expect_control(word, ControlWordKind::Initiate)?;
        Ok(Self { s: address_of(word) })
    }
}

// ==================== I/O ====================

/// I/O descriptor handed to the I/O subsystem by initiate-I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoDescriptor {
    /// Unit designate (5 bits).
    pub unit: u8,
    pub word_count: u16,
    pub memory_inhibit: bool,
    pub binary: bool,
    pub backward: bool,
    pub use_word_count: bool,
    pub read: bool,
    pub segmented: bool,
    pub address: u16,
}

impl IoDescriptor {
    pub fn encode(&self) -> Word {
        let mut w = bitfield::set_bit(0, FLAG_BIT, true);
        w = bitfield::insert(w, 3, 5, self.unit as Word);
        w = bitfield::insert(w, 8, 10, self.word_count as Word);
        w = bitfield::set_bit(w, 19, self.memory_inhibit);
        w = bitfield::set_bit(w, 21, self.binary);
        w = bitfield::set_bit(w, 22, self.backward);
        w = bitfield::set_bit(w, 23, self.use_word_count);
        w = bitfield::set_bit(w, 24, self.read);
        w = bitfield::set_bit(w, 25, self.segmented);
        bitfield::insert(w, 33, 15, self.address as Word)
    }

    /// Decode, rejecting words without the flag bit or with a zero unit.
    pub fn decode(word: Word) -> Result<Self, DecodeError> {
        let unit = bitfield::isolate(word, 3, 5) as u8;
        if !is_flagged(word) || bitfield::bit(word, 1) || unit == 0 {
            return Err(DecodeError::TagMismatch { kind: ControlWordKind::IoDescriptor, word });
        }
        Ok(Self {
            unit,
            word_count: bitfield::isolate(word, 8, 10) as u16,
            memory_inhibit: bitfield::bit(word, 19),
            binary: bitfield::bit(word, 21),
            backward: bitfield::bit(word, 22),
            use_word_count: bitfield::bit(word, 23),
            read: bitfield::bit(word, 24),
            segmented: bitfield::bit(word, 25),
            address: address_of(word),
        })
    }

    /// Build the result descriptor reported when the operation finishes.
    pub fn result(&self, errors: u16, final_address: u16) -> Word {
        let w = bitfield::insert(self.encode(), 26, 7, errors as Word);
        bitfield::insert(w, 33, 15, final_address as Word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(6), WordClass::Operand);
        assert_eq!(classify(PRESENT_DATA_DESCRIPTOR | 100), WordClass::DataDescriptor { present: true });
        assert_eq!(classify(0o4000_0000_0000_0100), WordClass::DataDescriptor { present: false });
        assert_eq!(
            classify(ProgramDescriptor::new(0o200).encode()),
            WordClass::ProgramDescriptor { present: true }
        );
        assert_eq!(classify(MarkStackWord::default().encode()), WordClass::Control);
    }

    #[test]
    fn test_present_data_descriptor_constant() {
        assert_eq!(DataDescriptor::new(0o1234, 0).encode(), PRESENT_DATA_DESCRIPTOR | 0o1234);
    }

    #[test]
    fn test_data_descriptor_fields() {
        let dd = DataDescriptor { present: false, flags: 0o5, word_count: 1000, payload: 0o12345, address: 0o777 };
        assert_eq!(DataDescriptor::decode(dd.encode()), Ok(dd));
    }

    #[test]
    fn test_descriptor_rejects_operand() {
        let err = DataDescriptor::decode(0o1234).unwrap_err();
        assert_eq!(err, DecodeError::TagMismatch { kind: ControlWordKind::DataDescriptor, word: 0o1234 });
        assert!(ProgramDescriptor::decode(PRESENT_DATA_DESCRIPTOR).is_err());
        assert!(DataDescriptor::decode(ProgramDescriptor::new(1).encode()).is_err());
    }

    #[test]
    fn test_mark_stack_layout() {
        let mscw = MarkStackWord { r: 0o12, msff: true, salf: false, f: 0o4321 };
        let w = mscw.encode();
        assert_eq!(w >> 46, 0b11);
        assert_eq!(bitfield::isolate(w, 18, 15), 0o4321);
        assert_eq!(MarkStackWord::decode(w), Ok(mscw));
        assert!(MarkStackWord::decode(0o7).is_err());
    }

    #[test]
    fn test_return_word_fields() {
        let rcw = ReturnWord { descriptor_call: true, h: 5, v: 3, l: 2, g: 7, k: 1, f: 0o100, c: 0o20000 };
        assert_eq!(ReturnWord::decode(rcw.encode()), Ok(rcw));
        assert!(ReturnWord::decode(PRESENT_DATA_DESCRIPTOR).is_err());
    }

    #[test]
    fn test_loop_word_through_x() {
        let lcw = LoopWord { l: 3, repeat: 42, f: 0o3000, c: 0o1777 };
        assert_eq!(LoopWord::from_x(lcw.to_x()), lcw);
        assert_eq!(LoopWord::decode(lcw.encode()), Ok(lcw));
    }

    #[test]
    fn test_interrupt_words() {
        let icw = InterruptWord {
            varf: true, cwmf: true, r: 0o777, msff: false, salf: true, n: 9, arof: true, brof: false, m: 0o70000,
        };
        assert_eq!(InterruptWord::decode(icw.encode()), Ok(icw));
        let ilcw = InterruptLoopWord { x: 0o1234_5670_1234_5 };
        assert_eq!(InterruptLoopWord::decode(ilcw.encode()), Ok(ilcw));
        let incw = InitiateWord { s: 0o600 };
        assert_eq!(InitiateWord::decode(incw.encode()), Ok(incw));
    }

    #[test]
    fn test_io_descriptor() {
        let iod = IoDescriptor {
            unit: 10, word_count: 30, read: true, binary: true, address: 0o1000, ..IoDescriptor::default()
        };
        assert_eq!(IoDescriptor::decode(iod.encode()), Ok(iod));
        assert!(IoDescriptor::decode(0o1000).is_err());
        assert!(IoDescriptor::decode(IoDescriptor::default().encode()).is_err());
        let result = iod.result(0o4, 0o1036);
        assert_eq!(address_of(result), 0o1036);
        assert_eq!(bitfield::isolate(result, 26, 7), 0o4);
    }
}

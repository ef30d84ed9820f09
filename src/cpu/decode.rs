//! Syllable classification and mnemonics.
//!
//! A word-mode syllable is 12 bits. The low two bits pick the syllable
//! class; operators are further split into a 6-bit family (`T & 0x3F`) and a
//! 6-bit variant (`T >> 6`). Character-mode syllables are a 6-bit opcode with
//! the variant acting as a repeat count.

use serde::{Serialize, Deserialize};

/// A decoded word-mode syllable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Syllable {
    /// Push a 10-bit literal.
    Literal(u16),
    /// Operand call on a 10-bit relative address.
    OperandCall(u16),
    /// Descriptor call on a 10-bit relative address.
    DescriptorCall(u16),
    /// Operator: family (low six bits, class bits included) and variant.
    Operator { family: u8, variant: u8 },
}

impl Syllable {
    pub fn decode(t: u16) -> Self {
        let t = t & 0xFFF;
        match t & 3 {
            0 => Syllable::Literal(t >> 2),
            2 => Syllable::OperandCall(t >> 2),
            3 => Syllable::DescriptorCall(t >> 2),
            _ => Syllable::Operator { family: (t & 0x3F) as u8, variant: (t >> 6) as u8 },
        }
    }

    pub fn encode(&self) -> u16 {
        match *self {
            Syllable::Literal(v) => (v & 0x3FF) << 2,
            Syllable::OperandCall(v) => ((v & 0x3FF) << 2) | 2,
            Syllable::DescriptorCall(v) => ((v & 0x3FF) << 2) | 3,
            Syllable::Operator { family, variant } => ((variant as u16 & 0x3F) << 6) | (family as u16 & 0x3F),
        }
    }
}

/// Build an operator syllable.
pub const fn op(family: u8, variant: u8) -> u16 {
    ((variant as u16 & 0x3F) << 6) | (family as u16 & 0x3F)
}

// Word-mode operator syllables by name.
pub const ADD: u16 = op(0x01, 0x01);
pub const SUB: u16 = op(0x01, 0x03);
pub const MUL: u16 = op(0x01, 0x04);
pub const DIV: u16 = op(0x01, 0x08);
pub const IDV: u16 = op(0x01, 0x18);
pub const RDV: u16 = op(0x01, 0x38);
pub const DLA: u16 = op(0x05, 0x01);
pub const DLS: u16 = op(0x05, 0x03);
pub const DLM: u16 = op(0x05, 0x04);
pub const DLD: u16 = op(0x05, 0x08);
pub const ITI: u16 = op(0x09, 0x02);
pub const SFI: u16 = op(0x09, 0x18);
pub const SFT: u16 = op(0x09, 0x1C);
pub const IP1: u16 = op(0x09, 0x21);
pub const IIO: u16 = op(0x09, 0x24);
pub const STD: u16 = op(0x11, 0x04);
pub const SND: u16 = op(0x11, 0x08);
pub const LOD: u16 = op(0x11, 0x10);
pub const GEQ: u16 = op(0x15, 0x01);
pub const EQL: u16 = op(0x15, 0x24);
pub const XCH: u16 = op(0x15, 0x08);
pub const DUP: u16 = op(0x15, 0x10);
pub const DEL: u16 = op(0x15, 0x20);
pub const BFC: u16 = op(0x19, 0x02);
pub const LFU: u16 = op(0x19, 0x32);
pub const LBU: u16 = op(0x19, 0x31);
pub const ZPI: u16 = op(0x09, 0x14);
pub const RTN: u16 = op(0x1D, 0x02);
pub const XIT: u16 = op(0x1D, 0x04);
pub const MKS: u16 = op(0x21, 0x04);
pub const CMN: u16 = op(0x21, 0x24);

/// Mnemonic of a word-mode operator, `None` for unassigned codes.
pub fn word_mnemonic(family: u8, variant: u8) -> Option<&'static str> {
    let name = match (family, variant) {
        (0x01, 0x01) => "ADD",
        (0x01, 0x03) => "SUB",
        (0x01, 0x04) => "MUL",
        (0x01, 0x08) => "DIV",
        (0x01, 0x18) => "IDV",
        (0x01, 0x38) => "RDV",
        (0x05, 0x01) => "DLA",
        (0x05, 0x03) => "DLS",
        (0x05, 0x04) => "DLM",
        (0x05, 0x08) => "DLD",
        (0x09, 0x01) => "PRL",
        (0x09, 0x02) => "ITI",
        (0x09, 0x04) => "RTR",
        (0x09, 0x08) => "COM",
        (0x09, 0x11) => "IOR",
        (0x09, 0x12) => "HP2",
        (0x09, 0x14) => "ZPI",
        (0x09, 0x18) => "SFI",
        (0x09, 0x1C) => "SFT",
        (0x09, 0x21) => "IP1",
        (0x09, 0x22) => "IP2",
        (0x09, 0x24) => "IIO",
        (0x09, 0x29) => "IFT",
        (0x0D, 0x01) => "LNG",
        (0x0D, 0x02) => "LOR",
        (0x0D, 0x04) => "LND",
        (0x0D, 0x08) => "LQV",
        (0x0D, 0x10) => "MOP",
        (0x0D, 0x20) => "MDS",
        (0x11, 0x01) => "CID",
        (0x11, 0x02) => "CIN",
        (0x11, 0x04) => "STD",
        (0x11, 0x08) => "SND",
        (0x11, 0x10) => "LOD",
        (0x11, 0x21) => "ISD",
        (0x11, 0x22) => "ISN",
        (0x15, 0x01) => "GEQ",
        (0x15, 0x02) => "GTR",
        (0x15, 0x04) => "NEQ",
        (0x15, 0x08) => "XCH",
        (0x15, 0x0C) => "FTC",
        (0x15, 0x10) => "DUP",
        (0x15, 0x1C) => "FTF",
        (0x15, 0x20) => "DEL",
        (0x15, 0x21) => "LEQ",
        (0x15, 0x22) => "LSS",
        (0x15, 0x24) => "EQL",
        (0x15, 0x2C) => "CTC",
        (0x15, 0x3C) => "CTF",
        (0x19, 0x01) => "BBC",
        (0x19, 0x02) => "BFC",
        (0x19, 0x04) => "SSN",
        (0x19, 0x08) => "CHS",
        (0x19, 0x10) => "TOP",
        (0x19, 0x11) => "LBC",
        (0x19, 0x12) => "LFC",
        (0x19, 0x14) => "TUS",
        (0x19, 0x21) => "BBW",
        (0x19, 0x22) => "BFW",
        (0x19, 0x24) => "SSP",
        (0x19, 0x31) => "LBU",
        (0x19, 0x32) => "LFU",
        (0x19, 0x34) => "TIO",
        (0x1D, 0x02) => "RTN",
        (0x1D, 0x04) => "XIT",
        (0x1D, 0x0A) => "RTS",
        (0x21, 0x01) => "INX",
        (0x21, 0x02) => "COC",
        (0x21, 0x04) => "MKS",
        (0x21, 0x08) => "CDC",
        (0x21, 0x11) => "SSF",
        (0x21, 0x24) => "CMN",
        (0x25, _) => "DIA",
        (0x29, _) => "DIB",
        (0x2D, _) => "TRB",
        (0x31, _) => "FCL",
        (0x35, _) => "FCE",
        (0x39, _) => "ISO",
        _ => return None,
    };
    Some(name)
}

/// Mnemonic of a character-mode opcode (`T & 0x3F`).
pub fn char_mnemonic(opcode: u8) -> Option<&'static str> {
    const NAMES: [&str; 64] = [
        "EXC", "", "BSD", "BSS", "RDA", "TRW", "SED", "TDA",
        "", "CTL", "TBN", "", "SDA", "SSA", "SFD", "SRD",
        "", "SES", "", "TEQ", "TNE", "TEG", "TGR", "SRS",
        "SFS", "", "TEL", "TLS", "TAN", "BIT", "INC", "STC",
        "SEC", "CRF", "JNC", "JFC", "JNS", "JFW", "RCA", "ENS",
        "BNS", "RSA", "SCA", "JRC", "TSA", "JRV", "CEQ", "CNE",
        "CEG", "CGR", "BIS", "BIR", "OCV", "ICV", "CEL", "CLS",
        "FSU", "FAD", "TRP", "TRN", "TRZ", "TRS", "", "",
    ];
    let name = NAMES[(opcode & 0x3F) as usize];
    if name.is_empty() { None } else { Some(name) }
}

/// One-line disassembly of a syllable, for traces.
pub fn disassemble(t: u16, char_mode: bool) -> String {
    let t = t & 0xFFF;
    if char_mode {
        return match char_mnemonic((t & 0x3F) as u8) {
            Some(name) => format!("{} {}", name, t >> 6),
            None => format!("??? {:04o}", t),
        };
    }
    match Syllable::decode(t) {
        Syllable::Literal(v) => format!("LITC {}", v),
        Syllable::OperandCall(a) => format!("OPDC {:04o}", a),
        Syllable::DescriptorCall(a) => format!("DESC {:04o}", a),
        Syllable::Operator { family, variant } => match word_mnemonic(family, variant) {
            Some(name) if matches!(family, 0x25 | 0x29 | 0x2D | 0x31 | 0x35 | 0x39) => {
                format!("{} {}", name, variant)
            }
            Some(name) => name.to_string(),
            None => format!("NOP {:04o}", t),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_classes() {
        assert_eq!(Syllable::decode(5 << 2), Syllable::Literal(5));
        assert_eq!(Syllable::decode((0o12 << 2) | 2), Syllable::OperandCall(0o12));
        assert_eq!(Syllable::decode((0o12 << 2) | 3), Syllable::DescriptorCall(0o12));
        assert_eq!(Syllable::decode(ADD), Syllable::Operator { family: 0x01, variant: 0x01 });
    }

    #[test]
    fn test_named_syllables() {
        assert_eq!(SFI, 0x0609);
        assert_eq!(ITI, 0x0089);
        assert_eq!(SFI, 0o3011);
    }

    #[test]
    fn test_encode_matches_decode() {
        for t in [ADD, MKS, 0o7774, 0o0012 | 3] {
            assert_eq!(Syllable::decode(t).encode(), t);
        }
    }

    #[test]
    fn test_disassemble() {
        assert_eq!(disassemble(3 << 2, false), "LITC 3");
        assert_eq!(disassemble(MUL, false), "MUL");
        assert_eq!(disassemble(op(0x25, 9), false), "DIA 9");
        assert_eq!(disassemble(op(0x3D, 5), true), "TRS 5");
        assert_eq!(disassemble(op(0x3E, 0), true), "??? 0076");
    }
}

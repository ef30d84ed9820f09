//! Memory image files.
//!
//! An image is plain text:
//! - One word per line: `address word`, both in octal
//! - Text after `;` is a comment
//! - Blank lines are ignored
//!
//! A line holding a single octal word continues from the previous address.

use crate::cpu::Memory;
use crate::word::{Word, WORD_MASK};
use std::path::Path;
use thiserror::Error;

/// A parsed memory image: words in file order with their addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryImage {
    pub words: Vec<(u16, Word)>,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Lowest address the image touches.
    pub fn first_address(&self) -> Option<u16> {
        self.words.iter().map(|&(address, _)| address).min()
    }

    /// Parse image text.
    pub fn parse(text: &str) -> Result<Self, ImageError> {
        let mut image = Self::new();
        let mut next: u32 = 0;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let content = raw.split(';').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }

            let fields: Vec<&str> = content.split_whitespace().collect();
            let (address, word) = match fields.as_slice() {
                [word] => (next, parse_octal(word, line)?),
                [address, word] => (parse_octal(address, line)? as u32, parse_octal(word, line)?),
                _ => {
                    return Err(ImageError::Parse {
                        line,
                        message: format!("expected `address word`, found {} fields", fields.len()),
                    })
                }
            };

            if word > WORD_MASK {
                return Err(ImageError::Parse {
                    line,
                    message: format!("word {word:o} is wider than 48 bits"),
                });
            }
            let address = u16::try_from(address)
                .ok()
                .filter(|&a| a <= 0o77777)
                .ok_or(ImageError::AddressRange { line, address })?;

            image.words.push((address, word));
            next = address as u32 + 1;
        }

        Ok(image)
    }

    /// Store every word into `memory`. Nothing is stored if any address
    /// is beyond the installed modules.
    pub fn load_into(&self, memory: &Memory) -> Result<(), ImageError> {
        if let Some(&(address, _)) = self.words.iter().find(|&&(a, _)| a as usize >= memory.size()) {
            return Err(ImageError::AddressRange { line: 0, address: address as u32 });
        }
        for &(address, word) in &self.words {
            memory.store(address, word);
        }
        Ok(())
    }
}

fn parse_octal(field: &str, line: usize) -> Result<u64, ImageError> {
    u64::from_str_radix(field, 8).map_err(|e| ImageError::Parse {
        line,
        message: format!("bad octal number `{field}`: {e}"),
    })
}

/// Read and parse an image file.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<MemoryImage, ImageError> {
    let text = std::fs::read_to_string(path.as_ref()).map_err(|e| ImageError::Io(e.to_string()))?;
    MemoryImage::parse(&text)
}

/// Errors that can occur while loading an image.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("address {address:o} on line {line} is outside installed memory")]
    AddressRange { line: usize, address: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_addresses_and_comments() {
        let image = MemoryImage::parse(
            "; boot\n\
             100 0000000000000042   ; two words\n\
             0000000000000043\n\
             \n\
             20 5000000000001000\n",
        )
        .unwrap();
        assert_eq!(
            image.words,
            vec![(0o100, 0o42), (0o101, 0o43), (0o20, 0o5000000000001000)]
        );
        assert_eq!(image.first_address(), Some(0o20));
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(matches!(
            MemoryImage::parse("100 9"),
            Err(ImageError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            MemoryImage::parse("\n1 2 3"),
            Err(ImageError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            MemoryImage::parse("100 7777777777777777777"),
            Err(ImageError::Parse { line: 1, .. })
        ));
        assert_eq!(
            MemoryImage::parse("100000 1"),
            Err(ImageError::AddressRange { line: 1, address: 0o100000 })
        );
    }

    #[test]
    fn test_load_into_memory() {
        let image = MemoryImage::parse("7777 12\n10000 34").unwrap();
        let memory = Memory::with_modules(2);
        image.load_into(&memory).unwrap();
        assert_eq!(memory.peek(0o7777), 0o12);
        assert_eq!(memory.peek(0o10000), 0o34);

        let small = Memory::with_modules(1);
        assert!(matches!(
            image.load_into(&small),
            Err(ImageError::AddressRange { address: 0o10000, .. })
        ));
        assert_eq!(small.peek(0o7777), 0);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(load_image("/nonexistent/image.b55"), Err(ImageError::Io(_))));
    }
}

//! Machine configuration loaded from JSON.
//!
//! ```json
//! { "rounding": "emode", "start_address": "0o20", "processor2": true,
//!   "cycle_budget": 100000, "memory_image": "boot.b55" }
//! ```
//!
//! Every field is optional. `start_address` may be a JSON number or an
//! octal string.

use crate::machine::DEFAULT_TICK_INTERVAL;
use crate::word::RoundingMode;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub rounding: RoundingMode,
    #[serde(deserialize_with = "octal_address")]
    pub start_address: u16,
    /// Install processor 2.
    pub processor2: bool,
    /// Processor 1 syllables to run before giving up.
    pub cycle_budget: u64,
    /// Processor 1 syllables per real-time clock tick.
    pub tick_interval: u64,
    pub memory_image: Option<PathBuf>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            rounding: RoundingMode::Legacy,
            start_address: 0o20,
            processor2: false,
            cycle_budget: 10_000,
            tick_interval: DEFAULT_TICK_INTERVAL,
            memory_image: None,
        }
    }
}

impl MachineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json_str(&text)
    }
}

/// Parse an octal address, with or without a `0o` prefix.
pub fn parse_octal_address(text: &str) -> Result<u16, String> {
    let digits = text.trim().trim_start_matches("0o");
    u16::from_str_radix(digits, 8)
        .ok()
        .filter(|&a| a <= 0o77777)
        .ok_or_else(|| format!("`{text}` is not an octal address below 0o100000"))
}

fn octal_address<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Address {
        Number(u16),
        Octal(String),
    }

    match Address::deserialize(deserializer)? {
        Address::Number(n) if n <= 0o77777 => Ok(n),
        Address::Number(n) => Err(serde::de::Error::custom(format!("address {n} out of range"))),
        Address::Octal(s) => parse_octal_address(&s).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("bad configuration: {0}")]
    Json(#[from] serde_json::Error),
}

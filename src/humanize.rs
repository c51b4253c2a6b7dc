//! Human-readable byte sizes for configuration values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const KIB: u64 = 1024;

/// Binary units, largest first
const UNITS: &[(&str, u64)] = &[
    ("GB", KIB * KIB * KIB),
    ("MB", KIB * KIB),
    ("KB", KIB),
    ("B", 1),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty size")]
    Empty,

    #[error("invalid number in size '{0}'")]
    InvalidNumber(String),

    #[error("unknown size unit '{0}'")]
    InvalidUnit(String),

    #[error("size '{0}' does not fit in 64 bits")]
    Overflow(String),
}

/// Byte count that reads `"512KB"`, `"1.5MB"` or a bare integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub const fn kib(n: u64) -> Self {
        Self(n * KIB)
    }

    pub const fn mib(n: u64) -> Self {
        Self(n * KIB * KIB)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn as_usize(&self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    match unit {
        "" | "B" => Some(1),
        "K" | "KB" | "KIB" => Some(KIB),
        "M" | "MB" | "MIB" => Some(KIB * KIB),
        "G" | "GB" | "GIB" => Some(KIB * KIB * KIB),
        _ => None,
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(ParseError::Empty);
        }

        let split = normalized
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(normalized.len());
        let (number, unit) = normalized.split_at(split);

        let multiplier =
            unit_multiplier(unit.trim()).ok_or_else(|| ParseError::InvalidUnit(unit.trim().to_string()))?;

        if let Ok(whole) = number.parse::<u64>() {
            return whole
                .checked_mul(multiplier)
                .map(ByteSize)
                .ok_or_else(|| ParseError::Overflow(s.to_string()));
        }

        let fractional: f64 = number
            .parse()
            .map_err(|_| ParseError::InvalidNumber(s.to_string()))?;
        let bytes = (fractional * multiplier as f64).round();
        if !bytes.is_finite() || bytes < 0.0 || bytes > u64::MAX as f64 {
            return Err(ParseError::Overflow(s.to_string()));
        }
        Ok(ByteSize(bytes as u64))
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bytes(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bytes(n) => Ok(ByteSize(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (unit, size) = UNITS
            .iter()
            .find(|(_, size)| self.0 >= *size && self.0 % size == 0)
            .copied()
            .unwrap_or(("B", 1));
        write!(f, "{}{unit}", self.0 / size)
    }
}

//! # Blockstamp
//!
//! `number-HASH` pair that identifies one block unambiguously, even across forks.

use crate::constants::SPECIAL_HASH;
use crate::errors::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference to a specific block: its number and its hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Blockstamp {
    pub number: u64,
    pub hash: String,
}

impl Blockstamp {
    pub fn new(number: u64, hash: impl Into<String>) -> Self {
        Self {
            number,
            hash: hash.into(),
        }
    }

    /// The virtual blockstamp referenced before genesis exists.
    pub fn special() -> Self {
        Self::new(0, SPECIAL_HASH)
    }

    pub fn is_special(&self) -> bool {
        self.number == 0 && self.hash == SPECIAL_HASH
    }
}

impl fmt::Display for Blockstamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.number, self.hash)
    }
}

impl FromStr for Blockstamp {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, hash) = s
            .split_once('-')
            .ok_or_else(|| ParseError::InvalidBlockstamp(s.to_string()))?;
        let number = number
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidBlockstamp(s.to_string()))?;
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseError::InvalidBlockstamp(s.to_string()));
        }
        Ok(Self::new(number, hash))
    }
}

impl TryFrom<String> for Blockstamp {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Blockstamp> for String {
    fn from(value: Blockstamp) -> Self {
        value.to_string()
    }
}

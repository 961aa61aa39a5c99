//! Base58 UIDs of Bricks and Bricklets.
//!
//! Tinkerforge devices are identified by a 32 bit UID that is printed on the
//! device (and reported by brickd) in a base58 encoding with its own alphabet.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const BASE58_ALPHABET: &[u8; 58] = b"123456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// A decoded device UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(pub u32);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0;
        let mut digits = Vec::new();
        loop {
            digits.push(BASE58_ALPHABET[(value % 58) as usize]);
            value /= 58;
            if value == 0 {
                break;
            }
        }
        digits.reverse();
        // The alphabet is ASCII
        f.write_str(&String::from_utf8_lossy(&digits))
    }
}

/// Errors returned when parsing a UID string.
#[derive(Error, Debug, PartialEq)]
pub enum ParseUidError {
    #[error("empty UID")]
    Empty,
    #[error("invalid UID: '{0}' is not a base58 digit")]
    InvalidDigit(char),
    #[error("UID is out-of-range: {0}")]
    OutOfRange(String),
}

impl FromStr for Uid {
    type Err = ParseUidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseUidError::Empty);
        }

        let mut value: u64 = 0;
        for c in s.chars() {
            let digit = BASE58_ALPHABET
                .iter()
                .position(|&d| char::from(d) == c)
                .ok_or(ParseUidError::InvalidDigit(c))?;
            value = value
                .checked_mul(58)
                .and_then(|v| v.checked_add(digit as u64))
                .filter(|&v| v <= u64::from(u32::MAX))
                .ok_or_else(|| ParseUidError::OutOfRange(s.to_string()))?;
        }

        match u32::try_from(value) {
            Ok(0) | Err(_) => Err(ParseUidError::OutOfRange(s.to_string())),
            Ok(uid) => Ok(Uid(uid)),
        }
    }
}

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a string is not 32 hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected 32 hex digits")]
pub struct GuidParseError;

/// A 128-bit identifier for peers and security groups.
///
/// Text and serialized form is 32 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Guid(u128);

impl Guid {
    /// Create a guid from its numeric value.
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Generate a random guid.
    ///
    /// # Errors
    ///
    /// Returns an error if the RNG fails.
    pub fn random() -> Result<Self, getrandom::Error> {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes)?;
        Ok(Self(u128::from_be_bytes(bytes)))
    }

    /// Numeric value of this guid.
    pub const fn value(&self) -> u128 {
        self.0
    }
}

impl From<u128> for Guid {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl Debug for Guid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Guid({self})")
    }
}

impl FromStr for Guid {
    type Err = GuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(GuidParseError);
        }
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| GuidParseError)
    }
}

impl From<Guid> for String {
    fn from(guid: Guid) -> Self {
        guid.to_string()
    }
}

impl TryFrom<String> for Guid {
    type Error = GuidParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

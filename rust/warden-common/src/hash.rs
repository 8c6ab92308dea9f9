use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// The size of a SHA-256 digest in bytes.
pub const DIGEST_SIZE: usize = 32;

/// A SHA-256 digest.
///
/// Commits to a canonical encoding, for example a manifest's rule list, so
/// the encoded value cannot be swapped without the digest changing.
///
/// ```rust
/// use warden_common::Digest;
///
/// let digest = Digest::hash(b"hello world");
/// assert_eq!(digest, Digest::hash(b"hello world"));
/// assert_ne!(digest, Digest::hash(b"hello world!"));
/// ```
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(#[serde(with = "crate::as_bytes")] [u8; DIGEST_SIZE]);

impl Digest {
    /// Computes the SHA-256 digest of the given bytes.
    pub fn hash(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(value: [u8; DIGEST_SIZE]) -> Self {
        Digest(value)
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

//! Serde helpers for fixed-size byte arrays.
//!
//! Use with `#[serde(with = "warden_common::as_bytes")]` on `[u8; N]`
//! fields. Serializing through `serialize_bytes` makes DAG-CBOR emit a byte
//! string instead of a list of integers, which keeps canonical encodings
//! compact.

use serde::{Deserialize, Deserializer, Serializer};

/// Serialize a fixed-size array as raw bytes.
pub fn serialize<S, const N: usize>(value: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_bytes(value)
}

/// Deserialize raw bytes into a fixed-size array, rejecting any other length.
pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
where
    D: Deserializer<'de>,
{
    let buf = serde_bytes::ByteBuf::deserialize(deserializer)?;
    let len = buf.len();
    <[u8; N]>::try_from(buf.into_vec())
        .map_err(|_| serde::de::Error::custom(format!("expected {N} bytes, got {len}")))
}

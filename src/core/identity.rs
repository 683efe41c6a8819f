//! Identity Types
//!
//! Fixed-width identifiers shared by every component:
//! - `Address`: 20-byte account identity (players, governors, modules)
//! - `QuestionId`: 32-byte opaque question tag
//!
//! Both serialize as `0x`-prefixed hex strings so they read the same in
//! JSON messages and logs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Byte length of an address.
pub const ADDRESS_LEN: usize = 20;

/// Byte length of a question identifier.
pub const QUESTION_ID_LEN: usize = 32;

/// Errors from parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityParseError {
    /// Not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    /// Decoded to the wrong number of bytes.
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Expected byte count.
        expected: usize,
        /// Decoded byte count.
        got: usize,
    },
    /// Label does not fit a 32-byte tag with a trailing zero.
    #[error("label too long: {0} bytes (max 31)")]
    LabelTooLong(usize),
}

/// Decode a `0x`-optional hex string into exactly `N` bytes.
pub(crate) fn parse_hex_fixed<const N: usize>(s: &str) -> Result<[u8; N], IdentityParseError> {
    let trimmed = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| IdentityParseError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(IdentityParseError::InvalidLength {
            expected: N,
            got: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

// =============================================================================
// ADDRESS
// =============================================================================

/// Account identity (address-equivalent key).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0; ADDRESS_LEN]);

    /// Create from raw bytes.
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Short form for log lines (first 4 bytes).
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl FromStr for Address {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex_fixed::<ADDRESS_LEN>(s).map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// QUESTION ID
// =============================================================================

/// Opaque 32-byte question tag. Equality is the only meaningful operation.
///
/// Ordering is byte-wise and drives deterministic question selection.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct QuestionId(pub [u8; QUESTION_ID_LEN]);

impl QuestionId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; QUESTION_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Encode a short UTF-8 label, zero-padded on the right.
    ///
    /// At most 31 bytes so the tag always ends in a zero byte
    /// (same layout as `formatBytes32String`).
    pub fn from_label(label: &str) -> Result<Self, IdentityParseError> {
        let bytes = label.as_bytes();
        if bytes.len() >= QUESTION_ID_LEN {
            return Err(IdentityParseError::LabelTooLong(bytes.len()));
        }
        let mut out = [0u8; QUESTION_ID_LEN];
        out[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Decode a label written by `from_label`, if the tag is one.
    pub fn label(&self) -> Option<String> {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(QUESTION_ID_LEN);
        if self.0[end..].iter().any(|b| *b != 0) {
            return None;
        }
        String::from_utf8(self.0[..end].to_vec()).ok()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; QUESTION_ID_LEN] {
        &self.0
    }

    /// High and low 16-byte halves.
    pub fn halves(&self) -> ([u8; 16], [u8; 16]) {
        let mut hi = [0u8; 16];
        let mut lo = [0u8; 16];
        hi.copy_from_slice(&self.0[..16]);
        lo.copy_from_slice(&self.0[16..]);
        (hi, lo)
    }

    /// Lowercase `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for QuestionId {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex_fixed::<QUESTION_ID_LEN>(s).map(Self)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) if !label.is_empty() => write!(f, "\"{}\"", label),
            _ => f.write_str(&self.to_hex()),
        }
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self)
    }
}

impl Serialize for QuestionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for QuestionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

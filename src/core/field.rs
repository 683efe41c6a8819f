//! Field Element Encoding
//!
//! 256-bit big-endian values as carried by proofs and public inputs.
//! The proof system's curve arithmetic is opaque to the game, so this type
//! only knows how to embed game data and how to range-check against the
//! BN254 moduli.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::identity::{parse_hex_fixed, IdentityParseError};

/// Byte width of a field element.
pub const FIELD_BYTES: usize = 32;

/// BN254 base field modulus `p` (curve point coordinates live below this).
pub const BN254_BASE_MODULUS: [u8; FIELD_BYTES] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x97, 0x81, 0x6a, 0x91, 0x68, 0x71, 0xca, 0x8d, 0x3c, 0x20, 0x8c, 0x16, 0xd8, 0x7c, 0xfd, 0x47,
];

/// BN254 scalar field modulus `r` (public inputs live below this).
pub const BN254_SCALAR_MODULUS: [u8; FIELD_BYTES] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// A 256-bit field element, big-endian.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FieldElement(pub [u8; FIELD_BYTES]);

impl FieldElement {
    /// Zero.
    pub const ZERO: FieldElement = FieldElement([0; FIELD_BYTES]);

    /// Create from big-endian bytes.
    pub const fn new(bytes: [u8; FIELD_BYTES]) -> Self {
        Self(bytes)
    }

    /// Embed a u64.
    pub fn from_u64(value: u64) -> Self {
        let mut out = [0u8; FIELD_BYTES];
        out[FIELD_BYTES - 8..].copy_from_slice(&value.to_be_bytes());
        Self(out)
    }

    /// Embed up to 32 big-endian bytes, right-aligned.
    ///
    /// Returns None if the slice is wider than a field element.
    pub fn from_be_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > FIELD_BYTES {
            return None;
        }
        let mut out = [0u8; FIELD_BYTES];
        out[FIELD_BYTES - bytes.len()..].copy_from_slice(bytes);
        Some(Self(out))
    }

    /// Map a 32-byte digest into the field by clearing the top three bits.
    ///
    /// The result is below 2^253 and therefore below both BN254 moduli.
    pub fn from_digest(mut digest: [u8; FIELD_BYTES]) -> Self {
        digest[0] &= 0x1f;
        Self(digest)
    }

    /// Parse a base-10 string of ASCII digits.
    ///
    /// Returns None for signs, separators, or values wider than 256 bits.
    pub fn from_decimal_str(s: &str) -> Option<Self> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value = BigUint::parse_bytes(s.as_bytes(), 10)?;
        Self::from_be_slice(&value.to_bytes_be())
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; FIELD_BYTES] {
        &self.0
    }

    /// Is this zero?
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Is this a canonical base-field element (coordinate range)?
    pub fn is_canonical_base(&self) -> bool {
        self.0 < BN254_BASE_MODULUS
    }

    /// Is this a canonical scalar-field element (public-input range)?
    pub fn is_canonical_scalar(&self) -> bool {
        self.0 < BN254_SCALAR_MODULUS
    }

    /// Lowercase `0x`-prefixed hex, 64 digits.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for FieldElement {
    type Err = IdentityParseError;

    /// Accepts `0x`-prefixed hex (exactly 32 bytes) or a base-10 string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("0x") || s.starts_with("0X") {
            return parse_hex_fixed::<FIELD_BYTES>(s).map(Self);
        }
        Self::from_decimal_str(s)
            .ok_or_else(|| IdentityParseError::InvalidHex(format!("not a field element: {}", s)))
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fe({})", self.to_hex())
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

struct FieldElementVisitor;

impl<'de> Visitor<'de> for FieldElementVisitor {
    type Value = FieldElement;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 0x-prefixed hex string, a decimal string, or an unsigned integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldElement, E> {
        Ok(FieldElement::from_u64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldElement, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Binary formats cannot self-describe; they always carry the hex string.
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(FieldElementVisitor)
        } else {
            deserializer.deserialize_str(FieldElementVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moduli_ordering() {
        // r < p on BN254
        assert!(BN254_SCALAR_MODULUS < BN254_BASE_MODULUS);
        assert!(!FieldElement(BN254_BASE_MODULUS).is_canonical_base());
        assert!(FieldElement(BN254_SCALAR_MODULUS).is_canonical_base());
        assert!(!FieldElement(BN254_SCALAR_MODULUS).is_canonical_scalar());
    }

    #[test]
    fn test_from_digest_is_canonical() {
        let fe = FieldElement::from_digest([0xFF; 32]);
        assert!(fe.is_canonical_scalar());
        assert!(fe.is_canonical_base());
    }

    #[test]
    fn test_decimal_parse() {
        assert_eq!(FieldElement::from_decimal_str("2"), Some(FieldElement::from_u64(2)));
        assert_eq!(
            FieldElement::from_decimal_str("18446744073709551615"),
            Some(FieldElement::from_u64(u64::MAX))
        );
        // p in decimal
        let p = "21888242871839275222246405745257275088696311157297823662689037894645226208583";
        assert_eq!(FieldElement::from_decimal_str(p), Some(FieldElement(BN254_BASE_MODULUS)));
        assert_eq!(FieldElement::from_decimal_str("0"), Some(FieldElement::ZERO));
        assert_eq!(FieldElement::from_decimal_str("12a"), None);
        assert_eq!(FieldElement::from_decimal_str("+2"), None);
        assert_eq!(FieldElement::from_decimal_str("1_000"), None);
        assert_eq!(FieldElement::from_decimal_str(""), None);
    }

    #[test]
    fn test_decimal_overflow() {
        let too_big = "9".repeat(80);
        assert_eq!(FieldElement::from_decimal_str(&too_big), None);
        // 2^256 - 1 fits, 2^256 does not
        let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        let over = "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert_eq!(FieldElement::from_decimal_str(max), Some(FieldElement([0xFF; 32])));
        assert_eq!(FieldElement::from_decimal_str(over), None);
    }

    #[test]
    fn test_from_be_slice() {
        let fe = FieldElement::from_be_slice(&[1, 2]).unwrap();
        assert_eq!(fe.0[30], 1);
        assert_eq!(fe.0[31], 2);
        assert!(FieldElement::from_be_slice(&[0; 33]).is_none());
    }

    #[test]
    fn test_json_accepts_numbers_and_strings() {
        let from_num: FieldElement = serde_json::from_str("2").unwrap();
        let from_dec: FieldElement = serde_json::from_str("\"2\"").unwrap();
        let from_hex: FieldElement =
            serde_json::from_str(&format!("\"0x{}02\"", "00".repeat(31))).unwrap();
        assert_eq!(from_num, FieldElement::from_u64(2));
        assert_eq!(from_dec, from_num);
        assert_eq!(from_hex, from_num);
    }
}

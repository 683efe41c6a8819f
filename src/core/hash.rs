//! Domain-Separated Hashing
//!
//! Provides deterministic SHA-256 hashing for:
//! - Engine state digests (atomicity checks, audit)
//! - Event log chaining
//! - Verification key fingerprints and development proofs

use sha2::{Digest as _, Sha256};

use super::field::FieldElement;
use super::identity::{Address, QuestionId};

/// Hash output type (256 bits / 32 bytes)
pub type Digest = [u8; 32];

/// Domain for engine state digests.
pub const ENGINE_STATE_DOMAIN: &[u8] = b"PROOFGAME_ENGINE_STATE_V1";

/// Domain for question module state digests.
pub const MODULE_STATE_DOMAIN: &[u8] = b"PROOFGAME_MODULE_STATE_V1";

/// Domain for event log chaining.
pub const EVENT_CHAIN_DOMAIN: &[u8] = b"PROOFGAME_EVENT_V1";

/// Domain for verification key fingerprints.
pub const VERIFICATION_KEY_DOMAIN: &[u8] = b"PROOFGAME_VK_V1";

/// Deterministic hasher for game data.
///
/// Wraps SHA-256 with typed update helpers.
/// Order of updates is critical for determinism.
pub struct DomainHasher {
    hasher: Sha256,
}

impl DomainHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for engine state.
    pub fn for_engine_state() -> Self {
        Self::new(ENGINE_STATE_DOMAIN)
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with an address.
    #[inline]
    pub fn update_address(&mut self, address: &Address) {
        self.hasher.update(address.as_bytes());
    }

    /// Update with a question id.
    #[inline]
    pub fn update_question(&mut self, id: &QuestionId) {
        self.hasher.update(id.as_bytes());
    }

    /// Update with a field element.
    #[inline]
    pub fn update_field(&mut self, value: &FieldElement) {
        self.hasher.update(value.as_bytes());
    }

    /// Update with an optional value, tagging presence.
    pub fn update_option<T>(&mut self, value: Option<&T>, mut f: impl FnMut(&mut Self, &T)) {
        match value {
            Some(v) => {
                self.update_u8(1);
                f(self, v);
            }
            None => self.update_u8(0),
        }
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> Digest {
        self.hasher.finalize().into()
    }
}

/// Compute a simple hash of arbitrary data.
pub fn hash_bytes(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// Compute hash with domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}

//! Verification API
//!
//! Interface for external Groth16 verification plus a deterministic
//! development verifier.
//!
//! The game treats verification as a black box:
//! `verify(vk, public_inputs, proof) -> accept | reject`. A pairing-based
//! backend plugs into `ProofVerifier` without touching the game.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::field::FieldElement;
use crate::core::hash::{hash_with_domain, Digest, DomainHasher, VERIFICATION_KEY_DOMAIN};
use crate::proof::groth16::{G1Point, G2Point, Groth16Proof};

#[cfg(feature = "debug-tracing")]
use tracing::trace;

/// Domain for development proof commitments.
const DIGEST_PROOF_DOMAIN: &[u8] = b"PROOFGAME_DIGEST_PROOF_V1";

/// Domain for development key and witness points.
const DEV_POINT_DOMAIN: &[u8] = b"PROOFGAME_DEV_POINT_V1";

// =============================================================================
// VERIFICATION KEY
// =============================================================================

/// Groth16 verification key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationKey {
    /// `alpha` in G1.
    pub alpha: G1Point,
    /// `beta` in G2.
    pub beta: G2Point,
    /// `gamma` in G2.
    pub gamma: G2Point,
    /// `delta` in G2.
    pub delta: G2Point,
    /// Input commitments; one per public input plus the constant term.
    pub ic: Vec<G1Point>,
}

impl VerificationKey {
    /// Number of public inputs the key accepts.
    pub fn input_count(&self) -> usize {
        self.ic.len().saturating_sub(1)
    }

    /// Digest over every key coordinate.
    pub fn digest(&self) -> Digest {
        let mut hasher = DomainHasher::new(VERIFICATION_KEY_DOMAIN);
        hash_g1(&mut hasher, &self.alpha);
        for g2 in [&self.beta, &self.gamma, &self.delta] {
            for c in g2.x.iter().chain(g2.y.iter()) {
                hasher.update_field(c);
            }
        }
        hasher.update_u32(self.ic.len() as u32);
        for point in &self.ic {
            hash_g1(&mut hasher, point);
        }
        hasher.finalize()
    }

    /// Deterministic key for development and tests.
    ///
    /// Points are hash-derived, not curve points; only `DigestVerifier`
    /// understands them.
    pub fn development(input_count: usize, seed: &[u8]) -> Self {
        let mut index = 0u32;
        let mut next = || {
            index += 1;
            dev_element(seed, index)
        };

        let alpha = G1Point::new(next(), next());
        let beta = G2Point::new([next(), next()], [next(), next()]);
        let gamma = G2Point::new([next(), next()], [next(), next()]);
        let delta = G2Point::new([next(), next()], [next(), next()]);
        let ic = (0..=input_count)
            .map(|_| G1Point::new(next(), next()))
            .collect();

        Self { alpha, beta, gamma, delta, ic }
    }
}

fn hash_g1(hasher: &mut DomainHasher, point: &G1Point) {
    hasher.update_field(&point.x);
    hasher.update_field(&point.y);
}

fn dev_element(seed: &[u8], index: u32) -> FieldElement {
    let mut data = seed.to_vec();
    data.extend_from_slice(&index.to_be_bytes());
    FieldElement::from_digest(hash_with_domain(DEV_POINT_DOMAIN, &data))
}

// =============================================================================
// VERIFIER TRAIT
// =============================================================================

/// Groth16 verification backend.
pub trait ProofVerifier: Send + Sync {
    /// Verify `proof` against `public_inputs` under `vk`.
    ///
    /// `Ok(false)` is a rejection; `Err` means the backend could not decide.
    fn verify(
        &self,
        vk: &VerificationKey,
        public_inputs: &[FieldElement],
        proof: &Groth16Proof,
    ) -> Result<bool, ProofVerificationError>;

    /// Does acceptance imply knowledge of a witness?
    fn is_sound(&self) -> bool {
        true
    }
}

/// Errors during proof verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofVerificationError {
    /// Public-input vector does not match the key.
    #[error("expected {expected} public inputs, got {got}")]
    InputLengthMismatch {
        /// Inputs the key accepts.
        expected: usize,
        /// Inputs supplied.
        got: usize,
    },

    /// Proof format is invalid.
    #[error("invalid proof format: {0}")]
    InvalidProofFormat(String),

    /// Backend failed to run.
    #[error("verifier backend failed: {0}")]
    Backend(String),
}

// =============================================================================
// DEVELOPMENT VERIFIER
// =============================================================================

/// Deterministic verifier for development and tests.
///
/// A proof is accepted iff `A` is not the zero point and `C` equals a
/// SHA-256 commitment over the key digest, the public inputs, `A` and `B`.
/// Anyone can mint a proof for any statement, so it has no soundness;
/// replace it with a pairing backend in production.
#[derive(Clone, Copy, Debug, Default)]
pub struct DigestVerifier;

impl DigestVerifier {
    /// Create a verifier.
    pub fn new() -> Self {
        Self
    }

    /// Produce a proof this verifier accepts.
    ///
    /// `witness` only seeds `A` and `B`; any witness yields a valid proof.
    pub fn prove(
        &self,
        vk: &VerificationKey,
        public_inputs: &[FieldElement],
        witness: &[u8],
    ) -> Result<Groth16Proof, ProofVerificationError> {
        check_input_length(vk, public_inputs)?;

        let mut proof = Groth16Proof {
            a: G1Point::new(witness_element(witness, 0), witness_element(witness, 1)),
            b: G2Point::new(
                [witness_element(witness, 2), witness_element(witness, 3)],
                [witness_element(witness, 4), witness_element(witness, 5)],
            ),
            c: G1Point::default(),
        };
        if proof.a.is_zero() {
            proof.a.x = FieldElement::from_u64(1);
        }
        proof.c = commitment(vk, public_inputs, &proof);
        Ok(proof)
    }
}

impl ProofVerifier for DigestVerifier {
    fn verify(
        &self,
        vk: &VerificationKey,
        public_inputs: &[FieldElement],
        proof: &Groth16Proof,
    ) -> Result<bool, ProofVerificationError> {
        check_input_length(vk, public_inputs)?;

        #[cfg(feature = "debug-tracing")]
        trace!(
            "Verifying against inputs [{}]",
            public_inputs.iter().map(|e| e.to_hex()).collect::<Vec<_>>().join(", ")
        );

        if proof.a.is_zero() {
            return Ok(false);
        }
        Ok(proof.c == commitment(vk, public_inputs, proof))
    }

    fn is_sound(&self) -> bool {
        false
    }
}

fn check_input_length(
    vk: &VerificationKey,
    public_inputs: &[FieldElement],
) -> Result<(), ProofVerificationError> {
    if vk.ic.is_empty() || public_inputs.len() != vk.input_count() {
        return Err(ProofVerificationError::InputLengthMismatch {
            expected: vk.input_count(),
            got: public_inputs.len(),
        });
    }
    Ok(())
}

fn commitment(vk: &VerificationKey, public_inputs: &[FieldElement], proof: &Groth16Proof) -> G1Point {
    let mut hasher = DomainHasher::new(DIGEST_PROOF_DOMAIN);
    hasher.update_bytes(&vk.digest());
    hasher.update_u32(public_inputs.len() as u32);
    for input in public_inputs {
        hasher.update_field(input);
    }
    hasher.update_bytes(&proof.ab_bytes());
    let x = hasher.finalize();
    let y = hash_with_domain(DIGEST_PROOF_DOMAIN, &x);
    G1Point::new(FieldElement::from_digest(x), FieldElement::from_digest(y))
}

fn witness_element(witness: &[u8], index: u8) -> FieldElement {
    let mut data = witness.to_vec();
    data.push(index);
    FieldElement::from_digest(hash_with_domain(DEV_POINT_DOMAIN, &data))
}

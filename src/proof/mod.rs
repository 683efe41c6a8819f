//! Proof System Boundary
//!
//! Everything the game knows about zero-knowledge proofs:
//! - Groth16 proof shape and range checks
//! - Public-input encoding of questions
//! - The verifier interface and a development verifier
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF BOUNDARY                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  groth16.rs       - (A, B, C) points, wire layout           │
//! │  public_inputs.rs - [qid_hi, qid_lo, tier, module, claimant]│
//! │  verify.rs        - ProofVerifier, VerificationKey          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod groth16;
pub mod public_inputs;
pub mod verify;

// Re-export key types
pub use groth16::{G1Point, G2Point, Groth16Proof};
pub use public_inputs::{
    address_element, public_input_count, QuestionPublicInputs, QuestionTemplate,
    TEMPLATE_ELEMENT_COUNT,
};
pub use verify::{DigestVerifier, ProofVerificationError, ProofVerifier, VerificationKey};

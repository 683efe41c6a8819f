//! Core primitives.
//!
//! Identifiers, field encoding and hashing shared by the game engine,
//! the question modules and the proof layer.

pub mod field;
pub mod hash;
pub mod identity;

// Re-export core types
pub use field::FieldElement;
pub use hash::{Digest, DomainHasher};
pub use identity::{Address, IdentityParseError, QuestionId};

//! # Proofgame Server
//!
//! Proof-gated question game: players join governed lobbies, every lobby is
//! handed one question by a whitelisted question module, and a player leaves
//! the lobby by submitting a zero-knowledge proof of the answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOFGAME SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Identifiers, field encoding, hashing    │
//! │                                                              │
//! │  game/             - Lobby engine (deterministic)            │
//! │  ├── governance.rs - Governor set and gate                   │
//! │  ├── engine.rs     - Register, assign, report answered       │
//! │  └── events.rs     - Hash-chained event log                  │
//! │                                                              │
//! │  questions/        - Question modules                        │
//! │  └── bank.rs       - Governor-curated, proof-answered bank   │
//! │                                                              │
//! │  proof/            - Groth16 shape, public inputs, verifier  │
//! │  ledger.rs         - Engine + modules as one state machine   │
//! │                                                              │
//! │  network/          - Networking (non-deterministic)          │
//! │  ├── server.rs     - WebSocket server                        │
//! │  ├── protocol.rs   - Message types                           │
//! │  ├── session.rs    - Connections and wait clocks             │
//! │  └── auth.rs       - JWT validation                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Atomicity
//!
//! Every ledger operation either completes or fails with a `GameError` and
//! leaves the engine and every module unchanged. A rejected proof is not an
//! error; it returns `Ok(false)`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod ledger;
pub mod network;
pub mod proof;
pub mod questions;

// Re-export commonly used types
pub use crate::config::GameConfig;
pub use crate::core::identity::{Address, QuestionId};
pub use game::engine::LobbyEngine;
pub use game::error::GameError;
pub use game::governance::GovernanceGate;
pub use game::player::PlayerStatus;
pub use ledger::GameLedger;
pub use proof::groth16::Groth16Proof;
pub use proof::verify::{DigestVerifier, ProofVerifier};
pub use questions::bank::QuestionBank;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Game Logic Module
//!
//! The lobby engine and its state. Deterministic: no clocks, no randomness,
//! ordered collections only.
//!
//! ## Module Structure
//!
//! - `governance`: Governor set and authorization gate
//! - `player`: Player records and status state machine
//! - `lobby`: Lobbies and the context handed to question modules
//! - `events`: Hash-chained event log
//! - `engine`: Registration, assignment and answer reporting
//! - `error`: Error type shared by the engine, modules and ledger

pub mod governance;
pub mod player;
pub mod lobby;
pub mod events;
pub mod engine;
pub mod error;

// Re-export key types
pub use governance::{GovernanceGate, GovernorSet};
pub use player::{Player, PlayerStatus};
pub use lobby::{Lobby, LobbyContext, LobbyId, LobbyPhase};
pub use events::{EventLog, GameEvent, GameEventData};
pub use engine::{LobbyEngine, ModuleRegistration};
pub use error::GameError;

//! Question Module Interface
//!
//! The capability the engine dispatches through. The engine never inspects
//! a module's concrete type; it only knows its address, its lobby size and
//! how to ask it for a question.

use crate::core::identity::{Address, QuestionId};
use crate::game::error::GameError;
use crate::game::lobby::LobbyContext;

/// A pluggable question family.
pub trait QuestionModule {
    /// Address the module is registered under.
    fn address(&self) -> Address;

    /// Number of players that fills one of this module's lobbies.
    fn lobby_size(&self) -> usize;

    /// Pick a question for a lobby that just filled.
    ///
    /// Must leave the module unchanged when it returns an error.
    fn issue_question(&mut self, lobby: &LobbyContext) -> Result<QuestionId, GameError>;
}

//! Player Records
//!
//! Players are created on first registration and never deleted; a finished
//! round returns them to `Unregistered` so the record stays auditable.

use serde::{Deserialize, Serialize};

use crate::core::identity::{Address, QuestionId};
use crate::game::lobby::LobbyId;

/// Per-player state machine.
///
/// `Unregistered -> Waiting -> Assigned -> Unregistered`, plus
/// `Waiting -> Unregistered` through withdrawal and
/// `Assigned -> Unregistered` through forfeit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlayerStatus {
    /// No active assignment.
    #[default]
    Unregistered,
    /// In a lobby that has not filled yet.
    Waiting {
        /// Lobby joined.
        lobby: LobbyId,
    },
    /// In a full lobby with a question.
    Assigned {
        /// Lobby joined.
        lobby: LobbyId,
        /// Question shared by the lobby.
        question: QuestionId,
    },
}

impl PlayerStatus {
    /// Is the player holding a lobby slot?
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Unregistered)
    }

    /// Current lobby.
    pub fn lobby(&self) -> Option<LobbyId> {
        match self {
            Self::Unregistered => None,
            Self::Waiting { lobby } | Self::Assigned { lobby, .. } => Some(*lobby),
        }
    }

    /// Current question.
    pub fn question(&self) -> Option<QuestionId> {
        match self {
            Self::Assigned { question, .. } => Some(*question),
            _ => None,
        }
    }
}

/// A player known to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Identity.
    pub address: Address,
    /// State machine position.
    pub status: PlayerStatus,
    /// Tier requested at the latest registration.
    pub tier: u8,
    /// Ledger sequence of the latest registration.
    pub registered_seq: u64,
    /// Rounds answered successfully.
    pub rounds_completed: u32,
}

impl Player {
    /// Fresh record.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            status: PlayerStatus::Unregistered,
            tier: 0,
            registered_seq: 0,
            rounds_completed: 0,
        }
    }

    /// Is the player holding a lobby slot?
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accessors() {
        let q = QuestionId::from_label("q").unwrap();
        assert!(!PlayerStatus::Unregistered.is_active());
        assert_eq!(PlayerStatus::Waiting { lobby: LobbyId(1) }.lobby(), Some(LobbyId(1)));
        assert_eq!(PlayerStatus::Waiting { lobby: LobbyId(1) }.question(), None);

        let assigned = PlayerStatus::Assigned { lobby: LobbyId(2), question: q };
        assert!(assigned.is_active());
        assert_eq!(assigned.question(), Some(q));
    }

    #[test]
    fn test_status_json_shape() {
        let json = serde_json::to_string(&PlayerStatus::Waiting { lobby: LobbyId(4) }).unwrap();
        assert_eq!(json, r#"{"state":"waiting","lobby":4}"#);
    }
}

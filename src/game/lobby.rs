//! Lobbies
//!
//! A lobby groups players who requested the same `(module, tier)` and, once
//! full, share one question from that module.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::identity::{Address, QuestionId};

/// Lobby identifier (sequential per engine).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LobbyId(pub u64);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lobby-{}", self.0)
    }
}

/// Lobby phase, derived from whether a question has been stamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyPhase {
    /// Accepting players.
    Open,
    /// Full; every member shares the assigned question.
    Assigned,
}

/// What a module sees when asked to issue a question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyContext {
    /// Lobby being filled.
    pub lobby: LobbyId,
    /// Module serving the lobby.
    pub module: Address,
    /// Difficulty tier requested by every member.
    pub tier: u8,
    /// Members in address order, including the player whose registration fills it.
    pub members: Vec<Address>,
}

/// A group of players sharing a question context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    /// Lobby identifier.
    pub id: LobbyId,
    /// Module serving this lobby.
    pub module: Address,
    /// Difficulty tier.
    pub tier: u8,
    /// Player count at which the lobby fills.
    pub capacity: usize,
    members: BTreeSet<Address>,
    question: Option<QuestionId>,
}

impl Lobby {
    /// Create an empty open lobby.
    pub fn new(id: LobbyId, module: Address, tier: u8, capacity: usize) -> Self {
        Self {
            id,
            module,
            tier,
            capacity: capacity.max(1),
            members: BTreeSet::new(),
            question: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> LobbyPhase {
        if self.question.is_some() {
            LobbyPhase::Assigned
        } else {
            LobbyPhase::Open
        }
    }

    /// Members in address order.
    pub fn members(&self) -> impl Iterator<Item = &Address> {
        self.members.iter()
    }

    /// Member count.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Is the address a member?
    pub fn contains(&self, player: &Address) -> bool {
        self.members.contains(player)
    }

    /// Is the lobby empty?
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Would adding one more player fill the lobby?
    pub fn fills_with_one_more(&self) -> bool {
        self.members.len() + 1 >= self.capacity
    }

    /// Assigned question, if full.
    pub fn question(&self) -> Option<QuestionId> {
        self.question
    }

    /// Context handed to the module when the given player completes the lobby.
    pub fn context_with(&self, joining: Address) -> LobbyContext {
        let mut members = self.members.clone();
        members.insert(joining);
        LobbyContext {
            lobby: self.id,
            module: self.module,
            tier: self.tier,
            members: members.into_iter().collect(),
        }
    }

    pub(crate) fn add_member(&mut self, player: Address) -> bool {
        self.members.insert(player)
    }

    pub(crate) fn remove_member(&mut self, player: &Address) -> bool {
        self.members.remove(player)
    }

    pub(crate) fn assign_question(&mut self, question: QuestionId) {
        self.question = Some(question);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn test_fill_tracking() {
        let mut lobby = Lobby::new(LobbyId(0), addr(9), 5, 2);
        assert_eq!(lobby.phase(), LobbyPhase::Open);
        assert!(!lobby.fills_with_one_more());

        lobby.add_member(addr(1));
        assert!(lobby.fills_with_one_more());
    }

    #[test]
    fn test_context_includes_joining_player_sorted() {
        let mut lobby = Lobby::new(LobbyId(3), addr(9), 1, 2);
        lobby.add_member(addr(5));

        let ctx = lobby.context_with(addr(2));
        assert_eq!(ctx.lobby, LobbyId(3));
        assert_eq!(ctx.members, vec![addr(2), addr(5)]);
        // Context building does not mutate the lobby
        assert_eq!(lobby.member_count(), 1);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let lobby = Lobby::new(LobbyId(0), addr(9), 0, 0);
        assert_eq!(lobby.capacity, 1);
        assert!(lobby.fills_with_one_more());
    }

    #[test]
    fn test_assign_question() {
        let mut lobby = Lobby::new(LobbyId(0), addr(9), 0, 1);
        let q = QuestionId::from_label("q").unwrap();
        lobby.assign_question(q);
        assert_eq!(lobby.phase(), LobbyPhase::Assigned);
        assert_eq!(lobby.question(), Some(q));
    }
}

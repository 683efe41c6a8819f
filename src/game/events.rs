//! Game Events
//!
//! Append-only log of successful state transitions. Each entry chains the
//! digest of the previous one so the history can be audited after the fact.
//! `QuestionAnswered` is the signal the reward collaborator listens for.

use serde::{Deserialize, Serialize};

use crate::core::hash::{Digest, DomainHasher, EVENT_CHAIN_DOMAIN};
use crate::core::identity::{Address, QuestionId};
use crate::game::lobby::LobbyId;

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEventData {
    /// Governor set grew.
    GovernorAdded {
        /// Governor who made the change.
        by: Address,
        /// New governor.
        governor: Address,
    },

    /// Governor set shrank.
    GovernorRemoved {
        /// Governor who made the change.
        by: Address,
        /// Removed governor.
        governor: Address,
    },

    /// Module authorized for registrations.
    ModuleAuthorized {
        /// Governor who made the change.
        by: Address,
        /// Module address.
        module: Address,
    },

    /// Module trust withdrawn; its lobbies were reset.
    ModuleRevoked {
        /// Governor who made the change.
        by: Address,
        /// Module address.
        module: Address,
        /// Members of the discarded lobbies, now unregistered.
        released_players: Vec<Address>,
    },

    /// Question stored in a module.
    QuestionAdded {
        /// Owning module.
        module: Address,
        /// Question id.
        question: QuestionId,
        /// Difficulty tier.
        tier: u8,
    },

    /// Question removed from future issuance.
    QuestionDeactivated {
        /// Owning module.
        module: Address,
        /// Question id.
        question: QuestionId,
    },

    /// Player joined a lobby.
    PlayerRegistered {
        /// Player.
        player: Address,
        /// Lobby joined.
        lobby: LobbyId,
        /// Module serving the lobby.
        module: Address,
        /// Requested tier.
        tier: u8,
    },

    /// Player left an open lobby.
    PlayerWithdrawn {
        /// Player.
        player: Address,
        /// Lobby left.
        lobby: LobbyId,
    },

    /// Lobby filled and received its question.
    QuestionAssigned {
        /// Lobby.
        lobby: LobbyId,
        /// Module that issued the question.
        module: Address,
        /// Issued question.
        question: QuestionId,
        /// Every member, in join order.
        members: Vec<Address>,
    },

    /// Player proved an answer; eligible for rewards.
    QuestionAnswered {
        /// Player.
        player: Address,
        /// Lobby left.
        lobby: LobbyId,
        /// Module that accepted the proof.
        module: Address,
        /// Answered question.
        question: QuestionId,
    },

    /// Player gave up an assigned question without answering.
    QuestionForfeited {
        /// Player.
        player: Address,
        /// Lobby left.
        lobby: LobbyId,
        /// Module serving the lobby.
        module: Address,
        /// Abandoned question.
        question: QuestionId,
    },
}

impl GameEventData {
    /// Player directly concerned by the event, if any.
    pub fn player(&self) -> Option<Address> {
        match self {
            Self::PlayerRegistered { player, .. }
            | Self::PlayerWithdrawn { player, .. }
            | Self::QuestionAnswered { player, .. }
            | Self::QuestionForfeited { player, .. } => Some(*player),
            _ => None,
        }
    }
}

/// A logged event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Position in the log (0-based).
    pub seq: u64,
    /// Event data.
    pub data: GameEventData,
    /// Chain digest: H(previous chain, seq, data).
    pub chain: Digest,
}

/// Hash-chained event log.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<GameEvent>,
    head: Digest,
}

impl EventLog {
    /// Empty log with a zero head.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its sequence number.
    pub fn record(&mut self, data: GameEventData) -> u64 {
        let seq = self.events.len() as u64;
        let chain = chain_digest(&self.head, seq, &data);
        self.head = chain;
        self.events.push(GameEvent { seq, data, chain });
        seq
    }

    /// Sequence number the next event will get.
    pub fn next_seq(&self) -> u64 {
        self.events.len() as u64
    }

    /// Digest of the latest event (zero when empty).
    pub fn head(&self) -> Digest {
        self.head
    }

    /// All events.
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Events with `seq >= from`.
    pub fn since(&self, from: u64) -> &[GameEvent] {
        let start = (from as usize).min(self.events.len());
        &self.events[start..]
    }

    /// Recompute the chain from scratch.
    pub fn verify_chain(&self) -> bool {
        let mut head = [0u8; 32];
        for (i, event) in self.events.iter().enumerate() {
            if event.seq != i as u64 {
                return false;
            }
            head = chain_digest(&head, event.seq, &event.data);
            if head != event.chain {
                return false;
            }
        }
        head == self.head
    }
}

fn chain_digest(prev: &Digest, seq: u64, data: &GameEventData) -> Digest {
    let mut hasher = DomainHasher::new(EVENT_CHAIN_DOMAIN);
    hasher.update_bytes(prev);
    hasher.update_u64(seq);
    hasher.update_bytes(&bincode::serialize(data).expect("Event data serialization should not fail"));
    hasher.finalize()
}

//! Lobby Engine
//!
//! Owns global player state, lobby assignment and the module whitelist.
//! Every operation validates all of its preconditions and performs its
//! fallible module call before the first write, so a failed call leaves
//! the engine exactly as it was.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::hash::{Digest, DomainHasher};
use crate::core::identity::{Address, QuestionId};
use crate::game::error::GameError;
use crate::game::events::{EventLog, GameEvent, GameEventData};
use crate::game::governance::{GovernanceGate, GovernorSet};
use crate::game::lobby::{Lobby, LobbyId};
use crate::game::player::{Player, PlayerStatus};
use crate::questions::module::QuestionModule;

/// Whitelist entry for a question module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRegistration {
    /// Trusted for registrations and answer reports.
    pub authorized: bool,
    /// Governor that last changed the entry.
    pub updated_by: Address,
}

/// The game core.
#[derive(Clone, Debug)]
pub struct LobbyEngine {
    gate: GovernanceGate,
    modules: BTreeMap<Address, ModuleRegistration>,
    players: BTreeMap<Address, Player>,
    lobbies: BTreeMap<LobbyId, Lobby>,
    /// Open lobby per (module, tier).
    open_lobbies: BTreeMap<(Address, u8), LobbyId>,
    next_lobby_id: u64,
    events: EventLog,
}

impl LobbyEngine {
    /// Create an engine with its genesis governors.
    pub fn new(governors: GovernorSet) -> Self {
        Self {
            gate: GovernanceGate::new(governors),
            modules: BTreeMap::new(),
            players: BTreeMap::new(),
            lobbies: BTreeMap::new(),
            open_lobbies: BTreeMap::new(),
            next_lobby_id: 0,
            events: EventLog::new(),
        }
    }

    // =========================================================================
    // GOVERNANCE
    // =========================================================================

    /// The authorization gate, shared with question modules.
    pub fn governance(&self) -> &GovernanceGate {
        &self.gate
    }

    /// Add a governor (governors only).
    pub fn add_governor(&mut self, caller: Address, governor: Address) -> Result<(), GameError> {
        if self.gate.add_governor(&caller, governor)? {
            info!("Governor {} added by {}", governor.short(), caller.short());
            self.events.record(GameEventData::GovernorAdded { by: caller, governor });
        }
        Ok(())
    }

    /// Remove a governor (governors only, never the last one).
    pub fn remove_governor(&mut self, caller: Address, governor: Address) -> Result<(), GameError> {
        if self.gate.remove_governor(&caller, &governor)? {
            info!("Governor {} removed by {}", governor.short(), caller.short());
            self.events.record(GameEventData::GovernorRemoved { by: caller, governor });
        }
        Ok(())
    }

    /// Authorize a module for registrations (governors only).
    pub fn add_module(&mut self, caller: Address, module: Address) -> Result<(), GameError> {
        self.gate.require_governor(&caller)?;

        if self.is_module_authorized(&module) {
            return Ok(());
        }
        self.modules.insert(module, ModuleRegistration {
            authorized: true,
            updated_by: caller,
        });
        info!("Module {} authorized by {}", module.short(), caller.short());
        self.events.record(GameEventData::ModuleAuthorized { by: caller, module });
        Ok(())
    }

    /// Withdraw trust from a module (governors only).
    ///
    /// Every lobby served by the module is discarded and its members return
    /// to `Unregistered`; a revoked module can no longer advance them.
    pub fn revoke_module(&mut self, caller: Address, module: Address) -> Result<(), GameError> {
        self.gate.require_governor(&caller)?;
        if !self.is_module_authorized(&module) {
            return Err(GameError::UnknownModule(module));
        }

        let affected: Vec<LobbyId> = self.lobbies.values()
            .filter(|l| l.module == module)
            .map(|l| l.id)
            .collect();

        let mut released_players = Vec::new();
        for lobby_id in affected {
            if let Some(lobby) = self.lobbies.remove(&lobby_id) {
                for member in lobby.members() {
                    if let Some(player) = self.players.get_mut(member) {
                        player.status = PlayerStatus::Unregistered;
                    }
                    released_players.push(*member);
                }
            }
        }
        self.open_lobbies.retain(|(m, _), _| *m != module);

        self.modules.insert(module, ModuleRegistration {
            authorized: false,
            updated_by: caller,
        });

        warn!(
            "Module {} revoked by {}, released {} players",
            module.short(), caller.short(), released_players.len()
        );
        self.events.record(GameEventData::ModuleRevoked {
            by: caller,
            module,
            released_players,
        });
        Ok(())
    }

    /// Is the module whitelisted?
    pub fn is_module_authorized(&self, module: &Address) -> bool {
        self.modules.get(module).is_some_and(|m| m.authorized)
    }

    /// Whitelist entry.
    pub fn module_registration(&self, module: &Address) -> Option<&ModuleRegistration> {
        self.modules.get(module)
    }

    // =========================================================================
    // PLAYER LIFECYCLE
    // =========================================================================

    /// Register a player into a lobby for `(module, tier)`.
    ///
    /// Only the player may register itself. When the player's arrival fills
    /// the lobby, the module is asked for a question first; if it has none
    /// the registration fails and nothing changes.
    pub fn register(
        &mut self,
        caller: Address,
        player: Address,
        tier: u8,
        module: &mut dyn QuestionModule,
    ) -> Result<LobbyId, GameError> {
        if caller != player {
            return Err(GameError::unauthorized(caller));
        }

        let module_addr = module.address();
        if !self.is_module_authorized(&module_addr) {
            return Err(GameError::UnknownModule(module_addr));
        }

        if self.players.get(&player).is_some_and(Player::is_active) {
            return Err(GameError::AlreadyRegistered(player));
        }

        // Resolve the target lobby without touching state yet
        let existing = self.open_lobbies.get(&(module_addr, tier)).copied();
        let staged = match existing {
            Some(id) => self.lobbies.get(&id).cloned(),
            None => None,
        };
        let mut lobby = staged.unwrap_or_else(|| {
            Lobby::new(LobbyId(self.next_lobby_id), module_addr, tier, module.lobby_size())
        });

        let question = if lobby.fills_with_one_more() {
            let context = lobby.context_with(player);
            Some(module.issue_question(&context)?)
        } else {
            None
        };

        // Commit
        let lobby_id = lobby.id;
        if existing.is_none() {
            self.next_lobby_id += 1;
        }
        lobby.add_member(player);

        let seq = self.events.next_seq();
        let record = self.players.entry(player).or_insert_with(|| Player::new(player));
        record.tier = tier;
        record.registered_seq = seq;
        record.status = PlayerStatus::Waiting { lobby: lobby_id };

        self.events.record(GameEventData::PlayerRegistered {
            player,
            lobby: lobby_id,
            module: module_addr,
            tier,
        });
        debug!("Player {} joined {} ({}/{})", player.short(), lobby_id, lobby.member_count(), lobby.capacity);

        match question {
            Some(question) => {
                lobby.assign_question(question);
                self.open_lobbies.remove(&(module_addr, tier));

                let members: Vec<Address> = lobby.members().copied().collect();
                for member in &members {
                    if let Some(p) = self.players.get_mut(member) {
                        p.status = PlayerStatus::Assigned { lobby: lobby_id, question };
                    }
                }

                info!("{} filled with {} players, question {}", lobby_id, members.len(), question);
                self.events.record(GameEventData::QuestionAssigned {
                    lobby: lobby_id,
                    module: module_addr,
                    question,
                    members,
                });
            }
            None => {
                self.open_lobbies.insert((module_addr, tier), lobby_id);
            }
        }

        self.lobbies.insert(lobby_id, lobby);
        Ok(lobby_id)
    }

    /// Leave an open lobby before it fills.
    pub fn withdraw(&mut self, caller: Address, player: Address) -> Result<LobbyId, GameError> {
        if caller != player {
            return Err(GameError::unauthorized(caller));
        }

        let lobby_id = match self.players.get(&player).map(|p| p.status) {
            Some(PlayerStatus::Waiting { lobby }) => lobby,
            _ => return Err(GameError::NotWaiting(player)),
        };

        let emptied = match self.lobbies.get_mut(&lobby_id) {
            Some(lobby) => {
                lobby.remove_member(&player);
                lobby.is_empty().then_some((lobby.module, lobby.tier))
            }
            None => None,
        };
        if let Some(key) = emptied {
            self.lobbies.remove(&lobby_id);
            self.open_lobbies.remove(&key);
            debug!("{} discarded after last member left", lobby_id);
        }

        if let Some(record) = self.players.get_mut(&player) {
            record.status = PlayerStatus::Unregistered;
        }

        info!("Player {} withdrew from {}", player.short(), lobby_id);
        self.events.record(GameEventData::PlayerWithdrawn { player, lobby: lobby_id });
        Ok(lobby_id)
    }

    /// Question assigned to the player's lobby.
    pub fn get_lobby_question(&self, player: &Address) -> Result<QuestionId, GameError> {
        self.players.get(player)
            .and_then(|p| p.status.question())
            .ok_or(GameError::NotAssigned(*player))
    }

    /// Module callback after a proof was accepted.
    ///
    /// Only the module serving the player's lobby may report, and only for
    /// the question the lobby was assigned.
    pub fn report_answered(
        &mut self,
        caller_module: Address,
        player: Address,
        question: QuestionId,
    ) -> Result<(), GameError> {
        let (lobby_id, assigned) = match self.players.get(&player).map(|p| p.status) {
            Some(PlayerStatus::Assigned { lobby, question }) => (lobby, question),
            _ => return Err(GameError::NotAssigned(player)),
        };

        let serving = self.lobbies.get(&lobby_id)
            .map(|l| l.module)
            .ok_or(GameError::NotAssigned(player))?;
        if serving != caller_module || !self.is_module_authorized(&caller_module) {
            return Err(GameError::unauthorized(caller_module));
        }

        if assigned != question {
            return Err(GameError::StaleQuestion { expected: assigned, got: question });
        }

        // Commit
        self.leave_full_lobby(lobby_id, &player);
        if let Some(record) = self.players.get_mut(&player) {
            record.status = PlayerStatus::Unregistered;
            record.rounds_completed += 1;
        }

        info!("Player {} answered {} in {}", player.short(), question, lobby_id);
        self.events.record(GameEventData::QuestionAnswered {
            player,
            lobby: lobby_id,
            module: caller_module,
            question,
        });
        Ok(())
    }

    /// Give up an assigned question without answering it.
    ///
    /// The player leaves the lobby with no credit and may register again.
    /// Returns the lobby left and the abandoned question.
    pub fn forfeit(&mut self, caller: Address, player: Address) -> Result<(LobbyId, QuestionId), GameError> {
        if caller != player {
            return Err(GameError::unauthorized(caller));
        }

        let (lobby_id, question) = match self.players.get(&player).map(|p| p.status) {
            Some(PlayerStatus::Assigned { lobby, question }) => (lobby, question),
            _ => return Err(GameError::NotAssigned(player)),
        };
        let module = self.lobbies.get(&lobby_id)
            .map(|l| l.module)
            .ok_or(GameError::NotAssigned(player))?;

        self.leave_full_lobby(lobby_id, &player);
        if let Some(record) = self.players.get_mut(&player) {
            record.status = PlayerStatus::Unregistered;
        }

        info!("Player {} forfeited {} in {}", player.short(), question, lobby_id);
        self.events.record(GameEventData::QuestionForfeited {
            player,
            lobby: lobby_id,
            module,
            question,
        });
        Ok((lobby_id, question))
    }

    /// Drop a member from a full lobby; the last one out removes it.
    fn leave_full_lobby(&mut self, lobby_id: LobbyId, player: &Address) {
        let resolved = match self.lobbies.get_mut(&lobby_id) {
            Some(lobby) => {
                lobby.remove_member(player);
                lobby.is_empty()
            }
            None => false,
        };
        if resolved {
            self.lobbies.remove(&lobby_id);
            debug!("{} resolved", lobby_id);
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Player state (`Unregistered` for unknown players).
    pub fn player_status(&self, player: &Address) -> PlayerStatus {
        self.players.get(player).map(|p| p.status).unwrap_or_default()
    }

    /// Player record.
    pub fn player(&self, player: &Address) -> Option<&Player> {
        self.players.get(player)
    }

    /// All player records in address order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Live lobby.
    pub fn lobby(&self, id: LobbyId) -> Option<&Lobby> {
        self.lobbies.get(&id)
    }

    /// All live lobbies in id order.
    pub fn lobbies(&self) -> impl Iterator<Item = &Lobby> {
        self.lobbies.values()
    }

    /// Open lobby for `(module, tier)`.
    pub fn open_lobby(&self, module: &Address, tier: u8) -> Option<LobbyId> {
        self.open_lobbies.get(&(*module, tier)).copied()
    }

    /// Event log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Events with `seq >= from`.
    pub fn events_since(&self, from: u64) -> &[GameEvent] {
        self.events.since(from)
    }

    pub(crate) fn record_event(&mut self, data: GameEventData) -> u64 {
        self.events.record(data)
    }

    /// Digest over every piece of engine state.
    ///
    /// Equal digests before and after a call mean the call had no effect.
    pub fn state_digest(&self) -> Digest {
        let mut hasher = DomainHasher::for_engine_state();

        hasher.update_u32(self.gate.governors().len() as u32);
        for governor in self.gate.governors().iter() {
            hasher.update_address(governor);
        }

        hasher.update_u32(self.modules.len() as u32);
        for (address, registration) in &self.modules {
            hasher.update_address(address);
            hasher.update_bool(registration.authorized);
            hasher.update_address(&registration.updated_by);
        }

        hasher.update_u32(self.players.len() as u32);
        for player in self.players.values() {
            hasher.update_address(&player.address);
            hash_status(&mut hasher, &player.status);
            hasher.update_u8(player.tier);
            hasher.update_u64(player.registered_seq);
            hasher.update_u32(player.rounds_completed);
        }

        hasher.update_u32(self.lobbies.len() as u32);
        for lobby in self.lobbies.values() {
            hasher.update_u64(lobby.id.0);
            hasher.update_address(&lobby.module);
            hasher.update_u8(lobby.tier);
            hasher.update_u64(lobby.capacity as u64);
            hasher.update_u32(lobby.member_count() as u32);
            for member in lobby.members() {
                hasher.update_address(member);
            }
            hasher.update_option(lobby.question().as_ref(), |h, q| h.update_question(q));
        }

        hasher.update_u32(self.open_lobbies.len() as u32);
        for ((module, tier), id) in &self.open_lobbies {
            hasher.update_address(module);
            hasher.update_u8(*tier);
            hasher.update_u64(id.0);
        }

        hasher.update_u64(self.next_lobby_id);
        hasher.update_bytes(&self.events.head());
        hasher.finalize()
    }
}

fn hash_status(hasher: &mut DomainHasher, status: &PlayerStatus) {
    match status {
        PlayerStatus::Unregistered => hasher.update_u8(0),
        PlayerStatus::Waiting { lobby } => {
            hasher.update_u8(1);
            hasher.update_u64(lobby.0);
        }
        PlayerStatus::Assigned { lobby, question } => {
            hasher.update_u8(2);
            hasher.update_u64(lobby.0);
            hasher.update_question(question);
        }
    }
}

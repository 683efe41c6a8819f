//! Game Ledger
//!
//! One `LobbyEngine` plus every deployed question module, composed into a
//! single sequential state machine. Each public method is one atomic
//! transition: it either succeeds completely or returns an error with no
//! observable change to the engine or any module.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::config::GameConfig;
use crate::core::hash::{Digest, DomainHasher};
use crate::core::identity::{Address, QuestionId};
use crate::game::engine::LobbyEngine;
use crate::game::error::GameError;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::governance::GovernorSet;
use crate::game::lobby::LobbyId;
use crate::game::player::PlayerStatus;
use crate::proof::groth16::Groth16Proof;
use crate::proof::public_inputs::public_input_count;
use crate::proof::verify::{ProofVerifier, VerificationKey};
use crate::questions::bank::QuestionBank;
use crate::questions::module::QuestionModule;

/// Engine plus deployed modules.
#[derive(Debug)]
pub struct GameLedger {
    engine: LobbyEngine,
    modules: BTreeMap<Address, QuestionBank>,
}

impl GameLedger {
    /// Empty ledger with its genesis governors.
    pub fn new(governors: GovernorSet) -> Self {
        Self {
            engine: LobbyEngine::new(governors),
            modules: BTreeMap::new(),
        }
    }

    /// Build a ledger from configuration with one authorized bank at `module`.
    ///
    /// The bank uses a development verification key derived from
    /// `config.vk_seed`, sized for the configured binding mode.
    pub fn bootstrap(
        config: &GameConfig,
        module: Address,
        verifier: Arc<dyn ProofVerifier>,
    ) -> Result<Self, GameError> {
        let governors = GovernorSet::new(config.governors.iter().copied())?;
        let genesis = *governors.iter().next().ok_or(GameError::EmptyGovernorSet)?;
        let mut ledger = Self::new(governors);

        let vk = VerificationKey::development(
            public_input_count(config.bank.bind_claimant),
            config.vk_seed.as_bytes(),
        );
        let bank = QuestionBank::new(module, vk, verifier, config.bank)?;
        ledger.deploy_module(genesis, bank)?;
        ledger.add_module(genesis, module)?;
        Ok(ledger)
    }

    // =========================================================================
    // GOVERNANCE
    // =========================================================================

    /// Add a governor.
    pub fn add_governor(&mut self, caller: Address, governor: Address) -> Result<(), GameError> {
        self.engine.add_governor(caller, governor)
    }

    /// Remove a governor.
    pub fn remove_governor(&mut self, caller: Address, governor: Address) -> Result<(), GameError> {
        self.engine.remove_governor(caller, governor)
    }

    /// Deploy a question bank (governors only). Deployment does not authorize it.
    pub fn deploy_module(&mut self, caller: Address, bank: QuestionBank) -> Result<Address, GameError> {
        self.engine.governance().require_governor(&caller)?;
        let address = bank.address();
        if self.modules.contains_key(&address) {
            return Err(GameError::ModuleAlreadyDeployed(address));
        }
        self.modules.insert(address, bank);
        info!("Module {} deployed by {}", address.short(), caller.short());
        Ok(address)
    }

    /// Authorize a deployed module.
    pub fn add_module(&mut self, caller: Address, module: Address) -> Result<(), GameError> {
        self.engine.governance().require_governor(&caller)?;
        if !self.modules.contains_key(&module) {
            return Err(GameError::UnknownModule(module));
        }
        self.engine.add_module(caller, module)
    }

    /// Revoke a module and release its lobbies.
    pub fn revoke_module(&mut self, caller: Address, module: Address) -> Result<(), GameError> {
        self.engine.revoke_module(caller, module)?;
        if let Some(bank) = self.modules.get_mut(&module) {
            bank.reset_attempts();
        }
        Ok(())
    }

    /// Add a question to a deployed module.
    pub fn add_question(
        &mut self,
        caller: Address,
        module: Address,
        id: QuestionId,
        tier: u8,
    ) -> Result<(), GameError> {
        let bank = self.modules.get_mut(&module).ok_or(GameError::UnknownModule(module))?;
        bank.add_question(self.engine.governance(), &caller, id, tier)?;
        self.engine.record_event(GameEventData::QuestionAdded { module, question: id, tier });
        Ok(())
    }

    /// Stop issuing a question.
    pub fn deactivate_question(
        &mut self,
        caller: Address,
        module: Address,
        id: QuestionId,
    ) -> Result<(), GameError> {
        let bank = self.modules.get_mut(&module).ok_or(GameError::UnknownModule(module))?;
        if bank.deactivate_question(self.engine.governance(), &caller, &id)? {
            self.engine.record_event(GameEventData::QuestionDeactivated { module, question: id });
        }
        Ok(())
    }

    // =========================================================================
    // PLAYER OPERATIONS
    // =========================================================================

    /// Register `player` into a lobby of `module` at `tier`.
    pub fn register(
        &mut self,
        caller: Address,
        player: Address,
        tier: u8,
        module: Address,
    ) -> Result<LobbyId, GameError> {
        let bank = self.modules.get_mut(&module).ok_or(GameError::UnknownModule(module))?;
        self.engine.register(caller, player, tier, bank)
    }

    /// Leave an open lobby.
    pub fn withdraw(&mut self, caller: Address, player: Address) -> Result<LobbyId, GameError> {
        self.engine.withdraw(caller, player)
    }

    /// Remove a player who waited too long, on the player's behalf.
    pub fn evict_waiting(&mut self, player: Address) -> Result<LobbyId, GameError> {
        self.engine.withdraw(player, player)
    }

    /// Give up an assigned question; the player may register again.
    ///
    /// Clears the player's failed attempts on the abandoned question.
    pub fn forfeit(&mut self, caller: Address, player: Address) -> Result<(LobbyId, QuestionId), GameError> {
        let module = self.engine.player_status(&player).lobby()
            .and_then(|id| self.engine.lobby(id))
            .map(|lobby| lobby.module);
        let (lobby, question) = self.engine.forfeit(caller, player)?;
        if let Some(bank) = module.and_then(|m| self.modules.get_mut(&m)) {
            bank.clear_attempts(&player, &question);
        }
        Ok((lobby, question))
    }

    /// Question assigned to the player's lobby.
    pub fn get_lobby_question(&self, player: &Address) -> Result<QuestionId, GameError> {
        self.engine.get_lobby_question(player)
    }

    /// Submit a proof to `module`.
    pub fn answer_question(
        &mut self,
        caller: Address,
        module: Address,
        proof: &Groth16Proof,
        id: QuestionId,
    ) -> Result<bool, GameError> {
        let bank = self.modules.get_mut(&module).ok_or(GameError::UnknownModule(module))?;
        bank.answer_question(&mut self.engine, caller, proof, id)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// The engine.
    pub fn engine(&self) -> &LobbyEngine {
        &self.engine
    }

    /// Deployed module.
    pub fn module(&self, address: &Address) -> Option<&QuestionBank> {
        self.modules.get(address)
    }

    /// Deployed module addresses.
    pub fn module_addresses(&self) -> impl Iterator<Item = &Address> {
        self.modules.keys()
    }

    /// Deployed modules whose verifier accepts proofs anyone can mint.
    pub fn unsound_modules(&self) -> Vec<Address> {
        self.modules.values()
            .filter(|bank| !bank.is_sound())
            .map(|bank| bank.address())
            .collect()
    }

    /// Player state.
    pub fn player_status(&self, player: &Address) -> PlayerStatus {
        self.engine.player_status(player)
    }

    /// Events with `seq >= from`.
    pub fn events_since(&self, from: u64) -> &[GameEvent] {
        self.engine.events_since(from)
    }

    /// Digest over the engine and every module.
    pub fn state_digest(&self) -> Digest {
        let mut hasher = DomainHasher::for_engine_state();
        hasher.update_bytes(&self.engine.state_digest());
        hasher.update_u32(self.modules.len() as u32);
        for bank in self.modules.values() {
            hasher.update_bytes(&bank.state_digest());
        }
        hasher.finalize()
    }
}


#[cfg(test)]
mod proptests {
    use super::tests::{ledger_with, qid, valid_proof, GOV, MODULE};
    use super::*;
    use crate::questions::bank::BankConfig;
    use proptest::prelude::*;

    #[derive(Clone, Debug)]
    enum Op {
        Register { player: u8, caller: u8, tier: u8 },
        Withdraw { player: u8, caller: u8 },
        Forfeit { player: u8, caller: u8 },
        Answer { player: u8, valid: bool },
        AddQuestion { label: u8, tier: u8, by_governor: bool },
        Deactivate { label: u8 },
        Revoke,
        Authorize,
    }

    fn player(n: u8) -> Address {
        Address::new([0x40 + n; 20])
    }

    fn label(n: u8) -> QuestionId {
        qid(&format!("q{}", n))
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0..4u8, prop::bool::weighted(0.9), 0..3u8).prop_map(|(player, own, tier)| {
                let caller = if own { player } else { (player + 1) % 4 };
                Op::Register { player, caller, tier }
            }),
            1 => (0..4u8, prop::bool::weighted(0.9)).prop_map(|(player, own)| {
                let caller = if own { player } else { (player + 1) % 4 };
                Op::Withdraw { player, caller }
            }),
            1 => (0..4u8, prop::bool::weighted(0.9)).prop_map(|(player, own)| {
                let caller = if own { player } else { (player + 1) % 4 };
                Op::Forfeit { player, caller }
            }),
            3 => (0..4u8, any::<bool>()).prop_map(|(player, valid)| Op::Answer { player, valid }),
            2 => (0..6u8, 0..3u8, any::<bool>())
                .prop_map(|(label, tier, by_governor)| Op::AddQuestion { label, tier, by_governor }),
            1 => (0..6u8).prop_map(|label| Op::Deactivate { label }),
            1 => Just(Op::Revoke),
            1 => Just(Op::Authorize),
        ]
    }

    fn apply(ledger: &mut GameLedger, op: &Op) -> Result<(), GameError> {
        match *op {
            Op::Register { player: p, caller, tier } => {
                ledger.register(player(caller), player(p), tier, MODULE).map(|_| ())
            }
            Op::Withdraw { player: p, caller } => {
                ledger.withdraw(player(caller), player(p)).map(|_| ())
            }
            Op::Forfeit { player: p, caller } => {
                ledger.forfeit(player(caller), player(p)).map(|_| ())
            }
            Op::Answer { player: p, valid } => {
                let who = player(p);
                let question = ledger.get_lobby_question(&who).unwrap_or_else(|_| label(0));
                let proof = if valid && ledger.module(&MODULE).and_then(|b| b.question(&question)).is_some() {
                    valid_proof(ledger, who, question)
                } else {
                    Groth16Proof::default()
                };
                ledger.answer_question(who, MODULE, &proof, question).map(|_| ())
            }
            Op::AddQuestion { label: l, tier, by_governor } => {
                let caller = if by_governor { GOV } else { player(0) };
                ledger.add_question(caller, MODULE, label(l), tier)
            }
            Op::Deactivate { label: l } => ledger.deactivate_question(GOV, MODULE, label(l)),
            Op::Revoke => ledger.revoke_module(GOV, MODULE),
            Op::Authorize => ledger.add_module(GOV, MODULE),
        }
    }

    /// Every player is in at most one lobby, and statuses agree with lobbies.
    fn check_consistency(ledger: &GameLedger) -> Result<(), TestCaseError> {
        let engine = ledger.engine();
        for record in engine.players() {
            let memberships = engine.lobbies().filter(|l| l.contains(&record.address)).count();
            match record.status {
                PlayerStatus::Unregistered => prop_assert_eq!(memberships, 0),
                PlayerStatus::Waiting { lobby } => {
                    prop_assert_eq!(memberships, 1);
                    let l = engine.lobby(lobby).ok_or_else(|| TestCaseError::fail("missing lobby"))?;
                    prop_assert!(l.contains(&record.address));
                    prop_assert!(l.question().is_none());
                }
                PlayerStatus::Assigned { lobby, question } => {
                    prop_assert_eq!(memberships, 1);
                    let l = engine.lobby(lobby).ok_or_else(|| TestCaseError::fail("missing lobby"))?;
                    prop_assert_eq!(l.question(), Some(question));
                    prop_assert_eq!(l.module, MODULE);
                }
            }
        }
        for lobby in engine.lobbies() {
            prop_assert!(!lobby.is_empty());
            prop_assert!(lobby.member_count() <= lobby.capacity);
        }
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// A failing operation leaves the whole ledger untouched.
        #[test]
        fn failed_operations_have_no_effect(ops in prop::collection::vec(op_strategy(), 1..60)) {
            let mut ledger = ledger_with(BankConfig { max_failed_attempts: Some(3), ..BankConfig::default() });
            for op in &ops {
                let before = ledger.state_digest();
                let events_before = ledger.events_since(0).len();
                if apply(&mut ledger, op).is_err() {
                    prop_assert_eq!(ledger.state_digest(), before, "op {:?} changed state", op);
                    prop_assert_eq!(ledger.events_since(0).len(), events_before);
                }
                check_consistency(&ledger)?;
            }
            prop_assert!(ledger.engine().events().verify_chain());
        }

        /// Questions handed to lobbies are never handed out again.
        #[test]
        fn issued_questions_are_unique(ops in prop::collection::vec(op_strategy(), 1..60)) {
            let mut ledger = ledger_with(BankConfig::default());
            for op in &ops {
                let _ = apply(&mut ledger, op);
            }
            let mut assigned: Vec<QuestionId> = ledger.events_since(0).iter()
                .filter_map(|e| match &e.data {
                    GameEventData::QuestionAssigned { question, .. } => Some(*question),
                    _ => None,
                })
                .collect();
            let total = assigned.len();
            assigned.sort();
            assigned.dedup();
            prop_assert_eq!(assigned.len(), total);
        }
    }
}

//! Question Bank
//!
//! The reference question module ("SieveQuestions"): a governor-curated
//! registry of questions indexed by difficulty tier, issued once each, and
//! answered by Groth16 proofs instead of plaintext answers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::hash::{Digest, DomainHasher, MODULE_STATE_DOMAIN};
use crate::core::identity::{Address, QuestionId};
use crate::game::engine::LobbyEngine;
use crate::game::error::GameError;
use crate::game::governance::GovernanceGate;
use crate::game::lobby::LobbyContext;
use crate::game::player::PlayerStatus;
use crate::proof::groth16::Groth16Proof;
use crate::proof::public_inputs::{public_input_count, QuestionPublicInputs, QuestionTemplate};
use crate::proof::verify::{ProofVerifier, VerificationKey};
use crate::questions::module::QuestionModule;

/// Default players per lobby.
pub const DEFAULT_LOBBY_SIZE: usize = 2;

/// Per-module configuration, fixed at deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankConfig {
    /// Players that fill a lobby.
    pub lobby_size: usize,
    /// Append the claimant to the public inputs.
    ///
    /// With binding off, a valid proof can be replayed by anyone in a lobby
    /// that shares the question.
    pub bind_claimant: bool,
    /// Failed attempts allowed per `(player, question)`; `None` is unlimited.
    pub max_failed_attempts: Option<u32>,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            lobby_size: DEFAULT_LOBBY_SIZE,
            bind_claimant: true,
            max_failed_attempts: None,
        }
    }
}

/// A stored question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Identifier.
    pub id: QuestionId,
    /// Difficulty tier.
    pub tier: u8,
    /// Public-input template, fixed at insertion.
    pub template: QuestionTemplate,
    /// Eligible for issuance.
    pub active: bool,
    /// Already handed to a lobby.
    pub issued: bool,
}

impl Question {
    /// Can this question be handed to a lobby of `tier`?
    pub fn is_issuable_at(&self, tier: u8) -> bool {
        self.active && !self.issued && self.tier <= tier
    }
}

/// Question module backed by an in-memory bank.
#[derive(Clone)]
pub struct QuestionBank {
    address: Address,
    config: BankConfig,
    vk: VerificationKey,
    verifier: Arc<dyn ProofVerifier>,
    questions: BTreeMap<QuestionId, Question>,
    failed_attempts: BTreeMap<(Address, QuestionId), u32>,
}

impl fmt::Debug for QuestionBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuestionBank")
            .field("address", &self.address)
            .field("config", &self.config)
            .field("questions", &self.questions.len())
            .finish_non_exhaustive()
    }
}

impl QuestionBank {
    /// Deploy a bank at `address`.
    ///
    /// The key must accept exactly the public-input layout implied by
    /// `config.bind_claimant`.
    pub fn new(
        address: Address,
        vk: VerificationKey,
        verifier: Arc<dyn ProofVerifier>,
        config: BankConfig,
    ) -> Result<Self, GameError> {
        let expected = public_input_count(config.bind_claimant) + 1;
        if vk.ic.len() != expected {
            return Err(GameError::InvalidVerificationKey {
                expected,
                got: vk.ic.len(),
            });
        }

        Ok(Self {
            address,
            config,
            vk,
            verifier,
            questions: BTreeMap::new(),
            failed_attempts: BTreeMap::new(),
        })
    }

    /// Module configuration.
    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    /// Verification key.
    pub fn verification_key(&self) -> &VerificationKey {
        &self.vk
    }

    /// Is the proof gate backed by a sound verifier?
    pub fn is_sound(&self) -> bool {
        self.verifier.is_sound()
    }

    /// Stored question.
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.get(id)
    }

    /// All questions in identifier order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.values()
    }

    /// Questions a lobby of `tier` could still receive.
    pub fn available_count(&self, tier: u8) -> usize {
        self.questions.values().filter(|q| q.is_issuable_at(tier)).count()
    }

    /// Failed attempts recorded for a player on a question.
    pub fn failed_attempts(&self, player: &Address, id: &QuestionId) -> u32 {
        self.failed_attempts.get(&(*player, *id)).copied().unwrap_or(0)
    }

    /// Digest over questions and attempt counters.
    pub fn state_digest(&self) -> Digest {
        let mut hasher = DomainHasher::new(MODULE_STATE_DOMAIN);
        hasher.update_address(&self.address);
        hasher.update_bytes(&self.vk.digest());

        hasher.update_u32(self.questions.len() as u32);
        for question in self.questions.values() {
            hasher.update_question(&question.id);
            hasher.update_u8(question.tier);
            for element in question.template.to_array() {
                hasher.update_field(&element);
            }
            hasher.update_bool(question.active);
            hasher.update_bool(question.issued);
        }

        hasher.update_u32(self.failed_attempts.len() as u32);
        for ((player, question), attempts) in &self.failed_attempts {
            hasher.update_address(player);
            hasher.update_question(question);
            hasher.update_u32(*attempts);
        }
        hasher.finalize()
    }

    // =========================================================================
    // GOVERNED OPERATIONS
    // =========================================================================

    /// Store a new question (governors only).
    ///
    /// Existing questions are never overwritten.
    pub fn add_question(
        &mut self,
        gate: &GovernanceGate,
        caller: &Address,
        id: QuestionId,
        tier: u8,
    ) -> Result<(), GameError> {
        gate.require_governor(caller)?;
        if self.questions.contains_key(&id) {
            return Err(GameError::DuplicateQuestion(id));
        }

        let template = QuestionTemplate::derive(&self.address, &id, tier);
        self.questions.insert(id, Question {
            id,
            tier,
            template,
            active: true,
            issued: false,
        });

        info!("Module {} added question {} at tier {}", self.address.short(), id, tier);
        Ok(())
    }

    /// Stop issuing a question (governors only).
    ///
    /// Returns false if it was already inactive. Lobbies already holding the
    /// question can still answer it.
    pub fn deactivate_question(
        &mut self,
        gate: &GovernanceGate,
        caller: &Address,
        id: &QuestionId,
    ) -> Result<bool, GameError> {
        gate.require_governor(caller)?;
        let question = self.questions.get_mut(id).ok_or(GameError::UnknownQuestion(*id))?;
        if !question.active {
            return Ok(false);
        }
        question.active = false;
        info!("Module {} deactivated question {}", self.address.short(), id);
        Ok(true)
    }

    // =========================================================================
    // ANSWERS
    // =========================================================================

    /// Public inputs a proof from `claimant` must satisfy.
    pub fn public_inputs_for(
        &self,
        id: &QuestionId,
        claimant: &Address,
    ) -> Result<QuestionPublicInputs, GameError> {
        let question = self.questions.get(id).ok_or(GameError::UnknownQuestion(*id))?;
        Ok(if self.config.bind_claimant {
            QuestionPublicInputs::bound(question.template, claimant)
        } else {
            QuestionPublicInputs::unbound(question.template)
        })
    }

    /// Submit a proof of an answer.
    ///
    /// `Ok(false)` is a rejected proof and changes nothing outside the
    /// attempt counter. On acceptance the engine is told the player answered;
    /// if the engine refuses, the whole call fails.
    pub fn answer_question(
        &mut self,
        engine: &mut LobbyEngine,
        caller: Address,
        proof: &Groth16Proof,
        id: QuestionId,
    ) -> Result<bool, GameError> {
        let inputs = self.public_inputs_for(&id, &caller)?;

        if let Some(coordinate) = proof.first_non_canonical() {
            return Err(GameError::MalformedProof(format!(
                "{} is not below the base field modulus",
                coordinate
            )));
        }

        let attempts = self.failed_attempts(&caller, &id);
        if let Some(max) = self.config.max_failed_attempts {
            if attempts >= max {
                return Err(GameError::TooManyAttempts {
                    player: caller,
                    question: id,
                    attempts,
                });
            }
        }

        let accepted = self.verifier.verify(&self.vk, &inputs.to_field_elements(), proof)?;
        if !accepted {
            // Only players holding this question in one of our lobbies are counted
            if self.is_assigned_here(engine, &caller, &id) {
                self.failed_attempts.insert((caller, id), attempts + 1);
                warn!("Rejected proof from {} for {} (attempt {})", caller.short(), id, attempts + 1);
            } else {
                debug!("Rejected proof from unassigned {} for {}", caller.short(), id);
            }
            return Ok(false);
        }

        engine.report_answered(self.address, caller, id)?;
        self.failed_attempts.remove(&(caller, id));
        debug!("Accepted proof from {} for {}", caller.short(), id);
        Ok(true)
    }
}

impl QuestionBank {
    fn is_assigned_here(&self, engine: &LobbyEngine, player: &Address, id: &QuestionId) -> bool {
        match engine.player_status(player) {
            PlayerStatus::Assigned { lobby, question } => {
                question == *id && engine.lobby(lobby).is_some_and(|l| l.module == self.address)
            }
            _ => false,
        }
    }

    /// Forget a player's failures on a question they no longer hold.
    pub(crate) fn clear_attempts(&mut self, player: &Address, id: &QuestionId) {
        self.failed_attempts.remove(&(*player, *id));
    }

    /// Forget every failure; used when the module's lobbies are discarded.
    pub(crate) fn reset_attempts(&mut self) {
        self.failed_attempts.clear();
    }
}

impl QuestionModule for QuestionBank {
    fn address(&self) -> Address {
        self.address
    }

    fn lobby_size(&self) -> usize {
        self.config.lobby_size
    }

    /// Smallest identifier that is active, never issued and at or below the
    /// lobby tier.
    fn issue_question(&mut self, lobby: &LobbyContext) -> Result<QuestionId, GameError> {
        if lobby.module != self.address {
            return Err(GameError::UnknownModule(lobby.module));
        }

        let question = self.questions.values_mut()
            .find(|q| q.is_issuable_at(lobby.tier))
            .ok_or(GameError::NoQuestionAvailable { tier: lobby.tier })?;
        question.issued = true;

        debug!("Module {} issued {} to {}", self.address.short(), question.id, lobby.lobby);
        Ok(question.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::{FieldElement, BN254_BASE_MODULUS};
    use crate::game::governance::GovernorSet;
    use crate::game::lobby::LobbyId;
    use crate::proof::verify::DigestVerifier;

    const GOV: u8 = 1;
    const MODULE: u8 = 200;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn qid(label: &str) -> QuestionId {
        QuestionId::from_label(label).unwrap()
    }

    fn bank_with(config: BankConfig) -> QuestionBank {
        let vk = VerificationKey::development(public_input_count(config.bind_claimant), b"bank");
        QuestionBank::new(addr(MODULE), vk, Arc::new(DigestVerifier::new()), config).unwrap()
    }

    fn setup(config: BankConfig) -> (LobbyEngine, QuestionBank) {
        let mut engine = LobbyEngine::new(GovernorSet::new([addr(GOV)]).unwrap());
        engine.add_module(addr(GOV), addr(MODULE)).unwrap();
        (engine, bank_with(config))
    }

    fn prove(bank: &QuestionBank, player: Address, id: QuestionId) -> Groth16Proof {
        let inputs = bank.public_inputs_for(&id, &player).unwrap();
        DigestVerifier::new()
            .prove(bank.verification_key(), &inputs.to_field_elements(), b"42")
            .unwrap()
    }

    fn context(tier: u8) -> LobbyContext {
        LobbyContext {
            lobby: LobbyId(0),
            module: addr(MODULE),
            tier,
            members: vec![addr(10), addr(11)],
        }
    }

    #[test]
    fn test_vk_length_checked() {
        let vk = VerificationKey::development(4, b"bank");
        let result = QuestionBank::new(addr(MODULE), vk.clone(), Arc::new(DigestVerifier), BankConfig::default());
        assert!(matches!(result, Err(GameError::InvalidVerificationKey { expected: 6, got: 5 })));

        let unbound = BankConfig { bind_claimant: false, ..BankConfig::default() };
        assert!(QuestionBank::new(addr(MODULE), vk, Arc::new(DigestVerifier), unbound).is_ok());
    }

    #[test]
    fn test_add_question_governed() {
        let (engine, mut bank) = setup(BankConfig::default());
        let result = bank.add_question(engine.governance(), &addr(10), qid("q1"), 1);
        assert!(matches!(result, Err(GameError::Unauthorized { .. })));
        assert!(bank.question(&qid("q1")).is_none());
    }

    #[test]
    fn test_duplicate_preserves_first() {
        let (engine, mut bank) = setup(BankConfig::default());
        bank.add_question(engine.governance(), &addr(GOV), qid("q1"), 3).unwrap();
        let first = bank.question(&qid("q1")).unwrap().clone();

        let result = bank.add_question(engine.governance(), &addr(GOV), qid("q1"), 9);
        assert!(matches!(result, Err(GameError::DuplicateQuestion(_))));
        assert_eq!(bank.question(&qid("q1")).unwrap(), &first);
        assert_eq!(first.tier, 3);
    }

    #[test]
    fn test_issue_policy() {
        let (engine, mut bank) = setup(BankConfig::default());
        let gate = engine.governance().clone();
        bank.add_question(&gate, &addr(GOV), qid("c"), 1).unwrap();
        bank.add_question(&gate, &addr(GOV), qid("a"), 5).unwrap();
        bank.add_question(&gate, &addr(GOV), qid("b"), 2).unwrap();

        // Tier 2 skips "a" (tier 5) and takes the smallest eligible id
        assert_eq!(bank.issue_question(&context(2)).unwrap(), qid("b"));
        assert_eq!(bank.issue_question(&context(2)).unwrap(), qid("c"));
        assert!(matches!(
            bank.issue_question(&context(2)),
            Err(GameError::NoQuestionAvailable { tier: 2 })
        ));
        assert_eq!(bank.issue_question(&context(9)).unwrap(), qid("a"));
        assert_eq!(bank.available_count(255), 0);
    }

    #[test]
    fn test_deactivated_not_issued() {
        let (engine, mut bank) = setup(BankConfig::default());
        let gate = engine.governance().clone();
        bank.add_question(&gate, &addr(GOV), qid("a"), 1).unwrap();
        assert!(bank.deactivate_question(&gate, &addr(GOV), &qid("a")).unwrap());
        assert!(!bank.deactivate_question(&gate, &addr(GOV), &qid("a")).unwrap());
        assert!(matches!(
            bank.deactivate_question(&gate, &addr(GOV), &qid("zz")),
            Err(GameError::UnknownQuestion(_))
        ));

        assert!(bank.issue_question(&context(1)).is_err());
        // Deactivated ids stay taken
        assert!(matches!(
            bank.add_question(&gate, &addr(GOV), qid("a"), 1),
            Err(GameError::DuplicateQuestion(_))
        ));
    }

    #[test]
    fn test_failed_issue_leaves_bank_unchanged() {
        let (_, mut bank) = setup(BankConfig::default());
        let before: Vec<Question> = bank.questions().cloned().collect();
        assert!(bank.issue_question(&context(0)).is_err());
        assert_eq!(bank.questions().cloned().collect::<Vec<_>>(), before);
    }

    #[test]
    fn test_answer_flow() {
        let (mut engine, mut bank) = setup(BankConfig::default());
        let gate = engine.governance().clone();
        bank.add_question(&gate, &addr(GOV), qid("q1"), 1).unwrap();

        engine.register(addr(10), addr(10), 1, &mut bank).unwrap();
        engine.register(addr(11), addr(11), 1, &mut bank).unwrap();
        assert_eq!(engine.get_lobby_question(&addr(10)).unwrap(), qid("q1"));

        let proof = prove(&bank, addr(10), qid("q1"));
        assert!(bank.answer_question(&mut engine, addr(10), &proof, qid("q1")).unwrap());
        assert_eq!(engine.player_status(&addr(10)), PlayerStatus::Unregistered);
    }

    #[test]
    fn test_rejected_proof_changes_no_engine_state() {
        let (mut engine, mut bank) = setup(BankConfig::default());
        let gate = engine.governance().clone();
        bank.add_question(&gate, &addr(GOV), qid("q1"), 1).unwrap();
        engine.register(addr(10), addr(10), 1, &mut bank).unwrap();
        engine.register(addr(11), addr(11), 1, &mut bank).unwrap();
        let before = engine.state_digest();

        let mut proof = prove(&bank, addr(10), qid("q1"));
        proof.c.y = FieldElement::from_u64(5);
        assert!(!bank.answer_question(&mut engine, addr(10), &proof, qid("q1")).unwrap());
        assert_eq!(engine.state_digest(), before);
        assert_eq!(bank.failed_attempts(&addr(10), &qid("q1")), 1);
    }

    #[test]
    fn test_claimant_binding_blocks_replay() {
        let (mut engine, mut bank) = setup(BankConfig::default());
        let gate = engine.governance().clone();
        bank.add_question(&gate, &addr(GOV), qid("q1"), 1).unwrap();
        engine.register(addr(10), addr(10), 1, &mut bank).unwrap();
        engine.register(addr(11), addr(11), 1, &mut bank).unwrap();

        let x_proof = prove(&bank, addr(10), qid("q1"));
        assert!(!bank.answer_question(&mut engine, addr(11), &x_proof, qid("q1")).unwrap());
        assert!(bank.answer_question(&mut engine, addr(10), &x_proof, qid("q1")).unwrap());
    }

    #[test]
    fn test_unbound_proof_replays() {
        let config = BankConfig { bind_claimant: false, ..BankConfig::default() };
        let (mut engine, mut bank) = setup(config);
        let gate = engine.governance().clone();
        bank.add_question(&gate, &addr(GOV), qid("q1"), 1).unwrap();
        engine.register(addr(10), addr(10), 1, &mut bank).unwrap();
        engine.register(addr(11), addr(11), 1, &mut bank).unwrap();

        let x_proof = prove(&bank, addr(10), qid("q1"));
        assert!(bank.answer_question(&mut engine, addr(11), &x_proof, qid("q1")).unwrap());
    }

    #[test]
    fn test_valid_proof_without_assignment_fails() {
        let (mut engine, mut bank) = setup(BankConfig::default());
        let gate = engine.governance().clone();
        bank.add_question(&gate, &addr(GOV), qid("q1"), 1).unwrap();

        let proof = prove(&bank, addr(10), qid("q1"));
        let result = bank.answer_question(&mut engine, addr(10), &proof, qid("q1"));
        assert!(matches!(result, Err(GameError::NotAssigned(_))));
    }

    #[test]
    fn test_unknown_question_and_malformed_proof() {
        let (mut engine, mut bank) = setup(BankConfig::default());
        let gate = engine.governance().clone();
        bank.add_question(&gate, &addr(GOV), qid("q1"), 1).unwrap();

        let proof = prove(&bank, addr(10), qid("q1"));
        assert!(matches!(
            bank.answer_question(&mut engine, addr(10), &proof, qid("nope")),
            Err(GameError::UnknownQuestion(_))
        ));

        let mut bad = proof;
        bad.c.x = FieldElement::new(BN254_BASE_MODULUS);
        assert!(matches!(
            bank.answer_question(&mut engine, addr(10), &bad, qid("q1")),
            Err(GameError::MalformedProof(_))
        ));
        assert_eq!(bank.failed_attempts(&addr(10), &qid("q1")), 0);
    }

    #[test]
    fn test_rate_limit() {
        let config = BankConfig { max_failed_attempts: Some(2), ..BankConfig::default() };
        let (mut engine, mut bank) = setup(config);
        let gate = engine.governance().clone();
        bank.add_question(&gate, &addr(GOV), qid("q1"), 1).unwrap();
        engine.register(addr(10), addr(10), 1, &mut bank).unwrap();
        engine.register(addr(11), addr(11), 1, &mut bank).unwrap();

        let bad = Groth16Proof::default();
        assert!(!bank.answer_question(&mut engine, addr(10), &bad, qid("q1")).unwrap());
        assert!(!bank.answer_question(&mut engine, addr(10), &bad, qid("q1")).unwrap());

        let good = prove(&bank, addr(10), qid("q1"));
        let result = bank.answer_question(&mut engine, addr(10), &good, qid("q1"));
        assert!(matches!(result, Err(GameError::TooManyAttempts { attempts: 2, .. })));

        // Other players keep their own budget
        let good = prove(&bank, addr(11), qid("q1"));
        assert!(bank.answer_question(&mut engine, addr(11), &good, qid("q1")).unwrap());
    }

    #[test]
    fn test_unassigned_failures_not_counted() {
        let config = BankConfig { max_failed_attempts: Some(1), ..BankConfig::default() };
        let (mut engine, mut bank) = setup(config);
        let gate = engine.governance().clone();
        bank.add_question(&gate, &addr(GOV), qid("q1"), 1).unwrap();

        let before = bank.state_digest();

        // Nobody holds q1 yet
        for n in 20..30 {
            assert!(!bank.answer_question(&mut engine, addr(n), &Groth16Proof::default(), qid("q1")).unwrap());
        }
        assert_eq!(bank.failed_attempts(&addr(20), &qid("q1")), 0);

        // A waiting player is not counted either
        engine.register(addr(10), addr(10), 1, &mut bank).unwrap();
        assert!(!bank.answer_question(&mut engine, addr(10), &Groth16Proof::default(), qid("q1")).unwrap());
        assert_eq!(bank.failed_attempts(&addr(10), &qid("q1")), 0);
        assert_eq!(bank.state_digest(), before);
    }

    #[test]
    fn test_success_resets_attempts() {
        let config = BankConfig { max_failed_attempts: Some(3), ..BankConfig::default() };
        let (mut engine, mut bank) = setup(config);
        let gate = engine.governance().clone();
        bank.add_question(&gate, &addr(GOV), qid("q1"), 1).unwrap();
        engine.register(addr(10), addr(10), 1, &mut bank).unwrap();
        engine.register(addr(11), addr(11), 1, &mut bank).unwrap();

        assert!(!bank.answer_question(&mut engine, addr(10), &Groth16Proof::default(), qid("q1")).unwrap());
        let good = prove(&bank, addr(10), qid("q1"));
        assert!(bank.answer_question(&mut engine, addr(10), &good, qid("q1")).unwrap());
        assert_eq!(bank.failed_attempts(&addr(10), &qid("q1")), 0);
    }
}

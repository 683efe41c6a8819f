//! Game Errors
//!
//! Every failure is synchronous, local to the call that caused it, and leaves
//! all state unchanged. Proof rejection is not an error: `answer_question`
//! returns `Ok(false)`.

use thiserror::Error;

use crate::core::identity::{Address, QuestionId};
use crate::proof::verify::ProofVerificationError;

/// Errors raised by the engine, question modules and ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Caller lacks governance or module trust.
    #[error("caller {caller} is not authorized")]
    Unauthorized {
        /// The rejected caller.
        caller: Address,
    },

    /// Module is not deployed or not authorized by governance.
    #[error("module {0} is not registered")]
    UnknownModule(Address),

    /// Question identifier does not exist in the module.
    #[error("question {0} does not exist")]
    UnknownQuestion(QuestionId),

    /// Question identifier is already taken; stored content is immutable.
    #[error("question {0} already exists")]
    DuplicateQuestion(QuestionId),

    /// Player already holds a lobby assignment.
    #[error("player {0} is already registered")]
    AlreadyRegistered(Address),

    /// Player has no lobby, or the lobby has no question yet.
    #[error("player {0} has no question assigned")]
    NotAssigned(Address),

    /// Reported question does not match the player's assignment.
    #[error("question {got} does not match assignment {expected}")]
    StaleQuestion {
        /// Question currently assigned.
        expected: QuestionId,
        /// Question reported.
        got: QuestionId,
    },

    /// Module has no issuable question at or below the tier.
    #[error("no question available at tier {tier}")]
    NoQuestionAvailable {
        /// Requested tier.
        tier: u8,
    },

    /// Withdrawal requested by a player who is not waiting in a lobby.
    #[error("player {0} is not waiting in a lobby")]
    NotWaiting(Address),

    /// Removing the governor would leave the set empty.
    #[error("cannot remove the last governor")]
    LastGovernor,

    /// A governor set must start with at least one member.
    #[error("governor set cannot be empty")]
    EmptyGovernorSet,

    /// Rate limit on failed proof attempts reached.
    #[error("player {player} exhausted {attempts} attempts on question {question}")]
    TooManyAttempts {
        /// Player.
        player: Address,
        /// Question.
        question: QuestionId,
        /// Failed attempts so far.
        attempts: u32,
    },

    /// Proof components are out of range for the curve.
    #[error("malformed proof: {0}")]
    MalformedProof(String),

    /// Verification key does not fit the module's public-input layout.
    #[error("verification key has {got} IC points, expected {expected}")]
    InvalidVerificationKey {
        /// Required IC length (inputs + 1).
        expected: usize,
        /// Provided IC length.
        got: usize,
    },

    /// A module is already deployed at this address.
    #[error("module {0} is already deployed")]
    ModuleAlreadyDeployed(Address),

    /// Verifier backend failure.
    #[error("verifier error: {0}")]
    Verifier(#[from] ProofVerificationError),
}

impl GameError {
    /// Shorthand for `Unauthorized`.
    pub fn unauthorized(caller: Address) -> Self {
        Self::Unauthorized { caller }
    }
}

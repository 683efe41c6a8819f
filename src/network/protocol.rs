//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Messages are JSON text frames; addresses, question ids and field elements
//! travel as `0x`-prefixed hex strings.

use serde::{Deserialize, Serialize};

use crate::core::field::FieldElement;
use crate::core::identity::{Address, QuestionId};
use crate::game::error::GameError;
use crate::game::events::GameEvent;
use crate::game::lobby::LobbyId;
use crate::game::player::PlayerStatus;
use crate::proof::groth16::Groth16Proof;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate with the server.
    Auth(AuthRequest),

    /// Grow the governor set.
    AddGovernor {
        /// New governor.
        governor: Address,
    },

    /// Shrink the governor set.
    RemoveGovernor {
        /// Governor to remove.
        governor: Address,
    },

    /// Authorize a deployed module.
    AddModule {
        /// Module address.
        module: Address,
    },

    /// Withdraw trust from a module.
    RevokeModule {
        /// Module address.
        module: Address,
    },

    /// Add a question to a module.
    AddQuestion {
        /// Module address.
        module: Address,
        /// Question identifier.
        question: QuestionId,
        /// Difficulty tier.
        tier: u8,
    },

    /// Stop issuing a question.
    DeactivateQuestion {
        /// Module address.
        module: Address,
        /// Question identifier.
        question: QuestionId,
    },

    /// Join a lobby.
    Register {
        /// Difficulty tier.
        tier: u8,
        /// Module to play.
        module: Address,
    },

    /// Leave an open lobby.
    Withdraw,

    /// Give up the assigned question and leave the lobby.
    Forfeit,

    /// Ask for the lobby's question.
    GetLobbyQuestion,

    /// Submit a proof.
    AnswerQuestion(AnswerRequest),

    /// Ask for the caller's player state.
    Status,

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp (ms).
        timestamp: u64,
    },
}

/// Authentication request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Claimed address; only honored when the server runs without JWT auth.
    #[serde(default)]
    pub address: Option<Address>,
    /// JWT issued by the auth provider.
    #[serde(default)]
    pub token: String,
    /// Client version for compatibility check.
    pub client_version: String,
}

/// Proof submission, in the flat layout of the call surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// Module that issued the question.
    pub module: Address,
    /// Question being answered.
    pub question: QuestionId,
    /// `A = [x, y]`.
    pub proof_a: [FieldElement; 2],
    /// `B = [[x0, x1], [y0, y1]]`.
    pub proof_b: [[FieldElement; 2]; 2],
    /// `C = [x, y]`.
    pub proof_c: [FieldElement; 2],
}

impl AnswerRequest {
    /// Build a request from a proof.
    pub fn new(module: Address, question: QuestionId, proof: &Groth16Proof) -> Self {
        let (proof_a, proof_b, proof_c) = proof.to_wire();
        Self { module, question, proof_a, proof_b, proof_c }
    }

    /// Proof carried by the request.
    pub fn proof(&self) -> Groth16Proof {
        Groth16Proof::from_wire(self.proof_a, self.proof_b, self.proof_c)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication result.
    AuthResult(AuthResult),

    /// Governance request applied.
    Ack {
        /// Request kind that succeeded.
        request: String,
    },

    /// Player placed in a lobby.
    Registered {
        /// Lobby joined.
        lobby: LobbyId,
        /// Player state after joining.
        status: PlayerStatus,
    },

    /// Player left its lobby, by request or after waiting too long.
    Withdrawn {
        /// Lobby left.
        lobby: LobbyId,
    },

    /// Player gave up its question and left the lobby.
    Forfeited {
        /// Lobby left.
        lobby: LobbyId,
        /// Abandoned question.
        question: QuestionId,
    },

    /// Question assigned to the player's lobby.
    LobbyQuestion {
        /// Question identifier.
        question: QuestionId,
    },

    /// Outcome of a proof submission.
    AnswerResult {
        /// Question answered.
        question: QuestionId,
        /// Proof accepted.
        accepted: bool,
    },

    /// Player state.
    Status(StatusInfo),

    /// Ledger event concerning the client.
    Event(GameEvent),

    /// Pong response.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server wall-clock time (ms).
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Reason.
        reason: String,
    },
}

/// Authentication result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether auth succeeded.
    pub success: bool,
    /// Session ID if successful.
    pub session_id: Option<String>,
    /// Address bound to the connection.
    pub address: Option<Address>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Machine-readable failure reason.
    #[serde(default)]
    pub error_code: Option<ErrorCode>,
    /// Server version.
    pub server_version: String,
}

/// Player state report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    /// Player address.
    pub address: Address,
    /// State machine position.
    pub status: PlayerStatus,
    /// Rounds answered successfully.
    pub rounds_completed: u32,
}

/// Error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Build an error payload.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl From<&GameError> for ServerError {
    fn from(err: &GameError) -> Self {
        let code = match err {
            GameError::Unauthorized { .. } => ErrorCode::Unauthorized,
            GameError::UnknownModule(_) | GameError::ModuleAlreadyDeployed(_) => ErrorCode::UnknownModule,
            GameError::UnknownQuestion(_) => ErrorCode::UnknownQuestion,
            GameError::DuplicateQuestion(_) => ErrorCode::DuplicateQuestion,
            GameError::AlreadyRegistered(_) => ErrorCode::AlreadyRegistered,
            GameError::NotAssigned(_) => ErrorCode::NotAssigned,
            GameError::StaleQuestion { .. } => ErrorCode::StaleQuestion,
            GameError::NoQuestionAvailable { .. } => ErrorCode::NoQuestionAvailable,
            GameError::NotWaiting(_) => ErrorCode::NotWaiting,
            GameError::LastGovernor | GameError::EmptyGovernorSet => ErrorCode::LastGovernor,
            GameError::TooManyAttempts { .. } => ErrorCode::RateLimited,
            GameError::MalformedProof(_) => ErrorCode::MalformedProof,
            GameError::InvalidVerificationKey { .. } | GameError::Verifier(_) => ErrorCode::InternalError,
        };
        Self::new(code, err.to_string())
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authentication failed.
    AuthFailed,
    /// Request needs an authenticated connection.
    NotAuthenticated,
    /// Message could not be parsed.
    InvalidInput,
    /// Caller lacks the required role.
    Unauthorized,
    /// Module unknown or not authorized.
    UnknownModule,
    /// Question unknown.
    UnknownQuestion,
    /// Question id taken.
    DuplicateQuestion,
    /// Player already in a lobby.
    AlreadyRegistered,
    /// Player has no question.
    NotAssigned,
    /// Question does not match the assignment.
    StaleQuestion,
    /// Module has nothing to issue.
    NoQuestionAvailable,
    /// Player is not waiting.
    NotWaiting,
    /// Governor set would become empty.
    LastGovernor,
    /// Too many failed attempts.
    RateLimited,
    /// Proof coordinates out of range.
    MalformedProof,
    /// Client version not supported.
    VersionMismatch,
    /// Server-side failure.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl AnswerRequest {
    /// Serialize to a compact binary frame.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from a binary frame.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn test_register_json_shape() {
        let msg = ClientMessage::Register { tier: 5, module: addr(0xaa) };
        let json = msg.to_json().unwrap();
        assert_eq!(
            json,
            format!(r#"{{"type":"register","tier":5,"module":"0x{}"}}"#, "aa".repeat(20))
        );

        let parsed = ClientMessage::from_json(&json).unwrap();
        assert!(matches!(parsed, ClientMessage::Register { tier: 5, module } if module == addr(0xaa)));
    }

    #[test]
    fn test_unit_messages_parse() {
        assert!(matches!(ClientMessage::from_json(r#"{"type":"withdraw"}"#).unwrap(), ClientMessage::Withdraw));
        assert!(matches!(
            ClientMessage::from_json(r#"{"type":"get_lobby_question"}"#).unwrap(),
            ClientMessage::GetLobbyQuestion
        ));
        assert!(matches!(ClientMessage::from_json(r#"{"type":"forfeit"}"#).unwrap(), ClientMessage::Forfeit));
    }

    #[test]
    fn test_auth_result_error_code() {
        let result = AuthResult {
            success: false,
            session_id: None,
            address: None,
            error: Some("too new".to_string()),
            error_code: Some(ErrorCode::VersionMismatch),
            server_version: "0.1.0".to_string(),
        };
        let json = ServerMessage::AuthResult(result).to_json().unwrap();
        assert!(json.contains(r#""error_code":"version_mismatch""#));

        // Older servers omit the code
        let legacy = r#"{"type":"auth_result","success":true,"session_id":"ab","address":null,"error":null,"server_version":"0.1.0"}"#;
        let ServerMessage::AuthResult(parsed) = ServerMessage::from_json(legacy).unwrap() else {
            panic!("Wrong message type");
        };
        assert_eq!(parsed.error_code, None);
    }

    #[test]
    fn test_answer_request_accepts_decimal_and_hex() {
        let question = QuestionId::from_label("Q1").unwrap();
        let json = format!(
            r#"{{"type":"answer_question","module":"{}","question":"{}",
                "proof_a":["1","0x{}"],
                "proof_b":[["3","4"],["5","6"]],
                "proof_c":["7","8"]}}"#,
            addr(1),
            question.to_hex(),
            format!("{:064x}", 2),
        );
        let parsed = ClientMessage::from_json(&json).unwrap();
        let ClientMessage::AnswerQuestion(req) = parsed else {
            panic!("Wrong message type");
        };
        assert_eq!(req.question, question);
        let proof = req.proof();
        assert_eq!(proof.a.y, FieldElement::from_u64(2));
        assert_eq!(proof.b.y, [FieldElement::from_u64(5), FieldElement::from_u64(6)]);
    }

    #[test]
    fn test_answer_request_binary() {
        let proof = Groth16Proof::from_wire(
            [FieldElement::from_u64(1), FieldElement::from_u64(2)],
            [[FieldElement::from_u64(3), FieldElement::from_u64(4)], [FieldElement::from_u64(5), FieldElement::from_u64(6)]],
            [FieldElement::from_u64(7), FieldElement::from_u64(8)],
        );
        let req = AnswerRequest::new(addr(1), QuestionId::from_label("Q1").unwrap(), &proof);
        let parsed = AnswerRequest::from_bytes(&req.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.proof(), proof);
        assert_eq!(parsed.module, addr(1));
    }

    #[test]
    fn test_error_mapping() {
        let err = GameError::NotAssigned(addr(3));
        let payload = ServerError::from(&err);
        assert_eq!(payload.code, ErrorCode::NotAssigned);

        let json = ServerMessage::Error(payload).to_json().unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""code":"not_assigned""#));
    }

    #[test]
    fn test_server_status_json() {
        let msg = ServerMessage::Registered {
            lobby: LobbyId(2),
            status: PlayerStatus::Waiting { lobby: LobbyId(2) },
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""lobby":2"#));
        assert!(json.contains(r#""state":"waiting""#));
        assert!(matches!(ServerMessage::from_json(&json).unwrap(), ServerMessage::Registered { .. }));
    }
}

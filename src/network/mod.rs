//! Network Layer
//!
//! WebSocket server exposing the ledger to remote clients.
//! This layer holds no game state of its own; every transition goes through
//! `ledger::GameLedger`.

pub mod auth;
pub mod protocol;
pub mod session;
pub mod server;

pub use auth::{resolve_address, validate_token, AuthConfig, AuthError, TokenClaims};
pub use protocol::{
    AnswerRequest, AuthRequest, AuthResult, ClientMessage, ErrorCode, ServerError, ServerMessage,
    StatusInfo,
};
pub use session::{ClientSession, SessionError, SessionId, SessionManager};
pub use server::{execute_request, GameServer, GameServerError, ServerConfig, SharedLedger};

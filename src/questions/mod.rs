//! Question Modules
//!
//! - `module`: Capability trait the engine dispatches through
//! - `bank`: Governor-curated question bank answered with proofs

pub mod module;
pub mod bank;

pub use module::QuestionModule;
pub use bank::{BankConfig, Question, QuestionBank, DEFAULT_LOBBY_SIZE};

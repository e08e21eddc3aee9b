//! Memory Agent: a chat agent with rolling memory.
//!
//! Connects the `context-memory` core to an OpenAI-compatible inference
//! endpoint and drives it from line-oriented input.

pub mod backend;
pub mod config;
pub mod docs;
pub mod session;

pub use backend::OpenAiCompatBackend;
pub use config::AgentConfig;
pub use docs::FileDocs;
pub use session::{parse_line, ChatSession, SessionError, DEFAULT_USER};

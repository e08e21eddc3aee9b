//! Context Memory: rolling conversational context for a long-lived agent.
//!
//! Keeps the prompt bounded while retaining long-term knowledge:
//! - recent turns stay verbatim in a [`TurnBuffer`]
//! - older turns are folded into a single memory string by the
//!   [`MemoryCompactor`]
//! - the [`ExampleRetriever`] picks the few-shot transcripts most similar
//!   to the live conversation
//! - [`ConversationHistory`] ties them together and persists
//!   [`AgentSnapshot`]s across restarts
//!
//! Text generation and embedding are injected through the
//! [`TextGenerator`] and [`Embedder`] traits.
//!
//! # Modules
//!
//! - [`turn`]: roles, turns, query text and transcript rendering
//! - [`buffer`]: turn buffer with prefix eviction
//! - [`compactor`]: compaction trigger and prompt
//! - [`retriever`]: example corpus and top-K selection
//! - [`similarity`]: cosine similarity
//! - [`prompt`]: system message assembly
//! - [`persistence`]: versioned JSON snapshots
//! - [`config`]: tuning and file locations
//! - [`errors`]: typed error taxonomy
//! - [`history`]: the `ConversationHistory` façade

pub mod buffer;
pub mod capability;
pub mod compactor;
pub mod config;
pub mod errors;
pub mod history;
pub mod persistence;
pub mod prompt;
pub mod retriever;
pub mod similarity;
pub mod turn;

pub use buffer::TurnBuffer;
pub use capability::{Embedder, TextGenerator};
pub use compactor::{build_compaction_prompt, CompactionSummary, CompactionTrigger, MemoryCompactor};
pub use config::{save_path_for, MemoryConfig};
pub use errors::{CapabilityError, MemoryError, MemoryResult, PersistenceError, PersistenceResult};
pub use history::{AppendOutcome, ConversationHistory, LoadOutcome};
pub use persistence::{load_snapshot, save_snapshot, AgentSnapshot};
pub use prompt::{DocsProvider, PromptAssembler, PromptContext, StaticDocs};
pub use retriever::{load_corpus_file, parse_corpus, Example, ExampleRetriever};
pub use similarity::cosine_similarity;
pub use turn::{query_text, render_turns, Role, Turn, SYSTEM_AUTHOR};

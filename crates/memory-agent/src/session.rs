//! Chat session driver.
//!
//! Feeds utterances into a [`ConversationHistory`], produces a reply on
//! every `user` turn, and saves state after each handled turn.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use context_memory::{
    CapabilityError, ConversationHistory, LoadOutcome, MemoryError, PromptAssembler, Role,
    TextGenerator,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::OpenAiCompatBackend;
use crate::config::AgentConfig;
use crate::docs::FileDocs;

/// Author assigned to input lines that carry no `author:` prefix.
pub const DEFAULT_USER: &str = "player";

/// Failure while handling one utterance.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Appending to the history failed (compaction or retrieval).
    #[error("Turn failed: {0}")]
    Turn(#[source] MemoryError),

    /// The reply could not be generated.
    #[error("Reply generation failed: {0}")]
    Reply(#[from] CapabilityError),

    /// The reply was generated and added to the buffer, but the compaction
    /// it triggered failed.
    #[error("Reply produced but compaction failed: {source}")]
    ReplyNotRecorded {
        reply: String,
        #[source]
        source: MemoryError,
    },

    /// State could not be written. The session should stop.
    #[error("Failed to save history: {0}")]
    Save(#[source] MemoryError),
}

impl SessionError {
    /// Only save failures end the session; turn failures are skippable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Save(_))
    }

    /// Reply text that was generated before the failure, if any.
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::ReplyNotRecorded { reply, .. } => Some(reply),
            _ => None,
        }
    }
}

/// Split an input line into `(author, content)`.
///
/// `"steve: hi"` gives `("steve", "hi")`. A line without a colon, or with an
/// empty author, is attributed to [`DEFAULT_USER`]. Blank lines give `None`.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(':') {
        Some((author, content)) if !author.trim().is_empty() => {
            Some((author.trim().to_string(), content.trim().to_string()))
        }
        Some((_, content)) => Some((DEFAULT_USER.to_string(), content.trim().to_string())),
        None => Some((DEFAULT_USER.to_string(), line.to_string())),
    }
}

/// One agent's conversation loop.
pub struct ChatSession {
    history: ConversationHistory,
    generator: Arc<dyn TextGenerator>,
}

impl ChatSession {
    /// Replies are generated with the history's own generator.
    pub fn new(history: ConversationHistory) -> Self {
        let generator = history.generator();
        Self { history, generator }
    }

    /// Build backend, docs and history from `config`, optionally restoring
    /// saved state, then embed the example corpus.
    pub async fn start(config: &AgentConfig, restore: bool) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!(e))
            .context("Invalid agent config")?;

        let backend = Arc::new(OpenAiCompatBackend::from_config(config)?);
        let assembler = PromptAssembler::new(
            Arc::new(FileDocs::optional(config.capability_docs_path.as_deref())),
            Arc::new(FileDocs::optional(config.skill_docs_path.as_deref())),
        );

        let mut history = ConversationHistory::new(
            &config.name,
            config.memory.clone(),
            backend.clone(),
            backend,
        )
        .context("Failed to create conversation history")?
        .with_assembler(assembler);

        if restore {
            let outcome = history.load();
            info!(agent = %config.name, outcome = ?outcome, "history load");
        }
        if let Some(bio) = &config.bio {
            history.set_bio(bio.clone());
        }
        history.load_examples_from_config().await;

        Ok(Self::new(history))
    }

    /// Handle one utterance. Returns the agent's reply for `user` turns.
    ///
    /// State is saved after the turn whether or not it succeeded, since a
    /// failed compaction has already evicted turns.
    pub async fn handle(
        &mut self,
        author: &str,
        content: &str,
    ) -> Result<Option<String>, SessionError> {
        let result = self.respond(author, content).await;
        self.history.save().map_err(SessionError::Save)?;
        result
    }

    async fn respond(&mut self, author: &str, content: &str) -> Result<Option<String>, SessionError> {
        let outcome = self
            .history
            .append(author, content)
            .await
            .map_err(SessionError::Turn)?;
        if outcome.role != Role::User {
            return Ok(None);
        }

        let system_message = self.history.system_message(true);
        let turns = self.history.turns();
        let reply = self.generator.generate(&turns, &system_message).await?;
        let reply = reply.trim().to_string();
        if reply.is_empty() {
            warn!(agent = %self.history.name(), "empty reply, nothing appended");
            return Ok(None);
        }

        let name = self.history.name().to_string();
        if let Err(source) = self.history.append(&name, &reply).await {
            return Err(SessionError::ReplyNotRecorded { reply, source });
        }
        Ok(Some(reply))
    }

    /// Restore state from the configured save path.
    pub fn restore(&mut self) -> LoadOutcome {
        self.history.load()
    }

    pub fn name(&self) -> &str {
        self.history.name()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut ConversationHistory {
        &mut self.history
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.history.config().save_path.as_deref()
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

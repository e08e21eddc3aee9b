//! Conversation history. The single mutating entry point.
//!
//! `ConversationHistory` wires the turn buffer, compactor, example retriever,
//! prompt assembler and persistence together for one agent.
//!
//! ## Append flow
//!
//! 1. Classify the utterance and push it onto the buffer.
//! 2. If the buffer reached `max_messages`, evict a batch and fold it into
//!    `memory`. Eviction is committed before the compaction call; a failed
//!    call leaves the turns evicted and `memory` untouched.
//! 3. On `user` turns, re-rank the example corpus against the live buffer.
//!
//! `append` takes `&mut self`, so no other mutation can interleave while it
//! is suspended on a capability call.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::buffer::TurnBuffer;
use super::capability::{Embedder, TextGenerator};
use super::compactor::{CompactionSummary, MemoryCompactor};
use super::config::MemoryConfig;
use super::errors::{MemoryError, MemoryResult};
use super::persistence::{load_snapshot, save_snapshot, AgentSnapshot};
use super::prompt::{PromptAssembler, PromptContext};
use super::retriever::{load_corpus_file, Example, ExampleRetriever};
use super::turn::{Role, Turn};

/// Result of a successful `append`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendOutcome {
    /// Role the new turn was classified as.
    pub role: Role,
    /// Present when the append triggered a compaction.
    pub compaction: Option<CompactionSummary>,
    /// Number of examples selected, present on `user` turns.
    pub examples_selected: Option<usize>,
}

/// What `load` found at the save path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    /// No save path configured.
    Skipped,
    /// Nothing stored yet.
    Missing,
    /// File existed but could not be read or decoded.
    Corrupt,
    /// State restored.
    Restored,
}

/// Rolling context for one long-lived agent.
pub struct ConversationHistory {
    name: String,
    bio: String,
    memory: String,
    buffer: TurnBuffer,
    compactor: MemoryCompactor,
    retriever: ExampleRetriever,
    assembler: PromptAssembler,
    generator: Arc<dyn TextGenerator>,
    embedder: Arc<dyn Embedder>,
    config: MemoryConfig,
    compaction_count: u32,
}

impl ConversationHistory {
    /// Create an empty history. Rejects invalid configuration.
    pub fn new(
        name: &str,
        config: MemoryConfig,
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
    ) -> MemoryResult<Self> {
        config.validate().map_err(MemoryError::Configuration)?;
        Ok(Self {
            name: name.to_string(),
            bio: String::new(),
            memory: String::new(),
            buffer: TurnBuffer::new(),
            compactor: MemoryCompactor::new(config.max_messages),
            retriever: ExampleRetriever::from_examples(Vec::new(), config.fewshot),
            assembler: PromptAssembler::default(),
            generator,
            embedder,
            config,
            compaction_count: 0,
        })
    }

    /// Use a custom prompt assembler (persona, doc providers).
    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Use an already-built example corpus.
    pub fn with_examples(mut self, corpus: Vec<Example>) -> Self {
        self.retriever = ExampleRetriever::from_examples(corpus, self.config.fewshot);
        self
    }

    // ── Examples ──────────────────────────────────────────────────────────

    /// Embed `transcripts` and install them as the example corpus.
    pub async fn load_examples(&mut self, transcripts: Vec<Vec<Turn>>) {
        self.retriever =
            ExampleRetriever::build(transcripts, self.embedder.as_ref(), self.config.fewshot)
                .await;
    }

    /// Load the corpus named by `examples_path`. Missing path or file gives
    /// an empty corpus.
    pub async fn load_examples_from_config(&mut self) {
        let transcripts = match self.config.examples_path.as_deref() {
            Some(path) => load_corpus_file(path),
            None => {
                debug!(agent = %self.name, "no examples path configured");
                Vec::new()
            }
        };
        self.load_examples(transcripts).await;
    }

    // ── Conversation ──────────────────────────────────────────────────────

    /// Append an utterance by `author`, compacting and re-selecting
    /// examples as needed.
    pub async fn append(&mut self, author: &str, content: &str) -> MemoryResult<AppendOutcome> {
        let role = self.buffer.append(author, &self.name, content);

        let compaction = if self.compactor.should_compact(self.buffer.len()) {
            Some(self.compact().await?)
        } else {
            None
        };

        let examples_selected = if role == Role::User {
            let turns = self.buffer.turns();
            let n = self
                .retriever
                .refresh(&turns, self.embedder.as_ref())
                .await
                .map_err(MemoryError::Retrieval)?;
            Some(n)
        } else {
            None
        };

        Ok(AppendOutcome {
            role,
            compaction,
            examples_selected,
        })
    }

    async fn compact(&mut self) -> MemoryResult<CompactionSummary> {
        let batch = self.buffer.evict_batch();
        let evicted = batch.len();
        info!(
            agent = %self.name,
            evicted,
            remaining = self.buffer.len(),
            "summarizing memory"
        );

        let system_message = self.system_message(false);
        let memory_chars_before = self.memory.len();
        let new_memory = self
            .compactor
            .compact(
                self.generator.as_ref(),
                &system_message,
                &self.memory,
                &batch,
            )
            .await
            .map_err(|source| MemoryError::Compaction { evicted, source })?;

        self.memory = new_memory;
        self.compaction_count += 1;

        let summary = CompactionSummary {
            turns_evicted: evicted,
            memory_chars_before,
            memory_chars_after: self.memory.len(),
        };
        info!(
            agent = %self.name,
            compaction = self.compaction_count,
            memory_chars = summary.memory_chars_after,
            "compaction complete"
        );
        Ok(summary)
    }

    /// Assemble the system message for the next prompt.
    pub fn system_message(&self, include_examples: bool) -> String {
        let selected = self.retriever.selected();
        self.assembler.assemble(PromptContext {
            name: &self.name,
            bio: &self.bio,
            memory: &self.memory,
            examples: include_examples.then_some(selected.as_slice()),
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bio(&self) -> &str {
        &self.bio
    }

    /// Operator-set description. Not touched by compaction.
    pub fn set_bio(&mut self, bio: impl Into<String>) {
        self.bio = bio.into();
    }

    pub fn memory(&self) -> &str {
        &self.memory
    }

    /// Current verbatim turns, oldest first.
    pub fn turns(&self) -> Vec<Turn> {
        self.buffer.turns()
    }

    pub fn buffer(&self) -> &TurnBuffer {
        &self.buffer
    }

    pub fn selected_examples(&self) -> Vec<&Example> {
        self.retriever.selected()
    }

    pub fn retriever(&self) -> &ExampleRetriever {
        &self.retriever
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn compaction_count(&self) -> u32 {
        self.compaction_count
    }

    pub fn generator(&self) -> Arc<dyn TextGenerator> {
        Arc::clone(&self.generator)
    }

    // ── Persistence ───────────────────────────────────────────────────────

    /// Durable view of this history.
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot::new(&self.name, &self.bio, &self.memory, self.buffer.turns())
    }

    /// Write state to `save_path`. No-op when unset.
    pub fn save(&self) -> MemoryResult<()> {
        let Some(path) = self.save_path() else {
            return Ok(());
        };
        save_snapshot(&self.snapshot(), path)?;
        debug!(agent = %self.name, path = %path.display(), "history saved");
        Ok(())
    }

    /// Restore state from `save_path`. Never fails; problems are logged and
    /// the current state is kept.
    pub fn load(&mut self) -> LoadOutcome {
        let Some(path) = self.save_path().map(Path::to_path_buf) else {
            return LoadOutcome::Skipped;
        };

        match load_snapshot(&path) {
            Ok(Some(snapshot)) => {
                if snapshot.name != self.name {
                    warn!(
                        agent = %self.name,
                        saved_as = %snapshot.name,
                        "history file belongs to a different name"
                    );
                }
                self.bio = snapshot.bio;
                self.memory = snapshot.memory;
                self.buffer = TurnBuffer::from_turns(snapshot.turns);
                info!(
                    agent = %self.name,
                    turns = self.buffer.len(),
                    path = %path.display(),
                    "history restored"
                );
                LoadOutcome::Restored
            }
            Ok(None) => {
                warn!(agent = %self.name, path = %path.display(), "no history file found");
                LoadOutcome::Missing
            }
            Err(e) => {
                warn!(agent = %self.name, path = %path.display(), error = %e, "history file unreadable");
                LoadOutcome::Corrupt
            }
        }
    }

    fn save_path(&self) -> Option<&Path> {
        self.config
            .save_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

impl std::fmt::Debug for ConversationHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationHistory")
            .field("name", &self.name)
            .field("turns", &self.buffer.len())
            .field("memory_chars", &self.memory.len())
            .field("corpus", &self.retriever.len())
            .field("compaction_count", &self.compaction_count)
            .finish_non_exhaustive()
    }
}

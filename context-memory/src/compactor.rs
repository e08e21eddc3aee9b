//! Memory compactor: folds evicted turns into the single memory slot.
//!
//! Compaction is modeled as a pure function of the previous memory and the
//! evicted batch over an injected `TextGenerator`. The caller owns the
//! buffer mutation and decides what to do with the returned text.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::capability::TextGenerator;
use super::errors::CapabilityError;
use super::turn::{render_turns, Turn};

/// Default buffer length at which compaction fires.
pub const DEFAULT_MAX_MESSAGES: usize = 20;

/// Length-based compaction trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionTrigger {
    pub max_messages: usize,
}

impl CompactionTrigger {
    pub fn new(max_messages: usize) -> Self {
        Self { max_messages }
    }

    /// Evaluated after the new turn is appended.
    pub fn should_compact(&self, buffer_len: usize) -> bool {
        buffer_len >= self.max_messages
    }
}

impl Default for CompactionTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

/// What a single compaction did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionSummary {
    /// Turns removed from the front of the buffer.
    pub turns_evicted: usize,
    /// Memory length (chars) before the rewrite.
    pub memory_chars_before: usize,
    /// Memory length (chars) after the rewrite.
    pub memory_chars_after: usize,
}

/// Builds compaction prompts and runs them through a generator.
#[derive(Debug, Clone, Default)]
pub struct MemoryCompactor {
    trigger: CompactionTrigger,
}

impl MemoryCompactor {
    pub fn new(max_messages: usize) -> Self {
        Self {
            trigger: CompactionTrigger::new(max_messages),
        }
    }

    pub fn trigger(&self) -> CompactionTrigger {
        self.trigger
    }

    pub fn should_compact(&self, buffer_len: usize) -> bool {
        self.trigger.should_compact(buffer_len)
    }

    /// Produce the new memory text from the previous memory and the batch.
    ///
    /// `system_message` is the assembled prompt with bio and memory but
    /// without examples. The generator output is returned verbatim.
    pub async fn compact(
        &self,
        generator: &dyn TextGenerator,
        system_message: &str,
        previous_memory: &str,
        batch: &[Turn],
    ) -> Result<String, CapabilityError> {
        let prompt = build_compaction_prompt(previous_memory, batch);
        debug!(
            turns = batch.len(),
            prompt_chars = prompt.len(),
            "requesting memory compaction"
        );
        let request = [Turn::user(prompt)];
        generator.generate(&request, system_message).await
    }
}

/// Instruction prompt for the compaction call, followed by the rendered
/// batch.
pub fn build_compaction_prompt(previous_memory: &str, batch: &[Turn]) -> String {
    let mut prompt = String::from(
        "Update your \"Memory\" with the following conversation. Your \"Memory\" is for \
         storing information that will help you improve as an agent. Include details about \
         your interactions with other players that you may need to remember for later. Also \
         include things that you have learned through player feedback or by executing code. \
         Do not include information found in your Docs or that you got right on the first try.",
    );
    if !previous_memory.is_empty() {
        prompt.push_str(
            " Include information from your previous memory if it is still relevant. \
             Your output will replace your previous memory.",
        );
    }
    prompt.push_str(
        " Your output should be a brief list of things you have learned using the following \
         formats:\n",
    );
    prompt.push_str("- When the player... output...\n");
    prompt.push_str("- I learned that player [name]...\n");
    prompt.push_str(&render_turns(batch));
    prompt
}

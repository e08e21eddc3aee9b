//! System message assembly.
//!
//! Order is fixed: persona preamble, capability docs, skill docs, bio,
//! memory, then (optionally) the selected examples.

use std::sync::Arc;

use super::retriever::Example;
use super::turn::render_turns;

/// Placeholder replaced with the agent's name in persona templates.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Default persona preamble.
pub const DEFAULT_PERSONA: &str = "You are a playful game companion named '{name}' that can \
communicate with players, see, move, mine, build, and interact with the world by writing and \
executing code. Act human-like as if you were a typical player, rather than an AI. Be brief in \
your responses, omit needless words, and do not give instructions unless asked.";

/// Source of opaque, prompt-insertable documentation text.
pub trait DocsProvider: Send + Sync {
    fn docs(&self) -> String;
}

/// Fixed documentation text.
#[derive(Debug, Clone, Default)]
pub struct StaticDocs(pub String);

impl StaticDocs {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl DocsProvider for StaticDocs {
    fn docs(&self) -> String {
        self.0.clone()
    }
}

/// Per-call inputs to [`PromptAssembler::assemble`].
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub name: &'a str,
    pub bio: &'a str,
    pub memory: &'a str,
    /// `None` leaves the example sections out entirely.
    pub examples: Option<&'a [&'a Example]>,
}

/// Composes the system message from persona, docs, bio, memory and
/// examples.
#[derive(Clone)]
pub struct PromptAssembler {
    persona: String,
    capability_docs: Arc<dyn DocsProvider>,
    skill_docs: Arc<dyn DocsProvider>,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(
            Arc::new(StaticDocs::default()),
            Arc::new(StaticDocs::default()),
        )
    }
}

impl std::fmt::Debug for PromptAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptAssembler")
            .field("persona", &self.persona)
            .finish_non_exhaustive()
    }
}

impl PromptAssembler {
    pub fn new(capability_docs: Arc<dyn DocsProvider>, skill_docs: Arc<dyn DocsProvider>) -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            capability_docs,
            skill_docs,
        }
    }

    /// Replace the persona template. `{name}` is substituted on assembly.
    pub fn with_persona(mut self, template: impl Into<String>) -> Self {
        self.persona = template.into();
        self
    }

    pub fn persona(&self, name: &str) -> String {
        self.persona.replace(NAME_PLACEHOLDER, name)
    }

    pub fn assemble(&self, ctx: PromptContext<'_>) -> String {
        let mut message = self.persona(ctx.name);
        message.push_str(&self.capability_docs.docs());
        message.push_str(&self.skill_docs.docs());

        if !ctx.bio.is_empty() {
            message.push_str("\n\nBio:\n");
            message.push_str(ctx.bio);
        }
        if !ctx.memory.is_empty() {
            message.push_str("\n\nMemory:\n");
            message.push_str(ctx.memory);
        }
        if let Some(examples) = ctx.examples {
            for (i, example) in examples.iter().enumerate() {
                message.push_str(&format!("\n\nExample {}:\n\n", i + 1));
                message.push_str(&render_turns(&example.turns));
            }
        }
        message
    }
}

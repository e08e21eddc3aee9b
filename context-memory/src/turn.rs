//! Dialogue turns and role classification.
//!
//! A turn is one role-tagged utterance. Authorship is classified into a
//! closed set of roles, and the helpers here derive the two text views the
//! rest of the crate needs: the embedding query text and the rendered
//! transcript used inside prompts.

use serde::{Deserialize, Serialize};

/// Author name reserved for system-generated output.
pub const SYSTEM_AUTHOR: &str = "system";

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Another party talking to the agent.
    User,
    /// The agent itself.
    Assistant,
    /// Output from the environment (command results, errors).
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// A single immutable utterance in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Classify content authored by `author` from the point of view of the
    /// agent named `agent_name`.
    ///
    /// User turns carry their author as a `"{author}: "` prefix so that
    /// several parties can share one conversation.
    pub fn from_author(author: &str, agent_name: &str, content: &str) -> Self {
        if author == SYSTEM_AUTHOR {
            Self::system(content)
        } else if author == agent_name {
            Self::assistant(content)
        } else {
            Self::user(format!("{author}: {content}"))
        }
    }

    /// Content with any leading `label:` prefix removed and trimmed.
    ///
    /// Everything up to and including the first colon is dropped; content
    /// without a colon is kept whole.
    pub fn unlabeled_content(&self) -> &str {
        match self.content.find(':') {
            Some(idx) => self.content[idx + 1..].trim(),
            None => self.content.trim(),
        }
    }
}

/// Build the embedding query text for a transcript.
///
/// Non-assistant turns only, labels stripped, newline-joined, trimmed.
pub fn query_text<'a, I>(turns: I) -> String
where
    I: IntoIterator<Item = &'a Turn>,
{
    let mut text = String::new();
    for turn in turns {
        if turn.role != Role::Assistant {
            text.push_str(turn.unlabeled_content());
            text.push('\n');
        }
    }
    text.trim().to_string()
}

/// Render a transcript the way the model sees it inside a system message.
pub fn render_turns<'a, I>(turns: I) -> String
where
    I: IntoIterator<Item = &'a Turn>,
{
    let mut out = String::new();
    for turn in turns {
        match turn.role {
            Role::Assistant => {
                out.push_str("\n\nYour output:\n");
                out.push_str(&turn.content);
            }
            Role::System => {
                out.push_str("\n\nSystem output: ");
                out.push_str(&turn.content);
            }
            Role::User => {
                out.push_str("\n\nUser input: ");
                out.push_str(&turn.content);
            }
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_system() {
        let turn = Turn::from_author("system", "andy", "Code output: done");
        assert_eq!(turn.role, Role::System);
        assert_eq!(turn.content, "Code output: done");
    }

    #[test]
    fn test_classify_self_as_assistant() {
        let turn = Turn::from_author("andy", "andy", "on my way");
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "on my way");
    }

    #[test]
    fn test_classify_other_as_prefixed_user() {
        let turn = Turn::from_author("steve", "andy", "come here");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "steve: come here");
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let turn: Turn = serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(turn, Turn::user("hi"));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::System.to_string(), "system");
    }

    #[test]
    fn test_unlabeled_content() {
        assert_eq!(Turn::user("steve:  hello there ").unlabeled_content(), "hello there");
        assert_eq!(Turn::user("  no label ").unlabeled_content(), "no label");
        assert_eq!(Turn::user("a: b: c").unlabeled_content(), "b: c");
    }

    #[test]
    fn test_query_text_skips_assistant() {
        let turns = vec![
            Turn::user("steve: get wood"),
            Turn::assistant("sure: on it"),
            Turn::system("Code output: collected 4 logs"),
        ];
        assert_eq!(query_text(&turns), "get wood\ncollected 4 logs");
    }

    #[test]
    fn test_query_text_empty() {
        let turns = vec![Turn::assistant("hello")];
        assert_eq!(query_text(&turns), "");
    }

    #[test]
    fn test_render_turns_formats_by_role() {
        let turns = vec![
            Turn::user("steve: hi"),
            Turn::assistant("hey!"),
            Turn::system("Code output: ok"),
        ];
        assert_eq!(
            render_turns(&turns),
            "User input: steve: hi\n\nYour output:\nhey!\n\nSystem output: Code output: ok"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_turns(&Vec::<Turn>::new()), "");
    }
}

//! Turn buffer: the verbatim tail of the conversation.
//!
//! Append-only except for prefix eviction. The eviction rule always leaves
//! the buffer empty or starting with a `user` turn.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::turn::{Role, Turn};

/// Ordered sequence of dialogue turns, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnBuffer {
    turns: VecDeque<Turn>,
}

impl TurnBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a buffer from previously saved turns.
    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self {
            turns: turns.into(),
        }
    }

    /// Classify `content` by author and push it to the back.
    pub fn append(&mut self, author: &str, agent_name: &str, content: &str) -> Role {
        let turn = Turn::from_author(author, agent_name, content);
        let role = turn.role;
        self.turns.push_back(turn);
        role
    }

    /// Push an already-classified turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
    }

    /// Remove the oldest turn plus the run of non-`user` turns after it.
    ///
    /// Stops right before the next `user` turn or when the buffer runs out.
    pub fn evict_batch(&mut self) -> Vec<Turn> {
        let mut batch = Vec::new();
        let Some(first) = self.turns.pop_front() else {
            return batch;
        };
        batch.push(first);
        while self.turns.front().is_some_and(|t| t.role != Role::User) {
            if let Some(turn) = self.turns.pop_front() {
                batch.push(turn);
            }
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Copy of the current turns in chronological order.
    pub fn turns(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn front(&self) -> Option<&Turn> {
        self.turns.front()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl<'a> IntoIterator for &'a TurnBuffer {
    type Item = &'a Turn;
    type IntoIter = std::collections::vec_deque::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

//! Per-user conversation state.
//!
//! Defines [`UserMemory`] (what Akira remembers about a user), [`Turn`] (one
//! role-tagged message), and [`UserState`] (memory plus history, the unit the
//! state store persists).

use serde::{Deserialize, Serialize};

/// Facts and preferences remembered about one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMemory {
    /// Name the user introduced themselves with, if any.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Things the user said they like, in the order they were told.
    #[serde(default)]
    pub likes: Vec<String>,
    /// Free-form facts the user asked Akira to remember.
    #[serde(default)]
    pub facts: Vec<String>,
}

impl UserMemory {
    pub fn is_empty(&self) -> bool {
        self.user_name.is_none() && self.likes.is_empty() && self.facts.is_empty()
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// One role-tagged message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything persisted for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    #[serde(default)]
    pub memory: UserMemory,
    #[serde(default)]
    history: Vec<Turn>,
}

impl UserState {
    /// Rebuild a state from stored parts.
    pub fn from_parts(memory: UserMemory, history: Vec<Turn>) -> Self {
        Self { memory, history }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Append a completed exchange. History only ever grows by whole pairs.
    pub fn record_exchange(&mut self, message: impl Into<String>, reply: impl Into<String>) {
        self.history.push(Turn::user(message));
        self.history.push(Turn::assistant(reply));
    }

    /// The last `pairs` exchanges (at most `2 * pairs` turns), oldest first.
    pub fn recent_history(&self, pairs: usize) -> &[Turn] {
        let keep = pairs.saturating_mul(2).min(self.history.len());
        &self.history[self.history.len() - keep..]
    }

    /// Number of completed exchanges.
    pub fn exchange_count(&self) -> usize {
        self.history.len() / 2
    }
}

//! Turn and Conversation domain types — the message store.
//!
//! A conversation is an append-only log. `append` never touches the turns
//! already present: it hands back an extended copy, and the caller decides
//! whether to replace the copy it retains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Fixed system instruction
    System,
    /// The end user
    User,
    /// The language model
    Assistant,
    /// Synthetic record of a capability's output or failure
    ToolEvidence,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::ToolEvidence => "tool_evidence",
        };
        f.write_str(s)
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a turn with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a tool-evidence turn.
    pub fn tool_evidence(content: impl Into<String>) -> Self {
        Self::new(Role::ToolEvidence, content)
    }
}

/// An ordered, append-only sequence of turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered turns. Private so that nothing can rewrite history.
    turns: Vec<Turn>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Return a copy of this conversation extended by `turn`.
    #[must_use]
    pub fn append(&self, turn: Turn) -> Self {
        let mut next = self.clone();
        next.updated_at = Utc::now();
        next.turns.push(turn);
        next
    }

    /// The ordered list of turns to send to a model.
    ///
    /// The system instruction, when given, goes first. It is never stored
    /// in the conversation itself.
    pub fn render(&self, system_instruction: Option<&str>) -> Vec<Turn> {
        let mut rendered = Vec::with_capacity(self.turns.len() + 1);
        if let Some(instruction) = system_instruction.filter(|s| !s.trim().is_empty()) {
            rendered.push(Turn::system(instruction));
        }
        rendered.extend(self.turns.iter().cloned());
        rendered
    }

    /// Stored turns in conversation order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Content of the most recent user turn, if any.
    pub fn last_user_content(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

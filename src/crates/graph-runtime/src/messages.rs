//! Message types shared by the context manager, the checkpoint store, and the
//! auto-fix loop.
//!
//! This is a deliberately small model compared to a full chat-completion message
//! type: a turn only ever carries plain text content and the four roles the
//! kernel's data model names. There is no multi-part/vision content and no
//! tool-call payload — those belong to the LLM client, which is out of scope here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Role of the message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions or constraints given to the agent.
    System,
    /// Input from the end user.
    User,
    /// Output from the agent/model.
    Assistant,
    /// Result of a tool invocation.
    Tool,
}

impl MessageRole {
    /// `true` for the role that opens a [`crate::messages::Message`] conversation turn.
    pub fn is_system(self) -> bool {
        matches!(self, MessageRole::System)
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier, auto-generated if not supplied.
    pub id: String,
    /// Sender role.
    pub role: MessageRole,
    /// Plain-text content.
    pub content: String,
    /// Optional sender name (tool name for `Tool` messages, etc).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form metadata carried alongside the message, opaque to this crate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            name: None,
            metadata: None,
        }
    }

    /// Construct a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Construct a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Construct an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Construct a tool-result message.
    pub fn tool(content: impl Into<String>, name: impl Into<String>) -> Self {
        let mut msg = Self::new(MessageRole::Tool, content);
        msg.name = Some(name.into());
        msg
    }

    /// Set the message ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Strategy used by [`trim_messages`] when a message list exceeds its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimStrategy {
    /// Keep the oldest messages.
    First,
    /// Keep the newest messages.
    Last,
}

/// Options controlling [`trim_messages`].
#[derive(Debug, Clone)]
pub struct TrimOptions {
    /// Maximum number of non-system messages to keep.
    pub max_messages: usize,
    /// Whether to drop from the front or the back.
    pub strategy: TrimStrategy,
    /// Preserve a leading system message regardless of the budget.
    pub include_system: bool,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            max_messages: 20,
            strategy: TrimStrategy::Last,
            include_system: true,
        }
    }
}

impl TrimOptions {
    /// Keep the last `max_messages` messages.
    pub fn last(max_messages: usize) -> Self {
        Self {
            max_messages,
            strategy: TrimStrategy::Last,
            ..Default::default()
        }
    }

    /// Keep the first `max_messages` messages.
    pub fn first(max_messages: usize) -> Self {
        Self {
            max_messages,
            strategy: TrimStrategy::First,
            ..Default::default()
        }
    }

    /// Set whether a leading system message is preserved untouched.
    pub fn with_include_system(mut self, include: bool) -> Self {
        self.include_system = include;
        self
    }
}

/// Trim a message list down to `options.max_messages`, optionally preserving a
/// leading system message untouched.
pub fn trim_messages(messages: Vec<Message>, options: TrimOptions) -> Vec<Message> {
    if messages.is_empty() {
        return messages;
    }

    let mut working = messages;
    let system = if options.include_system && working[0].role.is_system() {
        Some(working.remove(0))
    } else {
        None
    };

    let mut trimmed = match options.strategy {
        TrimStrategy::Last => {
            if working.len() > options.max_messages {
                let skip = working.len() - options.max_messages;
                working.into_iter().skip(skip).collect()
            } else {
                working
            }
        }
        TrimStrategy::First => working.into_iter().take(options.max_messages).collect(),
    };

    if let Some(system) = system {
        let mut result = vec![system];
        result.append(&mut trimmed);
        result
    } else {
        trimmed
    }
}

use std::borrow::Borrow;
use std::fmt;

use crate::error::{MessagingError, Result};

/// Opaque message identity. Local appends use `local-<n>`, backend rows keep their own id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn local(seq: u64) -> Self {
        Self(format!("local-{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_local(&self) -> bool {
        self.0.starts_with("local-")
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Peer or group display name; doubles as the conversation's key in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ConversationKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ConversationKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A single chat entry. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    sender: String,
    text: String,
    is_own: bool,
}

impl Message {
    pub fn new(
        id: MessageId,
        sender: impl Into<String>,
        text: impl Into<String>,
        is_own: bool,
    ) -> Self {
        Self {
            id,
            sender: sender.into(),
            text: text.into(),
            is_own,
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_own(&self) -> bool {
        self.is_own
    }
}

/// Rejects text that is empty once surrounding whitespace is removed.
pub fn validate_text(text: &str) -> Result<&str> {
    if text.trim().is_empty() {
        return Err(MessagingError::EmptyText);
    }
    Ok(text)
}

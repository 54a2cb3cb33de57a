use log::debug;

use super::message::ConversationKey;
use super::store::ConversationStore;
use crate::error::{MessagingError, Result};

/// Names the conversation that is displayed and that the composer writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConversation {
    key: ConversationKey,
}

impl ActiveConversation {
    pub fn new(initial: impl Into<ConversationKey>) -> Self {
        Self { key: initial.into() }
    }

    /// Starts on the first conversation the store enumerates, if any.
    pub fn first_of(store: &ConversationStore) -> Option<Self> {
        store.keys().next().cloned().map(Self::new)
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Points at `key`. Keys the store does not know are rejected and the
    /// current selection is kept.
    pub fn select(&mut self, store: &ConversationStore, key: &str) -> Result<()> {
        if !store.contains(key) {
            return Err(MessagingError::NotFound(key.into()));
        }
        debug!("active conversation: '{}' -> '{key}'", self.key);
        self.key = key.into();
        Ok(())
    }
}

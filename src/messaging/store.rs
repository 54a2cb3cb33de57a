use std::collections::HashMap;

use log::debug;

use super::message::{ConversationKey, Message, MessageId, validate_text};
use crate::error::{MessagingError, Result};

/// In-memory mapping from conversation key to its append-only message list.
///
/// Conversations are created by [`ConversationStore::seed`] and are never removed;
/// messages are only ever appended.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<ConversationKey, Vec<Message>>,
    order: Vec<ConversationKey>,
    next_local: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `key` with its initial messages. A key that already exists keeps its
    /// current messages and the seed is dropped.
    pub fn seed(&mut self, key: impl Into<ConversationKey>, messages: Vec<Message>) {
        let key = key.into();
        if self.conversations.contains_key(&key) {
            debug!("conversation '{key}' already seeded, keeping existing messages");
            return;
        }
        debug!("seeding conversation '{key}' with {} messages", messages.len());
        self.order.push(key.clone());
        self.conversations.insert(key, messages);
    }

    /// Appends a new message to `key` and returns the updated list, new message last.
    ///
    /// Whitespace-only text is a no-op: the unchanged list comes back and nothing
    /// is reported to the caller.
    pub fn append_message(
        &mut self,
        key: &str,
        text: &str,
        sender: &str,
        is_own: bool,
    ) -> Result<&[Message]> {
        if !self.conversations.contains_key(key) {
            return Err(MessagingError::NotFound(key.into()));
        }
        let text = match validate_text(text) {
            Ok(text) => text,
            Err(err) => {
                debug!("ignoring append to '{key}': {err}");
                return self.get_messages(key);
            }
        };
        self.next_local += 1;
        let message = Message::new(MessageId::local(self.next_local), sender, text, is_own);
        self.push(key, message)
    }

    /// Appends a message that already carries an identity, e.g. one pushed by the
    /// backend. Returns `false` when a blank message was ignored.
    pub fn append_remote(&mut self, key: &str, message: Message) -> Result<bool> {
        if !self.conversations.contains_key(key) {
            return Err(MessagingError::NotFound(key.into()));
        }
        if validate_text(message.text()).is_err() {
            debug!("ignoring empty inbound message {} for '{key}'", message.id());
            return Ok(false);
        }
        self.push(key, message)?;
        Ok(true)
    }

    pub fn get_messages(&self, key: &str) -> Result<&[Message]> {
        self.conversations
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| MessagingError::NotFound(key.into()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.conversations.contains_key(key)
    }

    /// Conversation keys in the order they were seeded.
    pub fn keys(&self) -> impl Iterator<Item = &ConversationKey> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn push(&mut self, key: &str, message: Message) -> Result<&[Message]> {
        let messages = self
            .conversations
            .get_mut(key)
            .ok_or_else(|| MessagingError::NotFound(key.into()))?;
        debug!("appending {} to '{key}'", message.id());
        messages.push(message);
        Ok(messages.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::repository::seed_conversations;

    fn seeded() -> ConversationStore {
        let mut store = ConversationStore::new();
        for summary in seed_conversations() {
            store.seed(summary.peer_name, summary.messages);
        }
        store
    }

    #[test]
    fn append_to_alice_adds_own_message_last() {
        let mut store = seeded();
        assert_eq!(store.get_messages("Alice").unwrap().len(), 3);

        let messages = store
            .append_message("Alice", "Hello Alice, how are you?", "Me", true)
            .unwrap();

        assert_eq!(messages.len(), 4);
        let last = messages.last().unwrap();
        assert_eq!(last.sender(), "Me");
        assert_eq!(last.text(), "Hello Alice, how are you?");
        assert!(last.is_own());
    }

    #[test]
    fn whitespace_append_is_a_no_op() {
        let mut store = seeded();
        let messages = store.append_message("Alice", "   ", "Me", true).unwrap();
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn append_n_messages_keeps_order_and_flags() {
        let mut store = seeded();
        let keys: Vec<String> = store.keys().map(|k| k.to_string()).collect();
        for key in &keys {
            let before = store.get_messages(key).unwrap().to_vec();
            let inputs = [("one", "Me", true), ("two", "Bob", false), ("three", "Me", true)];
            for (text, sender, own) in inputs {
                store.append_message(key, text, sender, own).unwrap();
            }

            let after = store.get_messages(key).unwrap();
            assert_eq!(after.len(), before.len() + inputs.len());
            assert_eq!(&after[..before.len()], before.as_slice());
            for (message, (text, sender, own)) in after[before.len()..].iter().zip(inputs) {
                assert_eq!(message.text(), text);
                assert_eq!(message.sender(), sender);
                assert_eq!(message.is_own(), own);
            }
        }
    }

    #[test]
    fn local_ids_are_unique_across_conversations() {
        let mut store = seeded();
        let a = store.append_message("Alice", "x", "Me", true).unwrap().last().unwrap().id().clone();
        let j = store.append_message("John", "y", "Me", true).unwrap().last().unwrap().id().clone();
        assert_ne!(a, j);
        assert!(a.is_local() && j.is_local());
    }

    #[test]
    fn unknown_key_is_not_found() {
        let mut store = seeded();
        assert!(matches!(
            store.append_message("Nobody", "hi", "Me", true),
            Err(MessagingError::NotFound(key)) if key.as_str() == "Nobody"
        ));
        assert!(matches!(store.get_messages("Nobody"), Err(MessagingError::NotFound(_))));
    }

    #[test]
    fn reseeding_keeps_existing_messages() {
        let mut store = seeded();
        store.append_message("Mary", "still here", "Me", true).unwrap();
        store.seed("Mary", Vec::new());
        assert_eq!(store.get_messages("Mary").unwrap().len(), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn keys_follow_seed_order() {
        let store = seeded();
        let keys: Vec<&str> = store.keys().map(ConversationKey::as_str).collect();
        assert_eq!(keys, ["Alice", "John", "Mary"]);
    }

    #[test]
    fn remote_messages_keep_their_identity() {
        let mut store = seeded();
        let inbound = Message::new(MessageId::new("srv-42"), "John", "Rehearsal at 7?", false);
        assert!(store.append_remote("John", inbound.clone()).unwrap());
        assert_eq!(store.get_messages("John").unwrap().last(), Some(&inbound));

        let blank = Message::new(MessageId::new("srv-43"), "John", "  ", false);
        assert!(!store.append_remote("John", blank).unwrap());
        assert_eq!(store.get_messages("John").unwrap().len(), 3);
    }
}

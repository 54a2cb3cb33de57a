use log::debug;

use super::message::{Message, validate_text};
use super::selector::ActiveConversation;
use super::store::ConversationStore;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ComposerState {
    #[default]
    Idle,
    Editing(String),
}

/// Holds the pending outbound text for one view.
#[derive(Debug, Default)]
pub struct Composer {
    state: ComposerState,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ComposerState {
        &self.state
    }

    pub fn draft(&self) -> &str {
        match &self.state {
            ComposerState::Idle => "",
            ComposerState::Editing(text) => text,
        }
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.state = if text.is_empty() {
            ComposerState::Idle
        } else {
            ComposerState::Editing(text)
        };
    }

    /// Appends the draft to the active conversation as an own message and clears it.
    ///
    /// Returns `Ok(None)` without touching anything when the draft is blank. On error
    /// the draft is kept so it can be resubmitted.
    pub fn submit(
        &mut self,
        store: &mut ConversationStore,
        active: &ActiveConversation,
        self_name: &str,
    ) -> Result<Option<Message>> {
        if validate_text(self.draft()).is_err() {
            debug!("blank draft, nothing to submit");
            return Ok(None);
        }
        let messages = store.append_message(active.key().as_str(), self.draft(), self_name, true)?;
        let sent = messages.last().cloned();
        self.state = ComposerState::Idle;
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessagingError;
    use crate::messaging::repository::seed_conversations;

    fn seeded() -> ConversationStore {
        let mut store = ConversationStore::new();
        for summary in seed_conversations() {
            store.seed(summary.peer_name, summary.messages);
        }
        store
    }

    fn counts(store: &ConversationStore) -> Vec<usize> {
        store
            .keys()
            .map(|key| store.get_messages(key.as_str()).unwrap().len())
            .collect()
    }

    #[test]
    fn draft_drives_state_machine() {
        let mut composer = Composer::new();
        assert_eq!(composer.state(), &ComposerState::Idle);
        composer.set_draft("hey");
        assert_eq!(composer.state(), &ComposerState::Editing("hey".into()));
        composer.set_draft("");
        assert_eq!(composer.state(), &ComposerState::Idle);
    }

    #[test]
    fn submit_appends_and_clears() {
        let mut store = seeded();
        let active = ActiveConversation::new("John");
        let mut composer = Composer::new();
        composer.set_draft("Jam on Friday?");

        let sent = composer.submit(&mut store, &active, "Me").unwrap().unwrap();

        assert_eq!(sent.text(), "Jam on Friday?");
        assert_eq!(sent.sender(), "Me");
        assert!(sent.is_own());
        assert_eq!(store.get_messages("John").unwrap().last(), Some(&sent));
        assert_eq!(composer.state(), &ComposerState::Idle);
    }

    #[test]
    fn blank_submit_changes_nothing_for_any_active_key() {
        let mut store = seeded();
        let before = counts(&store);
        let keys: Vec<String> = store.keys().map(|k| k.to_string()).collect();
        for key in keys {
            let active = ActiveConversation::new(key);
            for draft in ["", " ", "\t\n  "] {
                let mut composer = Composer::new();
                composer.set_draft(draft);
                assert!(composer.submit(&mut store, &active, "Me").unwrap().is_none());
                assert_eq!(composer.draft(), draft);
            }
        }
        assert_eq!(counts(&store), before);
    }

    #[test]
    fn failed_submit_keeps_draft() {
        let mut store = seeded();
        let active = ActiveConversation::new("Nobody");
        let mut composer = Composer::new();
        composer.set_draft("lost?");
        assert!(matches!(
            composer.submit(&mut store, &active, "Me"),
            Err(MessagingError::NotFound(_))
        ));
        assert_eq!(composer.draft(), "lost?");
    }
}

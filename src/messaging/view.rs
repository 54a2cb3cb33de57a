use std::collections::HashMap;

use log::{debug, info};

use super::composer::Composer;
use super::message::{ConversationKey, Message};
use super::repository::{ConversationRepository, ConversationSummary, OutboundMessage};
use super::selector::ActiveConversation;
use super::store::ConversationStore;
use crate::error::{MessagingError, Result};

/// Who "self" is for this view: backend id for sends, display name for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

/// The messaging screen's state: store, active selection and composer, plus the
/// mapping from conversation key to backend conversation id.
#[derive(Debug)]
pub struct MessagingView {
    store: ConversationStore,
    active: ActiveConversation,
    composer: Composer,
    identity: Identity,
    peer_ids: HashMap<ConversationKey, String>,
    keys_by_peer: HashMap<String, ConversationKey>,
}

impl MessagingView {
    /// Loads every conversation for `identity` and selects the first one.
    pub async fn mount(repository: &dyn ConversationRepository, identity: Identity) -> Result<Self> {
        let summaries = repository.fetch_conversations(&identity.user_id).await?;
        info!("loaded {} conversations for {}", summaries.len(), identity.user_id);
        Self::from_summaries(summaries, identity)
    }

    pub fn from_summaries(summaries: Vec<ConversationSummary>, identity: Identity) -> Result<Self> {
        let mut store = ConversationStore::new();
        let mut peer_ids = HashMap::new();
        let mut keys_by_peer = HashMap::new();
        for summary in summaries {
            let key = ConversationKey::new(summary.peer_name);
            if store.contains(key.as_str()) {
                debug!("duplicate conversation name '{key}', keeping the first");
                continue;
            }
            peer_ids.insert(key.clone(), summary.peer_id.clone());
            keys_by_peer.insert(summary.peer_id, key.clone());
            store.seed(key, summary.messages);
        }
        let active = ActiveConversation::first_of(&store).ok_or(MessagingError::NoConversations)?;
        Ok(Self {
            store,
            active,
            composer: Composer::new(),
            identity,
            peer_ids,
            keys_by_peer,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn conversation_keys(&self) -> impl Iterator<Item = &ConversationKey> {
        self.store.keys()
    }

    pub fn active_key(&self) -> &ConversationKey {
        self.active.key()
    }

    pub fn active_messages(&self) -> Result<&[Message]> {
        self.store.get_messages(self.active.key().as_str())
    }

    pub fn get_messages(&self, key: &str) -> Result<&[Message]> {
        self.store.get_messages(key)
    }

    pub fn append_message(
        &mut self,
        key: &str,
        text: &str,
        sender: &str,
        is_own: bool,
    ) -> Result<&[Message]> {
        self.store.append_message(key, text, sender, is_own)
    }

    pub fn select_conversation(&mut self, key: &str) -> Result<()> {
        self.active.select(&self.store, key)
    }

    pub fn draft(&self) -> &str {
        self.composer.draft()
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.composer.set_draft(text);
    }

    /// Appends the draft to the active conversation and returns it addressed for
    /// the backend. Blank drafts return `Ok(None)`.
    pub fn submit(&mut self) -> Result<Option<OutboundMessage>> {
        let Some(sent) = self
            .composer
            .submit(&mut self.store, &self.active, &self.identity.display_name)?
        else {
            return Ok(None);
        };
        let conversation_id = self.peer_id(self.active.key().as_str())?.to_string();
        Ok(Some(OutboundMessage {
            conversation_id,
            sender_id: self.identity.user_id.clone(),
            text: sent.text().to_string(),
        }))
    }

    /// Routes a message pushed by the backend into its conversation. Returns
    /// `false` when the message was blank and nothing was stored.
    pub fn receive(&mut self, conversation_id: &str, message: Message) -> Result<bool> {
        let key = self
            .keys_by_peer
            .get(conversation_id)
            .ok_or_else(|| MessagingError::UnknownConversationId(conversation_id.to_string()))?;
        self.store.append_remote(key.as_str(), message)
    }

    pub fn peer_id(&self, key: &str) -> Result<&str> {
        self.peer_ids
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| MessagingError::NotFound(key.into()))
    }
}

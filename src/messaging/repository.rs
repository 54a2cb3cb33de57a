use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::{debug, trace};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::message::{Message, MessageId};
use crate::error::RepositoryError;

/// One conversation as loaded from a data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub peer_id: String,
    pub peer_name: String,
    pub messages: Vec<Message>,
}

/// An own message that still has to reach the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
}

/// Live feed of inbound messages for one conversation. Dropping it cancels the feed.
#[derive(Debug)]
pub struct Subscription {
    conversation_id: String,
    inbound: mpsc::UnboundedReceiver<Message>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(
        conversation_id: impl Into<String>,
        inbound: mpsc::UnboundedReceiver<Message>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            inbound,
            task,
        }
    }

    /// A subscription that is already finished; `recv` yields `None` straight away.
    pub fn closed(conversation_id: impl Into<String>) -> Self {
        let (_tx, rx) = mpsc::unbounded_channel();
        Self::new(conversation_id, rx, None)
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub async fn recv(&mut self) -> Option<Message> {
        self.inbound.recv().await
    }

    /// Non-blocking poll used by the UI loop between prompts.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.inbound.try_recv().ok()
    }

    pub fn cancel(&mut self) {
        debug!("cancelling subscription for {}", self.conversation_id);
        self.inbound.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Data-access boundary for conversations. Implemented by the hosted backend
/// client, the local sqlite cache and an in-memory fixture.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn fetch_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationSummary>, RepositoryError>;

    async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, RepositoryError>;

    async fn subscribe(&self, conversation_id: &str) -> Result<Subscription, RepositoryError>;
}

/// Mock conversations shown when no backend is configured.
pub fn seed_conversations() -> Vec<ConversationSummary> {
    fn msg(id: &str, sender: &str, text: &str, is_own: bool) -> Message {
        Message::new(MessageId::new(id), sender, text, is_own)
    }

    vec![
        ConversationSummary {
            peer_id: "alice".into(),
            peer_name: "Alice".into(),
            messages: vec![
                msg("seed-1", "Alice", "Hey! Loved your set at the open mic.", false),
                msg("seed-2", "Me", "Thanks! Are you still looking for a bassist?", true),
                msg("seed-3", "Alice", "We are. Can you send over a demo?", false),
            ],
        },
        ConversationSummary {
            peer_id: "john".into(),
            peer_name: "John".into(),
            messages: vec![
                msg("seed-4", "John", "Studio is booked for Saturday.", false),
                msg("seed-5", "Me", "Perfect, I'll bring the pedalboard.", true),
            ],
        },
        ConversationSummary {
            peer_id: "mary".into(),
            peer_name: "Mary".into(),
            messages: vec![msg(
                "seed-6",
                "Mary",
                "Want to collab on a track next month?",
                false,
            )],
        },
    ]
}

#[derive(Debug, Default)]
struct MemoryState {
    conversations: Vec<ConversationSummary>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Message>>>,
    sent: Vec<OutboundMessage>,
    next_id: u64,
}

/// Process-local repository backed by plain vectors.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryRepository {
    pub fn new(conversations: Vec<ConversationSummary>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                conversations,
                ..MemoryState::default()
            }),
        }
    }

    pub fn seeded() -> Self {
        Self::new(seed_conversations())
    }

    /// Messages accepted through `send_message`, oldest first.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.lock().sent.clone()
    }

    /// Pushes `message` to every live subscriber of `conversation_id` and
    /// returns how many received it.
    pub fn deliver(&self, conversation_id: &str, message: Message) -> usize {
        let mut state = self.lock();
        if let Some(conv) = state
            .conversations
            .iter_mut()
            .find(|c| c.peer_id == conversation_id)
        {
            conv.messages.push(message.clone());
        }
        let Some(subscribers) = state.subscribers.get_mut(conversation_id) else {
            trace!("no subscribers for {conversation_id}");
            return 0;
        };
        subscribers.retain(|tx| !tx.is_closed());
        subscribers
            .iter()
            .filter(|tx| tx.send(message.clone()).is_ok())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ConversationRepository for InMemoryRepository {
    async fn fetch_conversations(
        &self,
        _user_id: &str,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        Ok(self.lock().conversations.clone())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, RepositoryError> {
        let mut state = self.lock();
        state.next_id += 1;
        let message = Message::new(
            MessageId::new(format!("mem-{}", state.next_id)),
            sender_id,
            text,
            true,
        );
        state.sent.push(OutboundMessage {
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
        });
        if let Some(conv) = state
            .conversations
            .iter_mut()
            .find(|c| c.peer_id == conversation_id)
        {
            conv.messages.push(message.clone());
        }
        Ok(message)
    }

    async fn subscribe(&self, conversation_id: &str) -> Result<Subscription, RepositoryError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock()
            .subscribers
            .entry(conversation_id.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(conversation_id, rx, None))
    }
}

//! Client-side conversation state: the message store, the active-conversation
//! pointer, the composer, and the repository boundary they load from.

pub mod composer;
pub mod message;
pub mod repository;
pub mod selector;
pub mod store;
pub mod view;

pub use composer::{Composer, ComposerState};
pub use message::{ConversationKey, Message, MessageId};
pub use repository::{
    ConversationRepository, ConversationSummary, InMemoryRepository, OutboundMessage, Subscription,
};
pub use selector::ActiveConversation;
pub use store::ConversationStore;
pub use view::{Identity, MessagingView};

use thiserror::Error;

use crate::messaging::ConversationKey;

/// Failures crossing the data-access boundary (REST, realtime feed, local cache).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend answered HTTP {status} for {endpoint}")]
    Status { status: u16, endpoint: String },
    #[error("realtime connection failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
    #[error("malformed backend payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("local cache error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend returned no row for {0}")]
    EmptyResponse(String),
    #[error("conversation '{0}' is not cached")]
    UnknownConversation(String),
    #[error("no data directory available")]
    NoDataDir,
}

#[derive(Debug, Error)]
pub enum MessagingError {
    /// The key does not name a conversation in the store. Indicates a UI wiring bug.
    #[error("conversation '{0}' not found")]
    NotFound(ConversationKey),
    #[error("no conversation with backend id '{0}'")]
    UnknownConversationId(String),
    #[error("message text is empty")]
    EmptyText,
    #[error("backend returned no conversations")]
    NoConversations,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type Result<T, E = MessagingError> = std::result::Result<T, E>;

/// Anything that ends an interactive session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("terminal io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

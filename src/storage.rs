use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use directories::ProjectDirs;
use log::debug;
use rusqlite::{Connection, params};

use crate::error::RepositoryError;
use crate::messaging::{
    ConversationRepository, ConversationSummary, Message, MessageId, Subscription,
};

const SCHEMA: &str = r#"
    PRAGMA journal_mode = WAL;
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        peer_name TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL,
        conversation_id TEXT NOT NULL REFERENCES conversations(id),
        sender TEXT NOT NULL,
        body TEXT NOT NULL,
        is_own INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS messages_by_conversation ON messages(conversation_id, seq);
"#;

pub fn default_db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "bandfam", "BandFam")?;
    Some(proj.data_dir().join("cache.sqlite"))
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Local conversation cache. Serves the last fetched snapshot when the backend
/// is unreachable and keeps messages written while offline.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_default() -> Result<Self, RepositoryError> {
        let path = default_db_path().ok_or(RepositoryError::NoDataDir)?;
        Self::open(&path)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the cached copy of each conversation with `snapshot`.
    pub fn upsert_conversations(
        &self,
        snapshot: &[ConversationSummary],
    ) -> Result<(), RepositoryError> {
        let now = now_secs();
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        for conv in snapshot {
            tx.execute(
                r#"
                INSERT INTO conversations (id, peer_name, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    peer_name=excluded.peer_name,
                    updated_at=excluded.updated_at
                "#,
                params![conv.peer_id, conv.peer_name, now],
            )?;
            tx.execute(
                "DELETE FROM messages WHERE conversation_id = ?1",
                params![conv.peer_id],
            )?;
            for msg in &conv.messages {
                tx.execute(
                    "INSERT INTO messages (id, conversation_id, sender, body, is_own) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![msg.id().as_str(), conv.peer_id, msg.sender(), msg.text(), msg.is_own()],
                )?;
            }
        }
        tx.commit()?;
        debug!("cached {} conversations", snapshot.len());
        Ok(())
    }

    fn load(&self) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let conn = self.lock();
        let mut convs = conn.prepare(
            "SELECT id, peer_name FROM conversations ORDER BY updated_at DESC, peer_name ASC",
        )?;
        let mut msgs = conn.prepare(
            "SELECT id, sender, body, is_own FROM messages WHERE conversation_id = ?1 ORDER BY seq",
        )?;
        let rows = convs.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            let (peer_id, peer_name) = row?;
            let messages = msgs
                .query_map(params![peer_id], |row| {
                    Ok(Message::new(
                        MessageId::new(row.get::<_, String>(0)?),
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            out.push(ConversationSummary {
                peer_id,
                peer_name,
                messages,
            });
        }
        Ok(out)
    }

    /// Adds a message the backend already stored to the cached conversation.
    pub fn record_message(
        &self,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), RepositoryError> {
        self.insert(
            conversation_id,
            Some(message.id().clone()),
            message.sender(),
            message.text(),
            message.is_own(),
        )?;
        Ok(())
    }

    fn insert(
        &self,
        conversation_id: &str,
        id: Option<MessageId>,
        sender: &str,
        text: &str,
        is_own: bool,
    ) -> Result<Message, RepositoryError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let touched = tx.execute(
            "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
            params![conversation_id, now_secs()],
        )?;
        if touched == 0 {
            return Err(RepositoryError::UnknownConversation(conversation_id.to_string()));
        }
        let next: i64 = tx.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM messages", [], |row| {
            row.get(0)
        })?;
        let id = id.unwrap_or_else(|| MessageId::new(format!("cache-{next}")));
        tx.execute(
            "INSERT INTO messages (seq, id, conversation_id, sender, body, is_own) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![next, id.as_str(), conversation_id, sender, text, is_own],
        )?;
        tx.commit()?;
        Ok(Message::new(id, sender, text, is_own))
    }
}

#[async_trait]
impl ConversationRepository for SqliteCache {
    async fn fetch_conversations(
        &self,
        _user_id: &str,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        self.load()
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, RepositoryError> {
        self.insert(conversation_id, None, sender_id, text, true)
    }

    /// The cache has no change feed.
    async fn subscribe(&self, conversation_id: &str) -> Result<Subscription, RepositoryError> {
        Ok(Subscription::closed(conversation_id))
    }
}

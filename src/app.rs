use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use directories::BaseDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::api::client::RestBackend;
use crate::error::RepositoryError;
use crate::messaging::{
    ConversationRepository, ConversationSummary, Identity, InMemoryRepository, Message,
    Subscription,
};
use crate::storage::SqliteCache;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub backend_url: String,
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub user_id: String,
    pub display_name: String,
    pub offline: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            api_key: String::new(),
            access_token: None,
            user_id: "me".into(),
            display_name: "Me".into(),
            offline: false,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<config_dir>/bandfam.toml`, used when no path is given on the command line.
    pub fn default_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("bandfam.toml"))
    }

    fn legacy_json_path() -> Option<PathBuf> {
        let proj = directories::ProjectDirs::from("com", "bandfam", "BandFam")?;
        Some(proj.config_dir().join("state.json"))
    }

    // TOML is the primary format; an older state.json is read once and rewritten as TOML.
    pub fn load(path: Option<&Path>) -> Self {
        if let Some(config) = path.and_then(Self::load_toml) {
            return config;
        }

        if let Some(legacy) = Self::legacy_json_path() {
            if let Ok(bytes) = fs::read(&legacy) {
                if let Ok(config) = serde_json::from_slice::<AppConfig>(&bytes) {
                    info!("migrating {} to toml", legacy.display());
                    if let Some(path) = path {
                        if let Err(err) = config.save_to(path) {
                            warn!("could not save migrated config: {err}");
                        }
                    }
                    return config;
                }
            }
        }

        Self::new()
    }

    pub fn load_toml(path: &Path) -> Option<Self> {
        let text = fs::read_to_string(path).ok()?;
        match toml::from_str::<AppConfig>(&text) {
            Ok(config) => Some(config),
            Err(err) => {
                warn!("ignoring unreadable config {}: {err}", path.display());
                None
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), RepositoryError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        fs::write(path, toml)?;
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        !self.backend_url.is_empty() && !self.api_key.is_empty()
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Backend first, local cache as fallback: fetched snapshots and delivered
/// messages refresh the cache, a failed fetch serves whatever was cached last,
/// and a failed send is still written to the cache before the error is returned.
pub struct CachingRepository {
    remote: RestBackend,
    cache: SqliteCache,
}

impl CachingRepository {
    pub fn new(remote: RestBackend, cache: SqliteCache) -> Self {
        Self { remote, cache }
    }
}

#[async_trait]
impl ConversationRepository for CachingRepository {
    async fn fetch_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        match self.remote.fetch_conversations(user_id).await {
            Ok(snapshot) => {
                if let Err(err) = self.cache.upsert_conversations(&snapshot) {
                    warn!("failed to cache conversations: {err}");
                }
                Ok(snapshot)
            }
            Err(err) => {
                warn!("backend fetch failed, using cache: {err}");
                let cached = self.cache.fetch_conversations(user_id).await?;
                if cached.is_empty() {
                    return Err(err);
                }
                Ok(cached)
            }
        }
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, RepositoryError> {
        match self.remote.send_message(conversation_id, sender_id, text).await {
            Ok(stored) => {
                if let Err(err) = self.cache.record_message(conversation_id, &stored) {
                    warn!("failed to cache sent message: {err}");
                }
                Ok(stored)
            }
            Err(err) => {
                match self.cache.send_message(conversation_id, sender_id, text).await {
                    Ok(kept) => warn!("send failed, kept {} in local cache: {err}", kept.id()),
                    Err(cache_err) => warn!("send failed and could not be cached: {cache_err}"),
                }
                Err(err)
            }
        }
    }

    async fn subscribe(&self, conversation_id: &str) -> Result<Subscription, RepositoryError> {
        self.remote.subscribe(conversation_id).await
    }
}

/// Picks the data source for a session: seeded mock data when offline,
/// otherwise the hosted backend fronted by the local cache.
pub fn open_repository(
    config: &AppConfig,
) -> Result<Box<dyn ConversationRepository>, RepositoryError> {
    if config.offline || !config.is_configured() {
        info!("using local mock conversations");
        return Ok(Box::new(InMemoryRepository::seeded()));
    }
    let remote = RestBackend::new(&config.backend_url, config.api_key.clone())?
        .with_access_token(config.access_token.clone())
        .with_user(config.user_id.clone());
    let cache = SqliteCache::open_default().or_else(|err| {
        warn!("cache unavailable ({err}), continuing in memory");
        SqliteCache::open_in_memory()
    })?;
    Ok(Box::new(CachingRepository::new(remote, cache)))
}

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client as HttpClient;
use url::Url;

use crate::api::events;
use crate::api::models::{NewMessageRow, WireConversation, WireMessage};
use crate::error::RepositoryError;
use crate::messaging::{ConversationRepository, ConversationSummary, Message, Subscription};

const CONVERSATION_SELECT: &str =
    "id,peer_name,messages(id,conversation_id,sender_id,sender_name,body,created_at)";

/// Client for the hosted backend's REST and realtime endpoints.
pub struct RestBackend {
    http: HttpClient,
    base_url: Url,
    api_key: String,
    access_token: Option<String>,
    user_id: String,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, RepositoryError> {
        Ok(Self {
            http: HttpClient::new(),
            base_url: Url::parse(base_url)?,
            api_key: api_key.into(),
            access_token: None,
            user_id: String::new(),
        })
    }

    /// Replaces the HTTP client with one that gives up after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, RepositoryError> {
        self.http = HttpClient::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Own user id; realtime echoes of this user's messages are dropped.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Signed-in session token; falls back to the api key when absent.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn rest_base(&self) -> String {
        let trimmed = self.base_url.as_str().trim_end_matches('/');
        if trimmed.ends_with("/rest/v1") {
            trimmed.to_string()
        } else {
            format!("{trimmed}/rest/v1")
        }
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {bearer}"))
    }

    pub fn conversations_endpoint(&self, user_id: &str) -> Result<Url, RepositoryError> {
        let mut url = Url::parse(&format!("{}/conversations", self.rest_base()))?;
        url.query_pairs_mut()
            .append_pair("select", CONVERSATION_SELECT)
            .append_pair("member_id", &format!("eq.{user_id}"));
        Ok(url)
    }

    pub fn messages_endpoint(&self) -> String {
        format!("{}/messages", self.rest_base())
    }

    /// Reaches the REST root and returns the HTTP status, whatever it is.
    pub async fn ping(&self) -> Result<u16, RepositoryError> {
        let endpoint = format!("{}/", self.rest_base());
        let resp = self.with_auth(self.http.get(&endpoint)).send().await?;
        Ok(resp.status().as_u16())
    }

    async fn checked(
        resp: reqwest::Response,
        endpoint: &str,
    ) -> Result<reqwest::Response, RepositoryError> {
        let status = resp.status();
        if !status.is_success() {
            warn!("{endpoint} answered HTTP {status}");
            return Err(RepositoryError::Status {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ConversationRepository for RestBackend {
    async fn fetch_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let url = self.conversations_endpoint(user_id)?;
        let endpoint = url.to_string();
        let resp = self.with_auth(self.http.get(url)).send().await?;
        let rows: Vec<WireConversation> = Self::checked(resp, &endpoint).await?.json().await?;
        debug!("fetched {} conversations", rows.len());
        Ok(rows.into_iter().map(|row| row.into_summary(user_id)).collect())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, RepositoryError> {
        let endpoint = self.messages_endpoint();
        let body = NewMessageRow {
            conversation_id,
            sender_id,
            body: text,
        };
        let req = self
            .with_auth(self.http.post(&endpoint))
            .header("Prefer", "return=representation")
            .json(&body);
        let resp = req.send().await?;
        let rows: Vec<WireMessage> = Self::checked(resp, &endpoint).await?.json().await?;
        rows.into_iter()
            .next()
            .map(|row| row.into_message(sender_id))
            .ok_or_else(|| RepositoryError::EmptyResponse(endpoint))
    }

    async fn subscribe(&self, conversation_id: &str) -> Result<Subscription, RepositoryError> {
        let ws_url = events::realtime_url(&self.base_url, &self.api_key)?;
        events::subscribe(ws_url, conversation_id, &self.user_id, self.access_token.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_base_is_not_doubled() {
        let plain = RestBackend::new("https://abc.backend.example", "k").unwrap();
        assert_eq!(plain.messages_endpoint(), "https://abc.backend.example/rest/v1/messages");

        let already = RestBackend::new("https://abc.backend.example/rest/v1/", "k").unwrap();
        assert_eq!(already.messages_endpoint(), "https://abc.backend.example/rest/v1/messages");
    }

    #[test]
    fn conversations_query_filters_by_member() {
        let backend = RestBackend::new("https://abc.backend.example", "k").unwrap();
        let url = backend.conversations_endpoint("user-1").unwrap();
        assert_eq!(url.path(), "/rest/v1/conversations");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("member_id".into(), "eq.user-1".into())));
        assert!(pairs.iter().any(|(k, v)| k == "select" && v.starts_with("id,peer_name")));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            RestBackend::new("not a url", "k"),
            Err(RepositoryError::Url(_))
        ));
    }

    #[tokio::test]
    async fn timeout_client_still_reports_unreachable_backend() {
        let backend = RestBackend::new("http://127.0.0.1:9", "k")
            .unwrap()
            .with_timeout(Duration::from_secs(2))
            .unwrap();
        assert!(matches!(backend.ping().await, Err(RepositoryError::Http(_))));
    }
}

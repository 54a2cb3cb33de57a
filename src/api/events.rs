use futures::{SinkExt, StreamExt};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use crate::api::models::WireMessage;
use crate::error::RepositoryError;
use crate::messaging::{Message, Subscription};

pub const MESSAGE_CREATED: &str = "message.created";

/// One text frame on the realtime socket.
#[derive(Debug, Serialize, Deserialize)]
pub struct IncomingEvent {
    pub event_type: String,
    pub data: serde_json::Value,
}

/// Realtime socket address for a backend, e.g. `https://x.example` -> `wss://x.example/realtime/v1/websocket?apikey=..`.
pub fn realtime_url(base: &Url, api_key: &str) -> Result<Url, RepositoryError> {
    let scheme = if base.scheme() == "http" { "ws" } else { "wss" };
    let host = base.host_str().ok_or(url::ParseError::EmptyHost)?;
    let authority = match base.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let mut url = Url::parse(&format!("{scheme}://{authority}/realtime/v1/websocket"))?;
    url.query_pairs_mut().append_pair("apikey", api_key);
    Ok(url)
}

pub fn topic(conversation_id: &str) -> String {
    format!("messages:{conversation_id}")
}

/// Turns a frame into an inbound message for `conversation_id`.
///
/// Returns `None` for other event types, other conversations and echoes of
/// `own_user_id`'s messages, which are already in the store.
pub fn decode_event(frame: &str, conversation_id: &str, own_user_id: &str) -> Option<Message> {
    let event: IncomingEvent = match serde_json::from_str(frame) {
        Ok(event) => event,
        Err(err) => {
            warn!("skipping malformed realtime frame: {err}");
            return None;
        }
    };
    if event.event_type != MESSAGE_CREATED {
        trace!("ignoring realtime event {}", event.event_type);
        return None;
    }
    let wire: WireMessage = match serde_json::from_value(event.data) {
        Ok(wire) => wire,
        Err(err) => {
            warn!("skipping {MESSAGE_CREATED} with bad payload: {err}");
            return None;
        }
    };
    if wire
        .conversation_id
        .as_deref()
        .is_some_and(|id| id != conversation_id)
    {
        return None;
    }
    if wire.sender_id == own_user_id {
        trace!("dropping echo of own message {}", wire.id);
        return None;
    }
    Some(wire.into_message(own_user_id))
}

/// Opens the realtime socket, joins the conversation's topic and forwards
/// inbound messages until the socket closes or the subscription is cancelled.
pub async fn subscribe(
    ws_url: Url,
    conversation_id: &str,
    own_user_id: &str,
    access_token: Option<String>,
) -> Result<Subscription, RepositoryError> {
    let (ws_stream, _) = connect_async(ws_url.as_str()).await?;
    debug!("realtime connected for {conversation_id}");
    let (mut write, mut read) = ws_stream.split();

    let join = serde_json::json!({
        "event": "subscribe",
        "topic": topic(conversation_id),
        "access_token": access_token,
    });
    write.send(WsMessage::Text(join.to_string())).await?;

    let (tx, rx) = mpsc::unbounded_channel();
    let conversation = conversation_id.to_string();
    let own = own_user_id.to_string();
    let task = tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => {
                    if let Some(message) = decode_event(&text, &conversation, &own) {
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                }
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!("realtime feed for {conversation} failed: {err}");
                    break;
                }
            }
        }
        debug!("realtime feed for {conversation} ended");
        let _ = write.close().await;
    });

    Ok(Subscription::new(conversation_id, rx, Some(task)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event_type: &str, conversation_id: &str, sender_id: &str) -> String {
        serde_json::json!({
            "event_type": event_type,
            "data": {
                "id": "m-1",
                "conversation_id": conversation_id,
                "sender_id": sender_id,
                "sender_name": "Alice",
                "body": "Demo sent!"
            }
        })
        .to_string()
    }

    #[test]
    fn realtime_url_follows_scheme_and_port() {
        let secure = Url::parse("https://abc.backend.example/").unwrap();
        let url = realtime_url(&secure, "key").unwrap();
        assert_eq!(url.as_str(), "wss://abc.backend.example/realtime/v1/websocket?apikey=key");

        let local = Url::parse("http://127.0.0.1:54321").unwrap();
        let url = realtime_url(&local, "key").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:54321/realtime/v1/websocket?apikey=key");
    }

    #[test]
    fn created_message_from_peer_is_decoded() {
        let msg = decode_event(&frame(MESSAGE_CREATED, "c1", "u-alice"), "c1", "me").unwrap();
        assert_eq!(msg.sender(), "Alice");
        assert_eq!(msg.text(), "Demo sent!");
        assert!(!msg.is_own());
    }

    #[test]
    fn unrelated_frames_are_skipped() {
        assert!(decode_event(&frame("presence.joined", "c1", "u-alice"), "c1", "me").is_none());
        assert!(decode_event(&frame(MESSAGE_CREATED, "c2", "u-alice"), "c1", "me").is_none());
        assert!(decode_event(&frame(MESSAGE_CREATED, "c1", "me"), "c1", "me").is_none());
        assert!(decode_event("not json", "c1", "me").is_none());
        assert!(decode_event(r#"{"event_type":"message.created","data":{}}"#, "c1", "me").is_none());
    }
}

use serde::{Deserialize, Serialize};

use crate::messaging::{ConversationSummary, Message, MessageId};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub id: String,
    pub conversation_id: Option<String>,
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub body: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl WireMessage {
    pub fn into_message(self, own_user_id: &str) -> Message {
        let is_own = self.sender_id == own_user_id;
        let sender = self.sender_name.unwrap_or(self.sender_id);
        Message::new(MessageId::new(self.id), sender, self.body, is_own)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WireConversation {
    pub id: String,
    pub peer_name: String,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

impl WireConversation {
    /// Orders messages by `created_at` ascending and converts them for the store.
    ///
    /// A row without a timestamp sorts as if it carried the timestamp of the row
    /// before it, so it stays right behind that row; leading untimed rows go first.
    pub fn into_summary(self, own_user_id: &str) -> ConversationSummary {
        let mut last_seen: Option<String> = None;
        let mut keyed: Vec<(Option<String>, WireMessage)> = self
            .messages
            .into_iter()
            .map(|m| {
                if m.created_at.is_some() {
                    last_seen = m.created_at.clone();
                }
                (last_seen.clone(), m)
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
        ConversationSummary {
            peer_id: self.id,
            peer_name: self.peer_name,
            messages: keyed
                .into_iter()
                .map(|(_, m)| m.into_message(own_user_id))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct NewMessageRow<'a> {
    pub conversation_id: &'a str,
    pub sender_id: &'a str,
    pub body: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_rows_decode_and_sort() {
        let raw = r#"{
            "id": "c1",
            "peer_name": "Alice",
            "messages": [
                {"id": "m2", "sender_id": "me", "sender_name": "Me", "body": "second", "created_at": "2024-05-01T10:01:00Z"},
                {"id": "m1", "sender_id": "u-alice", "sender_name": "Alice", "body": "first", "created_at": "2024-05-01T10:00:00Z"}
            ]
        }"#;
        let conv: WireConversation = serde_json::from_str(raw).unwrap();
        let summary = conv.into_summary("me");

        assert_eq!(summary.peer_id, "c1");
        let texts: Vec<&str> = summary.messages.iter().map(Message::text).collect();
        assert_eq!(texts, ["first", "second"]);
        assert!(!summary.messages[0].is_own());
        assert!(summary.messages[1].is_own());
    }

    fn row(id: &str, created_at: Option<&str>) -> WireMessage {
        WireMessage {
            id: id.into(),
            conversation_id: None,
            sender_id: "u-alice".into(),
            sender_name: None,
            body: id.into(),
            created_at: created_at.map(Into::into),
        }
    }

    #[test]
    fn untimed_rows_follow_their_predecessor() {
        let conv = WireConversation {
            id: "c1".into(),
            peer_name: "Alice".into(),
            messages: vec![
                row("t3", Some("2024-01-03T00:00:00Z")),
                row("none", None),
                row("t1", Some("2024-01-01T00:00:00Z")),
                row("t2", Some("2024-01-02T00:00:00Z")),
            ],
        };
        let summary = conv.into_summary("me");
        let order: Vec<&str> = summary.messages.iter().map(|m| m.id().as_str()).collect();
        assert_eq!(order, ["t1", "t2", "t3", "none"]);
    }

    #[test]
    fn leading_untimed_rows_stay_first_in_order() {
        let conv = WireConversation {
            id: "c1".into(),
            peer_name: "Alice".into(),
            messages: vec![
                row("a", None),
                row("b", None),
                row("t2", Some("2024-01-02T00:00:00Z")),
                row("t1", Some("2024-01-01T00:00:00Z")),
            ],
        };
        let order: Vec<String> = conv
            .into_summary("me")
            .messages
            .iter()
            .map(|m| m.id().to_string())
            .collect();
        assert_eq!(order, ["a", "b", "t1", "t2"]);
    }

    #[test]
    fn missing_sender_name_falls_back_to_id() {
        let raw = r#"{"id": "m1", "sender_id": "u-7", "body": "yo"}"#;
        let msg: WireMessage = serde_json::from_str(raw).unwrap();
        let msg = msg.into_message("me");
        assert_eq!(msg.sender(), "u-7");
        assert_eq!(msg.id().as_str(), "m1");
    }
}

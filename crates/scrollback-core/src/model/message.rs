use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Server-assigned message identifier.
///
/// Identifiers increase monotonically with send time, so ordering by id is
/// ordering by position in the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a message was sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Recipient {
    Stream {
        stream_id: StreamId,
        /// Display name at send time. Lookups go through `stream_id`.
        stream: String,
        topic: String,
    },
    Private {
        /// Every participant, the own user included.
        participants: BTreeSet<UserId>,
    },
}

impl Recipient {
    /// Topics match case-insensitively, the way the server resolves them.
    #[must_use]
    pub fn normalize_topic(topic: &str) -> String {
        topic.trim().to_lowercase()
    }
}

/// One message as delivered by the server and cached locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Unix seconds.
    pub timestamp: i64,
    pub sender_id: UserId,
    pub sender_full_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Server-rendered HTML.
    pub content: String,
    pub recipient: Recipient,
    #[serde(default)]
    pub last_edit_timestamp: Option<i64>,
}

impl Message {
    #[must_use]
    pub const fn is_edited(&self) -> bool {
        self.last_edit_timestamp.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_normalization_ignores_case_and_padding() {
        assert_eq!(Recipient::normalize_topic("  Release Plan "), "release plan");
        assert_eq!(
            Recipient::normalize_topic("release plan"),
            Recipient::normalize_topic("RELEASE PLAN")
        );
    }

    #[test]
    fn message_deserializes_with_optional_fields_missing() {
        let raw = r#"{
            "id": 7,
            "timestamp": 1700000000,
            "sender_id": 3,
            "sender_full_name": "Ada",
            "content": "<p>hi</p>",
            "recipient": {"type": "stream", "stream_id": 1, "stream": "general", "topic": "hello"}
        }"#;
        let msg: Message = serde_json::from_str(raw).expect("valid message json");
        assert_eq!(msg.id, MessageId(7));
        assert!(msg.avatar_url.is_none());
        assert!(!msg.is_edited());
    }

    #[test]
    fn private_recipient_round_trips_sorted() {
        let raw = r#"{"type": "private", "participants": [9, 2, 5]}"#;
        let recipient: Recipient = serde_json::from_str(raw).expect("valid recipient json");
        let Recipient::Private { participants } = &recipient else {
            panic!("expected private recipient");
        };
        let ids: Vec<u64> = participants.iter().map(|u| u.0).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }
}

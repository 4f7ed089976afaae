//! Grouped element tree: day → recipient → sender run → message item.
//!
//! Trees are produced by [`crate::group`] from an id-ordered message
//! sequence and consumed by the edit-script generator. Every level is an
//! ordered `Vec`; message ids increase strictly in document order across the
//! whole tree.
//!
//! Nodes are addressed by [`NodeKey`]. Day sections are keyed by their
//! calendar day. Recipient sections and sender runs can repeat within a day
//! (the conversation moves away and comes back), so their keys pair the
//! grouping key with the id of the group's first message, its *anchor*.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::model::{MessageId, Recipient, StreamId, UserId};

/// Calendar day a message was sent on, in the grouper's UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(pub NaiveDate);

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Normalized recipient descriptor used to decide group membership.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecipientKey {
    Stream {
        stream_id: StreamId,
        /// Lower-cased, trimmed topic.
        topic: String,
    },
    Private {
        participants: BTreeSet<UserId>,
    },
}

impl From<&Recipient> for RecipientKey {
    fn from(recipient: &Recipient) -> Self {
        match recipient {
            Recipient::Stream {
                stream_id, topic, ..
            } => Self::Stream {
                stream_id: *stream_id,
                topic: Recipient::normalize_topic(topic),
            },
            Recipient::Private { participants } => Self::Private {
                participants: participants.clone(),
            },
        }
    }
}

/// Address of one node among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "kebab-case")]
pub enum NodeKey {
    Day {
        day: DayKey,
    },
    Recipient {
        key: RecipientKey,
        anchor: MessageId,
    },
    SenderRun {
        sender: UserId,
        anchor: MessageId,
    },
    Message {
        id: MessageId,
    },
}

impl NodeKey {
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Message { .. })
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day { day } => write!(f, "day:{day}"),
            Self::Recipient { key, anchor } => match key {
                RecipientKey::Stream { stream_id, topic } => {
                    write!(f, "stream:{stream_id}/{topic}@{anchor}")
                }
                RecipientKey::Private { participants } => {
                    let ids: Vec<String> = participants.iter().map(ToString::to_string).collect();
                    write!(f, "pm:{}@{anchor}", ids.join(","))
                }
            },
            Self::SenderRun { sender, anchor } => write!(f, "sender:{sender}@{anchor}"),
            Self::Message { id } => write!(f, "msg:{id}"),
        }
    }
}

/// Keys of the ancestors of a node, outermost first. Empty for day sections.
pub type NodePath = Vec<NodeKey>;

/// Leaf: one message as it appears in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageItem {
    pub id: MessageId,
    pub timestamp: i64,
    pub content: String,
    pub edited: bool,
}

impl MessageItem {
    #[must_use]
    pub const fn node_key(&self) -> NodeKey {
        NodeKey::Message { id: self.id }
    }
}

/// Consecutive messages from one sender inside one recipient section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderRun {
    pub sender: UserId,
    pub full_name: String,
    pub avatar_url: Option<String>,
    /// Id of `items[0]`.
    pub anchor: MessageId,
    pub items: Vec<MessageItem>,
}

impl SenderRun {
    #[must_use]
    pub fn new(
        sender: UserId,
        full_name: String,
        avatar_url: Option<String>,
        first: MessageItem,
    ) -> Self {
        Self {
            sender,
            full_name,
            avatar_url,
            anchor: first.id,
            items: vec![first],
        }
    }

    #[must_use]
    pub const fn node_key(&self) -> NodeKey {
        NodeKey::SenderRun {
            sender: self.sender,
            anchor: self.anchor,
        }
    }

    /// Header fields that are drawn but play no part in the grouping key.
    #[must_use]
    pub fn same_header(&self, other: &Self) -> bool {
        self.full_name == other.full_name && self.avatar_url == other.avatar_url
    }

    pub fn message_ids(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.items.iter().map(|item| item.id)
    }
}

/// Messages sharing one conversation (stream + topic, or PM group).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientNode {
    pub key: RecipientKey,
    /// Display form of the recipient, taken from the first message.
    pub header: Recipient,
    /// Id of the first message of `senders[0]`.
    pub anchor: MessageId,
    pub senders: Vec<SenderRun>,
}

impl RecipientNode {
    #[must_use]
    pub fn new(header: Recipient, first: SenderRun) -> Self {
        Self {
            key: RecipientKey::from(&header),
            header,
            anchor: first.anchor,
            senders: vec![first],
        }
    }

    #[must_use]
    pub fn node_key(&self) -> NodeKey {
        NodeKey::Recipient {
            key: self.key.clone(),
            anchor: self.anchor,
        }
    }

    pub fn message_ids(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.senders.iter().flat_map(SenderRun::message_ids)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayNode {
    pub day: DayKey,
    pub recipients: Vec<RecipientNode>,
}

impl DayNode {
    #[must_use]
    pub const fn node_key(&self) -> NodeKey {
        NodeKey::Day { day: self.day }
    }

    pub fn message_ids(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.recipients.iter().flat_map(RecipientNode::message_ids)
    }
}

/// The whole grouped timeline. An empty tree means nothing is rendered yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ElementTree {
    pub days: Vec<DayNode>,
}

impl ElementTree {
    #[must_use]
    pub const fn empty() -> Self {
        Self { days: Vec::new() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn message_ids(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.days.iter().flat_map(DayNode::message_ids)
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.message_ids().count()
    }

    /// Total number of nodes at all four levels.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.days
            .iter()
            .map(|day| {
                1 + day
                    .recipients
                    .iter()
                    .map(|r| 1 + r.senders.iter().map(|s| 1 + s.items.len()).sum::<usize>())
                    .sum::<usize>()
            })
            .sum()
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::message::{Message, Recipient, StreamId, UserId};

/// A view filter selecting which messages appear in the timeline.
///
/// Narrows compare by value. Two independently built narrows describing the
/// same view are equal, which is what the generator relies on to decide
/// between an incremental diff and a full rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Narrow {
    /// Every message the user can see.
    #[default]
    All,
    Stream {
        stream_id: StreamId,
    },
    Topic {
        stream_id: StreamId,
        topic: String,
    },
    /// One private conversation, identified by its full participant set.
    Private {
        participants: BTreeSet<UserId>,
    },
    AllPrivate,
    Sender {
        user_id: UserId,
    },
}

impl Narrow {
    /// Returns true if `message` belongs in this view.
    #[must_use]
    pub fn contains(&self, message: &Message) -> bool {
        match (self, &message.recipient) {
            (Self::All, _) => true,
            (Self::Stream { stream_id }, Recipient::Stream { stream_id: s, .. }) => s == stream_id,
            (
                Self::Topic { stream_id, topic },
                Recipient::Stream {
                    stream_id: s,
                    topic: t,
                    ..
                },
            ) => {
                s == stream_id
                    && Recipient::normalize_topic(t) == Recipient::normalize_topic(topic)
            }
            (Self::Private { participants }, Recipient::Private { participants: p }) => {
                p == participants
            }
            (Self::AllPrivate, Recipient::Private { .. }) => true,
            (Self::Sender { user_id }, _) => message.sender_id == *user_id,
            _ => false,
        }
    }

    /// True for narrows that show exactly one conversation.
    ///
    /// Recipient headers render in compact form inside such a view since
    /// every header would repeat the same stream and topic.
    #[must_use]
    pub const fn is_conversation(&self) -> bool {
        matches!(self, Self::Topic { .. } | Self::Private { .. })
    }
}

impl fmt::Display for Narrow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Stream { stream_id } => write!(f, "stream:{stream_id}"),
            Self::Topic { stream_id, topic } => write!(f, "stream:{stream_id}/topic:{topic}"),
            Self::Private { participants } => {
                let ids: Vec<String> = participants.iter().map(ToString::to_string).collect();
                write!(f, "pm:{}", ids.join(","))
            }
            Self::AllPrivate => write!(f, "all-pm"),
            Self::Sender { user_id } => write!(f, "sender:{user_id}"),
        }
    }
}

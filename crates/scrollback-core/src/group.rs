//! Grouping producer: flat message sequence + narrow → [`ElementTree`].
//!
//! Messages are filtered through the narrow first, then split into sections
//! whenever the calendar day, the normalized recipient, or the sender
//! changes between two adjacent messages. Nothing else influences a
//! boundary.
//!
//! The input must already be ordered by id. The grouper neither sorts nor
//! de-duplicates.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use tracing::trace;

use crate::element::{
    DayKey, DayNode, ElementTree, MessageItem, RecipientKey, RecipientNode, SenderRun,
};
use crate::model::{Message, Narrow};

/// Groups messages into an element tree, with day boundaries computed in a
/// fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grouper {
    offset: FixedOffset,
}

impl Default for Grouper {
    fn default() -> Self {
        Self::utc()
    }
}

impl Grouper {
    #[must_use]
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Day boundaries at local midnight for the given offset.
    ///
    /// Offsets outside ±24h fall back to UTC.
    #[must_use]
    pub fn with_utc_offset(minutes: i32) -> Self {
        FixedOffset::east_opt(minutes.saturating_mul(60))
            .map_or_else(Self::utc, |offset| Self { offset })
    }

    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar day of a unix timestamp in this grouper's offset.
    #[must_use]
    pub fn day_of(&self, timestamp: i64) -> DayKey {
        DayKey(utc_instant(timestamp).with_timezone(&self.offset).date_naive())
    }

    /// Build the element tree for `messages` as seen through `narrow`.
    #[must_use]
    pub fn group(&self, messages: &[Message], narrow: &Narrow) -> ElementTree {
        let mut tree = ElementTree::empty();

        for message in messages.iter().filter(|m| narrow.contains(m)) {
            let day = self.day_of(message.timestamp);
            let key = RecipientKey::from(&message.recipient);
            let item = MessageItem {
                id: message.id,
                timestamp: message.timestamp,
                content: message.content.clone(),
                edited: message.is_edited(),
            };

            let Some(day_node) = tree.days.last_mut().filter(|d| d.day == day) else {
                trace!(day = %day, id = %message.id, "new day section");
                tree.days.push(DayNode {
                    day,
                    recipients: vec![new_recipient(message, item)],
                });
                continue;
            };

            let Some(recipient) = day_node.recipients.last_mut().filter(|r| r.key == key) else {
                day_node.recipients.push(new_recipient(message, item));
                continue;
            };

            match recipient.senders.last_mut() {
                Some(run) if run.sender == message.sender_id => run.items.push(item),
                _ => recipient.senders.push(new_run(message, item)),
            }
        }

        tree
    }
}

/// Instant of a unix timestamp. Timestamps past either end of the calendar
/// saturate there, so a later timestamp never lands on an earlier day.
#[must_use]
pub fn utc_instant(timestamp: i64) -> DateTime<Utc> {
    // A day of slack keeps every fixed offset inside the calendar.
    let earliest = DateTime::<Utc>::MIN_UTC.timestamp() + SECS_PER_DAY;
    let latest = DateTime::<Utc>::MAX_UTC.timestamp() - SECS_PER_DAY;
    DateTime::from_timestamp(timestamp.clamp(earliest, latest), 0).unwrap_or(if timestamp < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

const SECS_PER_DAY: i64 = 86_400;

/// [`Grouper::group`] with day boundaries in UTC.
#[must_use]
pub fn group(messages: &[Message], narrow: &Narrow) -> ElementTree {
    Grouper::utc().group(messages, narrow)
}

fn new_run(message: &Message, item: MessageItem) -> SenderRun {
    SenderRun::new(
        message.sender_id,
        message.sender_full_name.clone(),
        message.avatar_url.clone(),
        item,
    )
}

fn new_recipient(message: &Message, item: MessageItem) -> RecipientNode {
    RecipientNode::new(message.recipient.clone(), new_run(message, item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MessageId, Recipient, StreamId, UserId};

    const DAY: i64 = 86_400;
    // 2023-11-14T22:13:20Z
    const T0: i64 = 1_700_000_000;

    fn msg(id: u64, ts: i64, sender: u64, topic: &str) -> Message {
        Message {
            id: MessageId(id),
            timestamp: ts,
            sender_id: UserId(sender),
            sender_full_name: format!("user{sender}"),
            avatar_url: None,
            content: format!("<p>m{id}</p>"),
            recipient: Recipient::Stream {
                stream_id: StreamId(1),
                stream: "general".into(),
                topic: topic.into(),
            },
            last_edit_timestamp: None,
        }
    }

    #[test]
    fn out_of_range_timestamps_keep_day_order() {
        for minutes in [-1439, 0, 1439] {
            let grouper = Grouper::with_utc_offset(minutes);
            let stamps = [
                i64::MIN,
                -9_000_000_000_000_000,
                0,
                T0,
                9_000_000_000_000_000,
                i64::MAX,
            ];
            let days: Vec<DayKey> = stamps
                .into_iter()
                .map(|ts| grouper.day_of(ts))
                .collect();
            assert!(days.windows(2).all(|w| w[0] <= w[1]), "offset {minutes}: {days:?}");
            assert!(days[3] < days[4]);
            assert!(days[1] < days[2]);
        }
    }

    #[test]
    fn far_future_message_opens_a_later_day() {
        let tree = group(
            &[msg(1, T0, 7, "a"), msg(2, 9_000_000_000_000_000, 7, "a")],
            &Narrow::All,
        );
        assert_eq!(tree.days.len(), 2);
        assert!(tree.days[0].day < tree.days[1].day);
    }

    #[test]
    fn empty_input_gives_empty_tree() {
        assert!(group(&[], &Narrow::All).is_empty());
    }

    #[test]
    fn same_day_topic_sender_share_one_run() {
        let tree = group(
            &[msg(1, T0, 7, "a"), msg(2, T0 + 60, 7, "a")],
            &Narrow::All,
        );
        assert_eq!(tree.days.len(), 1);
        assert_eq!(tree.days[0].recipients.len(), 1);
        assert_eq!(tree.days[0].recipients[0].senders.len(), 1);
        let ids: Vec<u64> = tree.message_ids().map(|id| id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn sender_change_starts_new_run_even_for_returning_sender() {
        let tree = group(
            &[
                msg(1, T0, 7, "a"),
                msg(2, T0 + 1, 8, "a"),
                msg(3, T0 + 2, 7, "a"),
            ],
            &Narrow::All,
        );
        let runs = &tree.days[0].recipients[0].senders;
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[2].anchor, MessageId(3));
    }

    #[test]
    fn topic_and_day_changes_split_sections() {
        let tree = group(
            &[
                msg(1, T0, 7, "a"),
                msg(2, T0 + 1, 7, "b"),
                msg(3, T0 + 2, 7, "A"),
                msg(4, T0 + DAY, 7, "a"),
            ],
            &Narrow::All,
        );
        assert_eq!(tree.days.len(), 2);
        assert_eq!(tree.days[0].recipients.len(), 3);
        assert_eq!(tree.days[1].recipients.len(), 1);
    }

    #[test]
    fn narrow_filters_before_grouping() {
        // Dropping the "b" message joins the two "a" messages into one run.
        let narrow = Narrow::Topic {
            stream_id: StreamId(1),
            topic: "a".into(),
        };
        let tree = group(
            &[msg(1, T0, 7, "a"), msg(2, T0 + 1, 8, "b"), msg(3, T0 + 2, 7, "a")],
            &narrow,
        );
        assert_eq!(tree.days[0].recipients.len(), 1);
        assert_eq!(tree.days[0].recipients[0].senders.len(), 1);
        assert_eq!(tree.message_count(), 2);
    }

    #[test]
    fn utc_offset_moves_day_boundary() {
        // 22:13 UTC is already the next day at UTC+2.
        let utc = Grouper::utc().day_of(T0);
        let east = Grouper::with_utc_offset(120).day_of(T0);
        assert_eq!(utc.to_string(), "2023-11-14");
        assert_eq!(east.to_string(), "2023-11-15");
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        assert_eq!(Grouper::with_utc_offset(100_000), Grouper::utc());
    }

    #[test]
    fn grouping_is_deterministic() {
        let messages = vec![msg(1, T0, 7, "a"), msg(2, T0 + 1, 8, "a"), msg(5, T0 + DAY, 8, "z")];
        assert_eq!(group(&messages, &Narrow::All), group(&messages, &Narrow::All));
    }
}

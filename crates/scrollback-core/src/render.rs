//! Element nodes → rendered fragments.
//!
//! A [`RenderedNode`] is what a live tree holds: the node's own HTML (a
//! header for sections, the message body for leaves) plus its rendered
//! children. Rendering is a pure function of the element node and the
//! [`RenderContext`].

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::element::{DayNode, ElementTree, MessageItem, NodeKey, RecipientNode, SenderRun};
use crate::group::utc_instant;
use crate::model::{BackgroundData, Narrow, Recipient};

/// Everything outside the element tree that rendering reads.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub background: &'a BackgroundData,
    pub narrow: &'a Narrow,
}

impl<'a> RenderContext<'a> {
    #[must_use]
    pub const fn new(background: &'a BackgroundData, narrow: &'a Narrow) -> Self {
        Self { background, narrow }
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.background.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }
}

/// A fully rendered subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedNode {
    pub key: NodeKey,
    pub html: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderedNode>,
}

impl RenderedNode {
    /// Number of nodes in this subtree, itself included.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Self::size).sum::<usize>()
    }
}

/// Render the whole tree, one node per day section.
#[must_use]
pub fn render_tree(tree: &ElementTree, ctx: &RenderContext<'_>) -> Vec<RenderedNode> {
    tree.days.iter().map(|day| render_day(day, ctx)).collect()
}

#[must_use]
pub fn render_day(day: &DayNode, ctx: &RenderContext<'_>) -> RenderedNode {
    RenderedNode {
        key: day.node_key(),
        html: format!(
            r#"<div class="timerow" data-day="{}">{}</div>"#,
            day.day,
            day.day.0.format("%a, %b %-d %Y")
        ),
        children: day
            .recipients
            .iter()
            .map(|r| render_recipient(r, ctx))
            .collect(),
    }
}

#[must_use]
pub fn render_recipient(node: &RecipientNode, ctx: &RenderContext<'_>) -> RenderedNode {
    RenderedNode {
        key: node.node_key(),
        html: recipient_header(&node.header, ctx),
        children: node
            .senders
            .iter()
            .map(|run| render_sender_run(run, ctx))
            .collect(),
    }
}

#[must_use]
pub fn render_sender_run(run: &SenderRun, ctx: &RenderContext<'_>) -> RenderedNode {
    let avatar = run.avatar_url.as_deref().map_or_else(String::new, |url| {
        format!(r#"<img class="avatar" src="{}">"#, escape(url))
    });
    let html = format!(
        r#"<div class="sender">{avatar}<span class="name">{}</span></div>"#,
        escape(&run.full_name)
    );

    RenderedNode {
        key: run.node_key(),
        html,
        children: run
            .items
            .iter()
            .map(|item| render_message_node(item, ctx))
            .collect(),
    }
}

#[must_use]
pub fn render_message_node(item: &MessageItem, ctx: &RenderContext<'_>) -> RenderedNode {
    RenderedNode {
        key: item.node_key(),
        html: render_message(item, ctx),
        children: Vec::new(),
    }
}

/// Leaf HTML for one message. `content` is server-rendered and not escaped.
#[must_use]
pub fn render_message(item: &MessageItem, ctx: &RenderContext<'_>) -> String {
    let time = utc_instant(item.timestamp).with_timezone(&ctx.offset());
    let time = if ctx.background.twenty_four_hour_time {
        time.format("%H:%M").to_string()
    } else {
        time.format("%-I:%M %p").to_string()
    };

    let mut html = format!(
        r#"<div class="message" data-msg-id="{}"><span class="time">{time}</span><div class="content">{}</div>"#,
        item.id, item.content
    );
    if item.edited {
        html.push_str(r#"<span class="edited">(edited)</span>"#);
    }
    html.push_str("</div>");
    html
}

fn recipient_header(header: &Recipient, ctx: &RenderContext<'_>) -> String {
    let compact = ctx.narrow.is_conversation();
    match header {
        Recipient::Stream {
            stream_id,
            stream,
            topic,
        } => {
            let info = ctx.background.streams.get(stream_id);
            let name = info.map_or(stream.as_str(), |i| i.name.as_str());
            let color = info.map_or("#c2c2c2", |i| i.color.as_str());
            if compact {
                format!(r#"<div class="header topic-header">{}</div>"#, escape(topic))
            } else {
                format!(
                    r#"<div class="header stream-header" style="background: {}"><span class="stream-name">#{}</span><span class="topic">{}</span></div>"#,
                    escape(color),
                    escape(name),
                    escape(topic)
                )
            }
        }
        Recipient::Private { participants } => {
            let own = ctx.background.own_user_id;
            let others: Vec<String> = participants
                .iter()
                .filter(|id| **id != own)
                .map(|id| escape(&ctx.background.user_name(*id)))
                .collect();
            let title = if others.is_empty() {
                "You".to_string()
            } else {
                format!("You and {}", others.join(", "))
            };
            let class = if compact {
                "header private-header compact"
            } else {
                "header private-header"
            };
            format!(r#"<div class="{class}">{title}</div>"#)
        }
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MessageId, StreamId, StreamInfo, UserId};

    fn item(id: u64, ts: i64, edited: bool) -> MessageItem {
        MessageItem {
            id: MessageId(id),
            timestamp: ts,
            content: "<p>hi</p>".into(),
            edited,
        }
    }

    #[test]
    fn message_time_respects_clock_preference_and_offset() {
        // 2023-11-14T22:13:20Z
        let mut bg = BackgroundData::default();
        let narrow = Narrow::All;
        let html = render_message(&item(1, 1_700_000_000, false), &RenderContext::new(&bg, &narrow));
        assert!(html.contains(">10:13 PM<"), "{html}");

        bg.twenty_four_hour_time = true;
        bg.utc_offset_minutes = 60;
        let html = render_message(&item(1, 1_700_000_000, false), &RenderContext::new(&bg, &narrow));
        assert!(html.contains(">23:13<"), "{html}");
        assert!(html.contains("<p>hi</p>"));
    }

    #[test]
    fn edited_marker_only_on_edited_messages() {
        let bg = BackgroundData::default();
        let narrow = Narrow::All;
        let ctx = RenderContext::new(&bg, &narrow);
        assert!(render_message(&item(1, 0, true), &ctx).contains("(edited)"));
        assert!(!render_message(&item(1, 0, false), &ctx).contains("(edited)"));
    }

    #[test]
    fn stream_header_uses_background_name_and_escapes() {
        let mut bg = BackgroundData::default();
        bg.streams.insert(StreamId(3), StreamInfo {
            name: "design".into(),
            color: "#123456".into(),
        });
        let header = Recipient::Stream {
            stream_id: StreamId(3),
            stream: "old-name".into(),
            topic: "a < b".into(),
        };
        let html = recipient_header(&header, &RenderContext::new(&bg, &Narrow::All));
        assert!(html.contains("#design"));
        assert!(html.contains("#123456"));
        assert!(html.contains("a &lt; b"));

        let narrow = Narrow::Topic {
            stream_id: StreamId(3),
            topic: "a < b".into(),
        };
        let html = recipient_header(&header, &RenderContext::new(&bg, &narrow));
        assert!(html.contains("topic-header"));
        assert!(!html.contains("#design"));
    }

    #[test]
    fn private_header_lists_other_participants() {
        let mut bg = BackgroundData {
            own_user_id: UserId(1),
            ..BackgroundData::default()
        };
        bg.users.insert(UserId(2), "Grace".into());
        let header = Recipient::Private {
            participants: [UserId(1), UserId(2), UserId(3)].into_iter().collect(),
        };
        let html = recipient_header(&header, &RenderContext::new(&bg, &Narrow::All));
        assert!(html.contains("You and Grace, user 3"), "{html}");

        let solo = Recipient::Private {
            participants: [UserId(1)].into_iter().collect(),
        };
        let html = recipient_header(&solo, &RenderContext::new(&bg, &Narrow::All));
        assert!(html.contains(">You<"));
    }

    #[test]
    fn rendered_sender_run_nests_leaves() {
        let bg = BackgroundData::default();
        let narrow = Narrow::All;
        let mut run = SenderRun::new(
            UserId(4),
            "Ada & co".into(),
            Some("https://x/a.png".into()),
            item(5, 0, false),
        );
        run.items.push(item(6, 0, false));
        let node = render_sender_run(&run, &RenderContext::new(&bg, &narrow));
        assert_eq!(node.size(), 3);
        assert!(node.html.contains("Ada &amp; co"));
        assert!(node.html.contains("avatar"));
        assert_eq!(node.children[1].key, NodeKey::Message { id: MessageId(6) });
    }
}

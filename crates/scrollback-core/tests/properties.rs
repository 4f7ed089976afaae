//! End-to-end properties of group → generate → apply on hand-built
//! histories.

use scrollback_core::element::DayKey;
use scrollback_core::model::{BackgroundData, Message, MessageId, Narrow, UserId};
use scrollback_core::{EditOp, LiveTree, NodeKey, OpCounts, RenderState, apply, generate, group};

use generators::*;

fn state(messages: &[Message], narrow: &Narrow, bg: &BackgroundData) -> RenderState {
    RenderState::new(bg.clone(), narrow.clone(), group(messages, narrow))
}

/// Apply the diff between two histories to a live copy of the first and
/// check it against a full render of the second.
fn patch(old: &[Message], new: &[Message]) -> Vec<EditOp> {
    let bg = background();
    let (a, b) = (state(old, &Narrow::All, &bg), state(new, &Narrow::All, &bg));
    let ops = generate(&a, &b);
    let mut live = LiveTree::from_rendered(&a.render());
    apply(&ops, &mut live).expect("ops fit the tree they were generated for");
    assert_eq!(live.snapshot(), b.render());
    assert_eq!(live.fingerprint(), LiveTree::from_rendered(&b.render()).fingerprint());
    ops
}

fn topic_thread() -> Vec<Message> {
    vec![
        message(10, T0, 1, stream(1, "alpha")),
        message(11, T0 + 30, 1, stream(1, "alpha")),
        message(12, T0 + 60, 2, stream(1, "alpha")),
        message(14, T0 + 90, 2, stream(1, "beta")),
        message(15, T0 + 120, 3, private(&[1, 3])),
    ]
}

#[test]
fn equivalence_on_unrelated_histories() {
    let a = topic_thread();
    let b = vec![
        message(3, T0 - 90_000, 4, stream(2, "gamma")),
        message(11, T0 + 30, 2, stream(1, "alpha")),
        message(20, T0 + 200_000, 1, private(&[1, 2])),
    ];
    patch(&a, &b);
    patch(&b, &a);
}

#[test]
fn equivalence_when_clearing_and_refilling() {
    let a = topic_thread();
    let ops = patch(&a, &[]);
    assert!(ops.iter().all(|op| matches!(op, EditOp::Delete { parent, .. } if parent.is_empty())));
    patch(&[], &a);
}

#[test]
fn identity_produces_no_ops() {
    let bg = background();
    for narrow in [Narrow::All, Narrow::AllPrivate, Narrow::Sender { user_id: UserId(2) }] {
        let s = state(&topic_thread(), &narrow, &bg);
        assert!(generate(&s, &s.clone()).is_empty(), "narrow {narrow}");
    }
}

#[test]
fn from_empty_reproduces_full_render() {
    let bg = background();
    let full = state(&topic_thread(), &Narrow::All, &bg);
    let empty = RenderState::empty(bg, Narrow::All);

    let ops = generate(&empty, &full);
    assert_eq!(ops.len(), full.elements.days.len());
    assert!(ops.iter().all(|op| matches!(op, EditOp::Insert { before: None, .. })));

    let mut live = LiveTree::new();
    apply(&ops, &mut live).expect("inserts into an empty tree");
    assert_eq!(live.snapshot(), full.render());
    assert_eq!(live.len(), full.elements.node_count());
}

#[test]
fn monotonic_append_touches_only_the_trailing_run() {
    let old = topic_thread()[..3].to_vec();
    let mut new = old.clone();
    new.push(message(13, T0 + 70, 2, stream(1, "alpha")));

    let ops = patch(&old, &new);
    assert_eq!(ops.len(), 1);
    let EditOp::Insert { parent, before, node } = &ops[0] else {
        panic!("expected an insert, got {}", ops[0]);
    };
    assert_eq!(node.key, NodeKey::Message { id: MessageId(13) });
    assert!(before.is_none());
    assert_eq!(
        parent.last(),
        Some(&NodeKey::SenderRun {
            sender: UserId(2),
            anchor: MessageId(12)
        })
    );
}

#[test]
fn content_only_change_is_one_replace() {
    let old = topic_thread();
    let mut new = old.clone();
    new[1].content = "<p>fixed a typo</p>".into();
    new[1].last_edit_timestamp = Some(T0 + 500);

    let ops = patch(&old, &new);
    let counts = OpCounts::of(&ops);
    assert_eq!(counts, OpCounts {
        replaced: 1,
        ..OpCounts::default()
    });
    let EditOp::Replace { key, html, .. } = &ops[0] else {
        panic!("expected a replace, got {}", ops[0]);
    };
    assert_eq!(*key, NodeKey::Message { id: MessageId(11) });
    assert!(html.contains("fixed a typo"));
    assert!(html.contains("(edited)"));
}

#[test]
fn splitting_a_sender_run_replaces_the_run() {
    let old = vec![
        message(10, T0, 1, stream(1, "alpha")),
        message(12, T0 + 60, 1, stream(1, "alpha")),
    ];
    let mut new = old.clone();
    new.insert(1, message(11, T0 + 30, 2, stream(1, "alpha")));

    let ops = patch(&old, &new);
    let counts = OpCounts::of(&ops);
    assert_eq!(counts.replaced, 0);
    assert!(counts.deleted >= 1);
    assert!(counts.inserted >= 1);

    // No op reaches into the old run: it is removed whole.
    let old_run = NodeKey::SenderRun {
        sender: UserId(1),
        anchor: MessageId(10),
    };
    assert!(ops.iter().all(|op| !op.parent().contains(&old_run)));
    assert!(
        ops.iter()
            .any(|op| matches!(op, EditOp::Delete { key, .. } if *key == old_run))
    );
    assert!(ops.iter().all(|op| op.depth() == 2));
}

#[test]
fn removing_the_second_of_two_messages_deletes_one_leaf() {
    let day = DayKey(chrono::NaiveDate::from_ymd_opt(2023, 11, 14).expect("valid date"));
    let old = vec![
        message(1, T0, 7, stream(1, "alpha")),
        message(2, T0 + 5, 7, stream(1, "alpha")),
    ];

    let tree = group(&old, &Narrow::All);
    assert_eq!(tree.days.len(), 1);
    assert_eq!(tree.days[0].day, day);
    assert_eq!(tree.days[0].recipients.len(), 1);
    let senders = &tree.days[0].recipients[0].senders;
    assert_eq!(senders.len(), 1);
    let ids: Vec<MessageId> = senders[0].items.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![MessageId(1), MessageId(2)]);

    let ops = patch(&old, &old[..1]);
    assert_eq!(ops.len(), 1);
    let EditOp::Delete { parent, key } = &ops[0] else {
        panic!("expected a delete, got {}", ops[0]);
    };
    assert_eq!(*key, NodeKey::Message { id: MessageId(2) });
    assert_eq!(parent.len(), 3);
    assert_eq!(parent[0], NodeKey::Day { day });
    assert_eq!(
        parent[2],
        NodeKey::SenderRun {
            sender: UserId(7),
            anchor: MessageId(1)
        }
    );
}

#[test]
fn far_future_timestamps_patch_like_any_later_day() {
    let far = 9_000_000_000_000_000;
    let old = vec![
        message(1, T0, 7, stream(1, "alpha")),
        message(2, far, 7, stream(1, "alpha")),
    ];
    let tree = group(&old, &Narrow::All);
    assert_eq!(tree.days.len(), 2);
    assert!(tree.days[0].day < tree.days[1].day);

    let ops = patch(&old, &old[1..]);
    assert_eq!(ops.len(), 1);
    assert!(matches!(&ops[0], EditOp::Delete { parent, .. } if parent.is_empty()));

    let mut grown = old.clone();
    grown.push(message(3, i64::MAX, 8, stream(1, "alpha")));
    patch(&old, &grown);
    patch(&grown, &old[..1]);
}

#[test]
fn narrow_change_rebuilds_every_day() {
    let bg = background();
    let messages = topic_thread();
    let a = state(&messages, &Narrow::All, &bg);
    let b = state(&messages, &Narrow::AllPrivate, &bg);

    let ops = generate(&a, &b);
    let counts = OpCounts::of(&ops);
    assert_eq!(counts.deleted, a.elements.days.len());
    assert_eq!(counts.inserted, b.elements.days.len());

    let mut live = LiveTree::from_rendered(&a.render());
    apply(&ops, &mut live).expect("rebuild applies");
    assert_eq!(live.snapshot(), b.render());
}

#[test]
fn feature_level_alone_does_not_rebuild() {
    let bg = background();
    let mut newer = bg.clone();
    newer.feature_level += 1;
    let a = state(&topic_thread(), &Narrow::All, &bg);
    let b = state(&topic_thread(), &Narrow::All, &newer);
    assert!(generate(&a, &b).is_empty());

    newer.twenty_four_hour_time = false;
    let c = state(&topic_thread(), &Narrow::All, &newer);
    assert!(!generate(&a, &c).is_empty());
}

#[test]
fn generated_ops_serialize_as_tagged_json() {
    let old = topic_thread();
    let ops = patch(&old, &old[..4]);
    let json = serde_json::to_string(&ops).expect("ops serialize");
    assert!(json.contains(r#""op":"delete""#));
    let back: Vec<EditOp> = serde_json::from_str(&json).expect("ops deserialize");
    assert_eq!(back, ops);
}

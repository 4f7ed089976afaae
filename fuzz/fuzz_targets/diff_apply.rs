#![no_main]

use libfuzzer_sys::fuzz_target;
use scrollback_core::model::{BackgroundData, Message, Narrow};
use scrollback_core::{LiveTree, RenderState, apply, generate, group};

fn state(mut messages: Vec<Message>, narrow: &Narrow) -> RenderState {
    messages.sort_by_key(|m| m.id);
    messages.dedup_by_key(|m| m.id);
    // Ids grow with send time, so timestamps never go backwards.
    let mut clock = i64::MIN;
    for m in &mut messages {
        clock = clock.max(m.timestamp);
        m.timestamp = clock;
    }
    let elements = group(&messages, narrow);
    RenderState::new(BackgroundData::default(), narrow.clone(), elements)
}

// Input: `[[old messages], [new messages], narrow]` as JSON.
fuzz_target!(|data: &[u8]| {
    let Ok((old, new, narrow)) =
        serde_json::from_slice::<(Vec<Message>, Vec<Message>, Narrow)>(data)
    else {
        return;
    };

    let old = state(old, &narrow);
    let new = state(new, &narrow);
    let ops = generate(&old, &new);

    let mut live = LiveTree::from_rendered(&old.render());
    if let Err(err) = apply(&ops, &mut live) {
        panic!("generated ops failed to apply: {err}");
    }
    assert_eq!(live.snapshot(), new.render());
});

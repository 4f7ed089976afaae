//! Update loop: group → generate → apply, with a full-rebuild fallback.

use tracing::{info, warn};

use crate::diff::{RenderState, generate};
use crate::edit::OpCounts;
use crate::group::Grouper;
use crate::live::{ApplyStats, IntegrityError, LiveTree};
use crate::model::{BackgroundData, Message, Narrow};

/// How one update reached the live tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The edit sequence applied cleanly.
    Patched { ops: OpCounts, stats: ApplyStats },
    /// The edit sequence did not fit the live tree, which was rebuilt from a
    /// full render of the new state instead.
    Rebuilt { error: IntegrityError },
}

impl UpdateOutcome {
    #[must_use]
    pub const fn is_rebuild(&self) -> bool {
        matches!(self, Self::Rebuilt { .. })
    }
}

/// Owns the live tree and the state it was last rendered from.
///
/// All updates must go through one reconciler; `&mut self` on
/// [`Reconciler::update`] keeps them serialized.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    grouper: Grouper,
    state: RenderState,
    live: LiveTree,
}

impl Reconciler {
    #[must_use]
    pub fn new(grouper: Grouper) -> Self {
        Self {
            grouper,
            state: RenderState::default(),
            live: LiveTree::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &RenderState {
        &self.state
    }

    #[must_use]
    pub const fn live(&self) -> &LiveTree {
        &self.live
    }

    /// Direct access for the rendering layer. Edits made here that the
    /// reconciler does not know about surface as an integrity failure on the
    /// next update.
    pub const fn live_mut(&mut self) -> &mut LiveTree {
        &mut self.live
    }

    /// Group `messages` under `narrow` and bring the live tree up to date.
    pub fn update(
        &mut self,
        messages: &[Message],
        narrow: Narrow,
        background: BackgroundData,
    ) -> UpdateOutcome {
        let elements = self.grouper.group(messages, &narrow);
        self.update_state(RenderState::new(background, narrow, elements))
    }

    /// Bring the live tree up to date with an already grouped state.
    pub fn update_state(&mut self, new: RenderState) -> UpdateOutcome {
        let ops = generate(&self.state, &new);
        let counts = OpCounts::of(&ops);

        let outcome = match self.live.apply(&ops) {
            Ok(stats) => UpdateOutcome::Patched { ops: counts, stats },
            Err(error) => {
                warn!(
                    code = %error.code(),
                    %error,
                    "edit sequence rejected; rebuilding live tree"
                );
                self.live.reset(&new.render());
                info!(nodes = self.live.len(), "live tree rebuilt");
                UpdateOutcome::Rebuilt { error }
            }
        };

        self.state = new;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::EditOp;
    use crate::model::{MessageId, Recipient, StreamId, UserId};

    fn msg(id: u64, sender: u64) -> Message {
        Message {
            id: MessageId(id),
            timestamp: 1_700_000_000 + i64::try_from(id).unwrap_or(0),
            sender_id: UserId(sender),
            sender_full_name: format!("u{sender}"),
            avatar_url: None,
            content: format!("<p>{id}</p>"),
            recipient: Recipient::Stream {
                stream_id: StreamId(1),
                stream: "general".into(),
                topic: "t".into(),
            },
            last_edit_timestamp: None,
        }
    }

    #[test]
    fn first_update_renders_from_empty() {
        let mut rec = Reconciler::default();
        let outcome = rec.update(&[msg(1, 1), msg(2, 2)], Narrow::All, BackgroundData::default());
        assert!(!outcome.is_rebuild());
        assert_eq!(rec.live().snapshot(), rec.state().render());
    }

    #[test]
    fn successive_updates_track_full_render() {
        let mut rec = Reconciler::default();
        let bg = BackgroundData::default();
        rec.update(&[msg(1, 1)], Narrow::All, bg.clone());
        let outcome = rec.update(&[msg(1, 1), msg(2, 1)], Narrow::All, bg.clone());
        let UpdateOutcome::Patched { ops, .. } = outcome else {
            panic!("expected a patch");
        };
        assert_eq!(ops.inserted, 1);
        assert_eq!(ops.total(), 1);
        assert_eq!(rec.live().snapshot(), rec.state().render());
    }

    #[test]
    fn out_of_band_edit_triggers_rebuild() {
        let mut rec = Reconciler::default();
        let bg = BackgroundData::default();
        rec.update(&[msg(1, 1), msg(2, 1)], Narrow::All, bg.clone());

        // Someone else removes the first day section behind our back.
        let day = rec.live().snapshot()[0].key.clone();
        rec.live_mut()
            .apply(&[EditOp::Delete {
                parent: vec![],
                key: day,
            }])
            .expect("delete applies");

        let outcome = rec.update(&[msg(1, 1), msg(2, 1), msg(3, 1)], Narrow::All, bg);
        assert!(outcome.is_rebuild());
        assert!(!rec.live().is_poisoned());
        assert_eq!(rec.live().snapshot(), rec.state().render());
    }
}

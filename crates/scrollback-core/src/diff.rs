//! Edit-script generation between two rendered states.
//!
//! # Algorithm
//!
//! If the narrow changed, or the background data changed in a way that shows
//! up in rendered output, every old day section is deleted and every new one
//! appended. Otherwise the trees are compared level by level with a
//! merge-style walk over the two ordered sibling lists:
//!
//! - day sections are ordered and matched by calendar day;
//! - recipient sections and sender runs are ordered by anchor (id of their
//!   first message);
//! - message items are ordered and matched by id.
//!
//! When the old cursor sorts first its node is gone and is deleted. When the
//! new cursor sorts first its node is inserted before the old cursor, or
//! appended once the old list is exhausted. Equal positions recurse, unless
//! the two nodes are equal (nothing emitted) or are not the same group.
//!
//! Two recipient sections or sender runs with the same anchor are the same
//! group only if they share grouping key and header, and hold the same set of
//! *surviving* messages (ids present in both trees). A message moving across
//! a group boundary therefore turns into delete + insert of the affected
//! groups rather than a patch that straddles the boundary.
//!
//! # Performance
//!
//! O(N) in the combined size of both trees. No op is emitted for untouched
//! subtrees.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, instrument, trace};

use crate::edit::{EditOp, OpCounts};
use crate::element::{
    DayNode, ElementTree, MessageItem, NodeKey, NodePath, RecipientNode, SenderRun,
};
use crate::model::{BackgroundData, MessageId, Narrow};
use crate::render::{
    RenderContext, RenderedNode, render_day, render_message, render_message_node,
    render_recipient, render_sender_run, render_tree,
};

/// One side of a comparison: the element tree plus the context it is (or
/// will be) rendered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RenderState {
    pub background: BackgroundData,
    pub narrow: Narrow,
    pub elements: ElementTree,
}

impl RenderState {
    #[must_use]
    pub const fn new(background: BackgroundData, narrow: Narrow, elements: ElementTree) -> Self {
        Self {
            background,
            narrow,
            elements,
        }
    }

    /// Nothing rendered yet, under the given context.
    #[must_use]
    pub const fn empty(background: BackgroundData, narrow: Narrow) -> Self {
        Self::new(background, narrow, ElementTree::empty())
    }

    #[must_use]
    pub const fn context(&self) -> RenderContext<'_> {
        RenderContext::new(&self.background, &self.narrow)
    }

    /// Full render of this state.
    #[must_use]
    pub fn render(&self) -> Vec<RenderedNode> {
        render_tree(&self.elements, &self.context())
    }

    /// True when `other` cannot be reached from `self` by patching nodes,
    /// because every node would render differently.
    #[must_use]
    pub fn context_differs(&self, other: &Self) -> bool {
        self.narrow != other.narrow || self.background.affects_rendering(&other.background)
    }
}

/// Compute the edit sequence turning a tree rendered from `old` into one
/// rendered from `new`.
///
/// Applying the result, in order, to a live tree that matches `old.render()`
/// yields a tree equal to `new.render()`.
#[must_use]
#[instrument(
    level = "debug",
    skip_all,
    fields(old_days = old.elements.days.len(), new_days = new.elements.days.len())
)]
pub fn generate(old: &RenderState, new: &RenderState) -> Vec<EditOp> {
    let ops = if old.context_differs(new) {
        debug!(
            narrow_changed = old.narrow != new.narrow,
            "render context changed; rebuilding from scratch"
        );
        full_rebuild(&old.elements, new)
    } else {
        let mut differ = Differ::new(&old.elements, &new.elements, new.context());
        differ.diff_days(&old.elements.days, &new.elements.days);
        differ.ops
    };

    let counts = OpCounts::of(&ops);
    debug!(
        inserted = counts.inserted,
        deleted = counts.deleted,
        replaced = counts.replaced,
        "edit sequence generated"
    );
    ops
}

fn full_rebuild(old: &ElementTree, new: &RenderState) -> Vec<EditOp> {
    let ctx = new.context();
    let deletes = old.days.iter().map(|day| EditOp::Delete {
        parent: Vec::new(),
        key: day.node_key(),
    });
    let inserts = new.elements.days.iter().map(|day| EditOp::Insert {
        parent: Vec::new(),
        before: None,
        node: render_day(day, &ctx),
    });
    deletes.chain(inserts).collect()
}

/// Outcome of aligning one position of two sibling lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// `old[i]` has no counterpart.
    Delete(usize),
    /// `new[j]` has no counterpart; insert before `old[before]` or append.
    Insert { new: usize, before: Option<usize> },
    /// `old[i]` and `new[j]` are the same node.
    Pair(usize, usize),
}

/// Align two sibling lists sorted by `position`.
///
/// Nodes at equal positions pair up only if `same_group` accepts them;
/// otherwise the old one is deleted and the new one is inserted in its
/// place on the next step.
fn merge_walk<T, P: Ord>(
    old: &[T],
    new: &[T],
    position: impl Fn(&T) -> P,
    same_group: impl Fn(&T, &T) -> bool,
) -> Vec<Step> {
    let mut steps = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0, 0);

    loop {
        match (old.get(i), new.get(j)) {
            (Some(o), Some(n)) => match position(o).cmp(&position(n)) {
                Ordering::Less => {
                    steps.push(Step::Delete(i));
                    i += 1;
                }
                Ordering::Greater => {
                    steps.push(Step::Insert {
                        new: j,
                        before: Some(i),
                    });
                    j += 1;
                }
                Ordering::Equal if same_group(o, n) => {
                    steps.push(Step::Pair(i, j));
                    i += 1;
                    j += 1;
                }
                Ordering::Equal => {
                    steps.push(Step::Delete(i));
                    i += 1;
                }
            },
            (Some(_), None) => {
                steps.push(Step::Delete(i));
                i += 1;
            }
            (None, Some(_)) => {
                steps.push(Step::Insert {
                    new: j,
                    before: None,
                });
                j += 1;
            }
            (None, None) => break,
        }
    }

    steps
}

struct Differ<'a> {
    ctx: RenderContext<'a>,
    old_ids: HashSet<MessageId>,
    new_ids: HashSet<MessageId>,
    ops: Vec<EditOp>,
}

impl<'a> Differ<'a> {
    fn new(old: &ElementTree, new: &ElementTree, ctx: RenderContext<'a>) -> Self {
        Self {
            ctx,
            old_ids: old.message_ids().collect(),
            new_ids: new.message_ids().collect(),
            ops: Vec::new(),
        }
    }

    /// Both groups hold exactly the same messages among those that exist on
    /// both sides.
    fn same_survivors(
        &self,
        old: impl Iterator<Item = MessageId>,
        new: impl Iterator<Item = MessageId>,
    ) -> bool {
        old.filter(|id| self.new_ids.contains(id))
            .eq(new.filter(|id| self.old_ids.contains(id)))
    }

    fn emit(&mut self, op: EditOp) {
        trace!(%op, "emit");
        self.ops.push(op);
    }

    /// Emit the delete/insert ops for one step; returns the pair to recurse
    /// into, if any.
    fn apply_step<T>(
        &mut self,
        step: Step,
        parent: &NodePath,
        old: &[T],
        new: &[T],
        key: impl Fn(&T) -> NodeKey,
        render: impl Fn(&T, &RenderContext<'_>) -> RenderedNode,
    ) -> Option<(usize, usize)> {
        match step {
            Step::Delete(i) => {
                self.emit(EditOp::Delete {
                    parent: parent.clone(),
                    key: key(&old[i]),
                });
                None
            }
            Step::Insert { new: j, before } => {
                let node = render(&new[j], &self.ctx);
                self.emit(EditOp::Insert {
                    parent: parent.clone(),
                    before: before.map(|i| key(&old[i])),
                    node,
                });
                None
            }
            Step::Pair(i, j) => Some((i, j)),
        }
    }

    fn diff_days(&mut self, old: &[DayNode], new: &[DayNode]) {
        let root = NodePath::new();
        for step in merge_walk(old, new, |d| d.day, |_, _| true) {
            let Some((i, j)) =
                self.apply_step(step, &root, old, new, DayNode::node_key, render_day)
            else {
                continue;
            };
            if old[i] != new[j] {
                let path = vec![old[i].node_key()];
                self.diff_recipients(&path, &old[i].recipients, &new[j].recipients);
            }
        }
    }

    fn diff_recipients(&mut self, parent: &NodePath, old: &[RecipientNode], new: &[RecipientNode]) {
        let steps = merge_walk(
            old,
            new,
            |r| r.anchor,
            |o, n| {
                o.key == n.key
                    && o.header == n.header
                    && self.same_survivors(o.message_ids(), n.message_ids())
            },
        );
        for step in steps {
            let Some((i, j)) = self.apply_step(
                step,
                parent,
                old,
                new,
                RecipientNode::node_key,
                render_recipient,
            ) else {
                continue;
            };
            if old[i] != new[j] {
                let mut path = parent.clone();
                path.push(old[i].node_key());
                self.diff_senders(&path, &old[i].senders, &new[j].senders);
            }
        }
    }

    fn diff_senders(&mut self, parent: &NodePath, old: &[SenderRun], new: &[SenderRun]) {
        let steps = merge_walk(
            old,
            new,
            |s| s.anchor,
            |o, n| {
                o.sender == n.sender
                    && o.same_header(n)
                    && self.same_survivors(o.message_ids(), n.message_ids())
            },
        );
        for step in steps {
            let Some((i, j)) = self.apply_step(
                step,
                parent,
                old,
                new,
                SenderRun::node_key,
                render_sender_run,
            ) else {
                continue;
            };
            if old[i] != new[j] {
                let mut path = parent.clone();
                path.push(old[i].node_key());
                self.diff_items(&path, &old[i].items, &new[j].items);
            }
        }
    }

    fn diff_items(&mut self, parent: &NodePath, old: &[MessageItem], new: &[MessageItem]) {
        for step in merge_walk(old, new, |m| m.id, |_, _| true) {
            let Some((i, j)) = self.apply_step(
                step,
                parent,
                old,
                new,
                MessageItem::node_key,
                render_message_node,
            ) else {
                continue;
            };
            if old[i] != new[j] {
                let html = render_message(&new[j], &self.ctx);
                self.emit(EditOp::Replace {
                    parent: parent.clone(),
                    key: new[j].node_key(),
                    html,
                });
            }
        }
    }
}

//! Edit operations exchanged between the generator and the applier.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::element::{NodeKey, NodePath};
use crate::render::RenderedNode;

/// One structural edit against a rendered tree.
///
/// Every op names its parent by the full path of ancestor keys, so it can be
/// resolved without knowing what earlier ops did elsewhere in the tree. Ops
/// under the same parent must be applied in the order they were generated:
/// an `Insert` anchors on a sibling that is only guaranteed to exist at that
/// point in the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum EditOp {
    /// Insert `node` under `parent`, before the sibling `before`, or at the
    /// end when `before` is `None`.
    Insert {
        parent: NodePath,
        before: Option<NodeKey>,
        node: RenderedNode,
    },
    /// Remove the child `key` of `parent` together with its subtree.
    Delete { parent: NodePath, key: NodeKey },
    /// Swap the HTML of the leaf `key` under `parent`.
    Replace {
        parent: NodePath,
        key: NodeKey,
        html: String,
    },
    Skip,
}

impl EditOp {
    #[must_use]
    pub fn parent(&self) -> &[NodeKey] {
        match self {
            Self::Insert { parent, .. }
            | Self::Delete { parent, .. }
            | Self::Replace { parent, .. } => parent,
            Self::Skip => &[],
        }
    }

    /// Nesting depth of the target: 0 for day sections, 3 for messages.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.parent().len()
    }
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.parent().iter().map(ToString::to_string).collect();
        let path = if path.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", path.join("/"))
        };
        match self {
            Self::Insert { before, node, .. } => match before {
                Some(anchor) => write!(f, "insert {} under {path} before {anchor}", node.key),
                None => write!(f, "insert {} under {path} at end", node.key),
            },
            Self::Delete { key, .. } => write!(f, "delete {key} under {path}"),
            Self::Replace { key, .. } => write!(f, "replace {key} under {path}"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Per-kind totals for an edit sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpCounts {
    pub inserted: usize,
    pub deleted: usize,
    pub replaced: usize,
    pub skipped: usize,
}

impl OpCounts {
    #[must_use]
    pub fn of(ops: &[EditOp]) -> Self {
        let mut counts = Self::default();
        for op in ops {
            match op {
                EditOp::Insert { .. } => counts.inserted += 1,
                EditOp::Delete { .. } => counts.deleted += 1,
                EditOp::Replace { .. } => counts.replaced += 1,
                EditOp::Skip => counts.skipped += 1,
            }
        }
        counts
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.inserted + self.deleted + self.replaced + self.skipped
    }
}

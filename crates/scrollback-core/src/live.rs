//! Live rendered tree and the edit-sequence applier.
//!
//! The live tree is an arena: nodes sit in a `Vec`, linked to their parent,
//! their first and last child, and their previous and next sibling. Each
//! node also indexes its children by [`NodeKey`]. Resolving an op's parent
//! path costs one hash lookup per level; the insert, delete or replace
//! itself is a constant number of link updates.
//!
//! # Integrity
//!
//! An op that names a node the tree does not have means the ops were
//! generated against a different tree. The applier stops at the first such
//! op, returns an [`IntegrityError`], and poisons the tree: every later
//! `apply` fails with [`IntegrityError::Poisoned`] until [`LiveTree::reset`]
//! installs a fresh full render.

use std::collections::HashMap;
use tracing::{debug, error, instrument};

use crate::edit::EditOp;
use crate::element::{NodeKey, NodePath};
use crate::error::ErrorCode;
use crate::render::RenderedNode;

type SlotId = usize;

/// The edit sequence does not fit the tree it is applied to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("node {key} not found under {}", display_path(.parent))]
    MissingNode { parent: NodePath, key: NodeKey },

    #[error("insert anchor {before} not found under {}", display_path(.parent))]
    MissingAnchor { parent: NodePath, before: NodeKey },

    #[error("node {key} already exists under {}", display_path(.parent))]
    DuplicateKey { parent: NodePath, key: NodeKey },

    #[error("node {key} under {} has children; only leaves can be replaced", display_path(.parent))]
    NotALeaf { parent: NodePath, key: NodeKey },

    #[error("live tree is poisoned by an earlier integrity failure; reset it first")]
    Poisoned,
}

impl IntegrityError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Poisoned => ErrorCode::LiveTreePoisoned,
            _ => ErrorCode::IntegrityViolation,
        }
    }
}

fn display_path(path: &[NodeKey]) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let parts: Vec<String> = path.iter().map(ToString::to_string).collect();
    format!("/{}", parts.join("/"))
}

/// What one `apply` call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub ops: usize,
    pub nodes_inserted: usize,
    pub nodes_removed: usize,
    pub leaves_replaced: usize,
}

#[derive(Debug, Clone)]
struct Slot {
    key: NodeKey,
    html: String,
    parent: Option<SlotId>,
    prev: Option<SlotId>,
    next: Option<SlotId>,
    first_child: Option<SlotId>,
    last_child: Option<SlotId>,
    children: HashMap<NodeKey, SlotId>,
}

/// The caller-owned rendered tree that edit sequences patch in place.
#[derive(Debug, Clone, Default)]
pub struct LiveTree {
    slots: Vec<Slot>,
    free: Vec<SlotId>,
    roots: HashMap<NodeKey, SlotId>,
    first_root: Option<SlotId>,
    last_root: Option<SlotId>,
    len: usize,
    poisoned: bool,
}

impl LiveTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree holding exactly `nodes`.
    #[must_use]
    pub fn from_rendered(nodes: &[RenderedNode]) -> Self {
        let mut tree = Self::new();
        tree.reset(nodes);
        tree
    }

    /// Drop everything, clear the poisoned flag, and install `nodes`.
    pub fn reset(&mut self, nodes: &[RenderedNode]) {
        *self = Self::new();
        for node in nodes {
            self.attach(None, None, node);
        }
    }

    /// Number of live nodes at all levels.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Apply `ops` in order.
    ///
    /// # Errors
    ///
    /// Returns an [`IntegrityError`] at the first op that does not fit the
    /// tree, after which the tree is poisoned. Ops before the failing one
    /// have already been applied.
    #[instrument(level = "debug", skip_all, fields(ops = ops.len(), nodes = self.len))]
    pub fn apply(&mut self, ops: &[EditOp]) -> Result<ApplyStats, IntegrityError> {
        if self.poisoned {
            return Err(IntegrityError::Poisoned);
        }

        let mut stats = ApplyStats::default();
        for op in ops {
            if let Err(err) = self.apply_one(op, &mut stats) {
                error!(code = %err.code(), %err, "edit sequence does not fit live tree");
                self.poisoned = true;
                return Err(err);
            }
            stats.ops += 1;
        }

        debug!(
            inserted = stats.nodes_inserted,
            removed = stats.nodes_removed,
            replaced = stats.leaves_replaced,
            "edit sequence applied"
        );
        Ok(stats)
    }

    fn apply_one(&mut self, op: &EditOp, stats: &mut ApplyStats) -> Result<(), IntegrityError> {
        match op {
            EditOp::Insert {
                parent,
                before,
                node,
            } => {
                let parent_id = self.resolve(parent)?;
                if self.child(parent_id, &node.key).is_some() {
                    return Err(IntegrityError::DuplicateKey {
                        parent: parent.clone(),
                        key: node.key.clone(),
                    });
                }
                let before_id = match before {
                    Some(anchor) => Some(self.child(parent_id, anchor).ok_or_else(|| {
                        IntegrityError::MissingAnchor {
                            parent: parent.clone(),
                            before: anchor.clone(),
                        }
                    })?),
                    None => None,
                };
                stats.nodes_inserted += self.attach(parent_id, before_id, node);
            }
            EditOp::Delete { parent, key } => {
                let id = self.locate(parent, key)?;
                stats.nodes_removed += self.detach(id);
            }
            EditOp::Replace { parent, key, html } => {
                let id = self.locate(parent, key)?;
                if self.slots[id].first_child.is_some() {
                    return Err(IntegrityError::NotALeaf {
                        parent: parent.clone(),
                        key: key.clone(),
                    });
                }
                self.slots[id].html.clone_from(html);
                stats.leaves_replaced += 1;
            }
            EditOp::Skip => {}
        }
        Ok(())
    }

    /// Slot of the node at `path`; `None` is the root container.
    fn resolve(&self, path: &[NodeKey]) -> Result<Option<SlotId>, IntegrityError> {
        let mut current = None;
        for (depth, key) in path.iter().enumerate() {
            let id = self
                .child(current, key)
                .ok_or_else(|| IntegrityError::MissingNode {
                    parent: path[..depth].to_vec(),
                    key: key.clone(),
                })?;
            current = Some(id);
        }
        Ok(current)
    }

    fn locate(&self, parent: &[NodeKey], key: &NodeKey) -> Result<SlotId, IntegrityError> {
        let parent_id = self.resolve(parent)?;
        self.child(parent_id, key)
            .ok_or_else(|| IntegrityError::MissingNode {
                parent: parent.to_vec(),
                key: key.clone(),
            })
    }

    fn child(&self, parent: Option<SlotId>, key: &NodeKey) -> Option<SlotId> {
        match parent {
            Some(p) => self.slots[p].children.get(key).copied(),
            None => self.roots.get(key).copied(),
        }
    }

    /// HTML of the node at `path` (ancestors followed by the node's key).
    #[must_use]
    pub fn html_at(&self, path: &[NodeKey]) -> Option<&str> {
        let id = self.resolve(path).ok()??;
        Some(self.slots[id].html.as_str())
    }

    fn alloc(&mut self, slot: Slot) -> SlotId {
        self.len += 1;
        if let Some(id) = self.free.pop() {
            self.slots[id] = slot;
            id
        } else {
            self.slots.push(slot);
            self.slots.len() - 1
        }
    }

    /// Link a copy of `node` (and its subtree) under `parent`, before
    /// `before` or at the end. Returns the number of nodes created.
    fn attach(&mut self, parent: Option<SlotId>, before: Option<SlotId>, node: &RenderedNode) -> usize {
        let id = self.alloc(Slot {
            key: node.key.clone(),
            html: node.html.clone(),
            parent,
            prev: None,
            next: None,
            first_child: None,
            last_child: None,
            children: HashMap::new(),
        });

        let prev = match before {
            Some(b) => self.slots[b].prev,
            None => self.last_of(parent),
        };
        self.slots[id].prev = prev;
        self.slots[id].next = before;
        match prev {
            Some(p) => self.slots[p].next = Some(id),
            None => self.set_first(parent, Some(id)),
        }
        match before {
            Some(b) => self.slots[b].prev = Some(id),
            None => self.set_last(parent, Some(id)),
        }
        match parent {
            Some(p) => {
                self.slots[p].children.insert(node.key.clone(), id);
            }
            None => {
                self.roots.insert(node.key.clone(), id);
            }
        }

        let mut created = 1;
        for child in &node.children {
            created += self.attach(Some(id), None, child);
        }
        created
    }

    /// Unlink `id` from its siblings and free its subtree. Returns the number
    /// of nodes removed.
    fn detach(&mut self, id: SlotId) -> usize {
        let (parent, prev, next) = {
            let slot = &self.slots[id];
            (slot.parent, slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.set_first(parent, next),
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.set_last(parent, prev),
        }
        let key = self.slots[id].key.clone();
        match parent {
            Some(p) => {
                self.slots[p].children.remove(&key);
            }
            None => {
                self.roots.remove(&key);
            }
        }
        self.release(id)
    }

    fn release(&mut self, id: SlotId) -> usize {
        let mut removed = 1;
        let mut cursor = self.slots[id].first_child;
        while let Some(child) = cursor {
            cursor = self.slots[child].next;
            removed += self.release(child);
        }
        let slot = &mut self.slots[id];
        slot.children = HashMap::new();
        slot.html = String::new();
        slot.first_child = None;
        slot.last_child = None;
        self.free.push(id);
        self.len -= 1;
        removed
    }

    fn last_of(&self, parent: Option<SlotId>) -> Option<SlotId> {
        match parent {
            Some(p) => self.slots[p].last_child,
            None => self.last_root,
        }
    }

    fn set_first(&mut self, parent: Option<SlotId>, value: Option<SlotId>) {
        match parent {
            Some(p) => self.slots[p].first_child = value,
            None => self.first_root = value,
        }
    }

    fn set_last(&mut self, parent: Option<SlotId>, value: Option<SlotId>) {
        match parent {
            Some(p) => self.slots[p].last_child = value,
            None => self.last_root = value,
        }
    }

    /// Copy of the current tree, in document order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RenderedNode> {
        self.collect_siblings(self.first_root)
    }

    fn collect_siblings(&self, first: Option<SlotId>) -> Vec<RenderedNode> {
        let mut out = Vec::new();
        let mut cursor = first;
        while let Some(id) = cursor {
            let slot = &self.slots[id];
            out.push(RenderedNode {
                key: slot.key.clone(),
                html: slot.html.clone(),
                children: self.collect_siblings(slot.first_child),
            });
            cursor = slot.next;
        }
        out
    }

    /// BLAKE3 digest of the tree's structure and content, hex encoded.
    ///
    /// Two trees have the same fingerprint iff their snapshots are equal
    /// (up to hash collisions).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        self.hash_siblings(self.first_root, &mut hasher);
        hasher.finalize().to_hex().to_string()
    }

    fn hash_siblings(&self, first: Option<SlotId>, hasher: &mut blake3::Hasher) {
        let mut cursor = first;
        while let Some(id) = cursor {
            let slot = &self.slots[id];
            hasher.update(b"(");
            hasher.update(slot.key.to_string().as_bytes());
            hasher.update(&(slot.html.len() as u64).to_le_bytes());
            hasher.update(slot.html.as_bytes());
            self.hash_siblings(slot.first_child, hasher);
            hasher.update(b")");
            cursor = slot.next;
        }
    }
}

/// Apply `ops` to `tree`. See [`LiveTree::apply`].
///
/// # Errors
///
/// Returns an [`IntegrityError`] if an op does not fit the tree.
pub fn apply(ops: &[EditOp], tree: &mut LiveTree) -> Result<ApplyStats, IntegrityError> {
    tree.apply(ops)
}

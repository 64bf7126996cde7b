//! Arena-backed item tree.
//!
//! Items are addressed by [`NodeId`]. A node stores its parent as an id and
//! its children as an ordered id list; the arena owns every node. Ids of
//! released nodes are never reused, so a stale id simply resolves to `None`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::storage::{FeedFormat, MessageCounts, NO_PARENT_CATEGORY};

/// Stable handle of a node inside an [`ItemTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Discriminant of an item, used for lookups that ignore the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Root,
    Category,
    Feed,
    RecycleBin,
}

/// Auto-update policy of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoUpdate {
    /// Never updated by the scheduler.
    DontAutoUpdate,
    /// Updated whenever the global interval elapses.
    DefaultAutoUpdate,
    /// Own countdown in scheduler ticks.
    SpecificAutoUpdate {
        initial_interval: i64,
        remaining_interval: i64,
    },
}

impl AutoUpdate {
    /// A specific-interval policy with a fresh countdown.
    pub fn every(interval: i64) -> Self {
        let interval = interval.max(1);
        AutoUpdate::SpecificAutoUpdate {
            initial_interval: interval,
            remaining_interval: interval,
        }
    }
}

/// Transient feed status, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedStatus {
    #[default]
    Normal,
    NewMessages,
    NetworkError,
}

#[derive(Debug, Clone)]
pub struct FeedData {
    pub url: String,
    pub encoding: String,
    pub format: FeedFormat,
    pub auto_update: AutoUpdate,
    pub status: FeedStatus,
}

/// Kind-specific part of an item.
#[derive(Debug, Clone)]
pub enum ItemPayload {
    Root,
    Category,
    Feed(FeedData),
    RecycleBin,
}

/// A tree node: shared fields plus a kind-specific payload.
#[derive(Debug, Clone)]
pub struct Item {
    /// Persistent id, unique per kind. The root carries
    /// [`NO_PARENT_CATEGORY`] so top-level rows resolve to it.
    pub id: i64,
    pub title: String,
    pub description: String,
    pub icon: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub created: i64,
    /// Own message counts. Only meaningful for feeds and the recycle bin;
    /// containers aggregate their subtree on demand.
    pub counts: MessageCounts,
    pub payload: ItemPayload,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Item {
    pub fn new(id: i64, title: impl Into<String>, payload: ItemPayload) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            icon: None,
            created: 0,
            counts: MessageCounts::default(),
            payload,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self.payload {
            ItemPayload::Root => ItemKind::Root,
            ItemPayload::Category => ItemKind::Category,
            ItemPayload::Feed(_) => ItemKind::Feed,
            ItemPayload::RecycleBin => ItemKind::RecycleBin,
        }
    }

    pub fn feed(&self) -> Option<&FeedData> {
        match &self.payload {
            ItemPayload::Feed(data) => Some(data),
            _ => None,
        }
    }

    pub fn feed_mut(&mut self) -> Option<&mut FeedData> {
        match &mut self.payload {
            ItemPayload::Feed(data) => Some(data),
            _ => None,
        }
    }

    /// Whether this kind of item may own children.
    pub fn is_container(&self) -> bool {
        matches!(self.payload, ItemPayload::Root | ItemPayload::Category)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Owner of all items. Exactly one root exists for the tree's lifetime.
#[derive(Debug)]
pub struct ItemTree {
    slots: Vec<Option<Item>>,
    root: NodeId,
}

impl ItemTree {
    pub fn new(root_title: &str) -> Self {
        let root = Item::new(NO_PARENT_CATEGORY, root_title, ItemPayload::Root);
        Self {
            slots: vec![Some(root)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, node: NodeId) -> Option<&Item> {
        self.slots.get(node.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut Item> {
        self.slots.get_mut(node.0).and_then(Option::as_mut)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.get(node).is_some()
    }

    /// Add an item to the arena without linking it anywhere.
    pub fn insert_detached(&mut self, mut item: Item) -> NodeId {
        item.parent = None;
        item.children.clear();
        self.slots.push(Some(item));
        NodeId(self.slots.len() - 1)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).map_or(&[], |item| item.children.as_slice())
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        self.children(node).len()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node).and_then(|item| item.parent)
    }

    /// Position of `node` within its parent's children.
    pub fn row(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|&c| c == node)
    }

    /// Link a detached node as child `row` of `parent`.
    ///
    /// Returns the row actually used (clamped to the child count).
    pub fn insert_child(&mut self, parent: NodeId, row: usize, child: NodeId) -> Option<usize> {
        if parent == child || !self.contains(child) || self.parent(child).is_some() {
            return None;
        }
        let siblings = &mut self.get_mut(parent)?.children;
        let row = row.min(siblings.len());
        siblings.insert(row, child);
        self.get_mut(child)?.parent = Some(parent);
        Some(row)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Option<usize> {
        let row = self.child_count(parent);
        self.insert_child(parent, row, child)
    }

    /// Unlink `node` from its parent, returning the row it occupied.
    /// The node stays in the arena, detached.
    pub fn detach(&mut self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        let row = self.row(node)?;
        self.get_mut(parent)?.children.remove(row);
        self.get_mut(node)?.parent = None;
        Some(row)
    }

    /// Drop `node` and its whole subtree from the arena.
    ///
    /// The node must already be detached; the root cannot be released.
    pub fn release(&mut self, node: NodeId) {
        if node == self.root || self.parent(node).is_some() {
            return;
        }
        for id in self.subtree(node) {
            if let Some(slot) = self.slots.get_mut(id.0) {
                *slot = None;
            }
        }
    }

    /// `node` followed by all of its descendants, breadth first.
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(node) {
            return out;
        }
        let mut queue = VecDeque::from([node]);
        while let Some(current) = queue.pop_front() {
            out.push(current);
            queue.extend(self.children(current).iter().copied());
        }
        out
    }

    /// Whether `ancestor` lies on the parent chain of `node` (or is `node`).
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// First direct child of `parent` with the given kind and title.
    pub fn child_by_title(&self, parent: NodeId, kind: ItemKind, title: &str) -> Option<NodeId> {
        self.children(parent).iter().copied().find(|&c| {
            self.get(c)
                .is_some_and(|item| item.kind() == kind && item.title == title)
        })
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that every parent/child link is mirrored, every live non-root
    /// node is reachable from the root exactly once, and no node is its own
    /// ancestor.
    pub fn is_consistent(&self) -> bool {
        for (index, slot) in self.slots.iter().enumerate() {
            let Some(item) = slot else { continue };
            let id = NodeId(index);

            for &child in &item.children {
                if self.parent(child) != Some(id) {
                    return false;
                }
            }

            match item.parent {
                Some(parent) => {
                    let owned_once = self
                        .children(parent)
                        .iter()
                        .filter(|&&c| c == id)
                        .count()
                        == 1;
                    if !owned_once {
                        return false;
                    }
                }
                None if id != self.root => {
                    // Detached nodes must not linger in the arena
                    return false;
                }
                None => {}
            }
        }

        self.subtree(self.root).len() == self.len()
    }
}

/// A category that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl CategoryDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            icon: None,
        }
    }
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

fn default_auto_update() -> AutoUpdate {
    AutoUpdate::DefaultAutoUpdate
}

/// A feed that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub url: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    pub format: FeedFormat,
    #[serde(default = "default_auto_update")]
    pub auto_update: AutoUpdate,
}

impl FeedDraft {
    pub fn new(title: impl Into<String>, url: impl Into<String>, format: FeedFormat) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            icon: None,
            url: url.into(),
            encoding: default_encoding(),
            format,
            auto_update: default_auto_update(),
        }
    }
}

//! Per-item service hooks around message mutations.
//!
//! Every mutation of the message table asks the loaded item's service before
//! touching anything (a `false` from a `before` hook vetoes the change) and
//! reports back after the storage write. Services also decide which messages
//! an item shows.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::item::{ItemKind, NodeId};
use super::message_row::{Importance, ReadStatus};
use crate::storage::{Message, MessageFilter};

/// Snapshot of the tree item whose messages the table shows.
#[derive(Clone)]
pub struct LoadedItem {
    pub node: NodeId,
    pub kind: ItemKind,
    pub title: String,
    /// Persistent ids of every feed under the item.
    pub feed_ids: Vec<i64>,
    pub service: Arc<dyn ServiceRoot>,
}

impl LoadedItem {
    pub fn is_recycle_bin(&self) -> bool {
        self.kind == ItemKind::RecycleBin
    }
}

impl fmt::Debug for LoadedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedItem")
            .field("node", &self.node)
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("feed_ids", &self.feed_ids)
            .finish_non_exhaustive()
    }
}

pub trait ServiceRoot: Send + Sync {
    /// Filter selecting the messages of `item`, or `None` when the item's
    /// messages cannot be loaded.
    fn message_filter_for_item(&self, item: &LoadedItem) -> Option<MessageFilter>;

    fn on_before_set_messages_read(
        &self,
        _item: &LoadedItem,
        _messages: &[Message],
        _read: ReadStatus,
    ) -> bool {
        true
    }

    fn on_after_set_messages_read(
        &self,
        _item: &LoadedItem,
        _messages: &[Message],
        _read: ReadStatus,
    ) -> bool {
        true
    }

    /// `changes` pairs each message with the importance it is switching to.
    fn on_before_switch_message_importance(
        &self,
        _item: &LoadedItem,
        _changes: &[(Message, Importance)],
    ) -> bool {
        true
    }

    fn on_after_switch_message_importance(
        &self,
        _item: &LoadedItem,
        _changes: &[(Message, Importance)],
    ) -> bool {
        true
    }

    fn on_before_messages_delete(&self, _item: &LoadedItem, _messages: &[Message]) -> bool {
        true
    }

    fn on_after_messages_delete(&self, _item: &LoadedItem, _messages: &[Message]) -> bool {
        true
    }

    fn on_before_messages_restored_from_bin(
        &self,
        _item: &LoadedItem,
        _messages: &[Message],
    ) -> bool {
        true
    }

    fn on_after_messages_restored_from_bin(
        &self,
        _item: &LoadedItem,
        _messages: &[Message],
    ) -> bool {
        true
    }
}

#[derive(Debug, Default)]
struct PendingCounts {
    feeds: BTreeSet<i64>,
    bin: bool,
}

/// Service of locally stored feeds.
///
/// Never vetoes. After each mutation it records which feed counts went stale
/// so the feeds model can refresh them.
#[derive(Debug, Default)]
pub struct StandardServiceRoot {
    pending: Mutex<PendingCounts>,
}

impl StandardServiceRoot {
    fn mark_dirty(&self, messages: &[Message], bin: bool) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.feeds.extend(messages.iter().map(|m| m.feed_id));
        pending.bin |= bin;
    }

    /// Feeds whose counts changed since the last call.
    pub fn take_dirty_feeds(&self) -> Vec<i64> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut pending.feeds).into_iter().collect()
    }

    /// Whether recycle bin counts changed since the last call.
    pub fn take_bin_dirty(&self) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut pending.bin)
    }
}

impl ServiceRoot for StandardServiceRoot {
    fn message_filter_for_item(&self, item: &LoadedItem) -> Option<MessageFilter> {
        Some(match item.kind {
            ItemKind::RecycleBin => MessageFilter::RecycleBin,
            ItemKind::Root | ItemKind::Category | ItemKind::Feed => {
                MessageFilter::Feeds(item.feed_ids.clone())
            }
        })
    }

    fn on_after_set_messages_read(
        &self,
        item: &LoadedItem,
        messages: &[Message],
        _read: ReadStatus,
    ) -> bool {
        self.mark_dirty(messages, item.is_recycle_bin());
        true
    }

    fn on_after_messages_delete(&self, _item: &LoadedItem, messages: &[Message]) -> bool {
        self.mark_dirty(messages, true);
        true
    }

    fn on_after_messages_restored_from_bin(
        &self,
        _item: &LoadedItem,
        messages: &[Message],
    ) -> bool {
        self.mark_dirty(messages, true);
        true
    }
}

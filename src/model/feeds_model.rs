//! The feed tree controller.
//!
//! [`FeedsModel`] owns the category/feed tree, keeps it in step with the
//! `Categories` and `Feeds` tables, and reports every structural change as a
//! [`TreeEvent`]. Structural writes always hit storage first; the in-memory
//! tree only changes once storage accepted the change.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedMutexGuard};

use super::auto_update::{feed_is_due, FeedUpdateLock, GlobalAutoUpdate};
use super::error::TreeError;
use super::events::{EventSink, TreeEvent};
use super::item::{
    AutoUpdate, CategoryDraft, FeedData, FeedDraft, FeedStatus, Item, ItemKind, ItemPayload,
    ItemTree, NodeId,
};
use super::message_row::ReadStatus;
use super::service::{LoadedItem, ServiceRoot, StandardServiceRoot};
use crate::config::Config;
use crate::storage::{
    CategoryRow, Database, FeedFormat, FeedRow, Message, MessageCounts, NewFeed, NO_ID,
    NO_PARENT_CATEGORY, UPDATE_TYPE_DEFAULT, UPDATE_TYPE_NEVER, UPDATE_TYPE_SPECIFIC,
};
use crate::util::{strip_control_chars, validate_feed_url};

const ROOT_TITLE: &str = "Root";
const RECYCLE_BIN_TITLE: &str = "Recycle bin";
const RECYCLE_BIN_DESCRIPTION: &str = "Recycle bin contains all deleted messages from all feeds.";

/// Interval stored for feeds that do not use a specific one.
pub const DEFAULT_AUTO_UPDATE_INTERVAL: i64 = 15;

pub struct FeedsModel {
    db: Database,
    tree: ItemTree,
    recycle_bin: NodeId,
    service: Arc<StandardServiceRoot>,
    global_auto_update: GlobalAutoUpdate,
    tick_period: Duration,
    timer_active: bool,
    update_lock: FeedUpdateLock,
    events: EventSink<TreeEvent>,
}

impl FeedsModel {
    /// Create a model holding only the root and the recycle bin.
    pub fn new(db: Database, config: &Config) -> Self {
        let mut tree = ItemTree::new(ROOT_TITLE);
        let recycle_bin = attach_recycle_bin(&mut tree);

        let mut model = Self {
            db,
            tree,
            recycle_bin,
            service: Arc::new(StandardServiceRoot::default()),
            global_auto_update: GlobalAutoUpdate::from_config(config),
            tick_period: Duration::from_secs(60),
            timer_active: false,
            update_lock: FeedUpdateLock::default(),
            events: EventSink::default(),
        };
        model.update_auto_update_status(config);
        model
    }

    /// Create a model and load the tree from storage.
    pub async fn open(db: Database, config: &Config) -> Result<Self, TreeError> {
        let mut model = Self::new(db, config);
        model.load_from_database().await?;
        Ok(model)
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TreeEvent> {
        self.events.subscribe()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn tree(&self) -> &ItemTree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn recycle_bin(&self) -> NodeId {
        self.recycle_bin
    }

    pub fn item(&self, node: NodeId) -> Option<&Item> {
        self.tree.get(node)
    }

    /// Handle to the lock shared with whatever drives feed updates.
    pub fn update_lock(&self) -> &FeedUpdateLock {
        &self.update_lock
    }

    pub fn service(&self) -> Arc<StandardServiceRoot> {
        Arc::clone(&self.service)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Rebuild the whole tree from storage.
    ///
    /// Every read happens before the current tree is touched, so a failed
    /// load leaves the previous tree in place. The error is still fatal to
    /// callers: storage and memory can no longer be assumed to agree.
    pub async fn load_from_database(&mut self) -> Result<(), TreeError> {
        let categories = self
            .db
            .get_all_categories()
            .await
            .map_err(TreeError::Load)?;
        let feeds = self.db.get_all_feeds().await.map_err(TreeError::Load)?;
        let feed_ids: Vec<i64> = feeds.iter().map(|f| f.id).collect();
        let counts = self
            .db
            .get_message_counts(&feed_ids)
            .await
            .map_err(TreeError::Load)?;
        let bin_counts = self
            .db
            .recycle_bin_counts()
            .await
            .map_err(TreeError::Load)?;

        let category_count = categories.len();
        let feed_count = feeds.len();

        self.events.emit(TreeEvent::LayoutAboutToBeChanged);

        let mut tree = ItemTree::new(ROOT_TITLE);
        // Older databases store top-level rows with a parent of 0
        let mut containers =
            HashMap::from([(NO_PARENT_CATEGORY, tree.root()), (0, tree.root())]);
        assemble_categories(&mut tree, &mut containers, categories);
        assemble_feeds(&mut tree, &containers, feeds, &counts);

        let recycle_bin = attach_recycle_bin(&mut tree);
        if let Some(bin) = tree.get_mut(recycle_bin) {
            bin.counts = bin_counts;
        }

        self.tree = tree;
        self.recycle_bin = recycle_bin;

        self.events.emit(TreeEvent::LayoutChanged);
        tracing::info!(
            categories = category_count,
            feeds = feed_count,
            "Loaded feed tree"
        );
        Ok(())
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    fn nodes_of_kind(&self, root: NodeId, kind: ItemKind) -> Vec<NodeId> {
        self.tree
            .subtree(root)
            .into_iter()
            .filter(|&n| self.tree.get(n).is_some_and(|item| item.kind() == kind))
            .collect()
    }

    pub fn all_feeds(&self) -> Vec<NodeId> {
        self.nodes_of_kind(self.root(), ItemKind::Feed)
    }

    pub fn all_categories(&self) -> Vec<NodeId> {
        self.nodes_of_kind(self.root(), ItemKind::Category)
    }

    /// Feeds in the subtree of `node`, `node` included.
    pub fn feeds_for_item(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes_of_kind(node, ItemKind::Feed)
    }

    /// Feeds under any of `nodes`, each listed once, ordered by id.
    pub fn feeds_for_items(&self, nodes: &[NodeId]) -> Vec<NodeId> {
        let mut feeds: Vec<(i64, NodeId)> = nodes
            .iter()
            .flat_map(|&n| self.feeds_for_item(n))
            .filter_map(|n| self.tree.get(n).map(|item| (item.id, n)))
            .collect();
        feeds.sort_unstable();
        feeds.dedup_by_key(|(id, _)| *id);
        feeds.into_iter().map(|(_, n)| n).collect()
    }

    pub fn feed_for_item(&self, node: NodeId) -> Option<NodeId> {
        self.tree
            .get(node)
            .filter(|item| item.kind() == ItemKind::Feed)
            .map(|_| node)
    }

    pub fn category_for_item(&self, node: NodeId) -> Option<NodeId> {
        self.tree
            .get(node)
            .filter(|item| item.kind() == ItemKind::Category)
            .map(|_| node)
    }

    pub fn node_for_feed_id(&self, feed_id: i64) -> Option<NodeId> {
        self.all_feeds()
            .into_iter()
            .find(|&n| self.tree.get(n).is_some_and(|item| item.id == feed_id))
    }

    /// Persistent ids of the feeds among `nodes`. Other kinds are ignored.
    pub fn feed_ids(&self, nodes: &[NodeId]) -> Vec<i64> {
        nodes
            .iter()
            .filter_map(|&n| self.tree.get(n))
            .filter(|item| item.kind() == ItemKind::Feed)
            .map(|item| item.id)
            .collect()
    }

    /// Child rows leading from the root to `node`. Empty for the root.
    pub fn index_for_item(&self, node: NodeId) -> Option<Vec<usize>> {
        if !self.tree.contains(node) {
            return None;
        }
        let mut path = Vec::new();
        let mut current = node;
        while let Some(parent) = self.tree.parent(current) {
            path.push(self.tree.row(current)?);
            current = parent;
        }
        path.reverse();
        Some(path)
    }

    pub fn item_for_index(&self, path: &[usize]) -> Option<NodeId> {
        path.iter().try_fold(self.root(), |node, &row| {
            self.tree.children(node).get(row).copied()
        })
    }

    /// Unread/total counts of `node`. Containers sum their feeds.
    pub fn counts(&self, node: NodeId) -> MessageCounts {
        let Some(item) = self.tree.get(node) else {
            return MessageCounts::default();
        };
        match item.kind() {
            ItemKind::Feed | ItemKind::RecycleBin => item.counts,
            ItemKind::Root | ItemKind::Category => self
                .feeds_for_item(node)
                .into_iter()
                .filter_map(|n| self.tree.get(n))
                .fold(MessageCounts::default(), |acc, feed| MessageCounts {
                    unread: acc.unread + feed.counts.unread,
                    total: acc.total + feed.counts.total,
                }),
        }
    }

    pub fn has_any_feed_new_messages(&self) -> bool {
        self.all_feeds().into_iter().any(|n| {
            self.tree
                .get(n)
                .and_then(Item::feed)
                .is_some_and(|feed| feed.status == FeedStatus::NewMessages)
        })
    }

    pub fn set_feed_status(&mut self, node: NodeId, status: FeedStatus) -> bool {
        let Some(feed) = self.tree.get_mut(node).and_then(Item::feed_mut) else {
            return false;
        };
        feed.status = status;
        self.events.emit(TreeEvent::DataChanged { node });
        true
    }

    /// Non-deleted messages of the given feeds.
    pub async fn messages_for_feeds(&self, feeds: &[NodeId]) -> Result<Vec<Message>, TreeError> {
        let ids = self.feed_ids(feeds);
        Ok(self.db.messages_for_feeds(&ids).await?)
    }

    /// Snapshot of `node` for the message table.
    pub fn loaded_item(&self, node: NodeId) -> Option<LoadedItem> {
        let item = self.tree.get(node)?;
        let service: Arc<dyn ServiceRoot> = self.service.clone();
        Some(LoadedItem {
            node,
            kind: item.kind(),
            title: item.title.clone(),
            feed_ids: self.feed_ids(&self.feeds_for_item(node)),
            service,
        })
    }

    // ========================================================================
    // Structural Changes
    // ========================================================================

    /// Persistent id children of `parent` refer to.
    fn container_id(&self, parent: NodeId) -> Result<i64, TreeError> {
        let item = self.tree.get(parent).ok_or(TreeError::UnknownNode)?;
        if !item.is_container() {
            return Err(TreeError::InvalidParent);
        }
        Ok(item.id)
    }

    /// Link a detached node under `parent`, keeping the recycle bin last
    /// among the root's children.
    fn link_under(&mut self, parent: NodeId, node: NodeId) -> Result<usize, TreeError> {
        let mut row = self.tree.child_count(parent);
        if parent == self.root() && self.tree.children(parent).last() == Some(&self.recycle_bin) {
            row -= 1;
        }
        let row = self
            .tree
            .insert_child(parent, row, node)
            .ok_or(TreeError::UnknownNode)?;
        self.events.emit(TreeEvent::RowsInserted {
            parent,
            first: row,
            last: row,
        });
        Ok(row)
    }

    /// Structural edits are refused while a feed update runs.
    fn lock_for_edit(&self) -> Result<OwnedMutexGuard<()>, TreeError> {
        self.update_lock
            .try_acquire()
            .ok_or(TreeError::UpdateInProgress)
    }

    pub async fn add_category(
        &mut self,
        draft: CategoryDraft,
        parent: NodeId,
    ) -> Result<NodeId, TreeError> {
        let _guard = self.lock_for_edit()?;
        self.create_category(draft, parent).await
    }

    pub async fn add_feed(&mut self, draft: FeedDraft, parent: NodeId) -> Result<NodeId, TreeError> {
        let _guard = self.lock_for_edit()?;
        self.create_feed(draft, parent).await
    }

    /// [`FeedsModel::add_category`] for callers already holding the update
    /// lock.
    pub(crate) async fn create_category(
        &mut self,
        draft: CategoryDraft,
        parent: NodeId,
    ) -> Result<NodeId, TreeError> {
        let parent_id = self.container_id(parent)?;
        let id = self
            .db
            .insert_category(&draft.title, &draft.description, draft.icon.as_deref(), parent_id)
            .await?;

        let mut item = Item::new(id, clean_title(&draft.title), ItemPayload::Category);
        item.description = draft.description;
        item.icon = draft.icon;
        item.created = chrono::Utc::now().timestamp_millis();

        let node = self.tree.insert_detached(item);
        self.link_under(parent, node)?;
        tracing::debug!(category_id = id, parent_id, "Added category");
        Ok(node)
    }

    pub(crate) async fn create_feed(
        &mut self,
        draft: FeedDraft,
        parent: NodeId,
    ) -> Result<NodeId, TreeError> {
        let parent_id = self.container_id(parent)?;
        validate_feed_url(&draft.url)?;
        let url = draft.url.trim();
        let (update_type, update_interval) = encode_auto_update(&draft.auto_update);

        let id = self
            .db
            .insert_feed(&NewFeed {
                title: &draft.title,
                description: &draft.description,
                icon: draft.icon.as_deref(),
                category: parent_id,
                encoding: &draft.encoding,
                url,
                format: draft.format,
                update_type,
                update_interval,
            })
            .await?;

        let mut item = Item::new(
            id,
            clean_title(&draft.title),
            ItemPayload::Feed(FeedData {
                url: url.to_owned(),
                encoding: draft.encoding,
                format: draft.format,
                auto_update: draft.auto_update,
                status: FeedStatus::Normal,
            }),
        );
        item.description = draft.description;
        item.icon = draft.icon;
        item.created = chrono::Utc::now().timestamp_millis();

        let node = self.tree.insert_detached(item);
        self.link_under(parent, node)?;
        tracing::debug!(feed_id = id, parent_id, "Added feed");
        Ok(node)
    }

    /// Delete an item and everything below it, storage first.
    pub async fn remove_item(&mut self, node: NodeId) -> Result<(), TreeError> {
        let _guard = self.lock_for_edit()?;
        let item = self.tree.get(node).ok_or(TreeError::UnknownNode)?;
        let (kind, id) = (item.kind(), item.id);

        match kind {
            ItemKind::Root | ItemKind::RecycleBin => return Err(TreeError::NotRemovable),
            ItemKind::Feed => {
                let removed = self.db.delete_feed(id).await?;
                tracing::debug!(feed_id = id, messages = removed, "Deleted feed");
            }
            ItemKind::Category => {
                let categories = self.persistent_ids(node, ItemKind::Category);
                let feeds = self.persistent_ids(node, ItemKind::Feed);
                self.db.delete_category_subtree(&categories, &feeds).await?;
                tracing::debug!(
                    category_id = id,
                    categories = categories.len(),
                    feeds = feeds.len(),
                    "Deleted category subtree"
                );
            }
        }

        let parent = self.tree.parent(node).ok_or(TreeError::UnknownNode)?;
        let row = self.tree.detach(node).ok_or(TreeError::UnknownNode)?;
        self.tree.release(node);
        self.events.emit(TreeEvent::RowsRemoved {
            parent,
            first: row,
            last: row,
        });

        // Deleted messages of removed feeds left the recycle bin as well
        if let Err(e) = self.update_bin_counts().await {
            tracing::warn!(error = %e, "Failed to refresh recycle bin counts");
        }
        Ok(())
    }

    fn persistent_ids(&self, node: NodeId, kind: ItemKind) -> Vec<i64> {
        self.nodes_of_kind(node, kind)
            .into_iter()
            .filter_map(|n| self.tree.get(n).map(|item| item.id))
            .collect()
    }

    /// Check a move of `node` under `new_parent`. `Ok(false)` means the node
    /// is already there.
    fn check_reassign(&self, node: NodeId, new_parent: NodeId) -> Result<bool, TreeError> {
        if node == self.root() || node == self.recycle_bin {
            return Err(TreeError::NotRemovable);
        }
        let current = self.tree.parent(node).ok_or(TreeError::UnknownNode)?;
        if current == new_parent {
            return Ok(false);
        }
        self.container_id(new_parent)?;
        if self.tree.is_ancestor_or_self(node, new_parent) {
            return Err(TreeError::InvalidParent);
        }
        Ok(true)
    }

    /// Move `node` under `new_parent` in memory only.
    ///
    /// Storage is not touched; see [`FeedsModel::move_item`].
    pub fn reassign_node_to_new_parent(
        &mut self,
        node: NodeId,
        new_parent: NodeId,
    ) -> Result<(), TreeError> {
        if !self.check_reassign(node, new_parent)? {
            return Ok(());
        }

        let old_parent = self.tree.parent(node).ok_or(TreeError::UnknownNode)?;
        let row = self.tree.detach(node).ok_or(TreeError::UnknownNode)?;
        self.events.emit(TreeEvent::RowsRemoved {
            parent: old_parent,
            first: row,
            last: row,
        });
        self.link_under(new_parent, node)?;
        Ok(())
    }

    /// Persist a new parent for `node`, then move it in memory.
    pub async fn move_item(&mut self, node: NodeId, new_parent: NodeId) -> Result<(), TreeError> {
        let _guard = self.lock_for_edit()?;
        if !self.check_reassign(node, new_parent)? {
            return Ok(());
        }
        let parent_id = self.container_id(new_parent)?;
        let item = self.tree.get(node).ok_or(TreeError::UnknownNode)?;
        let (kind, id) = (item.kind(), item.id);

        match kind {
            ItemKind::Category => self.db.move_category(id, parent_id).await?,
            ItemKind::Feed => self.db.move_feed_to_category(id, parent_id).await?,
            ItemKind::Root | ItemKind::RecycleBin => return Err(TreeError::NotRemovable),
        }

        self.reassign_node_to_new_parent(node, new_parent)
    }

    /// Persist and apply a feed's auto-update policy.
    pub async fn set_feed_auto_update(
        &mut self,
        node: NodeId,
        policy: AutoUpdate,
    ) -> Result<(), TreeError> {
        let id = self
            .tree
            .get(node)
            .filter(|item| item.kind() == ItemKind::Feed)
            .map(|item| item.id)
            .ok_or(TreeError::UnknownNode)?;
        let (update_type, update_interval) = encode_auto_update(&policy);
        self.db
            .set_feed_auto_update(id, update_type, update_interval)
            .await?;

        if let Some(feed) = self.tree.get_mut(node).and_then(Item::feed_mut) {
            feed.auto_update = policy;
        }
        Ok(())
    }

    // ========================================================================
    // Bulk Message State
    // ========================================================================

    /// Mark every visible message of `feeds` read or unread.
    ///
    /// All-or-nothing across the feed set.
    pub async fn mark_feeds_read(
        &mut self,
        feeds: &[NodeId],
        read: ReadStatus,
    ) -> Result<(), TreeError> {
        let ids = self.feed_ids(feeds);
        let changed = self.db.mark_feeds_read(&ids, read.into()).await?;
        tracing::debug!(feeds = ids.len(), changed, ?read, "Marked feeds");

        if let Err(e) = self.update_counts(feeds).await {
            tracing::warn!(error = %e, "Failed to refresh feed counts");
        }
        Ok(())
    }

    /// Move the messages of `feeds` into the recycle bin (or back), limited
    /// to read messages when `read_only` is set.
    ///
    /// All-or-nothing across the feed set.
    pub async fn mark_feeds_deleted(
        &mut self,
        feeds: &[NodeId],
        deleted: bool,
        read_only: bool,
    ) -> Result<(), TreeError> {
        let ids = self.feed_ids(feeds);
        let changed = self
            .db
            .mark_feeds_deleted(&ids, deleted, read_only)
            .await?;
        tracing::debug!(feeds = ids.len(), changed, deleted, read_only, "Marked feeds");

        if let Err(e) = self.update_counts(feeds).await {
            tracing::warn!(error = %e, "Failed to refresh feed counts");
        }
        if let Err(e) = self.update_bin_counts().await {
            tracing::warn!(error = %e, "Failed to refresh recycle bin counts");
        }
        Ok(())
    }

    // ========================================================================
    // Counts
    // ========================================================================

    /// Re-read counts of `feeds` and announce them with their ancestors.
    pub async fn update_counts(&mut self, feeds: &[NodeId]) -> Result<(), TreeError> {
        let ids = self.feed_ids(feeds);
        if ids.is_empty() {
            return Ok(());
        }
        let counts = self.db.get_message_counts(&ids).await?;

        let mut changed = BTreeSet::new();
        for &node in feeds {
            let Some(item) = self.tree.get_mut(node) else {
                continue;
            };
            if item.kind() != ItemKind::Feed {
                continue;
            }
            item.counts = counts.get(&item.id).copied().unwrap_or_default();

            let mut current = Some(node);
            while let Some(n) = current {
                changed.insert(n);
                current = self.tree.parent(n);
            }
        }

        self.reload_changed_layout(changed);
        Ok(())
    }

    pub async fn update_bin_counts(&mut self) -> Result<(), TreeError> {
        let counts = self.db.recycle_bin_counts().await?;
        if let Some(bin) = self.tree.get_mut(self.recycle_bin) {
            bin.counts = counts;
        }
        self.reload_changed_layout([self.recycle_bin]);
        Ok(())
    }

    /// Refresh counts the standard service marked stale.
    pub async fn apply_service_updates(&mut self) -> Result<(), TreeError> {
        let feeds: Vec<NodeId> = self
            .service
            .take_dirty_feeds()
            .into_iter()
            .filter_map(|id| self.node_for_feed_id(id))
            .collect();
        self.update_counts(&feeds).await?;

        if self.service.take_bin_dirty() {
            self.update_bin_counts().await?;
        }
        Ok(())
    }

    pub fn reload_changed_layout(&self, nodes: impl IntoIterator<Item = NodeId>) {
        for node in nodes {
            self.events.emit(TreeEvent::DataChanged { node });
        }
    }

    pub fn reload_whole_layout(&self) {
        self.events.emit(TreeEvent::LayoutAboutToBeChanged);
        self.events.emit(TreeEvent::LayoutChanged);
    }

    // ========================================================================
    // Recycle Bin
    // ========================================================================

    /// Purge everything in the recycle bin. Returns the number of messages
    /// purged.
    pub async fn empty_bin(&mut self) -> Result<u64, TreeError> {
        let purged = self.db.empty_recycle_bin().await?;
        tracing::info!(purged, "Emptied recycle bin");

        if let Err(e) = self.update_bin_counts().await {
            tracing::warn!(error = %e, "Failed to refresh recycle bin counts");
        }
        Ok(purged)
    }

    /// Put every message in the recycle bin back into its feed.
    pub async fn restore_bin(&mut self) -> Result<(), TreeError> {
        let feed_ids = self.db.restore_recycle_bin().await?;
        tracing::info!(feeds = feed_ids.len(), "Restored recycle bin");

        let feeds: Vec<NodeId> = feed_ids
            .into_iter()
            .filter_map(|id| self.node_for_feed_id(id))
            .collect();
        if let Err(e) = self.update_counts(&feeds).await {
            tracing::warn!(error = %e, "Failed to refresh feed counts");
        }
        if let Err(e) = self.update_bin_counts().await {
            tracing::warn!(error = %e, "Failed to refresh recycle bin counts");
        }
        Ok(())
    }

    // ========================================================================
    // Auto-Update
    // ========================================================================

    pub fn global_auto_update(&self) -> GlobalAutoUpdate {
        self.global_auto_update
    }

    pub fn auto_update_tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn is_auto_update_timer_active(&self) -> bool {
        self.timer_active
    }

    /// Re-read the global auto-update settings and restart the timer.
    ///
    /// Resets the global countdown; per-feed countdowns are kept.
    pub fn update_auto_update_status(&mut self, config: &Config) {
        self.global_auto_update = GlobalAutoUpdate::from_config(config);
        self.tick_period = Duration::from_secs(config.auto_update_tick_seconds.max(1));
        self.timer_active = true;
        tracing::debug!(
            enabled = self.global_auto_update.enabled,
            interval = self.global_auto_update.initial_interval,
            tick_secs = self.tick_period.as_secs(),
            "Auto-update timer configured"
        );
    }

    /// Stop the auto-update timer.
    pub fn quit(&mut self) {
        if self.timer_active {
            self.timer_active = false;
            tracing::debug!("Auto-update timer stopped");
        }
    }

    /// Feeds due this tick. Advances the countdown of every feed with a
    /// specific interval.
    pub fn feeds_for_scheduled_update(&mut self, auto_update_now: bool) -> Vec<NodeId> {
        let mut due = Vec::new();
        for node in self.all_feeds() {
            if let Some(feed) = self.tree.get_mut(node).and_then(Item::feed_mut) {
                if feed_is_due(&mut feed.auto_update, auto_update_now) {
                    due.push(node);
                }
            }
        }
        due
    }

    /// Handle one timer tick.
    ///
    /// Returns `None` when the update lock was busy and the tick was skipped,
    /// otherwise the feeds selected for updating.
    pub fn execute_next_auto_update(&mut self) -> Option<Vec<NodeId>> {
        let Some(guard) = self.update_lock.try_acquire() else {
            tracing::debug!("Feed update in progress, skipping auto-update tick");
            return None;
        };

        let auto_update_now = self.global_auto_update.advance();
        let due = self.feeds_for_scheduled_update(auto_update_now);
        drop(guard);

        if !due.is_empty() {
            tracing::info!(feeds = due.len(), "Scheduled feed update");
            self.events.emit(TreeEvent::FeedsUpdateRequested(due.clone()));
        }
        Some(due)
    }
}

// ============================================================================
// Assembly Helpers
// ============================================================================

fn clean_title(title: &str) -> String {
    strip_control_chars(title).trim().to_owned()
}

fn attach_recycle_bin(tree: &mut ItemTree) -> NodeId {
    let mut bin = Item::new(NO_ID, RECYCLE_BIN_TITLE, ItemPayload::RecycleBin);
    bin.description = RECYCLE_BIN_DESCRIPTION.to_string();
    let root = tree.root();
    let node = tree.insert_detached(bin);
    tree.append_child(root, node);
    node
}

/// Attach categories whose parent is already attached, pass after pass,
/// until a pass attaches nothing. Whatever is left is orphaned.
fn assemble_categories(
    tree: &mut ItemTree,
    containers: &mut HashMap<i64, NodeId>,
    mut pending: Vec<CategoryRow>,
) {
    let mut progressed = true;
    while progressed && !pending.is_empty() {
        progressed = false;
        let mut i = 0;
        while i < pending.len() {
            let Some(&parent) = containers.get(&pending[i].parent_id) else {
                i += 1;
                continue;
            };
            let row = pending.remove(i);
            let mut item = Item::new(row.id, row.title, ItemPayload::Category);
            item.description = row.description;
            item.icon = row.icon;
            item.created = row.date_created;

            let node = tree.insert_detached(item);
            tree.append_child(parent, node);
            containers.insert(row.id, node);
            progressed = true;
        }
    }

    for orphan in pending {
        tracing::warn!(
            category_id = orphan.id,
            parent_id = orphan.parent_id,
            title = %orphan.title,
            "Dropping category with unknown parent"
        );
    }
}

fn assemble_feeds(
    tree: &mut ItemTree,
    containers: &HashMap<i64, NodeId>,
    feeds: Vec<FeedRow>,
    counts: &HashMap<i64, MessageCounts>,
) {
    for row in feeds {
        let Some(format) = FeedFormat::from_code(row.type_code) else {
            tracing::warn!(
                feed_id = row.id,
                type_code = row.type_code,
                "Skipping feed of unknown type"
            );
            continue;
        };
        let Some(&parent) = containers.get(&row.category) else {
            tracing::warn!(
                feed_id = row.id,
                category_id = row.category,
                title = %row.title,
                "Dropping loose feed with unknown category"
            );
            continue;
        };

        let mut item = Item::new(
            row.id,
            row.title,
            ItemPayload::Feed(FeedData {
                url: row.url,
                encoding: row.encoding,
                format,
                auto_update: decode_auto_update(row.update_type, row.update_interval),
                status: FeedStatus::Normal,
            }),
        );
        item.description = row.description;
        item.icon = row.icon;
        item.created = row.date_created;
        item.counts = counts.get(&row.id).copied().unwrap_or_default();

        let node = tree.insert_detached(item);
        tree.append_child(parent, node);
    }
}

fn decode_auto_update(update_type: i64, interval: i64) -> AutoUpdate {
    match update_type {
        UPDATE_TYPE_SPECIFIC => AutoUpdate::every(interval),
        UPDATE_TYPE_NEVER => AutoUpdate::DontAutoUpdate,
        _ => AutoUpdate::DefaultAutoUpdate,
    }
}

fn encode_auto_update(policy: &AutoUpdate) -> (i64, i64) {
    match *policy {
        AutoUpdate::DontAutoUpdate => (UPDATE_TYPE_NEVER, DEFAULT_AUTO_UPDATE_INTERVAL),
        AutoUpdate::DefaultAutoUpdate => (UPDATE_TYPE_DEFAULT, DEFAULT_AUTO_UPDATE_INTERVAL),
        AutoUpdate::SpecificAutoUpdate {
            initial_interval, ..
        } => (UPDATE_TYPE_SPECIFIC, initial_interval.max(1)),
    }
}

//! The message table controller.
//!
//! Rows come from one storage query for the loaded item and are held fully in
//! memory. Edits are staged in a [`MessagesCache`] overlay first, so the table
//! reflects a change before storage does; the next [`MessagesModel::repopulate`]
//! drops the overlay and shows storage again.
//!
//! Every mutation runs the same three steps: ask the item's service (`before`
//! hook, may veto), stage the change and write it to storage, then report to
//! the service (`after` hook, whose answer is the result of the operation).

use std::collections::HashMap;
use tokio::sync::mpsc;

use super::error::MessageOpError;
use super::events::{EventSink, TableEvent};
use super::message_row::{
    DataRole, FontStyle, HighlightColor, Importance, MessageColumn, MessageHighlighter,
    MessageIcon, ReadStatus, RoleData, Value,
};
use super::messages_cache::MessagesCache;
use super::service::LoadedItem;
use crate::config::Config;
use crate::storage::{Database, Message, MessageFilter};
use crate::util::format_timestamp;

/// Header cell of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderData {
    pub title: &'static str,
    pub tooltip: &'static str,
    pub icon: Option<MessageIcon>,
}

pub struct MessagesModel {
    db: Database,
    rows: Vec<Message>,
    row_for_id: HashMap<i64, usize>,
    cache: MessagesCache,
    filter: MessageFilter,
    loaded_item: Option<LoadedItem>,
    highlighter: MessageHighlighter,
    custom_date_format: Option<String>,
    events: EventSink<TableEvent>,
}

impl MessagesModel {
    /// An empty table with nothing loaded.
    pub fn new(db: Database, config: &Config) -> Self {
        let mut model = Self {
            db,
            rows: Vec::new(),
            row_for_id: HashMap::new(),
            cache: MessagesCache::default(),
            filter: MessageFilter::default(),
            loaded_item: None,
            highlighter: config.message_highlight,
            custom_date_format: None,
            events: EventSink::default(),
        };
        model.apply_date_format(config);
        model
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TableEvent> {
        self.events.subscribe()
    }

    pub fn loaded_item(&self) -> Option<&LoadedItem> {
        self.loaded_item.as_ref()
    }

    pub fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    pub fn cache(&self) -> &MessagesCache {
        &self.cache
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        MessageColumn::ALL.len()
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Show the messages of `item`, or nothing when `item` is `None`.
    ///
    /// Returns `Ok(false)` when the item's service could not provide its
    /// messages; the table is then empty and [`TableEvent::ItemLoadFailed`]
    /// is emitted.
    pub async fn load_messages(&mut self, item: Option<LoadedItem>) -> anyhow::Result<bool> {
        let mut loaded = true;

        self.filter = match &item {
            None => MessageFilter::Empty,
            Some(item) => match item.service.message_filter_for_item(item) {
                Some(filter) => filter,
                None => {
                    tracing::warn!(title = %item.title, "Messages of item could not be loaded");
                    self.events.emit(TableEvent::ItemLoadFailed {
                        title: item.title.clone(),
                    });
                    loaded = false;
                    MessageFilter::Empty
                }
            },
        };
        self.loaded_item = item;

        self.repopulate().await?;
        Ok(loaded)
    }

    /// Drop every staged edit and re-run the query, materialising all rows.
    pub async fn repopulate(&mut self) -> anyhow::Result<()> {
        self.cache.clear();

        let rows = match self.db.get_messages(&self.filter).await {
            Ok(rows) => rows,
            Err(e) => {
                self.rows.clear();
                self.row_for_id.clear();
                self.events.emit(TableEvent::Reset);
                return Err(e);
            }
        };

        self.row_for_id = rows.iter().enumerate().map(|(row, m)| (m.id, row)).collect();
        self.rows = rows;
        self.events.emit(TableEvent::Reset);
        tracing::debug!(rows = self.rows.len(), "Repopulated message table");
        Ok(())
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Staged value of a cell, falling back to the stored one.
    fn edit_value(&self, row: usize, column: MessageColumn) -> Value {
        match self.cache.get(row, column) {
            Some(value) => value.clone(),
            None => self
                .rows
                .get(row)
                .map_or(Value::Null, |message| message.value(column)),
        }
    }

    fn flag(&self, row: usize, column: MessageColumn) -> bool {
        match self.cache.get(row, column) {
            Some(value) => value.as_bool(),
            None => self
                .rows
                .get(row)
                .is_some_and(|message| message.value(column).as_bool()),
        }
    }

    fn is_recycle_bin_loaded(&self) -> bool {
        self.loaded_item
            .as_ref()
            .is_some_and(LoadedItem::is_recycle_bin)
    }

    pub fn data(&self, row: usize, column: MessageColumn, role: DataRole) -> RoleData {
        let Some(message) = self.rows.get(row) else {
            return RoleData::None;
        };

        match role {
            DataRole::Display => match column {
                MessageColumn::DateCreated => RoleData::Value(Value::Text(format_timestamp(
                    message.created,
                    self.custom_date_format.as_deref(),
                ))),
                MessageColumn::Author if message.author.is_empty() => {
                    RoleData::Value(Value::from("-"))
                }
                MessageColumn::Read | MessageColumn::Important => RoleData::None,
                _ => RoleData::Value(message.value(column)),
            },
            DataRole::Edit => RoleData::Value(self.edit_value(row, column)),
            DataRole::Font => {
                let deleted_column = if self.is_recycle_bin_loaded() {
                    MessageColumn::PDeleted
                } else {
                    MessageColumn::Deleted
                };
                RoleData::Font(FontStyle {
                    bold: !self.flag(row, MessageColumn::Read),
                    strike_out: self.flag(row, deleted_column),
                })
            }
            DataRole::Foreground => {
                let highlighted = match self.highlighter {
                    MessageHighlighter::NoHighlighting => false,
                    MessageHighlighter::HighlightImportant => {
                        self.flag(row, MessageColumn::Important)
                    }
                    MessageHighlighter::HighlightUnread => !self.flag(row, MessageColumn::Read),
                };
                if highlighted {
                    RoleData::Foreground(HighlightColor::Blue)
                } else {
                    RoleData::None
                }
            }
            DataRole::Decoration => match column {
                MessageColumn::Read if self.flag(row, MessageColumn::Read) => {
                    RoleData::Icon(MessageIcon::Read)
                }
                MessageColumn::Read => RoleData::Icon(MessageIcon::Unread),
                MessageColumn::Important if self.flag(row, MessageColumn::Important) => {
                    RoleData::Icon(MessageIcon::Important)
                }
                _ => RoleData::None,
            },
        }
    }

    /// Stage a cell value in the overlay. Storage is not touched.
    ///
    /// Returns `false` only for rows outside the table.
    pub fn set_data(&mut self, row: usize, column: MessageColumn, value: Value) -> bool {
        if row >= self.rows.len() {
            return false;
        }
        self.cache.set(row, column, value);
        true
    }

    /// The message of `row` with staged edits applied.
    pub fn message_at(&self, row: usize) -> Option<Message> {
        let mut message = self.rows.get(row)?.clone();
        for (column, value) in self.cache.row_cells(row) {
            message.apply(column, value);
        }
        Some(message)
    }

    pub fn message_id(&self, row: usize) -> Option<i64> {
        self.rows.get(row).map(|message| message.id)
    }

    pub fn message_importance(&self, row: usize) -> Option<Importance> {
        (row < self.rows.len()).then(|| Importance::from(self.flag(row, MessageColumn::Important)))
    }

    pub fn header_data(&self, column: MessageColumn) -> HeaderData {
        let icon = match column {
            MessageColumn::Read => Some(MessageIcon::Read),
            MessageColumn::Important => Some(MessageIcon::Important),
            _ => None,
        };
        HeaderData {
            title: if icon.is_some() { "" } else { column.title() },
            tooltip: column.tooltip(),
            icon,
        }
    }

    // ========================================================================
    // Presentation Settings
    // ========================================================================

    pub fn highlight_messages(&mut self, highlighter: MessageHighlighter) {
        self.highlighter = highlighter;
        self.reload_whole_layout();
    }

    fn apply_date_format(&mut self, config: &Config) {
        self.custom_date_format = config
            .use_custom_date
            .then(|| config.custom_date_format.clone())
            .filter(|format| !format.is_empty());
    }

    pub fn update_date_format(&mut self, config: &Config) {
        self.apply_date_format(config);
        self.reload_whole_layout();
    }

    fn reload_whole_layout(&self) {
        self.events.emit(TableEvent::LayoutAboutToBeChanged);
        self.events.emit(TableEvent::LayoutChanged);
    }

    fn emit_row_changed(&self, row: usize) {
        self.events.emit(TableEvent::DataChanged {
            first: row,
            last: row,
            roles: None,
        });
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    fn current_item(&self) -> Result<LoadedItem, MessageOpError> {
        self.loaded_item.clone().ok_or(MessageOpError::NoItemLoaded)
    }

    fn check_row(&self, row: usize) -> Result<(), MessageOpError> {
        if row < self.rows.len() {
            Ok(())
        } else {
            Err(MessageOpError::RowOutOfRange(row))
        }
    }

    /// Sorted, de-duplicated, range-checked copy of `rows`.
    fn batch_rows(&self, rows: &[usize]) -> Result<Vec<usize>, MessageOpError> {
        let mut rows = rows.to_vec();
        rows.sort_unstable();
        rows.dedup();
        for &row in &rows {
            self.check_row(row)?;
        }
        Ok(rows)
    }

    fn messages_at(&self, rows: &[usize]) -> Result<Vec<Message>, MessageOpError> {
        rows.iter()
            .map(|&row| self.message_at(row).ok_or(MessageOpError::RowOutOfRange(row)))
            .collect()
    }

    fn hook_result(ok: bool) -> Result<(), MessageOpError> {
        if ok {
            Ok(())
        } else {
            Err(MessageOpError::HookFailed)
        }
    }

    /// Mark one row read or unread. Nothing happens when the row is already
    /// in that state.
    pub async fn set_message_read(
        &mut self,
        row: usize,
        read: ReadStatus,
    ) -> Result<(), MessageOpError> {
        let item = self.current_item()?;
        self.check_row(row)?;
        if self.flag(row, MessageColumn::Read) == bool::from(read) {
            return Ok(());
        }

        let messages = self.messages_at(&[row])?;
        if !item
            .service
            .on_before_set_messages_read(&item, &messages, read)
        {
            return Err(MessageOpError::Vetoed);
        }

        self.set_data(row, MessageColumn::Read, Value::from(bool::from(read)));
        self.emit_row_changed(row);
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        self.db.mark_messages_read(&ids, read.into()).await?;

        Self::hook_result(
            item.service
                .on_after_set_messages_read(&item, &messages, read),
        )
    }

    pub async fn switch_message_importance(&mut self, row: usize) -> Result<(), MessageOpError> {
        let item = self.current_item()?;
        self.check_row(row)?;

        let next = Importance::from(self.flag(row, MessageColumn::Important)).toggled();
        let changes: Vec<(Message, Importance)> = self
            .messages_at(&[row])?
            .into_iter()
            .map(|message| (message, next))
            .collect();
        if !item
            .service
            .on_before_switch_message_importance(&item, &changes)
        {
            return Err(MessageOpError::Vetoed);
        }

        self.set_data(row, MessageColumn::Important, Value::from(bool::from(next)));
        self.emit_row_changed(row);
        for (message, _) in &changes {
            self.db
                .mark_message_important(message.id, next.into())
                .await?;
        }

        Self::hook_result(
            item.service
                .on_after_switch_message_importance(&item, &changes),
        )
    }

    pub async fn switch_batch_message_importance(
        &mut self,
        rows: &[usize],
    ) -> Result<(), MessageOpError> {
        let item = self.current_item()?;
        let rows = self.batch_rows(rows)?;
        if rows.is_empty() {
            return Ok(());
        }

        let changes: Vec<(Message, Importance)> = self
            .messages_at(&rows)?
            .into_iter()
            .map(|message| {
                let next = Importance::from(message.is_important).toggled();
                (message, next)
            })
            .collect();
        if !item
            .service
            .on_before_switch_message_importance(&item, &changes)
        {
            return Err(MessageOpError::Vetoed);
        }

        for (&row, (_, next)) in rows.iter().zip(&changes) {
            self.set_data(row, MessageColumn::Important, Value::from(bool::from(*next)));
        }
        self.reload_whole_layout();
        let targets: Vec<(i64, bool)> = changes
            .iter()
            .map(|(message, next)| (message.id, bool::from(*next)))
            .collect();
        self.db.set_messages_importance(&targets).await?;

        Self::hook_result(
            item.service
                .on_after_switch_message_importance(&item, &changes),
        )
    }

    /// Delete the given rows.
    ///
    /// In the recycle bin this purges them for good; anywhere else they are
    /// moved to the recycle bin.
    pub async fn set_batch_messages_deleted(&mut self, rows: &[usize]) -> Result<(), MessageOpError> {
        let item = self.current_item()?;
        let rows = self.batch_rows(rows)?;
        if rows.is_empty() {
            return Ok(());
        }

        let messages = self.messages_at(&rows)?;
        if !item.service.on_before_messages_delete(&item, &messages) {
            return Err(MessageOpError::Vetoed);
        }

        let purge = item.is_recycle_bin();
        let column = if purge {
            MessageColumn::PDeleted
        } else {
            MessageColumn::Deleted
        };
        for &row in &rows {
            self.set_data(row, column, Value::from(true));
        }
        self.reload_whole_layout();

        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        if purge {
            self.db.permanently_delete_messages(&ids).await?;
        } else {
            self.db.delete_or_restore_messages(&ids, true).await?;
        }
        tracing::debug!(messages = ids.len(), purge, "Deleted messages");

        Self::hook_result(item.service.on_after_messages_delete(&item, &messages))
    }

    pub async fn set_batch_messages_read(
        &mut self,
        rows: &[usize],
        read: ReadStatus,
    ) -> Result<(), MessageOpError> {
        let item = self.current_item()?;
        let rows = self.batch_rows(rows)?;
        if rows.is_empty() {
            return Ok(());
        }

        let messages = self.messages_at(&rows)?;
        if !item
            .service
            .on_before_set_messages_read(&item, &messages, read)
        {
            return Err(MessageOpError::Vetoed);
        }

        for &row in &rows {
            self.set_data(row, MessageColumn::Read, Value::from(bool::from(read)));
        }
        self.reload_whole_layout();
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        self.db.mark_messages_read(&ids, read.into()).await?;

        Self::hook_result(
            item.service
                .on_after_set_messages_read(&item, &messages, read),
        )
    }

    /// Move the given rows out of the recycle bin.
    pub async fn set_batch_messages_restored(
        &mut self,
        rows: &[usize],
    ) -> Result<(), MessageOpError> {
        let item = self.current_item()?;
        let rows = self.batch_rows(rows)?;
        if rows.is_empty() {
            return Ok(());
        }

        let messages = self.messages_at(&rows)?;
        if !item
            .service
            .on_before_messages_restored_from_bin(&item, &messages)
        {
            return Err(MessageOpError::Vetoed);
        }

        for &row in &rows {
            self.set_data(row, MessageColumn::PDeleted, Value::from(false));
            self.set_data(row, MessageColumn::Deleted, Value::from(false));
        }
        self.reload_whole_layout();
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        self.db.delete_or_restore_messages(&ids, false).await?;

        Self::hook_result(
            item.service
                .on_after_messages_restored_from_bin(&item, &messages),
        )
    }

    /// Stage a read state for the message with `id`, if it is loaded.
    ///
    /// Overlay only: used when storage was already updated elsewhere.
    pub fn set_message_read_by_id(&mut self, id: i64, read: ReadStatus) -> bool {
        let Some(&row) = self.row_for_id.get(&id) else {
            return false;
        };
        self.set_data(row, MessageColumn::Read, Value::from(bool::from(read)));
        self.emit_row_changed(row);
        true
    }

    /// Stage an importance for the message with `id`, if it is loaded.
    ///
    /// Overlay only, like [`MessagesModel::set_message_read_by_id`].
    pub fn set_message_important_by_id(&mut self, id: i64, importance: Importance) -> bool {
        let Some(&row) = self.row_for_id.get(&id) else {
            return false;
        };
        self.set_data(
            row,
            MessageColumn::Important,
            Value::from(bool::from(importance)),
        );
        self.emit_row_changed(row);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::{ItemKind, ItemTree};
    use crate::model::service::{ServiceRoot, StandardServiceRoot};
    use crate::storage::{FeedFormat, NewFeed, ParsedMessage, NO_PARENT_CATEGORY};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn seeded(count: usize) -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let feed_id = db
            .insert_feed(&NewFeed {
                title: "Feed",
                description: "",
                icon: None,
                category: NO_PARENT_CATEGORY,
                encoding: "UTF-8",
                url: "https://feed.example.com/rss",
                format: FeedFormat::Atom10,
                update_type: 0,
                update_interval: 15,
            })
            .await
            .unwrap();
        let messages: Vec<ParsedMessage> = (0..count)
            .map(|i| ParsedMessage {
                title: format!("Message {}", i),
                author: if i == 0 { String::new() } else { "Ann".to_string() },
                created: 1_700_000_000_000 + i as i64,
                ..Default::default()
            })
            .collect();
        db.insert_messages(feed_id, &messages).await.unwrap();
        (db, feed_id)
    }

    fn item_for(feed_id: i64, kind: ItemKind, service: Arc<dyn ServiceRoot>) -> LoadedItem {
        LoadedItem {
            node: ItemTree::new("Root").root(),
            kind,
            title: "Feed".to_string(),
            feed_ids: vec![feed_id],
            service,
        }
    }

    async fn loaded_model(count: usize) -> MessagesModel {
        let (db, feed_id) = seeded(count).await;
        let mut model = MessagesModel::new(db, &Config::default());
        let item = item_for(
            feed_id,
            ItemKind::Feed,
            Arc::new(StandardServiceRoot::default()),
        );
        assert!(model.load_messages(Some(item)).await.unwrap());
        model
    }

    struct NoMessages;

    impl ServiceRoot for NoMessages {
        fn message_filter_for_item(&self, _item: &LoadedItem) -> Option<MessageFilter> {
            None
        }
    }

    #[tokio::test]
    async fn test_no_item_loads_nothing() {
        let (db, _) = seeded(3).await;
        let mut model = MessagesModel::new(db, &Config::default());
        assert!(model.load_messages(None).await.unwrap());
        assert_eq!(model.row_count(), 0);
        assert_eq!(model.filter(), &MessageFilter::Empty);
    }

    #[tokio::test]
    async fn test_failed_item_load_falls_back_to_empty() {
        let (db, feed_id) = seeded(3).await;
        let mut model = MessagesModel::new(db, &Config::default());
        let mut events = model.subscribe();

        let loaded = model
            .load_messages(Some(item_for(feed_id, ItemKind::Feed, Arc::new(NoMessages))))
            .await
            .unwrap();

        assert!(!loaded);
        assert_eq!(model.row_count(), 0);
        assert_eq!(
            events.try_recv().unwrap(),
            TableEvent::ItemLoadFailed {
                title: "Feed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_display_role_formats_and_bypasses_overlay() {
        let mut model = loaded_model(2).await;
        // Newest first, so row 1 is the message without an author
        assert_eq!(
            model.data(1, MessageColumn::Author, DataRole::Display),
            RoleData::Value(Value::from("-"))
        );
        assert_eq!(
            model.data(0, MessageColumn::Read, DataRole::Display),
            RoleData::None
        );

        model.set_data(0, MessageColumn::Title, Value::from("Staged"));
        assert_eq!(
            model.data(0, MessageColumn::Title, DataRole::Display),
            RoleData::Value(Value::from("Message 1"))
        );
        assert_eq!(
            model.data(0, MessageColumn::Title, DataRole::Edit),
            RoleData::Value(Value::from("Staged"))
        );
    }

    #[tokio::test]
    async fn test_font_follows_read_and_deleted() {
        let mut model = loaded_model(1).await;
        assert_eq!(
            model.data(0, MessageColumn::Title, DataRole::Font),
            RoleData::Font(FontStyle {
                bold: true,
                strike_out: false
            })
        );

        model.set_data(0, MessageColumn::Read, Value::from(true));
        model.set_data(0, MessageColumn::Deleted, Value::from(true));
        assert_eq!(
            model.data(0, MessageColumn::Title, DataRole::Font),
            RoleData::Font(FontStyle {
                bold: false,
                strike_out: true
            })
        );
    }

    #[tokio::test]
    async fn test_highlight_and_decoration() {
        let mut model = loaded_model(1).await;
        assert_eq!(
            model.data(0, MessageColumn::Title, DataRole::Foreground),
            RoleData::None
        );

        model.highlight_messages(MessageHighlighter::HighlightUnread);
        assert_eq!(
            model.data(0, MessageColumn::Title, DataRole::Foreground),
            RoleData::Foreground(HighlightColor::Blue)
        );

        model.highlight_messages(MessageHighlighter::HighlightImportant);
        assert_eq!(
            model.data(0, MessageColumn::Title, DataRole::Foreground),
            RoleData::None
        );

        assert_eq!(
            model.data(0, MessageColumn::Read, DataRole::Decoration),
            RoleData::Icon(MessageIcon::Unread)
        );
        assert_eq!(
            model.data(0, MessageColumn::Important, DataRole::Decoration),
            RoleData::None
        );
    }

    #[tokio::test]
    async fn test_message_at_applies_overlay() {
        let mut model = loaded_model(1).await;
        model.set_data(0, MessageColumn::Important, Value::from(true));

        let message = model.message_at(0).unwrap();
        assert!(message.is_important);
        assert_eq!(message.id, model.message_id(0).unwrap());
        assert_eq!(model.message_importance(0), Some(Importance::Important));
        assert!(!model.set_data(5, MessageColumn::Read, Value::from(true)));
        assert_eq!(model.message_at(5), None);
    }

    #[tokio::test]
    async fn test_repopulate_clears_overlay() {
        let mut model = loaded_model(2).await;
        let raw: Vec<Message> = (0..2).map(|r| model.message_at(r).unwrap()).collect();
        model.set_data(0, MessageColumn::Read, Value::from(true));
        model.set_data(1, MessageColumn::Important, Value::from(true));

        model.repopulate().await.unwrap();

        assert!(model.cache().is_empty());
        for (row, message) in raw.iter().enumerate() {
            assert_eq!(model.message_at(row).as_ref(), Some(message));
        }
    }

    #[tokio::test]
    async fn test_operations_need_loaded_item() {
        let (db, _) = seeded(1).await;
        let mut model = MessagesModel::new(db, &Config::default());
        assert!(matches!(
            model.set_message_read(0, ReadStatus::Read).await,
            Err(MessageOpError::NoItemLoaded)
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_rows_rejected() {
        let mut model = loaded_model(1).await;
        assert!(matches!(
            model.set_batch_messages_deleted(&[0, 3]).await,
            Err(MessageOpError::RowOutOfRange(3))
        ));
        assert!(model.cache().is_empty());
    }

    #[tokio::test]
    async fn test_switch_importance_round_trips_through_storage() {
        let mut model = loaded_model(1).await;
        model.switch_message_importance(0).await.unwrap();
        assert_eq!(model.message_importance(0), Some(Importance::Important));

        model.repopulate().await.unwrap();
        assert_eq!(model.message_importance(0), Some(Importance::Important));

        model.switch_batch_message_importance(&[0, 0]).await.unwrap();
        model.repopulate().await.unwrap();
        assert_eq!(model.message_importance(0), Some(Importance::NotImportant));
    }

    #[tokio::test]
    async fn test_by_id_variants_stage_only() {
        let mut model = loaded_model(2).await;
        let id = model.message_id(1).unwrap();

        assert!(model.set_message_read_by_id(id, ReadStatus::Read));
        assert!(model.set_message_important_by_id(id, Importance::Important));
        assert!(!model.set_message_read_by_id(-5, ReadStatus::Read));

        let message = model.message_at(1).unwrap();
        assert!(message.is_read && message.is_important);

        model.repopulate().await.unwrap();
        let message = model.message_at(1).unwrap();
        assert!(!message.is_read && !message.is_important);
    }

    #[tokio::test]
    async fn test_header_data() {
        let model = loaded_model(0).await;
        assert_eq!(model.header_data(MessageColumn::Title).title, "Title");
        let read = model.header_data(MessageColumn::Read);
        assert_eq!(read.title, "");
        assert_eq!(read.icon, Some(MessageIcon::Read));
        assert_eq!(model.column_count(), 15);
    }

    #[tokio::test]
    async fn test_custom_date_format() {
        let mut model = loaded_model(1).await;
        let config = Config {
            use_custom_date: true,
            custom_date_format: "%Y".to_string(),
            ..Config::default()
        };
        model.update_date_format(&config);

        let RoleData::Value(Value::Text(year)) =
            model.data(0, MessageColumn::DateCreated, DataRole::Display)
        else {
            panic!("date column should render as text");
        };
        assert_eq!(year, "2023");
    }
}

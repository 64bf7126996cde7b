//! Integration tests for the message table: staged edits, service hooks,
//! and the recycle bin round trip through `FeedsModel` and storage.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use feedtree::config::Config;
use feedtree::model::{
    DataRole, FeedDraft, FeedsModel, FontStyle, Importance, LoadedItem, MessageColumn,
    MessageOpError, MessagesModel, NodeId, ReadStatus, RoleData, ServiceRoot, TableEvent,
    Value,
};
use feedtree::storage::{Database, FeedFormat, Message, MessageFilter, ParsedMessage};
use pretty_assertions::assert_eq;

/// Service that counts hook calls and can veto or fail on demand.
#[derive(Default)]
struct CountingService {
    before_calls: AtomicUsize,
    after_calls: AtomicUsize,
    veto: AtomicBool,
    fail_after: AtomicBool,
}

impl CountingService {
    fn before(&self) -> bool {
        self.before_calls.fetch_add(1, Ordering::SeqCst);
        !self.veto.load(Ordering::SeqCst)
    }

    fn after(&self) -> bool {
        self.after_calls.fetch_add(1, Ordering::SeqCst);
        !self.fail_after.load(Ordering::SeqCst)
    }
}

impl ServiceRoot for CountingService {
    fn message_filter_for_item(&self, item: &LoadedItem) -> Option<MessageFilter> {
        Some(MessageFilter::Feeds(item.feed_ids.clone()))
    }

    fn on_before_set_messages_read(
        &self,
        _item: &LoadedItem,
        _messages: &[Message],
        _read: ReadStatus,
    ) -> bool {
        self.before()
    }

    fn on_after_set_messages_read(
        &self,
        _item: &LoadedItem,
        _messages: &[Message],
        _read: ReadStatus,
    ) -> bool {
        self.after()
    }

    fn on_before_messages_delete(&self, _item: &LoadedItem, _messages: &[Message]) -> bool {
        self.before()
    }

    fn on_after_messages_delete(&self, _item: &LoadedItem, _messages: &[Message]) -> bool {
        self.after()
    }
}

struct Fixture {
    feeds: FeedsModel,
    feed: NodeId,
    messages: MessagesModel,
}

async fn fixture(count: usize) -> Fixture {
    let db = Database::open(":memory:").await.unwrap();
    let config = Config::default();
    let mut feeds = FeedsModel::open(db.clone(), &config).await.unwrap();
    let feed = feeds
        .add_feed(
            FeedDraft::new("Feed", "https://feed.example.com/rss", FeedFormat::Rss2X),
            feeds.root(),
        )
        .await
        .unwrap();

    let feed_id = feeds.item(feed).unwrap().id;
    let parsed: Vec<ParsedMessage> = (0..count)
        .map(|i| ParsedMessage {
            title: format!("Message {}", i),
            author: "Ann".to_string(),
            created: 1_700_000_000_000 + i as i64,
            ..Default::default()
        })
        .collect();
    db.insert_messages(feed_id, &parsed).await.unwrap();
    feeds.update_counts(&[feed]).await.unwrap();

    let messages = MessagesModel::new(db, &config);
    Fixture {
        feeds,
        feed,
        messages,
    }
}

async fn load(fx: &mut Fixture, node: NodeId) {
    let item = fx.feeds.loaded_item(node).unwrap();
    assert!(fx.messages.load_messages(Some(item)).await.unwrap());
}

async fn load_with(fx: &mut Fixture, service: Arc<dyn ServiceRoot>) {
    let mut item = fx.feeds.loaded_item(fx.feed).unwrap();
    item.service = service;
    assert!(fx.messages.load_messages(Some(item)).await.unwrap());
}

async fn stored(fx: &Fixture) -> Vec<Message> {
    let ids = fx.feeds.feed_ids(&[fx.feed]);
    fx.feeds
        .database()
        .get_messages(&MessageFilter::Feeds(ids))
        .await
        .unwrap()
}

fn font(messages: &MessagesModel, row: usize) -> FontStyle {
    match messages.data(row, MessageColumn::Title, DataRole::Font) {
        RoleData::Font(font) => font,
        other => panic!("expected a font, got {:?}", other),
    }
}

// ============================================================================
// Read State
// ============================================================================

#[tokio::test]
async fn test_read_is_staged_written_and_counted() {
    let mut fx = fixture(3).await;
    let feed = fx.feed;
    load(&mut fx, feed).await;
    let mut events = fx.messages.subscribe();

    fx.messages.set_message_read(0, ReadStatus::Read).await.unwrap();

    assert!(!font(&fx.messages, 0).bold);
    assert_eq!(
        events.try_recv().unwrap(),
        TableEvent::DataChanged {
            first: 0,
            last: 0,
            roles: None
        }
    );
    let id = fx.messages.message_id(0).unwrap();
    assert!(stored(&fx).await.iter().any(|m| m.id == id && m.is_read));

    fx.feeds.apply_service_updates().await.unwrap();
    assert_eq!(fx.feeds.counts(fx.feed).unread, 2);
}

#[tokio::test]
async fn test_set_read_twice_calls_hooks_once() {
    let mut fx = fixture(2).await;
    let service = Arc::new(CountingService::default());
    load_with(&mut fx, service.clone()).await;

    fx.messages.set_message_read(1, ReadStatus::Read).await.unwrap();
    fx.messages.set_message_read(1, ReadStatus::Read).await.unwrap();

    assert_eq!(service.before_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.after_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_veto_leaves_everything_untouched() {
    let mut fx = fixture(3).await;
    let service = Arc::new(CountingService::default());
    service.veto.store(true, Ordering::SeqCst);
    load_with(&mut fx, service.clone()).await;
    let mut events = fx.messages.subscribe();

    let result = fx
        .messages
        .set_batch_messages_read(&[0, 2], ReadStatus::Read)
        .await;

    assert!(matches!(result, Err(MessageOpError::Vetoed)));
    assert!(fx.messages.cache().is_empty());
    assert!(events.try_recv().is_err());
    assert!(stored(&fx).await.iter().all(|m| !m.is_read));
    assert_eq!(service.after_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_after_hook_keeps_storage_write() {
    let mut fx = fixture(1).await;
    let service = Arc::new(CountingService::default());
    service.fail_after.store(true, Ordering::SeqCst);
    load_with(&mut fx, service).await;

    let result = fx.messages.set_message_read(0, ReadStatus::Read).await;

    assert!(matches!(result, Err(MessageOpError::HookFailed)));
    assert!(stored(&fx).await[0].is_read);
}

#[tokio::test]
async fn test_repopulate_discards_staged_edits() {
    let mut fx = fixture(2).await;
    let feed = fx.feed;
    load(&mut fx, feed).await;

    assert!(fx.messages.set_data(0, MessageColumn::Read, Value::from(true)));
    assert!(!font(&fx.messages, 0).bold);

    fx.messages.repopulate().await.unwrap();
    assert!(fx.messages.cache().is_empty());
    assert!(font(&fx.messages, 0).bold);
}

// ============================================================================
// Importance
// ============================================================================

#[tokio::test]
async fn test_batch_importance_flips_each_row() {
    let mut fx = fixture(3).await;
    let feed = fx.feed;
    load(&mut fx, feed).await;
    fx.messages.switch_message_importance(1).await.unwrap();

    fx.messages
        .switch_batch_message_importance(&[0, 1])
        .await
        .unwrap();

    assert_eq!(fx.messages.message_importance(0), Some(Importance::Important));
    assert_eq!(fx.messages.message_importance(1), Some(Importance::NotImportant));

    fx.messages.repopulate().await.unwrap();
    assert_eq!(fx.messages.message_importance(0), Some(Importance::Important));
    assert_eq!(fx.messages.message_importance(1), Some(Importance::NotImportant));
    assert_eq!(fx.messages.message_importance(2), Some(Importance::NotImportant));
}

#[tokio::test]
async fn test_batch_importance_writes_overlay_values_to_storage() {
    let mut fx = fixture(2).await;
    let feed = fx.feed;
    load(&mut fx, feed).await;

    // Staged in the overlay only; storage still says not important
    let id = fx.messages.message_id(0).unwrap();
    assert!(fx.messages.set_message_important_by_id(id, Importance::Important));

    fx.messages
        .switch_batch_message_importance(&[0, 1])
        .await
        .unwrap();

    assert_eq!(fx.messages.message_importance(0), Some(Importance::NotImportant));
    assert_eq!(fx.messages.message_importance(1), Some(Importance::Important));
    for row in 0..2 {
        let id = fx.messages.message_id(row).unwrap();
        let expected = fx.messages.message_importance(row) == Some(Importance::Important);
        let message = stored(&fx).await.into_iter().find(|m| m.id == id).unwrap();
        assert_eq!(message.is_important, expected, "row {}", row);
    }
}

// ============================================================================
// Delete and Restore
// ============================================================================

#[tokio::test]
async fn test_delete_in_feed_moves_to_bin() {
    let mut fx = fixture(3).await;
    let feed = fx.feed;
    load(&mut fx, feed).await;
    let mut events = fx.messages.subscribe();

    fx.messages
        .set_batch_messages_deleted(&[2, 0, 2])
        .await
        .unwrap();

    assert!(font(&fx.messages, 0).strike_out);
    assert!(!font(&fx.messages, 1).strike_out);
    assert_eq!(events.try_recv().unwrap(), TableEvent::LayoutAboutToBeChanged);
    assert_eq!(events.try_recv().unwrap(), TableEvent::LayoutChanged);

    fx.feeds.apply_service_updates().await.unwrap();
    assert_eq!(fx.feeds.counts(fx.feed).total, 1);
    assert_eq!(fx.feeds.counts(fx.feeds.recycle_bin()).total, 2);

    fx.messages.repopulate().await.unwrap();
    assert_eq!(fx.messages.row_count(), 1);
}

#[tokio::test]
async fn test_delete_in_bin_purges() {
    let mut fx = fixture(3).await;
    let feed = fx.feed;
    fx.feeds.mark_feeds_deleted(&[feed], true, false).await.unwrap();
    let bin = fx.feeds.recycle_bin();
    load(&mut fx, bin).await;
    assert_eq!(fx.messages.row_count(), 3);

    fx.messages.set_batch_messages_deleted(&[1]).await.unwrap();
    assert!(font(&fx.messages, 1).strike_out);

    fx.feeds.apply_service_updates().await.unwrap();
    assert_eq!(fx.feeds.counts(bin).total, 2);

    // Purged messages do not come back with the rest of the bin
    fx.feeds.restore_bin().await.unwrap();
    assert_eq!(fx.feeds.counts(feed).total, 2);
    assert_eq!(stored(&fx).await.len(), 2);
}

#[tokio::test]
async fn test_restore_selected_rows_from_bin() {
    let mut fx = fixture(2).await;
    let feed = fx.feed;
    fx.feeds.mark_feeds_deleted(&[feed], true, false).await.unwrap();
    let bin = fx.feeds.recycle_bin();
    load(&mut fx, bin).await;

    fx.messages.set_batch_messages_restored(&[0]).await.unwrap();
    fx.feeds.apply_service_updates().await.unwrap();

    assert_eq!(fx.feeds.counts(bin).total, 1);
    assert_eq!(fx.feeds.counts(feed).total, 1);
}

#[tokio::test]
async fn test_operations_report_bad_rows() {
    let mut fx = fixture(2).await;
    let feed = fx.feed;
    load(&mut fx, feed).await;

    let result = fx.messages.set_batch_messages_deleted(&[0, 9]).await;
    assert!(matches!(result, Err(MessageOpError::RowOutOfRange(9))));
    assert!(fx.messages.cache().is_empty());
    assert!(stored(&fx).await.iter().all(|m| !m.is_deleted));
}

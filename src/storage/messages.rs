use anyhow::Result;
use sqlx::{QueryBuilder, Sqlite};

use super::schema::Database;
use super::types::{Message, MessageCounts, ParsedMessage};
use super::{push_id_list, ID_BATCH_SIZE};

/// Columns selected for every message query, in `MessageColumn` order.
const MESSAGE_COLUMNS: &str = "id, is_read, is_deleted, is_important, feed, title, url, author, \
     date_created, contents, is_pdeleted, account_id, custom_id, custom_hash, custom_feed_id";

/// Which messages a message view shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MessageFilter {
    /// Matches nothing. Used before any item is selected and when an item's
    /// messages cannot be loaded.
    #[default]
    Empty,
    /// Visible messages of the given feeds.
    Feeds(Vec<i64>),
    /// Soft-deleted messages that have not been purged.
    RecycleBin,
}

impl MessageFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            MessageFilter::Empty => {
                builder.push(" WHERE 0 > 1");
            }
            MessageFilter::Feeds(ids) if ids.is_empty() => {
                builder.push(" WHERE 0 > 1");
            }
            MessageFilter::Feeds(ids) => {
                builder.push(" WHERE is_deleted = 0 AND is_pdeleted = 0 AND feed IN ");
                push_id_list(builder, ids);
            }
            MessageFilter::RecycleBin => {
                builder.push(" WHERE is_deleted = 1 AND is_pdeleted = 0");
            }
        }
    }
}

impl Database {
    // ========================================================================
    // Message Insertion
    // ========================================================================

    /// Store parsed messages for a feed, returning how many were inserted.
    ///
    /// Messages arrive unread and not deleted.
    pub async fn insert_messages(&self, feed_id: i64, messages: &[ParsedMessage]) -> Result<usize> {
        if messages.is_empty() {
            return Ok(0);
        }

        // 9 binds per row keeps a chunk of 50 well under the parameter limit
        const BATCH_SIZE: usize = 50;
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in messages.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO Messages (feed, title, url, author, date_created, contents, \
                 custom_id, custom_hash, custom_feed_id) ",
            );
            builder.push_values(chunk, |mut b, message| {
                b.push_bind(feed_id)
                    .push_bind(&message.title)
                    .push_bind(&message.url)
                    .push_bind(&message.author)
                    .push_bind(message.created)
                    .push_bind(&message.contents)
                    .push_bind(&message.custom_id)
                    .push_bind(&message.custom_hash)
                    .push_bind(feed_id.to_string());
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    // ========================================================================
    // Message Queries
    // ========================================================================

    /// Run a message view query and return every matching row, newest
    /// first.
    ///
    /// Large feed sets are queried in chunks and merged.
    pub async fn get_messages(&self, filter: &MessageFilter) -> Result<Vec<Message>> {
        let rows = match filter {
            MessageFilter::Feeds(ids) if ids.len() > ID_BATCH_SIZE => {
                let mut rows = Vec::new();
                for chunk in ids.chunks(ID_BATCH_SIZE) {
                    let part = MessageFilter::Feeds(chunk.to_vec());
                    rows.extend(self.query_messages(&part).await?);
                }
                rows.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
                rows
            }
            _ => self.query_messages(filter).await?,
        };
        tracing::debug!(?filter, rows = rows.len(), "Loaded message view");
        Ok(rows)
    }

    async fn query_messages(&self, filter: &MessageFilter) -> Result<Vec<Message>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM Messages", MESSAGE_COLUMNS));
        filter.push_where(&mut builder);
        builder.push(" ORDER BY date_created DESC, id DESC");

        Ok(builder.build_query_as().fetch_all(&self.pool).await?)
    }

    /// Non-deleted messages of the given feeds.
    pub async fn messages_for_feeds(&self, feed_ids: &[i64]) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        for chunk in feed_ids.chunks(ID_BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("SELECT {} FROM Messages", MESSAGE_COLUMNS));
            builder.push(" WHERE is_deleted = 0 AND feed IN ");
            push_id_list(&mut builder, chunk);
            builder.push(" ORDER BY id");

            let rows: Vec<Message> = builder.build_query_as().fetch_all(&self.pool).await?;
            messages.extend(rows);
        }
        messages.sort_by_key(|m| m.id);
        Ok(messages)
    }

    /// Unread/total counts of messages currently in the recycle bin.
    pub async fn recycle_bin_counts(&self) -> Result<MessageCounts> {
        let (unread, total): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(CASE WHEN is_read = 0 THEN 1 END), COUNT(*)
             FROM Messages WHERE is_deleted = 1 AND is_pdeleted = 0",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(MessageCounts { unread, total })
    }

    // ========================================================================
    // Message Mutations
    // ========================================================================

    /// Run `UPDATE Messages SET <assignment> WHERE id IN (...)` over all ids
    /// inside one transaction.
    async fn update_messages_by_id(&self, assignment: &str, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut changed = 0;

        for chunk in ids.chunks(ID_BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("UPDATE Messages SET {} WHERE id IN ", assignment));
            push_id_list(&mut builder, chunk);
            changed += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(changed)
    }

    /// Set the read flag of the given messages.
    pub async fn mark_messages_read(&self, ids: &[i64], read: bool) -> Result<u64> {
        let assignment = if read { "is_read = 1" } else { "is_read = 0" };
        self.update_messages_by_id(assignment, ids).await
    }

    /// Set the importance flag of a single message.
    pub async fn mark_message_important(&self, id: i64, important: bool) -> Result<()> {
        sqlx::query("UPDATE Messages SET is_important = ? WHERE id = ?")
            .bind(important)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Set the importance flag of each message to its paired value, in one
    /// transaction.
    pub async fn set_messages_importance(&self, changes: &[(i64, bool)]) -> Result<u64> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut changed = 0;

        for important in [true, false] {
            let ids: Vec<i64> = changes
                .iter()
                .filter(|&&(_, value)| value == important)
                .map(|&(id, _)| id)
                .collect();
            for chunk in ids.chunks(ID_BATCH_SIZE) {
                let mut builder: QueryBuilder<Sqlite> =
                    QueryBuilder::new("UPDATE Messages SET is_important = ");
                builder.push_bind(important);
                builder.push(" WHERE id IN ");
                push_id_list(&mut builder, chunk);
                changed += builder.build().execute(&mut *tx).await?.rows_affected();
            }
        }

        tx.commit().await?;
        Ok(changed)
    }

    /// Move messages into the recycle bin (`deleted = true`) or back out of it.
    pub async fn delete_or_restore_messages(&self, ids: &[i64], deleted: bool) -> Result<u64> {
        let assignment = if deleted {
            "is_deleted = 1"
        } else {
            "is_deleted = 0"
        };
        self.update_messages_by_id(assignment, ids).await
    }

    /// Purge messages from the recycle bin. Purged messages never show up
    /// in any view again.
    pub async fn permanently_delete_messages(&self, ids: &[i64]) -> Result<u64> {
        self.update_messages_by_id("is_pdeleted = 1", ids).await
    }

    // ========================================================================
    // Recycle Bin
    // ========================================================================

    /// Purge every message currently in the recycle bin.
    pub async fn empty_recycle_bin(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE Messages SET is_pdeleted = 1 WHERE is_deleted = 1 AND is_pdeleted = 0",
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Restore every message currently in the recycle bin, returning the
    /// ids of the feeds that received messages back.
    pub async fn restore_recycle_bin(&self) -> Result<Vec<i64>> {
        let mut tx = self.pool.begin().await?;

        let feeds: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT feed FROM Messages WHERE is_deleted = 1 AND is_pdeleted = 0",
        )
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("UPDATE Messages SET is_deleted = 0 WHERE is_deleted = 1 AND is_pdeleted = 0")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(feeds.into_iter().map(|(id,)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::MessageFilter;
    use crate::storage::{Database, FeedFormat, NewFeed, ParsedMessage, NO_PARENT_CATEGORY};

    async fn seeded_db(count: usize) -> (Database, i64, Vec<i64>) {
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
                created: 1_700_000_000_000 + i as i64,
                ..Default::default()
            })
            .collect();
        db.insert_messages(feed_id, &messages).await.unwrap();
        let ids = db
            .messages_for_feeds(&[feed_id])
            .await
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        (db, feed_id, ids)
    }

    #[tokio::test]
    async fn test_empty_filter_matches_nothing() {
        let (db, _feed, _ids) = seeded_db(3).await;
        assert!(db.get_messages(&MessageFilter::Empty).await.unwrap().is_empty());
        assert!(db
            .get_messages(&MessageFilter::Feeds(Vec::new()))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_feed_filter_orders_newest_first() {
        let (db, feed, _ids) = seeded_db(3).await;
        let rows = db.get_messages(&MessageFilter::Feeds(vec![feed])).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].title, "Message 2");
        assert_eq!(rows[0].custom_feed_id, feed.to_string());
    }

    #[tokio::test]
    async fn test_feed_filter_merges_chunks_newest_first() {
        let db = Database::open(":memory:").await.unwrap();
        let mut feeds = Vec::new();
        for i in 0..5i64 {
            let url = format!("https://feed{}.example.com/rss", i);
            let feed = db
                .insert_feed(&NewFeed {
                    title: "Feed",
                    description: "",
                    icon: None,
                    category: NO_PARENT_CATEGORY,
                    encoding: "UTF-8",
                    url: &url,
                    format: FeedFormat::Atom10,
                    update_type: 0,
                    update_interval: 15,
                })
                .await
                .unwrap();
            // Later feeds get older messages so chunk order differs from date order
            let message = ParsedMessage {
                title: format!("Message {}", i),
                created: 1_700_000_000_000 - i * 1000,
                ..Default::default()
            };
            db.insert_messages(feed, &[message]).await.unwrap();
            feeds.push(feed);
        }
        feeds.reverse();

        let rows = db.get_messages(&MessageFilter::Feeds(feeds)).await.unwrap();
        let titles: Vec<&str> = rows.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Message 0", "Message 1", "Message 2", "Message 3", "Message 4"]
        );
    }

    #[tokio::test]
    async fn test_soft_delete_moves_to_bin_and_restore_returns() {
        let (db, feed, ids) = seeded_db(3).await;

        db.delete_or_restore_messages(&ids[..2], true).await.unwrap();
        let visible = db.get_messages(&MessageFilter::Feeds(vec![feed])).await.unwrap();
        let bin = db.get_messages(&MessageFilter::RecycleBin).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(bin.len(), 2);

        let restored_feeds = db.restore_recycle_bin().await.unwrap();
        assert_eq!(restored_feeds, vec![feed]);
        assert!(db.get_messages(&MessageFilter::RecycleBin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_is_irreversible() {
        let (db, feed, ids) = seeded_db(2).await;

        db.delete_or_restore_messages(&ids, true).await.unwrap();
        db.permanently_delete_messages(&ids[..1]).await.unwrap();
        assert_eq!(db.recycle_bin_counts().await.unwrap().total, 1);

        // Restoring flips is_deleted but purged rows stay hidden
        db.delete_or_restore_messages(&ids, false).await.unwrap();
        let visible = db.get_messages(&MessageFilter::Feeds(vec![feed])).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, ids[1]);
    }

    #[tokio::test]
    async fn test_empty_recycle_bin() {
        let (db, _feed, ids) = seeded_db(4).await;
        db.delete_or_restore_messages(&ids[..3], true).await.unwrap();

        assert_eq!(db.empty_recycle_bin().await.unwrap(), 3);
        assert_eq!(db.recycle_bin_counts().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_set_importance_writes_each_target() {
        let (db, feed, ids) = seeded_db(4).await;
        db.mark_message_important(ids[0], true).await.unwrap();
        db.mark_message_important(ids[1], true).await.unwrap();

        // Setting an already-set value leaves it alone instead of flipping it
        let changes = [(ids[0], false), (ids[1], true), (ids[2], true), (ids[3], false)];
        db.set_messages_importance(&changes).await.unwrap();

        let rows = db.messages_for_feeds(&[feed]).await.unwrap();
        let important: Vec<bool> = ids
            .iter()
            .map(|id| rows.iter().find(|m| m.id == *id).unwrap().is_important)
            .collect();
        assert_eq!(important, vec![false, true, true, false]);
    }
}

use anyhow::{bail, Result};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashMap;

use super::schema::Database;
use super::types::{FeedRow, MessageCounts, NewFeed};
use super::{push_id_list, ID_BATCH_SIZE};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a feed row, returning its new id.
    ///
    /// A feed URL is unique within its category.
    pub async fn insert_feed(&self, feed: &NewFeed<'_>) -> Result<i64> {
        let title = crate::util::strip_control_chars(feed.title);
        let title = title.trim();
        if title.is_empty() {
            bail!("Feed title cannot be empty or whitespace-only");
        }
        let now = chrono::Utc::now().timestamp_millis();

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO Feeds (title, description, date_created, icon, category, encoding,
                               url, type, update_type, update_interval)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(title)
        .bind(feed.description)
        .bind(now)
        .bind(feed.icon)
        .bind(feed.category)
        .bind(feed.encoding)
        .bind(feed.url)
        .bind(feed.format.code())
        .bind(feed.update_type)
        .bind(feed.update_interval)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Delete a feed together with all of its messages, returning the
    /// number of messages removed.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let messages = sqlx::query("DELETE FROM Messages WHERE feed = ?")
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;

        let feeds = sqlx::query("DELETE FROM Feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;

        if feeds.rows_affected() == 0 {
            bail!("Feed {} does not exist", feed_id);
        }

        tx.commit().await?;
        Ok(messages.rows_affected())
    }

    /// Persistently move a feed to another category.
    pub async fn move_feed_to_category(&self, feed_id: i64, category: i64) -> Result<()> {
        sqlx::query("UPDATE Feeds SET category = ? WHERE id = ?")
            .bind(category)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist a feed's auto-update policy.
    pub async fn set_feed_auto_update(
        &self,
        feed_id: i64,
        update_type: i64,
        update_interval: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE Feeds SET update_type = ?, update_interval = ? WHERE id = ?")
            .bind(update_type)
            .bind(update_interval.max(1))
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Full scan of the `Feeds` table, in insertion order.
    pub async fn get_all_feeds(&self) -> Result<Vec<FeedRow>> {
        let rows = sqlx::query_as::<_, FeedRow>(
            r#"
            SELECT id, title, description, date_created, icon, category, encoding, url,
                   type, update_type, update_interval
            FROM Feeds
            ORDER BY id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Unread/total counts of visible (not deleted) messages per feed.
    ///
    /// Feeds without messages are absent from the map.
    pub async fn get_message_counts(&self, feed_ids: &[i64]) -> Result<HashMap<i64, MessageCounts>> {
        let mut counts = HashMap::with_capacity(feed_ids.len());

        for chunk in feed_ids.chunks(ID_BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT feed, COUNT(CASE WHEN is_read = 0 THEN 1 END), COUNT(*)
                 FROM Messages WHERE is_deleted = 0 AND is_pdeleted = 0 AND feed IN ",
            );
            push_id_list(&mut builder, chunk);
            builder.push(" GROUP BY feed");

            let rows: Vec<(i64, i64, i64)> =
                builder.build_query_as().fetch_all(&self.pool).await?;
            for (feed, unread, total) in rows {
                counts.insert(feed, MessageCounts { unread, total });
            }
        }

        Ok(counts)
    }

    // ========================================================================
    // Bulk Feed Mutations
    // ========================================================================

    /// Set `is_read` on every non-deleted message of the given feeds.
    ///
    /// Runs in one transaction; on any failure nothing is changed.
    pub async fn mark_feeds_read(&self, feed_ids: &[i64], read: bool) -> Result<u64> {
        if feed_ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut changed = 0;

        for chunk in feed_ids.chunks(ID_BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("UPDATE Messages SET is_read = ");
            builder.push_bind(read);
            builder.push(" WHERE is_deleted = 0 AND feed IN ");
            push_id_list(&mut builder, chunk);

            changed += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(changed)
    }

    /// Set `is_deleted` on the non-deleted messages of the given feeds,
    /// optionally only on those already read.
    ///
    /// Runs in one transaction; on any failure nothing is changed.
    pub async fn mark_feeds_deleted(
        &self,
        feed_ids: &[i64],
        deleted: bool,
        read_only: bool,
    ) -> Result<u64> {
        if feed_ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut changed = 0;

        for chunk in feed_ids.chunks(ID_BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("UPDATE Messages SET is_deleted = ");
            builder.push_bind(deleted);
            builder.push(" WHERE is_deleted = 0");
            if read_only {
                builder.push(" AND is_read = 1");
            }
            builder.push(" AND feed IN ");
            push_id_list(&mut builder, chunk);

            changed += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(changed)
    }
}

use anyhow::{bail, Result};
use sqlx::{QueryBuilder, Sqlite};

use super::push_id_list;
use super::schema::Database;
use super::types::CategoryRow;
use crate::util::strip_control_chars;

impl Database {
    // ========================================================================
    // Category Operations
    // ========================================================================

    /// Sanitize and validate a category title.
    ///
    /// Strips control characters, trims whitespace and rejects empty titles.
    fn sanitize_category_title(title: &str) -> Result<String> {
        let sanitized = strip_control_chars(title);
        let trimmed = sanitized.trim();
        if trimmed.is_empty() {
            bail!("Category title cannot be empty or whitespace-only");
        }
        Ok(trimmed.to_owned())
    }

    /// Insert a category under `parent_id`, returning its new id.
    ///
    /// Titles are unique per parent; inserting a duplicate fails with a
    /// constraint error, which the import merge relies on.
    pub async fn insert_category(
        &self,
        title: &str,
        description: &str,
        icon: Option<&str>,
        parent_id: i64,
    ) -> Result<i64> {
        let clean_title = Self::sanitize_category_title(title)?;
        let now = chrono::Utc::now().timestamp_millis();

        let row: (i64,) = sqlx::query_as(
            "INSERT INTO Categories (parent_id, title, description, date_created, icon)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(parent_id)
        .bind(&clean_title)
        .bind(description)
        .bind(now)
        .bind(icon)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Persistently re-parent a category.
    pub async fn move_category(&self, id: i64, parent_id: i64) -> Result<()> {
        sqlx::query("UPDATE Categories SET parent_id = ? WHERE id = ?")
            .bind(parent_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a whole category subtree in one transaction.
    ///
    /// `category_ids` and `feed_ids` must cover the full subtree; the rows
    /// and all messages of the listed feeds are removed together.
    pub async fn delete_category_subtree(
        &self,
        category_ids: &[i64],
        feed_ids: &[i64],
    ) -> Result<()> {
        if category_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        if !feed_ids.is_empty() {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM Messages WHERE feed IN ");
            push_id_list(&mut builder, feed_ids);
            builder.build().execute(&mut *tx).await?;

            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM Feeds WHERE id IN ");
            push_id_list(&mut builder, feed_ids);
            builder.build().execute(&mut *tx).await?;
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM Categories WHERE id IN ");
        push_id_list(&mut builder, category_ids);
        let result = builder.build().execute(&mut *tx).await?;

        if result.rows_affected() == 0 {
            // Nothing matched, so the in-memory tree disagrees with storage.
            bail!("Category {} does not exist", category_ids[0]);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Full scan of the `Categories` table, in insertion order.
    pub async fn get_all_categories(&self) -> Result<Vec<CategoryRow>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, parent_id, title, description, date_created, icon
             FROM Categories ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, NO_PARENT_CATEGORY};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_category() {
        let db = test_db().await;

        let id = db
            .insert_category("Tech", "", None, NO_PARENT_CATEGORY)
            .await
            .unwrap();
        assert!(id > 0);

        let categories = db.get_all_categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].title, "Tech");
        assert_eq!(categories[0].parent_id, NO_PARENT_CATEGORY);
    }

    #[tokio::test]
    async fn test_duplicate_title_under_same_parent_rejected() {
        let db = test_db().await;

        db.insert_category("News", "", None, NO_PARENT_CATEGORY)
            .await
            .unwrap();
        let result = db.insert_category("News", "", None, NO_PARENT_CATEGORY).await;
        assert!(result.is_err());

        // Same title under another parent is fine
        let other = db
            .insert_category("Other", "", None, NO_PARENT_CATEGORY)
            .await
            .unwrap();
        assert!(db.insert_category("News", "", None, other).await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_category_strips_control_chars() {
        let db = test_db().await;

        let id = db
            .insert_category("\x1b[31mEvil\x1b[0m", "", None, NO_PARENT_CATEGORY)
            .await
            .unwrap();
        let categories = db.get_all_categories().await.unwrap();
        let cat = categories.iter().find(|c| c.id == id).unwrap();
        assert_eq!(cat.title, "Evil");
    }

    #[tokio::test]
    async fn test_insert_category_rejects_whitespace_only() {
        let db = test_db().await;

        let result = db.insert_category("   ", "", None, NO_PARENT_CATEGORY).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[tokio::test]
    async fn test_move_category() {
        let db = test_db().await;

        let a = db
            .insert_category("A", "", None, NO_PARENT_CATEGORY)
            .await
            .unwrap();
        let b = db
            .insert_category("B", "", None, NO_PARENT_CATEGORY)
            .await
            .unwrap();

        db.move_category(b, a).await.unwrap();

        let categories = db.get_all_categories().await.unwrap();
        let moved = categories.iter().find(|c| c.id == b).unwrap();
        assert_eq!(moved.title, "B");
        assert_eq!(moved.parent_id, a);
    }

    #[tokio::test]
    async fn test_delete_missing_category_fails() {
        let db = test_db().await;

        let result = db.delete_category_subtree(&[42], &[]).await;
        assert!(result.is_err());
    }
}

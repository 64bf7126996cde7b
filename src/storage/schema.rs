use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another instance has the
    /// database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // Create the file with user-only permissions before SQLite touches it
        #[cfg(unix)]
        if path != ":memory:" {
            let db_path = std::path::Path::new(path);
            if !db_path.exists() && db_path.parent().is_some_and(|p| p.exists()) {
                use std::os::unix::fs::OpenOptionsExt;
                let _file = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(db_path)
                    .ok(); // SQLite reports the real error at connect_with.
            }
        }

        // busy_timeout=5000: wait up to 5 seconds for locks before SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000")
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            let error_string = e.to_string().to_lowercase();
            if error_string.contains("database is locked")
                || error_string.contains("database table is locked")
                || error_string.contains("sqlite_busy")
                || error_string.contains("sqlite_locked")
            {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op. A failure rolls the whole schema back.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Categories (
                id INTEGER PRIMARY KEY,
                parent_id INTEGER NOT NULL,
                title TEXT NOT NULL CHECK (title != ''),
                description TEXT NOT NULL DEFAULT '',
                date_created INTEGER NOT NULL,
                icon TEXT,
                account_id INTEGER NOT NULL DEFAULT 0,
                custom_id TEXT,
                UNIQUE (parent_id, title)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Feeds (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL CHECK (title != ''),
                description TEXT NOT NULL DEFAULT '',
                date_created INTEGER NOT NULL,
                icon TEXT,
                category INTEGER NOT NULL CHECK (category >= -1),
                encoding TEXT NOT NULL DEFAULT 'UTF-8',
                url TEXT NOT NULL CHECK (url != ''),
                type INTEGER NOT NULL CHECK (type >= 0),
                update_type INTEGER NOT NULL CHECK (update_type >= 0),
                update_interval INTEGER NOT NULL DEFAULT 15 CHECK (update_interval >= 1),
                account_id INTEGER NOT NULL DEFAULT 0,
                custom_id TEXT,
                UNIQUE (category, url)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Messages (
                id INTEGER PRIMARY KEY,
                is_read INTEGER NOT NULL DEFAULT 0 CHECK (is_read >= 0 AND is_read <= 1),
                is_deleted INTEGER NOT NULL DEFAULT 0 CHECK (is_deleted >= 0 AND is_deleted <= 1),
                is_important INTEGER NOT NULL DEFAULT 0 CHECK (is_important >= 0 AND is_important <= 1),
                feed INTEGER NOT NULL,
                title TEXT NOT NULL CHECK (title != ''),
                url TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT '',
                date_created INTEGER NOT NULL CHECK (date_created != 0),
                contents TEXT NOT NULL DEFAULT '',
                is_pdeleted INTEGER NOT NULL DEFAULT 0 CHECK (is_pdeleted >= 0 AND is_pdeleted <= 1),
                account_id INTEGER NOT NULL DEFAULT 0,
                custom_id TEXT NOT NULL DEFAULT '',
                custom_hash TEXT NOT NULL DEFAULT '',
                custom_feed_id TEXT NOT NULL DEFAULT ''
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Message views filter by feed set plus deleted flags
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_feed_deleted ON Messages(feed, is_deleted, is_pdeleted)",
        )
        .execute(&mut *tx)
        .await?;

        // Unread counts per feed
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_feed_read ON Messages(feed, is_read)")
            .execute(&mut *tx)
            .await?;

        // Recycle bin view and purge
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_bin ON Messages(is_deleted, is_pdeleted)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}

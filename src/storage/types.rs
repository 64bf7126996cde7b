use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of feedtree appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Constants
// ============================================================================

/// Parent id stored for top-level categories and feeds.
pub const NO_PARENT_CATEGORY: i64 = -1;

/// Id assigned to in-memory items that have no persistent row.
pub const NO_ID: i64 = 0;

// ============================================================================
// Feed Encoding Codes
// ============================================================================

/// Syndication format of a standard feed, stored as `Feeds.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FeedFormat {
    Rss0X,
    Rss2X,
    Rdf,
    Atom10,
}

impl FeedFormat {
    pub fn code(self) -> i64 {
        match self {
            FeedFormat::Rss0X => 0,
            FeedFormat::Rss2X => 1,
            FeedFormat::Rdf => 2,
            FeedFormat::Atom10 => 3,
        }
    }

    /// Returns `None` for codes this reader cannot handle; such rows are skipped at load.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(FeedFormat::Rss0X),
            1 => Some(FeedFormat::Rss2X),
            2 => Some(FeedFormat::Rdf),
            3 => Some(FeedFormat::Atom10),
            _ => None,
        }
    }
}

/// Auto-update policy code stored as `Feeds.update_type`.
pub(crate) const UPDATE_TYPE_DEFAULT: i64 = 0;
pub(crate) const UPDATE_TYPE_SPECIFIC: i64 = 1;
pub(crate) const UPDATE_TYPE_NEVER: i64 = 2;

// ============================================================================
// Row Types
// ============================================================================

/// Raw `Categories` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub parent_id: i64,
    pub title: String,
    pub description: String,
    pub date_created: i64,
    pub icon: Option<String>,
}

/// Raw `Feeds` row. `type_code` and `update_type` are decoded by the core.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub date_created: i64,
    pub icon: Option<String>,
    pub category: i64,
    pub encoding: String,
    pub url: String,
    #[sqlx(rename = "type")]
    pub type_code: i64,
    pub update_type: i64,
    pub update_interval: i64,
}

/// Values needed to insert a new feed row.
#[derive(Debug, Clone)]
pub struct NewFeed<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub icon: Option<&'a str>,
    pub category: i64,
    pub encoding: &'a str,
    pub url: &'a str,
    pub format: FeedFormat,
    pub update_type: i64,
    pub update_interval: i64,
}

/// A message as produced by a feed parser, before it has a row id.
#[derive(Debug, Clone, Default)]
pub struct ParsedMessage {
    pub title: String,
    pub url: String,
    pub author: String,
    /// Milliseconds since the Unix epoch.
    pub created: i64,
    pub contents: String,
    pub custom_id: String,
    pub custom_hash: String,
}

/// A stored message.
///
/// Only `is_read`, `is_important`, `is_deleted` and `is_pdeleted` change after
/// insertion, and only through the messages model.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub is_read: bool,
    pub is_deleted: bool,
    pub is_important: bool,
    #[sqlx(rename = "feed")]
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub author: String,
    /// Milliseconds since the Unix epoch.
    #[sqlx(rename = "date_created")]
    pub created: i64,
    pub contents: String,
    pub is_pdeleted: bool,
    pub account_id: i64,
    pub custom_id: String,
    pub custom_hash: String,
    pub custom_feed_id: String,
}

/// Unread/total message counts for one feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageCounts {
    pub unread: i64,
    pub total: i64,
}

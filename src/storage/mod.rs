mod categories;
mod feeds;
mod messages;
mod schema;
mod types;

pub use messages::MessageFilter;
pub use schema::Database;
pub use types::{
    CategoryRow, DatabaseError, FeedFormat, FeedRow, Message, MessageCounts, NewFeed,
    ParsedMessage, NO_ID, NO_PARENT_CATEGORY,
};
pub(crate) use types::{UPDATE_TYPE_DEFAULT, UPDATE_TYPE_NEVER, UPDATE_TYPE_SPECIFIC};

use sqlx::{QueryBuilder, Sqlite};

/// Keeps `IN (...)` lists well under SQLite's bound-parameter limit.
#[cfg(not(test))]
pub(crate) const ID_BATCH_SIZE: usize = 500;

/// Small enough that unit tests cross chunk boundaries with a few feeds.
#[cfg(test)]
pub(crate) const ID_BATCH_SIZE: usize = 2;

/// Append `(id, id, ...)` with every id bound as a parameter.
pub(crate) fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

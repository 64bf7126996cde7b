//! Feed reader core: a category/feed tree kept in step with SQLite and a
//! message table with optimistic, staged edits.

pub mod config;
pub mod model;
pub mod storage;
pub mod util;

//! In-memory models over the feed store.
//!
//! - [`FeedsModel`]: the category/feed tree, its recycle bin and the
//!   auto-update scheduler
//! - [`MessagesModel`]: the message table of the selected tree item, with
//!   staged edits layered over the stored rows
//! - Import/export: merging candidate trees into the live tree

pub mod auto_update;
mod error;
mod events;
mod feeds_model;
mod import_export;
pub mod item;
mod message_row;
mod messages_cache;
mod messages_model;
mod service;

pub use auto_update::{FeedUpdateLock, GlobalAutoUpdate};
pub use error::{MessageOpError, TreeError};
pub use events::{TableEvent, TreeEvent};
pub use feeds_model::{FeedsModel, DEFAULT_AUTO_UPDATE_INTERVAL};
pub use import_export::{ImportItem, ImportKind, ImportTree, MergeReport};
pub use item::{
    AutoUpdate, CategoryDraft, FeedData, FeedDraft, FeedStatus, Item, ItemKind, ItemPayload,
    ItemTree, NodeId,
};
pub use message_row::{
    DataRole, FontStyle, HighlightColor, Importance, MessageColumn, MessageHighlighter,
    MessageIcon, ReadStatus, RoleData, Value,
};
pub use messages_cache::MessagesCache;
pub use messages_model::{HeaderData, MessagesModel};
pub use service::{LoadedItem, ServiceRoot, StandardServiceRoot};

use thiserror::Error;

use crate::util::UrlValidationError;

/// Errors from structural operations on the feeds model.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Reading the tree from storage failed. The model is unusable.
    #[error("Failed to load feeds from storage: {0}")]
    Load(#[source] anyhow::Error),

    /// A storage write was rejected; the in-memory tree is unchanged.
    #[error("Storage operation failed: {0}")]
    Storage(#[from] anyhow::Error),

    /// The target parent cannot hold the item (not a container, or the move
    /// would create a cycle).
    #[error("Item cannot be placed under this parent")]
    InvalidParent,

    /// The root and the recycle bin are permanent.
    #[error("Item cannot be removed")]
    NotRemovable,

    /// The node id does not refer to a live item.
    #[error("Unknown item")]
    UnknownNode,

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),

    /// A feed update holds the update lock; structural edits must wait.
    #[error("A feed update is in progress")]
    UpdateInProgress,
}

/// Errors from message table mutations.
#[derive(Debug, Error)]
pub enum MessageOpError {
    #[error("No item is loaded")]
    NoItemLoaded,

    #[error("Row {0} is out of range")]
    RowOutOfRange(usize),

    /// A pre-mutation hook refused the change. Nothing was staged.
    #[error("Change was refused by the item's service")]
    Vetoed,

    /// The storage write failed after the change was staged in the overlay.
    #[error("Storage operation failed: {0}")]
    Storage(#[from] anyhow::Error),

    /// The change was committed but the post-mutation hook reported failure.
    #[error("Post-commit hook failed")]
    HookFailed,
}

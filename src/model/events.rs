//! Change notifications emitted by the models.
//!
//! A model holds at most one subscriber. Events are fire-and-forget: a
//! dropped receiver never fails a model operation.

use tokio::sync::mpsc;

use super::item::NodeId;
use super::message_row::DataRole;

/// Feed tree notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// Rows `first..=last` were inserted under `parent`.
    RowsInserted {
        parent: NodeId,
        first: usize,
        last: usize,
    },
    /// Rows `first..=last` were removed from `parent`.
    RowsRemoved {
        parent: NodeId,
        first: usize,
        last: usize,
    },
    /// Display data (title, counts, status) of a node changed.
    DataChanged { node: NodeId },
    LayoutAboutToBeChanged,
    LayoutChanged,
    /// The auto-update scheduler selected these feeds for fetching.
    FeedsUpdateRequested(Vec<NodeId>),
}

/// Message table notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEvent {
    /// Rows `first..=last` changed. `None` roles means every role.
    DataChanged {
        first: usize,
        last: usize,
        roles: Option<Vec<DataRole>>,
    },
    LayoutAboutToBeChanged,
    LayoutChanged,
    /// The table was re-queried from storage.
    Reset,
    /// Item-specific loading failed and an empty table was shown instead.
    ItemLoadFailed { title: String },
}

#[derive(Debug)]
pub(crate) struct EventSink<E> {
    tx: Option<mpsc::UnboundedSender<E>>,
}

impl<E> Default for EventSink<E> {
    fn default() -> Self {
        Self { tx: None }
    }
}

impl<E: std::fmt::Debug> EventSink<E> {
    /// Replace any previous subscriber.
    pub(crate) fn subscribe(&mut self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        rx
    }

    pub(crate) fn emit(&self, event: E) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.send(event) {
                tracing::trace!(event = ?e.0, "Event subscriber gone");
            }
        }
    }
}

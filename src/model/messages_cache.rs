use std::collections::HashMap;

use super::message_row::{MessageColumn, Value};

/// Staged cell edits layered over the rows loaded from storage.
///
/// Entries live until the next repopulate, which clears the whole overlay.
#[derive(Debug, Default)]
pub struct MessagesCache {
    cells: HashMap<(usize, MessageColumn), Value>,
}

impl MessagesCache {
    pub fn get(&self, row: usize, column: MessageColumn) -> Option<&Value> {
        self.cells.get(&(row, column))
    }

    pub fn set(&mut self, row: usize, column: MessageColumn, value: Value) {
        self.cells.insert((row, column), value);
    }

    pub fn contains_row(&self, row: usize) -> bool {
        self.cells.keys().any(|&(r, _)| r == row)
    }

    /// Staged cells of one row.
    pub fn row_cells(&self, row: usize) -> impl Iterator<Item = (MessageColumn, &Value)> {
        self.cells
            .iter()
            .filter(move |((r, _), _)| *r == row)
            .map(|((_, column), value)| (*column, value))
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }
}

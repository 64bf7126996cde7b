//! Column and cell vocabulary of the message table.

use serde::{Deserialize, Serialize};

use crate::storage::Message;

/// Columns of the message table, in storage column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageColumn {
    Id,
    Read,
    Deleted,
    Important,
    Feed,
    Title,
    Url,
    Author,
    DateCreated,
    Contents,
    PDeleted,
    AccountId,
    CustomId,
    CustomHash,
    CustomFeedId,
}

impl MessageColumn {
    pub const ALL: [MessageColumn; 15] = [
        MessageColumn::Id,
        MessageColumn::Read,
        MessageColumn::Deleted,
        MessageColumn::Important,
        MessageColumn::Feed,
        MessageColumn::Title,
        MessageColumn::Url,
        MessageColumn::Author,
        MessageColumn::DateCreated,
        MessageColumn::Contents,
        MessageColumn::PDeleted,
        MessageColumn::AccountId,
        MessageColumn::CustomId,
        MessageColumn::CustomHash,
        MessageColumn::CustomFeedId,
    ];

    pub fn title(self) -> &'static str {
        match self {
            MessageColumn::Id => "Id",
            MessageColumn::Read => "Read",
            MessageColumn::Deleted => "Deleted",
            MessageColumn::Important => "Important",
            MessageColumn::Feed => "Feed",
            MessageColumn::Title => "Title",
            MessageColumn::Url => "Url",
            MessageColumn::Author => "Author",
            MessageColumn::DateCreated => "Created on",
            MessageColumn::Contents => "Contents",
            MessageColumn::PDeleted => "Permanently deleted",
            MessageColumn::AccountId => "Account ID",
            MessageColumn::CustomId => "Custom ID",
            MessageColumn::CustomHash => "Custom hash",
            MessageColumn::CustomFeedId => "Custom feed ID",
        }
    }

    pub fn tooltip(self) -> &'static str {
        match self {
            MessageColumn::Id => "Id of the message.",
            MessageColumn::Read => "Is message read?",
            MessageColumn::Deleted => "Is message deleted?",
            MessageColumn::Important => "Is message important?",
            MessageColumn::Feed => "Id of feed which this message belongs to.",
            MessageColumn::Title => "Title of the message.",
            MessageColumn::Url => "Url of the message.",
            MessageColumn::Author => "Author of the message.",
            MessageColumn::DateCreated => "Creation date of the message.",
            MessageColumn::Contents => "Contents of the message.",
            MessageColumn::PDeleted => "Is message permanently deleted from recycle bin?",
            MessageColumn::AccountId => "Account ID of the message.",
            MessageColumn::CustomId => "Custom ID of the message",
            MessageColumn::CustomHash => "Custom hash of the message.",
            MessageColumn::CustomFeedId => "Custom ID of feed of the message.",
        }
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

impl Value {
    /// Numeric view of the value; text and null read as 0.
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Integer(v) => *v,
            Value::Null | Value::Text(_) => 0,
        }
    }

    pub fn as_bool(&self) -> bool {
        self.as_i64() != 0
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

/// Read state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Unread,
    Read,
}

impl From<bool> for ReadStatus {
    fn from(read: bool) -> Self {
        if read {
            ReadStatus::Read
        } else {
            ReadStatus::Unread
        }
    }
}

impl From<ReadStatus> for bool {
    fn from(status: ReadStatus) -> Self {
        status == ReadStatus::Read
    }
}

/// Importance of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importance {
    NotImportant,
    Important,
}

impl Importance {
    pub fn toggled(self) -> Self {
        match self {
            Importance::Important => Importance::NotImportant,
            Importance::NotImportant => Importance::Important,
        }
    }
}

impl From<bool> for Importance {
    fn from(important: bool) -> Self {
        if important {
            Importance::Important
        } else {
            Importance::NotImportant
        }
    }
}

impl From<Importance> for bool {
    fn from(importance: Importance) -> Self {
        importance == Importance::Important
    }
}

/// Which rows the table draws in the highlight color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageHighlighter {
    #[default]
    #[serde(rename = "none")]
    NoHighlighting,
    #[serde(rename = "important")]
    HighlightImportant,
    #[serde(rename = "unread")]
    HighlightUnread,
}

/// Presentation channel of a cell read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataRole {
    Display,
    Edit,
    Font,
    Foreground,
    Decoration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FontStyle {
    pub bold: bool,
    pub strike_out: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightColor {
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageIcon {
    Read,
    Unread,
    Important,
}

/// Result of a cell read for one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleData {
    None,
    Value(Value),
    Font(FontStyle),
    Foreground(HighlightColor),
    Icon(MessageIcon),
}

impl Message {
    /// Raw stored value of one column.
    pub fn value(&self, column: MessageColumn) -> Value {
        match column {
            MessageColumn::Id => self.id.into(),
            MessageColumn::Read => self.is_read.into(),
            MessageColumn::Deleted => self.is_deleted.into(),
            MessageColumn::Important => self.is_important.into(),
            MessageColumn::Feed => self.feed_id.into(),
            MessageColumn::Title => Value::Text(self.title.clone()),
            MessageColumn::Url => Value::Text(self.url.clone()),
            MessageColumn::Author => Value::Text(self.author.clone()),
            MessageColumn::DateCreated => self.created.into(),
            MessageColumn::Contents => Value::Text(self.contents.clone()),
            MessageColumn::PDeleted => self.is_pdeleted.into(),
            MessageColumn::AccountId => self.account_id.into(),
            MessageColumn::CustomId => Value::Text(self.custom_id.clone()),
            MessageColumn::CustomHash => Value::Text(self.custom_hash.clone()),
            MessageColumn::CustomFeedId => Value::Text(self.custom_feed_id.clone()),
        }
    }

    /// Overwrite one column with a staged value.
    pub fn apply(&mut self, column: MessageColumn, value: &Value) {
        let text = |v: &Value| match v {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Null => String::new(),
        };

        match column {
            MessageColumn::Id => self.id = value.as_i64(),
            MessageColumn::Read => self.is_read = value.as_bool(),
            MessageColumn::Deleted => self.is_deleted = value.as_bool(),
            MessageColumn::Important => self.is_important = value.as_bool(),
            MessageColumn::Feed => self.feed_id = value.as_i64(),
            MessageColumn::Title => self.title = text(value),
            MessageColumn::Url => self.url = text(value),
            MessageColumn::Author => self.author = text(value),
            MessageColumn::DateCreated => self.created = value.as_i64(),
            MessageColumn::Contents => self.contents = text(value),
            MessageColumn::PDeleted => self.is_pdeleted = value.as_bool(),
            MessageColumn::AccountId => self.account_id = value.as_i64(),
            MessageColumn::CustomId => self.custom_id = text(value),
            MessageColumn::CustomHash => self.custom_hash = text(value),
            MessageColumn::CustomFeedId => self.custom_feed_id = text(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_columns_follow_declaration_order() {
        for (i, column) in MessageColumn::ALL.iter().enumerate() {
            assert_eq!(*column as usize, i);
        }
    }

    #[test]
    fn test_value_coercion() {
        assert!(Value::from(true).as_bool());
        assert_eq!(Value::Null.as_i64(), 0);
        assert_eq!(Value::from("x").as_i64(), 0);
    }

    #[test]
    fn test_importance_toggle() {
        assert_eq!(Importance::Important.toggled(), Importance::NotImportant);
        assert!(bool::from(Importance::NotImportant.toggled()));
    }

    #[test]
    fn test_highlighter_parses_from_config_names() {
        #[derive(Deserialize)]
        struct Holder {
            mode: MessageHighlighter,
        }
        let h: Holder = toml::from_str("mode = \"unread\"").unwrap();
        assert_eq!(h.mode, MessageHighlighter::HighlightUnread);
    }
}

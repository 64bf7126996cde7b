//! Utility functions for common operations.
//!
//! - **Text**: control-character stripping for titles, width-aware
//!   truncation for terminal output, timestamp formatting for message views
//! - **URL validation**: feed source URLs are checked before they are stored

mod text;
mod url_validator;

pub use text::{format_timestamp, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_feed_url, UrlValidationError};

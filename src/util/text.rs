use std::borrow::Cow;

use chrono::{DateTime, Local, Utc};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Strip control characters and ANSI escape sequences from user-visible text.
///
/// Titles come from remote feeds and imported files; they end up in terminal
/// output and in `UNIQUE(parent_id, title)` comparisons, so both must agree
/// on the cleaned form.
///
/// Keeps tab, newline and carriage return. Returns `Cow::Borrowed` when there
/// is nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_stripped = |c: char| {
        c == '\u{1b}' || c == '\u{7f}' || (c < ' ' && c != '\t' && c != '\n' && c != '\r')
    };

    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            if !is_stripped(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            // CSI: ESC [ ... final byte in 0x40..=0x7e
            Some('[') => {
                chars.next();
                for c in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&c) {
                        break;
                    }
                }
            }
            // OSC: ESC ] ... terminated by BEL or ESC \
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\u{07}' {
                        break;
                    }
                    if c == '\u{1b}' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}

/// Truncate `s` to at most `max_width` terminal columns, appending `...`
/// when something was cut.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    const ELLIPSIS: &str = "...";

    if UnicodeWidthStr::width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let budget = max_width.saturating_sub(ELLIPSIS.len());
    let mut width = 0;
    let mut out = String::new();
    for c in s.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + w > budget {
            break;
        }
        width += w;
        out.push(c);
    }

    if max_width >= ELLIPSIS.len() {
        out.push_str(ELLIPSIS);
    }
    Cow::Owned(out)
}

/// Format a millisecond Unix timestamp in local time.
///
/// `custom_format` is a chrono strftime pattern; without it the short
/// `%Y-%m-%d %H:%M` form is used. Out-of-range timestamps render as `-`.
pub fn format_timestamp(millis: i64, custom_format: Option<&str>) -> String {
    let Some(utc) = DateTime::<Utc>::from_timestamp_millis(millis) else {
        return "-".to_string();
    };
    let local = utc.with_timezone(&Local);

    match custom_format {
        Some(fmt) if !fmt.is_empty() => local.format(fmt).to_string(),
        _ => local.format("%Y-%m-%d %H:%M").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_clean_text_borrows() {
        assert!(matches!(strip_control_chars("Plain title"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_ansi_sequences() {
        assert_eq!(strip_control_chars("\x1b[1;31mRed\x1b[0m"), "Red");
        assert_eq!(strip_control_chars("a\x1b]0;title\x07b"), "ab");
        assert_eq!(strip_control_chars("a\x1b]0;title\x1b\\b"), "ab");
    }

    #[test]
    fn test_strip_keeps_whitespace_controls() {
        assert_eq!(strip_control_chars("a\tb\nc\x00d\x7f"), "a\tb\ncd");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("a long title", 8), "a lon...");
        assert_eq!(truncate_to_width("abcdef", 2), "");
    }

    #[test]
    fn test_format_timestamp_custom() {
        let formatted = format_timestamp(0, Some("%Y"));
        // Local offset can move the epoch into 1969
        assert!(formatted == "1970" || formatted == "1969");
    }

    #[test]
    fn test_format_timestamp_out_of_range() {
        assert_eq!(format_timestamp(i64::MAX, None), "-");
    }
}

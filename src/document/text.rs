//! Line-ending and length helpers.
//!
//! The live buffer always holds LF line endings; files on disk hold CRLF.

use std::borrow::Cow;

/// Strip the carriage return from every CRLF pair.
///
/// Lone CRs are left alone.
pub fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains("\r\n") {
        Cow::Owned(text.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Expand every LF into CRLF for writing to disk.
pub fn to_crlf(text: &str) -> String {
    text.replace('\n', "\r\n")
}

/// Length in characters, the unit host offsets use.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_crlf_only() {
        assert_eq!(normalize_newlines("a\r\nb\nc\rd"), "a\nb\nc\rd");
    }

    #[test]
    fn normalize_borrows_when_clean() {
        assert!(matches!(normalize_newlines("a\nb"), Cow::Borrowed(_)));
    }

    #[test]
    fn crlf_expansion() {
        assert_eq!(to_crlf("a\nb\n"), "a\r\nb\r\n");
        assert_eq!(to_crlf("no newline"), "no newline");
    }

    #[test]
    fn normalize_then_expand_restores_crlf() {
        let disk = "line one\r\nline two\r\n";
        assert_eq!(to_crlf(&normalize_newlines(disk)), disk);
    }

    #[test]
    fn char_len_counts_chars() {
        assert_eq!(char_len("中文ab"), 4);
        assert_eq!(char_len(""), 0);
    }
}

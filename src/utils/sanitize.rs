//! Error text sanitization.
//!
//! Failure descriptions end up in `escalated_targets.error_message` and in the
//! audit trail. Control characters are dropped and long messages are cut on a
//! character boundary, since city names are routinely non-ASCII.

use crate::config::MAX_ERROR_MESSAGE_LENGTH;

// Room kept for the truncation note.
const TRUNCATION_NOTE_RESERVE: usize = 50;

/// Removes control characters other than tab, newline and carriage return.
pub fn sanitize_error_message(message: &str) -> String {
    message
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// Sanitizes `message` and truncates it to `MAX_ERROR_MESSAGE_LENGTH` characters.
pub fn sanitize_and_truncate_error_message(message: &str) -> String {
    truncate_chars(&sanitize_error_message(message), MAX_ERROR_MESSAGE_LENGTH)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(TRUNCATION_NOTE_RESERVE);
    let head: String = text.chars().take(keep).collect();
    format!("{head}... (truncated, original length: {total} chars)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_control_chars() {
        assert_eq!(
            sanitize_error_message("no\x00 match\x1b for\x7f Łódź"),
            "no match for Łódź"
        );
    }

    #[test]
    fn test_preserves_whitespace_controls() {
        let input = "line one\n\tline two\r\n";
        assert_eq!(sanitize_error_message(input), input);
    }

    #[test]
    fn test_short_message_untouched() {
        assert_eq!(
            sanitize_and_truncate_error_message("provider returned HTTP 502"),
            "provider returned HTTP 502"
        );
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        let long = "ż".repeat(MAX_ERROR_MESSAGE_LENGTH + 10);
        let out = sanitize_and_truncate_error_message(&long);

        assert!(out.chars().count() <= MAX_ERROR_MESSAGE_LENGTH);
        assert!(out.starts_with("żż"));
        assert!(out.ends_with(&format!(
            "(truncated, original length: {} chars)",
            MAX_ERROR_MESSAGE_LENGTH + 10
        )));
    }

    #[test]
    fn test_exact_length_not_truncated() {
        let exact = "a".repeat(MAX_ERROR_MESSAGE_LENGTH);
        assert_eq!(sanitize_and_truncate_error_message(&exact), exact);
    }
}

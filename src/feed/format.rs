//! Display helpers shared by the feeds

use chrono::{DateTime, Utc};
use std::borrow::Cow;

/// Answers longer than this are collapsed behind "Read more"
pub const ANSWER_PREVIEW_CHARS: usize = 300;

/// First `max_chars` characters plus `...`, or `text` untouched if it fits
pub fn truncate_text(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}

fn hours_between(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - then).num_hours()
}

/// Feed style: `now`, `5h`, `3d`
pub fn time_ago_short(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = hours_between(then, now);
    if hours < 1 {
        "now".to_string()
    } else if hours < 24 {
        format!("{}h", hours)
    } else {
        format!("{}d", hours / 24)
    }
}

/// Detail-page style: `Just now`, `5h ago`, `3d ago`
pub fn time_ago_long(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = hours_between(then, now);
    if hours < 1 {
        "Just now".to_string()
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else {
        format!("{}d ago", hours / 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 300), "short");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("abc", 3), "abc");
        // Character based, not byte based
        assert_eq!(truncate_text("नमस्ते दुनिया", 2), "नम...");
    }

    #[test]
    fn test_time_ago() {
        let now = Utc::now();
        assert_eq!(time_ago_short(now - Duration::minutes(59), now), "now");
        assert_eq!(time_ago_short(now - Duration::hours(5), now), "5h");
        assert_eq!(time_ago_short(now - Duration::hours(50), now), "2d");

        assert_eq!(time_ago_long(now, now), "Just now");
        assert_eq!(time_ago_long(now - Duration::hours(23), now), "23h ago");
        assert_eq!(time_ago_long(now - Duration::days(7), now), "7d ago");
    }
}

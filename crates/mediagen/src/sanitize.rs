//! Helpers for shaping text before it goes into spans, logs, or the
//! `error_message` column.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Last `max_chars` characters of `text`, split on a char boundary.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

/// First `max_chars` characters of `text`, split on a char boundary.
pub fn truncate_message(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Clips `text` to `max_chars`, keeping its first line and as much of the
/// end as fits. Engine diagnostics put the summary first and the failing
/// line last.
pub fn clip_message(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let (head, rest) = text.split_once('\n').unwrap_or((text, ""));
    let head = truncate_message(head, max_chars);
    let budget = max_chars.saturating_sub(head.chars().count() + 1);
    if budget == 0 {
        return head.to_string();
    }
    format!("{}\n{}", head, tail_chars(rest, budget))
}

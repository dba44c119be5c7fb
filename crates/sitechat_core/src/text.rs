//! crates/sitechat_core/src/text.rs
//!
//! Plain-text normalization used by the content extractors: markup stripping
//! and the fixed word budget applied to tag- and policy-sourced content.

/// The word budget applied to policy pages and tagged posts before upload.
pub const CONTENT_WORD_LIMIT: usize = 1000;

/// Strips HTML tags and `[shortcode]` markers from stored body markup and
/// collapses runs of whitespace into single spaces.
///
/// This is intentionally not an HTML parser: the remote indexer only needs
/// readable plain text, and malformed markup should degrade to text, not to
/// an error.
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '<' => {
                // Skip to the closing '>' (or the end, for truncated markup).
                for inner in chars.by_ref() {
                    if inner == '>' {
                        break;
                    }
                }
                out.push(' ');
            }
            '[' => {
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    collapse_whitespace(&out)
}

/// Truncates text to at most `limit` whitespace-separated words. No ellipsis
/// is appended; text at or under the budget is returned unchanged.
pub fn trim_words(input: &str, limit: usize) -> String {
    let words: Vec<&str> = input.split_whitespace().collect();
    if words.len() <= limit {
        return collapse_whitespace(input);
    }
    words[..limit].join(" ")
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

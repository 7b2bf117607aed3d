//! Codepoint-offset helpers.
//!
//! Span annotations count Unicode scalar values, not bytes. These helpers
//! convert at the boundary so the rest of the crate never slices a `str`
//! with a character offset by accident.

/// Maximum number of characters in a diagnostic preview before truncation.
pub const DEFAULT_PREVIEW_MAX_CHARS: usize = 80;

/// Number of characters (Unicode scalar values) in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the character at `char_idx`, or `text.len()` when
/// `char_idx` is exactly one past the last character.
fn char_to_byte(text: &str, char_idx: usize) -> Option<usize> {
    text.char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .nth(char_idx)
}

/// Slice `text` by half-open character offsets `[start, end)`.
///
/// Returns `None` when the range is inverted or reaches past the end.
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let byte_start = char_to_byte(text, start)?;
    let byte_end = char_to_byte(text, end)?;
    Some(&text[byte_start..byte_end])
}

/// Character offset of the first occurrence of `needle` in `haystack`.
pub fn find_char_offset(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .find(needle)
        .map(|byte_idx| char_len(&haystack[..byte_idx]))
}

/// Render text for a single-line diagnostic: newlines are escaped and the
/// result is cut to `max_chars` characters.
pub fn preview(text: &str, max_chars: usize) -> String {
    let escaped = text.replace('\n', "\\n");
    if char_len(&escaped) <= max_chars {
        return escaped;
    }
    let mut out: String = escaped.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

//! Document reconstruction and span alignment for a single source record.
//!
//! A record carries a mention with its left and right context. The document
//! is their plain concatenation, so the mention normally starts right after
//! the left context. When that offset does not hold (truncated or
//! re-encoded context), the first verbatim occurrence of the mention is used
//! instead, and records where the mention cannot be found are dropped.

use serde_json::Value;

use crate::{
    record::{
        DerivedRecord, RecordMeta, SourceRecord, SpanAnnotation, label_text,
    },
    text_util::{char_len, char_slice, find_char_offset},
};

/// Label for mentions without a gold entity. Downstream candidate retrieval
/// matches on this exact string.
pub const NME_LABEL: &str = "--NME--";

/// Half-open character interval into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharSpan {
    pub start: usize,
    pub end: usize,
}

/// How a span was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanSource {
    /// The offset derived from the left context was correct.
    Context,
    /// The offset was recovered by searching for the mention.
    Search,
}

/// Concatenate `left + mention + right`, treating absent parts as empty.
pub fn build_doc_text(
    left: Option<&str>,
    mention: Option<&str>,
    right: Option<&str>,
) -> String {
    let parts = [left, mention, right];
    let mut text = String::with_capacity(
        parts.iter().flatten().map(|part| part.len()).sum(),
    );
    for part in parts.into_iter().flatten() {
        text.push_str(part);
    }
    text
}

/// Locate `mention` inside `doc_text`, preferring `naive_start`.
///
/// Returns `None` for an empty mention or when the mention does not occur.
pub fn locate_span(
    doc_text: &str,
    mention: &str,
    naive_start: usize,
) -> Option<(CharSpan, SpanSource)> {
    if mention.is_empty() {
        return None;
    }
    let mention_len = char_len(mention);

    let naive_end = naive_start + mention_len;
    if char_slice(doc_text, naive_start, naive_end) == Some(mention) {
        let span = CharSpan {
            start: naive_start,
            end: naive_end,
        };
        return Some((span, SpanSource::Context));
    }

    let start = find_char_offset(doc_text, mention)?;
    let span = CharSpan {
        start,
        end: start + mention_len,
    };
    Some((span, SpanSource::Search))
}

/// Pick the span label: `label_title`, then `label`, then [`NME_LABEL`].
///
/// Only scalar, non-empty values count; numbers and booleans are rendered
/// as text.
pub fn resolve_label(label_title: &Value, label: &Value) -> String {
    label_text(label_title)
        .or_else(|| label_text(label))
        .map(|text| text.into_owned())
        .unwrap_or_else(|| NME_LABEL.to_string())
}

/// Outcome of converting one source record.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    Converted {
        record: DerivedRecord,
        source: SpanSource,
    },
    /// `mention` was absent or empty.
    MissingMention,
    /// The mention does not occur anywhere in the rebuilt document.
    Unlocatable,
}

/// Turn a source record into a document record with one span annotation.
pub fn convert_record(doc_id: u64, source: &SourceRecord) -> Conversion {
    let Some(mention) = source.mention.as_deref().filter(|m| !m.is_empty())
    else {
        return Conversion::MissingMention;
    };
    let left = source.context_left.as_deref();

    let doc_text =
        build_doc_text(left, Some(mention), source.context_right.as_deref());
    let naive_start = left.map(char_len).unwrap_or(0);

    let Some((span, span_source)) = locate_span(&doc_text, mention, naive_start)
    else {
        return Conversion::Unlocatable;
    };

    let label = resolve_label(&source.label_title, &source.label);

    Conversion::Converted {
        record: DerivedRecord {
            doc_id,
            doc_text,
            doc_span_annotations: vec![SpanAnnotation(
                span.start,
                span.end,
                label,
            )],
            meta: RecordMeta::from(source),
        },
        source: span_source,
    }
}

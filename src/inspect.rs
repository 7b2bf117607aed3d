//! Best-effort inspection of unfamiliar annotation files.
//!
//! Nothing here is authoritative. The inspector scans arbitrary JSON for
//! shapes that look like spans and guesses whether their offsets count
//! tokens or characters, so that a new dataset can be eyeballed before
//! writing a converter for it. Conversion never depends on this module.

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use serde_json::Value;
use tracing::warn;

use crate::{
    data_dir::{DataDir, Split},
    error::Result,
    text_util::{DEFAULT_PREVIEW_MAX_CHARS, char_len, char_slice, preview},
};

/// Keys probed, in order, for the document text.
pub const TEXT_KEYS: &[&str] =
    &["doc_text", "text", "sentence", "content", "document"];

/// Keys probed, in order, for a pre-tokenized document.
pub const TOKEN_KEYS: &[&str] = &["doc_words", "tokens", "words"];

/// Records scanned for the per-record span statistics.
pub const DEFAULT_STATS_RECORDS: usize = 200;

const GUESS_SPAN_LIMIT: usize = 100;
const PREVIEW_SPANS: usize = 5;
const TOKEN_PREVIEW: usize = 20;

/// Something that looked like a span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanCandidate {
    pub start: i64,
    pub end: i64,
    pub label: Option<Value>,
}

fn non_null(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

fn object_label(obj: &serde_json::Map<String, Value>) -> Option<Value> {
    match obj.get("label") {
        Some(label) => non_null(Some(label)),
        None => non_null(obj.get("type")),
    }
}

fn collect_into(value: &Value, spans: &mut Vec<SpanCandidate>) {
    match value {
        Value::Array(items) => {
            if let [first, second, rest @ ..] = items.as_slice()
                && let (Some(start), Some(end)) =
                    (first.as_i64(), second.as_i64())
                && start >= 0
                && end >= start
            {
                spans.push(SpanCandidate {
                    start,
                    end,
                    label: non_null(rest.first()),
                });
            }
            for item in items {
                collect_into(item, spans);
            }
        }
        Value::Object(obj) => {
            if let (Some(start), Some(end)) = (
                obj.get("start").and_then(Value::as_i64),
                obj.get("end").and_then(Value::as_i64),
            ) {
                spans.push(SpanCandidate {
                    start,
                    end,
                    label: object_label(obj),
                });
            }
            if let Some(Value::Array(pair)) = obj.get("span")
                && let [first, second, ..] = pair.as_slice()
                && let (Some(start), Some(end)) =
                    (first.as_i64(), second.as_i64())
            {
                spans.push(SpanCandidate {
                    start,
                    end,
                    label: object_label(obj),
                });
            }
            for child in obj.values() {
                collect_into(child, spans);
            }
        }
        _ => {}
    }
}

/// Collect span-like structures anywhere in `value`, de-duplicated in
/// first-seen order.
pub fn collect_spans(value: &Value) -> Vec<SpanCandidate> {
    let mut found = Vec::new();
    collect_into(value, &mut found);

    let mut unique: Vec<SpanCandidate> = Vec::with_capacity(found.len());
    for span in found {
        if !unique.contains(&span) {
            unique.push(span);
        }
    }
    unique
}

/// First string-valued text field among [`TEXT_KEYS`].
pub fn find_text_field(value: &Value) -> Option<(&'static str, &str)> {
    TEXT_KEYS
        .iter()
        .find_map(|&key| value.get(key)?.as_str().map(|text| (key, text)))
}

/// First token list among [`TOKEN_KEYS`]: empty, or starting with a string.
pub fn find_tokens_field(value: &Value) -> Option<(&'static str, Vec<String>)> {
    TOKEN_KEYS.iter().find_map(|&key| {
        let items = value.get(key)?.as_array()?;
        match items.first() {
            None | Some(Value::String(_)) => {}
            Some(_) => return None,
        }
        let tokens = items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        Some((key, tokens))
    })
}

/// Guess at the unit of span offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanKindGuess {
    Unknown,
    Token {
        within: usize,
        total: usize,
        tokens: usize,
    },
    Char {
        within: usize,
        total: usize,
        chars: usize,
    },
    Ambiguous {
        token_ok: usize,
        char_ok: usize,
        spans: usize,
    },
}

impl fmt::Display for SpanKindGuess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanKindGuess::Unknown => write!(f, "unknown (no spans found)"),
            SpanKindGuess::Token {
                within,
                total,
                tokens,
            } => write!(
                f,
                "token (heuristic: {within}/{total} ends within #tokens={tokens})"
            ),
            SpanKindGuess::Char {
                within,
                total,
                chars,
            } => write!(
                f,
                "char (heuristic: {within}/{total} ends within #chars={chars})"
            ),
            SpanKindGuess::Ambiguous {
                token_ok,
                char_ok,
                spans,
            } => write!(
                f,
                "ambiguous (token_ok={token_ok}, char_ok={char_ok}, n_spans={spans})"
            ),
        }
    }
}

/// Guess whether span ends count tokens or characters.
///
/// A unit wins when strictly more ends fit inside it than inside the other,
/// and at least `max(3, 60%)` of all ends fit.
pub fn guess_span_kind(
    spans: &[SpanCandidate],
    char_count: Option<usize>,
    token_count: Option<usize>,
) -> SpanKindGuess {
    if spans.is_empty() {
        return SpanKindGuess::Unknown;
    }

    let within = |limit: Option<usize>| {
        limit.map_or(0, |limit| {
            spans
                .iter()
                .filter(|s| s.end >= 0 && (s.end as u64) <= limit as u64)
                .count()
        })
    };
    let token_ok = within(token_count);
    let char_ok = within(char_count);
    let total = spans.len();
    let threshold = 3.max(total * 3 / 5);

    match (token_count, char_count) {
        (Some(tokens), _) if token_ok > char_ok && token_ok >= threshold => {
            SpanKindGuess::Token {
                within: token_ok,
                total,
                tokens,
            }
        }
        (_, Some(chars)) if char_ok > token_ok && char_ok >= threshold => {
            SpanKindGuess::Char {
                within: char_ok,
                total,
                chars,
            }
        }
        _ => SpanKindGuess::Ambiguous {
            token_ok,
            char_ok,
            spans: total,
        },
    }
}

/// Text under a span that fits inside the document.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanPreview {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub label: Option<Value>,
}

/// What the inspector learned from one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSummary {
    pub keys: Vec<String>,
    /// Text field name and its length in characters.
    pub text_field: Option<(String, usize)>,
    /// Token field name, token count and the first few tokens.
    pub token_field: Option<(String, usize, Vec<String>)>,
    pub spans: Vec<SpanCandidate>,
    pub guess: SpanKindGuess,
    pub previews: Vec<SpanPreview>,
}

pub fn summarize_record(value: &Value) -> RecordSummary {
    let keys = value
        .as_object()
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default();
    let text = find_text_field(value);
    let tokens = find_tokens_field(value);
    let spans = collect_spans(value);

    let guess_input = &spans[..spans.len().min(GUESS_SPAN_LIMIT)];
    let guess = guess_span_kind(
        guess_input,
        text.map(|(_, text)| char_len(text)),
        tokens.as_ref().map(|(_, tokens)| tokens.len()),
    );

    let previews = match text {
        Some((_, text)) => spans
            .iter()
            .take(PREVIEW_SPANS)
            .filter_map(|span| {
                let start = usize::try_from(span.start).ok()?;
                let end = usize::try_from(span.end).ok()?;
                let slice = char_slice(text, start, end)?;
                Some(SpanPreview {
                    start,
                    end,
                    text: preview(slice, DEFAULT_PREVIEW_MAX_CHARS),
                    label: span.label.clone(),
                })
            })
            .collect(),
        None => Vec::new(),
    };

    RecordSummary {
        keys,
        text_field: text.map(|(key, text)| (key.to_string(), char_len(text))),
        token_field: tokens.map(|(key, tokens)| {
            let count = tokens.len();
            let head = tokens.into_iter().take(TOKEN_PREVIEW).collect();
            (key.to_string(), count, head)
        }),
        spans,
        guess,
        previews,
    }
}

/// Span-like structures per record over a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleStats {
    pub records: usize,
    pub mean_spans: f64,
    pub max_spans: usize,
}

pub fn sample_stats(records: &[Value]) -> SampleStats {
    let counts: Vec<usize> =
        records.iter().map(|r| collect_spans(r).len()).collect();
    let total: usize = counts.iter().sum();
    SampleStats {
        records: counts.len(),
        mean_spans: if counts.is_empty() {
            0.0
        } else {
            total as f64 / counts.len() as f64
        },
        max_spans: counts.iter().copied().max().unwrap_or(0),
    }
}

/// Read up to `limit` JSON values from a JSONL file, skipping blank and
/// unparsable lines.
pub fn load_jsonl(path: &Path, limit: usize) -> Result<Vec<Value>> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for (line_idx, line) in reader.lines().enumerate() {
        if out.len() >= limit {
            break;
        }
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(value) => out.push(value),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = line_idx + 1,
                    error = %e,
                    "skipping unparsable line"
                );
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
pub enum InspectOutcome {
    Missing,
    Empty,
    Inspected {
        first: Box<RecordSummary>,
        stats: SampleStats,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectReport {
    pub split: Split,
    pub path: PathBuf,
    pub outcome: InspectOutcome,
}

pub fn inspect_file(
    path: &Path,
    stats_records: usize,
) -> Result<InspectOutcome> {
    if !path.is_file() {
        return Ok(InspectOutcome::Missing);
    }
    let records = load_jsonl(path, stats_records.max(1))?;
    let Some(first) = records.first() else {
        return Ok(InspectOutcome::Empty);
    };
    let first = Box::new(summarize_record(first));
    let sample = &records[..records.len().min(stats_records)];
    Ok(InspectOutcome::Inspected {
        first,
        stats: sample_stats(sample),
    })
}

pub fn inspect_split(
    data_dir: &DataDir,
    split: Split,
    stats_records: usize,
) -> Result<InspectReport> {
    let path = data_dir.raw_split(split);
    let outcome = inspect_file(&path, stats_records)?;
    Ok(InspectReport {
        split,
        path,
        outcome,
    })
}

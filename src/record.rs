use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One annotated mention as it appears in the raw AnnoCTR linking files.
///
/// Mention and context fields accept strings, numbers and booleans (coerced
/// to text) and treat `null` as absent. Labels and the identifier-like fields
/// are kept as raw JSON so they pass through to the output untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SourceRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub mention: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub context_left: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub context_right: Option<String>,
    #[serde(default)]
    pub label: Value,
    #[serde(default)]
    pub label_title: Value,
    #[serde(default)]
    pub label_id: Value,
    #[serde(default)]
    pub label_link: Value,
    #[serde(default)]
    pub entity_class: Value,
    #[serde(default)]
    pub entity_type: Value,
}

impl SourceRecord {
    /// Parse one JSONL line. Anything other than a JSON object is rejected.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(line)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom(
                "expected a JSON object per line",
            ));
        }
        serde_json::from_value(value)
    }

    pub fn label_link_str(&self) -> Option<&str> {
        self.label_link.as_str()
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected text, found {other}"
        ))),
    }
}

/// Render a scalar label as text. `null`, empty strings, arrays and objects
/// have no text form.
pub fn label_text(value: &Value) -> Option<Cow<'_, str>> {
    let text = match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Number(n) => Cow::Owned(n.to_string()),
        Value::Bool(b) => Cow::Owned(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// A `[start, end, label]` span over `doc_text`, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanAnnotation(pub usize, pub usize, pub String);

impl SpanAnnotation {
    pub fn start(&self) -> usize {
        self.0
    }

    pub fn end(&self) -> usize {
        self.1
    }

    pub fn label(&self) -> &str {
        &self.2
    }
}

/// Source fields carried into the output for traceability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    #[serde(default)]
    pub mention: Option<String>,
    #[serde(default)]
    pub label: Value,
    #[serde(default)]
    pub label_id: Value,
    #[serde(default)]
    pub label_link: Value,
    #[serde(default)]
    pub entity_class: Value,
    #[serde(default)]
    pub entity_type: Value,
}

impl From<&SourceRecord> for RecordMeta {
    fn from(source: &SourceRecord) -> Self {
        Self {
            mention: source.mention.clone(),
            label: source.label.clone(),
            label_id: source.label_id.clone(),
            label_link: source.label_link.clone(),
            entity_class: source.entity_class.clone(),
            entity_type: source.entity_type.clone(),
        }
    }
}

/// A ReLiK-style document record with a single span annotation.
///
/// Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    pub doc_id: u64,
    pub doc_text: String,
    pub doc_span_annotations: Vec<SpanAnnotation>,
    pub meta: RecordMeta,
}

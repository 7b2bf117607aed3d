//! Read-only consistency check of converted documents.
//!
//! Every record's first span must cut exactly the stored mention out of its
//! document text. Disagreements are counted, never repaired.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{
    data_dir::{DataDir, Split},
    error::Result,
    record::DerivedRecord,
    text_util::char_slice,
};

/// Number of mismatches kept for display.
pub const MAX_REPORTED_MISMATCHES: usize = 5;

/// A record whose span does not reproduce its mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// 1-indexed line in the checked file.
    pub line: usize,
    pub doc_id: u64,
    /// Text under the span, `None` when the record has no span or the span
    /// lies outside the document.
    pub extracted: Option<String>,
    pub mention: Option<String>,
    /// Label of the first span, if any.
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub checked: usize,
    pub bad: usize,
    pub malformed: usize,
    pub mismatches: Vec<Mismatch>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.bad == 0 && self.malformed == 0
    }
}

/// Cut the first span out of the record's text.
fn extract_first_span(record: &DerivedRecord) -> Option<&str> {
    let span = record.doc_span_annotations.first()?;
    char_slice(&record.doc_text, span.start(), span.end())
}

/// Check a single record; `None` means it is consistent.
pub fn check_record(line: usize, record: &DerivedRecord) -> Option<Mismatch> {
    let extracted = extract_first_span(record);
    let mention = record.meta.mention.as_deref();
    if extracted.is_some() && extracted == mention {
        return None;
    }
    Some(Mismatch {
        line,
        doc_id: record.doc_id,
        extracted: extracted.map(str::to_string),
        mention: mention.map(str::to_string),
        label: record
            .doc_span_annotations
            .first()
            .map(|span| span.label().to_string()),
    })
}

pub fn check_stream<R: BufRead>(reader: R) -> Result<CheckReport> {
    let mut report = CheckReport::default();

    for (line_idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: DerivedRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    line = line_idx + 1,
                    error = %e,
                    "unreadable document record"
                );
                report.malformed += 1;
                continue;
            }
        };

        report.checked += 1;
        if let Some(mismatch) = check_record(line_idx + 1, &record) {
            report.bad += 1;
            if report.mismatches.len() < MAX_REPORTED_MISMATCHES {
                report.mismatches.push(mismatch);
            }
        }
    }

    Ok(report)
}

pub fn check_file(path: &Path) -> Result<CheckReport> {
    check_stream(BufReader::new(File::open(path)?))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Checked(CheckReport),
    MissingInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitCheck {
    pub split: Split,
    pub path: PathBuf,
    pub outcome: CheckOutcome,
}

/// Check the converted output of one split, skipping it when absent.
pub fn check_split(data_dir: &DataDir, split: Split) -> Result<SplitCheck> {
    let path = data_dir.processed_split(split);
    if !path.is_file() {
        warn!(
            %split,
            path = %path.display(),
            "no converted output, skipping check"
        );
        return Ok(SplitCheck {
            split,
            path,
            outcome: CheckOutcome::MissingInput,
        });
    }

    let report = check_file(&path)?;
    info!(%split, checked = report.checked, bad = report.bad, "checked spans");
    Ok(SplitCheck {
        split,
        path,
        outcome: CheckOutcome::Checked(report),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::convert_stream;

    #[test]
    fn converted_output_is_clean() {
        let input = r#"{"mention":"Foo","context_left":"abc ","context_right":" bar","label_title":"FooEntity"}"#;
        let mut converted = Vec::new();
        convert_stream(input.as_bytes(), &mut converted).unwrap();

        let report = check_stream(converted.as_slice()).unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.bad, 0);
        assert!(report.is_clean());
    }

    #[test]
    fn detects_shifted_span() {
        let line = r#"{"doc_id":9,"doc_text":"abc Foo bar","doc_span_annotations":[[3,6,"FooEntity"]],"meta":{"mention":"Foo"}}"#;
        let report = check_stream(line.as_bytes()).unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.bad, 1);
        assert_eq!(
            report.mismatches,
            vec![Mismatch {
                line: 1,
                doc_id: 9,
                extracted: Some(" Fo".into()),
                mention: Some("Foo".into()),
                label: Some("FooEntity".into()),
            }]
        );
    }

    #[test]
    fn out_of_range_and_missing_spans_are_bad() {
        let input = concat!(
            r#"{"doc_id":0,"doc_text":"abc","doc_span_annotations":[[1,9,"x"]],"meta":{"mention":"bc"}}"#,
            "\n",
            r#"{"doc_id":1,"doc_text":"abc","doc_span_annotations":[],"meta":{"mention":"a"}}"#,
            "\n",
            r#"{"doc_id":2,"doc_text":"abc","doc_span_annotations":[[0,1,"x"]],"meta":{}}"#,
            "\n",
        );
        let report = check_stream(input.as_bytes()).unwrap();
        assert_eq!(report.checked, 3);
        assert_eq!(report.bad, 3);
        assert_eq!(report.mismatches[0].extracted, None);
        assert_eq!(report.mismatches[0].label.as_deref(), Some("x"));
        assert_eq!(report.mismatches[1].label, None);
        assert_eq!(report.mismatches[2].mention, None);
    }

    #[test]
    fn keeps_at_most_five_mismatches() {
        let bad = r#"{"doc_id":0,"doc_text":"abc","doc_span_annotations":[[0,1,"x"]],"meta":{"mention":"c"}}"#;
        let input = vec![bad; 8].join("\n");
        let report = check_stream(input.as_bytes()).unwrap();
        assert_eq!(report.checked, 8);
        assert_eq!(report.bad, 8);
        assert_eq!(report.mismatches.len(), MAX_REPORTED_MISMATCHES);
    }

    #[test]
    fn malformed_lines_do_not_stop_the_check() {
        let input = concat!(
            "not json\n",
            r#"{"doc_id":0,"doc_text":"ab","doc_span_annotations":[[0,1,"x"]],"meta":{"mention":"a"}}"#,
            "\n",
        );
        let report = check_stream(input.as_bytes()).unwrap();
        assert_eq!(report.malformed, 1);
        assert_eq!(report.checked, 1);
        assert_eq!(report.bad, 0);
        assert!(!report.is_clean());
    }

    #[test]
    fn check_split_skips_missing_output() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = DataDir::new(tmp.path(), "annoctr");
        let result = check_split(&data_dir, Split::Test).unwrap();
        assert_eq!(result.outcome, CheckOutcome::MissingInput);
        assert_eq!(result.path, data_dir.processed_split(Split::Test));
    }

    #[test]
    fn check_file_reads_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("train.jsonl");
        std::fs::write(
            &path,
            "{\"doc_id\":0,\"doc_text\":\"éa\",\"doc_span_annotations\":[[1,2,\"x\"]],\"meta\":{\"mention\":\"a\"}}\n",
        )
        .unwrap();
        let report = check_file(&path).unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.bad, 0);
    }
}

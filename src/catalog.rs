//! Technique catalog: one index document per ATT&CK technique referenced by
//! the annotations' `label_link`.

use std::{
    collections::HashSet,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    data_dir::{DataDir, Split, ensure_parent},
    error::Result,
    record::{SourceRecord, label_text},
};

static TECHNIQUE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(T\d+(?:\.\d+)?)").expect("technique id pattern is valid")
});

/// Extract a technique id such as `T1059` or `T1059.001` from a link.
pub fn extract_technique_id(link: &str) -> Option<&str> {
    TECHNIQUE_ID
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechniqueMetadata {
    pub entity_type: Value,
    pub title: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechniqueDocument {
    pub id: String,
    pub text: String,
    pub metadata: TechniqueMetadata,
}

impl TechniqueDocument {
    fn from_record(id: &str, record: &SourceRecord) -> Self {
        let text = match label_text(&record.label_title) {
            Some(title) => format!("{id} {title}"),
            None => id.to_string(),
        };
        Self {
            id: id.to_string(),
            text,
            metadata: TechniqueMetadata {
                entity_type: record.entity_type.clone(),
                title: record.label_title.clone(),
            },
        }
    }
}

/// Accumulates the first document seen for each technique id.
#[derive(Debug, Default)]
pub struct TechniqueCatalog {
    seen: HashSet<String>,
    documents: Vec<TechniqueDocument>,
}

impl TechniqueCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; returns `true` if it introduced a new technique.
    pub fn add(&mut self, record: &SourceRecord) -> bool {
        let Some(id) = record.label_link_str().and_then(extract_technique_id)
        else {
            return false;
        };
        if !self.seen.insert(id.to_string()) {
            return false;
        }
        self.documents
            .push(TechniqueDocument::from_record(id, record));
        true
    }

    /// Add every parsable record of a JSONL stream.
    pub fn add_stream<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        let mut added = 0;
        for (line_idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match SourceRecord::from_json_line(line) {
                Ok(record) => {
                    if self.add(&record) {
                        added += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        line = line_idx + 1,
                        error = %e,
                        "skipping malformed record"
                    );
                }
            }
        }
        Ok(added)
    }

    pub fn documents(&self) -> &[TechniqueDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn write_jsonl<W: Write>(&self, writer: &mut W) -> Result<()> {
        for doc in &self.documents {
            serde_json::to_writer(&mut *writer, doc)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Build the catalog from every available raw split and write it out.
pub fn build_catalog(
    data_dir: &DataDir,
) -> Result<(TechniqueCatalog, PathBuf)> {
    let mut catalog = TechniqueCatalog::new();
    for split in Split::ALL {
        let input = data_dir.raw_split(split);
        if !input.is_file() {
            warn!(
                %split,
                input = %input.display(),
                "missing input, skipping split"
            );
            continue;
        }
        let added = catalog.add_stream(BufReader::new(File::open(&input)?))?;
        info!(%split, added, "scanned split for techniques");
    }

    let output = data_dir.technique_catalog();
    write_catalog(&catalog, &output)?;
    Ok((catalog, output))
}

pub fn write_catalog(catalog: &TechniqueCatalog, output: &Path) -> Result<()> {
    ensure_parent(output)?;
    let mut writer = BufWriter::new(File::create(output)?);
    catalog.write_jsonl(&mut writer)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn extracts_technique_ids() {
        assert_eq!(
            extract_technique_id("https://attack.mitre.org/techniques/T1059"),
            Some("T1059")
        );
        assert_eq!(
            extract_technique_id(
                "https://attack.mitre.org/techniques/T1059.001/"
            ),
            Some("T1059.001")
        );
        assert_eq!(
            extract_technique_id("https://attack.mitre.org/groups/G0007"),
            None
        );
        assert_eq!(extract_technique_id("T1059"), None);
    }

    #[test]
    fn keeps_first_record_per_technique() {
        let input = concat!(
            r#"{"mention":"a","label_link":"https://x/T1059","label_title":"Command and Scripting Interpreter","entity_type":"TECHNIQUE"}"#,
            "\n",
            r#"{"mention":"b","label_link":"https://x/T1059","label_title":"Other"}"#,
            "\n",
            "{broken\n",
            r#"{"mention":"c","label_link":"https://x/T1566.001"}"#,
            "\n",
            r#"{"mention":"d","label_link":null}"#,
            "\n",
        );
        let mut catalog = TechniqueCatalog::new();
        let added = catalog.add_stream(input.as_bytes()).unwrap();
        assert_eq!(added, 2);

        let docs = catalog.documents();
        assert_eq!(docs[0].id, "T1059");
        assert_eq!(docs[0].text, "T1059 Command and Scripting Interpreter");
        assert_eq!(docs[0].metadata.entity_type, json!("TECHNIQUE"));
        assert_eq!(docs[1].id, "T1566.001");
        assert_eq!(docs[1].text, "T1566.001");
        assert_eq!(docs[1].metadata.title, Value::Null);
    }

    #[test]
    fn writes_jsonl_documents() {
        let mut catalog = TechniqueCatalog::new();
        catalog.add(&SourceRecord {
            label_link: json!("https://x/T1003"),
            label_title: json!("OS Credential Dumping"),
            ..SourceRecord::default()
        });
        let mut out = Vec::new();
        catalog.write_jsonl(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"id\":\"T1003\",\"text\":\"T1003 OS Credential Dumping\",\"metadata\":{\"entity_type\":null,\"title\":\"OS Credential Dumping\"}}\n"
        );
    }

    #[test]
    fn build_catalog_scans_all_splits() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = DataDir::new(tmp.path(), "annoctr");
        std::fs::create_dir_all(data_dir.raw_dir()).unwrap();
        std::fs::write(
            data_dir.raw_split(Split::Train),
            "{\"label_link\":\"https://x/T1001\"}\n",
        )
        .unwrap();
        std::fs::write(
            data_dir.raw_split(Split::Test),
            "{\"label_link\":\"https://x/T1002\"}\n{\"label_link\":\"https://x/T1001\"}\n",
        )
        .unwrap();

        let (catalog, output) = build_catalog(&data_dir).unwrap();
        assert_eq!(catalog.len(), 2);
        let written = std::fs::read_to_string(output).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.starts_with("{\"id\":\"T1001\""));
    }
}

//! Per-split conversion of raw AnnoCTR linking files into ReLiK documents.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    data_dir::{DataDir, Split, ensure_parent},
    error::Result,
    record::SourceRecord,
    span::{Conversion, SpanSource, convert_record},
};

/// Counters for one converted split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertStats {
    /// Records written to the output file.
    pub written: usize,
    /// Written records whose span came from the fallback search.
    pub recovered: usize,
    /// Records without a mention.
    pub missing_mention: usize,
    /// Records whose mention does not occur in the rebuilt document.
    pub unlocatable: usize,
    /// Lines that are not a JSON object.
    pub malformed: usize,
}

impl ConvertStats {
    pub fn dropped(&self) -> usize {
        self.missing_mention + self.unlocatable + self.malformed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitOutcome {
    Converted {
        output: PathBuf,
        stats: ConvertStats,
    },
    MissingInput {
        input: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReport {
    pub split: Split,
    pub outcome: SplitOutcome,
}

/// Convert a JSONL stream of source records, writing one document per line.
///
/// `doc_id` is the zero-based physical line number, so blank, malformed and
/// dropped lines leave gaps in the numbering.
pub fn convert_stream<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
) -> Result<ConvertStats> {
    let mut stats = ConvertStats::default();

    for (line_idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let source = match SourceRecord::from_json_line(line) {
            Ok(source) => source,
            Err(e) => {
                warn!(
                    line = line_idx + 1,
                    error = %e,
                    "skipping malformed record"
                );
                stats.malformed += 1;
                continue;
            }
        };

        match convert_record(line_idx as u64, &source) {
            Conversion::Converted { record, source } => {
                serde_json::to_writer(&mut *writer, &record)?;
                writer.write_all(b"\n")?;
                stats.written += 1;
                if source == SpanSource::Search {
                    stats.recovered += 1;
                }
            }
            Conversion::MissingMention => {
                debug!(line = line_idx + 1, "dropping record without mention");
                stats.missing_mention += 1;
            }
            Conversion::Unlocatable => {
                debug!(
                    line = line_idx + 1,
                    "dropping record: mention not found in document text"
                );
                stats.unlocatable += 1;
            }
        }
    }

    writer.flush()?;
    Ok(stats)
}

/// Convert one file. The output is truncated first.
pub fn convert_file(input: &Path, output: &Path) -> Result<ConvertStats> {
    let reader = BufReader::new(File::open(input)?);
    ensure_parent(output)?;
    let mut writer = BufWriter::new(File::create(output)?);
    convert_stream(reader, &mut writer)
}

/// Convert one split of the data directory. A missing input is not an error.
pub fn convert_split(data_dir: &DataDir, split: Split) -> Result<SplitReport> {
    let input = data_dir.raw_split(split);
    if !input.is_file() {
        warn!(
            %split,
            input = %input.display(),
            "missing input, skipping split"
        );
        return Ok(SplitReport {
            split,
            outcome: SplitOutcome::MissingInput { input },
        });
    }

    let output = data_dir.processed_split(split);
    let stats = convert_file(&input, &output)?;
    info!(
        %split,
        written = stats.written,
        dropped = stats.dropped(),
        recovered = stats.recovered,
        output = %output.display(),
        "converted split"
    );

    Ok(SplitReport {
        split,
        outcome: SplitOutcome::Converted { output, stats },
    })
}

/// Convert the given splits in order.
pub fn convert_splits(
    data_dir: &DataDir,
    splits: &[Split],
) -> Result<Vec<SplitReport>> {
    splits
        .iter()
        .map(|&split| convert_split(data_dir, split))
        .collect()
}

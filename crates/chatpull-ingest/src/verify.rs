//! Re-check a sink against its summary
//!
//! Re-reads every record, recounts the categorical fields and (for JSONL)
//! recomputes the checksum. Works for both raw and clean encodings, which
//! both carry top-level `model` and `language` keys.

use crate::error::{IngestError, Result};
use crate::sink::SinkFormat;
use crate::summary::Summary;
use crate::tally::Tally;
use chatpull_common::checksum::verify_file_checksum;
use chatpull_common::CommonError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Counts recomputed from the sink
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recount {
    pub records: u64,
    pub models: Tally,
    pub languages: Tally,
}

impl Recount {
    fn observe(&mut self, location: &str, record: &Value) -> Result<()> {
        let field = |name: &str| {
            record.get(name).and_then(Value::as_str).ok_or_else(|| {
                IngestError::VerificationFailed(format!("{location}: record has no string `{name}`"))
            })
        };
        let model = field("model")?;
        let language = field("language")?;

        self.records += 1;
        self.models.observe(model);
        self.languages.observe(language);
        Ok(())
    }
}

/// Outcome of a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub records: u64,
    pub files: Vec<PathBuf>,
    pub checksum_verified: bool,
}

/// Verify the sink described by the summary at `summary_path`
pub fn verify(summary_path: &Path) -> Result<VerifyReport> {
    let summary = Summary::load(summary_path)?;
    let output = &summary.output;

    let recount = match output.format {
        SinkFormat::Jsonl => recount_jsonl(&output.path)?,
        SinkFormat::Batch => recount_batches(&output.files)?,
    };

    let mut mismatches = compare(&summary, &recount);

    let mut checksum_verified = false;
    if let Some(expected) = &output.sha256 {
        match verify_file_checksum(&output.path, expected) {
            Ok(()) => checksum_verified = true,
            Err(CommonError::ChecksumMismatch { expected, actual }) => {
                mismatches.push(format!("sha256: summary {expected}, sink {actual}"));
            },
            Err(err) => return Err(IngestError::VerificationFailed(err.to_string())),
        }
    }

    if !mismatches.is_empty() {
        return Err(IngestError::VerificationFailed(mismatches.join("; ")));
    }

    info!(records = recount.records, summary = %summary_path.display(), "Sink matches summary");
    Ok(VerifyReport {
        records: recount.records,
        files: output.files.clone(),
        checksum_verified,
    })
}

/// Recount a JSONL sink line by line
pub fn recount_jsonl(path: &Path) -> Result<Recount> {
    let lines = serde_jsonlines::json_lines::<Value, _>(path)
        .map_err(|err| IngestError::VerificationFailed(format!("cannot read {}: {}", path.display(), err)))?;

    let mut recount = Recount::default();
    for (number, line) in lines.enumerate() {
        let location = format!("{} line {}", path.display(), number + 1);
        let record = line.map_err(|err| IngestError::VerificationFailed(format!("{location}: {err}")))?;
        recount.observe(&location, &record)?;
    }

    debug!(path = %path.display(), records = recount.records, "Recounted JSONL sink");
    Ok(recount)
}

/// Recount a set of batch files
pub fn recount_batches(files: &[PathBuf]) -> Result<Recount> {
    let mut recount = Recount::default();
    for file in files {
        let content = std::fs::read_to_string(file)
            .map_err(|err| IngestError::VerificationFailed(format!("cannot read {}: {}", file.display(), err)))?;
        let records: Vec<Value> = serde_json::from_str(&content)
            .map_err(|err| IngestError::VerificationFailed(format!("{}: {}", file.display(), err)))?;

        for (position, record) in records.iter().enumerate() {
            let location = format!("{} record {}", file.display(), position);
            recount.observe(&location, record)?;
        }
    }
    Ok(recount)
}

fn compare(summary: &Summary, recount: &Recount) -> Vec<String> {
    let mut mismatches = Vec::new();

    if summary.total_conversations != recount.records {
        mismatches.push(format!(
            "total: summary {}, sink {}",
            summary.total_conversations, recount.records
        ));
    }
    diff_distribution("model", &summary.model_distribution, recount.models.as_map(), &mut mismatches);
    diff_distribution(
        "language",
        &summary.language_distribution,
        recount.languages.as_map(),
        &mut mismatches,
    );
    if summary.models != recount.models.distinct() {
        mismatches.push("distinct models differ".to_string());
    }
    if summary.languages != recount.languages.distinct() {
        mismatches.push("distinct languages differ".to_string());
    }

    mismatches
}

fn diff_distribution(
    field: &str,
    expected: &BTreeMap<String, u64>,
    actual: &BTreeMap<String, u64>,
    mismatches: &mut Vec<String>,
) {
    for key in expected.keys().chain(actual.keys().filter(|k| !expected.contains_key(*k))) {
        let want = expected.get(key).copied().unwrap_or(0);
        let got = actual.get(key).copied().unwrap_or(0);
        if want != got {
            mismatches.push(format!("{field} '{key}': summary {want}, sink {got}"));
        }
    }
}

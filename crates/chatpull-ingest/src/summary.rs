//! Summary artifact
//!
//! Written once per run next to the sink. The distributions are taken
//! straight from the running tallies, so they always match what a reader
//! would count by re-parsing the sink.

use crate::encode::Transform;
use crate::error::{IngestError, Result};
use crate::hub::DatasetRef;
use crate::sink::{SinkFormat, SinkReport};
use crate::tally::RunningTallies;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default summary file name
pub const SUMMARY_FILE_NAME: &str = "metadata.json";

/// Where the records came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Dataset name, or the file path for local sources
    pub dataset: String,
    pub config: Option<String>,
    pub split: Option<String>,
}

impl From<&DatasetRef> for SourceInfo {
    fn from(dataset: &DatasetRef) -> Self {
        Self {
            dataset: dataset.dataset.clone(),
            config: Some(dataset.config.clone()),
            split: Some(dataset.split.clone()),
        }
    }
}

/// Where the records went
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputInfo {
    pub format: SinkFormat,
    pub transform: Transform,
    pub path: PathBuf,
    pub files: Vec<PathBuf>,
    pub bytes: u64,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_conversations: u64,
    pub models: Vec<String>,
    pub languages: Vec<String>,
    pub model_distribution: BTreeMap<String, u64>,
    pub language_distribution: BTreeMap<String, u64>,
    pub total_messages: u64,
    pub avg_messages_per_conversation: f64,
    /// False when the run was interrupted before reaching its target
    pub complete: bool,
    pub source: SourceInfo,
    pub output: OutputInfo,
    pub generated_at: DateTime<Utc>,
}

impl Summary {
    /// Build the summary for a finished sink
    pub fn build(
        tallies: RunningTallies,
        report: SinkReport,
        source: SourceInfo,
        format: SinkFormat,
        transform: Transform,
        output_path: PathBuf,
        complete: bool,
    ) -> Result<Self> {
        if tallies.records != report.records {
            return Err(IngestError::VerificationFailed(format!(
                "tallied {} records but the sink holds {}",
                tallies.records, report.records
            )));
        }

        let avg_messages_per_conversation = tallies.avg_messages();
        Ok(Self {
            total_conversations: tallies.records,
            models: tallies.models.distinct(),
            languages: tallies.languages.distinct(),
            model_distribution: tallies.models.into_map(),
            language_distribution: tallies.languages.into_map(),
            total_messages: tallies.messages,
            avg_messages_per_conversation,
            complete,
            source,
            output: OutputInfo {
                format,
                transform,
                path: output_path,
                files: report.files,
                bytes: report.bytes,
                sha256: report.sha256,
            },
            generated_at: Utc::now(),
        })
    }

    /// Write as pretty JSON, replacing `path` atomically
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| IngestError::summary(path, err))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|err| IngestError::summary(path, err))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|err| IngestError::summary(&tmp, err))?;
        std::fs::rename(&tmp, path).map_err(|err| IngestError::summary(path, err))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| IngestError::summary(path, err))?;
        serde_json::from_str(&content).map_err(|err| IngestError::summary(path, err))
    }
}

/// Summary path used when none is configured: `metadata.json` beside the output
pub fn default_summary_path(output: &Path, format: SinkFormat) -> PathBuf {
    let dir = match format {
        SinkFormat::Jsonl => output.parent().map(Path::to_path_buf).unwrap_or_default(),
        SinkFormat::Batch => output.to_path_buf(),
    };
    dir.join(SUMMARY_FILE_NAME)
}

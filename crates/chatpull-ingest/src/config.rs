//! Ingestion run configuration

use crate::encode::Transform;
use crate::error::{IngestError, Result};
use crate::hub::{DatasetRef, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS, MAX_PAGE_ROWS};
use crate::progress::DEFAULT_REPORT_EVERY;
use crate::sink::{SinkFormat, SinkTarget};
use crate::summary::default_summary_path;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_DATASET: &str = "lmsys/lmsys-chat-1m";
pub const DEFAULT_CONFIG: &str = "default";
pub const DEFAULT_SPLIT: &str = "train";
pub const DEFAULT_LIMIT: u64 = 1_000_000;
pub const DEFAULT_OUTPUT: &str = "data/conversations.jsonl";
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Everything one run needs, after argument parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub dataset: String,
    pub config: String,
    pub split: String,

    /// Maximum number of records to ingest
    pub limit: u64,

    /// JSONL file, or directory in batch mode
    pub output: PathBuf,

    /// Summary path; `metadata.json` beside the output when unset
    pub summary: Option<PathBuf>,

    pub format: SinkFormat,
    pub batch_size: usize,
    pub transform: Transform,

    /// Records between progress updates
    pub report_every: u64,
    pub show_progress: bool,

    /// Replace existing output
    pub overwrite: bool,

    pub endpoint: String,
    pub page_size: usize,
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_DATASET.to_string(),
            config: DEFAULT_CONFIG.to_string(),
            split: DEFAULT_SPLIT.to_string(),
            limit: DEFAULT_LIMIT,
            output: PathBuf::from(DEFAULT_OUTPUT),
            summary: None,
            format: SinkFormat::Jsonl,
            batch_size: DEFAULT_BATCH_SIZE,
            transform: Transform::Raw,
            report_every: DEFAULT_REPORT_EVERY,
            show_progress: true,
            overwrite: false,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            page_size: MAX_PAGE_ROWS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dataset.trim().is_empty() {
            return Err(invalid("dataset name must not be empty"));
        }
        if self.split.trim().is_empty() {
            return Err(invalid("split name must not be empty"));
        }
        if self.report_every == 0 {
            return Err(invalid("--report-every must be a positive integer"));
        }
        if !(1..=MAX_PAGE_ROWS).contains(&self.page_size) {
            return Err(invalid(&format!("--page-size must be between 1 and {MAX_PAGE_ROWS}")));
        }
        if self.format == SinkFormat::Batch && self.batch_size == 0 {
            return Err(invalid("--batch-size must be a positive integer"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("--timeout-secs must be a positive integer"));
        }
        if self.format == SinkFormat::Jsonl && same_path(&self.summary_path(), &self.output) {
            return Err(invalid(&format!(
                "summary path '{}' would overwrite the output; pass a different --summary",
                self.output.display()
            )));
        }
        Ok(())
    }

    pub fn dataset_ref(&self) -> DatasetRef {
        DatasetRef {
            dataset: self.dataset.clone(),
            config: self.config.clone(),
            split: self.split.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Sink location. In batch mode an output that looks like a file
    /// (has an extension) is replaced by its parent directory.
    pub fn sink_target(&self) -> SinkTarget {
        match self.format {
            SinkFormat::Jsonl => SinkTarget::JsonLines(self.output.clone()),
            SinkFormat::Batch => {
                let dir = if self.output.extension().is_some() {
                    self.output.parent().map(PathBuf::from).unwrap_or_default()
                } else {
                    self.output.clone()
                };
                SinkTarget::Batches {
                    dir,
                    batch_size: self.batch_size,
                }
            },
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        match &self.summary {
            Some(path) => path.clone(),
            None => default_summary_path(self.sink_target().path(), self.format),
        }
    }
}

/// Lexical comparison ignoring `.` components
fn same_path(a: &Path, b: &Path) -> bool {
    let normal = |p: &Path| {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect::<PathBuf>()
    };
    normal(a) == normal(b)
}

fn invalid(msg: &str) -> IngestError {
    IngestError::InvalidConfig(msg.to_string())
}

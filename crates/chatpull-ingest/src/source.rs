//! Record sources
//!
//! A [`RowSource`] hands out raw rows page by page, forward only. Sources
//! are never rewound: once a page has been returned the next call picks up
//! where it left off.

use crate::error::{IngestError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

/// A raw row and its position in the source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub index: u64,
    pub value: Value,
}

/// One page pulled from a source
#[derive(Debug, Default)]
pub struct RowPage {
    /// Rows in source order. Empty together with `failure == None` means the
    /// source is exhausted.
    pub rows: Vec<SourceRow>,

    /// Total rows in the source, when the source knows it
    pub total: Option<u64>,

    /// A failure hit after `rows` were read. The rows before it are still
    /// valid and are consumed first.
    pub failure: Option<IngestError>,
}

impl RowPage {
    pub fn is_exhausted(&self) -> bool {
        self.rows.is_empty() && self.failure.is_none()
    }
}

/// A sequential, forward-only supplier of raw rows
#[async_trait]
pub trait RowSource: Send {
    /// Pull up to `max_rows` further rows
    async fn fetch_page(&mut self, max_rows: usize) -> Result<RowPage>;

    /// Human-readable name for logs
    fn describe(&self) -> String;
}

/// Rows read from a local JSONL file, one object per line
pub struct LocalFileSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    next_index: u64,
}

impl LocalFileSource {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|err| {
            IngestError::source_unavailable(format!("cannot open {}: {}", path.display(), err))
        })?;

        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
            next_index: 0,
        })
    }
}

#[async_trait]
impl RowSource for LocalFileSource {
    async fn fetch_page(&mut self, max_rows: usize) -> Result<RowPage> {
        let mut page = RowPage::default();

        while page.rows.len() < max_rows {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    page.failure = Some(IngestError::source_unavailable(format!(
                        "read error in {}: {}",
                        self.path.display(),
                        err
                    )));
                    break;
                },
            };

            if line.trim().is_empty() {
                continue;
            }

            let index = self.next_index;
            self.next_index += 1;

            match serde_json::from_str(&line) {
                Ok(value) => page.rows.push(SourceRow { index, value }),
                Err(err) => {
                    page.failure = Some(IngestError::malformed(index, format!("invalid JSON: {err}")));
                    break;
                },
            }
        }

        debug!(
            source = %self.path.display(),
            rows = page.rows.len(),
            next_index = self.next_index,
            "Read page from local file"
        );
        Ok(page)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_file_pages_and_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        std::fs::write(&path, "{\"a\":1}\n\n{\"a\":2}\n{\"a\":3}\n").unwrap();

        let mut source = LocalFileSource::open(&path).await.unwrap();

        let first = source.fetch_page(2).await.unwrap();
        assert_eq!(first.rows.len(), 2);
        assert_eq!(first.rows[1].index, 1);
        assert_eq!(first.rows[1].value["a"], 2);

        let second = source.fetch_page(2).await.unwrap();
        assert_eq!(second.rows.len(), 1);

        let third = source.fetch_page(2).await.unwrap();
        assert!(third.is_exhausted());
    }

    #[tokio::test]
    async fn test_invalid_line_keeps_preceding_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        std::fs::write(&path, "{\"a\":1}\n{broken\n{\"a\":3}\n").unwrap();

        let mut source = LocalFileSource::open(&path).await.unwrap();
        let page = source.fetch_page(10).await.unwrap();

        assert_eq!(page.rows.len(), 1);
        assert!(matches!(
            page.failure,
            Some(IngestError::MalformedRecord { index: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocalFileSource::open(dir.path().join("nope.jsonl")).await;
        assert!(matches!(result, Err(IngestError::SourceUnavailable(_))));
    }
}

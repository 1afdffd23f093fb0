//! Output sinks
//!
//! A sink appends encoded records as they arrive. The JSONL sink is the
//! canonical one: each record is written as one complete line, so the file
//! is parseable after every record. The batch sink writes self-contained
//! JSON array files of `batch_size` records each.
//!
//! Sinks always start from scratch. An existing output is only replaced
//! when the caller explicitly allows it.

use crate::encode::{encode_line, encode_value, Transform};
use crate::error::{IngestError, Result};
use crate::record::Conversation;
use chatpull_common::checksum::StreamingChecksum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name prefix of batch files
pub const BATCH_FILE_PREFIX: &str = "conversations_batch_";

/// On-disk layout of the primary output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    /// One JSON record per line
    #[default]
    Jsonl,
    /// Directory of JSON array files
    Batch,
}

impl std::fmt::Display for SinkFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkFormat::Jsonl => f.write_str("jsonl"),
            SinkFormat::Batch => f.write_str("batch"),
        }
    }
}

/// What a finished (or aborted) sink holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub records: u64,
    pub bytes: u64,
    /// SHA-256 of the JSONL file; batch sinks leave this empty
    pub sha256: Option<String>,
    pub files: Vec<PathBuf>,
}

/// Destination for encoded records
pub trait RecordSink: Send {
    /// Append one record. On error nothing partial of this record survives
    /// once [`RecordSink::abort`] has run.
    fn write_record(&mut self, conversation: &Conversation) -> Result<()>;

    /// Flush, sync to disk and close
    fn finish(self: Box<Self>) -> Result<SinkReport>;

    /// Best-effort close after a failure: keep every complete record, drop
    /// any trailing partial write.
    fn abort(self: Box<Self>);
}

/// Where and how records are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    JsonLines(PathBuf),
    Batches { dir: PathBuf, batch_size: usize },
}

impl SinkTarget {
    pub fn format(&self) -> SinkFormat {
        match self {
            SinkTarget::JsonLines(_) => SinkFormat::Jsonl,
            SinkTarget::Batches { .. } => SinkFormat::Batch,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            SinkTarget::JsonLines(path) => path,
            SinkTarget::Batches { dir, .. } => dir,
        }
    }

    /// Refuse to clobber earlier output unless `overwrite` is set.
    ///
    /// Called before the source is contacted so a forgotten `--force` costs
    /// nothing.
    pub fn check_overwrite(&self, overwrite: bool) -> Result<()> {
        match self {
            SinkTarget::JsonLines(path) => {
                if path.is_dir() {
                    return Err(IngestError::InvalidConfig(format!(
                        "output '{}' is a directory",
                        path.display()
                    )));
                }
                if path.exists() && !overwrite {
                    return Err(IngestError::OutputExists(path.clone()));
                }
            },
            SinkTarget::Batches { dir, .. } => {
                let existing = existing_batch_files(dir).map_err(|err| IngestError::sink(dir, err))?;
                if !existing.is_empty() && !overwrite {
                    return Err(IngestError::OutputExists(dir.clone()));
                }
            },
        }
        Ok(())
    }

    /// Create the sink, replacing earlier output when `overwrite` is set
    pub fn open(&self, transform: Transform, overwrite: bool) -> Result<Box<dyn RecordSink>> {
        self.check_overwrite(overwrite)?;
        match self {
            SinkTarget::JsonLines(path) => {
                if path.exists() {
                    warn!(path = %path.display(), "Overwriting existing output");
                }
                Ok(Box::new(JsonLinesSink::create(path, transform)?))
            },
            SinkTarget::Batches { dir, batch_size } => {
                let sink = BatchSink::create(dir, *batch_size, transform)?;
                Ok(Box::new(sink))
            },
        }
    }
}

// ============================================================================
// JSONL Sink
// ============================================================================

/// Line-delimited JSON sink
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
    transform: Transform,
    checksum: StreamingChecksum,
    records: u64,
}

impl JsonLinesSink {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl Into<PathBuf>, transform: Transform) -> Result<Self> {
        let path = path.into();
        ensure_parent_dir(&path)?;

        // Read access is needed to trim a partial tail on abort.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|err| IngestError::sink(&path, err))?;

        Ok(Self::from_file(path, file, transform))
    }

    fn from_file(path: PathBuf, file: File, transform: Transform) -> Self {
        Self {
            path,
            writer: BufWriter::new(file),
            transform,
            checksum: StreamingChecksum::new(),
            records: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonLinesSink {
    fn write_record(&mut self, conversation: &Conversation) -> Result<()> {
        let line = encode_line(conversation, self.transform)
            .map_err(|err| IngestError::sink(&self.path, err.into()))?;
        self.writer
            .write_all(&line)
            .map_err(|err| IngestError::sink(&self.path, err))?;
        self.checksum.update(&line);
        self.records += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<SinkReport> {
        let JsonLinesSink {
            path,
            writer,
            checksum,
            records,
            ..
        } = *self;

        let file = match writer.into_inner() {
            Ok(file) => file,
            Err(err) => {
                let (source, writer) = err.into_parts();
                let (mut file, _unflushed) = writer.into_parts();
                if let Err(repair) = trim_partial_tail(&mut file) {
                    warn!(path = %path.display(), error = %repair, "Could not repair sink tail");
                }
                return Err(IngestError::sink(&path, source));
            },
        };
        file.sync_all().map_err(|err| IngestError::sink(&path, err))?;

        debug!(path = %path.display(), records, bytes = checksum.bytes(), "Closed JSONL sink");
        Ok(SinkReport {
            records,
            bytes: checksum.bytes(),
            sha256: Some(checksum.finalize()),
            files: vec![path],
        })
    }

    fn abort(self: Box<Self>) {
        let JsonLinesSink { path, writer, .. } = *self;

        let mut file = match writer.into_inner() {
            Ok(file) => file,
            Err(err) => {
                warn!(path = %path.display(), error = %err.error(), "Flush failed while aborting sink");
                let (file, _unflushed) = err.into_inner().into_parts();
                file
            },
        };

        match trim_partial_tail(&mut file).and_then(|len| file.sync_all().map(|_| len)) {
            Ok(len) => debug!(path = %path.display(), bytes = len, "Aborted JSONL sink"),
            Err(err) => warn!(path = %path.display(), error = %err, "Could not repair sink tail"),
        }
    }
}

/// Truncate `file` after its last newline so no half-written line remains.
/// Returns the resulting length.
pub fn trim_partial_tail(file: &mut File) -> io::Result<u64> {
    const CHUNK: u64 = 8192;

    let len = file.metadata()?.len();
    let mut end = len;
    let mut buf = vec![0u8; CHUNK as usize];

    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;

        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            let keep = start + pos as u64 + 1;
            if keep < len {
                file.set_len(keep)?;
            }
            file.seek(SeekFrom::End(0))?;
            return Ok(keep);
        }
        end = start;
    }

    if len > 0 {
        file.set_len(0)?;
    }
    file.seek(SeekFrom::Start(0))?;
    Ok(0)
}

// ============================================================================
// Batch Sink
// ============================================================================

/// Writes `conversations_batch_NNNN.json` array files
pub struct BatchSink {
    dir: PathBuf,
    batch_size: usize,
    transform: Transform,
    pending: Vec<Value>,
    files: Vec<PathBuf>,
    records: u64,
    bytes: u64,
}

impl BatchSink {
    /// Prepare `dir`, removing batch files left by an earlier run
    pub fn create(dir: impl Into<PathBuf>, batch_size: usize, transform: Transform) -> Result<Self> {
        let dir = dir.into();
        if batch_size == 0 {
            return Err(IngestError::InvalidConfig("batch size must be positive".to_string()));
        }

        std::fs::create_dir_all(&dir).map_err(|err| IngestError::sink(&dir, err))?;
        for stale in existing_batch_files(&dir).map_err(|err| IngestError::sink(&dir, err))? {
            warn!(path = %stale.display(), "Removing batch file from previous run");
            std::fs::remove_file(&stale).map_err(|err| IngestError::sink(&stale, err))?;
        }

        Ok(Self {
            dir,
            batch_size,
            transform,
            pending: Vec::with_capacity(batch_size),
            files: Vec::new(),
            records: 0,
            bytes: 0,
        })
    }

    fn batch_path(&self, number: usize) -> PathBuf {
        self.dir.join(format!("{BATCH_FILE_PREFIX}{number:04}.json"))
    }

    /// Write pending records as the next batch file. The file appears under
    /// its final name only once it is complete.
    fn flush_batch(&mut self) -> Result<()> {
        let path = self.batch_path(self.files.len());
        let tmp = path.with_extension("json.tmp");

        let written = write_json_array(&tmp, &self.pending).map_err(|err| IngestError::sink(&tmp, err))?;
        std::fs::rename(&tmp, &path).map_err(|err| IngestError::sink(&path, err))?;

        debug!(path = %path.display(), records = self.pending.len(), "Wrote batch file");
        self.bytes += written;
        self.files.push(path);
        self.pending.clear();
        Ok(())
    }
}

impl RecordSink for BatchSink {
    fn write_record(&mut self, conversation: &Conversation) -> Result<()> {
        let value = encode_value(conversation, self.transform)
            .map_err(|err| IngestError::sink(&self.dir, err.into()))?;
        self.pending.push(value);
        self.records += 1;

        if self.pending.len() >= self.batch_size {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<SinkReport> {
        // An empty run still leaves one (empty) array behind.
        if !self.pending.is_empty() || self.files.is_empty() {
            self.flush_batch()?;
        }

        Ok(SinkReport {
            records: self.records,
            bytes: self.bytes,
            sha256: None,
            files: self.files,
        })
    }

    fn abort(mut self: Box<Self>) {
        if self.pending.is_empty() {
            return;
        }
        if let Err(err) = self.flush_batch() {
            warn!(dir = %self.dir.display(), error = %err, "Could not write final partial batch");
        }
    }
}

fn write_json_array(path: &Path, values: &[Value]) -> io::Result<u64> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, values)?;
    writer.write_all(b"\n")?;
    let file = writer.into_inner().map_err(|err| err.into_error())?;
    file.sync_all()?;
    file.metadata().map(|meta| meta.len())
}

/// Batch files in `dir`, sorted by name
pub fn existing_batch_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_batch = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(BATCH_FILE_PREFIX) && name.ends_with(".json"));
        if is_batch {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| IngestError::sink(parent, err))?;
    }
    Ok(())
}

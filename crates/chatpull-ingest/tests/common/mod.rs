//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chatpull_ingest::{IngestConfig, IngestError, Result, RowPage, RowSource, SourceInfo, SourceRow};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const MODELS: [&str; 3] = ["vicuna-13b", "koala-13b", "alpaca-13b"];
pub const LANGUAGES: [&str; 2] = ["English", "Portuguese"];

/// A conversation row shaped like the hub's, deterministic in `i`
pub fn row(i: u64) -> Value {
    let turns = 1 + i % 3;
    let mut conversation = Vec::new();
    for t in 0..turns {
        conversation.push(json!({"role": "user", "content": format!("question {i}.{t}")}));
        conversation.push(json!({"role": "assistant", "content": format!("answer {i}.{t}")}));
    }
    json!({
        "conversation_id": format!("conv-{i:04}"),
        "model": MODELS[(i % 3) as usize],
        "conversation": conversation,
        "turn": turns,
        "language": LANGUAGES[(i % 2) as usize],
        "openai_moderation": [{"flagged": false, "categories": {"hate": false}}],
        "redacted": i % 5 == 0,
    })
}

pub fn rows(n: u64) -> Vec<Value> {
    (0..n).map(row).collect()
}

/// Write rows as a JSONL file a `LocalFileSource` can read
pub fn write_rows(path: &Path, rows: &[Value]) {
    let content: String = rows.iter().map(|r| format!("{r}\n")).collect();
    std::fs::write(path, content).unwrap();
}

pub fn read_lines(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

pub fn source_info() -> SourceInfo {
    SourceInfo {
        dataset: "test/in-memory".to_string(),
        config: Some("default".to_string()),
        split: Some("train".to_string()),
    }
}

/// Config writing into `dir` with progress hidden
pub fn config_in(dir: &Path, limit: u64) -> IngestConfig {
    IngestConfig {
        limit,
        output: dir.join("conversations.jsonl"),
        show_progress: false,
        page_size: 4,
        ..IngestConfig::default()
    }
}

/// How a [`VecSource`] fails
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    /// Fail once `after` rows were served
    Unavailable { after: u64 },
    /// Reject the very first request
    Unauthorized,
}

/// In-memory source that serves rows in pages and records each request
pub struct VecSource {
    rows: Vec<Value>,
    cursor: usize,
    failure: Option<Failure>,
    pub requests: Arc<Mutex<Vec<usize>>>,
}

impl VecSource {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows,
            cursor: 0,
            failure: None,
            requests: Arc::default(),
        }
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failure = Some(failure);
        self
    }
}

#[async_trait]
impl RowSource for VecSource {
    async fn fetch_page(&mut self, max_rows: usize) -> Result<RowPage> {
        self.requests.lock().unwrap().push(max_rows);

        match self.failure {
            Some(Failure::Unauthorized) => {
                return Err(IngestError::AuthenticationFailure("token rejected".to_string()));
            },
            Some(Failure::Unavailable { after }) if self.cursor as u64 >= after => {
                return Err(IngestError::source_unavailable("connection reset"));
            },
            _ => {},
        }

        let mut end = (self.cursor + max_rows).min(self.rows.len());
        let mut failure = None;
        if let Some(Failure::Unavailable { after }) = self.failure {
            if (after as usize) < end {
                end = after as usize;
                failure = Some(IngestError::source_unavailable("connection reset"));
            }
        }

        let rows = (self.cursor..end)
            .map(|i| SourceRow {
                index: i as u64,
                value: self.rows[i].clone(),
            })
            .collect();
        self.cursor = end;

        Ok(RowPage {
            rows,
            total: Some(self.rows.len() as u64),
            failure,
        })
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

//! End-to-end tests for the ingestion pipeline over in-memory sources

mod common;

use async_trait::async_trait;
use chatpull_ingest::pipeline;
use chatpull_ingest::sink::existing_batch_files;
use chatpull_ingest::verify::verify;
use chatpull_ingest::{
    IngestConfig, IngestError, Result, RowPage, RowSource, SinkFormat, Summary, Transform,
};
use common::{config_in, read_lines, rows, source_info, Failure, VecSource, LANGUAGES, MODELS};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn run(config: &IngestConfig, source: VecSource) -> Result<pipeline::RunOutcome> {
    pipeline::pull(config, Box::new(source), source_info(), CancellationToken::new()).await
}

fn distribution(values: &[Value], field: &str) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for value in values {
        *counts.entry(value[field].as_str().unwrap().to_string()).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// Counts and tallies
// ============================================================================

#[tokio::test]
async fn test_writes_exactly_limit_records() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 10);

    let outcome = run(&config, VecSource::new(rows(25))).await.unwrap();

    let lines = read_lines(&config.output);
    assert_eq!(lines.len(), 10);
    assert_eq!(outcome.summary.total_conversations, 10);
    assert!(outcome.summary.complete);
    assert!(!outcome.interrupted);
    assert_eq!(outcome.summary_path, dir.path().join("metadata.json"));
}

#[tokio::test]
async fn test_stops_early_when_source_is_short() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 100);

    let outcome = run(&config, VecSource::new(rows(7))).await.unwrap();

    assert_eq!(read_lines(&config.output).len(), 7);
    assert_eq!(outcome.summary.total_conversations, 7);
    assert!(outcome.summary.complete);
}

#[tokio::test]
async fn test_summary_matches_sink_contents() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 12);

    run(&config, VecSource::new(rows(30))).await.unwrap();

    let lines = read_lines(&config.output);
    let summary = Summary::load(&dir.path().join("metadata.json")).unwrap();

    assert_eq!(summary.model_distribution, distribution(&lines, "model"));
    assert_eq!(summary.language_distribution, distribution(&lines, "language"));
    assert_eq!(summary.model_distribution.values().sum::<u64>(), 12);
    assert_eq!(summary.language_distribution.values().sum::<u64>(), 12);

    let mut models: Vec<String> = MODELS.iter().map(|m| m.to_string()).collect();
    models.sort();
    assert_eq!(summary.models, models);
    let mut languages: Vec<String> = LANGUAGES.iter().map(|l| l.to_string()).collect();
    languages.sort();
    assert_eq!(summary.languages, languages);

    let messages: u64 = lines
        .iter()
        .map(|l| l["conversation"].as_array().unwrap().len() as u64)
        .sum();
    assert_eq!(summary.total_messages, messages);
    assert_eq!(summary.source.dataset, "test/in-memory");
    assert_eq!(summary.output.format, SinkFormat::Jsonl);
    assert_eq!(summary.output.files, vec![config.output.clone()]);

    verify(&dir.path().join("metadata.json")).unwrap();
}

#[tokio::test]
async fn test_raw_records_are_written_losslessly() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 5);
    let source_rows = rows(5);

    run(&config, VecSource::new(source_rows.clone())).await.unwrap();

    assert_eq!(read_lines(&config.output), source_rows);
}

#[tokio::test]
async fn test_clean_transform() {
    let dir = tempfile::tempdir().unwrap();
    let config = IngestConfig {
        transform: Transform::Clean,
        ..config_in(dir.path(), 3)
    };

    run(&config, VecSource::new(rows(3))).await.unwrap();

    let lines = read_lines(&config.output);
    assert_eq!(lines[2]["id"], "conv-0002");
    assert_eq!(lines[2]["turn_count"], 3);
    assert_eq!(lines[2]["total_messages"], 6);
    assert_eq!(lines[2]["user_messages"], 3);
    assert_eq!(lines[2]["assistant_messages"], 3);
    assert!(lines[2].get("openai_moderation").is_none());

    verify(&dir.path().join("metadata.json")).unwrap();
}

// ============================================================================
// Empty runs
// ============================================================================

#[tokio::test]
async fn test_zero_limit_makes_no_request() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 0);
    let source = VecSource::new(rows(5));
    let requests = source.requests.clone();

    let outcome = run(&config, source).await.unwrap();

    assert!(requests.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_to_string(&config.output).unwrap(), "");
    assert_eq!(outcome.summary.total_conversations, 0);
    assert_eq!(outcome.summary.avg_messages_per_conversation, 0.0);
    assert!(outcome.summary.models.is_empty());
    assert!(outcome.summary.complete);
}

#[tokio::test]
async fn test_empty_source() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 10);

    let outcome = run(&config, VecSource::new(Vec::new())).await.unwrap();

    assert_eq!(std::fs::read_to_string(&config.output).unwrap(), "");
    assert_eq!(outcome.summary.total_conversations, 0);
    assert!(outcome.summary.model_distribution.is_empty());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_malformed_record_keeps_earlier_records() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 20);
    let mut source_rows = rows(20);
    source_rows[6].as_object_mut().unwrap().remove("language");

    let err = run(&config, VecSource::new(source_rows.clone())).await.unwrap_err();

    assert!(matches!(err, IngestError::MalformedRecord { index: 6, .. }));
    assert_eq!(err.exit_code(), 5);
    assert_eq!(read_lines(&config.output), source_rows[..6].to_vec());
    assert!(!dir.path().join("metadata.json").exists());
}

#[tokio::test]
async fn test_source_failure_mid_stream_keeps_partial_sink() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 20);
    let source = VecSource::new(rows(20)).failing(Failure::Unavailable { after: 9 });

    let err = run(&config, source).await.unwrap_err();

    assert!(matches!(err, IngestError::SourceUnavailable(_)));
    assert_eq!(err.exit_code(), 4);
    let lines = read_lines(&config.output);
    assert_eq!(lines.len(), 9);
    assert_eq!(lines, rows(9));
}

#[tokio::test]
async fn test_rejected_credential_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 20);
    let source = VecSource::new(rows(20)).failing(Failure::Unauthorized);

    let err = run(&config, source).await.unwrap_err();

    assert!(matches!(err, IngestError::AuthenticationFailure(_)));
    assert_eq!(err.exit_code(), 3);
    assert!(!config.output.exists());
    assert!(!dir.path().join("metadata.json").exists());
}

// ============================================================================
// Overwrite
// ============================================================================

#[tokio::test]
async fn test_existing_output_is_refused_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 3);
    std::fs::write(&config.output, "previous\n").unwrap();
    let source = VecSource::new(rows(3));
    let requests = source.requests.clone();

    let err = run(&config, source).await.unwrap_err();

    assert!(matches!(err, IngestError::OutputExists(_)));
    assert!(err.to_string().contains("--force"));
    assert!(requests.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_to_string(&config.output).unwrap(), "previous\n");
}

#[tokio::test]
async fn test_rerun_with_force_replaces_output() {
    let dir = tempfile::tempdir().unwrap();
    let first = config_in(dir.path(), 8);
    run(&first, VecSource::new(rows(8))).await.unwrap();

    let second = IngestConfig {
        overwrite: true,
        ..config_in(dir.path(), 3)
    };
    let outcome = run(&second, VecSource::new(rows(8))).await.unwrap();

    assert_eq!(read_lines(&second.output).len(), 3);
    assert_eq!(outcome.summary.total_conversations, 3);
    verify(&outcome.summary_path).unwrap();
}

#[tokio::test]
async fn test_failed_rerun_removes_previous_summary() {
    let dir = tempfile::tempdir().unwrap();
    run(&config_in(dir.path(), 8), VecSource::new(rows(8))).await.unwrap();
    assert!(dir.path().join("metadata.json").exists());

    let mut broken = rows(8);
    broken[1] = json!({"conversation_id": "no-labels"});
    let config = IngestConfig {
        overwrite: true,
        ..config_in(dir.path(), 8)
    };
    run(&config, VecSource::new(broken)).await.unwrap_err();

    assert!(!dir.path().join("metadata.json").exists());
    assert_eq!(read_lines(&config.output).len(), 1);
}

#[tokio::test]
async fn test_summary_colliding_with_output_is_rejected_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let config = IngestConfig {
        output: dir.path().join("metadata.json"),
        ..config_in(dir.path(), 5)
    };
    let source = VecSource::new(rows(5));
    let requests = source.requests.clone();

    let err = run(&config, source).await.unwrap_err();

    assert!(matches!(err, IngestError::InvalidConfig(_)));
    assert!(requests.lock().unwrap().is_empty());
    assert!(!config.output.exists());
}

// ============================================================================
// Interruption
// ============================================================================

/// Cancels the token on its second page request
struct CancellingSource {
    inner: VecSource,
    pages: usize,
    cancel: CancellationToken,
}

#[async_trait]
impl RowSource for CancellingSource {
    async fn fetch_page(&mut self, max_rows: usize) -> Result<RowPage> {
        self.pages += 1;
        if self.pages == 2 {
            self.cancel.cancel();
        }
        self.inner.fetch_page(max_rows).await
    }

    fn describe(&self) -> String {
        "cancelling".to_string()
    }
}

#[tokio::test]
async fn test_interrupt_finishes_sink_and_marks_summary_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 40);
    let cancel = CancellationToken::new();
    let source = CancellingSource {
        inner: VecSource::new(rows(40)),
        pages: 0,
        cancel: cancel.clone(),
    };

    let outcome = pipeline::pull(&config, Box::new(source), source_info(), cancel)
        .await
        .unwrap();

    assert!(outcome.interrupted);
    assert!(!outcome.summary.complete);

    let lines = read_lines(&config.output);
    assert!(lines.len() >= config.page_size);
    assert!(lines.len() < 40);
    assert_eq!(outcome.summary.total_conversations, lines.len() as u64);
    verify(&outcome.summary_path).unwrap();
}

#[tokio::test]
async fn test_cancelled_before_start_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 10);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline::pull(&config, Box::new(VecSource::new(rows(10))), source_info(), cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Interrupted));
    assert_eq!(err.exit_code(), 130);
    assert!(!config.output.exists());
}

/// Never answers, like a hub that stopped responding
struct HangingSource;

#[async_trait]
impl RowSource for HangingSource {
    async fn fetch_page(&mut self, _max_rows: usize) -> Result<RowPage> {
        std::future::pending().await
    }

    fn describe(&self) -> String {
        "hanging".to_string()
    }
}

#[tokio::test]
async fn test_interrupt_during_first_page_does_not_wait() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 10);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline::pull(&config, Box::new(HangingSource), source_info(), cancel),
    )
    .await
    .expect("pull should return promptly after an interrupt");

    assert!(matches!(result, Err(IngestError::Interrupted)));
    assert!(!config.output.exists());
}

// ============================================================================
// Batch sink
// ============================================================================

#[tokio::test]
async fn test_batch_mode() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("batches");
    let config = IngestConfig {
        format: SinkFormat::Batch,
        batch_size: 4,
        output: out.clone(),
        ..config_in(dir.path(), 10)
    };

    let outcome = run(&config, VecSource::new(rows(10))).await.unwrap();

    let files = existing_batch_files(&out).unwrap();
    assert_eq!(files.len(), 3);
    assert_eq!(outcome.summary.output.files, files);
    assert_eq!(outcome.summary_path, out.join("metadata.json"));

    let last: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(&files[2]).unwrap()).unwrap();
    assert_eq!(last.len(), 2);
    assert_eq!(last[1]["conversation_id"], json!("conv-0009"));

    verify(&outcome.summary_path).unwrap();
}

//! Ingestion pipeline
//!
//! One sequential flow: pull a record, append it to the sink, count it,
//! maybe redraw progress, repeat. A record is tallied only after its write
//! succeeded, so the tallies always describe exactly what is in the sink.
//!
//! Interruption is checked between records. When it fires the sink is
//! finished normally and the summary is marked incomplete.

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::progress::ProgressReporter;
use crate::sink::{RecordSink, SinkReport};
use crate::source::RowSource;
use crate::stream::ConversationStream;
use crate::summary::{SourceInfo, Summary};
use crate::tally::RunningTallies;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// What [`persist`] produced
#[derive(Debug)]
pub struct Persisted {
    pub tallies: RunningTallies,
    pub report: SinkReport,
    pub interrupted: bool,
}

/// Result of a full run
#[derive(Debug)]
pub struct RunOutcome {
    pub summary: Summary,
    pub summary_path: PathBuf,
    pub interrupted: bool,
}

/// Run one ingestion end to end.
///
/// Order matters: the output is checked before the source is contacted,
/// and the source is opened (first page fetched) before the sink is
/// created, so credential failures never leave a file behind.
#[instrument(skip_all, fields(source = %source.describe(), limit = config.limit))]
pub async fn pull(
    config: &IngestConfig,
    source: Box<dyn RowSource>,
    source_info: SourceInfo,
    cancel: CancellationToken,
) -> Result<RunOutcome> {
    config.validate()?;

    let target = config.sink_target();
    target.check_overwrite(config.overwrite)?;

    let stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(IngestError::Interrupted),
        opened = ConversationStream::open(source, config.limit, config.page_size) => opened?,
    };
    let summary_path = config.summary_path();
    remove_stale_summary(&summary_path)?;
    let sink = target.open(config.transform, config.overwrite)?;
    let progress = ProgressReporter::new(stream.target(), config.report_every, config.show_progress);

    info!(
        output = %target.path().display(),
        format = %target.format(),
        target = stream.target(),
        "Starting ingestion"
    );

    let persisted = persist(stream, sink, progress, &cancel).await?;
    let interrupted = persisted.interrupted;

    let summary = Summary::build(
        persisted.tallies,
        persisted.report,
        source_info,
        target.format(),
        config.transform,
        target.path().to_path_buf(),
        !interrupted,
    )?;
    summary.write(&summary_path)?;

    info!(
        records = summary.total_conversations,
        models = summary.models.len(),
        languages = summary.languages.len(),
        summary = %summary_path.display(),
        interrupted,
        "Ingestion finished"
    );

    Ok(RunOutcome {
        summary,
        summary_path,
        interrupted,
    })
}

/// Drain `stream` into `sink`, one record at a time.
///
/// On any error the sink is aborted (complete records kept, partial tail
/// dropped) and the error is returned.
pub async fn persist(
    stream: ConversationStream,
    mut sink: Box<dyn RecordSink>,
    mut progress: ProgressReporter,
    cancel: &CancellationToken,
) -> Result<Persisted> {
    let mut tallies = RunningTallies::new();
    let mut interrupted = false;

    let records = stream.into_stream();
    futures::pin_mut!(records);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                interrupted = true;
                break;
            }
            next = records.next() => next,
        };

        let conversation = match next {
            None => break,
            Some(Ok(conversation)) => conversation,
            Some(Err(err)) => return Err(fail(sink, &progress, err)),
        };

        if let Err(err) = sink.write_record(&conversation) {
            return Err(fail(sink, &progress, err));
        }
        tallies.observe(&conversation);
        progress.record();
    }

    if interrupted {
        warn!(records = tallies.records, "Interrupted; keeping records written so far");
        progress.abandon("interrupted");
    } else {
        progress.finish("done");
    }

    let report = sink.finish()?;
    Ok(Persisted {
        tallies,
        report,
        interrupted,
    })
}

/// A summary left by an earlier run no longer describes the new sink
fn remove_stale_summary(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            warn!(path = %path.display(), "Removed summary from previous run");
            Ok(())
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(IngestError::summary(path, err)),
    }
}

fn fail(sink: Box<dyn RecordSink>, progress: &ProgressReporter, err: IngestError) -> IngestError {
    debug!(
        kind = err.kind(),
        error = %err,
        records = progress.processed(),
        "Ingestion failed; keeping records written so far"
    );
    progress.abandon(err.kind());
    sink.abort();
    err
}

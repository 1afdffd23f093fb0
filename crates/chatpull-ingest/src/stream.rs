//! Stream ingestor
//!
//! [`ConversationStream`] turns a paged [`RowSource`] into a lazy, ordered,
//! single-pass sequence of validated [`Conversation`]s that stops after
//! `min(limit, available)` records. At most one page is held in memory.
//!
//! The first page is fetched by [`ConversationStream::open`], so a rejected
//! credential or unreachable source is reported before anything is written.
//! After the first error the sequence is over: every later call yields
//! `None`.

use crate::error::{IngestError, Result};
use crate::record::Conversation;
use crate::source::{RowSource, SourceRow};
use futures::Stream;
use std::collections::VecDeque;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    /// Source has no rows left; drain the buffer
    Draining,
    Done,
}

/// Lazy, forward-only sequence of conversations
pub struct ConversationStream {
    source: Box<dyn RowSource>,
    limit: u64,
    page_size: usize,
    yielded: u64,
    buffer: VecDeque<SourceRow>,
    pending_failure: Option<IngestError>,
    total: Option<u64>,
    state: State,
}

impl ConversationStream {
    /// Open a stream over `source` that yields at most `limit` records,
    /// requesting `page_size` rows at a time.
    pub async fn open(source: Box<dyn RowSource>, limit: u64, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(IngestError::InvalidConfig("page size must be positive".to_string()));
        }

        let mut stream = Self {
            source,
            limit,
            page_size,
            yielded: 0,
            buffer: VecDeque::new(),
            pending_failure: None,
            total: None,
            state: State::Open,
        };

        if limit == 0 {
            stream.state = State::Done;
        } else {
            stream.fill().await?;
        }

        info!(
            source = %stream.source.describe(),
            limit,
            available = ?stream.total,
            "Opened conversation stream"
        );
        Ok(stream)
    }

    /// Expected number of records: the limit, capped by the source's total
    /// when the source reports one.
    pub fn target(&self) -> u64 {
        match self.total {
            Some(total) => total.min(self.limit),
            None => self.limit,
        }
    }

    /// Records yielded so far
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Pull the next record
    pub async fn next_record(&mut self) -> Option<Result<Conversation>> {
        loop {
            if self.state == State::Done {
                return None;
            }
            if self.yielded >= self.limit {
                self.state = State::Done;
                return None;
            }

            if let Some(row) = self.buffer.pop_front() {
                return match Conversation::from_row(row.index, row.value) {
                    Ok(conversation) => {
                        self.yielded += 1;
                        Some(Ok(conversation))
                    },
                    Err(err) => self.fail(err),
                };
            }

            if let Some(err) = self.pending_failure.take() {
                return self.fail(err);
            }

            if self.state == State::Draining {
                debug!(yielded = self.yielded, "Source exhausted");
                self.state = State::Done;
                return None;
            }

            if let Err(err) = self.fill().await {
                return self.fail(err);
            }
        }
    }

    /// Adapt into a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = Result<Conversation>> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next_record().await.map(|item| (item, stream))
        })
    }

    fn fail(&mut self, err: IngestError) -> Option<Result<Conversation>> {
        self.state = State::Done;
        self.buffer.clear();
        Some(Err(err))
    }

    async fn fill(&mut self) -> Result<()> {
        let remaining = self.limit - self.yielded - self.buffer.len() as u64;
        let want = usize::try_from(remaining)
            .unwrap_or(usize::MAX)
            .min(self.page_size);

        let page = self.source.fetch_page(want).await?;
        if page.total.is_some() {
            self.total = page.total;
        }

        // A short page means the source has nothing more after it.
        if page.failure.is_none() && page.rows.len() < want {
            self.state = State::Draining;
        }

        self.pending_failure = page.failure;
        self.buffer.extend(page.rows);
        Ok(())
    }
}

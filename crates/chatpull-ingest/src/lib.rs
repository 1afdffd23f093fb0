//! chatpull ingest library
//!
//! Streams conversation records from the Hugging Face datasets server (or a
//! local JSONL file) into a sink, tallying models and languages along the
//! way, then writes a JSON summary beside the output.
//!
//! # Pipeline
//!
//! ```text
//! RowSource -> ConversationStream -> RecordSink
//!                                 \-> RunningTallies -> Summary
//! ```
//!
//! # Example
//!
//! ```no_run
//! use chatpull_ingest::{pipeline, IngestConfig, LocalFileSource, SourceInfo};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> chatpull_ingest::Result<()> {
//!     let config = IngestConfig { limit: 100, ..IngestConfig::default() };
//!     let source = LocalFileSource::open("rows.jsonl").await?;
//!     let info = SourceInfo { dataset: "rows.jsonl".into(), config: None, split: None };
//!     pipeline::pull(&config, Box::new(source), info, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod encode;
pub mod error;
pub mod hub;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod sink;
pub mod source;
pub mod stream;
pub mod summary;
pub mod tally;
pub mod verify;

pub use config::IngestConfig;
pub use encode::Transform;
pub use error::{IngestError, Result};
pub use hub::{DatasetRef, HubClient};
pub use record::{Conversation, Turn};
pub use sink::{RecordSink, SinkFormat, SinkReport, SinkTarget};
pub use source::{LocalFileSource, RowPage, RowSource, SourceRow};
pub use stream::ConversationStream;
pub use summary::{SourceInfo, Summary};

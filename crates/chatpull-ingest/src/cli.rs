//! Command-line definitions

use crate::config::{
    IngestConfig, DEFAULT_BATCH_SIZE, DEFAULT_CONFIG, DEFAULT_DATASET, DEFAULT_LIMIT,
    DEFAULT_OUTPUT, DEFAULT_SPLIT,
};
use crate::encode::Transform;
use crate::hub::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS, MAX_PAGE_ROWS};
use crate::progress::DEFAULT_REPORT_EVERY;
use crate::sink::SinkFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// chatpull - stream a conversation dataset into JSONL with a summary
#[derive(Parser, Debug)]
#[command(name = "chatpull")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download conversations and write them to the sink
    Pull(PullArgs),

    /// Re-read a sink and check it against its summary
    Verify {
        /// Summary file written by `pull`
        #[arg(long, env = "CHATPULL_SUMMARY", default_value = "data/metadata.json")]
        summary: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct PullArgs {
    /// Maximum number of conversations to ingest
    #[arg(short = 'n', long, env = "CHATPULL_LIMIT", default_value_t = DEFAULT_LIMIT)]
    pub limit: u64,

    /// Output file (JSONL) or directory (batch)
    #[arg(short, long, env = "CHATPULL_OUTPUT", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Dataset split
    #[arg(long, env = "CHATPULL_SPLIT", default_value = DEFAULT_SPLIT)]
    pub split: String,

    /// Records between progress updates
    #[arg(long, env = "CHATPULL_REPORT_EVERY", default_value_t = DEFAULT_REPORT_EVERY)]
    pub report_every: u64,

    /// Dataset repository on the hub
    #[arg(long, env = "CHATPULL_DATASET", default_value = DEFAULT_DATASET)]
    pub dataset: String,

    /// Dataset configuration
    #[arg(long, env = "CHATPULL_CONFIG", default_value = DEFAULT_CONFIG)]
    pub config: String,

    /// Summary path (defaults to metadata.json beside the output)
    #[arg(long, env = "CHATPULL_SUMMARY")]
    pub summary: Option<PathBuf>,

    /// Sink layout
    #[arg(long, value_enum, env = "CHATPULL_FORMAT", default_value_t = SinkFormat::Jsonl)]
    pub format: SinkFormat,

    /// Records per batch file
    #[arg(long, env = "CHATPULL_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Record encoding
    #[arg(long, value_enum, env = "CHATPULL_TRANSFORM", default_value_t = Transform::Raw)]
    pub transform: Transform,

    /// Replace existing output
    #[arg(short, long, env = "CHATPULL_FORCE")]
    pub force: bool,

    /// Hub access token (otherwise HUGGINGFACE_HUB_TOKEN, HF_TOKEN or the token file)
    #[arg(long)]
    pub token: Option<String>,

    /// Datasets server base URL
    #[arg(long, env = "CHATPULL_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Rows requested per page
    #[arg(long, env = "CHATPULL_PAGE_SIZE", default_value_t = MAX_PAGE_ROWS)]
    pub page_size: usize,

    /// Request timeout in seconds
    #[arg(long, env = "CHATPULL_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Read rows from a local JSONL file instead of the hub
    #[arg(long, env = "CHATPULL_FROM_FILE")]
    pub from_file: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

impl PullArgs {
    pub fn to_config(&self) -> IngestConfig {
        IngestConfig {
            dataset: self.dataset.clone(),
            config: self.config.clone(),
            split: self.split.clone(),
            limit: self.limit,
            output: self.output.clone(),
            summary: self.summary.clone(),
            format: self.format,
            batch_size: self.batch_size,
            transform: self.transform,
            report_every: self.report_every,
            show_progress: !self.quiet,
            overwrite: self.force,
            endpoint: self.endpoint.clone(),
            page_size: self.page_size,
            timeout_secs: self.timeout_secs,
        }
    }
}

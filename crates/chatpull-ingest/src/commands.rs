//! Subcommand implementations

use crate::cli::PullArgs;
use crate::error::Result;
use crate::hub::HubClient;
use crate::pipeline::{self, RunOutcome};
use crate::source::{LocalFileSource, RowSource};
use crate::summary::SourceInfo;
use crate::verify::{self, VerifyReport};
use chatpull_common::credentials::resolve_token;
use colored::Colorize;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// `chatpull pull`
pub async fn pull(args: &PullArgs, cancel: CancellationToken) -> Result<RunOutcome> {
    let config = args.to_config();
    config.validate()?;
    config.sink_target().check_overwrite(config.overwrite)?;

    let (source, source_info): (Box<dyn RowSource>, SourceInfo) = match &args.from_file {
        Some(path) => {
            info!(path = %path.display(), "Reading rows from local file");
            let source = LocalFileSource::open(path).await?;
            let info = SourceInfo {
                dataset: path.display().to_string(),
                config: None,
                split: None,
            };
            (Box::new(source), info)
        },
        None => {
            let token = resolve_token(args.token.as_deref())?;
            let dataset = config.dataset_ref();
            let client = HubClient::new(&config.endpoint, token, dataset.clone(), config.timeout())?;
            (Box::new(client), SourceInfo::from(&dataset))
        },
    };

    let outcome = pipeline::pull(&config, source, source_info, cancel).await?;

    let count = outcome.summary.total_conversations;
    let output = outcome.summary.output.path.display();
    if outcome.interrupted {
        println!(
            "{} Interrupted after {} conversations → {}",
            "!".yellow().bold(),
            count,
            output
        );
    } else {
        println!("{} {} conversations → {}", "✓".green().bold(), count, output);
    }
    println!("  summary: {}", outcome.summary_path.display().to_string().dimmed());

    Ok(outcome)
}

/// `chatpull verify`
pub fn verify(summary: &Path) -> Result<VerifyReport> {
    let report = verify::verify(summary)?;

    println!(
        "{} {} conversations in {} file(s) match {}",
        "✓".green().bold(),
        report.records,
        report.files.len(),
        summary.display()
    );
    if report.checksum_verified {
        println!("  sha256: {}", "ok".green());
    }

    Ok(report)
}

//! Progress reporting
//!
//! A fixed-width ASCII bar redrawn in place on stderr. The bar is only
//! touched every `report_every` records, plus one forced update at the end.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;

/// Default number of records between progress updates
pub const DEFAULT_REPORT_EVERY: u64 = 50_000;

const TEMPLATE: &str = "[{bar:40}] {pos}/{len} ({percent}%) {msg}";

/// Tracks processed records against a target
pub struct ProgressReporter {
    bar: ProgressBar,
    report_every: u64,
    target: u64,
    processed: u64,
    since_report: u64,
}

impl ProgressReporter {
    /// `report_every` is clamped to at least 1
    pub fn new(target: u64, report_every: u64, visible: bool) -> Self {
        let draw_target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };

        let bar = ProgressBar::with_draw_target(Some(target), draw_target);
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);

        Self {
            bar,
            report_every: report_every.max(1),
            target,
            processed: 0,
            since_report: 0,
        }
    }

    /// Count one record. Returns true when this record triggered an update.
    pub fn record(&mut self) -> bool {
        self.processed += 1;
        self.since_report += 1;

        if self.since_report >= self.report_every {
            self.since_report = 0;
            self.report();
            true
        } else {
            false
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    /// Percentage of the target reached; an empty target counts as done
    pub fn percent(&self) -> f64 {
        if self.target == 0 {
            100.0
        } else {
            (self.processed as f64 / self.target as f64 * 100.0).min(100.0)
        }
    }

    /// Forced final update showing the real count against the target
    pub fn finish(&self, message: &str) {
        self.report();
        self.bar.finish_with_message(message.to_string());
    }

    /// Leave the bar where it is after a failure
    pub fn abandon(&self, message: &str) {
        self.report();
        self.bar.abandon_with_message(message.to_string());
    }

    fn report(&self) {
        self.bar.set_position(self.processed);
        debug!(
            processed = self.processed,
            target = self.target,
            percent = %format!("{:.1}", self.percent()),
            "Progress"
        );
    }
}

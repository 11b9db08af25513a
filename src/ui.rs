// UI layer: reports pipeline progress in the terminal with an `indicatif`
// spinner and prints the final outcome.

use crate::error::PublishError;
use crate::pipeline::{PublishReport, Stage, StageObserver};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner whose message follows the step currently in progress.
pub struct SpinnerObserver {
    spinner: ProgressBar,
}

impl SpinnerObserver {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(100));
        SpinnerObserver { spinner }
    }

    /// Same observer, drawing nothing. Used with `--quiet`.
    pub fn hidden() -> Self {
        SpinnerObserver {
            spinner: ProgressBar::hidden(),
        }
    }
}

impl Default for SpinnerObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl StageObserver for SpinnerObserver {
    fn entered(&mut self, stage: Stage) {
        match stage {
            Stage::Done => self.spinner.finish_with_message("Published"),
            _ => self.spinner.set_message(format!("{}...", stage.next_action())),
        }
    }

    fn failed(&mut self, last: Stage, error: &PublishError) {
        self.spinner
            .abandon_with_message(format!("{} failed: {}", last.next_action(), error));
    }
}

/// Print the outcome of a successful run.
pub fn print_report(report: &PublishReport) {
    match report.comic_number {
        Some(n) => println!("Published xkcd #{n} as {}", report.post.attachment),
        None => println!("Published comic as {}", report.post.attachment),
    }
    if let Some(post_id) = report.post.post_id {
        println!("Post id: {post_id}");
    }
    println!("Caption: {}", report.caption);
    if let Some(e) = &report.cleanup_error {
        println!("Warning: temporary file was not removed: {e}");
    }
}

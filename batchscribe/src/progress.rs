use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Where per-item report lines and batch progress go.
///
/// Workers share one sink across tasks; implementations must serialize
/// their own output so a `write_line` is never split mid-line.
pub trait ProgressSink: Send + Sync {
    /// Advance the progress indicator by `n` completed items.
    fn advance(&self, n: u64);

    /// Emit one whole report line without disturbing the indicator.
    fn write_line(&self, line: &str);

    /// Close out the indicator once the batch is done.
    fn finish(&self) {}
}

/// Progress rendering style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressMode {
    /// Plain persistent counter bar.
    #[default]
    Simple,
    /// Spinner with elapsed time; clears itself when the batch finishes.
    Rich,
}

/// Plain `n/total` bar that stays on screen after the run.
pub struct SimpleBar {
    bar: ProgressBar,
}

impl SimpleBar {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{wide_bar}] {pos}/{len}")
                .expect("valid template")
                .progress_chars("#>-"),
        );
        bar.set_message("Transcribing");
        Self { bar }
    }
}

impl ProgressSink for SimpleBar {
    fn advance(&self, n: u64) {
        self.bar.inc(n);
    }

    fn write_line(&self, line: &str) {
        self.bar.println(line);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}

/// Spinner-and-elapsed bar; transient, so only the report lines remain.
pub struct RichBar {
    bar: ProgressBar,
}

impl RichBar {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len}")
                .expect("valid template")
                .progress_chars("#>-"),
        );
        bar.set_message("Transcribing");
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }
}

impl ProgressSink for RichBar {
    fn advance(&self, n: u64) {
        self.bar.inc(n);
    }

    fn write_line(&self, line: &str) {
        self.bar.println(line);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Build the sink for a batch of `total` items.
pub fn make_sink(mode: ProgressMode, total: u64) -> Arc<dyn ProgressSink> {
    match mode {
        ProgressMode::Simple => Arc::new(SimpleBar::new(total)),
        ProgressMode::Rich => Arc::new(RichBar::new(total)),
    }
}

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::client::TranscriptionClient;
use crate::config::{RunConfig, AUDIO_EXTENSIONS};
use crate::error::Result;
use crate::pool::{run_pool, ItemOutcome};
use crate::progress::make_sink;
use crate::queue::build_queue;

/// Totals for one batch run.
///
/// `processed` counts every attempted item, failed ones included;
/// `failed` counts the subset that produced no transcript.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub total_audio_secs: f64,
    pub total_wall_secs: f64,
    pub total_cost_usd: f64,
}

impl RunSummary {
    /// True when the queue was empty and nothing ran.
    pub fn is_empty(&self) -> bool {
        self.processed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Processed {} files", self.processed)?;
        if self.failed > 0 {
            write!(f, " ({} failed)", self.failed)?;
        }
        write!(
            f,
            " | {:.2} min audio | elapsed {:.1}s | cost ${:.4}",
            self.total_audio_secs / 60.0,
            self.total_wall_secs,
            self.total_cost_usd
        )
    }
}

/// Sum outcomes into a run summary. Plain addition, so the order the
/// workers finished in does not matter.
pub fn summarize(outcomes: &[ItemOutcome]) -> RunSummary {
    let mut summary = RunSummary {
        processed: outcomes.len(),
        ..RunSummary::default()
    };
    for outcome in outcomes {
        if outcome.failed {
            summary.failed += 1;
        }
        summary.total_audio_secs += outcome.audio_secs;
        summary.total_wall_secs += outcome.wall_secs;
        summary.total_cost_usd += outcome.cost_usd;
    }
    summary
}

/// Run one batch: scan, transcribe under the concurrency limit, summarize.
///
/// Returns `Err` only for setup problems (invalid options, unreadable
/// input directory, uncreatable output directory). Per-item failures are
/// reported through the progress sink and the summary, never as `Err`.
/// An empty summary means there was nothing left to transcribe.
pub async fn run_batch(
    config: &RunConfig,
    client: Arc<dyn TranscriptionClient>,
) -> Result<RunSummary> {
    config.validate()?;
    std::fs::create_dir_all(&config.output_dir)?;

    let items = build_queue(
        &config.input_dir,
        &config.output_dir,
        AUDIO_EXTENSIONS,
        config.batch_size,
    )?;
    if items.is_empty() {
        info!(input_dir = %config.input_dir.display(), "nothing to transcribe");
        return Ok(RunSummary::default());
    }

    info!(
        files = items.len(),
        concurrency = config.concurrency,
        "starting batch"
    );
    let sink = make_sink(config.progress, items.len() as u64);
    let outcomes = run_pool(
        items,
        config.concurrency,
        config.timeout,
        client,
        config.rate_per_min,
        Arc::clone(&sink),
    )
    .await;
    sink.finish();

    let summary = summarize(&outcomes);
    info!(
        processed = summary.processed,
        failed = summary.failed,
        cost_usd = format!("{:.4}", summary.total_cost_usd),
        "batch finished"
    );
    Ok(summary)
}

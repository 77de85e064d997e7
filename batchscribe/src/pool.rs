use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::client::TranscriptionClient;
use crate::cost::cost_usd;
use crate::error::Result;
use crate::progress::ProgressSink;
use crate::queue::WorkItem;

/// Width of the file-name column in per-item report lines. Longer names
/// are cut to one char less and finished with an ellipsis.
const NAME_WIDTH: usize = 55;

/// What happened to one work item.
///
/// Every item produces exactly one outcome, failed or not. `audio_secs`
/// can be non-zero on a failed item: the transcription came back but the
/// transcript could not be written, in which case nothing is billed as
/// saved and `cost_usd` stays zero.
#[derive(Debug, Clone, Default)]
pub struct ItemOutcome {
    pub wall_secs: f64,
    pub audio_secs: f64,
    pub cost_usd: f64,
    pub failed: bool,
    pub error: Option<String>,
}

/// Transcribe every item with at most `concurrency` requests in flight.
///
/// All items are spawned up front; a semaphore admits `concurrency` of
/// them at a time. Item failures are contained: the failed item gets a
/// failed outcome and a report line, everything else keeps going. The
/// returned outcomes are in the same order as `items` and always 1:1
/// with them, and the sink is advanced exactly once per item.
///
/// `concurrency` must be between 1 and `Semaphore::MAX_PERMITS`; callers
/// validate this up front.
pub async fn run_pool(
    items: Vec<WorkItem>,
    concurrency: usize,
    timeout: Duration,
    client: Arc<dyn TranscriptionClient>,
    rate_per_min: f64,
    sink: Arc<dyn ProgressSink>,
) -> Vec<ItemOutcome> {
    let gate = Arc::new(Semaphore::new(concurrency));

    let handles: Vec<_> = items
        .into_iter()
        .map(|item| {
            let gate = Arc::clone(&gate);
            let client = Arc::clone(&client);
            let sink = Arc::clone(&sink);
            tokio::spawn(async move {
                process_item(item, &gate, timeout, &client, rate_per_min, &sink).await
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for joined in join_all(handles).await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                // A panicked worker still yields an outcome and one
                // progress tick, so outcomes stay 1:1 with items.
                warn!(error = %e, "worker task aborted");
                sink.advance(1);
                outcomes.push(ItemOutcome {
                    failed: true,
                    error: Some(format!("worker aborted: {e}")),
                    ..ItemOutcome::default()
                });
            }
        }
    }
    outcomes
}

async fn process_item(
    item: WorkItem,
    gate: &Semaphore,
    timeout: Duration,
    client: &Arc<dyn TranscriptionClient>,
    rate_per_min: f64,
    sink: &Arc<dyn ProgressSink>,
) -> ItemOutcome {
    let permit = gate
        .acquire()
        .await
        .expect("gate semaphore is never closed");

    // Wall time measures processing only, not time spent queued.
    let started = Instant::now();
    let name = item
        .source
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| item.source.display().to_string());

    let mut audio_secs = 0.0;
    let result: Result<f64> = async {
        let data = tokio::fs::read(&item.source).await?;
        let transcription = client.transcribe(data, timeout).await?;
        audio_secs = transcription.duration_secs;
        write_transcript(&item.target, &transcription.text).await?;
        Ok(cost_usd(audio_secs, rate_per_min))
    }
    .await;

    let wall_secs = started.elapsed().as_secs_f64();
    let outcome = match result {
        Ok(cost) => {
            info!(
                file = %name,
                audio_secs = format!("{audio_secs:.1}"),
                cost_usd = format!("{cost:.4}"),
                "transcribed"
            );
            sink.write_line(&success_line(&name, audio_secs, wall_secs, cost));
            ItemOutcome {
                wall_secs,
                audio_secs,
                cost_usd: cost,
                failed: false,
                error: None,
            }
        }
        Err(e) => {
            warn!(file = %name, error = %e, "transcription failed");
            sink.write_line(&format!("[ERROR] {name}: {e}"));
            ItemOutcome {
                wall_secs,
                audio_secs,
                cost_usd: 0.0,
                failed: true,
                error: Some(e.to_string()),
            }
        }
    };

    drop(permit);
    sink.advance(1);
    outcome
}

/// Write the transcript so the target only ever appears complete.
async fn write_transcript(target: &Path, text: &str) -> Result<()> {
    // Write to a temp file first, then rename (atomic-ish)
    let tmp = target.with_extension("txt.part");
    let result: Result<()> = async {
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, target).await?;
        Ok(())
    }
    .await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

fn success_line(name: &str, audio_secs: f64, wall_secs: f64, cost: f64) -> String {
    format!(
        "✔︎ {} | {:6.2} min | {:6.1} s | ${:7.4}",
        pad_name(name),
        audio_secs / 60.0,
        wall_secs,
        cost
    )
}

fn pad_name(name: &str) -> String {
    let display: String = if name.chars().count() > NAME_WIDTH {
        let mut cut: String = name.chars().take(NAME_WIDTH - 1).collect();
        cut.push('…');
        cut
    } else {
        name.to_string()
    };
    format!("{display:<width$}", width = NAME_WIDTH)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;
    use crate::client::Transcription;
    use crate::error::Error;

    /// Fails on payloads reading "boom", succeeds on everything else.
    struct FakeClient {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
        duration_secs: f64,
        delay: Duration,
    }

    impl FakeClient {
        fn new(duration_secs: f64, delay: Duration) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                duration_secs,
                delay,
            }
        }
    }

    impl TranscriptionClient for FakeClient {
        fn transcribe(
            &self,
            audio: Vec<u8>,
            _timeout: Duration,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<Transcription>> + Send + '_>,
        > {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);

                if &audio[..] == b"boom" {
                    return Err(Error::Service {
                        status: 500,
                        message: "synthetic failure".into(),
                    });
                }
                Ok(Transcription {
                    text: "hello from fake".into(),
                    duration_secs: self.duration_secs,
                })
            })
        }
    }

    /// Aborts the worker task outright instead of returning an error.
    struct PanickingClient;

    impl TranscriptionClient for PanickingClient {
        fn transcribe(
            &self,
            _audio: Vec<u8>,
            _timeout: Duration,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<Transcription>> + Send + '_>,
        > {
            Box::pin(async { panic!("kaboom") })
        }
    }

    #[derive(Default)]
    struct CountingSink {
        ticks: AtomicU64,
        lines: Mutex<Vec<String>>,
    }

    impl ProgressSink for CountingSink {
        fn advance(&self, n: u64) {
            self.ticks.fetch_add(n, Ordering::SeqCst);
        }

        fn write_line(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    fn make_items(dir: &TempDir, out: &TempDir, files: &[(&str, &str)]) -> Vec<WorkItem> {
        files
            .iter()
            .map(|(name, content)| {
                let source = dir.path().join(name);
                std::fs::write(&source, content).unwrap();
                let target = out.path().join(name).with_extension("txt");
                WorkItem { source, target }
            })
            .collect()
    }

    // --- concurrency tests ---

    #[tokio::test]
    async fn test_in_flight_never_exceeds_concurrency() {
        let (input, output) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let names: Vec<String> = (0..8).map(|i| format!("file{i}.mp3")).collect();
        let files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "audio")).collect();
        let items = make_items(&input, &output, &files);

        let client = Arc::new(FakeClient::new(30.0, Duration::from_millis(25)));
        let sink = Arc::new(CountingSink::default());
        let outcomes = run_pool(
            items,
            3,
            Duration::from_secs(5),
            client.clone(),
            0.0043,
            sink.clone(),
        )
        .await;

        assert_eq!(outcomes.len(), 8);
        assert_eq!(client.calls.load(Ordering::SeqCst), 8);
        assert!(client.max_in_flight.load(Ordering::SeqCst) <= 3);
        assert_eq!(sink.ticks.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_concurrency_one_is_serial() {
        let (input, output) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let items = make_items(
            &input,
            &output,
            &[("a.mp3", "audio"), ("b.mp3", "audio"), ("c.mp3", "audio")],
        );

        let client = Arc::new(FakeClient::new(10.0, Duration::from_millis(10)));
        let sink = Arc::new(CountingSink::default());
        run_pool(
            items,
            1,
            Duration::from_secs(5),
            client.clone(),
            0.0043,
            sink,
        )
        .await;

        assert_eq!(client.max_in_flight.load(Ordering::SeqCst), 1);
    }

    // --- failure isolation tests ---

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_rest() {
        let (input, output) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let items = make_items(
            &input,
            &output,
            &[("a.mp3", "audio"), ("b.mp3", "boom"), ("c.mp3", "audio")],
        );

        let client = Arc::new(FakeClient::new(120.0, Duration::from_millis(5)));
        let sink = Arc::new(CountingSink::default());
        let outcomes = run_pool(
            items,
            2,
            Duration::from_secs(5),
            client,
            0.0043,
            sink.clone(),
        )
        .await;

        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].failed);
        assert!(outcomes[1].failed);
        assert!(!outcomes[2].failed);
        assert!(outcomes[1].error.as_ref().unwrap().contains("500"));

        // failed item leaves no transcript behind
        assert!(output.path().join("a.txt").exists());
        assert!(!output.path().join("b.txt").exists());
        assert!(output.path().join("c.txt").exists());
        assert_eq!(
            std::fs::read_to_string(output.path().join("a.txt")).unwrap(),
            "hello from fake"
        );

        // one tick and one report line per item, including the failure
        assert_eq!(sink.ticks.load(Ordering::SeqCst), 3);
        let lines = sink.lines.lock().unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.iter().filter(|l| l.starts_with("✔︎ ")).count(), 2);
        let error_line = lines.iter().find(|l| l.starts_with("[ERROR]")).unwrap();
        assert!(error_line.starts_with("[ERROR] b.mp3: "));
    }

    #[tokio::test]
    async fn test_unreadable_source_is_item_failure() {
        let output = TempDir::new().unwrap();
        let items = vec![WorkItem {
            source: output.path().join("missing.mp3"),
            target: output.path().join("missing.txt"),
        }];

        let client = Arc::new(FakeClient::new(10.0, Duration::from_millis(1)));
        let sink = Arc::new(CountingSink::default());
        let outcomes = run_pool(
            items,
            2,
            Duration::from_secs(5),
            client.clone(),
            0.0043,
            sink,
        )
        .await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].failed);
        assert_eq!(outcomes[0].audio_secs, 0.0);
        // never reached the remote call
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_audio_seconds_but_not_cost() {
        let (input, output) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let source = input.path().join("a.mp3");
        std::fs::write(&source, b"audio").unwrap();
        // target directory does not exist, so the write must fail
        let items = vec![WorkItem {
            source,
            target: output.path().join("nope").join("a.txt"),
        }];

        let client = Arc::new(FakeClient::new(120.0, Duration::from_millis(1)));
        let sink = Arc::new(CountingSink::default());
        let outcomes = run_pool(
            items,
            1,
            Duration::from_secs(5),
            client,
            0.0043,
            sink,
        )
        .await;

        assert!(outcomes[0].failed);
        assert_eq!(outcomes[0].audio_secs, 120.0);
        assert_eq!(outcomes[0].cost_usd, 0.0);
    }

    #[tokio::test]
    async fn test_panicking_worker_still_yields_outcome_and_tick() {
        let (input, output) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let items = make_items(&input, &output, &[("a.mp3", "audio"), ("b.mp3", "audio")]);

        let sink = Arc::new(CountingSink::default());
        let outcomes = run_pool(
            items,
            2,
            Duration::from_secs(5),
            Arc::new(PanickingClient),
            0.0043,
            sink.clone(),
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.failed));
        assert!(outcomes[0]
            .error
            .as_ref()
            .unwrap()
            .contains("worker aborted"));
        assert_eq!(sink.ticks.load(Ordering::SeqCst), 2);
    }

    // --- outcome bookkeeping tests ---

    #[tokio::test]
    async fn test_successful_outcome_carries_cost_and_wall_time() {
        let (input, output) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let items = make_items(&input, &output, &[("a.mp3", "audio")]);

        let client = Arc::new(FakeClient::new(120.0, Duration::from_millis(20)));
        let sink = Arc::new(CountingSink::default());
        let outcomes = run_pool(
            items,
            1,
            Duration::from_secs(5),
            client,
            0.0043,
            sink,
        )
        .await;

        let outcome = &outcomes[0];
        assert!(!outcome.failed);
        assert_eq!(outcome.audio_secs, 120.0);
        assert!((outcome.cost_usd - 2.0 * 0.0043).abs() < 1e-12);
        assert!(outcome.wall_secs > 0.0);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_no_items_no_outcomes() {
        let sink = Arc::new(CountingSink::default());
        let client = Arc::new(FakeClient::new(10.0, Duration::from_millis(1)));
        let outcomes = run_pool(
            Vec::new(),
            4,
            Duration::from_secs(5),
            client,
            0.0043,
            sink.clone(),
        )
        .await;
        assert!(outcomes.is_empty());
        assert_eq!(sink.ticks.load(Ordering::SeqCst), 0);
    }

    // --- report line tests ---

    #[test]
    fn test_pad_name_short_names_are_padded() {
        let padded = pad_name("a.mp3");
        assert_eq!(padded.chars().count(), NAME_WIDTH);
        assert!(padded.starts_with("a.mp3 "));
    }

    #[test]
    fn test_pad_name_long_names_get_an_ellipsis() {
        let long = "x".repeat(80);
        let padded = pad_name(&long);
        assert_eq!(padded.chars().count(), NAME_WIDTH);
        assert!(padded.ends_with('…'));
    }

    #[test]
    fn test_pad_name_exact_width_untouched() {
        let exact = "y".repeat(NAME_WIDTH);
        let padded = pad_name(&exact);
        assert_eq!(padded, exact);
    }

    #[test]
    fn test_success_line_format() {
        let line = success_line("a.mp3", 120.0, 3.26, 0.0086);
        let expected = format!("✔︎ {:<55} |   2.00 min |    3.3 s | $ 0.0086", "a.mp3");
        assert_eq!(line, expected);
    }
}

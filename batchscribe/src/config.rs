use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::cost::DEFAULT_RATE_PER_MIN;
use crate::error::{Error, Result};
use crate::progress::ProgressMode;

/// Audio file extensions selected by the directory scan, matched
/// case-insensitively. Anything else in the input directory is ignored.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "flac", "ogg", "wma", "webm"];

/// Environment variable overriding the per-minute billing rate.
pub const RATE_ENV: &str = "DG_RATE_PER_MIN";

/// Default maximum number of files processed in one run.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default number of concurrent transcription requests.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default per-file request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Builder for a batch transcription run.
///
/// Paths are required up front; everything else has a sensible default
/// and can be overridden with the chained setters:
///
/// ```
/// use batchscribe::RunConfig;
///
/// let config = RunConfig::new("podcasts", "transcripts")
///     .batch_size(10)
///     .concurrency(2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory scanned for audio files.
    pub input_dir: PathBuf,
    /// Directory transcripts are written to. Created if missing.
    pub output_dir: PathBuf,
    /// Maximum number of files processed in one run.
    pub batch_size: usize,
    /// Maximum number of transcription requests in flight at once.
    pub concurrency: usize,
    /// Per-file request timeout.
    pub timeout: Duration,
    /// Billing rate in USD per minute of audio.
    pub rate_per_min: f64,
    /// Progress rendering style.
    pub progress: ProgressMode,
}

impl RunConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            rate_per_min: DEFAULT_RATE_PER_MIN,
            progress: ProgressMode::Simple,
        }
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn rate_per_min(mut self, rate: f64) -> Self {
        self.rate_per_min = rate;
        self
    }

    pub fn progress(mut self, mode: ProgressMode) -> Self {
        self.progress = mode;
        self
    }

    /// Check the numeric options before a run starts.
    ///
    /// A zero batch or concurrency would make the run a silent no-op or
    /// deadlock the worker gate, so both are rejected up front. The gate
    /// can only hold `Semaphore::MAX_PERMITS` permits, so concurrency
    /// beyond that is rejected the same way.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidOption("batch size must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidOption("concurrency must be at least 1".into()));
        }
        if self.concurrency > Semaphore::MAX_PERMITS {
            return Err(Error::InvalidOption(format!(
                "concurrency must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidOption("timeout must be positive".into()));
        }
        if !self.rate_per_min.is_finite() || self.rate_per_min < 0.0 {
            return Err(Error::InvalidOption(format!(
                "rate per minute must be a non-negative number, got {}",
                self.rate_per_min
            )));
        }
        Ok(())
    }
}

/// Billing rate from the environment, falling back to the Nova-3 default.
///
/// An unparsable value is a setup error, not something to silently ignore:
/// a typo here would misprice the whole run.
pub fn rate_per_min_from_env() -> Result<f64> {
    match std::env::var(RATE_ENV) {
        Ok(raw) => raw.trim().parse::<f64>().map_err(|_| {
            Error::InvalidOption(format!("{RATE_ENV} is not a number: {raw:?}"))
        }),
        Err(_) => Ok(DEFAULT_RATE_PER_MIN),
    }
}

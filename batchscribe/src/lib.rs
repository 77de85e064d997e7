//! Batch audio transcription via the Deepgram API — a folder of audio in, a folder
//! of transcripts out.
//!
//! **batchscribe** scans an input directory for audio files, skips anything already
//! transcribed, and sends the rest to Deepgram's pre-recorded API under a bounded
//! concurrency limit. Transcripts appear on disk only once they are complete, and a
//! failed file never stops the rest of the batch. The run ends with aggregate timing
//! and cost totals, and re-running over the same directories picks up exactly where
//! the last batch stopped.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> batchscribe::Result<()> {
//! use std::sync::Arc;
//! use batchscribe::{DeepgramClient, RunConfig};
//!
//! let client = Arc::new(DeepgramClient::from_env()?);
//! let config = RunConfig::new("podcasts", "transcripts")
//!     .batch_size(10)
//!     .concurrency(2);
//!
//! let summary = batchscribe::run_batch(&config, client).await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```
//!
//! See the README for CLI usage and environment configuration.

pub mod client;
pub mod config;
pub mod cost;
pub mod error;
pub mod pool;
pub mod progress;
pub mod queue;
pub mod run;

pub use client::{DeepgramClient, Transcription, TranscriptionClient};
pub use config::{RunConfig, AUDIO_EXTENSIONS};
pub use cost::{cost_usd, DEFAULT_RATE_PER_MIN};
pub use error::{Error, Result};
pub use pool::ItemOutcome;
pub use progress::{ProgressMode, ProgressSink};
pub use queue::WorkItem;
pub use run::{run_batch, RunSummary};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use batchscribe::config::{DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_SECS};
use batchscribe::{DeepgramClient, ProgressMode, RunConfig};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};

#[derive(Parser)]
#[command(name = "batchscribe", about = "Deepgram batch transcriber")]
struct Cli {
    /// Folder of audio files.
    input_dir: PathBuf,

    /// Where .txt transcripts go.
    #[arg(long, required = true)]
    output_dir: PathBuf,

    /// Files per run.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch: usize,

    /// Parallel uploads.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// HTTP timeout per file, in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS as f64)]
    timeout: f64,

    /// Progress bar type.
    #[arg(long, default_value = "simple")]
    progress: ProgressArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Simple,
    Rich,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Simple => ProgressMode::Simple,
            ProgressArg::Rich => ProgressMode::Rich,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("batchscribe=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    if !cli.input_dir.is_dir() {
        Cli::command()
            .error(
                ErrorKind::ValueValidation,
                format!("{} is not a directory", cli.input_dir.display()),
            )
            .exit();
    }

    let timeout = match timeout_from_secs(cli.timeout) {
        Some(timeout) => timeout,
        None => {
            Cli::command()
                .error(
                    ErrorKind::ValueValidation,
                    format!("{} is not a valid timeout in seconds", cli.timeout),
                )
                .exit();
        }
    };

    // Credentials and rate override may live in a .env file
    dotenvy::dotenv().ok();

    let rate_per_min = match batchscribe::config::rate_per_min_from_env() {
        Ok(rate) => rate,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let client = match DeepgramClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let config = RunConfig::new(cli.input_dir, cli.output_dir)
        .batch_size(cli.batch)
        .concurrency(cli.concurrency)
        .timeout(timeout)
        .rate_per_min(rate_per_min)
        .progress(cli.progress.into());

    let summary = match batchscribe::run_batch(&config, client).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if summary.is_empty() {
        println!("Nothing to do – already transcribed or nothing found.");
    } else {
        println!();
        println!();
        println!("{summary}");
    }
}

/// The `--timeout` flag as a `Duration`. `None` for anything a request
/// cannot actually wait for: zero, negative, NaN, or beyond what a
/// `Duration` can hold.
fn timeout_from_secs(secs: f64) -> Option<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(timeout) if !timeout.is_zero() => Some(timeout),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_from_secs_ordinary_values() {
        assert_eq!(timeout_from_secs(300.0), Some(Duration::from_secs(300)));
        assert_eq!(timeout_from_secs(0.5), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_timeout_from_secs_rejects_unusable_values() {
        // 1e20 is finite and positive but overflows a Duration
        for secs in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e20] {
            assert_eq!(timeout_from_secs(secs), None, "secs {secs} should be rejected");
        }
    }
}

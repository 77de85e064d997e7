use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Deepgram API host; the pre-recorded endpoint lives at `/v1/listen`.
const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com";

/// Deepgram model requested for every file.
const MODEL: &str = "nova-3";

/// Environment variable holding the Deepgram API key.
pub const API_KEY_ENV: &str = "DEEPGRAM_API_KEY";

/// Connect timeout, independent of the caller's per-request deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A finished transcription: the text plus the billable audio duration.
#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    pub duration_secs: f64,
}

/// Async trait for remote transcription backends.
pub trait TranscriptionClient: Send + Sync {
    /// Transcribe raw audio bytes, observing `timeout` for the whole request.
    ///
    /// # Errors
    ///
    /// Returns `Error::Service` when the backend rejects the request and
    /// `Error::MalformedResponse` when it answers without a transcript.
    fn transcribe(
        &self,
        audio: Vec<u8>,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Transcription>> + Send + '_>>;
}

/// Client for Deepgram's pre-recorded transcription API.
///
/// Sends raw audio bytes to `/v1/listen` with `Token` authorization and
/// the `nova-3` model, smart formatting enabled.
pub struct DeepgramClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DeepgramClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEEPGRAM_BASE_URL.to_string(),
        })
    }

    /// Build a client from the `DEEPGRAM_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(key),
            _ => Err(Error::MissingApiKey),
        }
    }

    /// Point the client at a different host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl std::fmt::Debug for DeepgramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepgramClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    #[serde(default)]
    metadata: Metadata,
    results: Option<ListenResults>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    /// Billable audio length in seconds; Deepgram omits it for some
    /// container types, in which case the item bills as zero.
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: String,
}

impl TranscriptionClient for DeepgramClient {
    fn transcribe(
        &self,
        audio: Vec<u8>,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Transcription>> + Send + '_>> {
        Box::pin(async move {
            let url = format!("{}/v1/listen", self.base_url.trim_end_matches('/'));
            debug!(bytes = audio.len(), "sending transcription request");

            let resp = self
                .client
                .post(&url)
                .query(&[("model", MODEL), ("smart_format", "true")])
                .header("Authorization", format!("Token {}", self.api_key))
                .header("Content-Type", "application/octet-stream")
                .body(audio)
                .timeout(timeout)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                // Keep error messages bounded — failure bodies can be huge
                let message: String = body.chars().take(500).collect();
                return Err(Error::Service {
                    status: status.as_u16(),
                    message,
                });
            }

            let bytes = resp.bytes().await?;
            let parsed: ListenResponse = serde_json::from_slice(&bytes)?;

            let duration_secs = parsed.metadata.duration;
            let text = parsed
                .results
                .and_then(|r| r.channels.into_iter().next())
                .and_then(|c| c.alternatives.into_iter().next())
                .map(|a| a.transcript)
                .ok_or_else(|| Error::MalformedResponse("no transcript in response".into()))?;

            debug!(duration_secs, chars = text.len(), "transcription received");
            Ok(Transcription {
                text,
                duration_secs,
            })
        })
    }
}

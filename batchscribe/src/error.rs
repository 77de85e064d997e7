/// All errors that can occur in batchscribe.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("DEEPGRAM_API_KEY missing — add it to a .env file or the environment")]
    MissingApiKey,

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("transcription service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    #[error("malformed service response: {0}")]
    MalformedResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TtsError {
    /// Nothing speakable remained after sanitising the input.
    #[error("nothing to synthesize")]
    Empty,

    #[error("TTS backend not configured: {0}")]
    NotConfigured(String),

    #[error("TTS API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TtsError>;

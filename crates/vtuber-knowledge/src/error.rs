use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Source directory not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Embedding API error {status}: {body}")]
    EmbeddingApi {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Embedding response mismatch: expected {expected} vectors, got {got}")]
    EmbeddingCount { expected: usize, got: usize },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KnowledgeError>;

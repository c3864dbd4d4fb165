use thiserror::Error;

#[derive(Debug, Error)]
pub enum VtuberError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VtuberError>;

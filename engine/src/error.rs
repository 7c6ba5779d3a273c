use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration {width}x{height} with {mines} mines: {reason}")]
    InvalidConfiguration {
        width: usize,
        height: usize,
        mines: usize,
        reason: &'static str,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

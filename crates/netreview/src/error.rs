//! Review errors.

use netreview_buffers::BufferError;

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Malformed review buffer: {0}")]
    Buffer(#[from] BufferError),

    #[error("Failed to spawn review worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Review worker failed: {0}")]
    WorkerFailed(String),

    #[error("Invalid review configuration: {0}")]
    InvalidConfig(String),
}

impl ReviewError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReviewError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;

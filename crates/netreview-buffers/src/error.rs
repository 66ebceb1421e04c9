//! Errors raised while reading serialized buffers.

#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("Invalid spatial index magic byte {found:#04x}")]
    InvalidMagic { found: u8 },

    #[error("Unsupported spatial index version: buffer {found}, reader {supported}")]
    UnsupportedVersion { found: u8, supported: u8 },

    #[error("Invalid spatial index node size {0}")]
    InvalidNodeSize(u16),

    #[error("Truncated buffer: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

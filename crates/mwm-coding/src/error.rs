use thiserror::Error;

/// Errors raised by the byte-level readers.
#[derive(Error, Debug)]
pub enum CodingError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input ended in the middle of a value
    #[error("unexpected eof: {0}")]
    UnexpectedEof(String),

    /// Varint longer than its target width
    #[error("varint overflow: {0}")]
    VarintOverflow(String),

    /// Section header carries a version this build does not know
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    /// Structurally invalid bytes
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Tag not present in the container
    #[error("missing section: {0}")]
    MissingSection(String),
}

/// Result type alias for coding operations
pub type Result<T> = std::result::Result<T, CodingError>;

use mwm_coding::CodingError;
use thiserror::Error;

use crate::type_path::TypePathError;

/// Structural failures of the feature format.
///
/// These surface only where an archive, a classification or a record is
/// opened. Degraded data met later inside accessors is logged and absorbed.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Classification config or type mapping is structurally invalid
    #[error("classification config malformed at line {line}: {message}")]
    ConfigMalformed { line: usize, message: String },

    /// Stored format version is newer than this build understands
    #[error("unsupported format version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u8, supported: u8 },

    /// Container header violates its layout
    #[error("corrupt header: {0}")]
    CorruptHeader(String),

    /// Record too short for what its header byte declares
    #[error("corrupt record {index}: {message}")]
    CorruptRecord { index: u32, message: String },

    /// Feature cannot be encoded
    #[error("invalid feature: {0}")]
    InvalidFeature(String),

    #[error(transparent)]
    TypePath(#[from] TypePathError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Coding(#[from] CodingError),

    #[error("metadata decode: {0}")]
    Postcard(#[from] postcard::Error),
}

/// Result type alias for format operations
pub type Result<T> = std::result::Result<T, FormatError>;

impl FormatError {
    pub(crate) fn corrupt_header(message: impl Into<String>) -> Self {
        FormatError::CorruptHeader(message.into())
    }

    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        FormatError::ConfigMalformed {
            line,
            message: message.into(),
        }
    }
}

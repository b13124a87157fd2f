//! Error types for signature and delta generation

use thiserror::Error;

/// Result type alias for rollingdelta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rollingdelta
#[derive(Error, Debug)]
pub enum Error {
    /// The file a signature is generated from has no bytes
    #[error("input file is empty")]
    EmptyInput,

    /// The baseline handed to delta generation has no bytes
    #[error("original file is empty")]
    EmptyOriginalFile,

    /// The updated file handed to delta generation has no bytes
    #[error("updated file is empty")]
    EmptyUpdatedFile,

    /// Signature file size is below 8 bytes or not a multiple of 4
    #[error("invalid signature file")]
    InvalidSignatureFile,

    /// Chunk length is below 256 or not a multiple of 128
    #[error("invalid chunk size: {chunk_len}")]
    InvalidChunkSize { chunk_len: u32 },

    /// A run was flushed while none was open
    #[error("can't write invalid command to delta file")]
    InvalidCommand,

    /// Delta file could not be decoded
    #[error("invalid delta file: {reason}")]
    InvalidDeltaFile { reason: String },

    /// I/O errors (open, read, create, write)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a delta decoding error
    pub fn invalid_delta(reason: impl Into<String>) -> Self {
        Self::InvalidDeltaFile {
            reason: reason.into(),
        }
    }

    /// True when the underlying I/O failure was a missing file
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    /// True when an exclusive create hit an existing file
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::Io { source, .. } if source.kind() == std::io::ErrorKind::AlreadyExists)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

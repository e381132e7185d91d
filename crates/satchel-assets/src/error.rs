//! Error types for the asset system.

use std::fmt;
use std::path::PathBuf;

use crate::file::FileType;

/// Errors that can occur during asset operations.
#[derive(Debug)]
pub enum AssetError {
    /// The requested asset has no backing container.
    NotFound {
        /// The path or identifier of the asset.
        path: String,
    },

    /// Failed to read or write asset data.
    IoError {
        /// The path that failed.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The container holds a different payload kind than the consumer expects.
    TypeMismatch {
        /// Tag the consumer was configured for.
        expected: FileType,
        /// Tag found in the container header.
        found: FileType,
    },

    /// The stored bytes could not be decompressed or decoded.
    CorruptPayload {
        /// Description of what was wrong.
        reason: String,
    },

    /// The JSON metadata could not be encoded or decoded.
    Metadata {
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The handle is stale, out of range, or the invalid sentinel.
    InvalidHandle {
        /// Description of why the handle is invalid.
        reason: String,
    },

    /// Every slot index is in use.
    CapacityExhausted {
        /// Number of slots the table can hold.
        capacity: usize,
    },

    /// Generic error with a message.
    Other {
        /// Error message.
        message: String,
    },
}

impl AssetError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        AssetError::CorruptPayload {
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`AssetError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::NotFound { .. })
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound { path } => {
                write!(f, "Asset not found: {}", path)
            }
            AssetError::IoError { path, source } => {
                write!(f, "IO error on '{}': {}", path.display(), source)
            }
            AssetError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            AssetError::CorruptPayload { reason } => {
                write!(f, "Corrupt payload: {}", reason)
            }
            AssetError::Metadata { source } => {
                write!(f, "Invalid metadata: {}", source)
            }
            AssetError::InvalidHandle { reason } => {
                write!(f, "Invalid asset handle: {}", reason)
            }
            AssetError::CapacityExhausted { capacity } => {
                write!(f, "All {} asset slots are in use", capacity)
            }
            AssetError::Other { message } => {
                write!(f, "Asset error: {}", message)
            }
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::IoError { source, .. } => Some(source),
            AssetError::Metadata { source } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        // A short read inside a container means the bytes are truncated, not missing
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return AssetError::corrupt(format!("unexpected end of data: {}", err));
        }
        AssetError::IoError {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for AssetError {
    fn from(err: serde_json::Error) -> Self {
        AssetError::Metadata { source: err }
    }
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

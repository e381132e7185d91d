//! Errors raised while packing source files.

use std::fmt;
use std::path::PathBuf;

use satchel_assets::AssetError;

#[derive(Debug)]
pub enum ConvertError {
    /// The input directory does not exist or is not a directory.
    InvalidInput { path: PathBuf },

    /// Filesystem access failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A source image could not be decoded.
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    /// Packing or writing the container failed.
    Asset {
        path: PathBuf,
        source: AssetError,
    },

    /// The source tree could not be walked.
    Walk { source: walkdir::Error },
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::InvalidInput { path } => {
                write!(f, "Input '{}' is not a directory", path.display())
            }
            ConvertError::Io { path, source } => {
                write!(f, "IO error on '{}': {}", path.display(), source)
            }
            ConvertError::Image { path, source } => {
                write!(f, "Failed to decode image '{}': {}", path.display(), source)
            }
            ConvertError::Asset { path, source } => {
                write!(f, "Failed to pack '{}': {}", path.display(), source)
            }
            ConvertError::Walk { source } => {
                write!(f, "Failed to walk source tree: {}", source)
            }
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvertError::InvalidInput { .. } => None,
            ConvertError::Io { source, .. } => Some(source),
            ConvertError::Image { source, .. } => Some(source),
            ConvertError::Asset { source, .. } => Some(source),
            ConvertError::Walk { source } => Some(source),
        }
    }
}

impl From<walkdir::Error> for ConvertError {
    fn from(source: walkdir::Error) -> Self {
        ConvertError::Walk { source }
    }
}

pub type ConvertResult<T> = Result<T, ConvertError>;

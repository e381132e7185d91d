//! Offline packer for Satchel containers.
//!
//! Walks a source directory, decodes images with the `image` crate and writes
//! each one as a `TEXI` container at the mirrored path under the output
//! directory. Work is spread over a fixed-size [`TaskPool`].

pub mod convert;
pub mod error;
pub mod paths;
pub mod pool;

pub use convert::{ChecksumCounter, ConvertOptions, ConvertSummary, convert_texture, run};
pub use error::{ConvertError, ConvertResult};
pub use pool::TaskPool;

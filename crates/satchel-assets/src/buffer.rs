//! Payload bytes with an optional LZ4 compression layer.

use std::fmt;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use satchel_core::profiling::profile_function;
use serde::{Deserialize, Serialize};

use crate::error::{AssetError, AssetResult};

/// How the bytes inside a [`Buffer`] are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
#[repr(u8)]
pub enum CompressionMode {
    #[default]
    #[serde(rename = "None")]
    None = 0,
    #[serde(rename = "LZ4")]
    Lz4 = 1,
}

impl CompressionMode {
    /// Parse a metadata string. Anything other than `"LZ4"` means uncompressed.
    pub fn parse(s: &str) -> Self {
        if s == "LZ4" {
            CompressionMode::Lz4
        } else {
            CompressionMode::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionMode::None => "None",
            CompressionMode::Lz4 => "LZ4",
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionMode::None),
            1 => Some(CompressionMode::Lz4),
            _ => None,
        }
    }
}

impl From<String> for CompressionMode {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Largest expansion a single LZ4 block can encode.
const LZ4_MAX_RATIO: u64 = 255;
/// Largest decompressed size the LZ4 block API accepts.
const LZ4_MAX_TOTAL: u64 = i32::MAX as u64;

/// Raw payload bytes plus the sizes needed to restore them.
///
/// `total_size` is always the decompressed length, so [`Buffer::copy_to`]
/// writes exactly that many bytes whatever the storage mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    bytes: Vec<u8>,
    compression: CompressionMode,
    total_size: u64,
    compressed_size: u64,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a buffer from `src` in one step.
    pub fn from_slice(src: &[u8], mode: CompressionMode) -> AssetResult<Self> {
        let mut buffer = Self::new();
        buffer.copy_from(src, mode)?;
        Ok(buffer)
    }

    /// Store `src` under `mode`, replacing the current contents.
    ///
    /// On failure the buffer is left untouched.
    pub fn copy_from(&mut self, src: &[u8], mode: CompressionMode) -> AssetResult<()> {
        profile_function!();

        let bytes = match mode {
            CompressionMode::None => src.to_vec(),
            CompressionMode::Lz4 if src.is_empty() => Vec::new(),
            CompressionMode::Lz4 => {
                let bound = lz4::block::compress_bound(src.len())
                    .map_err(|e| AssetError::corrupt(format!("cannot compress {} bytes: {}", src.len(), e)))?;
                let mut scratch = vec![0u8; bound];
                let written = lz4::block::compress_to_buffer(src, None, false, &mut scratch)
                    .map_err(|e| AssetError::corrupt(format!("LZ4 compression failed: {}", e)))?;
                scratch.truncate(written);
                scratch.shrink_to_fit();
                scratch
            }
        };

        tracing::trace!(
            mode = %mode,
            total = src.len(),
            stored = bytes.len(),
            "Filled buffer"
        );

        self.total_size = src.len() as u64;
        self.compressed_size = bytes.len() as u64;
        self.compression = mode;
        self.bytes = bytes;
        Ok(())
    }

    /// Restore the original bytes into the front of `dst`.
    ///
    /// `dst` must hold at least [`Buffer::total_buffer_size`] bytes.
    pub fn copy_to(&self, dst: &mut [u8]) -> AssetResult<()> {
        profile_function!();

        let total = self.total_len()?;
        if dst.len() < total {
            return Err(AssetError::Other {
                message: format!(
                    "destination holds {} bytes but the buffer restores to {}",
                    dst.len(),
                    total
                ),
            });
        }
        let dst = &mut dst[..total];

        match self.compression {
            CompressionMode::None => {
                if self.bytes.len() != total {
                    return Err(AssetError::corrupt(format!(
                        "stored {} bytes but header says {}",
                        self.bytes.len(),
                        total
                    )));
                }
                dst.copy_from_slice(&self.bytes);
            }
            CompressionMode::Lz4 if total == 0 => {}
            CompressionMode::Lz4 => {
                let expected = i32::try_from(total)
                    .map_err(|_| AssetError::corrupt(format!("{} bytes is too large for LZ4", total)))?;
                let restored = lz4::block::decompress_to_buffer(&self.bytes, Some(expected), dst)
                    .map_err(|e| AssetError::corrupt(format!("LZ4 decompression failed: {}", e)))?;
                if restored != total {
                    return Err(AssetError::corrupt(format!(
                        "LZ4 restored {} bytes, expected {}",
                        restored, total
                    )));
                }
            }
        }
        Ok(())
    }

    /// Restore the original bytes into a fresh vector.
    pub fn to_vec(&self) -> AssetResult<Vec<u8>> {
        let total = self.total_len()?;
        let mut out = Vec::new();
        out.try_reserve_exact(total)
            .map_err(|e| AssetError::corrupt(format!("cannot allocate {} bytes: {}", total, e)))?;
        out.resize(total, 0);
        self.copy_to(&mut out)?;
        Ok(out)
    }

    /// Decompressed size in bytes.
    pub fn total_buffer_size(&self) -> u64 {
        self.total_size
    }

    /// Size of the stored bytes.
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    pub fn compression_mode(&self) -> CompressionMode {
        self.compression
    }

    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    /// The bytes as stored, possibly compressed.
    pub fn stored_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Write `[u8 mode][u64 total][u64 compressed][stored bytes]`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> AssetResult<()> {
        writer.write_u8(self.compression as u8)?;
        writer.write_u64::<LittleEndian>(self.total_size)?;
        writer.write_u64::<LittleEndian>(self.compressed_size)?;
        writer.write_all(&self.bytes)?;
        Ok(())
    }

    /// Read the layout produced by [`Buffer::write_to`].
    pub fn read_from<R: Read>(reader: &mut R) -> AssetResult<Self> {
        let tag = reader.read_u8()?;
        let compression = CompressionMode::from_u8(tag)
            .ok_or_else(|| AssetError::corrupt(format!("unknown compression mode {}", tag)))?;
        let total_size = reader.read_u64::<LittleEndian>()?;
        let compressed_size = reader.read_u64::<LittleEndian>()?;

        if compression == CompressionMode::Lz4
            && (total_size > LZ4_MAX_TOTAL
                || total_size > compressed_size.saturating_mul(LZ4_MAX_RATIO))
        {
            return Err(AssetError::corrupt(format!(
                "{} stored LZ4 bytes cannot restore to {}",
                compressed_size, total_size
            )));
        }

        let stored = match compression {
            CompressionMode::None => total_size,
            CompressionMode::Lz4 => compressed_size,
        };

        let mut bytes = Vec::new();
        reader.by_ref().take(stored).read_to_end(&mut bytes)?;
        if bytes.len() as u64 != stored {
            return Err(AssetError::corrupt(format!(
                "expected {} payload bytes, found {}",
                stored,
                bytes.len()
            )));
        }

        Ok(Self {
            bytes,
            compression,
            total_size,
            compressed_size,
        })
    }

    fn total_len(&self) -> AssetResult<usize> {
        usize::try_from(self.total_size)
            .map_err(|_| AssetError::corrupt(format!("{} bytes does not fit in memory", self.total_size)))
    }
}

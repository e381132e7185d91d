//! Texture containers (`TEXI`).

use serde::{Deserialize, Serialize};

use crate::Asset;
use crate::buffer::{Buffer, CompressionMode};
use crate::error::{AssetError, AssetResult};
use crate::file::{AssetFile, FileType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum TextureFormat {
    #[default]
    Unknown,
    #[serde(rename = "RGBA8")]
    Rgba8,
}

impl TextureFormat {
    /// Bytes per pixel, if the format is known.
    pub fn bytes_per_pixel(&self) -> Option<u64> {
        match self {
            TextureFormat::Unknown => None,
            TextureFormat::Rgba8 => Some(4),
        }
    }
}

impl From<String> for TextureFormat {
    fn from(value: String) -> Self {
        match value.as_str() {
            "RGBA8" => TextureFormat::Rgba8,
            _ => TextureFormat::Unknown,
        }
    }
}

/// The JSON metadata of a texture container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureInfo {
    pub format: TextureFormat,
    #[serde(default)]
    pub compression: CompressionMode,
    pub width: u32,
    pub height: u32,
    /// Decompressed pixel byte count.
    pub buffer_size: u64,
    #[serde(default)]
    pub original_file: String,
}

impl TextureInfo {
    pub fn rgba8(width: u32, height: u32) -> Self {
        Self {
            format: TextureFormat::Rgba8,
            compression: CompressionMode::Lz4,
            width,
            height,
            buffer_size: width as u64 * height as u64 * 4,
            original_file: String::new(),
        }
    }

    pub fn with_compression(mut self, compression: CompressionMode) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_original_file(mut self, original_file: impl Into<String>) -> Self {
        self.original_file = original_file.into();
        self
    }

    /// Pixel bytes implied by the dimensions, or `None` for unknown formats.
    ///
    /// Saturates at `u64::MAX` so absurd dimensions never match a real size.
    pub fn expected_buffer_size(&self) -> Option<u64> {
        let bpp = self.format.bytes_per_pixel()?;
        Some(
            (self.width as u64)
                .checked_mul(self.height as u64)
                .and_then(|pixels| pixels.checked_mul(bpp))
                .unwrap_or(u64::MAX),
        )
    }
}

/// A decoded texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub info: TextureInfo,
    pub pixels: Vec<u8>,
}

impl Texture {
    pub fn new(info: TextureInfo, pixels: Vec<u8>) -> Self {
        Self { info, pixels }
    }
}

/// Pack `pixels` under `info`. `buffer_size` is taken from `pixels`.
pub fn pack_texture(info: &TextureInfo, pixels: &[u8]) -> AssetResult<AssetFile> {
    let mut info = info.clone();
    info.buffer_size = pixels.len() as u64;
    if let Some(expected) = info.expected_buffer_size() {
        if expected != info.buffer_size {
            return Err(AssetError::Other {
                message: format!(
                    "{}x{} texture needs {} bytes, got {}",
                    info.width, info.height, expected, info.buffer_size
                ),
            });
        }
    }

    let mut file = AssetFile::new(FileType::TEXTURE);
    file.set_metadata(&info)?;
    file.blob = Buffer::from_slice(pixels, info.compression)?;
    Ok(file)
}

pub fn read_texture_info(file: &AssetFile) -> AssetResult<TextureInfo> {
    file.metadata()
}

impl Asset for Texture {
    const FILE_TYPE: FileType = FileType::TEXTURE;

    fn decode(file: &AssetFile) -> AssetResult<Self> {
        let info = read_texture_info(file)?;
        if info.buffer_size != file.blob.total_buffer_size() {
            return Err(AssetError::corrupt(format!(
                "metadata says {} pixel bytes, payload holds {}",
                info.buffer_size,
                file.blob.total_buffer_size()
            )));
        }
        match info.expected_buffer_size() {
            Some(expected) if expected != info.buffer_size => {
                return Err(AssetError::corrupt(format!(
                    "{}x{} {:?} texture needs {} bytes, metadata says {}",
                    info.width, info.height, info.format, expected, info.buffer_size
                )));
            }
            Some(_) => {}
            None => tracing::warn!(
                original_file = %info.original_file,
                "Texture has an unknown pixel format"
            ),
        }
        let pixels = file.blob.to_vec()?;
        Ok(Self { info, pixels })
    }

    fn encode(&self) -> AssetResult<AssetFile> {
        pack_texture(&self.info, &self.pixels)
    }
}

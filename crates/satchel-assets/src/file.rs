//! The packed container that holds one asset on disk.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! [4B tag][u32 version][u16 checksum][u64 json len][json][buffer]
//! ```
//!
//! where `buffer` is the self-describing layout written by [`Buffer::write_to`].

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use satchel_core::profiling::profile_function;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::buffer::Buffer;
use crate::error::{AssetError, AssetResult};
use crate::io::AssetIo;

/// Four-byte tag naming the payload kind inside a container.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileType(pub [u8; 4]);

impl FileType {
    pub const TEXTURE: FileType = FileType(*b"TEXI");
    pub const MODEL: FileType = FileType(*b"MODL");
    pub const MATERIAL: FileType = FileType(*b"MATX");

    pub const fn new(tag: [u8; 4]) -> Self {
        Self(tag)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileType({})", self)
    }
}

/// One packed asset: header, JSON metadata and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    pub file_type: FileType,
    pub version: u32,
    /// Generation tag copied into the slot table when this file is loaded.
    pub checksum: u16,
    pub json: String,
    pub blob: Buffer,
}

impl AssetFile {
    pub const CURRENT_VERSION: u32 = 1;

    /// An empty container for the given payload kind.
    pub fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            version: Self::CURRENT_VERSION,
            checksum: 0,
            json: String::new(),
            blob: Buffer::new(),
        }
    }

    /// Decode the JSON metadata.
    pub fn metadata<M: DeserializeOwned>(&self) -> AssetResult<M> {
        Ok(serde_json::from_str(&self.json)?)
    }

    /// Replace the JSON metadata.
    pub fn set_metadata<M: Serialize>(&mut self, metadata: &M) -> AssetResult<()> {
        self.json = serde_json::to_string(metadata)?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> AssetResult<()> {
        profile_function!();
        writer.write_all(&self.file_type.0)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u16::<LittleEndian>(self.checksum)?;
        writer.write_u64::<LittleEndian>(self.json.len() as u64)?;
        writer.write_all(self.json.as_bytes())?;
        self.blob.write_to(writer)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> AssetResult<Self> {
        profile_function!();
        let mut tag = [0u8; 4];
        reader.read_exact(&mut tag)?;
        let version = reader.read_u32::<LittleEndian>()?;
        let checksum = reader.read_u16::<LittleEndian>()?;

        let json_len = reader.read_u64::<LittleEndian>()?;
        let mut json = Vec::new();
        reader.by_ref().take(json_len).read_to_end(&mut json)?;
        if json.len() as u64 != json_len {
            return Err(AssetError::corrupt(format!(
                "expected {} bytes of metadata, found {}",
                json_len,
                json.len()
            )));
        }
        let json = String::from_utf8(json)
            .map_err(|e| AssetError::corrupt(format!("metadata is not UTF-8: {}", e)))?;

        let blob = Buffer::read_from(reader)?;

        Ok(Self {
            file_type: FileType(tag),
            version,
            checksum,
            json,
            blob,
        })
    }

    pub fn to_bytes(&self) -> AssetResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Parse a whole container. Bytes left over after the payload are an error.
    pub fn from_bytes(bytes: &[u8]) -> AssetResult<Self> {
        let mut cursor = bytes;
        let file = Self::read_from(&mut cursor)?;
        if !cursor.is_empty() {
            return Err(AssetError::corrupt(format!(
                "{} trailing bytes after payload",
                cursor.len()
            )));
        }
        Ok(file)
    }

    /// Write the container to a file on disk.
    pub fn save(&self, path: impl AsRef<Path>) -> AssetResult<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| AssetError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Read a container from a file on disk.
    pub fn load(path: impl AsRef<Path>) -> AssetResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound {
                    path: path.display().to_string(),
                }
            } else {
                AssetError::IoError {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn save_to(&self, io: &dyn AssetIo, path: &Path) -> AssetResult<()> {
        io.write_bytes(path, &self.to_bytes()?)
    }

    pub fn load_from(io: &dyn AssetIo, path: &Path) -> AssetResult<Self> {
        let bytes = io.read_bytes(path)?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::CompressionMode;

    fn sample_file() -> AssetFile {
        let mut file = AssetFile::new(FileType::MATERIAL);
        file.checksum = 7;
        file.json = r#"{"name":"stone"}"#.to_string();
        file.blob = Buffer::from_slice(b"payload", CompressionMode::None).unwrap();
        file
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample_file().to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"MATX");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..10], &7u16.to_le_bytes());
        assert_eq!(&bytes[10..18], &16u64.to_le_bytes());
        assert_eq!(&bytes[18..34], br#"{"name":"stone"}"#);
        // buffer header then 7 payload bytes
        assert_eq!(bytes.len(), 34 + 17 + 7);
    }

    #[test]
    fn test_roundtrip_keeps_every_field() {
        let file = sample_file();
        let back = AssetFile::from_bytes(&file.to_bytes().unwrap()).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = sample_file().to_bytes().unwrap();
        bytes.push(0);
        let err = AssetFile::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, AssetError::CorruptPayload { .. }));
    }

    #[test]
    fn test_truncated_header_rejected() {
        let bytes = sample_file().to_bytes().unwrap();
        assert!(AssetFile::from_bytes(&bytes[..9]).is_err());
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = AssetFile::load(dir.path().join("missing.tx")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_metadata_roundtrip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Meta {
            width: u32,
        }

        let mut file = AssetFile::new(FileType::TEXTURE);
        file.set_metadata(&Meta { width: 4 }).unwrap();
        assert_eq!(file.json, r#"{"width":4}"#);
        assert_eq!(file.metadata::<Meta>().unwrap(), Meta { width: 4 });
    }

    #[test]
    fn test_file_type_display() {
        assert_eq!(FileType::MODEL.to_string(), "MODL");
        assert_eq!(FileType::new([b'A', 0, b'B', b'C']).to_string(), "A\\x00BC");
    }
}

//! Storage backends that containers are read from and written to.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use satchel_core::alloc::HashMap;

use crate::error::{AssetError, AssetResult};

/// Trait for reading and writing raw container bytes.
pub trait AssetIo: Send + Sync {
    /// Read all bytes from a path. Missing paths fail with [`AssetError::NotFound`].
    fn read_bytes(&self, path: &Path) -> AssetResult<Vec<u8>>;

    /// Write all bytes to a path, replacing whatever was there.
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> AssetResult<()>;

    /// Check if a path exists.
    fn exists(&self, path: &Path) -> bool;
}

/// Filesystem storage rooted at a base directory.
#[derive(Debug, Clone)]
pub struct FileIo {
    base_path: PathBuf,
}

impl FileIo {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a path relative to the base path. Absolute paths pass through.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}

impl AssetIo for FileIo {
    fn read_bytes(&self, path: &Path) -> AssetResult<Vec<u8>> {
        let full_path = self.resolve_path(path);
        std::fs::read(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound {
                    path: full_path.display().to_string(),
                }
            } else {
                AssetError::IoError {
                    path: full_path.clone(),
                    source: e,
                }
            }
        })
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> AssetResult<()> {
        let full_path = self.resolve_path(path);
        let io_err = |e| AssetError::IoError {
            path: full_path.clone(),
            source: e,
        };
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&full_path, bytes).map_err(io_err)
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve_path(path).is_file()
    }
}

/// In-memory storage for tests or embedded assets.
#[derive(Default)]
pub struct MemoryIo {
    /// Stored bytes keyed by path string.
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl AsRef<str>, bytes: Vec<u8>) {
        self.files.write().insert(path.as_ref().to_string(), bytes);
    }

    pub fn remove(&self, path: impl AsRef<str>) -> Option<Vec<u8>> {
        self.files.write().remove(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    fn key(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }
}

impl AssetIo for MemoryIo {
    fn read_bytes(&self, path: &Path) -> AssetResult<Vec<u8>> {
        let key = Self::key(path);
        self.files
            .read()
            .get(&key)
            .cloned()
            .ok_or(AssetError::NotFound { path: key })
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> AssetResult<()> {
        self.insert(Self::key(path), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.read().contains_key(&Self::key(path))
    }
}

//! Mapping source paths onto the output tree.

use std::path::{Path, PathBuf};

/// Extensions packed as textures.
pub const TEXTURE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];
/// Extensions recognised as models. Mesh import is not handled here.
pub const MODEL_EXTENSIONS: &[&str] = &["obj", "fbx", "gltf"];
/// Extension given to packed textures.
pub const TEXTURE_OUTPUT_EXTENSION: &str = "tx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Texture,
    Model,
}

/// Classify a source file by extension, ignoring case.
pub fn classify(path: &Path) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if TEXTURE_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceKind::Texture)
    } else if MODEL_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceKind::Model)
    } else {
        None
    }
}

/// Move `path` from under `from` to the same place under `to`.
///
/// Paths outside `from` keep only their file name.
pub fn change_root(from: &Path, to: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(from) {
        Ok(relative) => to.join(relative),
        Err(_) => to.join(path.file_name().unwrap_or(path.as_os_str())),
    }
}

/// `path` relative to `root`, with `/` separators on every platform.
pub fn relative_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Where the packed texture for `source` is written.
pub fn texture_output_path(input_root: &Path, output_root: &Path, source: &Path) -> PathBuf {
    change_root(input_root, output_root, source).with_extension(TEXTURE_OUTPUT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(Path::new("a/b.PNG")), Some(SourceKind::Texture));
        assert_eq!(classify(Path::new("a/b.jpeg")), Some(SourceKind::Texture));
        assert_eq!(classify(Path::new("a/b.gltf")), Some(SourceKind::Model));
        assert_eq!(classify(Path::new("a/b.txt")), None);
        assert_eq!(classify(Path::new("a/noext")), None);
    }

    #[test]
    fn test_change_root() {
        let out = change_root(Path::new("src"), Path::new("out"), Path::new("src/ui/icon.png"));
        assert_eq!(out, Path::new("out/ui/icon.png"));

        let outside = change_root(Path::new("src"), Path::new("out"), Path::new("other/x.png"));
        assert_eq!(outside, Path::new("out/x.png"));
    }

    #[test]
    fn test_texture_output_path() {
        let out = texture_output_path(
            Path::new("assets"),
            Path::new("packed"),
            Path::new("assets/env/sky.jpg"),
        );
        assert_eq!(out, Path::new("packed/env/sky.tx"));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("assets/env/sky.jpg"), Path::new("assets")),
            "env/sky.jpg"
        );
    }
}

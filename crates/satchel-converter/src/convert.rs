//! Walking a source tree and packing what it contains.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use satchel_assets::slot::INVALID_CHECKSUM;
use satchel_assets::{CompressionMode, TextureInfo, pack_texture};
use satchel_core::profiling::{self, profile_function, profile_scope};
use walkdir::WalkDir;

use crate::error::{ConvertError, ConvertResult};
use crate::paths::{self, SourceKind};
use crate::pool::TaskPool;

/// Hands out container checksums for one packing run.
///
/// Counts up from zero and wraps, never issuing the free-slot sentinel.
#[derive(Debug, Default)]
pub struct ChecksumCounter(AtomicU16);

impl ChecksumCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first: u16) -> Self {
        Self(AtomicU16::new(first))
    }

    pub fn next(&self) -> u16 {
        let mut issued = 0;
        // fetch_update only fails when the closure returns None
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                issued = if current == INVALID_CHECKSUM { 0 } else { current };
                Some(issued.wrapping_add(1))
            });
        issued
    }
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub compression: CompressionMode,
    /// Worker count; `None` uses one per CPU.
    pub threads: Option<usize>,
}

impl ConvertOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            compression: CompressionMode::Lz4,
            threads: None,
        }
    }

    pub fn with_compression(mut self, compression: CompressionMode) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConvertSummary {
    pub textures: usize,
    pub skipped_models: usize,
    pub failed: Vec<PathBuf>,
    pub elapsed: Duration,
}

/// Decode one image and write it as a texture container.
pub fn convert_texture(
    input: &Path,
    output: &Path,
    root: &Path,
    checksum: u16,
    compression: CompressionMode,
) -> ConvertResult<()> {
    profile_function!();

    let image = {
        profile_scope!("decode_image");
        image::open(input).map_err(|source| ConvertError::Image {
            path: input.to_path_buf(),
            source,
        })?
    };
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    let info = TextureInfo::rgba8(width, height)
        .with_compression(compression)
        .with_original_file(paths::relative_path(input, root));
    let asset_err = |source| ConvertError::Asset {
        path: output.to_path_buf(),
        source,
    };
    let mut file = pack_texture(&info, rgba.as_raw()).map_err(asset_err)?;
    file.checksum = checksum;
    file.save(output).map_err(asset_err)?;

    tracing::debug!(
        input = %input.display(),
        output = %output.display(),
        width,
        height,
        checksum,
        stored = file.blob.compressed_size(),
        "Packed texture"
    );
    profiling::new_frame();
    Ok(())
}

/// Pack every recognised file under `options.input` into `options.output`.
///
/// Individual file failures are logged and listed in the summary; only
/// problems with the trees themselves fail the run.
pub fn run(options: &ConvertOptions) -> ConvertResult<ConvertSummary> {
    let start = Instant::now();
    if !options.input.is_dir() {
        return Err(ConvertError::InvalidInput {
            path: options.input.clone(),
        });
    }

    let pool = match options.threads {
        Some(n) => TaskPool::new(n.max(1)),
        None => TaskPool::with_num_cpus(),
    }
    .map_err(|source| ConvertError::Io {
        path: options.input.clone(),
        source,
    })?;
    tracing::info!(
        input = %options.input.display(),
        output = %options.output.display(),
        threads = pool.thread_count(),
        compression = %options.compression,
        "Packing asset directory"
    );

    let checksums = Arc::new(ChecksumCounter::new());
    let root = Arc::new(options.input.clone());
    let mut summary = ConvertSummary::default();
    let mut jobs = Vec::new();

    for entry in WalkDir::new(&options.input).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let source = entry.into_path();

        match paths::classify(&source) {
            Some(SourceKind::Texture) => {
                let output = paths::texture_output_path(&options.input, &options.output, &source);
                if let Some(dir) = output.parent() {
                    std::fs::create_dir_all(dir).map_err(|e| ConvertError::Io {
                        path: dir.to_path_buf(),
                        source: e,
                    })?;
                }
                tracing::debug!(path = %source.display(), "Found texture");

                let checksums = checksums.clone();
                let root = root.clone();
                let compression = options.compression;
                let job_source = source.clone();
                let task = pool.spawn(async move {
                    convert_texture(&job_source, &output, &root, checksums.next(), compression)
                });
                jobs.push((source, task));
            }
            Some(SourceKind::Model) => {
                tracing::warn!(path = %source.display(), "Skipping model, mesh import is not supported");
                summary.skipped_models += 1;
            }
            None => {}
        }
    }

    for (source, task) in jobs {
        match futures_lite::future::block_on(task) {
            Ok(()) => summary.textures += 1,
            Err(err) => {
                tracing::error!(error = %err, "Conversion failed");
                summary.failed.push(source);
            }
        }
    }
    pool.shutdown();

    summary.elapsed = start.elapsed();
    tracing::info!(
        textures = summary.textures,
        skipped_models = summary.skipped_models,
        failed = summary.failed.len(),
        "{}ms to package",
        summary.elapsed.as_millis()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksums_count_up() {
        let counter = ChecksumCounter::new();
        assert_eq!(counter.next(), 0);
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
    }

    #[test]
    fn test_checksums_skip_sentinel() {
        let counter = ChecksumCounter::starting_at(0xFFFE);
        assert_eq!(counter.next(), 0xFFFE);
        assert_eq!(counter.next(), 0);
        assert_eq!(counter.next(), 1);
    }

    #[test]
    fn test_missing_input_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let options = ConvertOptions::new(temp_dir.path().join("nope"), temp_dir.path());
        assert!(matches!(
            run(&options),
            Err(ConvertError::InvalidInput { .. })
        ));
    }
}

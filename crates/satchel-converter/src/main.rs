use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use satchel_assets::CompressionMode;
use satchel_converter::{ConvertOptions, run};
use satchel_core::logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Compression {
    Lz4,
    None,
}

impl From<Compression> for CompressionMode {
    fn from(value: Compression) -> Self {
        match value {
            Compression::Lz4 => CompressionMode::Lz4,
            Compression::None => CompressionMode::None,
        }
    }
}

/// Pack a directory of source assets into Satchel containers
#[derive(Parser, Debug)]
#[command(name = "satchel-convert", version, about, long_about = None)]
struct Cli {
    /// Directory of source assets
    input: PathBuf,

    /// Directory the packed containers are written to
    output: PathBuf,

    /// Payload compression
    #[arg(long, value_enum, default_value_t = Compression::Lz4)]
    compression: Compression,

    /// Worker threads (defaults to one per CPU)
    #[arg(long)]
    threads: Option<usize>,

    /// Serve puffin profiling data on this address while packing
    #[cfg(feature = "profiling")]
    #[arg(long, value_name = "ADDR", num_args = 0..=1,
          default_missing_value = satchel_core::profiling::DEFAULT_PROFILING_ADDR)]
    profile: Option<String>,
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    #[cfg(feature = "profiling")]
    if let Some(addr) = &cli.profile {
        satchel_core::profiling::init_profiling(addr);
    }

    let mut options =
        ConvertOptions::new(&cli.input, &cli.output).with_compression(cli.compression.into());
    if let Some(threads) = cli.threads {
        options = options.with_threads(threads);
    }

    match run(&options) {
        Ok(summary) if summary.failed.is_empty() => ExitCode::SUCCESS,
        Ok(summary) => {
            tracing::error!("{} file(s) failed to convert", summary.failed.len());
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

//! Minimal end-to-end exercise of the backup and restore file pipelines
//! against a real file on disk: parse a couple of flags, print a short
//! report, exit nonzero on error rather than panicking.

use std::io::{Cursor, Write};
use std::process::ExitCode;

use clap::Parser;
use tikv_jemallocator::Jemalloc;

use pgxfilter::config::PipelineConfig;
use pgxfilter::filter::{CompressAlgorithm, HashAlgorithm};
use pgxfilter::pipeline::{BackupFileOptions, BackupFilePipeline, RestoreFileOptions, RestoreFilePipeline};
use pgxfilter::storage::{PosixStorageDriver, StorageDriver, WriteOptions};

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Backs a file up into a repository directory, then restores it back
/// out, verifying the round trip byte-for-byte.
#[derive(Parser)]
#[command(name = "pgxfilter-demo", about = "Backup+restore round trip over the filter pipeline")]
struct Args {
    /// File to back up.
    source: String,

    /// Repository directory to write the backup artifact into.
    #[arg(long, default_value = "/tmp/pgxfilter-demo-repo")]
    repo: String,

    /// Compression algorithm.
    #[arg(long, default_value = "zstd")]
    compress: String,

    /// Optional passphrase; when set, the artifact is encrypted.
    #[arg(long)]
    passphrase: Option<String>,
}

fn parse_compress(name: &str) -> Option<CompressAlgorithm> {
    match name {
        "gz" | "gzip" => Some(CompressAlgorithm::Gzip),
        "bz2" | "bzip2" => Some(CompressAlgorithm::Bzip2),
        "zstd" => Some(CompressAlgorithm::Zstd),
        "lz4" => Some(CompressAlgorithm::Lz4),
        "none" => None,
        other => {
            eprintln!("unknown compression algorithm '{other}', falling back to zstd");
            Some(CompressAlgorithm::Zstd)
        }
    }
}

fn run(args: Args) -> pgxfilter::error::Result<()> {
    let repo = PosixStorageDriver::new(&args.repo);
    let config = PipelineConfig {
        compress: parse_compress(&args.compress),
        cipher_passphrase: args.passphrase.clone(),
        hash: HashAlgorithm::Sha256,
        ..PipelineConfig::default()
    };

    let source_bytes = std::fs::read(&args.source).map_err(|e| pgxfilter::error::PgxError::FileRead {
        path: args.source.clone().into(),
        source: e,
    })?;
    tracing::info!(bytes = source_bytes.len(), source = %args.source, "read source file");

    let mut backup = BackupFilePipeline::build(&BackupFileOptions {
        compress: config.compress.map(|a| (a, config.compress_level)),
        cipher_passphrase: config.cipher_passphrase.clone(),
        chunk: true,
        hash: Some(config.hash),
        ..Default::default()
    });

    let mut artifact = Vec::new();
    let backup_results = backup.run(&mut Cursor::new(&source_bytes), &mut artifact)?;
    let backup_digest = backup_results
        .get("hash")
        .and_then(|p| p.get_bin(0))
        .map(|d| d.to_vec())
        .unwrap_or_default();

    let mut handle = repo.write_open("backup.artifact", &WriteOptions::default())?;
    handle.write_all(&artifact).map_err(|e| pgxfilter::error::PgxError::FileWrite {
        path: "backup.artifact".into(),
        source: e,
    })?;
    handle.finish()?;
    tracing::info!(artifact_bytes = artifact.len(), "wrote backup artifact");

    let mut restore = RestoreFilePipeline::build(&RestoreFileOptions {
        dechunk: true,
        cipher_passphrase: config.cipher_passphrase,
        decompress: config.compress,
        hash: Some(config.hash),
    });

    let mut reader = repo.read_open("backup.artifact")?;
    let mut recovered = Vec::new();
    let restore_results = restore.run(reader.as_mut(), &mut recovered)?;
    let restore_digest = restore_results
        .get("hash")
        .and_then(|p| p.get_bin(0))
        .map(|d| d.to_vec())
        .unwrap_or_default();

    if recovered != source_bytes {
        eprintln!("restore mismatch: recovered {} bytes, expected {}", recovered.len(), source_bytes.len());
        return Err(pgxfilter::error::PgxError::Format("restored bytes do not match source".into()));
    }
    if backup_digest != restore_digest {
        eprintln!("content hash mismatch between backup and restore");
        return Err(pgxfilter::error::PgxError::Checksum("backup/restore digest mismatch".into()));
    }

    println!(
        "backup+restore round trip OK: {} bytes -> {} byte artifact -> {} bytes restored",
        source_bytes.len(),
        artifact.len(),
        recovered.len()
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "pgxfilter-demo failed");
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code().clamp(1, 255) as u8)
        }
    }
}

//! Configuration types a caller fills in to drive the pipeline and
//! block-incremental engine: compression/cipher choice, repository
//! location, and the block-size class rule. No YAML/CLI parsing lives
//! here — these are the seam a higher layer (a real `backup`/`restore`
//! command dispatcher) would populate; `serde::Deserialize` is derived
//! so a higher layer can still load them from a config file directly.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::filter::{CompressAlgorithm, HashAlgorithm};

/// Formats a backup label the way the original tool does:
/// `YYYYMMDD-HHMMSS`, UTC. Used by [`crate::block_incremental::resolve_latest`]
/// callers to name the artifact a fresh full/diff/incr backup is stored
/// under.
pub fn format_backup_label(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}

/// Where backup artifacts live and how writes to it are performed.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoConfig {
    pub path: String,
    #[serde(default = "default_true")]
    pub atomic_write: bool,
    #[serde(default = "default_true")]
    pub sync_file: bool,
    #[serde(default = "default_true")]
    pub sync_path: bool,
}

fn default_true() -> bool {
    true
}

/// Rule for choosing `block-size`/`checksum-size` by file size class.
/// The exact schedule pgBackRest uses is not part of this repository
/// slice, so this is left as a caller-supplied table rather than a
/// baked-in policy: entries are checked in order, the first whose
/// `min_file_size` the file meets or exceeds wins, and `thresholds`
/// must be sorted descending by `min_file_size` so the most specific
/// (largest) bound is checked first.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockIncrementalConfig {
    pub enabled: bool,
    pub thresholds: Vec<BlockSizeThreshold>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BlockSizeThreshold {
    pub min_file_size: u64,
    pub block_size: usize,
    pub checksum_size: usize,
}

impl BlockIncrementalConfig {
    /// A reasonable default schedule: larger files get larger blocks and
    /// wider checksums, since both the block-map overhead and the
    /// collision risk grow with block count. Not authoritative — callers
    /// with their own policy should build their own `thresholds`.
    pub fn default_schedule() -> Self {
        Self {
            enabled: true,
            thresholds: vec![
                BlockSizeThreshold {
                    min_file_size: 1024 * 1024 * 1024,
                    block_size: 1024 * 1024,
                    checksum_size: 16,
                },
                BlockSizeThreshold {
                    min_file_size: 64 * 1024 * 1024,
                    block_size: 128 * 1024,
                    checksum_size: 10,
                },
                BlockSizeThreshold {
                    min_file_size: 0,
                    block_size: 8 * 1024,
                    checksum_size: 6,
                },
            ],
        }
    }

    /// Picks `(block_size, checksum_size)` for a file of `file_size`
    /// bytes, or `None` if block-incremental is disabled or no threshold
    /// matches (an empty `thresholds` list, a caller error).
    pub fn size_class_for(&self, file_size: u64) -> Option<(usize, usize)> {
        if !self.enabled {
            return None;
        }
        self.thresholds
            .iter()
            .find(|t| file_size >= t.min_file_size)
            .map(|t| (t.block_size, t.checksum_size))
    }
}

/// Per-operation pipeline configuration: compression, encryption, and
/// the content-hash algorithm a backup/restore run uses.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub compress: Option<CompressAlgorithm>,
    #[serde(default = "default_compress_level")]
    pub compress_level: i32,
    pub cipher_passphrase: Option<String>,
    #[serde(default = "default_hash_algorithm")]
    pub hash: HashAlgorithm,
    #[serde(default)]
    pub delta: bool,
    #[serde(default)]
    pub block_incremental: Option<BlockIncrementalConfig>,
}

fn default_compress_level() -> i32 {
    6
}

fn default_hash_algorithm() -> HashAlgorithm {
    HashAlgorithm::Sha256
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compress: Some(CompressAlgorithm::Gzip),
            compress_level: default_compress_level(),
            cipher_passphrase: None,
            hash: default_hash_algorithm(),
            delta: false,
            block_incremental: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn backup_label_matches_original_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 5, 34, 11).unwrap();
        assert_eq!(format_backup_label(at), "20240517-053411");
    }

    #[test]
    fn size_class_picks_largest_matching_threshold() {
        let config = BlockIncrementalConfig::default_schedule();
        assert_eq!(config.size_class_for(10 * 1024 * 1024 * 1024), Some((1024 * 1024, 16)));
        assert_eq!(config.size_class_for(100 * 1024 * 1024), Some((128 * 1024, 10)));
        assert_eq!(config.size_class_for(1024), Some((8 * 1024, 6)));
    }

    #[test]
    fn disabled_block_incremental_yields_no_size_class() {
        let mut config = BlockIncrementalConfig::default_schedule();
        config.enabled = false;
        assert_eq!(config.size_class_for(1024 * 1024 * 1024), None);
    }

    #[test]
    fn pipeline_config_default_uses_gzip_and_sha256() {
        let config = PipelineConfig::default();
        assert_eq!(config.compress, Some(CompressAlgorithm::Gzip));
        assert_eq!(config.hash, HashAlgorithm::Sha256);
    }
}

//! Repository storage driver.
//!
//! A small `StorageDriver` trait plus a POSIX filesystem implementation,
//! grounded on
//! `examples/original_source/src/storage/driver/posix/{driver,driverWrite,driverRead}.c`.
//! Higher layers (the backup/restore pipeline, the block map) talk to
//! the trait so a future non-POSIX backend (S3, GCS, ...) could be
//! added without touching them.

mod posix;

pub use posix::PosixStorageDriver;

use std::io::{Read, Write};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    File,
    Path,
    Link,
}

#[derive(Debug, Clone)]
pub struct StorageInfo {
    pub exists: bool,
    pub storage_type: StorageType,
    pub size: u64,
    pub mode: u32,
    /// Last modification time, Unix seconds.
    pub mtime: i64,
    pub user_id: u32,
    pub group_id: u32,
    /// Populated only when `storage_type` is [`StorageType::Link`] —
    /// the symlink's target, unresolved.
    pub link_destination: Option<String>,
}

impl StorageInfo {
    pub fn missing() -> Self {
        Self {
            exists: false,
            storage_type: StorageType::File,
            size: 0,
            mode: 0,
            mtime: 0,
            user_id: 0,
            group_id: 0,
            link_destination: None,
        }
    }
}

/// Options controlling how a file write is performed. Mirrors the posix
/// driver's `StorageFileWritePosix` constructor flags.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub mode_file: u32,
    pub mode_path: u32,
    pub create_path: bool,
    pub sync_file: bool,
    pub sync_path: bool,
    pub atomic: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            mode_file: 0o640,
            mode_path: 0o750,
            create_path: true,
            sync_file: true,
            sync_path: true,
            atomic: true,
        }
    }
}

pub trait StorageDriver: Send + Sync {
    fn exists(&self, path: &str) -> Result<bool>;
    fn info(&self, path: &str, ignore_missing: bool) -> Result<StorageInfo>;
    fn list(&self, path: &str, error_on_missing: bool) -> Result<Vec<String>>;

    fn path_create(&self, path: &str, error_on_exists: bool, mode: u32) -> Result<()>;
    fn path_remove(&self, path: &str, error_on_missing: bool, recurse: bool) -> Result<()>;
    fn path_sync(&self, path: &str, ignore_missing: bool) -> Result<()>;

    fn remove(&self, path: &str, error_on_missing: bool) -> Result<()>;
    fn file_move(&self, from: &str, to: &str, options: &WriteOptions) -> Result<()>;

    /// Opens `path` for reading.
    fn read_open(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    /// Opens `path` for writing per `options`, returning a handle whose
    /// `finish()` performs the close/sync/rename lifecycle.
    fn write_open(&self, path: &str, options: &WriteOptions) -> Result<Box<dyn StorageWriteHandle>>;
}

/// A write in progress. `finish()` must be called to sync/close/rename;
/// dropping without calling it leaves the temp file behind (mirrors the
/// posix driver's explicit close step rather than attaching this to
/// `Drop`, so callers that abort a write after an error don't silently
/// publish a partial file).
pub trait StorageWriteHandle: Write {
    fn finish(self: Box<Self>) -> Result<()>;
}

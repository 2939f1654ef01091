//! POSIX filesystem storage driver.
//!
//! Grounded on
//! `examples/original_source/src/storage/driver/posix/driver.c` (exists/
//! info/list/path create+remove+sync/remove/move) and `driverWrite.c`
//! (the write lifecycle: open a `.pgxtmp` sibling, write, sync+close,
//! rename over the final name, sync the containing directory).

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use super::{StorageDriver, StorageInfo, StorageType, StorageWriteHandle, WriteOptions};
use crate::error::{PgxError, Result};

const TEMP_EXT: &str = "pgxtmp";

pub struct PosixStorageDriver {
    base: PathBuf,
}

impl PosixStorageDriver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base.join(path)
    }
}

fn temp_name(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{TEMP_EXT}"));
    PathBuf::from(name)
}

fn sync_path(path: &Path) -> Result<()> {
    let dir = File::open(path).map_err(|e| PgxError::PathSync {
        path: path.to_path_buf(),
        source: e,
    })?;
    dir.sync_all().map_err(|e| PgxError::PathSync {
        path: path.to_path_buf(),
        source: e,
    })
}

impl StorageDriver for PosixStorageDriver {
    fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path);
        match fs::symlink_metadata(&full) {
            Ok(meta) => Ok(!meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PgxError::FileExists { path: full, source: e }),
        }
    }

    fn info(&self, path: &str, ignore_missing: bool) -> Result<StorageInfo> {
        let full = self.resolve(path);
        match fs::symlink_metadata(&full) {
            Ok(meta) => {
                let storage_type = if meta.is_file() {
                    StorageType::File
                } else if meta.is_dir() {
                    StorageType::Path
                } else {
                    StorageType::Link
                };
                let link_destination = if storage_type == StorageType::Link {
                    fs::read_link(&full).ok().map(|p| p.to_string_lossy().into_owned())
                } else {
                    None
                };
                Ok(StorageInfo {
                    exists: true,
                    storage_type,
                    size: meta.size(),
                    mode: meta.permissions().mode() & 0o777,
                    mtime: meta.mtime(),
                    user_id: meta.uid(),
                    group_id: meta.gid(),
                    link_destination,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && ignore_missing => Ok(StorageInfo::missing()),
            Err(e) => Err(PgxError::FileInfo { path: full, source: e }),
        }
    }

    fn list(&self, path: &str, error_on_missing: bool) -> Result<Vec<String>> {
        let full = self.resolve(path);
        match fs::read_dir(&full) {
            Ok(entries) => {
                let mut names = Vec::new();
                for entry in entries {
                    let entry = entry.map_err(|e| PgxError::FileRead {
                        path: full.clone(),
                        source: e,
                    })?;
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
                Ok(names)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !error_on_missing => Ok(Vec::new()),
            Err(e) => Err(PgxError::PathOpen { path: full, source: e }),
        }
    }

    fn path_create(&self, path: &str, error_on_exists: bool, mode: u32) -> Result<()> {
        let full = self.resolve(path);
        match fs::create_dir_all(&full) {
            Ok(()) => {
                let _ = fs::set_permissions(&full, fs::Permissions::from_mode(mode));
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && !error_on_exists => Ok(()),
            Err(e) => Err(PgxError::PathCreate { path: full, source: e }),
        }
    }

    fn path_remove(&self, path: &str, error_on_missing: bool, recurse: bool) -> Result<()> {
        let full = self.resolve(path);
        let result = if recurse {
            fs::remove_dir_all(&full)
        } else {
            fs::remove_dir(&full)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !error_on_missing => Ok(()),
            Err(e) => Err(PgxError::PathRemove { path: full, source: e }),
        }
    }

    fn path_sync(&self, path: &str, ignore_missing: bool) -> Result<()> {
        let full = self.resolve(path);
        match sync_path(&full) {
            Ok(()) => Ok(()),
            Err(PgxError::PathSync { source, .. }) if source.kind() == std::io::ErrorKind::NotFound && ignore_missing => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn remove(&self, path: &str, error_on_missing: bool) -> Result<()> {
        let full = self.resolve(path);
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !error_on_missing => Ok(()),
            Err(e) => Err(PgxError::FileRemove { path: full, source: e }),
        }
    }

    fn file_move(&self, from: &str, to: &str, options: &WriteOptions) -> Result<()> {
        let from_full = self.resolve(from);
        let to_full = self.resolve(to);

        match fs::rename(&from_full, &to_full) {
            Ok(()) => {
                if options.sync_path {
                    if let Some(parent) = to_full.parent() {
                        sync_path(parent)?;
                    }
                }
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && options.create_path => {
                if !self.exists(from)? {
                    return Err(PgxError::FileMissing { path: from_full });
                }
                if let Some(parent) = to_full.parent() {
                    fs::create_dir_all(parent).map_err(|e| PgxError::PathCreate {
                        path: parent.to_path_buf(),
                        source: e,
                    })?;
                }
                fs::rename(&from_full, &to_full).map_err(|e| PgxError::FileMove {
                    from: from_full,
                    to: to_full,
                    source: e,
                })
            }
            Err(e) => {
                // EXDEV: source and destination are on different devices,
                // so fall back to copy + remove.
                if e.raw_os_error() == Some(libc_exdev()) {
                    fs::copy(&from_full, &to_full).map_err(|e| PgxError::FileMove {
                        from: from_full.clone(),
                        to: to_full.clone(),
                        source: e,
                    })?;
                    fs::remove_file(&from_full).map_err(|e| PgxError::FileRemove { path: from_full, source: e })
                } else {
                    Err(PgxError::FileMove {
                        from: from_full,
                        to: to_full,
                        source: e,
                    })
                }
            }
        }
    }

    fn read_open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let full = self.resolve(path);
        let file = File::open(&full).map_err(|e| PgxError::FileOpen { path: full, source: e })?;
        Ok(Box::new(file))
    }

    fn write_open(&self, path: &str, options: &WriteOptions) -> Result<Box<dyn StorageWriteHandle>> {
        let full = self.resolve(path);
        let name_tmp = if options.atomic { temp_name(&full) } else { full.clone() };

        let open = |create_parent: bool| -> std::io::Result<File> {
            if create_parent {
                if let Some(parent) = full.parent() {
                    let _ = fs::create_dir_all(parent);
                }
            }
            OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .mode(options.mode_file)
                .open(&name_tmp)
        };

        let file = match open(false) {
            Ok(f) => f,
            Err(_) if options.create_path => open(true).map_err(|e| PgxError::FileOpen {
                path: name_tmp.clone(),
                source: e,
            })?,
            Err(e) => return Err(PgxError::FileOpen { path: name_tmp, source: e }),
        };

        Ok(Box::new(PosixWriteHandle {
            file: Some(file),
            name_tmp,
            name: full,
            options: options.clone(),
        }))
    }
}

struct PosixWriteHandle {
    file: Option<File>,
    name_tmp: PathBuf,
    name: PathBuf,
    options: WriteOptions,
}

impl Write for PosixWriteHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.as_mut().expect("write after finish").write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.as_mut().expect("write after finish").flush()
    }
}

impl StorageWriteHandle for PosixWriteHandle {
    fn finish(mut self: Box<Self>) -> Result<()> {
        let file = self.file.take().expect("finish called twice");

        if self.options.sync_file {
            file.sync_all().map_err(|e| PgxError::FileSync {
                path: self.name_tmp.clone(),
                source: e,
            })?;
        }
        drop(file);

        if self.options.atomic {
            fs::rename(&self.name_tmp, &self.name).map_err(|e| PgxError::FileMove {
                from: self.name_tmp.clone(),
                to: self.name.clone(),
                source: e,
            })?;
        }

        if self.options.sync_path {
            if let Some(parent) = self.name.parent() {
                sync_path(parent)?;
            }
        }

        Ok(())
    }
}

fn libc_exdev() -> i32 {
    18
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let driver = PosixStorageDriver::new(dir.path());

        let mut handle = driver.write_open("a/b/file.txt", &WriteOptions::default()).unwrap();
        handle.write_all(b"hello").unwrap();
        handle.finish().unwrap();

        assert!(driver.exists("a/b/file.txt").unwrap());
        let mut reader = driver.read_open("a/b/file.txt").unwrap();
        let mut contents = String::new();
        reader.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello");
    }

    #[test]
    fn atomic_write_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let driver = PosixStorageDriver::new(dir.path());

        let mut handle = driver.write_open("file.txt", &WriteOptions::default()).unwrap();
        handle.write_all(b"data").unwrap();
        handle.finish().unwrap();

        let names = driver.list("", true).unwrap();
        assert_eq!(names, vec!["file.txt".to_string()]);
    }

    #[test]
    fn path_create_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let driver = PosixStorageDriver::new(dir.path());

        driver.path_create("a/b/c", false, 0o750).unwrap();
        assert!(driver.info("a/b/c", false).unwrap().exists);

        driver.path_remove("a", false, true).unwrap();
        assert!(!driver.info("a", true).unwrap().exists);
    }

    #[test]
    fn move_relocates_file_across_directories() {
        let dir = tempfile::tempdir().unwrap();
        let driver = PosixStorageDriver::new(dir.path());

        let mut handle = driver.write_open("src.txt", &WriteOptions::default()).unwrap();
        handle.write_all(b"payload").unwrap();
        handle.finish().unwrap();

        driver.file_move("src.txt", "dest/dir/dst.txt", &WriteOptions::default()).unwrap();
        assert!(!driver.exists("src.txt").unwrap());
        assert!(driver.exists("dest/dir/dst.txt").unwrap());
    }

    #[test]
    fn remove_missing_file_without_error_on_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let driver = PosixStorageDriver::new(dir.path());
        driver.remove("does-not-exist.txt", false).unwrap();
    }
}

//! Error substrate.
//!
//! A single typed error enum with `Result`/`?` propagation throughout,
//! plus `fatal()`/`exit_code()` methods so a top-level handler can map
//! any error to a process exit status without a parallel classification
//! tree.

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, PgxError>;

/// Typed error hierarchy. Each filesystem variant carries the offending
/// path so `Display` renders `"<verb> '<path>': <os error>"`.
#[derive(Debug, thiserror::Error)]
pub enum PgxError {
    #[error("assertion failed: {0}")]
    Assert(String),

    #[error("{0}")]
    Format(String),

    #[error("unable to open '{path}': {source}")]
    FileOpen { path: PathBuf, source: io::Error },

    #[error("unable to open path '{path}': {source}")]
    PathOpen { path: PathBuf, source: io::Error },

    #[error("unable to read '{path}': {source}")]
    FileRead { path: PathBuf, source: io::Error },

    #[error("unable to write '{path}': {source}")]
    FileWrite { path: PathBuf, source: io::Error },

    #[error("unable to find '{path}'")]
    FileMissing { path: PathBuf },

    #[error("unable to move '{from}' to '{to}': {source}")]
    FileMove {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("unable to remove '{path}': {source}")]
    FileRemove { path: PathBuf, source: io::Error },

    #[error("unable to sync '{path}': {source}")]
    FileSync { path: PathBuf, source: io::Error },

    #[error("unable to close '{path}': {source}")]
    FileClose { path: PathBuf, source: io::Error },

    #[error("unable to stat '{path}': {source}")]
    FileInfo { path: PathBuf, source: io::Error },

    #[error("unable to test existence of '{path}': {source}")]
    FileExists { path: PathBuf, source: io::Error },

    #[error("unable to create path '{path}': {source}")]
    PathCreate { path: PathBuf, source: io::Error },

    #[error("unable to remove path '{path}': {source}")]
    PathRemove { path: PathBuf, source: io::Error },

    #[error("unable to sync path '{path}': {source}")]
    PathSync { path: PathBuf, source: io::Error },

    #[error("path '{path}' is not empty")]
    PathNotEmpty { path: PathBuf },

    #[error("cipher error: {0}")]
    Cipher(String),

    #[error("checksum error: {0}")]
    Checksum(String),

    #[error("reference artifact '{path}' is missing")]
    FileMissingReference { path: PathBuf },

    #[error("operation cancelled")]
    Cancelled,

    #[error("unhandled error: {0}")]
    Unhandled(String),
}

impl PgxError {
    /// Whether this kind should always abort the current operation
    /// rather than be handled as a recoverable condition.
    pub fn fatal(&self) -> bool {
        matches!(
            self,
            PgxError::Assert(_) | PgxError::Unhandled(_) | PgxError::Cancelled
        )
    }

    /// Process exit code this error maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            PgxError::Assert(_) => 2,
            PgxError::Format(_) => 3,
            PgxError::FileOpen { .. } => 10,
            PgxError::PathOpen { .. } => 10,
            PgxError::FileRead { .. } => 11,
            PgxError::FileWrite { .. } => 12,
            PgxError::FileMissing { .. } | PgxError::FileMissingReference { .. } => 13,
            PgxError::FileMove { .. } => 14,
            PgxError::FileRemove { .. } => 15,
            PgxError::FileSync { .. } => 16,
            PgxError::FileClose { .. } => 17,
            PgxError::FileInfo { .. } => 18,
            PgxError::FileExists { .. } => 19,
            PgxError::PathCreate { .. } => 20,
            PgxError::PathRemove { .. } => 21,
            PgxError::PathSync { .. } => 22,
            PgxError::PathNotEmpty { .. } => 23,
            PgxError::Cipher(_) => 30,
            PgxError::Checksum(_) => 31,
            PgxError::Cancelled => 40,
            PgxError::Unhandled(_) => 255,
        }
    }
}

/// Cooperative cancellation token shared across a pipeline's caller and
/// any workers it spawns.
#[derive(Clone, Default)]
pub struct CancelToken(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Returns `Err(PgxError::Cancelled)` if cancellation was requested;
    /// Intended to be called at each pipeline pump step.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PgxError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds() {
        assert!(PgxError::Assert("x".into()).fatal());
        assert!(PgxError::Cancelled.fatal());
        assert!(!PgxError::Checksum("x".into()).fatal());
    }

    #[test]
    fn cancel_token_round_trip() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(matches!(token.check(), Err(PgxError::Cancelled)));
    }

    #[test]
    fn display_format_renders_verb_and_path() {
        let err = PgxError::FileWrite {
            path: PathBuf::from("/tmp/x"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("unable to write '/tmp/x':"));
    }
}

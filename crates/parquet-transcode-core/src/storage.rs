//! Local filesystem helpers used by the transcode pipeline.
//!
//! Everything that touches the disk lives here: whole-file reads, atomic
//! publish of finished output (write-then-rename), directory listing and
//! sidecar removal. Higher layers add file/operation context on top of
//! [`StorageError`].

use snafu::{Backtrace, prelude::*};
use std::{
    error::Error,
    fmt, io,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by the storage backend implementation.
///
/// Only the local filesystem is supported; backend-specific I/O errors are
/// wrapped here so [`StorageError`] variants can add path context.
#[derive(Debug)]
pub enum BackendError {
    /// A local filesystem I/O error.
    Local(io::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Local(e) => write!(f, "local I/O error: {e}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BackendError::Local(e) => Some(e),
        }
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// The specified path was not found.
    #[snafu(display("Path not found: {path}"))]
    NotFound {
        /// The path that was not found.
        path: String,
        /// Underlying backend error that caused the failure.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// The path exists but is not of the expected kind.
    #[snafu(display("Expected a {expected} at {path}"))]
    WrongKind {
        /// Offending path.
        path: String,
        /// What the caller needed (`file` or `directory`).
        expected: &'static str,
    },

    /// An I/O error occurred on the local filesystem.
    #[snafu(display("Local I/O error at {path}: {source}"))]
    OtherIo {
        /// The path where the I/O error occurred.
        path: String,
        /// Underlying backend I/O error with platform-specific details.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },
}

impl StorageError {
    /// Whether this error means the path does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

fn classify(path: &Path, e: io::Error) -> StorageError {
    let path = path.display().to_string();
    if e.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound {
            path,
            source: BackendError::Local(e),
            backtrace: Backtrace::capture(),
        }
    } else {
        StorageError::OtherIo {
            path,
            source: BackendError::Local(e),
            backtrace: Backtrace::capture(),
        }
    }
}

/// What a path currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// A regular file (symlinks are followed).
    File,
    /// A directory (symlinks are followed).
    Directory,
}

/// Stat `path`, following symlinks.
///
/// A missing path yields `StorageError::NotFound`.
pub async fn path_kind(path: &Path) -> StorageResult<PathKind> {
    let meta = fs::metadata(path).await.map_err(|e| classify(path, e))?;
    Ok(if meta.is_dir() {
        PathKind::Directory
    } else {
        PathKind::File
    })
}

/// Read the full contents of the file at `path`.
///
/// - Missing file: `StorageError::NotFound`.
/// - Any other I/O problem: `StorageError::OtherIo`.
pub async fn read_all_bytes(path: &Path) -> StorageResult<Vec<u8>> {
    fs::read(path).await.map_err(|e| classify(path, e))
}

/// Create `dir` and any missing parents.
pub async fn create_dir_all(dir: &Path) -> StorageResult<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(BackendError::Local)
        .context(OtherIoSnafu {
            path: dir.display().to_string(),
        })
}

/// Guard that removes a temporary file on drop unless disarmed.
/// Used to ensure cleanup on error paths during atomic writes.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Disarm the guard so the file is NOT removed on drop.
    /// Call this after a successful rename.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort; the caller is already propagating the real error.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Temporary sibling used while publishing `target`.
pub fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Write `contents` to `path`, replacing any existing file atomically.
///
/// The payload goes to a temporary sibling first, is synced, and is then
/// renamed over the target. On failure the temporary file is removed and the
/// target is left untouched, so no partial output is ever visible.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).await?;
    }

    let tmp_path = temp_path_for(path);
    let mut guard = TempFileGuard::new(tmp_path.clone());

    {
        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;

        file.write_all(contents)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;

        file.sync_all()
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;
    }

    fs::rename(&tmp_path, path)
        .await
        .map_err(BackendError::Local)
        .context(OtherIoSnafu {
            path: path.display().to_string(),
        })?;

    guard.disarm();
    Ok(())
}

/// List the immediate non-directory entries of `dir`, sorted by file name.
///
/// Symlinks are followed when deciding whether an entry is a directory.
pub async fn list_files(dir: &Path) -> StorageResult<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await.map_err(|e| classify(dir, e))?;
    let mut files = Vec::new();

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(BackendError::Local)
        .context(OtherIoSnafu {
            path: dir.display().to_string(),
        })?
    {
        let path = entry.path();
        match path_kind(&path).await {
            Ok(PathKind::File) => files.push(path),
            Ok(PathKind::Directory) => {}
            // Dangling symlink or a file removed mid-listing.
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Remove the file at `path`.
pub async fn remove_file(path: &Path) -> StorageResult<()> {
    fs::remove_file(path).await.map_err(|e| classify(path, e))
}

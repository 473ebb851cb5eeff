//! Physical subtree walks and disk queries below the DAV root.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use davsync_core::error::{AppError, ErrorKind};
use davsync_core::result::AppResult;
use davsync_core::types::path::StoragePath;

/// One entry met during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Storage path of the entry.
    pub path: StoragePath,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Every entry of the subtree at `start`, the start itself first and each
/// directory before its contents. Siblings come in name order.
pub async fn subtree(root: &Path, start: &StoragePath) -> AppResult<Vec<WalkEntry>> {
    let root = root.to_path_buf();
    let physical = start.to_fs_path(&root);
    blocking(move || {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&physical).sort_by_file_name() {
            let entry = entry.map_err(walk_error)?;
            entries.push(WalkEntry {
                path: StoragePath::from_fs_path(&root, entry.path())?,
                is_dir: entry.file_type().is_dir(),
            });
        }
        Ok(entries)
    })
    .await
}

/// Total size of the regular files below `path` (the file's own size when
/// `path` is a file).
pub async fn tree_size(path: PathBuf) -> AppResult<u64> {
    blocking(move || {
        let mut total = 0u64;
        for entry in WalkDir::new(&path) {
            let entry = entry.map_err(walk_error)?;
            if entry.file_type().is_file() {
                total += entry.metadata().map_err(walk_error)?.len();
            }
        }
        Ok(total)
    })
    .await
}

/// Bytes available to unprivileged writers on the filesystem holding
/// `path`. Always 0 where the platform offers no `statvfs`.
pub async fn free_space(path: PathBuf) -> AppResult<u64> {
    blocking(move || statvfs_available(&path)).await
}

#[cfg(unix)]
fn statvfs_available(path: &Path) -> AppResult<u64> {
    let stats = nix::sys::statvfs::statvfs(path).map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("statvfs failed for '{}'", path.display()),
            e,
        )
    })?;
    Ok(stats.blocks_available() as u64 * stats.fragment_size() as u64)
}

#[cfg(not(unix))]
fn statvfs_available(_path: &Path) -> AppResult<u64> {
    Ok(0)
}

async fn blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Directory walk panicked", e))?
}

fn walk_error(e: walkdir::Error) -> AppError {
    let message = format!("Directory walk failed: {e}");
    AppError::with_source(ErrorKind::Storage, message, e)
}

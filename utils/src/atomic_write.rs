//! Atomic file write helpers.
//!
//! Uses a temp file + link pattern. Readers never observe a partially written
//! file: the destination either does not exist yet or holds the complete bytes.
//! The write refuses to replace an existing destination, which is what makes it
//! usable as an exclusive-create primitive.

#[cfg(unix)]
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
#[cfg(unix)]
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Allow the file to inherit the default umask.
    #[default]
    Default,
    /// Owner read/write, group/other read (0o644 on Unix).
    SharedReadOnly,
}

impl PersistMode {
    #[cfg(unix)]
    fn mode(self) -> Option<u32> {
        match self {
            Self::Default => None,
            Self::SharedReadOnly => Some(0o644),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AtomicWriteOptions {
    /// File sync policy for the temp file before persisting.
    pub file_sync: FileSyncPolicy,
    /// Parent directory sync policy after the file has been persisted.
    pub parent_dir_sync: ParentDirSyncPolicy,
    /// Determine the permission policy for the created file.
    pub mode: PersistMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSyncPolicy {
    SyncAll,
    SkipSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentDirSyncPolicy {
    SyncBestEffort,
    SkipSync,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self {
        Self {
            file_sync: FileSyncPolicy::SyncAll,
            parent_dir_sync: ParentDirSyncPolicy::SkipSync,
            mode: PersistMode::Default,
        }
    }
}

impl AtomicWriteOptions {
    /// Options for records that must survive a crash once the call returns.
    #[must_use]
    pub fn durable() -> Self {
        Self {
            file_sync: FileSyncPolicy::SyncAll,
            parent_dir_sync: ParentDirSyncPolicy::SyncBestEffort,
            mode: PersistMode::SharedReadOnly,
        }
    }
}

/// Write `bytes` to `path`, failing with [`io::ErrorKind::AlreadyExists`] if
/// `path` is already present. Two concurrent callers targeting the same path
/// cannot both succeed.
pub fn atomic_write_new_with_options(
    path: impl AsRef<Path>,
    bytes: &[u8],
    options: AtomicWriteOptions,
) -> io::Result<()> {
    let path = path.as_ref();
    let parent = parent_dir(path);

    let tmp = write_temp(parent, bytes, options)?;

    // Persist (link) but fail if the destination already exists.
    if let Err(err) = tmp.persist_noclobber(path) {
        return Err(err.error);
    }

    finish(path, parent, options)
}

fn parent_dir(path: &Path) -> &Path {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    }
}

fn write_temp(parent: &Path, bytes: &[u8], options: AtomicWriteOptions) -> io::Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    if matches!(options.file_sync, FileSyncPolicy::SyncAll) {
        tmp.as_file().sync_all()?;
    }
    Ok(tmp)
}

fn finish(path: &Path, parent: &Path, options: AtomicWriteOptions) -> io::Result<()> {
    #[cfg(unix)]
    if let Some(mode) = options.mode.mode() {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }

    if matches!(options.parent_dir_sync, ParentDirSyncPolicy::SyncBestEffort) {
        best_effort_sync_parent_dir(parent);
    }

    Ok(())
}

#[cfg(unix)]
fn best_effort_sync_parent_dir(parent: &Path) {
    if let Err(e) = File::open(parent).and_then(|d| d.sync_all()) {
        debug!(path = %parent.display(), "Parent directory sync_all failed (best-effort): {e}");
    }
}

#[cfg(not(unix))]
fn best_effort_sync_parent_dir(_parent: &Path) {}

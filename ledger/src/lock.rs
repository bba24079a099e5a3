//! Advisory append lock.
//!
//! Appenders take an exclusive `flock` on `ledger/.lock` for the duration of
//! a tail read plus the record writes that follow it. The lock is per open
//! file description, so two handles in the same process exclude each other
//! just like two processes do. Readers never take it.
//!
//! On non-unix targets the guard is a no-op; ordering then rests entirely on
//! the no-clobber record write.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::LedgerError;

pub(crate) const LOCK_FILE: &str = ".lock";

const INITIAL_BACKOFF: Duration = Duration::from_millis(2);
const MAX_BACKOFF: Duration = Duration::from_millis(50);

/// Held while appending. Released on drop.
#[derive(Debug)]
pub(crate) struct AppendLock {
    file: File,
    path: PathBuf,
}

impl AppendLock {
    pub(crate) fn acquire(ledger_dir: &Path, timeout: Duration) -> Result<Self, LedgerError> {
        let path = ledger_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| LedgerError::io(&path, e))?;

        let started = Instant::now();
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match try_lock_exclusive(&file) {
                Ok(true) => {
                    tracing::trace!(path = %path.display(), "Acquired ledger append lock");
                    return Ok(Self { file, path });
                }
                Ok(false) => {}
                Err(e) => return Err(LedgerError::io(&path, e)),
            }

            let waited = started.elapsed();
            if waited >= timeout {
                tracing::warn!(path = %path.display(), ?waited, "Ledger append lock timed out");
                return Err(LedgerError::LockTimeout { path, waited });
            }
            thread::sleep(backoff.min(timeout - waited));
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
}

impl Drop for AppendLock {
    fn drop(&mut self) {
        if let Err(e) = unlock(&self.file) {
            // Closing the descriptor releases the lock anyway.
            tracing::debug!(path = %self.path.display(), "Failed to unlock ledger: {e}");
        }
    }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> std::io::Result<bool> {
    use std::os::fd::AsRawFd;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    match err.kind() {
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted => Ok(false),
        _ => Err(err),
    }
}

#[cfg(unix)]
fn unlock(file: &File) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> std::io::Result<bool> {
    Ok(true)
}

#[cfg(not(unix))]
fn unlock(_file: &File) -> std::io::Result<()> {
    Ok(())
}

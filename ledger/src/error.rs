use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O error at {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to encode {tag} event: {source}")]
    Encode {
        tag: &'static str,
        source: serde_json::Error,
    },
    #[error("corrupt ledger record {seq} at {}: {reason}", path.display())]
    Corrupt {
        seq: u64,
        path: PathBuf,
        reason: String,
    },
    #[error("ledger record {seq} has unknown event type {tag:?}")]
    UnknownEventType { seq: u64, tag: String },
    #[error("ledger sequence gap: expected record {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },
    #[error("ledger moved: expected last sequence {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },
    #[error("timed out after {waited:?} waiting for the ledger append lock at {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },
    #[error("cannot append an empty batch")]
    EmptyBatch,
}

impl LedgerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Another writer appended between our read and our append.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

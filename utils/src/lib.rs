//! Shared infrastructure utilities for proofwork.
//!
//! Cross-cutting helpers that several crates need but that don't belong in the
//! domain-pure `proofwork-types` crate:
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + link, no-clobber create)

pub mod atomic_write;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, ParentDirSyncPolicy, PersistMode,
    atomic_write_new_with_options,
};

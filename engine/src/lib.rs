//! Proof service for proofwork.
//!
//! [`ProofService`] is the only writer of a proof's ledger. Each command
//! validates against freshly replayed state and appends only when every
//! check passes, so failed commands leave no trace on disk.

#![allow(clippy::missing_errors_doc)]

pub mod citations;
mod error;
mod service;

pub use error::{Result, ServiceError};
pub use service::{NodeDraft, ProofService, ReapOptions, ReapReport, content_hash};

// Re-exported so callers can drive the service without naming every crate.
pub use proofwork_config::Limits;
pub use proofwork_core::{
    Job, JobKind, JobResult, PriorityReason, State, StatusReport, TaintState,
};

#[cfg(test)]
mod tests;

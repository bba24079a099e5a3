//! Replay and read-side logic for proofwork.
//!
//! Everything here is a pure function of ledger records: [`State`] folds
//! them, and the job finder, stale-claim scan, taint and status summary read
//! the folded state. Nothing in this crate touches disk.

#![allow(clippy::missing_errors_doc)]

pub mod jobs;
pub mod reaper;
mod state;
pub mod status;
pub mod taint;

pub use jobs::{Job, JobKind, JobResult, PriorityReason, find_jobs, find_jobs_in};
pub use reaper::find_stale;
pub use state::{ChallengeMap, ReplayError, State};
pub use status::{EpistemicCounts, SeverityCounts, StatusReport, WorkflowCounts};
pub use taint::{TaintState, compute_taint, node_taint};

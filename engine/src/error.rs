use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use proofwork_config::ConfigError;
use proofwork_core::ReplayError;
use proofwork_ledger::LedgerError;
use proofwork_types::{
    ChallengeId, ChallengeStatus, EmptyStringError, EpistemicState, LemmaId, NodeId,
    WorkflowState,
};

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Everything a proof service command can fail with.
///
/// Input and precondition errors are raised before anything is appended.
/// Storage errors pass through unchanged.
#[derive(Debug, Error)]
pub enum ServiceError {
    // ── proof directory ──────────────────────────────────────
    #[error("no proof initialized in {}", dir.display())]
    NotInitialized { dir: PathBuf },
    #[error("a proof is already initialized in {}", dir.display())]
    AlreadyInitialized { dir: PathBuf },
    #[error("failed to prepare proof directory {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    // ── malformed input ──────────────────────────────────────
    #[error(transparent)]
    EmptyField(#[from] EmptyStringError),
    #[error("claim timeout must be positive, got {seconds}s")]
    InvalidTimeout { seconds: i64 },
    #[error("invalid {kind} name {name:?}: must start with a letter and contain only letters, digits, '_' or '-'")]
    InvalidName { kind: &'static str, name: String },
    #[error("batch is empty")]
    EmptyBatch,
    #[error("node {0} appears more than once in the batch")]
    DuplicateInBatch(NodeId),

    // ── nodes ────────────────────────────────────────────────
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    #[error("node {0} already exists")]
    NodeExists(NodeId),
    #[error("cannot create node {id}: parent {parent} does not exist")]
    ParentNotFound { id: NodeId, parent: NodeId },
    #[error("cannot create node {id}: parent {parent} is {state}")]
    ParentClosed {
        id: NodeId,
        parent: NodeId,
        state: EpistemicState,
    },
    #[error("node {id} has depth {depth}, which exceeds max_depth {max}; add breadth instead")]
    DepthExceeded { id: NodeId, depth: usize, max: usize },
    #[error("node {parent} already has the maximum of {max} children")]
    TooManyChildren { parent: NodeId, max: usize },
    #[error("node {id} depends on unknown node {dependency}")]
    UnknownDependency { id: NodeId, dependency: NodeId },
    #[error("node {0} cannot depend on itself")]
    SelfDependency(NodeId),
    #[error("statement cites unknown {kind} {name:?}")]
    UnknownCitation { kind: &'static str, name: String },
    #[error("node {id} is {state}, not pending")]
    NotPending { id: NodeId, state: EpistemicState },
    #[error("node {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: NodeId,
        from: EpistemicState,
        to: EpistemicState,
    },

    // ── claims ───────────────────────────────────────────────
    #[error("node {id} is {state} and cannot be claimed")]
    NotAvailable { id: NodeId, state: WorkflowState },
    #[error("node {id} is already claimed by {owner} until {expires_at}")]
    AlreadyClaimed {
        id: NodeId,
        owner: String,
        expires_at: DateTime<Utc>,
    },
    #[error("node {0} is not claimed")]
    NotClaimed(NodeId),
    #[error("node {id} is claimed by {owner}")]
    ClaimedByOther { id: NodeId, owner: String },

    // ── acceptance gates ─────────────────────────────────────
    #[error("node {id} has blocking challenges: {}", join(challenges))]
    BlockingChallenges {
        id: NodeId,
        challenges: Vec<ChallengeId>,
    },
    #[error("node {id} is waiting on validation dependencies: {}", join(dependencies))]
    UnmetValidationDeps {
        id: NodeId,
        dependencies: Vec<NodeId>,
    },

    // ── challenges ───────────────────────────────────────────
    #[error("challenge {0} not found")]
    ChallengeNotFound(ChallengeId),
    #[error("challenge {id} is already {status}")]
    ChallengeClosed {
        id: ChallengeId,
        status: ChallengeStatus,
    },

    // ── side records ─────────────────────────────────────────
    #[error("definition {0:?} already exists")]
    DefinitionExists(String),
    #[error("external {0:?} already exists")]
    ExternalExists(String),
    #[error("lemmas can only be extracted from validated nodes; node {id} is {state}")]
    LemmaSourceNotValidated { id: NodeId, state: EpistemicState },
    #[error("lemma {existing} already records this statement from node {id}")]
    DuplicateLemma { id: NodeId, existing: LemmaId },

    // ── storage ──────────────────────────────────────────────
    #[error("gave up after {attempts} attempts; the ledger kept moving")]
    Contention { attempts: usize },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("ledger replay failed: {0}")]
    Replay(#[from] ReplayError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

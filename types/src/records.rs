//! Side records: lemmas, definitions, external references, pending definitions.
//!
//! None of these take part in the node lifecycle; definitions and externals
//! are only consulted when a new node's statement cites them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LemmaId, NodeId, PendingDefId};

/// Immutable record extracted from a validated node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lemma {
    pub id: LemmaId,
    pub statement: String,
    pub source_node: NodeId,
    /// Hex-encoded SHA-256 over the statement and proof text.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub proof: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    pub content: String,
    pub added_by: String,
    pub created_at: DateTime<Utc>,
}

/// Reference to a theorem established outside this proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct External {
    pub name: String,
    pub source: String,
    pub statement: String,
    pub added_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingDefStatus {
    #[default]
    Pending,
    Resolved,
}

/// A term a prover needs defined before a node can be finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDef {
    pub id: PendingDefId,
    pub term: String,
    pub node_id: NodeId,
    pub requested_by: String,
    pub status: PendingDefStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PendingDef {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == PendingDefStatus::Pending
    }
}

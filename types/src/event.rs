//! Ledger event schema.
//!
//! Every durable mutation is one [`Event`]. On disk each event is wrapped in
//! a [`LedgerRecord`] that carries the sequence number and append time:
//!
//! ```json
//! {"seq":3,"timestamp":"2026-01-01T00:00:00Z","type":"node_claimed","node_id":"1",...}
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChallengeId, ChallengeTarget, LemmaId, NodeId, NodeSpec, PendingDefId, Severity};

/// Why a batch of claims was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    /// The owner let go voluntarily.
    Released,
    /// Expired claims materialized by a reap.
    Reaped,
    /// Forced release of live claims by an operator reap.
    Forced,
}

impl fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Released => "released",
            Self::Reaped => "reaped",
            Self::Forced => "forced",
        })
    }
}

/// Epistemic outcome of an acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Validated,
    Admitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ProofInitialized {
        conjecture: String,
        author: String,
    },
    NodeCreated {
        node: NodeSpec,
        #[serde(default)]
        author: Option<String>,
    },
    NodeClaimed {
        node_id: NodeId,
        owner: String,
        expires_at: DateTime<Utc>,
        /// Holder of an expired claim this one replaced.
        #[serde(default)]
        previous_owner: Option<String>,
    },
    NodeClaimRefreshed {
        node_id: NodeId,
        owner: String,
        expires_at: DateTime<Utc>,
    },
    NodesReleased {
        node_ids: Vec<NodeId>,
        reason: ReleaseReason,
    },
    ChallengeRaised {
        challenge_id: ChallengeId,
        node_id: NodeId,
        target: ChallengeTarget,
        severity: Severity,
        reason: String,
        raised_by: String,
    },
    ChallengeResolved {
        challenge_id: ChallengeId,
        resolution: String,
        resolved_by: String,
    },
    ChallengeWithdrawn {
        challenge_id: ChallengeId,
        withdrawn_by: String,
    },
    NodeAccepted {
        node_id: NodeId,
        verdict: Verdict,
        #[serde(default)]
        note: Option<String>,
        #[serde(default)]
        agent: Option<String>,
    },
    NodeRefuted {
        node_id: NodeId,
        reason: String,
        #[serde(default)]
        agent: Option<String>,
    },
    NodeArchived {
        node_id: NodeId,
        reason: String,
        #[serde(default)]
        agent: Option<String>,
    },
    LemmaExtracted {
        lemma_id: LemmaId,
        node_id: NodeId,
        statement: String,
        content_hash: String,
        #[serde(default)]
        proof: Option<String>,
    },
    DefinitionAdded {
        name: String,
        content: String,
        added_by: String,
    },
    DefinitionRequested {
        pending_id: PendingDefId,
        term: String,
        node_id: NodeId,
        requested_by: String,
    },
    ExternalAdded {
        name: String,
        source: String,
        statement: String,
        added_by: String,
    },
}

impl Event {
    /// Every tag a record's `type` field may carry.
    pub const TYPE_TAGS: &'static [&'static str] = &[
        "proof_initialized",
        "node_created",
        "node_claimed",
        "node_claim_refreshed",
        "nodes_released",
        "challenge_raised",
        "challenge_resolved",
        "challenge_withdrawn",
        "node_accepted",
        "node_refuted",
        "node_archived",
        "lemma_extracted",
        "definition_added",
        "definition_requested",
        "external_added",
    ];

    #[must_use]
    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::ProofInitialized { .. } => "proof_initialized",
            Self::NodeCreated { .. } => "node_created",
            Self::NodeClaimed { .. } => "node_claimed",
            Self::NodeClaimRefreshed { .. } => "node_claim_refreshed",
            Self::NodesReleased { .. } => "nodes_released",
            Self::ChallengeRaised { .. } => "challenge_raised",
            Self::ChallengeResolved { .. } => "challenge_resolved",
            Self::ChallengeWithdrawn { .. } => "challenge_withdrawn",
            Self::NodeAccepted { .. } => "node_accepted",
            Self::NodeRefuted { .. } => "node_refuted",
            Self::NodeArchived { .. } => "node_archived",
            Self::LemmaExtracted { .. } => "lemma_extracted",
            Self::DefinitionAdded { .. } => "definition_added",
            Self::DefinitionRequested { .. } => "definition_requested",
            Self::ExternalAdded { .. } => "external_added",
        }
    }

    #[must_use]
    pub fn is_known_tag(tag: &str) -> bool {
        Self::TYPE_TAGS.contains(&tag)
    }
}

/// One durable ledger entry: an event plus its position and append time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

//! Proof tree nodes and their two orthogonal state axes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{NodeId, ParseEnumError};

// ── Node type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Claim,
    LocalAssume,
    LocalDischarge,
    Case,
    Qed,
}

impl NodeType {
    pub const ALL: &'static [&'static str] =
        &["claim", "local_assume", "local_discharge", "case", "qed"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::LocalAssume => "local_assume",
            Self::LocalDischarge => "local_discharge",
            Self::Case => "case",
            Self::Qed => "qed",
        }
    }
}

impl FromStr for NodeType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "claim" => Ok(Self::Claim),
            "local_assume" => Ok(Self::LocalAssume),
            "local_discharge" => Ok(Self::LocalDischarge),
            "case" => Ok(Self::Case),
            "qed" => Ok(Self::Qed),
            other => Err(ParseEnumError::new("node type", other, Self::ALL)),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Inference ────────────────────────────────────────────────

/// Justification a prover gives for a node's statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inference {
    ModusPonens,
    ModusTollens,
    UniversalInstantiation,
    UniversalGeneralization,
    ExistentialInstantiation,
    ExistentialGeneralization,
    ByDefinition,
    Assumption,
    LocalAssume,
    LocalDischarge,
    Contradiction,
    CaseSplit,
    Qed,
}

impl Inference {
    pub const ALL: &'static [&'static str] = &[
        "modus_ponens",
        "modus_tollens",
        "universal_instantiation",
        "universal_generalization",
        "existential_instantiation",
        "existential_generalization",
        "by_definition",
        "assumption",
        "local_assume",
        "local_discharge",
        "contradiction",
        "case_split",
        "qed",
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ModusPonens => "modus_ponens",
            Self::ModusTollens => "modus_tollens",
            Self::UniversalInstantiation => "universal_instantiation",
            Self::UniversalGeneralization => "universal_generalization",
            Self::ExistentialInstantiation => "existential_instantiation",
            Self::ExistentialGeneralization => "existential_generalization",
            Self::ByDefinition => "by_definition",
            Self::Assumption => "assumption",
            Self::LocalAssume => "local_assume",
            Self::LocalDischarge => "local_discharge",
            Self::Contradiction => "contradiction",
            Self::CaseSplit => "case_split",
            Self::Qed => "qed",
        }
    }
}

impl FromStr for Inference {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "modus_ponens" => Ok(Self::ModusPonens),
            "modus_tollens" => Ok(Self::ModusTollens),
            "universal_instantiation" => Ok(Self::UniversalInstantiation),
            "universal_generalization" => Ok(Self::UniversalGeneralization),
            "existential_instantiation" => Ok(Self::ExistentialInstantiation),
            "existential_generalization" => Ok(Self::ExistentialGeneralization),
            "by_definition" => Ok(Self::ByDefinition),
            "assumption" => Ok(Self::Assumption),
            "local_assume" => Ok(Self::LocalAssume),
            "local_discharge" => Ok(Self::LocalDischarge),
            "contradiction" => Ok(Self::Contradiction),
            "case_split" => Ok(Self::CaseSplit),
            "qed" => Ok(Self::Qed),
            other => Err(ParseEnumError::new("inference", other, Self::ALL)),
        }
    }
}

impl fmt::Display for Inference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Epistemic state ──────────────────────────────────────────

/// Correctness axis: `pending → {validated, admitted, refuted} → archived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpistemicState {
    #[default]
    Pending,
    Validated,
    Admitted,
    Refuted,
    Archived,
}

impl EpistemicState {
    pub const ALL: &'static [&'static str] =
        &["pending", "validated", "admitted", "refuted", "archived"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Admitted => "admitted",
            Self::Refuted => "refuted",
            Self::Archived => "archived",
        }
    }

    /// No further epistemic transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Refuted | Self::Archived)
    }

    /// Counts toward proof progress. Refuted nodes do not.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Validated | Self::Admitted)
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Validated | Self::Admitted | Self::Refuted | Self::Archived
            ) | (Self::Validated | Self::Admitted, Self::Archived)
        )
    }
}

impl FromStr for EpistemicState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "validated" => Ok(Self::Validated),
            "admitted" => Ok(Self::Admitted),
            "refuted" => Ok(Self::Refuted),
            "archived" => Ok(Self::Archived),
            other => Err(ParseEnumError::new("epistemic state", other, Self::ALL)),
        }
    }
}

impl fmt::Display for EpistemicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Workflow state ───────────────────────────────────────────

/// Availability axis, orthogonal to [`EpistemicState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Available,
    Claimed,
    Blocked,
}

impl WorkflowState {
    pub const ALL: &'static [&'static str] = &["available", "claimed", "blocked"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Claimed => "claimed",
            Self::Blocked => "blocked",
        }
    }
}

impl FromStr for WorkflowState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "available" => Ok(Self::Available),
            "claimed" => Ok(Self::Claimed),
            "blocked" => Ok(Self::Blocked),
            other => Err(ParseEnumError::new("workflow state", other, Self::ALL)),
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Node ─────────────────────────────────────────────────────

/// Fields supplied when a node is created; the immutable part of a [`Node`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub node_type: NodeType,
    pub statement: String,
    pub inference: Inference,
    /// Informational citations.
    #[serde(default)]
    pub dependencies: Vec<NodeId>,
    /// Nodes that must be validated or admitted before this one can be.
    #[serde(default)]
    pub validation_deps: Vec<NodeId>,
}

/// The claim (lock) projection of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimInfo {
    pub owner: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub statement: String,
    pub inference: Inference,
    pub epistemic_state: EpistemicState,
    pub workflow_state: WorkflowState,
    pub claim: Option<ClaimInfo>,
    pub dependencies: Vec<NodeId>,
    pub validation_deps: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    /// Verifier note recorded with acceptance, refutation reason, or archive reason.
    pub verdict_note: Option<String>,
}

impl Node {
    #[must_use]
    pub fn from_spec(spec: NodeSpec, created_at: DateTime<Utc>, created_by: Option<String>) -> Self {
        Self {
            id: spec.id,
            node_type: spec.node_type,
            statement: spec.statement,
            inference: spec.inference,
            epistemic_state: EpistemicState::Pending,
            workflow_state: WorkflowState::Available,
            claim: None,
            dependencies: spec.dependencies,
            validation_deps: spec.validation_deps,
            created_at,
            created_by,
            verdict_note: None,
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.id.depth()
    }

    #[must_use]
    pub fn claimed_by(&self) -> Option<&str> {
        self.claim.as_ref().map(|c| c.owner.as_str())
    }

    #[must_use]
    pub fn claim_expires_at(&self) -> Option<DateTime<Utc>> {
        self.claim.as_ref().map(|c| c.expires_at)
    }

    /// Claimed with an expiry still in the future at `now`.
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.workflow_state == WorkflowState::Claimed
            && self.claim.as_ref().is_some_and(|c| c.expires_at > now)
    }

    /// Claimed with an expiry strictly before `now`.
    ///
    /// Staleness is computed here on demand; the persisted workflow state
    /// stays `claimed` until a release event lands.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.workflow_state == WorkflowState::Claimed
            && self.claim.as_ref().is_none_or(|c| c.expires_at < now)
    }
}

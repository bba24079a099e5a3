//! Verifier challenges against nodes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ChallengeId, NodeId, ParseEnumError};

/// Which aspect of a node a challenge objects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeTarget {
    Statement,
    Inference,
    Context,
    Dependencies,
    Scope,
    Gap,
    TypeError,
    Domain,
    Completeness,
}

impl ChallengeTarget {
    pub const ALL: &'static [&'static str] = &[
        "statement",
        "inference",
        "context",
        "dependencies",
        "scope",
        "gap",
        "type_error",
        "domain",
        "completeness",
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Statement => "statement",
            Self::Inference => "inference",
            Self::Context => "context",
            Self::Dependencies => "dependencies",
            Self::Scope => "scope",
            Self::Gap => "gap",
            Self::TypeError => "type_error",
            Self::Domain => "domain",
            Self::Completeness => "completeness",
        }
    }
}

impl FromStr for ChallengeTarget {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "statement" => Ok(Self::Statement),
            "inference" => Ok(Self::Inference),
            "context" => Ok(Self::Context),
            "dependencies" => Ok(Self::Dependencies),
            "scope" => Ok(Self::Scope),
            "gap" => Ok(Self::Gap),
            "type_error" => Ok(Self::TypeError),
            "domain" => Ok(Self::Domain),
            "completeness" => Ok(Self::Completeness),
            other => Err(ParseEnumError::new("challenge target", other, Self::ALL)),
        }
    }
}

impl fmt::Display for ChallengeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed at creation. `critical` and `major` block acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Note,
}

impl Severity {
    pub const ALL: &'static [&'static str] = &["critical", "major", "minor", "note"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Note => "note",
        }
    }

    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Critical | Self::Major)
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "critical" => Ok(Self::Critical),
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "note" => Ok(Self::Note),
            other => Err(ParseEnumError::new("severity", other, Self::ALL)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    #[default]
    Open,
    Resolved,
    Withdrawn,
}

impl ChallengeStatus {
    pub const ALL: &'static [&'static str] = &["open", "resolved", "withdrawn"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
            Self::Withdrawn => "withdrawn",
        }
    }
}

impl FromStr for ChallengeStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "open" => Ok(Self::Open),
            "resolved" => Ok(Self::Resolved),
            "withdrawn" => Ok(Self::Withdrawn),
            other => Err(ParseEnumError::new("challenge status", other, Self::ALL)),
        }
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("challenge {id} is {from}; cannot move to {to}")]
pub struct ChallengeTransitionError {
    pub id: ChallengeId,
    pub from: ChallengeStatus,
    pub to: ChallengeStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub node_id: NodeId,
    pub target: ChallengeTarget,
    pub reason: String,
    severity: Severity,
    pub status: ChallengeStatus,
    pub raised_by: String,
    pub created_at: DateTime<Utc>,
    pub resolution: Option<String>,
    pub closed_by: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Challenge {
    #[must_use]
    pub fn open(
        id: ChallengeId,
        node_id: NodeId,
        target: ChallengeTarget,
        severity: Severity,
        reason: String,
        raised_by: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            node_id,
            target,
            reason,
            severity,
            status: ChallengeStatus::Open,
            raised_by,
            created_at,
            resolution: None,
            closed_by: None,
            closed_at: None,
        }
    }

    /// Severity has no setter: it is fixed when the challenge is raised.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == ChallengeStatus::Open
    }

    /// Open and `critical`/`major`.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.is_open() && self.severity.is_blocking()
    }

    pub fn resolve(
        &mut self,
        resolution: String,
        by: String,
        at: DateTime<Utc>,
    ) -> Result<(), ChallengeTransitionError> {
        self.close(ChallengeStatus::Resolved, by, at)?;
        self.resolution = Some(resolution);
        Ok(())
    }

    pub fn withdraw(&mut self, by: String, at: DateTime<Utc>) -> Result<(), ChallengeTransitionError> {
        self.close(ChallengeStatus::Withdrawn, by, at)
    }

    fn close(
        &mut self,
        to: ChallengeStatus,
        by: String,
        at: DateTime<Utc>,
    ) -> Result<(), ChallengeTransitionError> {
        if self.status != ChallengeStatus::Open {
            return Err(ChallengeTransitionError {
                id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.closed_by = Some(by);
        self.closed_at = Some(at);
        Ok(())
    }
}

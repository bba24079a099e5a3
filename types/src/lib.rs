//! Core domain types for proofwork.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies:
//! node addresses, the node/challenge/lemma records that replay materializes, and the
//! ledger event schema. Everything here can be used from any layer of the workspace.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod challenge;
mod event;
mod ids;
mod node;
mod node_id;
mod records;

pub use challenge::{
    Challenge, ChallengeStatus, ChallengeTarget, ChallengeTransitionError, Severity,
};
pub use event::{Event, LedgerRecord, ReleaseReason, Verdict};
pub use ids::{ChallengeId, LemmaId, PendingDefId};
pub use node::{
    ClaimInfo, EpistemicState, Inference, Node, NodeSpec, NodeType, WorkflowState,
};
pub use node_id::{NodeId, NodeIdError};
pub use records::{Definition, External, Lemma, PendingDef, PendingDefStatus};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// NonEmpty String Types
// ============================================================================

/// A string guaranteed to be non-empty (after trimming).
///
/// Used for every required free-text field a command accepts: owners,
/// statements, challenge reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} must not be empty or whitespace")]
pub struct EmptyStringError {
    pub field: &'static str,
}

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        Self::for_field("value", value)
    }

    /// Like [`NonEmptyString::new`], naming the offending field in the error.
    pub fn for_field(
        field: &'static str,
        value: impl Into<String>,
    ) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyStringError { field })
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::ops::Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for NonEmptyString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Enum parsing
// ============================================================================

/// A string did not name any variant of a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} {value:?}; expected one of: {}", .accepted.join(", "))]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub accepted: &'static [&'static str],
}

impl ParseEnumError {
    #[must_use]
    pub fn new(kind: &'static str, value: &str, accepted: &'static [&'static str]) -> Self {
        Self {
            kind,
            value: value.to_owned(),
            accepted,
        }
    }
}

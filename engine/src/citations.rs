//! Citation tokens in node statements.
//!
//! A statement may cite a definition as `def:NAME` or an external reference
//! as `ext:NAME`, where `NAME` starts with a letter and continues with
//! letters, digits, `_` or `-`. Every cited name must already be known when
//! the node is created.

use std::sync::LazyLock;

use regex::Regex;

use proofwork_core::State;

use crate::error::{Result, ServiceError};

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(def|ext):([A-Za-z][A-Za-z0-9_-]*)").expect("valid citation regex")
});

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("valid citation name regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationKind {
    Definition,
    External,
}

impl CitationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::External => "external",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub kind: CitationKind,
    pub name: String,
}

/// Citations in `statement`, first occurrence order, without repeats.
#[must_use]
pub fn extract(statement: &str) -> Vec<Citation> {
    let mut found: Vec<Citation> = Vec::new();
    for caps in CITATION.captures_iter(statement) {
        let kind = if &caps[1] == "def" {
            CitationKind::Definition
        } else {
            CitationKind::External
        };
        let citation = Citation {
            kind,
            name: caps[2].to_owned(),
        };
        if !found.contains(&citation) {
            found.push(citation);
        }
    }
    found
}

#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    NAME.is_match(name)
}

pub(crate) fn validate_name(kind: CitationKind, name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(ServiceError::InvalidName {
            kind: kind.as_str(),
            name: name.to_owned(),
        })
    }
}

/// Fail on the first citation `state` cannot resolve.
pub(crate) fn check_resolved(statement: &str, state: &State) -> Result<()> {
    for citation in extract(statement) {
        let known = match citation.kind {
            CitationKind::Definition => state.get_definition(&citation.name).is_some(),
            CitationKind::External => state.get_external(&citation.name).is_some(),
        };
        if !known {
            return Err(ServiceError::UnknownCitation {
                kind: citation.kind.as_str(),
                name: citation.name,
            });
        }
    }
    Ok(())
}

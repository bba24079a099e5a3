//! Proof directory metadata.
//!
//! Each proof directory carries a small `meta.toml` next to its `ledger/`:
//!
//! ```toml
//! [proof]
//! conjecture = "For all n, n + 0 = n"
//! author = "prover-1"
//! created_at = "2026-01-01T00:00:00Z"
//!
//! [limits]
//! max_depth = 20
//! max_children = 10
//! warn_depth = 3
//! claim_timeout_secs = 3600
//! ```
//!
//! The file is written once when a proof is initialised and is read-only
//! input afterwards. Every `[limits]` field is optional.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use proofwork_utils::{AtomicWriteOptions, atomic_write_new_with_options};

pub const META_FILE: &str = "meta.toml";

pub const DEFAULT_MAX_DEPTH: usize = 20;
pub const DEFAULT_MAX_CHILDREN: usize = 10;
pub const DEFAULT_WARN_DEPTH: usize = 3;
pub const DEFAULT_CLAIM_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize proof metadata: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("proof metadata already exists at {}", path.display())]
    AlreadyExists { path: PathBuf },
    #[error("invalid limit {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Write { path, .. }
            | ConfigError::AlreadyExists { path } => Some(path),
            ConfigError::Serialize(_) | ConfigError::Invalid { .. } => None,
        }
    }
}

/// `[proof]` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofHeader {
    pub conjecture: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// `[limits]` as written on disk; absent fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_children: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<ProofHeader>,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Resolved, validated limits the proof service enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_depth: usize,
    pub max_children: usize,
    /// Creating a node deeper than this logs a warning and shows up in status.
    pub warn_depth: usize,
    pub claim_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_children: DEFAULT_MAX_CHILDREN,
            warn_depth: DEFAULT_WARN_DEPTH,
            claim_timeout: Duration::from_secs(DEFAULT_CLAIM_TIMEOUT_SECS),
        }
    }
}

impl Limits {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_depth",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.max_children == 0 {
            return Err(ConfigError::Invalid {
                field: "max_children",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.warn_depth > self.max_depth {
            return Err(ConfigError::Invalid {
                field: "warn_depth",
                reason: format!(
                    "{} exceeds max_depth {}",
                    self.warn_depth, self.max_depth
                ),
            });
        }
        if self.claim_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "claim_timeout_secs",
                reason: "must be positive".to_owned(),
            });
        }
        Ok(self)
    }
}

impl From<Limits> for LimitsConfig {
    fn from(limits: Limits) -> Self {
        Self {
            max_depth: Some(limits.max_depth),
            max_children: Some(limits.max_children),
            warn_depth: Some(limits.warn_depth),
            claim_timeout_secs: Some(limits.claim_timeout.as_secs()),
        }
    }
}

impl ProofMeta {
    #[must_use]
    pub fn new(header: ProofHeader, limits: Limits) -> Self {
        Self {
            proof: Some(header),
            limits: limits.into(),
        }
    }

    #[must_use]
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(META_FILE)
    }

    /// Load `meta.toml` from a proof directory. A missing file is `Ok(None)`.
    pub fn load(dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = Self::path_in(dir);
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read proof metadata at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match toml::from_str(&content) {
            Ok(meta) => Ok(Some(meta)),
            Err(err) => {
                tracing::warn!("Failed to parse proof metadata at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    /// Write `meta.toml`, refusing to replace an existing one.
    pub fn save_new(&self, dir: &Path) -> Result<PathBuf, ConfigError> {
        let path = Self::path_in(dir);
        let body = toml::to_string(self)?;
        match atomic_write_new_with_options(&path, body.as_bytes(), AtomicWriteOptions::durable())
        {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Wrote proof metadata");
                Ok(path)
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(ConfigError::AlreadyExists { path })
            }
            Err(err) => Err(ConfigError::Write { path, source: err }),
        }
    }

    /// Resolve `[limits]` against defaults and validate the result.
    pub fn limits(&self) -> Result<Limits, ConfigError> {
        let defaults = Limits::default();
        Limits {
            max_depth: self.limits.max_depth.unwrap_or(defaults.max_depth),
            max_children: self.limits.max_children.unwrap_or(defaults.max_children),
            warn_depth: self.limits.warn_depth.unwrap_or(defaults.warn_depth),
            claim_timeout: self
                .limits
                .claim_timeout_secs
                .map_or(defaults.claim_timeout, Duration::from_secs),
        }
        .validate()
    }
}

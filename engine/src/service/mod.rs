//! The proof service.
//!
//! Every command follows the same shape: bring the cached [`State`] up to
//! the ledger tail, validate against it, then compare-and-append the
//! resulting events with [`Ledger::append_after`]. If another writer got in
//! between, the command starts over on fresher state, so a process that
//! loses a race sees the ordinary precondition error (for example
//! [`ServiceError::AlreadyClaimed`]) rather than a partial write.
//!
//! Commands are spread over the submodules by concern; this module owns
//! construction, state loading and the commit loop.

mod challenges;
mod claims;
mod nodes;
mod reap;
mod records;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use proofwork_config::{ConfigError, Limits, ProofHeader, ProofMeta};
use proofwork_core::{JobResult, State, StatusReport, TaintState, compute_taint, find_jobs_in};
use proofwork_ledger::{Ledger, LedgerError};
use proofwork_types::{Event, Inference, Node, NodeId, NodeSpec, NodeType, NonEmptyString};

use crate::error::{Result, ServiceError};

pub use nodes::NodeDraft;
pub use reap::{ReapOptions, ReapReport};
pub use records::content_hash;

/// Attempts a command makes before giving up on a moving ledger tail.
const MAX_ATTEMPTS: usize = 8;

#[derive(Debug)]
pub struct ProofService {
    dir: PathBuf,
    ledger: Ledger,
    limits: Limits,
    cache: Mutex<State>,
}

impl ProofService {
    /// Open the proof in `dir`. The directory need not be initialized yet;
    /// commands other than [`ProofService::init`] fail until it is.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let limits = match ProofMeta::load(&dir)? {
            Some(meta) => meta.limits()?,
            None => Limits::default(),
        };
        Ok(Self::with_limits(dir, limits))
    }

    fn with_limits(dir: PathBuf, limits: Limits) -> Self {
        Self {
            ledger: Ledger::new(&dir),
            dir,
            limits,
            cache: Mutex::new(State::default()),
        }
    }

    /// Start a new proof of `conjecture` in `dir`.
    ///
    /// Writes `meta.toml` first; its exclusive creation is what makes a
    /// second init fail. Then appends `ProofInitialized` plus the root node
    /// `1` (whose statement is the conjecture) as one batch. If the ledger
    /// cannot be written, `meta.toml` is removed again.
    pub fn init(
        dir: impl Into<PathBuf>,
        conjecture: &str,
        author: &str,
        limits: Limits,
    ) -> Result<Self> {
        let dir = dir.into();
        let conjecture = NonEmptyString::for_field("conjecture", conjecture)?;
        let author = NonEmptyString::for_field("author", author)?;
        let limits = limits.validate()?;

        fs::create_dir_all(&dir).map_err(|source| ServiceError::Io {
            path: dir.clone(),
            source,
        })?;

        let events = vec![
            Event::ProofInitialized {
                conjecture: conjecture.to_string(),
                author: author.to_string(),
            },
            Event::NodeCreated {
                node: NodeSpec {
                    id: NodeId::root(),
                    node_type: NodeType::Claim,
                    statement: conjecture.to_string(),
                    inference: Inference::Assumption,
                    dependencies: Vec::new(),
                    validation_deps: Vec::new(),
                },
                author: Some(author.to_string()),
            },
        ];

        let header = ProofHeader {
            conjecture: conjecture.into_inner(),
            author: author.into_inner(),
            created_at: Utc::now(),
        };
        let meta_path = match ProofMeta::new(header, limits).save_new(&dir) {
            Ok(path) => path,
            Err(ConfigError::AlreadyExists { .. }) => {
                return Err(ServiceError::AlreadyInitialized { dir });
            }
            Err(err) => return Err(err.into()),
        };

        let service = Self::with_limits(dir, limits);
        if let Err(err) = service.append_genesis(events) {
            if let Err(remove_err) = fs::remove_file(&meta_path) {
                tracing::warn!(
                    path = %meta_path.display(),
                    error = %remove_err,
                    "Failed to remove meta.toml after aborted init"
                );
            }
            return Err(err);
        }

        tracing::info!(dir = %service.dir.display(), "Initialized proof");
        Ok(service)
    }

    fn append_genesis(&self, events: Vec<Event>) -> Result<()> {
        self.ledger.create()?;
        match self.ledger.append_after(0, events) {
            Ok(_) => Ok(()),
            Err(LedgerError::Conflict { .. }) => Err(ServiceError::AlreadyInitialized {
                dir: self.dir.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    #[must_use]
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Current state, replaying whatever the ledger gained since last time.
    pub fn load_state(&self) -> Result<State> {
        let state = self.refresh()?;
        if !state.is_initialized() {
            return Err(ServiceError::NotInitialized {
                dir: self.dir.clone(),
            });
        }
        Ok(state)
    }

    /// Drop the cached state and replay the whole ledger.
    pub fn reload(&self) -> Result<State> {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = State::default();
        self.load_state()
    }

    fn refresh(&self) -> Result<State> {
        let mut cached = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let fresh = self.ledger.read_since(cached.last_seq())?;
        if !fresh.is_empty() {
            // Fold into a copy so a bad record cannot leave the cache half-applied.
            let mut next = cached.clone();
            next.apply_all(&fresh)?;
            tracing::debug!(
                from = cached.last_seq(),
                to = next.last_seq(),
                "Replayed new ledger records"
            );
            *cached = next;
        }
        Ok(cached.clone())
    }

    /// Validate-then-append loop shared by every mutating command.
    ///
    /// `plan` sees fresh state and the command's notion of "now" and returns
    /// the events to append plus the command's result. An empty event list
    /// commits nothing.
    fn commit<T>(
        &self,
        command: &'static str,
        mut plan: impl FnMut(&State, DateTime<Utc>) -> Result<(Vec<Event>, T)>,
    ) -> Result<T> {
        for attempt in 1..=MAX_ATTEMPTS {
            let state = self.load_state()?;
            let (events, value) = plan(&state, Utc::now())?;
            if events.is_empty() {
                return Ok(value);
            }
            match self.ledger.append_after(state.last_seq(), events) {
                Ok(seq) => {
                    tracing::info!(command, seq, "Committed");
                    return Ok(value);
                }
                Err(LedgerError::Conflict { expected, actual }) => {
                    tracing::debug!(command, attempt, expected, actual, "Ledger moved; revalidating");
                }
                Err(err) => return Err(err.into()),
            }
        }
        tracing::warn!(command, attempts = MAX_ATTEMPTS, "Giving up on contended ledger");
        Err(ServiceError::Contention {
            attempts: MAX_ATTEMPTS,
        })
    }

    // ── Queries ──────────────────────────────────────────────

    pub fn status(&self) -> Result<StatusReport> {
        let state = self.load_state()?;
        Ok(StatusReport::summarize(
            &state,
            Utc::now(),
            self.limits.warn_depth,
        ))
    }

    pub fn find_jobs(&self) -> Result<JobResult> {
        Ok(find_jobs_in(&self.load_state()?))
    }

    pub fn taint(&self) -> Result<BTreeMap<NodeId, TaintState>> {
        Ok(compute_taint(&self.load_state()?))
    }

    pub fn get_node(&self, id: &NodeId) -> Result<Node> {
        let state = self.load_state()?;
        node(&state, id).cloned()
    }
}

pub(crate) fn node<'s>(state: &'s State, id: &NodeId) -> Result<&'s Node> {
    state
        .get_node(id)
        .ok_or_else(|| ServiceError::NodeNotFound(id.clone()))
}

/// Reject when `agent` is given and someone else holds a live claim on `node`.
pub(crate) fn check_not_held_by_other(
    node: &Node,
    agent: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    if let Some(agent) = agent
        && node.is_locked(now)
        && let Some(owner) = node.claimed_by()
        && owner != agent
    {
        return Err(ServiceError::ClaimedByOther {
            id: node.id.clone(),
            owner: owner.to_owned(),
        });
    }
    Ok(())
}

pub(crate) fn non_empty(field: &'static str, value: &str) -> Result<String> {
    Ok(NonEmptyString::for_field(field, value)?.into_inner())
}

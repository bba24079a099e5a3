//! Reaping: making expired claims durable as `available`.

use serde::Serialize;

use proofwork_core::find_stale;
use proofwork_types::{Event, NodeId, ReleaseReason};

use super::ProofService;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapOptions {
    /// Report what would be released; append nothing.
    pub dry_run: bool,
    /// Release every claimed node, expired or not.
    pub all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    pub node_ids: Vec<NodeId>,
    pub reason: ReleaseReason,
    pub dry_run: bool,
}

impl ReapReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }
}

impl ProofService {
    /// Release stale claims (or all claims with `all`) in a single
    /// `NodesReleased` event. Nothing is appended when nothing matches or
    /// when `dry_run` is set.
    pub fn reap(&self, options: ReapOptions) -> Result<ReapReport> {
        let reason = if options.all {
            ReleaseReason::Forced
        } else {
            ReleaseReason::Reaped
        };

        if options.dry_run {
            let state = self.load_state()?;
            let node_ids = find_stale(&state, chrono::Utc::now(), options.all);
            tracing::debug!(count = node_ids.len(), "Dry-run reap");
            return Ok(ReapReport {
                node_ids,
                reason,
                dry_run: true,
            });
        }

        let node_ids = self.commit("reap", |state, now| {
            let node_ids = find_stale(state, now, options.all);
            let events = if node_ids.is_empty() {
                Vec::new()
            } else {
                vec![Event::NodesReleased {
                    node_ids: node_ids.clone(),
                    reason,
                }]
            };
            Ok((events, node_ids))
        })?;

        if !node_ids.is_empty() {
            tracing::info!(count = node_ids.len(), ?reason, "Reaped claims");
        }
        Ok(ReapReport {
            node_ids,
            reason,
            dry_run: false,
        })
    }
}

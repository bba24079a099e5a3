//! Stale-claim scan.
//!
//! Expiry is only ever computed here, at query time. Turning the result into
//! durable `available` state is the proof service's job.

use chrono::{DateTime, Utc};

use proofwork_types::{NodeId, WorkflowState};

use crate::state::State;

/// Claimed nodes whose expiry is strictly before `now`, or every claimed
/// node when `all` is set. Returned in id order.
#[must_use]
pub fn find_stale(state: &State, now: DateTime<Utc>, all: bool) -> Vec<NodeId> {
    state
        .all_nodes()
        .filter(|node| {
            if all {
                node.workflow_state == WorkflowState::Claimed
            } else {
                node.is_stale(now)
            }
        })
        .map(|node| node.id.clone())
        .collect()
}

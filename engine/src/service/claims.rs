//! Claims: advisory, time-bounded locks on nodes.

use chrono::{DateTime, TimeDelta, Utc};

use proofwork_types::{
    ClaimInfo, EpistemicState, Event, NodeId, ReleaseReason, WorkflowState,
};

use super::{ProofService, node, non_empty};
use crate::error::{Result, ServiceError};

impl ProofService {
    /// Claim timeout from `meta.toml`, or the default.
    #[must_use]
    pub fn default_claim_timeout(&self) -> TimeDelta {
        TimeDelta::from_std(self.limits.claim_timeout).unwrap_or(TimeDelta::MAX)
    }

    /// Take the claim on an available pending node.
    ///
    /// A claim whose expiry has passed but which has not been reaped yet can
    /// be taken over; the event records who held it.
    pub fn claim_node(&self, id: &NodeId, owner: &str, timeout: TimeDelta) -> Result<ClaimInfo> {
        let owner = non_empty("owner", owner)?;
        check_timeout(timeout)?;

        self.commit("claim", |state, now| {
            let node = node(state, id)?;
            if node.epistemic_state != EpistemicState::Pending {
                return Err(ServiceError::NotPending {
                    id: id.clone(),
                    state: node.epistemic_state,
                });
            }

            let previous_owner = match node.workflow_state {
                WorkflowState::Available => None,
                WorkflowState::Blocked => {
                    return Err(ServiceError::NotAvailable {
                        id: id.clone(),
                        state: WorkflowState::Blocked,
                    });
                }
                WorkflowState::Claimed => {
                    if let Some(claim) = node.claim.as_ref().filter(|_| node.is_locked(now)) {
                        return Err(ServiceError::AlreadyClaimed {
                            id: id.clone(),
                            owner: claim.owner.clone(),
                            expires_at: claim.expires_at,
                        });
                    }
                    let previous = node.claimed_by().map(str::to_owned);
                    tracing::info!(node = %id, previous = ?previous, owner = %owner, "Taking over expired claim");
                    previous
                }
            };

            let expires_at = expiry(now, timeout)?;
            Ok((
                vec![Event::NodeClaimed {
                    node_id: id.clone(),
                    owner: owner.clone(),
                    expires_at,
                    previous_owner,
                }],
                ClaimInfo {
                    owner: owner.clone(),
                    expires_at,
                },
            ))
        })
    }

    /// Extend a claim `owner` already holds, without a release in between.
    pub fn refresh_claim(&self, id: &NodeId, owner: &str, timeout: TimeDelta) -> Result<ClaimInfo> {
        let owner = non_empty("owner", owner)?;
        check_timeout(timeout)?;

        self.commit("refresh_claim", |state, now| {
            let node = node(state, id)?;
            let holder = held_claim(node.workflow_state, node.claimed_by(), id)?;
            if holder != owner {
                return Err(ServiceError::ClaimedByOther {
                    id: id.clone(),
                    owner: holder.to_owned(),
                });
            }

            let expires_at = expiry(now, timeout)?;
            Ok((
                vec![Event::NodeClaimRefreshed {
                    node_id: id.clone(),
                    owner: owner.clone(),
                    expires_at,
                }],
                ClaimInfo {
                    owner: owner.clone(),
                    expires_at,
                },
            ))
        })
    }

    /// Give up a claim voluntarily.
    pub fn release_node(&self, id: &NodeId, owner: &str) -> Result<()> {
        let owner = non_empty("owner", owner)?;
        self.commit("release", |state, _now| {
            let node = node(state, id)?;
            let holder = held_claim(node.workflow_state, node.claimed_by(), id)?;
            if holder != owner {
                return Err(ServiceError::ClaimedByOther {
                    id: id.clone(),
                    owner: holder.to_owned(),
                });
            }
            Ok((
                vec![Event::NodesReleased {
                    node_ids: vec![id.clone()],
                    reason: ReleaseReason::Released,
                }],
                (),
            ))
        })
    }
}

fn held_claim<'a>(
    workflow: WorkflowState,
    holder: Option<&'a str>,
    id: &NodeId,
) -> Result<&'a str> {
    match holder {
        Some(holder) if workflow == WorkflowState::Claimed => Ok(holder),
        _ => Err(ServiceError::NotClaimed(id.clone())),
    }
}

fn check_timeout(timeout: TimeDelta) -> Result<()> {
    if timeout > TimeDelta::zero() {
        Ok(())
    } else {
        Err(ServiceError::InvalidTimeout {
            seconds: timeout.num_seconds(),
        })
    }
}

fn expiry(now: DateTime<Utc>, timeout: TimeDelta) -> Result<DateTime<Utc>> {
    now.checked_add_signed(timeout)
        .ok_or(ServiceError::InvalidTimeout {
            seconds: timeout.num_seconds(),
        })
}

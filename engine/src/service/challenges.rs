//! Raising and closing challenges.
//!
//! Closing a challenge never touches the node it targets; it only lifts the
//! condition the acceptance gate checks.

use uuid::Uuid;

use proofwork_core::State;
use proofwork_types::{
    Challenge, ChallengeId, ChallengeTarget, EpistemicState, Event, NodeId, Severity,
};

use super::{ProofService, node, non_empty};
use crate::error::{Result, ServiceError};

impl ProofService {
    /// Open a challenge against a pending node. Returns the generated id.
    pub fn raise_challenge(
        &self,
        node_id: &NodeId,
        target: ChallengeTarget,
        severity: Severity,
        reason: &str,
        raised_by: &str,
    ) -> Result<ChallengeId> {
        let reason = non_empty("reason", reason)?;
        let raised_by = non_empty("raised_by", raised_by)?;

        self.commit("raise_challenge", |state, _now| {
            let node = node(state, node_id)?;
            if node.epistemic_state != EpistemicState::Pending {
                return Err(ServiceError::NotPending {
                    id: node_id.clone(),
                    state: node.epistemic_state,
                });
            }
            let challenge_id = ChallengeId::new(format!("ch-{}", Uuid::new_v4().simple()));
            if severity.is_blocking() {
                tracing::info!(node = %node_id, challenge = %challenge_id, %severity, "Raising blocking challenge");
            }
            Ok((
                vec![Event::ChallengeRaised {
                    challenge_id: challenge_id.clone(),
                    node_id: node_id.clone(),
                    target,
                    severity,
                    reason: reason.clone(),
                    raised_by: raised_by.clone(),
                }],
                challenge_id,
            ))
        })
    }

    pub fn resolve_challenge(&self, id: &ChallengeId, resolution: &str, resolved_by: &str) -> Result<()> {
        let resolution = non_empty("resolution", resolution)?;
        let resolved_by = non_empty("resolved_by", resolved_by)?;

        self.commit("resolve_challenge", |state, _now| {
            open_challenge(state, id)?;
            Ok((
                vec![Event::ChallengeResolved {
                    challenge_id: id.clone(),
                    resolution: resolution.clone(),
                    resolved_by: resolved_by.clone(),
                }],
                (),
            ))
        })
    }

    pub fn withdraw_challenge(&self, id: &ChallengeId, withdrawn_by: &str) -> Result<()> {
        let withdrawn_by = non_empty("withdrawn_by", withdrawn_by)?;

        self.commit("withdraw_challenge", |state, _now| {
            open_challenge(state, id)?;
            Ok((
                vec![Event::ChallengeWithdrawn {
                    challenge_id: id.clone(),
                    withdrawn_by: withdrawn_by.clone(),
                }],
                (),
            ))
        })
    }
}

fn open_challenge<'s>(state: &'s State, id: &ChallengeId) -> Result<&'s Challenge> {
    let challenge = state
        .get_challenge(id)
        .ok_or_else(|| ServiceError::ChallengeNotFound(id.clone()))?;
    if !challenge.is_open() {
        return Err(ServiceError::ChallengeClosed {
            id: id.clone(),
            status: challenge.status,
        });
    }
    Ok(challenge)
}

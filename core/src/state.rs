//! Materialized proof state.
//!
//! [`State`] is a pure fold over ledger records. Nothing outside
//! [`State::apply`] mutates it, and applying the same records in the same
//! order always yields an equal value, so a state rebuilt from scratch and a
//! state advanced incrementally with [`State::apply_all`] compare equal.
//!
//! Nodes live in a single map keyed by [`NodeId`]. Parent and child relations
//! are never stored; they are derived from the id algebra, and because ids
//! order lexicographically by component, a node's subtree is a contiguous
//! range of the map.

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use proofwork_types::{
    Challenge, ChallengeId, ChallengeTransitionError, ClaimInfo, Definition, EpistemicState,
    Event, External, LedgerRecord, Lemma, LemmaId, Node, NodeId, PendingDef, PendingDefId,
    PendingDefStatus, ReleaseReason, Verdict, WorkflowState,
};

/// Open challenges grouped by the node they target.
pub type ChallengeMap<'a> = BTreeMap<NodeId, Vec<&'a Challenge>>;

/// A record that cannot be folded into the current state.
///
/// The proof service never appends such records, so any of these means the
/// ledger was edited by hand or written by something else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("record {seq} is out of order; expected {expected}")]
    OutOfOrder { seq: u64, expected: u64 },
    #[error("record {seq}: proof is already initialized")]
    AlreadyInitialized { seq: u64 },
    #[error("record {seq}: node {id} already exists")]
    DuplicateNode { seq: u64, id: NodeId },
    #[error("record {seq}: node {id} has no parent in the tree")]
    MissingParent { seq: u64, id: NodeId },
    #[error("record {seq}: unknown node {id}")]
    UnknownNode { seq: u64, id: NodeId },
    #[error("record {seq}: node {id} cannot move from {from} to {to}")]
    InvalidTransition {
        seq: u64,
        id: NodeId,
        from: EpistemicState,
        to: EpistemicState,
    },
    #[error("record {seq}: challenge {id} already exists")]
    DuplicateChallenge { seq: u64, id: ChallengeId },
    #[error("record {seq}: unknown challenge {id}")]
    UnknownChallenge { seq: u64, id: ChallengeId },
    #[error("record {seq}: {source}")]
    ChallengeTransition {
        seq: u64,
        source: ChallengeTransitionError,
    },
    #[error("record {seq}: lemma {id} already exists")]
    DuplicateLemma { seq: u64, id: LemmaId },
    #[error("record {seq}: pending definition {id} already exists")]
    DuplicatePendingDef { seq: u64, id: PendingDefId },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct State {
    conjecture: Option<String>,
    author: Option<String>,
    initialized_at: Option<DateTime<Utc>>,
    nodes: BTreeMap<NodeId, Node>,
    challenges: BTreeMap<ChallengeId, Challenge>,
    lemmas: BTreeMap<LemmaId, Lemma>,
    definitions: BTreeMap<String, Definition>,
    externals: BTreeMap<String, External>,
    pending_defs: BTreeMap<PendingDefId, PendingDef>,
    last_seq: u64,
}

impl State {
    /// Fold `records` into an empty state.
    pub fn replay<'a>(
        records: impl IntoIterator<Item = &'a LedgerRecord>,
    ) -> Result<Self, ReplayError> {
        let mut state = Self::default();
        state.apply_all(records)?;
        Ok(state)
    }

    pub fn apply_all<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a LedgerRecord>,
    ) -> Result<(), ReplayError> {
        for record in records {
            self.apply(record)?;
        }
        Ok(())
    }

    /// Fold one record. Records must arrive in sequence order with no gaps.
    ///
    /// On error the state is left unchanged.
    pub fn apply(&mut self, record: &LedgerRecord) -> Result<(), ReplayError> {
        let seq = record.seq;
        let expected = self.last_seq + 1;
        if seq != expected {
            return Err(ReplayError::OutOfOrder { seq, expected });
        }
        let at = record.timestamp;

        match &record.event {
            Event::ProofInitialized { conjecture, author } => {
                if self.conjecture.is_some() {
                    return Err(ReplayError::AlreadyInitialized { seq });
                }
                self.conjecture = Some(conjecture.clone());
                self.author = Some(author.clone());
                self.initialized_at = Some(at);
            }
            Event::NodeCreated { node, author } => {
                if self.nodes.contains_key(&node.id) {
                    return Err(ReplayError::DuplicateNode {
                        seq,
                        id: node.id.clone(),
                    });
                }
                if let Some(parent) = node.id.parent()
                    && !self.nodes.contains_key(&parent)
                {
                    return Err(ReplayError::MissingParent {
                        seq,
                        id: node.id.clone(),
                    });
                }
                let mut created = Node::from_spec(node.clone(), at, author.clone());
                if !self.validation_deps_met(&created) {
                    created.workflow_state = WorkflowState::Blocked;
                }
                tracing::debug!(seq, node = %created.id, workflow = %created.workflow_state, "Replayed node creation");
                self.nodes.insert(created.id.clone(), created);
            }
            Event::NodeClaimed {
                node_id,
                owner,
                expires_at,
                ..
            } => {
                let node = self.node_mut(seq, node_id)?;
                node.workflow_state = WorkflowState::Claimed;
                node.claim = Some(ClaimInfo {
                    owner: owner.clone(),
                    expires_at: *expires_at,
                });
            }
            Event::NodeClaimRefreshed {
                node_id,
                owner,
                expires_at,
            } => {
                let node = self.node_mut(seq, node_id)?;
                node.workflow_state = WorkflowState::Claimed;
                node.claim = Some(ClaimInfo {
                    owner: owner.clone(),
                    expires_at: *expires_at,
                });
            }
            Event::NodesReleased { node_ids, reason } => {
                // Validate the whole batch before touching anything.
                if let Some(missing) = node_ids.iter().find(|id| !self.nodes.contains_key(*id)) {
                    return Err(ReplayError::UnknownNode {
                        seq,
                        id: missing.clone(),
                    });
                }
                for id in node_ids {
                    self.release(id);
                }
                if *reason != ReleaseReason::Released {
                    tracing::debug!(seq, count = node_ids.len(), ?reason, "Replayed reap");
                }
            }
            Event::ChallengeRaised {
                challenge_id,
                node_id,
                target,
                severity,
                reason,
                raised_by,
            } => {
                if self.challenges.contains_key(challenge_id) {
                    return Err(ReplayError::DuplicateChallenge {
                        seq,
                        id: challenge_id.clone(),
                    });
                }
                if !self.nodes.contains_key(node_id) {
                    return Err(ReplayError::UnknownNode {
                        seq,
                        id: node_id.clone(),
                    });
                }
                self.challenges.insert(
                    challenge_id.clone(),
                    Challenge::open(
                        challenge_id.clone(),
                        node_id.clone(),
                        *target,
                        *severity,
                        reason.clone(),
                        raised_by.clone(),
                        at,
                    ),
                );
            }
            Event::ChallengeResolved {
                challenge_id,
                resolution,
                resolved_by,
            } => {
                self.challenge_mut(seq, challenge_id)?
                    .resolve(resolution.clone(), resolved_by.clone(), at)
                    .map_err(|source| ReplayError::ChallengeTransition { seq, source })?;
            }
            Event::ChallengeWithdrawn {
                challenge_id,
                withdrawn_by,
            } => {
                self.challenge_mut(seq, challenge_id)?
                    .withdraw(withdrawn_by.clone(), at)
                    .map_err(|source| ReplayError::ChallengeTransition { seq, source })?;
            }
            Event::NodeAccepted {
                node_id,
                verdict,
                note,
                ..
            } => {
                let to = match verdict {
                    Verdict::Validated => EpistemicState::Validated,
                    Verdict::Admitted => EpistemicState::Admitted,
                };
                self.transition(seq, node_id, to, note.clone())?;
                self.unblock_dependents();
            }
            Event::NodeRefuted {
                node_id, reason, ..
            } => {
                self.transition(seq, node_id, EpistemicState::Refuted, Some(reason.clone()))?;
            }
            Event::NodeArchived {
                node_id, reason, ..
            } => {
                self.transition(seq, node_id, EpistemicState::Archived, Some(reason.clone()))?;
            }
            Event::LemmaExtracted {
                lemma_id,
                node_id,
                statement,
                content_hash,
                proof,
            } => {
                if self.lemmas.contains_key(lemma_id) {
                    return Err(ReplayError::DuplicateLemma {
                        seq,
                        id: lemma_id.clone(),
                    });
                }
                self.lemmas.insert(
                    lemma_id.clone(),
                    Lemma {
                        id: lemma_id.clone(),
                        statement: statement.clone(),
                        source_node: node_id.clone(),
                        content_hash: content_hash.clone(),
                        created_at: at,
                        proof: proof.clone(),
                    },
                );
            }
            Event::DefinitionAdded {
                name,
                content,
                added_by,
            } => {
                self.definitions.insert(
                    name.clone(),
                    Definition {
                        name: name.clone(),
                        content: content.clone(),
                        added_by: added_by.clone(),
                        created_at: at,
                    },
                );
                for pending in self.pending_defs.values_mut() {
                    if pending.is_pending() && pending.term == *name {
                        pending.status = PendingDefStatus::Resolved;
                        pending.resolved_at = Some(at);
                    }
                }
            }
            Event::DefinitionRequested {
                pending_id,
                term,
                node_id,
                requested_by,
            } => {
                if self.pending_defs.contains_key(pending_id) {
                    return Err(ReplayError::DuplicatePendingDef {
                        seq,
                        id: pending_id.clone(),
                    });
                }
                self.pending_defs.insert(
                    pending_id.clone(),
                    PendingDef {
                        id: pending_id.clone(),
                        term: term.clone(),
                        node_id: node_id.clone(),
                        requested_by: requested_by.clone(),
                        status: PendingDefStatus::Pending,
                        created_at: at,
                        resolved_at: None,
                    },
                );
            }
            Event::ExternalAdded {
                name,
                source,
                statement,
                added_by,
            } => {
                self.externals.insert(
                    name.clone(),
                    External {
                        name: name.clone(),
                        source: source.clone(),
                        statement: statement.clone(),
                        added_by: added_by.clone(),
                        created_at: at,
                    },
                );
            }
        }

        self.last_seq = seq;
        Ok(())
    }

    fn node_mut(&mut self, seq: u64, id: &NodeId) -> Result<&mut Node, ReplayError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| ReplayError::UnknownNode {
                seq,
                id: id.clone(),
            })
    }

    fn challenge_mut(
        &mut self,
        seq: u64,
        id: &ChallengeId,
    ) -> Result<&mut Challenge, ReplayError> {
        self.challenges
            .get_mut(id)
            .ok_or_else(|| ReplayError::UnknownChallenge {
                seq,
                id: id.clone(),
            })
    }

    fn release(&mut self, id: &NodeId) {
        let blocked = self
            .nodes
            .get(id)
            .is_some_and(|node| !self.validation_deps_met(node));
        if let Some(node) = self.nodes.get_mut(id) {
            node.claim = None;
            node.workflow_state = if blocked {
                WorkflowState::Blocked
            } else {
                WorkflowState::Available
            };
        }
    }

    fn transition(
        &mut self,
        seq: u64,
        id: &NodeId,
        to: EpistemicState,
        note: Option<String>,
    ) -> Result<(), ReplayError> {
        let node = self.node_mut(seq, id)?;
        let from = node.epistemic_state;
        if !from.can_transition_to(to) {
            return Err(ReplayError::InvalidTransition {
                seq,
                id: id.clone(),
                from,
                to,
            });
        }
        node.epistemic_state = to;
        node.workflow_state = WorkflowState::Available;
        node.claim = None;
        if note.is_some() {
            node.verdict_note = note;
        }
        Ok(())
    }

    fn unblock_dependents(&mut self) {
        let ready: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| {
                node.workflow_state == WorkflowState::Blocked && self.validation_deps_met(node)
            })
            .map(|node| node.id.clone())
            .collect();
        for id in ready {
            if let Some(node) = self.nodes.get_mut(&id) {
                tracing::debug!(node = %id, "Validation dependencies met; unblocking");
                node.workflow_state = WorkflowState::Available;
            }
        }
    }

    fn validation_deps_met(&self, node: &Node) -> bool {
        node.validation_deps.iter().all(|dep| {
            self.nodes
                .get(dep)
                .is_some_and(|d| d.epistemic_state.is_complete())
        })
    }

    // ── Queries ──────────────────────────────────────────────

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.conjecture.is_some()
    }

    #[must_use]
    pub fn conjecture(&self) -> Option<&str> {
        self.conjecture.as_deref()
    }

    #[must_use]
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    #[must_use]
    pub fn initialized_at(&self) -> Option<DateTime<Utc>> {
        self.initialized_at
    }

    /// Sequence number of the last record folded in; 0 when empty.
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    #[must_use]
    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Every node, in id order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    #[must_use]
    pub fn node_map(&self) -> &BTreeMap<NodeId, Node> {
        &self.nodes
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Direct children of `parent`, in id order.
    #[must_use]
    pub fn children_of(&self, parent: &NodeId) -> Vec<&Node> {
        self.nodes
            .range(parent.clone()..)
            .skip(1)
            .take_while(|(id, _)| parent.is_ancestor_of(id))
            .filter(|(id, _)| parent.is_parent_of(id))
            .map(|(_, node)| node)
            .collect()
    }

    /// One past the highest existing child index of `parent`.
    #[must_use]
    pub fn next_child_index(&self, parent: &NodeId) -> NonZeroU32 {
        self.children_of(parent)
            .iter()
            .map(|child| child.id.child_index())
            .max()
            .and_then(|max| max.checked_add(1))
            .unwrap_or(NonZeroU32::MIN)
    }

    /// Validation dependencies of `node` that are not yet validated or admitted.
    #[must_use]
    pub fn unmet_validation_deps(&self, node: &Node) -> Vec<NodeId> {
        node.validation_deps
            .iter()
            .filter(|dep| {
                !self
                    .nodes
                    .get(*dep)
                    .is_some_and(|d| d.epistemic_state.is_complete())
            })
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn get_challenge(&self, id: &ChallengeId) -> Option<&Challenge> {
        self.challenges.get(id)
    }

    /// Every challenge in any status, ordered by creation time then id.
    #[must_use]
    pub fn all_challenges(&self) -> Vec<&Challenge> {
        let mut all: Vec<&Challenge> = self.challenges.values().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    #[must_use]
    pub fn open_challenges(&self) -> Vec<&Challenge> {
        self.all_challenges()
            .into_iter()
            .filter(|c| c.is_open())
            .collect()
    }

    /// Open challenges keyed by node, built in one pass for job discovery.
    #[must_use]
    pub fn challenge_map_for_jobs(&self) -> ChallengeMap<'_> {
        let mut map: ChallengeMap<'_> = BTreeMap::new();
        for challenge in self.open_challenges() {
            map.entry(challenge.node_id.clone())
                .or_default()
                .push(challenge);
        }
        map
    }

    /// Open `critical`/`major` challenges against `id`.
    #[must_use]
    pub fn blocking_challenges_for_node(&self, id: &NodeId) -> Vec<&Challenge> {
        self.all_challenges()
            .into_iter()
            .filter(|c| c.node_id == *id && c.is_blocking())
            .collect()
    }

    #[must_use]
    pub fn has_blocking_challenges(&self, id: &NodeId) -> bool {
        self.challenges
            .values()
            .any(|c| c.node_id == *id && c.is_blocking())
    }

    pub fn all_lemmas(&self) -> impl Iterator<Item = &Lemma> {
        self.lemmas.values()
    }

    #[must_use]
    pub fn get_lemma(&self, id: &LemmaId) -> Option<&Lemma> {
        self.lemmas.get(id)
    }

    #[must_use]
    pub fn lemma_count(&self) -> usize {
        self.lemmas.len()
    }

    pub fn all_pending_defs(&self) -> impl Iterator<Item = &PendingDef> {
        self.pending_defs.values()
    }

    #[must_use]
    pub fn get_pending_def(&self, id: &PendingDefId) -> Option<&PendingDef> {
        self.pending_defs.get(id)
    }

    #[must_use]
    pub fn get_definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.values()
    }

    #[must_use]
    pub fn get_external(&self, name: &str) -> Option<&External> {
        self.externals.get(name)
    }

    pub fn externals(&self) -> impl Iterator<Item = &External> {
        self.externals.values()
    }
}

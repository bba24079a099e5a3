//! Node creation and epistemic transitions.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use proofwork_core::State;
use proofwork_types::{
    EmptyStringError, EpistemicState, Event, Inference, NodeId, NodeSpec, NodeType, Verdict,
    WorkflowState,
};

use super::{ProofService, check_not_held_by_other, node, non_empty};
use crate::citations;
use crate::error::{Result, ServiceError};

/// Everything about a new node except where it goes in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDraft {
    pub node_type: NodeType,
    pub statement: String,
    pub inference: Inference,
    pub dependencies: Vec<NodeId>,
    pub validation_deps: Vec<NodeId>,
}

impl NodeDraft {
    #[must_use]
    pub fn new(node_type: NodeType, statement: impl Into<String>, inference: Inference) -> Self {
        Self {
            node_type,
            statement: statement.into(),
            inference,
            dependencies: Vec::new(),
            validation_deps: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<NodeId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    #[must_use]
    pub fn with_validation_deps(mut self, validation_deps: Vec<NodeId>) -> Self {
        self.validation_deps = validation_deps;
        self
    }

    fn at(&self, id: NodeId) -> NodeSpec {
        NodeSpec {
            id,
            node_type: self.node_type,
            statement: self.statement.clone(),
            inference: self.inference,
            dependencies: self.dependencies.clone(),
            validation_deps: self.validation_deps.clone(),
        }
    }
}

impl ProofService {
    /// Create a node at an explicit address.
    pub fn create_node(&self, id: &NodeId, draft: &NodeDraft, author: Option<&str>) -> Result<()> {
        let author = author.map(|a| non_empty("author", a)).transpose()?;
        self.commit("create_node", |state, _now| {
            let spec = draft.at(id.clone());
            self.check_new_node(state, &spec)?;
            Ok((
                vec![Event::NodeCreated {
                    node: spec,
                    author: author.clone(),
                }],
                (),
            ))
        })
    }

    /// Add the next child under `parent`, which `owner` must hold claimed.
    /// Returns the new node's id.
    pub fn refine(&self, parent: &NodeId, owner: &str, draft: &NodeDraft) -> Result<NodeId> {
        let owner = non_empty("owner", owner)?;
        self.commit("refine", |state, _now| {
            let parent_node = node(state, parent)?;
            match parent_node.claimed_by() {
                Some(holder) if parent_node.workflow_state == WorkflowState::Claimed => {
                    if holder != owner {
                        return Err(ServiceError::ClaimedByOther {
                            id: parent.clone(),
                            owner: holder.to_owned(),
                        });
                    }
                }
                _ => return Err(ServiceError::NotClaimed(parent.clone())),
            }

            let id = parent.child(state.next_child_index(parent));
            let spec = draft.at(id.clone());
            self.check_new_node(state, &spec)?;
            Ok((
                vec![Event::NodeCreated {
                    node: spec,
                    author: Some(owner.clone()),
                }],
                id,
            ))
        })
    }

    fn check_new_node(&self, state: &State, spec: &NodeSpec) -> Result<()> {
        let id = &spec.id;
        if state.get_node(id).is_some() {
            return Err(ServiceError::NodeExists(id.clone()));
        }
        // The root is created by init, so anything reaching here has a parent.
        let Some(parent) = id.parent() else {
            return Err(ServiceError::NodeExists(id.clone()));
        };
        let Some(parent_node) = state.get_node(&parent) else {
            return Err(ServiceError::ParentNotFound {
                id: id.clone(),
                parent,
            });
        };
        if parent_node.epistemic_state.is_terminal() {
            return Err(ServiceError::ParentClosed {
                id: id.clone(),
                state: parent_node.epistemic_state,
                parent,
            });
        }

        let depth = id.depth();
        if depth > self.limits.max_depth {
            return Err(ServiceError::DepthExceeded {
                id: id.clone(),
                depth,
                max: self.limits.max_depth,
            });
        }
        if state.children_of(&parent).len() >= self.limits.max_children {
            return Err(ServiceError::TooManyChildren {
                parent,
                max: self.limits.max_children,
            });
        }

        if spec.statement.trim().is_empty() {
            return Err(EmptyStringError { field: "statement" }.into());
        }
        citations::check_resolved(&spec.statement, state)?;

        for dependency in spec.dependencies.iter().chain(&spec.validation_deps) {
            if dependency == id {
                return Err(ServiceError::SelfDependency(id.clone()));
            }
            if state.get_node(dependency).is_none() {
                return Err(ServiceError::UnknownDependency {
                    id: id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }

        if depth > self.limits.warn_depth {
            tracing::warn!(
                node = %id,
                depth,
                warn_depth = self.limits.warn_depth,
                "Node is deeper than the warning threshold; consider adding breadth"
            );
        }
        Ok(())
    }

    // ── Acceptance ───────────────────────────────────────────

    pub fn accept_node(&self, id: &NodeId, agent: Option<&str>) -> Result<()> {
        self.accept(id, Verdict::Validated, agent, None)
    }

    pub fn accept_node_with_note(&self, id: &NodeId, agent: Option<&str>, note: &str) -> Result<()> {
        let note = non_empty("note", note)?;
        self.accept(id, Verdict::Validated, agent, Some(note))
    }

    /// Admit without proof. Same gates as acceptance; taints dependents.
    pub fn admit_node(&self, id: &NodeId, agent: Option<&str>, note: Option<&str>) -> Result<()> {
        let note = note.map(|n| non_empty("note", n)).transpose()?;
        self.accept(id, Verdict::Admitted, agent, note)
    }

    /// Accept every node in `ids` or none of them.
    ///
    /// Nodes are checked in the given order, and a node accepted earlier in
    /// the batch counts as validated for later nodes' validation deps.
    pub fn accept_nodes_bulk(&self, ids: &[NodeId], agent: Option<&str>) -> Result<()> {
        if ids.is_empty() {
            return Err(ServiceError::EmptyBatch);
        }
        let mut seen = BTreeSet::new();
        for id in ids {
            if !seen.insert(id) {
                return Err(ServiceError::DuplicateInBatch(id.clone()));
            }
        }
        let agent = optional_agent(agent)?;
        let agent = agent.as_deref();

        self.commit("accept_bulk", |state, now| {
            let mut accepted = BTreeSet::new();
            let mut events = Vec::with_capacity(ids.len());
            for id in ids {
                check_acceptable(state, id, EpistemicState::Validated, agent, now, &accepted)?;
                accepted.insert(id.clone());
                events.push(accepted_event(id, Verdict::Validated, agent, None));
            }
            Ok((events, ()))
        })
    }

    fn accept(
        &self,
        id: &NodeId,
        verdict: Verdict,
        agent: Option<&str>,
        note: Option<String>,
    ) -> Result<()> {
        let agent = optional_agent(agent)?;
        let agent = agent.as_deref();
        let to = match verdict {
            Verdict::Validated => EpistemicState::Validated,
            Verdict::Admitted => EpistemicState::Admitted,
        };
        self.commit("accept", |state, now| {
            check_acceptable(state, id, to, agent, now, &BTreeSet::new())?;
            Ok((vec![accepted_event(id, verdict, agent, note.clone())], ()))
        })
    }

    // ── Refutation and archival ──────────────────────────────

    pub fn refute_node(&self, id: &NodeId, reason: &str, agent: Option<&str>) -> Result<()> {
        let reason = non_empty("reason", reason)?;
        let agent = optional_agent(agent)?;
        self.commit("refute", |state, now| {
            let node = node(state, id)?;
            check_transition(id, node.epistemic_state, EpistemicState::Refuted)?;
            check_not_held_by_other(node, agent.as_deref(), now)?;
            Ok((
                vec![Event::NodeRefuted {
                    node_id: id.clone(),
                    reason: reason.clone(),
                    agent: agent.clone(),
                }],
                (),
            ))
        })
    }

    pub fn archive_node(&self, id: &NodeId, reason: &str, agent: Option<&str>) -> Result<()> {
        let reason = non_empty("reason", reason)?;
        let agent = optional_agent(agent)?;
        self.commit("archive", |state, now| {
            let node = node(state, id)?;
            check_transition(id, node.epistemic_state, EpistemicState::Archived)?;
            check_not_held_by_other(node, agent.as_deref(), now)?;
            Ok((
                vec![Event::NodeArchived {
                    node_id: id.clone(),
                    reason: reason.clone(),
                    agent: agent.clone(),
                }],
                (),
            ))
        })
    }
}

fn optional_agent(agent: Option<&str>) -> Result<Option<String>> {
    agent.map(|a| non_empty("agent", a)).transpose()
}

/// The acceptance gate: pending, not held by someone else, validation deps
/// met, and no open blocking challenge.
fn check_acceptable(
    state: &State,
    id: &NodeId,
    to: EpistemicState,
    agent: Option<&str>,
    now: DateTime<Utc>,
    accepted_in_batch: &BTreeSet<NodeId>,
) -> Result<()> {
    let node = node(state, id)?;
    check_transition(id, node.epistemic_state, to)?;
    check_not_held_by_other(node, agent, now)?;

    let unmet: Vec<NodeId> = state
        .unmet_validation_deps(node)
        .into_iter()
        .filter(|dep| !accepted_in_batch.contains(dep))
        .collect();
    if !unmet.is_empty() {
        return Err(ServiceError::UnmetValidationDeps {
            id: id.clone(),
            dependencies: unmet,
        });
    }

    let blocking = state.blocking_challenges_for_node(id);
    if !blocking.is_empty() {
        return Err(ServiceError::BlockingChallenges {
            id: id.clone(),
            challenges: blocking.into_iter().map(|c| c.id.clone()).collect(),
        });
    }
    Ok(())
}

fn check_transition(id: &NodeId, from: EpistemicState, to: EpistemicState) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition {
            id: id.clone(),
            from,
            to,
        })
    }
}

fn accepted_event(id: &NodeId, verdict: Verdict, agent: Option<&str>, note: Option<String>) -> Event {
    Event::NodeAccepted {
        node_id: id.clone(),
        verdict,
        note,
        agent: agent.map(str::to_owned),
    }
}

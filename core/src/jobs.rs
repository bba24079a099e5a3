//! Job discovery.
//!
//! Turns a snapshot of nodes and their open challenges into two disjoint,
//! ranked work lists:
//!
//! - **verifier** jobs: pending, available, unchallenged nodes whose
//!   validation dependencies are met. Shallowest first.
//! - **prover** jobs: pending nodes with at least one open challenge of any
//!   severity. Ranked by `-1000 * critical - 100 * major + depth`, lowest
//!   first.
//!
//! Ties break on [`NodeId`] order in both lists.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use proofwork_types::{EpistemicState, Node, NodeId, Severity, WorkflowState};

use crate::state::{ChallengeMap, State};

const CRITICAL_WEIGHT: i64 = 1000;
const MAJOR_WEIGHT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Prover,
    Verifier,
}

/// The factor that dominated a job's rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityReason {
    CriticalChallenge,
    MajorChallenge,
    ShallowestDepth,
}

impl fmt::Display for PriorityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CriticalChallenge => "critical challenge present",
            Self::MajorChallenge => "major challenge present",
            Self::ShallowestDepth => "shallowest depth",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub node_id: NodeId,
    pub kind: JobKind,
    pub depth: usize,
    pub open_challenges: usize,
    pub critical: usize,
    pub major: usize,
    /// Lower sorts first.
    pub score: i64,
    pub reason: PriorityReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub prover: Vec<Job>,
    pub verifier: Vec<Job>,
}

impl JobResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prover.is_empty() && self.verifier.is_empty()
    }

    /// Rank-0 job of the given kind.
    #[must_use]
    pub fn recommended(&self, kind: JobKind) -> Option<&Job> {
        match kind {
            JobKind::Prover => self.prover.first(),
            JobKind::Verifier => self.verifier.first(),
        }
    }
}

/// Rank work over `nodes`.
///
/// `node_map` resolves validation dependencies; `challenges` holds only open
/// challenges, keyed by target node (see [`State::challenge_map_for_jobs`]).
#[must_use]
pub fn find_jobs<'a>(
    nodes: impl IntoIterator<Item = &'a Node>,
    node_map: &BTreeMap<NodeId, Node>,
    challenges: &ChallengeMap<'_>,
) -> JobResult {
    let mut result = JobResult::default();

    for node in nodes {
        if node.epistemic_state != EpistemicState::Pending {
            continue;
        }
        let open = challenges.get(&node.id).map_or(&[][..], Vec::as_slice);
        let depth = node.depth();

        if open.is_empty() {
            if node.workflow_state == WorkflowState::Available && deps_met(node, node_map) {
                result.verifier.push(Job {
                    node_id: node.id.clone(),
                    kind: JobKind::Verifier,
                    depth,
                    open_challenges: 0,
                    critical: 0,
                    major: 0,
                    score: depth as i64,
                    reason: PriorityReason::ShallowestDepth,
                });
            }
            continue;
        }

        let critical = open
            .iter()
            .filter(|c| c.severity() == Severity::Critical)
            .count();
        let major = open
            .iter()
            .filter(|c| c.severity() == Severity::Major)
            .count();
        let reason = if critical > 0 {
            PriorityReason::CriticalChallenge
        } else if major > 0 {
            PriorityReason::MajorChallenge
        } else {
            PriorityReason::ShallowestDepth
        };
        result.prover.push(Job {
            node_id: node.id.clone(),
            kind: JobKind::Prover,
            depth,
            open_challenges: open.len(),
            critical,
            major,
            score: -CRITICAL_WEIGHT * critical as i64 - MAJOR_WEIGHT * major as i64 + depth as i64,
            reason,
        });
    }

    result
        .verifier
        .sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.node_id.cmp(&b.node_id)));
    result
        .prover
        .sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.node_id.cmp(&b.node_id)));

    tracing::debug!(
        prover = result.prover.len(),
        verifier = result.verifier.len(),
        "Found jobs"
    );
    result
}

/// [`find_jobs`] over every node in `state`.
#[must_use]
pub fn find_jobs_in(state: &State) -> JobResult {
    let challenges = state.challenge_map_for_jobs();
    find_jobs(state.all_nodes(), state.node_map(), &challenges)
}

fn deps_met(node: &Node, node_map: &BTreeMap<NodeId, Node>) -> bool {
    node.validation_deps.iter().all(|dep| {
        node_map
            .get(dep)
            .is_some_and(|d| d.epistemic_state.is_complete())
    })
}

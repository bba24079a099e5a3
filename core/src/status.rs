//! Proof-wide progress summary.

use chrono::{DateTime, Utc};
use serde::Serialize;

use proofwork_types::{EpistemicState, NodeId, Severity, WorkflowState};

use crate::state::State;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EpistemicCounts {
    pub pending: usize,
    pub validated: usize,
    pub admitted: usize,
    pub refuted: usize,
    pub archived: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowCounts {
    pub available: usize,
    pub claimed: usize,
    pub blocked: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub major: usize,
    pub minor: usize,
    pub note: usize,
}

impl SeverityCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.critical + self.major + self.minor + self.note
    }

    #[must_use]
    pub fn blocking(&self) -> usize {
        self.critical + self.major
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub conjecture: Option<String>,
    pub author: Option<String>,
    pub total_nodes: usize,
    pub epistemic: EpistemicCounts,
    pub workflow: WorkflowCounts,
    pub open_challenges: SeverityCounts,
    /// Validated plus admitted over all non-archived nodes; 0 for an empty tree.
    pub progress: f64,
    pub live_claims: usize,
    pub stale_claims: usize,
    /// Nodes deeper than the configured warning depth.
    pub deep_nodes: Vec<NodeId>,
    pub lemmas: usize,
    pub pending_defs: usize,
    pub last_seq: u64,
}

impl StatusReport {
    #[must_use]
    pub fn summarize(state: &State, now: DateTime<Utc>, warn_depth: usize) -> Self {
        let mut epistemic = EpistemicCounts::default();
        let mut workflow = WorkflowCounts::default();
        let mut live_claims = 0;
        let mut stale_claims = 0;
        let mut deep_nodes = Vec::new();

        for node in state.all_nodes() {
            match node.epistemic_state {
                EpistemicState::Pending => epistemic.pending += 1,
                EpistemicState::Validated => epistemic.validated += 1,
                EpistemicState::Admitted => epistemic.admitted += 1,
                EpistemicState::Refuted => epistemic.refuted += 1,
                EpistemicState::Archived => epistemic.archived += 1,
            }
            match node.workflow_state {
                WorkflowState::Available => workflow.available += 1,
                WorkflowState::Claimed => workflow.claimed += 1,
                WorkflowState::Blocked => workflow.blocked += 1,
            }
            if node.is_locked(now) {
                live_claims += 1;
            } else if node.is_stale(now) {
                stale_claims += 1;
            }
            if node.depth() > warn_depth {
                deep_nodes.push(node.id.clone());
            }
        }

        let mut open_challenges = SeverityCounts::default();
        for challenge in state.open_challenges() {
            match challenge.severity() {
                Severity::Critical => open_challenges.critical += 1,
                Severity::Major => open_challenges.major += 1,
                Severity::Minor => open_challenges.minor += 1,
                Severity::Note => open_challenges.note += 1,
            }
        }

        let total_nodes = state.node_count();
        let live = total_nodes - epistemic.archived;
        let progress = if live == 0 {
            0.0
        } else {
            (epistemic.validated + epistemic.admitted) as f64 / live as f64
        };

        Self {
            conjecture: state.conjecture().map(str::to_owned),
            author: state.author().map(str::to_owned),
            total_nodes,
            epistemic,
            workflow,
            open_challenges,
            progress,
            live_claims,
            stale_claims,
            deep_nodes,
            lemmas: state.lemma_count(),
            pending_defs: state.all_pending_defs().filter(|p| p.is_pending()).count(),
            last_seq: state.last_seq(),
        }
    }

    /// Every non-archived node is validated or admitted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let live = self.total_nodes - self.epistemic.archived;
        live > 0 && self.epistemic.validated + self.epistemic.admitted == live
    }
}

//! Taint: how much of a node's standing rests on admitted (unproven) steps.
//!
//! Computed from state on demand, never stored.
//!
//! | state           | meaning                                                  |
//! |-----------------|----------------------------------------------------------|
//! | `unresolved`    | the node or one of its ancestors is still pending        |
//! | `self_admitted` | the node itself was admitted without proof               |
//! | `tainted`       | an ancestor or validation dependency is admitted/tainted |
//! | `clean`         | none of the above                                        |

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use proofwork_types::{EpistemicState, NodeId};

use crate::state::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaintState {
    Clean,
    SelfAdmitted,
    Tainted,
    Unresolved,
}

impl TaintState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::SelfAdmitted => "self_admitted",
            Self::Tainted => "tainted",
            Self::Unresolved => "unresolved",
        }
    }

    const fn propagates(self) -> bool {
        matches!(self, Self::SelfAdmitted | Self::Tainted)
    }
}

impl fmt::Display for TaintState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Taint of every node, keyed by id.
#[must_use]
pub fn compute_taint(state: &State) -> BTreeMap<NodeId, TaintState> {
    let mut memo = BTreeMap::new();
    let mut visiting = BTreeSet::new();
    for id in state.node_map().keys() {
        taint_of(state, id, &mut memo, &mut visiting);
    }
    memo
}

/// Taint of one node; `None` if it does not exist.
#[must_use]
pub fn node_taint(state: &State, id: &NodeId) -> Option<TaintState> {
    state.get_node(id)?;
    Some(taint_of(
        state,
        id,
        &mut BTreeMap::new(),
        &mut BTreeSet::new(),
    ))
}

fn taint_of(
    state: &State,
    id: &NodeId,
    memo: &mut BTreeMap<NodeId, TaintState>,
    visiting: &mut BTreeSet<NodeId>,
) -> TaintState {
    if let Some(&taint) = memo.get(id) {
        return taint;
    }
    let Some(node) = state.get_node(id) else {
        return TaintState::Unresolved;
    };
    // Dependency cycles cannot be created through the service; treat one as unresolved.
    if !visiting.insert(id.clone()) {
        return TaintState::Unresolved;
    }

    let ancestors = id.ancestors();
    let pending = |n: &NodeId| {
        state
            .get_node(n)
            .is_some_and(|a| a.epistemic_state == EpistemicState::Pending)
    };

    let taint = if node.epistemic_state == EpistemicState::Pending || ancestors.iter().any(pending)
    {
        TaintState::Unresolved
    } else if node.epistemic_state == EpistemicState::Admitted {
        TaintState::SelfAdmitted
    } else if ancestors
        .iter()
        .chain(&node.validation_deps)
        .any(|upstream| taint_of(state, upstream, memo, visiting).propagates())
    {
        TaintState::Tainted
    } else {
        TaintState::Clean
    };

    visiting.remove(id);
    memo.insert(id.clone(), taint);
    taint
}

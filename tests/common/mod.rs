//! Shared test utilities and fixtures

#![allow(dead_code)]

use chrono::TimeDelta;
use tempfile::{TempDir, tempdir};

use proofwork_engine::{Limits, NodeDraft, ProofService};
use proofwork_types::{Inference, NodeId, NodeType};

pub const CONJECTURE: &str = "For every n >= 1, 1 + 3 + ... + (2n - 1) = n^2";

/// A freshly initialized proof in a temp dir. Keep the `TempDir` alive for
/// as long as the service is used.
pub fn proof() -> (TempDir, ProofService) {
    proof_with(Limits::default())
}

pub fn proof_with(limits: Limits) -> (TempDir, ProofService) {
    let dir = tempdir().expect("tempdir");
    let service = ProofService::init(dir.path().join("proof"), CONJECTURE, "alice", limits)
        .expect("init proof");
    (dir, service)
}

pub fn id(s: &str) -> NodeId {
    NodeId::parse(s).unwrap_or_else(|e| panic!("bad node id {s:?}: {e}"))
}

pub fn claim(statement: &str) -> NodeDraft {
    NodeDraft::new(NodeType::Claim, statement, Inference::ModusPonens)
}

pub fn hour() -> TimeDelta {
    TimeDelta::hours(1)
}

/// Add `ids` as plain claim nodes, parents first.
pub fn grow(service: &ProofService, ids: &[&str]) {
    for raw in ids {
        service
            .create_node(&id(raw), &claim(&format!("step {raw}")), Some("alice"))
            .unwrap_or_else(|e| panic!("create {raw}: {e}"));
    }
}

pub fn records(service: &ProofService) -> usize {
    service.ledger().count().expect("count ledger records")
}

//! Independent services racing on one proof directory.
//!
//! Each worker opens its own `ProofService`, so the only coordination is
//! the ledger's append lock and compare-and-append.

use std::sync::{Arc, Barrier};
use std::thread;

use proofwork_engine::{ProofService, ServiceError};
use proofwork_types::{NodeId, WorkflowState};

use crate::common::{claim, hour, proof, records};

const WORKERS: usize = 6;

#[test]
fn exactly_one_claim_wins_a_race() {
    let (_dir, service) = proof();
    let before = records(&service);
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let dir = service.dir().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let worker = ProofService::new(dir).unwrap();
                let owner = format!("prover-{i}");
                barrier.wait();
                worker
                    .claim_node(&NodeId::root(), &owner, hour())
                    .map(|info| info.owner)
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.join().unwrap() {
            Ok(owner) => winners.push(owner),
            Err(ServiceError::AlreadyClaimed { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners.len(), 1, "winners: {winners:?}");
    assert_eq!(records(&service), before + 1);
    let root = service.get_node(&NodeId::root()).unwrap();
    assert_eq!(root.workflow_state, WorkflowState::Claimed);
    assert_eq!(root.claimed_by(), Some(winners[0].as_str()));
}

#[test]
fn concurrent_creates_all_land_with_dense_sequences() {
    let (_dir, service) = proof();
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (1..=WORKERS)
        .map(|i| {
            let dir = service.dir().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let worker = ProofService::new(dir).unwrap();
                let id = NodeId::root().child(u32::try_from(i).unwrap().try_into().unwrap());
                barrier.wait();
                worker.create_node(&id, &claim(&format!("case {i}")), None)
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let all = service.ledger().read_all().unwrap();
    let seqs: Vec<u64> = all.iter().map(|r| r.seq).collect();
    let expected: Vec<u64> = (1..=(2 + WORKERS as u64)).collect();
    assert_eq!(seqs, expected);
    assert_eq!(service.load_state().unwrap().children_of(&NodeId::root()).len(), WORKERS);
}

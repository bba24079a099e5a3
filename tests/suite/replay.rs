//! Replay determinism and ledger integrity from the outside.

use std::fs;

use proofwork_core::State;
use proofwork_engine::{ProofService, ServiceError};
use proofwork_ledger::LedgerError;
use proofwork_types::{ChallengeTarget, NodeId, Severity};

use crate::common::{grow, hour, id, proof};

fn busy_proof() -> (tempfile::TempDir, ProofService) {
    let (dir, service) = proof();
    grow(&service, &["1.1", "1.2", "1.1.1"]);
    service.claim_node(&id("1.1"), "prover", hour()).unwrap();
    let ch = service
        .raise_challenge(&id("1.2"), ChallengeTarget::Scope, Severity::Critical, "n = 0?", "verifier")
        .unwrap();
    service.resolve_challenge(&ch, "n >= 1 stated", "prover").unwrap();
    service.accept_node(&id("1.2"), None).unwrap();
    service.add_definition("square", "n * n", "alice").unwrap();
    service.extract_lemma(&id("1.2"), None, None).unwrap();
    (dir, service)
}

#[test]
fn replay_is_deterministic() {
    let (_dir, service) = busy_proof();
    let records = service.ledger().read_all().unwrap();

    let first = State::replay(&records).unwrap();
    let second = State::replay(&records).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, service.load_state().unwrap());

    let reopened = ProofService::new(service.dir()).unwrap();
    assert_eq!(reopened.load_state().unwrap(), first);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn prefix_replay_matches_incremental_apply() {
    let (_dir, service) = busy_proof();
    let records = service.ledger().read_all().unwrap();

    let mut incremental = State::default();
    for (i, record) in records.iter().enumerate() {
        incremental.apply(record).unwrap();
        assert_eq!(incremental, State::replay(&records[..=i]).unwrap());
    }
    assert_eq!(incremental.last_seq(), records.len() as u64);
}

#[test]
fn corrupt_record_fails_loudly() {
    let (_dir, service) = busy_proof();
    let path = service.ledger().batch_path(3);
    fs::write(&path, b"{\"seq\":3,").unwrap();

    let fresh = ProofService::new(service.dir()).unwrap();
    match fresh.load_state() {
        Err(ServiceError::Ledger(LedgerError::Corrupt { seq: 3, .. })) => {}
        other => panic!("expected corrupt record error, got {other:?}"),
    }
}

#[test]
fn missing_record_is_a_gap() {
    let (_dir, service) = busy_proof();
    fs::remove_file(service.ledger().batch_path(4)).unwrap();

    let fresh = ProofService::new(service.dir()).unwrap();
    assert!(matches!(
        fresh.load_state(),
        Err(ServiceError::Ledger(LedgerError::SequenceGap {
            expected: 4,
            found: 5
        }))
    ));
    assert!(fresh.get_node(&NodeId::root()).is_err());
}

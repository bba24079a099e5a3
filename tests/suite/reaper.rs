//! Stale-claim reaping.

use std::thread;
use std::time::Duration;

use chrono::TimeDelta;

use proofwork_engine::ReapOptions;
use proofwork_types::{NodeId, ReleaseReason, WorkflowState};

use crate::common::{grow, hour, id, proof, records};

#[test]
fn expired_claims_are_reaped_once() {
    let (_dir, service) = proof();
    grow(&service, &["1.1"]);
    service
        .claim_node(&NodeId::root(), "prover", TimeDelta::nanoseconds(1))
        .unwrap();
    service.claim_node(&id("1.1"), "prover", hour()).unwrap();
    thread::sleep(Duration::from_millis(10));
    let before = records(&service);

    let report = service.reap(ReapOptions::default()).unwrap();
    assert_eq!(report.node_ids, vec![NodeId::root()]);
    assert_eq!(report.reason, ReleaseReason::Reaped);
    assert!(!report.dry_run);
    assert_eq!(records(&service), before + 1);

    let root = service.get_node(&NodeId::root()).unwrap();
    assert_eq!(root.workflow_state, WorkflowState::Available);
    assert!(root.claim.is_none());
    assert_eq!(
        service.get_node(&id("1.1")).unwrap().workflow_state,
        WorkflowState::Claimed
    );

    let again = service.reap(ReapOptions::default()).unwrap();
    assert!(again.is_empty());
    assert_eq!(records(&service), before + 1);
}

#[test]
fn dry_run_reports_without_writing() {
    let (_dir, service) = proof();
    service
        .claim_node(&NodeId::root(), "prover", TimeDelta::nanoseconds(1))
        .unwrap();
    thread::sleep(Duration::from_millis(10));
    let before = records(&service);

    let report = service
        .reap(ReapOptions {
            dry_run: true,
            all: false,
        })
        .unwrap();
    assert_eq!(report.node_ids, vec![NodeId::root()]);
    assert_eq!(records(&service), before);
    assert_eq!(service.status().unwrap().stale_claims, 1);
}

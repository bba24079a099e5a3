//! Job partitioning and ranking over a live proof.

use proofwork_engine::{JobKind, PriorityReason};
use proofwork_types::{ChallengeTarget, NodeId, Severity};

use crate::common::{grow, hour, id, proof};

#[test]
fn jobs_split_by_challenges_and_rank_by_severity() {
    let (_dir, service) = proof();
    grow(&service, &["1.1", "1.2", "1.3", "1.4", "1.5", "1.1.1"]);

    let raise = |node: &str, severity: Severity| {
        service
            .raise_challenge(&id(node), ChallengeTarget::Inference, severity, "why?", "verifier")
            .unwrap();
    };
    raise("1.1", Severity::Major);
    raise("1.2", Severity::Critical);
    raise("1.1.1", Severity::Critical);
    raise("1.1.1", Severity::Major);
    raise("1.5", Severity::Minor);
    service.claim_node(&id("1.4"), "prover", hour()).unwrap();

    let jobs = service.find_jobs().unwrap();

    let prover: Vec<String> = jobs.prover.iter().map(|j| j.node_id.to_string()).collect();
    assert_eq!(prover, ["1.1.1", "1.2", "1.1", "1.5"]);
    assert_eq!(jobs.prover[0].critical, 1);
    assert_eq!(jobs.prover[0].major, 1);
    assert_eq!(jobs.prover[0].reason, PriorityReason::CriticalChallenge);
    assert_eq!(jobs.prover[2].reason, PriorityReason::MajorChallenge);
    assert_eq!(jobs.prover[3].reason, PriorityReason::ShallowestDepth);

    // 1.4 is claimed, so it is nobody's job right now.
    let verifier: Vec<String> = jobs.verifier.iter().map(|j| j.node_id.to_string()).collect();
    assert_eq!(verifier, ["1", "1.3"]);
    assert_eq!(
        jobs.recommended(JobKind::Verifier).map(|j| j.node_id.clone()),
        Some(NodeId::root())
    );
}

#[test]
fn closed_nodes_and_blocked_nodes_offer_no_jobs() {
    let (_dir, service) = proof();
    grow(&service, &["1.1"]);
    service
        .create_node(
            &id("1.2"),
            &crate::common::claim("needs 1.1").with_validation_deps(vec![id("1.1")]),
            None,
        )
        .unwrap();
    service.refute_node(&id("1.1"), "false for n = 0", None).unwrap();

    let jobs = service.find_jobs().unwrap();
    assert!(jobs.prover.is_empty());
    let verifier: Vec<String> = jobs.verifier.iter().map(|j| j.node_id.to_string()).collect();
    assert_eq!(verifier, ["1"]);
}

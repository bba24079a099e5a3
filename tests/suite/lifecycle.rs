//! End-to-end node lifecycle: claim, refine, challenge, accept.

use proofwork_engine::{ServiceError, TaintState};
use proofwork_types::{ChallengeTarget, EpistemicState, NodeId, Severity, WorkflowState};

use crate::common::{claim, grow, hour, id, proof, records};

#[test]
fn prover_verifier_round_trip_completes_the_proof() {
    let (_dir, service) = proof();
    let root = NodeId::root();

    service.claim_node(&root, "prover-a", hour()).unwrap();
    let base = service
        .refine(&root, "prover-a", &claim("n = 1: 1 = 1^2"))
        .unwrap();
    let step = service
        .refine(
            &root,
            "prover-a",
            &claim("if it holds for n it holds for n + 1").with_validation_deps(vec![base.clone()]),
        )
        .unwrap();
    assert_eq!(base.to_string(), "1.1");
    assert_eq!(step.to_string(), "1.2");
    service.release_node(&root, "prover-a").unwrap();

    assert_eq!(
        service.get_node(&step).unwrap().workflow_state,
        WorkflowState::Blocked
    );

    let challenge = service
        .raise_challenge(&base, ChallengeTarget::Gap, Severity::Major, "state the base case", "verifier-b")
        .unwrap();
    assert!(matches!(
        service.accept_node(&base, Some("verifier-b")),
        Err(ServiceError::BlockingChallenges { .. })
    ));

    service
        .resolve_challenge(&challenge, "base case spelled out", "prover-a")
        .unwrap();
    service.accept_node(&base, Some("verifier-b")).unwrap();
    assert_eq!(
        service.get_node(&step).unwrap().workflow_state,
        WorkflowState::Available
    );

    service.accept_nodes_bulk(&[step, root.clone()], Some("verifier-b")).unwrap();

    let status = service.status().unwrap();
    assert_eq!(status.epistemic.validated, 3);
    assert!((status.progress - 1.0).abs() < f64::EPSILON);
    assert!(status.is_complete());
    assert_eq!(status.open_challenges.total(), 0);

    let taint = service.taint().unwrap();
    assert!(taint.values().all(|t| *t == TaintState::Clean));
}

#[test]
fn blocking_challenge_on_claimed_root_lifts_after_resolution() {
    let (_dir, service) = proof();
    let root = NodeId::root();

    service.claim_node(&root, "prover-1", hour()).unwrap();
    let child = service.refine(&root, "prover-1", &claim("odd numbers step by 2")).unwrap();
    assert_eq!(child, id("1.1"));

    let challenge = service
        .raise_challenge(&root, ChallengeTarget::Gap, Severity::Major, "induction step missing", "verifier-1")
        .unwrap();
    match service.accept_node(&root, None) {
        Err(ServiceError::BlockingChallenges { challenges, .. }) => {
            assert_eq!(challenges, vec![challenge.clone()]);
        }
        other => panic!("expected blocking challenge error, got {other:?}"),
    }

    service.resolve_challenge(&challenge, "step added as 1.1", "prover-1").unwrap();
    service.accept_node(&root, None).unwrap();
    assert_eq!(
        service.get_node(&root).unwrap().epistemic_state,
        EpistemicState::Validated
    );
}

#[test]
fn admitted_node_taints_its_dependents() {
    let (_dir, service) = proof();
    grow(&service, &["1.1"]);
    service
        .create_node(
            &id("1.2"),
            &claim("uses 1.1").with_validation_deps(vec![id("1.1")]),
            None,
        )
        .unwrap();

    service.admit_node(&id("1.1"), None, Some("textbook fact")).unwrap();
    service.accept_node(&id("1.2"), None).unwrap();
    service.accept_node(&NodeId::root(), None).unwrap();

    let taint = service.taint().unwrap();
    assert_eq!(taint[&NodeId::root()], TaintState::Clean);
    assert_eq!(taint[&id("1.1")], TaintState::SelfAdmitted);
    assert_eq!(taint[&id("1.2")], TaintState::Tainted);
}

#[test]
fn rejected_commands_leave_the_ledger_untouched() {
    let (_dir, service) = proof();
    grow(&service, &["1.1"]);
    service.claim_node(&id("1.1"), "prover-a", hour()).unwrap();
    let before = records(&service);

    assert!(service.claim_node(&id("1.1"), "prover-b", hour()).is_err());
    assert!(service.release_node(&id("1.1"), "prover-b").is_err());
    assert!(service.accept_node(&id("1.1"), Some("verifier-b")).is_err());
    assert!(service.create_node(&id("1.1"), &claim("dup"), None).is_err());
    assert!(service.create_node(&id("1.2"), &claim("cites def:missing"), None).is_err());
    assert!(service.extract_lemma(&id("1.1"), None, None).is_err());

    assert_eq!(records(&service), before);
}

#[test]
fn lemma_extraction_records_hash_and_source() {
    let (_dir, service) = proof();
    service
        .add_definition("odd", "n = 2k + 1 for some integer k", "alice")
        .unwrap();
    service
        .create_node(&id("1.1"), &claim("the k-th def:odd number is 2k - 1"), None)
        .unwrap();
    service.accept_node(&id("1.1"), None).unwrap();

    let lemma_id = service
        .extract_lemma(&id("1.1"), None, Some("by induction on k"))
        .unwrap();
    let state = service.load_state().unwrap();
    let lemma = state.get_lemma(&lemma_id).unwrap();
    assert_eq!(lemma.source_node, id("1.1"));
    assert_eq!(lemma.content_hash.len(), 64);
    assert_eq!(
        lemma.content_hash,
        proofwork_engine::content_hash("the k-th def:odd number is 2k - 1", Some("by induction on k"))
    );
    assert_eq!(
        state.get_node(&id("1.1")).unwrap().epistemic_state,
        EpistemicState::Validated
    );
}

//! Unit tests for the engine crate.

use std::thread;
use std::time::Duration;

use chrono::TimeDelta;
use tempfile::{TempDir, tempdir};

use proofwork_types::{
    ChallengeTarget, EpistemicState, Inference, NodeId, NodeType, Severity, WorkflowState,
};

use super::*;

fn id(s: &str) -> NodeId {
    NodeId::parse(s).unwrap()
}

fn hour() -> TimeDelta {
    TimeDelta::hours(1)
}

fn draft(statement: &str) -> NodeDraft {
    NodeDraft::new(NodeType::Claim, statement, Inference::ModusPonens)
}

fn init_with(limits: Limits) -> (TempDir, ProofService) {
    let dir = tempdir().unwrap();
    let service =
        ProofService::init(dir.path().join("proof"), "Every group of prime order is cyclic", "prover-1", limits)
            .unwrap();
    (dir, service)
}

fn init() -> (TempDir, ProofService) {
    init_with(Limits::default())
}

fn ledger_len(service: &ProofService) -> usize {
    service.ledger().count().unwrap()
}

// ── init ─────────────────────────────────────────────────────

#[test]
fn init_creates_root_and_metadata() {
    let (_dir, service) = init();
    let state = service.load_state().unwrap();
    assert_eq!(state.conjecture(), Some("Every group of prime order is cyclic"));
    let root = state.get_node(&NodeId::root()).unwrap();
    assert_eq!(root.statement, "Every group of prime order is cyclic");
    assert_eq!(root.epistemic_state, EpistemicState::Pending);
    assert_eq!(root.workflow_state, WorkflowState::Available);
    assert_eq!(ledger_len(&service), 2);
    assert!(service.dir().join("meta.toml").is_file());

    let reopened = ProofService::new(service.dir()).unwrap();
    assert_eq!(reopened.limits(), Limits::default());
    assert_eq!(reopened.load_state().unwrap(), state);
}

#[test]
fn init_twice_is_rejected() {
    let (_dir, service) = init();
    let err = ProofService::init(service.dir(), "Q", "prover-2", Limits::default()).unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyInitialized { .. }));
    assert_eq!(ledger_len(&service), 2);
}

#[test]
fn commands_on_uninitialized_dir_fail() {
    let dir = tempdir().unwrap();
    let service = ProofService::new(dir.path()).unwrap();
    assert!(matches!(
        service.load_state(),
        Err(ServiceError::NotInitialized { .. })
    ));
    assert!(matches!(
        service.claim_node(&NodeId::root(), "prover-1", hour()),
        Err(ServiceError::NotInitialized { .. })
    ));
}

#[test]
fn init_rejects_blank_conjecture() {
    let dir = tempdir().unwrap();
    let err = ProofService::init(dir.path(), "  ", "prover-1", Limits::default()).unwrap_err();
    assert_eq!(err.to_string(), "conjecture must not be empty or whitespace");
    assert!(!dir.path().join("ledger").exists());
}

#[test]
fn init_writes_limits_before_the_ledger() {
    let limits = Limits {
        max_depth: 4,
        max_children: 3,
        ..Limits::default()
    };
    let (_dir, service) = init_with(limits);
    assert!(service.ledger().batch_path(1).is_file());
    assert!(!service.ledger().batch_path(2).exists());

    let reopened = ProofService::new(service.dir()).unwrap();
    assert_eq!(reopened.limits(), limits);
}

#[test]
fn init_over_existing_metadata_leaves_ledger_alone() {
    let dir = tempdir().unwrap();
    let header = proofwork_config::ProofHeader {
        conjecture: "P".to_owned(),
        author: "prover-1".to_owned(),
        created_at: chrono::Utc::now(),
    };
    proofwork_config::ProofMeta::new(header, Limits::default())
        .save_new(dir.path())
        .unwrap();

    let err = ProofService::init(dir.path(), "Q", "prover-2", Limits::default()).unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyInitialized { .. }));
    assert!(!dir.path().join("ledger").exists());
}

#[test]
fn failed_init_removes_its_metadata() {
    let dir = tempdir().unwrap();
    // A plain file where the ledger directory belongs.
    std::fs::write(dir.path().join("ledger"), b"").unwrap();

    assert!(ProofService::init(dir.path(), "Q", "prover-1", Limits::default()).is_err());
    assert!(!dir.path().join("meta.toml").exists());

    std::fs::remove_file(dir.path().join("ledger")).unwrap();
    let service = ProofService::init(dir.path(), "Q", "prover-1", Limits::default()).unwrap();
    assert_eq!(ledger_len(&service), 2);
}

// ── node creation ────────────────────────────────────────────

#[test]
fn create_node_checks_tree_shape() {
    let limits = Limits {
        max_depth: 3,
        max_children: 2,
        ..Limits::default()
    };
    let (_dir, service) = init_with(limits);

    service.create_node(&id("1.1"), &draft("a"), None).unwrap();
    service.create_node(&id("1.1.1"), &draft("b"), None).unwrap();

    let err = service.create_node(&id("1.1"), &draft("again"), None).unwrap_err();
    assert!(matches!(err, ServiceError::NodeExists(_)));

    let err = service.create_node(&id("1.5.1"), &draft("orphan"), None).unwrap_err();
    assert!(matches!(err, ServiceError::ParentNotFound { .. }));

    let err = service.create_node(&id("1.1.1.1"), &draft("deep"), None).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::DepthExceeded {
            depth: 4,
            max: 3,
            ..
        }
    ));
    assert!(err.to_string().contains("add breadth instead"));

    service.create_node(&id("1.2"), &draft("c"), None).unwrap();
    let err = service.create_node(&id("1.3"), &draft("d"), None).unwrap_err();
    assert!(matches!(err, ServiceError::TooManyChildren { max: 2, .. }));

    let err = service.create_node(&id("1.1.2"), &draft("   "), None).unwrap_err();
    assert!(matches!(err, ServiceError::EmptyField(_)));

    assert_eq!(service.load_state().unwrap().node_count(), 4);
}

#[test]
fn create_node_validates_citations_and_dependencies() {
    let (_dir, service) = init();

    let err = service
        .create_node(&id("1.1"), &draft("by def:cyclic and ext:Lagrange"), None)
        .unwrap_err();
    match err {
        ServiceError::UnknownCitation { kind, name } => {
            assert_eq!(kind, "definition");
            assert_eq!(name, "cyclic");
        }
        other => panic!("unexpected error: {other}"),
    }

    service
        .add_definition("cyclic", "generated by one element", "prover-1")
        .unwrap();
    let err = service
        .create_node(&id("1.1"), &draft("by def:cyclic and ext:Lagrange"), None)
        .unwrap_err();
    assert!(matches!(err, ServiceError::UnknownCitation { kind: "external", .. }));

    service
        .add_external("Lagrange", "Herstein, Topics in Algebra", "Subgroup order divides group order", "prover-1")
        .unwrap();
    service
        .create_node(&id("1.1"), &draft("by def:cyclic and ext:Lagrange"), None)
        .unwrap();

    let err = service
        .create_node(&id("1.2"), &draft("x").with_dependencies(vec![id("1.9")]), None)
        .unwrap_err();
    assert!(matches!(err, ServiceError::UnknownDependency { .. }));

    let err = service
        .create_node(&id("1.2"), &draft("x").with_validation_deps(vec![id("1.2")]), None)
        .unwrap_err();
    assert!(matches!(err, ServiceError::SelfDependency(_)));
}

#[test]
fn refine_requires_parent_claim_and_picks_next_index() {
    let (_dir, service) = init();
    let root = NodeId::root();

    let err = service.refine(&root, "prover-1", &draft("step")).unwrap_err();
    assert!(matches!(err, ServiceError::NotClaimed(_)));

    service.claim_node(&root, "prover-1", hour()).unwrap();
    let err = service.refine(&root, "prover-2", &draft("step")).unwrap_err();
    assert!(matches!(err, ServiceError::ClaimedByOther { .. }));

    assert_eq!(service.refine(&root, "prover-1", &draft("a")).unwrap(), id("1.1"));
    service.create_node(&id("1.5"), &draft("explicit"), None).unwrap();
    assert_eq!(service.refine(&root, "prover-1", &draft("b")).unwrap(), id("1.6"));

    let node = service.get_node(&id("1.6")).unwrap();
    assert_eq!(node.created_by.as_deref(), Some("prover-1"));
}

// ── claims ───────────────────────────────────────────────────

#[test]
fn claim_rejects_bad_input_and_live_locks() {
    let (_dir, service) = init();
    let root = NodeId::root();

    assert!(matches!(
        service.claim_node(&root, " ", hour()),
        Err(ServiceError::EmptyField(_))
    ));
    assert!(matches!(
        service.claim_node(&root, "prover-1", TimeDelta::zero()),
        Err(ServiceError::InvalidTimeout { .. })
    ));
    assert!(matches!(
        service.claim_node(&root, "prover-1", TimeDelta::seconds(-5)),
        Err(ServiceError::InvalidTimeout { seconds: -5 })
    ));
    assert!(matches!(
        service.claim_node(&id("1.4"), "prover-1", hour()),
        Err(ServiceError::NodeNotFound(_))
    ));

    let claim = service.claim_node(&root, "prover-1", hour()).unwrap();
    assert_eq!(claim.owner, "prover-1");

    let err = service.claim_node(&root, "prover-2", hour()).unwrap_err();
    match err {
        ServiceError::AlreadyClaimed { owner, expires_at, .. } => {
            assert_eq!(owner, "prover-1");
            assert_eq!(expires_at, claim.expires_at);
        }
        other => panic!("unexpected error: {other}"),
    }
    // The owner cannot double-claim either; refresh is the way to extend.
    assert!(service.claim_node(&root, "prover-1", hour()).is_err());
}

#[test]
fn expired_claim_can_be_taken_over() {
    let (_dir, service) = init();
    let root = NodeId::root();

    service
        .claim_node(&root, "prover-1", TimeDelta::nanoseconds(1))
        .unwrap();
    thread::sleep(Duration::from_millis(10));

    let claim = service.claim_node(&root, "prover-2", hour()).unwrap();
    assert_eq!(claim.owner, "prover-2");

    let records = service.ledger().read_all().unwrap();
    match &records.last().unwrap().event {
        proofwork_types::Event::NodeClaimed { previous_owner, .. } => {
            assert_eq!(previous_owner.as_deref(), Some("prover-1"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn refresh_and_release_require_the_owner() {
    let (_dir, service) = init();
    let root = NodeId::root();

    assert!(matches!(
        service.refresh_claim(&root, "prover-1", hour()),
        Err(ServiceError::NotClaimed(_))
    ));

    let first = service.claim_node(&root, "prover-1", TimeDelta::minutes(1)).unwrap();
    let refreshed = service.refresh_claim(&root, "prover-1", hour()).unwrap();
    assert!(refreshed.expires_at > first.expires_at);

    assert!(matches!(
        service.refresh_claim(&root, "prover-2", hour()),
        Err(ServiceError::ClaimedByOther { .. })
    ));
    assert!(matches!(
        service.release_node(&root, "prover-2"),
        Err(ServiceError::ClaimedByOther { .. })
    ));

    service.release_node(&root, "prover-1").unwrap();
    let node = service.get_node(&root).unwrap();
    assert_eq!(node.workflow_state, WorkflowState::Available);
    assert!(node.claim.is_none());
}

#[test]
fn blocked_node_cannot_be_claimed_until_deps_validate() {
    let (_dir, service) = init();
    service.create_node(&id("1.1"), &draft("lemma"), None).unwrap();
    service
        .create_node(&id("1.2"), &draft("uses lemma").with_validation_deps(vec![id("1.1")]), None)
        .unwrap();

    assert_eq!(
        service.get_node(&id("1.2")).unwrap().workflow_state,
        WorkflowState::Blocked
    );
    assert!(matches!(
        service.claim_node(&id("1.2"), "prover-1", hour()),
        Err(ServiceError::NotAvailable {
            state: WorkflowState::Blocked,
            ..
        })
    ));
    assert!(matches!(
        service.accept_node(&id("1.2"), None),
        Err(ServiceError::UnmetValidationDeps { .. })
    ));

    service.accept_node(&id("1.1"), None).unwrap();
    assert_eq!(
        service.get_node(&id("1.2")).unwrap().workflow_state,
        WorkflowState::Available
    );
    service.claim_node(&id("1.2"), "prover-1", hour()).unwrap();
}

// ── acceptance ───────────────────────────────────────────────

#[test]
fn blocking_challenge_gates_acceptance() {
    let (_dir, service) = init();
    let root = NodeId::root();

    let minor = service
        .raise_challenge(&root, ChallengeTarget::Statement, Severity::Minor, "wording", "verifier-1")
        .unwrap();
    let major = service
        .raise_challenge(&root, ChallengeTarget::Gap, Severity::Major, "missing step", "verifier-1")
        .unwrap();
    assert_ne!(minor, major);

    let before = ledger_len(&service);
    match service.accept_node(&root, None).unwrap_err() {
        ServiceError::BlockingChallenges { challenges, .. } => {
            assert_eq!(challenges, vec![major.clone()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ledger_len(&service), before, "failed accept must not append");

    service
        .resolve_challenge(&major, "added the missing step", "prover-1")
        .unwrap();
    service
        .accept_node_with_note(&root, Some("verifier-1"), "checked by hand")
        .unwrap();

    let node = service.get_node(&root).unwrap();
    assert_eq!(node.epistemic_state, EpistemicState::Validated);
    assert_eq!(node.verdict_note.as_deref(), Some("checked by hand"));

    assert!(matches!(
        service.accept_node(&root, None),
        Err(ServiceError::InvalidTransition { .. })
    ));
}

#[test]
fn acceptance_respects_live_claims_of_other_agents() {
    let (_dir, service) = init();
    let root = NodeId::root();
    service.claim_node(&root, "prover-1", hour()).unwrap();

    assert!(matches!(
        service.accept_node(&root, Some("verifier-1")),
        Err(ServiceError::ClaimedByOther { .. })
    ));
    service.accept_node(&root, Some("prover-1")).unwrap();
    let node = service.get_node(&root).unwrap();
    assert_eq!(node.workflow_state, WorkflowState::Available);
    assert!(node.claim.is_none());
}

#[test]
fn bulk_accept_is_all_or_nothing() {
    let (_dir, service) = init();
    service.create_node(&id("1.1"), &draft("a"), None).unwrap();
    service.create_node(&id("1.2"), &draft("b"), None).unwrap();
    service
        .create_node(&id("1.3"), &draft("c").with_validation_deps(vec![id("1.1")]), None)
        .unwrap();
    service
        .raise_challenge(&id("1.2"), ChallengeTarget::Inference, Severity::Critical, "wrong rule", "v")
        .unwrap();

    let before = ledger_len(&service);
    let err = service
        .accept_nodes_bulk(&[id("1.1"), id("1.2"), id("1.3")], None)
        .unwrap_err();
    assert!(matches!(err, ServiceError::BlockingChallenges { .. }));
    assert_eq!(ledger_len(&service), before);
    assert_eq!(
        service.get_node(&id("1.1")).unwrap().epistemic_state,
        EpistemicState::Pending
    );

    assert!(matches!(
        service.accept_nodes_bulk(&[], None),
        Err(ServiceError::EmptyBatch)
    ));
    assert!(matches!(
        service.accept_nodes_bulk(&[id("1.1"), id("1.1")], None),
        Err(ServiceError::DuplicateInBatch(_))
    ));

    // 1.3 depends on 1.1, which is accepted earlier in the same batch.
    service
        .accept_nodes_bulk(&[id("1.1"), id("1.3")], None)
        .unwrap();
    assert_eq!(ledger_len(&service), before + 2);
    let first = before as u64 + 1;
    assert!(service.ledger().batch_path(first).is_file());
    assert!(!service.ledger().batch_path(first + 1).exists());
    let state = service.load_state().unwrap();
    assert!(state.get_node(&id("1.1")).unwrap().epistemic_state.is_complete());
    assert!(state.get_node(&id("1.3")).unwrap().epistemic_state.is_complete());
}

#[test]
fn admit_refute_and_archive_follow_the_lifecycle() {
    let (_dir, service) = init();
    service.create_node(&id("1.1"), &draft("a"), None).unwrap();
    service.create_node(&id("1.2"), &draft("b"), None).unwrap();
    service.create_node(&id("1.3"), &draft("c"), None).unwrap();

    service.admit_node(&id("1.1"), None, Some("standard fact")).unwrap();
    service.refute_node(&id("1.2"), "counterexample n = 2", None).unwrap();
    service.archive_node(&id("1.3"), "superseded", None).unwrap();

    let state = service.load_state().unwrap();
    assert_eq!(state.get_node(&id("1.1")).unwrap().epistemic_state, EpistemicState::Admitted);
    assert_eq!(state.get_node(&id("1.2")).unwrap().epistemic_state, EpistemicState::Refuted);
    assert_eq!(state.get_node(&id("1.3")).unwrap().epistemic_state, EpistemicState::Archived);

    // Admitted can still be archived; refuted and archived are terminal.
    service.archive_node(&id("1.1"), "no longer needed", None).unwrap();
    assert!(matches!(
        service.archive_node(&id("1.2"), "x", None),
        Err(ServiceError::InvalidTransition { .. })
    ));
    assert!(matches!(
        service.create_node(&id("1.2.1"), &draft("under refuted"), None),
        Err(ServiceError::ParentClosed { .. })
    ));
    assert!(matches!(
        service.refute_node(&id("1.3"), " ", None),
        Err(ServiceError::EmptyField(_))
    ));
}

#[test]
fn blank_agent_is_rejected_before_append() {
    let (_dir, service) = init();
    service.create_node(&id("1.1"), &draft("a"), None).unwrap();
    service.claim_node(&id("1.1"), "prover-1", hour()).unwrap();
    let before = ledger_len(&service);

    let blank = Some("  ");
    for result in [
        service.accept_node(&id("1.1"), blank),
        service.accept_node_with_note(&id("1.1"), blank, "checked"),
        service.admit_node(&id("1.1"), blank, None),
        service.accept_nodes_bulk(&[id("1.1")], blank),
        service.refute_node(&id("1.1"), "counterexample", blank),
        service.archive_node(&id("1.1"), "superseded", blank),
    ] {
        assert!(matches!(result, Err(ServiceError::EmptyField(_))), "{result:?}");
    }
    assert_eq!(ledger_len(&service), before);
    assert_eq!(
        service.get_node(&id("1.1")).unwrap().epistemic_state,
        EpistemicState::Pending
    );
}

// ── challenges ───────────────────────────────────────────────

#[test]
fn challenge_lifecycle_is_one_way() {
    let (_dir, service) = init();
    let root = NodeId::root();
    let ch = service
        .raise_challenge(&root, ChallengeTarget::Scope, Severity::Note, "typo", "verifier-1")
        .unwrap();
    assert!(ch.as_str().starts_with("ch-"));

    service.withdraw_challenge(&ch, "verifier-1").unwrap();
    assert!(matches!(
        service.resolve_challenge(&ch, "fixed", "prover-1"),
        Err(ServiceError::ChallengeClosed { .. })
    ));
    assert!(matches!(
        service.withdraw_challenge(&proofwork_types::ChallengeId::new("ch-missing"), "v"),
        Err(ServiceError::ChallengeNotFound(_))
    ));

    service.accept_node(&root, None).unwrap();
    assert!(matches!(
        service.raise_challenge(&root, ChallengeTarget::Gap, Severity::Major, "late", "v"),
        Err(ServiceError::NotPending { .. })
    ));
}

// ── side records ─────────────────────────────────────────────

#[test]
fn definitions_resolve_pending_requests() {
    let (_dir, service) = init();
    let pending = service
        .request_definition("prime_order", &NodeId::root(), "prover-1")
        .unwrap();
    assert!(
        service
            .load_state()
            .unwrap()
            .get_pending_def(&pending)
            .unwrap()
            .is_pending()
    );

    assert!(matches!(
        service.add_definition("9lives", "x", "prover-1"),
        Err(ServiceError::InvalidName { .. })
    ));
    service
        .add_definition("prime_order", "|G| is prime", "prover-1")
        .unwrap();
    assert!(matches!(
        service.add_definition("prime_order", "again", "prover-1"),
        Err(ServiceError::DefinitionExists(_))
    ));
    assert!(matches!(
        service.request_definition("prime_order", &NodeId::root(), "prover-1"),
        Err(ServiceError::DefinitionExists(_))
    ));

    let state = service.load_state().unwrap();
    assert!(!state.get_pending_def(&pending).unwrap().is_pending());
    assert_eq!(service.status().unwrap().pending_defs, 0);
}

#[test]
fn lemmas_come_from_validated_nodes_only() {
    let (_dir, service) = init();
    service.create_node(&id("1.1"), &draft("x + 0 = x"), None).unwrap();

    assert!(matches!(
        service.extract_lemma(&id("1.1"), None, None),
        Err(ServiceError::LemmaSourceNotValidated { .. })
    ));

    service.accept_node(&id("1.1"), None).unwrap();
    let first = service.extract_lemma(&id("1.1"), None, None).unwrap();
    assert_eq!(first.as_str(), "L1");
    assert!(matches!(
        service.extract_lemma(&id("1.1"), None, None),
        Err(ServiceError::DuplicateLemma { .. })
    ));
    let second = service
        .extract_lemma(&id("1.1"), Some("additive identity"), Some("by axiom"))
        .unwrap();
    assert_eq!(second.as_str(), "L2");

    let state = service.load_state().unwrap();
    let lemma = state.get_lemma(&first).unwrap();
    assert_eq!(lemma.statement, "x + 0 = x");
    assert_eq!(lemma.content_hash, content_hash("x + 0 = x", None));
}

// ── reap / queries ───────────────────────────────────────────

#[test]
fn dry_run_reap_appends_nothing() {
    let (_dir, service) = init();
    service
        .claim_node(&NodeId::root(), "prover-1", TimeDelta::nanoseconds(1))
        .unwrap();
    thread::sleep(Duration::from_millis(10));
    let before = ledger_len(&service);

    let report = service
        .reap(ReapOptions {
            dry_run: true,
            all: false,
        })
        .unwrap();
    assert_eq!(report.node_ids, vec![NodeId::root()]);
    assert!(report.dry_run);
    assert_eq!(ledger_len(&service), before);
    assert_eq!(
        service.get_node(&NodeId::root()).unwrap().workflow_state,
        WorkflowState::Claimed
    );
}

#[test]
fn forced_reap_releases_live_claims() {
    let (_dir, service) = init();
    service.create_node(&id("1.1"), &draft("a"), None).unwrap();
    service.claim_node(&NodeId::root(), "prover-1", hour()).unwrap();
    service.claim_node(&id("1.1"), "prover-2", hour()).unwrap();

    assert!(service.reap(ReapOptions::default()).unwrap().is_empty());

    let report = service
        .reap(ReapOptions {
            dry_run: false,
            all: true,
        })
        .unwrap();
    assert_eq!(report.node_ids, vec![NodeId::root(), id("1.1")]);
    assert_eq!(report.reason, proofwork_types::ReleaseReason::Forced);
    assert_eq!(service.status().unwrap().workflow.claimed, 0);
}

#[test]
fn cached_state_matches_full_reload() {
    let (_dir, service) = init();
    service.create_node(&id("1.1"), &draft("a"), None).unwrap();
    let incremental = service.load_state().unwrap();

    let other = ProofService::new(service.dir()).unwrap();
    other.claim_node(&id("1.1"), "prover-2", hour()).unwrap();

    let incremental_after = service.load_state().unwrap();
    assert_ne!(incremental, incremental_after);
    assert_eq!(incremental_after, service.reload().unwrap());
    assert_eq!(incremental_after, other.load_state().unwrap());
}

#[test]
fn jobs_and_taint_read_current_state() {
    let (_dir, service) = init();
    service.create_node(&id("1.1"), &draft("a"), None).unwrap();
    service
        .raise_challenge(&id("1.1"), ChallengeTarget::Domain, Severity::Critical, "n = 0?", "v")
        .unwrap();

    let jobs = service.find_jobs().unwrap();
    assert_eq!(jobs.recommended(JobKind::Prover).unwrap().node_id, id("1.1"));
    assert_eq!(
        jobs.recommended(JobKind::Prover).unwrap().reason,
        PriorityReason::CriticalChallenge
    );
    assert_eq!(jobs.recommended(JobKind::Verifier).unwrap().node_id, NodeId::root());

    let taint = service.taint().unwrap();
    assert_eq!(taint[&NodeId::root()], TaintState::Unresolved);
}

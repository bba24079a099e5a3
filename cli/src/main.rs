//! proofwork CLI - thin command dispatch over [`proofwork_engine::ProofService`].
//!
//! The proof directory comes from `--dir`, then `$PROOFWORK_DIR`, then the
//! current directory. Command output goes to stdout; logs go to stderr and
//! are controlled by `RUST_LOG` (default `warn`).

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::TimeDelta;
use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use proofwork_engine::{
    JobKind, JobResult, Limits, NodeDraft, ProofService, ReapOptions, StatusReport,
};
use proofwork_types::{ChallengeId, ChallengeTarget, Inference, NodeId, NodeType, Severity};

#[derive(Parser)]
#[command(name = "proofwork", version)]
#[command(about = "Coordinate provers and verifiers on a shared proof tree")]
struct Cli {
    /// Proof directory
    #[arg(long, global = true, env = "PROOFWORK_DIR", default_value = ".")]
    dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new proof of a conjecture
    Init {
        conjecture: String,
        #[arg(long)]
        author: String,
    },
    #[command(flatten)]
    Proof(ProofCommand),
}

/// Commands that operate on an initialized proof.
#[derive(Subcommand)]
enum ProofCommand {
    /// Summarize node states, challenges and claims
    Status,
    /// Show one node
    Show { node: NodeId },
    /// List prover and verifier jobs, best first
    Jobs,
    /// Show the taint of every node
    Taint,
    /// Create a node at an explicit address
    Create {
        node: NodeId,
        #[command(flatten)]
        draft: DraftArgs,
        #[arg(long)]
        author: Option<String>,
    },
    /// Add the next child under a node you hold claimed
    Refine {
        parent: NodeId,
        owner: String,
        #[command(flatten)]
        draft: DraftArgs,
    },
    /// Claim a pending node
    Claim {
        node: NodeId,
        owner: String,
        /// Claim length in seconds; defaults to the proof's claim timeout
        #[arg(long, value_name = "SECS")]
        timeout: Option<i64>,
    },
    /// Extend your claim on a node
    Refresh {
        node: NodeId,
        owner: String,
        /// Claim length in seconds; defaults to the proof's claim timeout
        #[arg(long, value_name = "SECS")]
        timeout: Option<i64>,
    },
    /// Give up your claim on a node
    Release { node: NodeId, owner: String },
    /// Accept one node, or several as a single all-or-nothing batch
    Accept {
        #[arg(required = true)]
        nodes: Vec<NodeId>,
        #[arg(long)]
        agent: Option<String>,
        /// Verdict note; single node only
        #[arg(long)]
        note: Option<String>,
    },
    /// Admit a node without proof
    Admit {
        node: NodeId,
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Mark a node refuted
    Refute {
        node: NodeId,
        reason: String,
        #[arg(long)]
        agent: Option<String>,
    },
    /// Archive a node
    Archive {
        node: NodeId,
        reason: String,
        #[arg(long)]
        agent: Option<String>,
    },
    /// Raise a challenge against a node
    Challenge {
        node: NodeId,
        #[arg(value_parser = one_of::<ChallengeTarget>(ChallengeTarget::ALL))]
        target: ChallengeTarget,
        #[arg(value_parser = one_of::<Severity>(Severity::ALL))]
        severity: Severity,
        reason: String,
        #[arg(long)]
        by: String,
    },
    /// Resolve an open challenge
    Resolve {
        challenge: String,
        resolution: String,
        #[arg(long)]
        by: String,
    },
    /// Withdraw an open challenge
    Withdraw {
        challenge: String,
        #[arg(long)]
        by: String,
    },
    /// Add a definition
    Def {
        name: String,
        content: String,
        #[arg(long)]
        by: String,
    },
    /// Ask for a definition a node needs
    RequestDef {
        term: String,
        node: NodeId,
        #[arg(long)]
        by: String,
    },
    /// Add an external reference
    Ext {
        name: String,
        source: String,
        statement: String,
        #[arg(long)]
        by: String,
    },
    /// Extract a lemma from a validated node
    Lemma {
        node: NodeId,
        #[arg(long)]
        statement: Option<String>,
        #[arg(long)]
        proof: Option<String>,
    },
    /// Release expired claims
    Reap {
        /// Report what would be released without appending anything
        #[arg(long)]
        dry_run: bool,
        /// Release live claims too
        #[arg(long)]
        all: bool,
    },
}

/// Type, inference and statement of a new node, plus its dependencies.
#[derive(Args)]
struct DraftArgs {
    #[arg(value_parser = one_of::<NodeType>(NodeType::ALL))]
    node_type: NodeType,
    #[arg(value_parser = one_of::<Inference>(Inference::ALL))]
    inference: Inference,
    statement: String,
    /// Comma-separated node ids
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    deps: Vec<NodeId>,
    /// Comma-separated node ids that must be validated first
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    validation_deps: Vec<NodeId>,
}

impl DraftArgs {
    fn into_draft(self) -> NodeDraft {
        NodeDraft::new(self.node_type, self.statement, self.inference)
            .with_dependencies(self.deps)
            .with_validation_deps(self.validation_deps)
    }
}

/// Parser that lists `names` in help and errors, then converts with `FromStr`.
fn one_of<T>(names: &'static [&'static str]) -> impl TypedValueParser<Value = T>
where
    T: FromStr + Clone + Send + Sync + 'static,
    T::Err: Into<Box<dyn Error + Send + Sync + 'static>>,
{
    PossibleValuesParser::new(names.iter().copied()).try_map(|name| name.parse::<T>())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let dir = cli.dir;
    match cli.command {
        Commands::Init { conjecture, author } => {
            ProofService::init(&dir, &conjecture, &author, Limits::default())
                .with_context(|| format!("failed to initialize proof in {}", dir.display()))?;
            println!("Initialized proof in {}", dir.display());
            Ok(())
        }
        Commands::Proof(command) => {
            let service = ProofService::new(&dir)
                .with_context(|| format!("failed to open proof in {}", dir.display()))?;
            run(&service, command)
        }
    }
}

fn claim_length(service: &ProofService, timeout: Option<i64>) -> TimeDelta {
    timeout.map_or_else(|| service.default_claim_timeout(), TimeDelta::seconds)
}

fn run(service: &ProofService, command: ProofCommand) -> Result<()> {
    match command {
        ProofCommand::Status => print_status(&service.status()?),
        ProofCommand::Show { node: id } => {
            let node = service.get_node(&id)?;
            println!("{} [{}] {}", node.id, node.node_type, node.statement);
            println!("  inference: {}", node.inference);
            println!("  state:     {} / {}", node.epistemic_state, node.workflow_state);
            if let Some(claim) = &node.claim {
                println!("  claim:     {} until {}", claim.owner, claim.expires_at);
            }
            if let Some(note) = &node.verdict_note {
                println!("  note:      {note}");
            }
        }
        ProofCommand::Jobs => print_jobs(&service.find_jobs()?),
        ProofCommand::Taint => {
            for (id, taint) in service.taint()? {
                println!("{id}\t{taint}");
            }
        }
        ProofCommand::Create {
            node,
            draft,
            author,
        } => {
            service.create_node(&node, &draft.into_draft(), author.as_deref())?;
            println!("Created {node}");
        }
        ProofCommand::Refine {
            parent,
            owner,
            draft,
        } => {
            let id = service.refine(&parent, &owner, &draft.into_draft())?;
            println!("Created {id}");
        }
        ProofCommand::Claim {
            node,
            owner,
            timeout,
        } => {
            let claim = service.claim_node(&node, &owner, claim_length(service, timeout))?;
            println!("{node} claimed by {} until {}", claim.owner, claim.expires_at);
        }
        ProofCommand::Refresh {
            node,
            owner,
            timeout,
        } => {
            let claim = service.refresh_claim(&node, &owner, claim_length(service, timeout))?;
            println!("{node} claimed by {} until {}", claim.owner, claim.expires_at);
        }
        ProofCommand::Release { node, owner } => {
            service.release_node(&node, &owner)?;
            println!("Released {node}");
        }
        ProofCommand::Accept { nodes, agent, note } => {
            match (nodes.as_slice(), note) {
                ([id], Some(note)) => service.accept_node_with_note(id, agent.as_deref(), &note)?,
                ([id], None) => service.accept_node(id, agent.as_deref())?,
                (_, Some(_)) => bail!("--note applies to a single node"),
                (_, None) => service.accept_nodes_bulk(&nodes, agent.as_deref())?,
            }
            for id in &nodes {
                println!("Accepted {id}");
            }
        }
        ProofCommand::Admit { node, agent, note } => {
            service.admit_node(&node, agent.as_deref(), note.as_deref())?;
            println!("Admitted {node}");
        }
        ProofCommand::Refute {
            node,
            reason,
            agent,
        } => {
            service.refute_node(&node, &reason, agent.as_deref())?;
            println!("Refuted {node}");
        }
        ProofCommand::Archive {
            node,
            reason,
            agent,
        } => {
            service.archive_node(&node, &reason, agent.as_deref())?;
            println!("Archived {node}");
        }
        ProofCommand::Challenge {
            node,
            target,
            severity,
            reason,
            by,
        } => {
            let challenge = service.raise_challenge(&node, target, severity, &reason, &by)?;
            println!("{challenge}");
        }
        ProofCommand::Resolve {
            challenge,
            resolution,
            by,
        } => {
            let challenge = ChallengeId::new(challenge);
            service.resolve_challenge(&challenge, &resolution, &by)?;
            println!("Resolved {challenge}");
        }
        ProofCommand::Withdraw { challenge, by } => {
            let challenge = ChallengeId::new(challenge);
            service.withdraw_challenge(&challenge, &by)?;
            println!("Withdrew {challenge}");
        }
        ProofCommand::Def { name, content, by } => {
            service.add_definition(&name, &content, &by)?;
            println!("Defined {name}");
        }
        ProofCommand::RequestDef { term, node, by } => {
            let pending = service.request_definition(&term, &node, &by)?;
            println!("{pending}");
        }
        ProofCommand::Ext {
            name,
            source,
            statement,
            by,
        } => {
            service.add_external(&name, &source, &statement, &by)?;
            println!("Added external {name}");
        }
        ProofCommand::Lemma {
            node,
            statement,
            proof,
        } => {
            let lemma = service.extract_lemma(&node, statement.as_deref(), proof.as_deref())?;
            println!("{lemma}");
        }
        ProofCommand::Reap { dry_run, all } => {
            let report = service.reap(ReapOptions { dry_run, all })?;
            let verb = if report.dry_run { "Would release" } else { "Released" };
            if report.is_empty() {
                println!("No claims to release");
            }
            for id in &report.node_ids {
                println!("{verb} {id} ({})", report.reason);
            }
        }
    }
    Ok(())
}

fn print_status(report: &StatusReport) {
    if let Some(conjecture) = &report.conjecture {
        println!("Conjecture: {conjecture}");
    }
    println!(
        "Nodes: {} ({} pending, {} validated, {} admitted, {} refuted, {} archived)",
        report.total_nodes,
        report.epistemic.pending,
        report.epistemic.validated,
        report.epistemic.admitted,
        report.epistemic.refuted,
        report.epistemic.archived,
    );
    println!(
        "Workflow: {} available, {} claimed, {} blocked",
        report.workflow.available, report.workflow.claimed, report.workflow.blocked,
    );
    println!(
        "Open challenges: {} ({} critical, {} major, {} minor, {} note)",
        report.open_challenges.total(),
        report.open_challenges.critical,
        report.open_challenges.major,
        report.open_challenges.minor,
        report.open_challenges.note,
    );
    println!("Progress: {:.1}%", report.progress * 100.0);
    println!(
        "Claims: {} live, {} stale",
        report.live_claims, report.stale_claims
    );
    if !report.deep_nodes.is_empty() {
        let deep: Vec<String> = report.deep_nodes.iter().map(ToString::to_string).collect();
        println!("Deep nodes: {}", deep.join(", "));
    }
    println!(
        "Lemmas: {}, pending definitions: {}",
        report.lemmas, report.pending_defs
    );
    println!("Ledger: {} records", report.last_seq);
    if report.is_complete() {
        println!("Proof complete.");
    }
}

fn print_jobs(jobs: &JobResult) {
    if jobs.is_empty() {
        println!("No jobs");
        return;
    }
    for (label, kind, list) in [
        ("Prover", JobKind::Prover, &jobs.prover),
        ("Verifier", JobKind::Verifier, &jobs.verifier),
    ] {
        if list.is_empty() {
            continue;
        }
        println!("{label} jobs:");
        for job in list {
            let marker = if jobs.recommended(kind).is_some_and(|r| r.node_id == job.node_id) {
                '*'
            } else {
                ' '
            };
            println!(
                "{marker} {} (depth {}, {} open challenges; {})",
                job.node_id, job.depth, job.open_challenges, job.reason
            );
        }
    }
}

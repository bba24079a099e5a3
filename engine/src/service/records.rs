//! Side records: definitions, external references and lemmas.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use proofwork_types::{EpistemicState, Event, LemmaId, NodeId, PendingDefId};

use super::{ProofService, node, non_empty};
use crate::citations::{self, CitationKind};
use crate::error::{Result, ServiceError};

/// Hex SHA-256 over a lemma's statement and, when present, its proof text.
#[must_use]
pub fn content_hash(statement: &str, proof: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(statement.as_bytes());
    if let Some(proof) = proof {
        hasher.update(b"\n");
        hasher.update(proof.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

impl ProofService {
    /// Add a definition citable as `def:NAME`. Resolves any pending request
    /// for the same term.
    pub fn add_definition(&self, name: &str, content: &str, added_by: &str) -> Result<()> {
        citations::validate_name(CitationKind::Definition, name)?;
        let content = non_empty("content", content)?;
        let added_by = non_empty("added_by", added_by)?;

        self.commit("add_definition", |state, _now| {
            if state.get_definition(name).is_some() {
                return Err(ServiceError::DefinitionExists(name.to_owned()));
            }
            Ok((
                vec![Event::DefinitionAdded {
                    name: name.to_owned(),
                    content: content.clone(),
                    added_by: added_by.clone(),
                }],
                (),
            ))
        })
    }

    /// Record that `node_id` needs a definition for `term` that does not exist yet.
    pub fn request_definition(
        &self,
        term: &str,
        node_id: &NodeId,
        requested_by: &str,
    ) -> Result<PendingDefId> {
        citations::validate_name(CitationKind::Definition, term)?;
        let requested_by = non_empty("requested_by", requested_by)?;

        self.commit("request_definition", |state, _now| {
            node(state, node_id)?;
            if state.get_definition(term).is_some() {
                return Err(ServiceError::DefinitionExists(term.to_owned()));
            }
            let pending_id = PendingDefId::new(format!("pd-{}", Uuid::new_v4().simple()));
            Ok((
                vec![Event::DefinitionRequested {
                    pending_id: pending_id.clone(),
                    term: term.to_owned(),
                    node_id: node_id.clone(),
                    requested_by: requested_by.clone(),
                }],
                pending_id,
            ))
        })
    }

    /// Add an external reference citable as `ext:NAME`.
    pub fn add_external(
        &self,
        name: &str,
        source: &str,
        statement: &str,
        added_by: &str,
    ) -> Result<()> {
        citations::validate_name(CitationKind::External, name)?;
        let source = non_empty("source", source)?;
        let statement = non_empty("statement", statement)?;
        let added_by = non_empty("added_by", added_by)?;

        self.commit("add_external", |state, _now| {
            if state.get_external(name).is_some() {
                return Err(ServiceError::ExternalExists(name.to_owned()));
            }
            Ok((
                vec![Event::ExternalAdded {
                    name: name.to_owned(),
                    source: source.clone(),
                    statement: statement.clone(),
                    added_by: added_by.clone(),
                }],
                (),
            ))
        })
    }

    /// Record a validated node's statement as a reusable lemma.
    ///
    /// `statement` defaults to the node's own. Ids are sequential (`L1`,
    /// `L2`, ...).
    pub fn extract_lemma(
        &self,
        node_id: &NodeId,
        statement: Option<&str>,
        proof: Option<&str>,
    ) -> Result<LemmaId> {
        let statement = statement.map(|s| non_empty("statement", s)).transpose()?;
        let proof = proof.map(|p| non_empty("proof", p)).transpose()?;

        self.commit("extract_lemma", |state, _now| {
            let node = node(state, node_id)?;
            if node.epistemic_state != EpistemicState::Validated {
                return Err(ServiceError::LemmaSourceNotValidated {
                    id: node_id.clone(),
                    state: node.epistemic_state,
                });
            }

            let statement = statement.clone().unwrap_or_else(|| node.statement.clone());
            let hash = content_hash(&statement, proof.as_deref());
            if let Some(existing) = state
                .all_lemmas()
                .find(|l| l.source_node == *node_id && l.content_hash == hash)
            {
                return Err(ServiceError::DuplicateLemma {
                    id: node_id.clone(),
                    existing: existing.id.clone(),
                });
            }

            let lemma_id = LemmaId::new(format!("L{}", state.lemma_count() + 1));
            Ok((
                vec![Event::LemmaExtracted {
                    lemma_id: lemma_id.clone(),
                    node_id: node_id.clone(),
                    statement,
                    content_hash: hash,
                    proof: proof.clone(),
                }],
                lemma_id,
            ))
        })
    }
}

//! Query-to-decision orchestration.
//!
//! A linear pipeline over five stages:
//!
//! ```text
//! Created ──► Parsed ──► Retrieved ──► Decided ──► Persisted
//!    │           │            │            │            │
//!    └───────────┴────────────┴────────────┴────────────┘
//!                 any unrecoverable failure
//!                          │
//!                          ▼
//!            degraded needs-review response
//! ```
//!
//! The query path never crashes and always answers: once the query row
//! exists, every downstream failure (transport, timeout, storage) collapses
//! into a decision-shaped needs-review payload with an error signal attached.
//! Two failures are deliberately softer still and do not abort the run:
//! unparseable attribute output (empty mapping) and unusable decision output
//! (default needs-review object, which *is* persisted).

pub mod parsing;
pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::capabilities::CompletionProvider;
use crate::index::{DEFAULT_CAPABILITY_TIMEOUT, VectorIndex};
use crate::models::{DecisionData, DecisionRecord, QueryRecord};
use crate::stores::PolicyStore;
use crate::types::PolicyError;

/// Default number of clause candidates retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Pipeline stage, for logs and failure diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Created,
    Parsed,
    Retrieved,
    Decided,
    Persisted,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Created => "created",
            Stage::Parsed => "parsed",
            Stage::Retrieved => "retrieved",
            Stage::Decided => "decided",
            Stage::Persisted => "persisted",
        };
        write!(f, "{name}")
    }
}

/// What the caller gets back from [`QueryPipeline::process`]. Always
/// decision-shaped; `error` is set when the pipeline degraded and `record`
/// is set when a decision row was persisted.
#[derive(Clone, Debug)]
pub struct ProcessedQuery {
    pub query_id: Option<Uuid>,
    pub decision: DecisionData,
    pub record: Option<DecisionRecord>,
    pub error: Option<String>,
}

impl ProcessedQuery {
    /// True when the pipeline fell back to the degraded needs-review payload.
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Turns a free-text query into a persisted decision.
pub struct QueryPipeline {
    store: Arc<dyn PolicyStore>,
    index: Arc<VectorIndex>,
    completion: Arc<dyn CompletionProvider>,
    top_k: usize,
    capability_timeout: Duration,
}

impl QueryPipeline {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        index: Arc<VectorIndex>,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            store,
            index,
            completion,
            top_k: DEFAULT_TOP_K,
            capability_timeout: DEFAULT_CAPABILITY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_capability_timeout(mut self, timeout: Duration) -> Self {
        self.capability_timeout = timeout;
        self
    }

    /// Runs the full pipeline. Infallible by contract: failures degrade into
    /// the returned payload instead of propagating.
    pub async fn process(&self, query_text: &str) -> ProcessedQuery {
        let query = match self.store.create_query(query_text).await {
            Ok(query) => query,
            Err(err) => {
                warn!(stage = %Stage::Created, error = %err, "query row creation failed");
                return ProcessedQuery {
                    query_id: None,
                    decision: DecisionData::needs_review(
                        format!("Query could not be recorded: {err}"),
                        Vec::new(),
                    ),
                    record: None,
                    error: Some(err.to_string()),
                };
            }
        };

        match self.run_stages(&query).await {
            Ok(record) => ProcessedQuery {
                query_id: Some(query.id),
                decision: record.data(),
                record: Some(record),
                error: None,
            },
            Err(err) => {
                warn!(query_id = %query.id, error = %err, "pipeline degraded to needs-review");
                let justification = if err.is_external() {
                    format!("External capability failed: {err}")
                } else {
                    format!("Query processing failed: {err}")
                };
                ProcessedQuery {
                    query_id: Some(query.id),
                    decision: DecisionData::needs_review(justification, Vec::new()),
                    record: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Stages after `Created`. Any error here is caught by [`process`]; no
    /// partial decision is ever persisted.
    async fn run_stages(&self, query: &QueryRecord) -> Result<DecisionRecord, PolicyError> {
        // Parsed: transport failure aborts, unparseable output does not.
        let raw = self.complete(&prompts::attribute_prompt(&query.text)).await?;
        let attributes = parsing::parse_attributes(&raw);
        debug!(query_id = %query.id, stage = %Stage::Parsed, attributes = attributes.len());
        self.store
            .set_query_attributes(query.id, serde_json::Value::Object(attributes))
            .await?;

        // Retrieved: resolve hits to canonical clauses by id; a clause
        // deleted since the last rebuild keeps its snapshot text.
        let hits = self.index.search(&query.text, self.top_k).await?;
        let mut resolved = Vec::with_capacity(hits.len());
        for hit in &hits {
            match self.store.get_clause(hit.clause_id).await? {
                Some(clause) => resolved.push(clause.text),
                None => resolved.push(hit.text.clone()),
            }
        }
        debug!(query_id = %query.id, stage = %Stage::Retrieved, candidates = resolved.len());

        // Decided: unusable output becomes the default needs-review object.
        let raw = self
            .complete(&prompts::decision_prompt(&query.text, &resolved))
            .await?;
        let decision = parsing::parse_decision(&raw, &resolved);
        debug!(query_id = %query.id, stage = %Stage::Decided, status = %decision.status);

        // Persisted: exactly one decision per attempt.
        let record = self.store.create_decision(query.id, &decision).await?;
        debug!(query_id = %query.id, stage = %Stage::Persisted, decision_id = %record.id);
        Ok(record)
    }

    async fn complete(&self, prompt: &str) -> Result<String, PolicyError> {
        match tokio::time::timeout(self.capability_timeout, self.completion.complete(prompt)).await
        {
            Ok(result) => result,
            Err(_) => Err(PolicyError::ExternalService(format!(
                "completion call exceeded {:?}",
                self.capability_timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{MockEmbeddingProvider, ScriptedCompletionProvider};
    use crate::models::DecisionStatus;
    use crate::stores::MemoryPolicyStore;

    async fn seeded(
        clauses: &[&str],
        completion: ScriptedCompletionProvider,
    ) -> (Arc<MemoryPolicyStore>, QueryPipeline) {
        let store = Arc::new(MemoryPolicyStore::new());
        if !clauses.is_empty() {
            let doc = store.create_document("policy", "test").await.unwrap();
            for text in clauses {
                store.insert_clause(doc.id, text, None).await.unwrap();
            }
        }
        let index = Arc::new(VectorIndex::new(
            store.clone(),
            Arc::new(MockEmbeddingProvider::new()),
        ));
        index.rebuild().await.unwrap();
        let pipeline = QueryPipeline::new(store.clone(), index, Arc::new(completion));
        (store, pipeline)
    }

    #[tokio::test]
    async fn happy_path_persists_the_parsed_decision() {
        let completion = ScriptedCompletionProvider::new([
            r#"{"age": 46, "procedure": "knee surgery"}"#,
            r#"```json
            {"decision": "Approved", "amount": 90000, "justification": "covered under clause",
             "referenced_clauses": ["Knee surgery is covered after a waiting period of two years"]}
            ```"#,
        ]);
        let (store, pipeline) = seeded(
            &["Knee surgery is covered after a waiting period of two years"],
            completion,
        )
        .await;

        let outcome = pipeline.process("Is knee surgery covered?").await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.decision.status, DecisionStatus::Approved);
        assert_eq!(outcome.decision.amount, Some(90000.0));

        let record = outcome.record.expect("decision persisted");
        assert_eq!(store.decisions_for(record.query_id).len(), 1);
    }

    #[tokio::test]
    async fn missing_decision_key_persists_needs_review_with_retrieved_clauses() {
        let clause = "Claims must be filed within 30 days of treatment";
        let completion = ScriptedCompletionProvider::new([
            "not json",
            r#"{"justification": "no idea"}"#,
        ]);
        let (store, pipeline) = seeded(&[clause], completion).await;

        let outcome = pipeline.process("Can I file a claim after 45 days?").await;
        assert!(!outcome.is_degraded(), "soft-fail path still persists");
        assert_eq!(outcome.decision.status, DecisionStatus::NeedsReview);
        assert_eq!(
            outcome.decision.referenced_clauses,
            vec![clause.to_string()]
        );

        let record = outcome.record.expect("defaulted decision persisted");
        assert_eq!(record.status, DecisionStatus::NeedsReview);
        assert_eq!(store.decisions_for(record.query_id).len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_degrades_without_persisting() {
        let clause = "Claims must be filed within 30 days of treatment";
        // One response for the parse stage; the decide call then fails.
        let completion = ScriptedCompletionProvider::new([r#"{"age": 30}"#]);
        let (store, pipeline) = seeded(&[clause], completion).await;

        let outcome = pipeline.process("Can I file a claim after 45 days?").await;
        assert!(outcome.is_degraded());
        assert_eq!(outcome.decision.status, DecisionStatus::NeedsReview);
        assert!(
            outcome
                .decision
                .justification
                .starts_with("External capability failed"),
            "capability failures carry the external diagnostic"
        );
        assert!(outcome.decision.referenced_clauses.is_empty());
        assert!(outcome.record.is_none());

        let query_id = outcome.query_id.expect("query row was created");
        assert!(store.decisions_for(query_id).is_empty());
    }

    #[tokio::test]
    async fn unparseable_attributes_do_not_abort_the_run() {
        let completion = ScriptedCompletionProvider::new([
            "the patient seems to be asking about knee surgery",
            r#"{"decision": "Rejected", "amount": null, "justification": "not covered",
                "referenced_clauses": []}"#,
        ]);
        let (store, pipeline) =
            seeded(&["Cosmetic procedures are excluded from coverage"], completion).await;

        let outcome = pipeline.process("Is a nose job covered?").await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.decision.status, DecisionStatus::Rejected);

        // The empty mapping was still persisted onto the query.
        let _ = store;
    }

    #[tokio::test]
    async fn empty_corpus_still_produces_a_decision() {
        let completion = ScriptedCompletionProvider::new([
            "{}",
            r#"{"decision": "Needs Review", "amount": null,
                "justification": "no policy on file", "referenced_clauses": []}"#,
        ]);
        let (_, pipeline) = seeded(&[], completion).await;

        let outcome = pipeline.process("Am I covered?").await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.decision.status, DecisionStatus::NeedsReview);
        assert!(outcome.decision.referenced_clauses.is_empty());
    }
}

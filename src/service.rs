//! `PolicyService`: one object bundling the store, index, ingestor, progress
//! tracker, and query pipeline behind the operations a request layer exposes.
//!
//! The service is transport-agnostic: an HTTP router (or a CLI, or a test)
//! maps its endpoints onto these methods one-to-one. Validation failures and
//! unknown ids come back as typed errors; the query path always returns a
//! decision-shaped payload.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::capabilities::{CompletionProvider, EmbeddingProvider, TextExtractor};
use crate::index::VectorIndex;
use crate::ingestion::{Ingestor, TaskReport};
use crate::models::DocumentRecord;
use crate::pipeline::{ProcessedQuery, QueryPipeline};
use crate::progress::ProgressTracker;
use crate::stores::PolicyStore;
use crate::types::PolicyError;

/// Tunables for a [`PolicyService`].
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Clause candidates retrieved per query.
    pub top_k: usize,
    /// Documents returned by the "latest documents" listings.
    pub recent_limit: usize,
    /// Lifetime of progress entries and task reports.
    pub progress_ttl: Duration,
    /// Wall-clock budget per embedding or completion call.
    pub capability_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            top_k: crate::pipeline::DEFAULT_TOP_K,
            recent_limit: 5,
            progress_ttl: crate::progress::DEFAULT_TTL,
            capability_timeout: crate::index::DEFAULT_CAPABILITY_TIMEOUT,
        }
    }
}

/// Returned by [`PolicyService::upload_document`].
#[derive(Clone, Debug)]
pub struct UploadReceipt {
    pub task_id: String,
    pub latest_docs: Vec<DocumentRecord>,
}

/// Returned by [`PolicyService::delete_document`].
#[derive(Clone, Debug)]
pub struct DeletionReceipt {
    pub message: String,
    pub latest_docs: Vec<DocumentRecord>,
}

/// The assembled ingestion-to-decision service.
pub struct PolicyService {
    store: Arc<dyn PolicyStore>,
    index: Arc<VectorIndex>,
    ingestor: Ingestor,
    pipeline: QueryPipeline,
    progress: Arc<ProgressTracker>,
    config: ServiceConfig,
}

impl PolicyService {
    /// Starts a builder; store and all three capabilities are required.
    pub fn builder() -> PolicyServiceBuilder {
        PolicyServiceBuilder::default()
    }

    /// Latest documents, newest first.
    pub async fn recent_documents(&self) -> Result<Vec<DocumentRecord>, PolicyError> {
        self.store.recent_documents(self.config.recent_limit).await
    }

    /// Accepts an upload and launches background ingestion. Fails fast on a
    /// duplicate display name; otherwise returns the pollable task id plus
    /// the document listing as of acceptance. The new document's row is
    /// written by the background task, so it appears in listings once the
    /// task has started persisting, not necessarily in this receipt.
    pub async fn upload_document(
        &self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadReceipt, PolicyError> {
        let task_id = self.ingestor.ingest(name, bytes).await?;
        let latest_docs = self.recent_documents().await?;
        Ok(UploadReceipt {
            task_id,
            latest_docs,
        })
    }

    /// Confirms an already-ingested document exists and returns it. The
    /// caller owns any selection state built on top.
    pub async fn use_existing_document(&self, id: Uuid) -> Result<DocumentRecord, PolicyError> {
        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| PolicyError::NotFound(format!("document {id}")))
    }

    /// Completion percentage for an ingestion task; 0 for unknown or expired
    /// ids by contract.
    pub fn progress(&self, task_id: &str) -> u8 {
        self.progress.get(task_id)
    }

    /// Outcome report for an ingestion task, where progress alone cannot
    /// distinguish "stalled" from "failed".
    pub fn task_report(&self, task_id: &str) -> Option<TaskReport> {
        self.ingestor.report(task_id)
    }

    /// Runs the query pipeline. Always returns a decision-shaped payload;
    /// inspect [`ProcessedQuery::is_degraded`] for the internal-error hint.
    pub async fn process_query(&self, query_text: &str) -> ProcessedQuery {
        self.pipeline.process(query_text).await
    }

    /// Deletes a document (cascading to its clauses) and rebuilds the index
    /// so searches stop surfacing the removed clauses.
    pub async fn delete_document(&self, id: Uuid) -> Result<DeletionReceipt, PolicyError> {
        if !self.store.delete_document(id).await? {
            return Err(PolicyError::NotFound(format!("document {id}")));
        }
        self.index.rebuild().await?;
        info!(document = %id, "document deleted and index rebuilt");
        Ok(DeletionReceipt {
            message: "Document deleted".to_string(),
            latest_docs: self.recent_documents().await?,
        })
    }

    /// Forces a full index rebuild; returns the number of indexed clauses.
    pub async fn rebuild_index(&self) -> Result<usize, PolicyError> {
        self.index.rebuild().await
    }

    /// The shared vector index, for callers wiring additional components.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }
}

/// Builder for [`PolicyService`] instances.
#[derive(Default)]
pub struct PolicyServiceBuilder {
    store: Option<Arc<dyn PolicyStore>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    completion: Option<Arc<dyn CompletionProvider>>,
    config: Option<ServiceConfig>,
}

impl PolicyServiceBuilder {
    #[must_use]
    pub fn store(mut self, store: Arc<dyn PolicyStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    #[must_use]
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn completion(mut self, completion: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Override the default configuration.
    #[must_use]
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the service.
    ///
    /// # Panics
    ///
    /// Panics when the store or any capability was not provided; use
    /// [`try_build`](Self::try_build) for a fallible variant.
    pub fn build(self) -> PolicyService {
        self.try_build()
            .expect("PolicyServiceBuilder requires store, extractor, embedder, and completion")
    }

    /// Builds the service, returning `None` when a requirement is missing.
    pub fn try_build(self) -> Option<PolicyService> {
        let store = self.store?;
        let extractor = self.extractor?;
        let embedder = self.embedder?;
        let completion = self.completion?;
        let config = self.config.unwrap_or_default();

        let index = Arc::new(VectorIndex::with_timeout(
            store.clone(),
            embedder,
            config.capability_timeout,
        ));
        let progress = Arc::new(ProgressTracker::new(config.progress_ttl));
        let ingestor = Ingestor::new(
            store.clone(),
            extractor,
            index.clone(),
            progress.clone(),
            config.progress_ttl,
        );
        let pipeline = QueryPipeline::new(store.clone(), index.clone(), completion)
            .with_top_k(config.top_k)
            .with_capability_timeout(config.capability_timeout);

        Some(PolicyService {
            store,
            index,
            ingestor,
            pipeline,
            progress,
            config,
        })
    }
}

//! Upload ingestion: duplicate check, background extraction + segmentation,
//! per-clause progress reporting, and the post-ingest index rebuild.
//!
//! The caller's synchronous path ends at the duplicate-name check: on
//! acceptance it receives an opaque task id immediately and observes the rest
//! by polling. Progress is the percentage of clauses persisted; the task
//! report carries the terminal outcome (completed or failed with a message)
//! so a stalled progress bar is distinguishable from a crashed task.
//!
//! Failure semantics are deliberate: a task that dies partway leaves its
//! already-persisted clauses in place (no rollback), leaves the document
//! marked not fully ingested, and skips the index rebuild for that attempt.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::capabilities::TextExtractor;
use crate::index::VectorIndex;
use crate::progress::ProgressTracker;
use crate::segmenter;
use crate::stores::PolicyStore;
use crate::types::PolicyError;

/// Terminal-state report for an ingestion task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskReport {
    Running,
    Completed { clauses: usize },
    Failed { message: String },
}

#[derive(Clone, Debug)]
struct ReportEntry {
    report: TaskReport,
    expires_at: Instant,
}

/// TTL-bounded task-id → report map, same lifetime policy as progress.
#[derive(Debug)]
struct TaskReports {
    ttl: Duration,
    entries: Mutex<HashMap<String, ReportEntry>>,
}

impl TaskReports {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn set(&self, task_id: &str, report: TaskReport) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            task_id.to_string(),
            ReportEntry {
                report,
                expires_at: now + self.ttl,
            },
        );
    }

    fn get(&self, task_id: &str) -> Option<TaskReport> {
        let entries = self.entries.lock();
        entries
            .get(task_id)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.report.clone())
    }
}

/// Orchestrates document ingestion as detached background work.
pub struct Ingestor {
    store: Arc<dyn PolicyStore>,
    extractor: Arc<dyn TextExtractor>,
    index: Arc<VectorIndex>,
    progress: Arc<ProgressTracker>,
    reports: Arc<TaskReports>,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        extractor: Arc<dyn TextExtractor>,
        index: Arc<VectorIndex>,
        progress: Arc<ProgressTracker>,
        report_ttl: Duration,
    ) -> Self {
        Self {
            store,
            extractor,
            index,
            progress,
            reports: Arc::new(TaskReports::new(report_ttl)),
        }
    }

    /// Validates the upload and launches the background task.
    ///
    /// Returns the task id the caller polls. Rejects synchronously (no task,
    /// no document row) when the name is taken or the upload is empty.
    pub async fn ingest(&self, name: &str, bytes: Vec<u8>) -> Result<String, PolicyError> {
        if name.trim().is_empty() {
            return Err(PolicyError::Validation("missing document name".into()));
        }
        if bytes.is_empty() {
            return Err(PolicyError::Validation("uploaded file is empty".into()));
        }
        if self.store.document_name_exists(name).await? {
            return Err(PolicyError::Validation(format!(
                "document '{name}' already uploaded"
            )));
        }

        let task_id = Uuid::new_v4().to_string();
        self.progress.set(&task_id, 0);
        self.reports.set(&task_id, TaskReport::Running);

        let store = self.store.clone();
        let extractor = self.extractor.clone();
        let index = self.index.clone();
        let progress = self.progress.clone();
        let reports = self.reports.clone();
        let name = name.to_string();
        let id_for_task = task_id.clone();

        tokio::spawn(async move {
            match run_ingestion(&store, &extractor, &index, &progress, &id_for_task, &name, bytes)
                .await
            {
                Ok(clauses) => {
                    info!(task_id = %id_for_task, document = %name, clauses, "ingestion complete");
                    reports.set(&id_for_task, TaskReport::Completed { clauses });
                }
                Err(err) => {
                    warn!(task_id = %id_for_task, document = %name, error = %err, "ingestion failed");
                    reports.set(
                        &id_for_task,
                        TaskReport::Failed {
                            message: err.to_string(),
                        },
                    );
                }
            }
        });

        Ok(task_id)
    }

    /// The task's report, or `None` when the id is unknown or expired.
    pub fn report(&self, task_id: &str) -> Option<TaskReport> {
        self.reports.get(task_id)
    }
}

async fn run_ingestion(
    store: &Arc<dyn PolicyStore>,
    extractor: &Arc<dyn TextExtractor>,
    index: &Arc<VectorIndex>,
    progress: &ProgressTracker,
    task_id: &str,
    name: &str,
    bytes: Vec<u8>,
) -> Result<usize, PolicyError> {
    let document = store.create_document(name, name).await?;
    let pages = extractor.extract_pages(&bytes).await?;
    let clauses = segmenter::segment_pages(&pages);
    let total = clauses.len();

    for (done, clause) in clauses.iter().enumerate() {
        store.insert_clause(document.id, clause, None).await?;
        progress.set(task_id, ProgressTracker::percent_of(done + 1, total));
    }

    store.mark_document_ingested(document.id).await?;
    index.rebuild().await?;
    progress.set(task_id, 100);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{MockEmbeddingProvider, PlainTextExtractor};
    use crate::stores::MemoryPolicyStore;
    use async_trait::async_trait;

    fn build_ingestor(
        store: Arc<MemoryPolicyStore>,
        extractor: Arc<dyn TextExtractor>,
    ) -> (Ingestor, Arc<VectorIndex>, Arc<ProgressTracker>) {
        let index = Arc::new(VectorIndex::new(
            store.clone(),
            Arc::new(MockEmbeddingProvider::new()),
        ));
        let progress = Arc::new(ProgressTracker::default());
        let ingestor = Ingestor::new(
            store,
            extractor,
            index.clone(),
            progress.clone(),
            Duration::from_secs(600),
        );
        (ingestor, index, progress)
    }

    async fn wait_for_terminal(ingestor: &Ingestor, task_id: &str) -> TaskReport {
        for _ in 0..200 {
            match ingestor.report(task_id) {
                Some(TaskReport::Running) | None => {
                    tokio::time::sleep(Duration::from_millis(10)).await
                }
                Some(report) => return report,
            }
        }
        panic!("task {task_id} did not reach a terminal state");
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected_without_a_second_document() {
        let store = Arc::new(MemoryPolicyStore::new());
        let (ingestor, _, _) = build_ingestor(store.clone(), Arc::new(PlainTextExtractor));

        let body = b"A clause that is comfortably longer than the merge threshold".to_vec();
        let task_id = ingestor.ingest("policy.txt", body.clone()).await.unwrap();
        wait_for_terminal(&ingestor, &task_id).await;

        let err = ingestor.ingest("policy.txt", body).await.unwrap_err();
        assert!(matches!(err, PolicyError::Validation(_)));
        assert_eq!(store.recent_documents(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn successful_ingestion_reaches_exactly_one_hundred() {
        let store = Arc::new(MemoryPolicyStore::new());
        let (ingestor, index, progress) =
            build_ingestor(store.clone(), Arc::new(PlainTextExtractor));

        let body = concat!(
            "The first clause is long enough to stand on its own line here\n",
            "The second clause is also long enough to stand on its own line\n",
            "The third clause likewise exceeds the merge threshold easily ok\n",
        )
        .as_bytes()
        .to_vec();

        let task_id = ingestor.ingest("policy.txt", body).await.unwrap();
        let report = wait_for_terminal(&ingestor, &task_id).await;

        assert_eq!(report, TaskReport::Completed { clauses: 3 });
        assert_eq!(progress.get(&task_id), 100);
        assert_eq!(store.clause_count().await.unwrap(), 3);
        assert_eq!(index.len(), 3);

        let doc = &store.recent_documents(1).await.unwrap()[0];
        assert!(doc.fully_ingested);
    }

    #[tokio::test]
    async fn extraction_failure_halts_without_rebuild() {
        struct BrokenExtractor;

        #[async_trait]
        impl TextExtractor for BrokenExtractor {
            async fn extract_pages(&self, _: &[u8]) -> Result<Vec<String>, PolicyError> {
                Err(PolicyError::ExternalService("extractor crashed".into()))
            }
        }

        let store = Arc::new(MemoryPolicyStore::new());
        let (ingestor, index, _) = build_ingestor(store.clone(), Arc::new(BrokenExtractor));

        let task_id = ingestor.ingest("broken.pdf", vec![1, 2, 3]).await.unwrap();
        let report = wait_for_terminal(&ingestor, &task_id).await;

        assert!(matches!(report, TaskReport::Failed { .. }));
        assert_eq!(index.generation(), 0, "no rebuild for a failed attempt");

        // The document row survives the failure, marked not fully ingested.
        let doc = &store.recent_documents(1).await.unwrap()[0];
        assert!(!doc.fully_ingested);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected_synchronously() {
        let store = Arc::new(MemoryPolicyStore::new());
        let (ingestor, _, _) = build_ingestor(store.clone(), Arc::new(PlainTextExtractor));

        assert!(matches!(
            ingestor.ingest("empty.txt", Vec::new()).await,
            Err(PolicyError::Validation(_))
        ));
        assert!(matches!(
            ingestor.ingest("   ", b"data".to_vec()).await,
            Err(PolicyError::Validation(_))
        ));
        assert!(store.recent_documents(1).await.unwrap().is_empty());
    }
}

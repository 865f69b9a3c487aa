//! In-memory vector index over the full clause corpus.
//!
//! The index is rebuilt wholesale, never updated incrementally: `rebuild`
//! fetches every clause in stable store order, embeds the batch, and swaps in
//! a fresh snapshot. Searches clone an `Arc` to the current snapshot, so a
//! search in progress always sees one consistent (vectors, clauses) pair no
//! matter how many rebuilds land underneath it.
//!
//! Each snapshot entry carries the clause id next to its vector, so retrieval
//! resolves hits by identity instead of re-matching text. A snapshot is stale
//! with respect to clause inserts and deletes until the next rebuild
//! completes; hits for since-deleted clauses fall back to the snapshot text.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::capabilities::EmbeddingProvider;
use crate::stores::PolicyStore;
use crate::types::PolicyError;

/// Default wall-clock budget for one embedding capability call.
pub const DEFAULT_CAPABILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// One clause as captured at rebuild time.
#[derive(Clone, Debug)]
pub struct IndexedClause {
    pub clause_id: Uuid,
    pub text: String,
}

#[derive(Debug)]
struct IndexSnapshot {
    vectors: Vec<Vec<f32>>,
    clauses: Vec<IndexedClause>,
}

/// A search hit: the snapshot's copy of the clause plus its distance.
#[derive(Clone, Debug)]
pub struct SearchHit {
    pub clause_id: Uuid,
    pub text: String,
    pub distance: f32,
}

/// Shared, atomically-swapped nearest-neighbor index.
pub struct VectorIndex {
    store: Arc<dyn PolicyStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    /// `None` until the first rebuild over a non-empty corpus.
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
    /// Serializes rebuilds; combined with `generation` it coalesces rebuilds
    /// queued behind one that already ran (single-flight).
    rebuild_gate: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    capability_timeout: Duration,
}

impl VectorIndex {
    pub fn new(store: Arc<dyn PolicyStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_timeout(store, embedder, DEFAULT_CAPABILITY_TIMEOUT)
    }

    pub fn with_timeout(
        store: Arc<dyn PolicyStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        capability_timeout: Duration,
    ) -> Self {
        Self {
            store,
            embedder,
            snapshot: RwLock::new(None),
            rebuild_gate: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            capability_timeout,
        }
    }

    /// Number of clauses in the current snapshot (0 when uninitialized/empty).
    pub fn len(&self) -> usize {
        self.snapshot
            .read()
            .as_ref()
            .map_or(0, |snap| snap.clauses.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic counter bumped by every completed rebuild.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Rebuilds the index from the full current corpus and atomically swaps
    /// it in. Returns the number of indexed clauses.
    ///
    /// Concurrent callers coalesce: whoever holds the gate embeds the corpus;
    /// callers that were waiting while a rebuild completed return without
    /// re-embedding. An empty corpus clears the index and is not an error.
    #[instrument(skip(self), err)]
    pub async fn rebuild(&self) -> Result<usize, PolicyError> {
        let observed = self.generation.load(Ordering::Acquire);
        let _gate = self.rebuild_gate.lock().await;
        if self.generation.load(Ordering::Acquire) != observed {
            debug!("rebuild coalesced with one that completed while waiting");
            return Ok(self.len());
        }

        let corpus = self.store.all_clauses().await?;
        if corpus.is_empty() {
            *self.snapshot.write() = None;
            self.generation.fetch_add(1, Ordering::AcqRel);
            info!("index rebuilt over empty corpus");
            return Ok(0);
        }

        let texts: Vec<String> = corpus.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(PolicyError::ExternalService(format!(
                "embedding capability returned {} vectors for {} clauses",
                vectors.len(),
                texts.len()
            )));
        }

        let clauses: Vec<IndexedClause> = corpus
            .into_iter()
            .map(|c| IndexedClause {
                clause_id: c.id,
                text: c.text,
            })
            .collect();
        let count = clauses.len();

        *self.snapshot.write() = Some(Arc::new(IndexSnapshot { vectors, clauses }));
        self.generation.fetch_add(1, Ordering::AcqRel);
        info!(clauses = count, "index rebuilt");
        Ok(count)
    }

    /// Returns up to `k` hits in ascending Euclidean distance, ties broken by
    /// snapshot position. Empty/uninitialized index → empty result. A failed
    /// query embedding surfaces as an error, never as an empty result.
    pub async fn search(&self, query_text: &str, k: usize) -> Result<Vec<SearchHit>, PolicyError> {
        let Some(snapshot) = self.snapshot.read().clone() else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = vec![query_text.to_string()];
        let mut query_vectors = self.embed(&query).await?;
        let query_vector = query_vectors.pop().ok_or_else(|| {
            PolicyError::ExternalService("embedding capability returned no query vector".into())
        })?;

        let mut ranked: Vec<(usize, f32)> = snapshot
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vector)| (idx, euclidean_distance(&query_vector, vector)))
            .collect();
        ranked.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(idx, distance)| SearchHit {
                clause_id: snapshot.clauses[idx].clause_id,
                text: snapshot.clauses[idx].text.clone(),
                distance,
            })
            .collect())
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PolicyError> {
        match tokio::time::timeout(self.capability_timeout, self.embedder.embed_batch(texts)).await
        {
            Ok(result) => result,
            Err(_) => Err(PolicyError::ExternalService(format!(
                "embedding call exceeded {:?}",
                self.capability_timeout
            ))),
        }
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

//! Clause-level ingestion, semantic retrieval, and decision pipelines for
//! policy documents.
//!
//! ```text
//! Upload ──► ingestion::Ingestor ──► capabilities::TextExtractor
//!                    │                        │
//!                    │                        ▼
//!                    │              segmenter (lines → clauses)
//!                    │                        │
//!                    ├─► progress::ProgressTracker (polled by caller)
//!                    ▼                        ▼
//!            stores::PolicyStore ◄── clause writes (ordered)
//!                    │
//!                    ▼
//!            index::VectorIndex ◄── full rebuild (atomic snapshot swap)
//!                    │
//! Query ──► pipeline::QueryPipeline ──► capabilities::CompletionProvider
//!                    │
//!                    ▼
//!            models::DecisionRecord (always decision-shaped, even degraded)
//! ```
//!
//! [`service::PolicyService`] assembles the whole of the above behind the
//! operations a request layer exposes. Every external collaborator (text
//! extraction, embeddings, text completion, persistence) sits behind a
//! trait with in-library test doubles, so the core runs deterministically
//! without any hosted model.

pub mod capabilities;
pub mod index;
pub mod ingestion;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod segmenter;
pub mod service;
pub mod stores;
pub mod types;

pub use capabilities::{
    CompletionProvider, EmbeddingProvider, MockEmbeddingProvider, PlainTextExtractor,
    RemoteCompletionClient, RemoteEmbeddingClient, ScriptedCompletionProvider, TextExtractor,
};
pub use index::{SearchHit, VectorIndex};
pub use ingestion::{Ingestor, TaskReport};
pub use models::{
    ClauseRecord, DecisionData, DecisionRecord, DecisionStatus, DocumentRecord, QueryRecord,
};
pub use pipeline::{ProcessedQuery, QueryPipeline};
pub use progress::ProgressTracker;
pub use service::{DeletionReceipt, PolicyService, ServiceConfig, UploadReceipt};
pub use stores::{MemoryPolicyStore, PolicyStore, SqlitePolicyStore};
pub use types::PolicyError;

//! Persistence seam for documents, clauses, queries, and decisions.
//!
//! The pipeline never talks to a concrete database; it talks to
//! [`PolicyStore`], an async CRUD trait. Two implementations ship with the
//! crate:
//!
//! ```text
//!                   ┌──────────────────┐
//!                   │ PolicyStore trait│
//!                   │   (async CRUD)   │
//!                   └────────┬─────────┘
//!                            │
//!                ┌───────────┴───────────┐
//!                ▼                       ▼
//!        ┌───────────────┐      ┌────────────────┐
//!        │ MemoryPolicy  │      │ SqlitePolicy   │
//!        │ Store (tests, │      │ Store (file or │
//!        │ embedded use) │      │ in-memory db)  │
//!        └───────────────┘      └────────────────┘
//! ```
//!
//! Invariants every implementation upholds:
//!
//! * Document display names are unique; clause order is insertion order and
//!   [`PolicyStore::all_clauses`] always returns the corpus in that stable
//!   order (the vector index's snapshot alignment depends on it).
//! * Deleting a document cascades to its clauses.
//! * Decisions are insert-only.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{ClauseRecord, DecisionData, DecisionRecord, DocumentRecord, QueryRecord};
use crate::types::PolicyError;

pub use memory::MemoryPolicyStore;
pub use sqlite::SqlitePolicyStore;

/// Store interface consumed by ingestion, the vector index, and the query
/// pipeline.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Persist a new document with `fully_ingested = false`.
    async fn create_document(
        &self,
        name: &str,
        source: &str,
    ) -> Result<DocumentRecord, PolicyError>;

    /// True when a document with this display name already exists.
    async fn document_name_exists(&self, name: &str) -> Result<bool, PolicyError>;

    async fn get_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, PolicyError>;

    /// Most recently created documents, newest first.
    async fn recent_documents(&self, limit: usize) -> Result<Vec<DocumentRecord>, PolicyError>;

    /// Delete a document and, by cascade, its clauses. Returns `false` when
    /// the document did not exist.
    async fn delete_document(&self, id: Uuid) -> Result<bool, PolicyError>;

    /// Flip `fully_ingested` once every clause of the document is persisted.
    async fn mark_document_ingested(&self, id: Uuid) -> Result<(), PolicyError>;

    /// Append a clause to a document. Clause order within the corpus is the
    /// order of these calls.
    async fn insert_clause(
        &self,
        document_id: Uuid,
        text: &str,
        keywords: Option<&str>,
    ) -> Result<ClauseRecord, PolicyError>;

    /// The full clause corpus in stable insertion order.
    async fn all_clauses(&self) -> Result<Vec<ClauseRecord>, PolicyError>;

    async fn get_clause(&self, id: Uuid) -> Result<Option<ClauseRecord>, PolicyError>;

    async fn clause_count(&self) -> Result<usize, PolicyError>;

    /// Persist a new query row with its raw text.
    async fn create_query(&self, text: &str) -> Result<QueryRecord, PolicyError>;

    /// Attach the parsed (possibly empty) attribute mapping to a query.
    async fn set_query_attributes(
        &self,
        id: Uuid,
        attributes: serde_json::Value,
    ) -> Result<(), PolicyError>;

    /// Persist a decision for a query. Insert-only; one per attempt.
    async fn create_decision(
        &self,
        query_id: Uuid,
        data: &DecisionData,
    ) -> Result<DecisionRecord, PolicyError>;
}

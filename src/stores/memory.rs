//! In-memory [`PolicyStore`] for tests, demos, and embedded use.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::{ClauseRecord, DecisionData, DecisionRecord, DocumentRecord, QueryRecord};
use crate::stores::PolicyStore;
use crate::types::PolicyError;

#[derive(Debug, Default)]
struct Inner {
    documents: Vec<DocumentRecord>,
    clauses: Vec<ClauseRecord>,
    queries: Vec<QueryRecord>,
    decisions: Vec<DecisionRecord>,
}

/// Vec-backed store. Insertion order doubles as corpus order, which keeps
/// snapshot alignment trivially stable.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    inner: RwLock<Inner>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All decisions recorded for a query, in creation order. Test helper.
    pub fn decisions_for(&self, query_id: Uuid) -> Vec<DecisionRecord> {
        self.inner
            .read()
            .decisions
            .iter()
            .filter(|d| d.query_id == query_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn create_document(
        &self,
        name: &str,
        source: &str,
    ) -> Result<DocumentRecord, PolicyError> {
        let mut inner = self.inner.write();
        if inner.documents.iter().any(|d| d.name == name) {
            return Err(PolicyError::Validation(format!(
                "document '{name}' already exists"
            )));
        }
        let record = DocumentRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            source: source.to_string(),
            fully_ingested: false,
            created_at: Utc::now(),
        };
        inner.documents.push(record.clone());
        Ok(record)
    }

    async fn document_name_exists(&self, name: &str) -> Result<bool, PolicyError> {
        Ok(self.inner.read().documents.iter().any(|d| d.name == name))
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, PolicyError> {
        Ok(self
            .inner
            .read()
            .documents
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn recent_documents(&self, limit: usize) -> Result<Vec<DocumentRecord>, PolicyError> {
        Ok(self
            .inner
            .read()
            .documents
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool, PolicyError> {
        let mut inner = self.inner.write();
        let before = inner.documents.len();
        inner.documents.retain(|d| d.id != id);
        let existed = inner.documents.len() < before;
        if existed {
            inner.clauses.retain(|c| c.document_id != id);
        }
        Ok(existed)
    }

    async fn mark_document_ingested(&self, id: Uuid) -> Result<(), PolicyError> {
        let mut inner = self.inner.write();
        match inner.documents.iter_mut().find(|d| d.id == id) {
            Some(doc) => {
                doc.fully_ingested = true;
                Ok(())
            }
            None => Err(PolicyError::NotFound(format!("document {id}"))),
        }
    }

    async fn insert_clause(
        &self,
        document_id: Uuid,
        text: &str,
        keywords: Option<&str>,
    ) -> Result<ClauseRecord, PolicyError> {
        let mut inner = self.inner.write();
        if !inner.documents.iter().any(|d| d.id == document_id) {
            return Err(PolicyError::NotFound(format!("document {document_id}")));
        }
        let record = ClauseRecord {
            id: Uuid::new_v4(),
            document_id,
            text: text.to_string(),
            keywords: keywords.map(str::to_string),
            created_at: Utc::now(),
        };
        inner.clauses.push(record.clone());
        Ok(record)
    }

    async fn all_clauses(&self) -> Result<Vec<ClauseRecord>, PolicyError> {
        Ok(self.inner.read().clauses.clone())
    }

    async fn get_clause(&self, id: Uuid) -> Result<Option<ClauseRecord>, PolicyError> {
        Ok(self
            .inner
            .read()
            .clauses
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn clause_count(&self) -> Result<usize, PolicyError> {
        Ok(self.inner.read().clauses.len())
    }

    async fn create_query(&self, text: &str) -> Result<QueryRecord, PolicyError> {
        let record = QueryRecord {
            id: Uuid::new_v4(),
            text: text.to_string(),
            attributes: None,
            created_at: Utc::now(),
        };
        self.inner.write().queries.push(record.clone());
        Ok(record)
    }

    async fn set_query_attributes(
        &self,
        id: Uuid,
        attributes: serde_json::Value,
    ) -> Result<(), PolicyError> {
        let mut inner = self.inner.write();
        match inner.queries.iter_mut().find(|q| q.id == id) {
            Some(query) => {
                query.attributes = Some(attributes);
                Ok(())
            }
            None => Err(PolicyError::NotFound(format!("query {id}"))),
        }
    }

    async fn create_decision(
        &self,
        query_id: Uuid,
        data: &DecisionData,
    ) -> Result<DecisionRecord, PolicyError> {
        let mut inner = self.inner.write();
        if !inner.queries.iter().any(|q| q.id == query_id) {
            return Err(PolicyError::NotFound(format!("query {query_id}")));
        }
        let record = DecisionRecord {
            id: Uuid::new_v4(),
            query_id,
            status: data.status,
            amount: data.amount,
            justification: data.justification.clone(),
            referenced_clauses: data.referenced_clauses.clone(),
            created_at: Utc::now(),
        };
        inner.decisions.push(record.clone());
        Ok(record)
    }
}

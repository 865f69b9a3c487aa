//! Persistent record types shared by stores, the index, and the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A policy document. Owns an ordered set of clauses; deleting the document
/// cascades to them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    /// Display name, unique across the store (duplicate uploads are rejected).
    pub name: String,
    /// Where the document came from (file name, path, or URL).
    pub source: String,
    /// False until every clause extracted from the source has been persisted.
    /// A mid-task ingestion failure leaves this false so partially ingested
    /// documents are distinguishable.
    pub fully_ingested: bool,
    pub created_at: DateTime<Utc>,
}

/// One clause of a document, the atomic retrievable unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClauseRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub text: String,
    pub keywords: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A raw user query plus the attributes extracted from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: Uuid,
    pub text: String,
    /// Free-form key→value mapping produced by the parse stage. `None` until
    /// parsing has run; an empty object when parsing soft-failed.
    pub attributes: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Outcome category of a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionStatus {
    Approved,
    Rejected,
    /// Serialized as `"Needs Review"`; the compact spelling is accepted on
    /// input because upstream reasoning output uses both.
    #[serde(rename = "Needs Review", alias = "NeedsReview")]
    NeedsReview,
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionStatus::Approved => write!(f, "Approved"),
            DecisionStatus::Rejected => write!(f, "Rejected"),
            DecisionStatus::NeedsReview => write!(f, "Needs Review"),
        }
    }
}

impl std::str::FromStr for DecisionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Approved" => Ok(DecisionStatus::Approved),
            "Rejected" => Ok(DecisionStatus::Rejected),
            "Needs Review" | "NeedsReview" => Ok(DecisionStatus::NeedsReview),
            _ => Err(()),
        }
    }
}

/// Structured decision payload before persistence. This is the shape the
/// reasoning capability is asked to return and the shape callers receive even
/// when the pipeline degrades.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionData {
    #[serde(rename = "decision")]
    pub status: DecisionStatus,
    pub amount: Option<f64>,
    pub justification: String,
    pub referenced_clauses: Vec<String>,
}

impl DecisionData {
    /// The fallback object used when reasoning output is unusable: needs
    /// review, no amount, the referenced clauses the retrieval stage found.
    pub fn needs_review(
        justification: impl Into<String>,
        referenced_clauses: Vec<String>,
    ) -> Self {
        Self {
            status: DecisionStatus::NeedsReview,
            amount: None,
            justification: justification.into(),
            referenced_clauses,
        }
    }
}

/// A persisted decision. Exactly one is created per query-processing attempt;
/// decisions are never updated in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: Uuid,
    pub query_id: Uuid,
    pub status: DecisionStatus,
    pub amount: Option<f64>,
    pub justification: String,
    pub referenced_clauses: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl DecisionRecord {
    /// The decision payload carried by this record.
    pub fn data(&self) -> DecisionData {
        DecisionData {
            status: self.status,
            amount: self.amount,
            justification: self.justification.clone(),
            referenced_clauses: self.referenced_clauses.clone(),
        }
    }
}

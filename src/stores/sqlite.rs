//! SQLite-backed [`PolicyStore`] using `tokio-rusqlite`.
//!
//! The schema is created on open. Clause rows reference their document with
//! `ON DELETE CASCADE`; corpus order is rowid order, which matches insertion
//! order. Timestamps are stored as RFC 3339 text, JSON payloads (query
//! attributes, referenced clauses) as JSON text columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio_rusqlite::{Connection, OptionalExtension};
use tracing::instrument;
use uuid::Uuid;

use crate::models::{ClauseRecord, DecisionData, DecisionRecord, DocumentRecord, QueryRecord};
use crate::stores::PolicyStore;
use crate::types::PolicyError;

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;
CREATE TABLE IF NOT EXISTS documents (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL UNIQUE,
    source         TEXT NOT NULL,
    fully_ingested INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS clauses (
    id          TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    text        TEXT NOT NULL,
    keywords    TEXT,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_clauses_document ON clauses(document_id);
CREATE TABLE IF NOT EXISTS queries (
    id         TEXT PRIMARY KEY,
    text       TEXT NOT NULL,
    attributes TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS decisions (
    id                 TEXT PRIMARY KEY,
    query_id           TEXT NOT NULL REFERENCES queries(id) ON DELETE CASCADE,
    status             TEXT NOT NULL,
    amount             REAL,
    justification      TEXT NOT NULL,
    referenced_clauses TEXT NOT NULL,
    created_at         TEXT NOT NULL
);
";

/// SQLite store. Clone-cheap: the underlying connection handle is shared.
#[derive(Clone)]
pub struct SqlitePolicyStore {
    conn: Connection,
}

fn parse_uuid(raw: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap_or_else(|_| Uuid::nil())
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn parse_status(raw: &str) -> crate::models::DecisionStatus {
    raw.parse()
        .unwrap_or(crate::models::DecisionStatus::NeedsReview)
}

impl SqlitePolicyStore {
    /// Opens (creating if necessary) a database file and applies the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let conn = Connection::open(path)
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))?;
        Self::initialize(conn).await
    }

    /// Opens a private in-memory database, mainly for tests.
    pub async fn open_in_memory() -> Result<Self, PolicyError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))?;
        Self::initialize(conn).await
    }

    async fn initialize(conn: Connection) -> Result<Self, PolicyError> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)
                .map_err(tokio_rusqlite::Error::Rusqlite)
        })
        .await
        .map_err(|err| PolicyError::Storage(err.to_string()))?;
        Ok(Self { conn })
    }

    /// The underlying connection, for queries outside the trait surface.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl PolicyStore for SqlitePolicyStore {
    #[instrument(skip(self, source), err)]
    async fn create_document(
        &self,
        name: &str,
        source: &str,
    ) -> Result<DocumentRecord, PolicyError> {
        let record = DocumentRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            source: source.to_string(),
            fully_ingested: false,
            created_at: Utc::now(),
        };
        let row = (
            record.id.to_string(),
            record.name.clone(),
            record.source.clone(),
            record.created_at.to_rfc3339(),
        );
        let inserted = self
            .conn
            .call(move |conn| {
                let exists: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM documents WHERE name = ?1)",
                        [&row.1],
                        |r| r.get(0),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                if exists {
                    return Ok(false);
                }
                conn.execute(
                    "INSERT INTO documents (id, name, source, fully_ingested, created_at) \
                     VALUES (?1, ?2, ?3, 0, ?4)",
                    row,
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(true)
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))?;

        if !inserted {
            return Err(PolicyError::Validation(format!(
                "document '{name}' already exists"
            )));
        }
        Ok(record)
    }

    async fn document_name_exists(&self, name: &str) -> Result<bool, PolicyError> {
        let name = name.to_string();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM documents WHERE name = ?1)",
                    [&name],
                    |r| r.get(0),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, PolicyError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT id, name, source, fully_ingested, created_at \
                     FROM documents WHERE id = ?1",
                    [&id],
                    |row| {
                        Ok(DocumentRecord {
                            id: parse_uuid(&row.get::<_, String>(0)?),
                            name: row.get(1)?,
                            source: row.get(2)?,
                            fully_ingested: row.get::<_, i64>(3)? != 0,
                            created_at: parse_timestamp(&row.get::<_, String>(4)?),
                        })
                    },
                )
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))
    }

    async fn recent_documents(&self, limit: usize) -> Result<Vec<DocumentRecord>, PolicyError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, name, source, fully_ingested, created_at \
                         FROM documents ORDER BY rowid DESC LIMIT ?1",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([limit as i64], |row| {
                        Ok(DocumentRecord {
                            id: parse_uuid(&row.get::<_, String>(0)?),
                            name: row.get(1)?,
                            source: row.get(2)?,
                            fully_ingested: row.get::<_, i64>(3)? != 0,
                            created_at: parse_timestamp(&row.get::<_, String>(4)?),
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))
    }

    #[instrument(skip(self), err)]
    async fn delete_document(&self, id: Uuid) -> Result<bool, PolicyError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let deleted = conn
                    .execute("DELETE FROM documents WHERE id = ?1", [&id])
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(deleted > 0)
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))
    }

    async fn mark_document_ingested(&self, id: Uuid) -> Result<(), PolicyError> {
        let raw = id.to_string();
        let updated = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE documents SET fully_ingested = 1 WHERE id = ?1",
                    [&raw],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))?;
        if updated == 0 {
            return Err(PolicyError::NotFound(format!("document {id}")));
        }
        Ok(())
    }

    async fn insert_clause(
        &self,
        document_id: Uuid,
        text: &str,
        keywords: Option<&str>,
    ) -> Result<ClauseRecord, PolicyError> {
        let record = ClauseRecord {
            id: Uuid::new_v4(),
            document_id,
            text: text.to_string(),
            keywords: keywords.map(str::to_string),
            created_at: Utc::now(),
        };
        let row = (
            record.id.to_string(),
            record.document_id.to_string(),
            record.text.clone(),
            record.keywords.clone(),
            record.created_at.to_rfc3339(),
        );
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO clauses (id, document_id, text, keywords, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    row,
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))?;
        Ok(record)
    }

    async fn all_clauses(&self) -> Result<Vec<ClauseRecord>, PolicyError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, document_id, text, keywords, created_at \
                         FROM clauses ORDER BY rowid ASC",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(ClauseRecord {
                            id: parse_uuid(&row.get::<_, String>(0)?),
                            document_id: parse_uuid(&row.get::<_, String>(1)?),
                            text: row.get(2)?,
                            keywords: row.get(3)?,
                            created_at: parse_timestamp(&row.get::<_, String>(4)?),
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))
    }

    async fn get_clause(&self, id: Uuid) -> Result<Option<ClauseRecord>, PolicyError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT id, document_id, text, keywords, created_at \
                     FROM clauses WHERE id = ?1",
                    [&id],
                    |row| {
                        Ok(ClauseRecord {
                            id: parse_uuid(&row.get::<_, String>(0)?),
                            document_id: parse_uuid(&row.get::<_, String>(1)?),
                            text: row.get(2)?,
                            keywords: row.get(3)?,
                            created_at: parse_timestamp(&row.get::<_, String>(4)?),
                        })
                    },
                )
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))
    }

    async fn clause_count(&self) -> Result<usize, PolicyError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM clauses", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))
    }

    async fn create_query(&self, text: &str) -> Result<QueryRecord, PolicyError> {
        let record = QueryRecord {
            id: Uuid::new_v4(),
            text: text.to_string(),
            attributes: None,
            created_at: Utc::now(),
        };
        let row = (
            record.id.to_string(),
            record.text.clone(),
            record.created_at.to_rfc3339(),
        );
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO queries (id, text, attributes, created_at) \
                     VALUES (?1, ?2, NULL, ?3)",
                    row,
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))?;
        Ok(record)
    }

    async fn set_query_attributes(
        &self,
        id: Uuid,
        attributes: serde_json::Value,
    ) -> Result<(), PolicyError> {
        let raw = id.to_string();
        let payload = attributes.to_string();
        let updated = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE queries SET attributes = ?1 WHERE id = ?2",
                    (payload, raw),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))?;
        if updated == 0 {
            return Err(PolicyError::NotFound(format!("query {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, data), err)]
    async fn create_decision(
        &self,
        query_id: Uuid,
        data: &DecisionData,
    ) -> Result<DecisionRecord, PolicyError> {
        let record = DecisionRecord {
            id: Uuid::new_v4(),
            query_id,
            status: data.status,
            amount: data.amount,
            justification: data.justification.clone(),
            referenced_clauses: data.referenced_clauses.clone(),
            created_at: Utc::now(),
        };
        let clauses_json = serde_json::to_string(&record.referenced_clauses)
            .map_err(|err| PolicyError::Storage(err.to_string()))?;
        let row = (
            record.id.to_string(),
            record.query_id.to_string(),
            record.status.to_string(),
            record.amount,
            record.justification.clone(),
            clauses_json,
            record.created_at.to_rfc3339(),
        );
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO decisions \
                     (id, query_id, status, amount, justification, referenced_clauses, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    row,
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))?;
        Ok(record)
    }
}

impl SqlitePolicyStore {
    /// Fetches a persisted decision by id. Outside the trait because only
    /// tests and admin paths read decisions back.
    pub async fn get_decision(&self, id: Uuid) -> Result<Option<DecisionRecord>, PolicyError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT id, query_id, status, amount, justification, referenced_clauses, \
                     created_at FROM decisions WHERE id = ?1",
                    [&id],
                    |row| {
                        let clauses_raw: String = row.get(5)?;
                        Ok(DecisionRecord {
                            id: parse_uuid(&row.get::<_, String>(0)?),
                            query_id: parse_uuid(&row.get::<_, String>(1)?),
                            status: parse_status(&row.get::<_, String>(2)?),
                            amount: row.get(3)?,
                            justification: row.get(4)?,
                            referenced_clauses: serde_json::from_str(&clauses_raw)
                                .unwrap_or_default(),
                            created_at: parse_timestamp(&row.get::<_, String>(6)?),
                        })
                    },
                )
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| PolicyError::Storage(err.to_string()))
    }
}

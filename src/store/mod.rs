// Vector store module
// Durable keyed storage of embedded PDF passages, grouped by document

#[cfg(test)]
mod tests;

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LensError, Result};

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Embedding dimension produced by the default embedding model
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// A single embedded passage (usually one PDF page)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// Metadata stored alongside every embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Owning document
    pub document_id: String,
    /// 1-based page number within the document
    pub page_number: u32,
    /// Display name of the source PDF
    pub pdf_name: String,
    /// Literal text of the passage
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Caller-defined fields that have no fixed schema
    #[serde(flatten, default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Per-document view of the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub pdf_name: String,
    pub page_count: u64,
    pub record_count: u64,
    pub created_at: DateTime<Utc>,
}

impl RecordMetadata {
    #[inline]
    pub fn new(
        document_id: impl Into<String>,
        page_number: u32,
        pdf_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            page_number,
            pdf_name: pdf_name.into(),
            text: text.into(),
            timestamp: Utc::now(),
            extra: serde_json::Map::new(),
        }
    }

    #[inline]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl VectorRecord {
    /// Create a record with a freshly generated id
    #[inline]
    pub fn new(embedding: Vec<f32>, metadata: RecordMetadata) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), embedding, metadata)
    }

    #[inline]
    pub fn with_id(id: impl Into<String>, embedding: Vec<f32>, metadata: RecordMetadata) -> Self {
        Self {
            id: id.into(),
            embedding,
            metadata,
        }
    }

    /// Check everything a store must reject before touching persistent state
    #[inline]
    pub fn validate(&self, dimension: usize) -> Result<()> {
        validate_dimension(dimension, self.embedding.len())?;

        if self.id.trim().is_empty() {
            return Err(LensError::InvalidRecord("record id is empty".to_string()));
        }
        if self.metadata.document_id.trim().is_empty() {
            return Err(LensError::InvalidRecord(format!(
                "record {} has an empty document id",
                self.id
            )));
        }
        if self.metadata.pdf_name.trim().is_empty() {
            return Err(LensError::InvalidRecord(format!(
                "record {} has an empty pdf name",
                self.id
            )));
        }
        if self.metadata.page_number == 0 {
            return Err(LensError::InvalidRecord(format!(
                "record {} has page number 0 (pages are 1-based)",
                self.id
            )));
        }

        Ok(())
    }
}

#[inline]
pub fn validate_dimension(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(LensError::DimensionMismatch { expected, actual })
    }
}

/// Storage backend for vector records.
///
/// Every write call is atomic: either all of its records become visible to
/// readers or none do. Implementations never retry failed writes.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Fixed embedding length accepted by this store
    fn dimension(&self) -> usize;

    /// Insert or overwrite a single record
    #[inline]
    async fn put(&self, record: VectorRecord) -> Result<()> {
        self.put_batch(vec![record]).await.map(|_| ())
    }

    /// Insert or overwrite a batch of records as one transaction
    async fn put_batch(&self, records: Vec<VectorRecord>) -> Result<usize>;

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>>;

    /// Every stored record, ordered by document then page
    async fn get_all(&self) -> Result<Vec<VectorRecord>>;

    /// Remove a single record, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Distinct pdf names across all records, sorted
    async fn list_documents(&self) -> Result<Vec<String>>;

    async fn documents(&self) -> Result<Vec<DocumentSummary>>;

    /// Remove every record of the named document, returning how many went away
    async fn delete_by_document(&self, pdf_name: &str) -> Result<u64>;

    /// Remove everything, returning the number of records removed
    async fn clear(&self) -> Result<u64>;

    async fn document_exists(&self, pdf_name: &str) -> Result<bool>;

    async fn count(&self) -> Result<u64>;
}

/// Ensure a record's document identity agrees with what is already known.
///
/// `known` yields `(document_id, pdf_name)` pairs already stored or staged.
pub(crate) fn check_document_identity<'a, I>(metadata: &RecordMetadata, known: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    for (document_id, pdf_name) in known {
        if document_id == metadata.document_id && pdf_name != metadata.pdf_name {
            return Err(LensError::DocumentConflict {
                pdf_name: metadata.pdf_name.clone(),
                reason: format!(
                    "document {} is already stored under the name '{}'",
                    document_id, pdf_name
                ),
            });
        }
        if pdf_name == metadata.pdf_name && document_id != metadata.document_id {
            return Err(LensError::DocumentConflict {
                pdf_name: metadata.pdf_name.clone(),
                reason: format!("name is already used by document {}", document_id),
            });
        }
    }
    Ok(())
}

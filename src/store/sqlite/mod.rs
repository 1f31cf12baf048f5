
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, Pool, Sqlite, SqliteConnection};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{
    DocumentSummary, RecordMetadata, VectorRecord, VectorStore, check_document_identity,
    validate_dimension,
};
use crate::{LensError, Result};

const DIMENSION_KEY: &str = "embedding_dimension";
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const SELECT_VECTORS: &str = "SELECT id, document_id, page_number, pdf_name, text, timestamp, extra, embedding FROM vectors";

pub type DbPool = Pool<Sqlite>;

/// Vector store persisted in an embedded SQLite database
#[derive(Debug, Clone)]
pub struct SqliteVectorStore {
    pool: DbPool,
    dimension: usize,
    /// Held for the whole of every write transaction; SQLite cannot upgrade a
    /// deferred read lock once another connection has committed.
    write_lock: Arc<Mutex<()>>,
}

#[derive(Debug, FromRow)]
struct VectorRow {
    id: String,
    document_id: String,
    page_number: i64,
    pdf_name: String,
    text: String,
    timestamp: DateTime<Utc>,
    extra: String,
    embedding: Vec<u8>,
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    document_id: String,
    pdf_name: String,
    created_at: DateTime<Utc>,
    page_count: i64,
    record_count: i64,
}

impl VectorRow {
    fn into_record(self, dimension: usize) -> Result<VectorRecord> {
        let page_number = u32::try_from(self.page_number).map_err(|_| {
            LensError::Storage(format!(
                "Record {} has an out of range page number {}",
                self.id, self.page_number
            ))
        })?;

        let extra = serde_json::from_str(&self.extra).map_err(|e| {
            LensError::Storage(format!("Record {} has corrupt metadata: {}", self.id, e))
        })?;

        let embedding = decode_embedding(&self.embedding, dimension)
            .map_err(|e| LensError::Storage(format!("Record {}: {}", self.id, e)))?;

        Ok(VectorRecord {
            id: self.id,
            embedding,
            metadata: RecordMetadata {
                document_id: self.document_id,
                page_number,
                pdf_name: self.pdf_name,
                text: self.text,
                timestamp: self.timestamp,
                extra,
            },
        })
    }
}

impl SqliteVectorStore {
    /// Open (or create) the store at `path`.
    ///
    /// The embedding dimension is recorded on first open; reopening an
    /// existing store with a different dimension fails.
    #[inline]
    pub async fn open<P: AsRef<Path>>(path: P, dimension: usize) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening vector store at {}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LensError::Storage(format!(
                    "Failed to create vector store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| {
                LensError::Storage(format!("Failed to open vector store database: {}", e))
            })?;

        let store = Self {
            pool,
            dimension,
            write_lock: Arc::new(Mutex::new(())),
        };
        store.run_migrations().await?;
        store.check_dimension().await?;

        info!(
            "Vector store ready at {} ({} dimensions)",
            path.display(),
            dimension
        );
        Ok(store)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<()> {
        debug!("Running vector store migrations");

        sqlx::migrate!("src/store/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LensError::Storage(format!("Failed to run schema migration: {}", e)))?;

        Ok(())
    }

    async fn check_dimension(&self) -> Result<()> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT value FROM store_info WHERE key = ?")
                .bind(DIMENSION_KEY)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    LensError::Storage(format!("Failed to read store dimension: {}", e))
                })?;

        match stored {
            Some(value) => {
                let stored: usize = value.parse().map_err(|_| {
                    LensError::Storage(format!("Corrupt stored dimension '{}'", value))
                })?;
                validate_dimension(stored, self.dimension)
            }
            None => {
                sqlx::query("INSERT INTO store_info (key, value) VALUES (?, ?)")
                    .bind(DIMENSION_KEY)
                    .bind(self.dimension.to_string())
                    .execute(&self.pool)
                    .await
                    .map_err(|e| {
                        LensError::Storage(format!("Failed to record store dimension: {}", e))
                    })?;
                Ok(())
            }
        }
    }

    /// Insert the document row for `metadata` unless it already exists,
    /// enforcing one name per document and one document per name.
    async fn register_document(conn: &mut SqliteConnection, metadata: &RecordMetadata) -> Result<()> {
        let known: Vec<(String, String)> = sqlx::query_as(
            "SELECT document_id, pdf_name FROM documents WHERE document_id = ? OR pdf_name = ?",
        )
        .bind(&metadata.document_id)
        .bind(&metadata.pdf_name)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| LensError::Storage(format!("Failed to look up document: {}", e)))?;

        check_document_identity(
            metadata,
            known.iter().map(|(id, name)| (id.as_str(), name.as_str())),
        )?;

        if known.is_empty() {
            sqlx::query("INSERT INTO documents (document_id, pdf_name, created_at) VALUES (?, ?, ?)")
                .bind(&metadata.document_id)
                .bind(&metadata.pdf_name)
                .bind(Utc::now())
                .execute(&mut *conn)
                .await
                .map_err(|e| LensError::Storage(format!("Failed to register document: {}", e)))?;
        }

        Ok(())
    }

    async fn prune_documents(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            "DELETE FROM documents WHERE document_id NOT IN (SELECT DISTINCT document_id FROM vectors)",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| LensError::Storage(format!("Failed to prune documents: {}", e)))?;
        Ok(())
    }

    /// Reclaim space and refresh query planner statistics
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        info!("Optimizing vector store");
        let _write = self.write_lock.lock().await;

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(|e| LensError::Storage(format!("Failed to vacuum database: {}", e)))?;

        sqlx::query("ANALYZE")
            .execute(&self.pool)
            .await
            .map_err(|e| LensError::Storage(format!("Failed to analyze database: {}", e)))?;

        debug!("Vector store optimization completed");
        Ok(())
    }

    #[inline]
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn put_batch(&self, records: Vec<VectorRecord>) -> Result<usize> {
        if records.is_empty() {
            debug!("No records to store");
            return Ok(0);
        }

        for record in &records {
            record.validate(self.dimension)?;
        }

        let _write = self.write_lock.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LensError::Storage(format!("Failed to begin transaction: {}", e)))?;

        for record in &records {
            Self::register_document(&mut tx, &record.metadata).await?;

            let extra = serde_json::to_string(&record.metadata.extra).map_err(|e| {
                LensError::Storage(format!("Failed to encode metadata for {}: {}", record.id, e))
            })?;

            sqlx::query(
                "INSERT OR REPLACE INTO vectors (id, document_id, page_number, pdf_name, text, timestamp, extra, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.id)
            .bind(&record.metadata.document_id)
            .bind(i64::from(record.metadata.page_number))
            .bind(&record.metadata.pdf_name)
            .bind(&record.metadata.text)
            .bind(record.metadata.timestamp)
            .bind(extra)
            .bind(encode_embedding(&record.embedding))
            .execute(&mut *tx)
            .await
            .map_err(|e| LensError::Storage(format!("Failed to insert record {}: {}", record.id, e)))?;
        }

        Self::prune_documents(&mut tx).await?;

        tx.commit()
            .await
            .map_err(|e| LensError::Storage(format!("Failed to commit records: {}", e)))?;

        debug!("Stored {} records", records.len());
        Ok(records.len())
    }

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        let row: Option<VectorRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_VECTORS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LensError::Storage(format!("Failed to get record {}: {}", id, e)))?;

        row.map(|row| row.into_record(self.dimension)).transpose()
    }

    async fn get_all(&self) -> Result<Vec<VectorRecord>> {
        let query = format!("{} ORDER BY document_id, page_number, id", SELECT_VECTORS);
        let mut rows = sqlx::query_as::<_, VectorRow>(&query).fetch(&self.pool);

        let mut records = Vec::new();
        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| LensError::Storage(format!("Failed to read records: {}", e)))?
        {
            records.push(row.into_record(self.dimension)?);
        }

        debug!("Loaded {} records", records.len());
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let _write = self.write_lock.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LensError::Storage(format!("Failed to begin transaction: {}", e)))?;

        let deleted = sqlx::query("DELETE FROM vectors WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| LensError::Storage(format!("Failed to delete record {}: {}", id, e)))?
            .rows_affected();

        Self::prune_documents(&mut tx).await?;

        tx.commit()
            .await
            .map_err(|e| LensError::Storage(format!("Failed to commit delete: {}", e)))?;

        Ok(deleted > 0)
    }

    async fn list_documents(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT DISTINCT pdf_name FROM vectors ORDER BY pdf_name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LensError::Storage(format!("Failed to list documents: {}", e)))
    }

    async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            r#"
            SELECT d.document_id,
                   d.pdf_name,
                   d.created_at,
                   COUNT(DISTINCT v.page_number) AS page_count,
                   COUNT(v.id) AS record_count
            FROM documents d
            JOIN vectors v ON v.document_id = d.document_id
            GROUP BY d.document_id, d.pdf_name, d.created_at
            ORDER BY d.pdf_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LensError::Storage(format!("Failed to summarize documents: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| DocumentSummary {
                document_id: row.document_id,
                pdf_name: row.pdf_name,
                page_count: row.page_count.unsigned_abs(),
                record_count: row.record_count.unsigned_abs(),
                created_at: row.created_at,
            })
            .collect())
    }

    async fn delete_by_document(&self, pdf_name: &str) -> Result<u64> {
        debug!("Deleting records for document: {}", pdf_name);

        let _write = self.write_lock.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LensError::Storage(format!("Failed to begin transaction: {}", e)))?;

        let deleted = sqlx::query("DELETE FROM vectors WHERE pdf_name = ?")
            .bind(pdf_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                LensError::Storage(format!("Failed to delete document records: {}", e))
            })?
            .rows_affected();

        sqlx::query("DELETE FROM documents WHERE pdf_name = ?")
            .bind(pdf_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| LensError::Storage(format!("Failed to delete document: {}", e)))?;

        Self::prune_documents(&mut tx).await?;

        tx.commit()
            .await
            .map_err(|e| LensError::Storage(format!("Failed to commit document delete: {}", e)))?;

        info!("Deleted {} records for document: {}", deleted, pdf_name);
        Ok(deleted)
    }

    async fn clear(&self) -> Result<u64> {
        let _write = self.write_lock.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LensError::Storage(format!("Failed to begin transaction: {}", e)))?;

        let deleted = sqlx::query("DELETE FROM vectors")
            .execute(&mut *tx)
            .await
            .map_err(|e| LensError::Storage(format!("Failed to clear records: {}", e)))?
            .rows_affected();

        sqlx::query("DELETE FROM documents")
            .execute(&mut *tx)
            .await
            .map_err(|e| LensError::Storage(format!("Failed to clear documents: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| LensError::Storage(format!("Failed to commit clear: {}", e)))?;

        info!("Cleared {} records from vector store", deleted);
        Ok(deleted)
    }

    async fn document_exists(&self, pdf_name: &str) -> Result<bool> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM vectors WHERE pdf_name = ?)")
                .bind(pdf_name)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    LensError::Storage(format!("Failed to check document existence: {}", e))
                })?;

        Ok(exists != 0)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LensError::Storage(format!("Failed to count records: {}", e)))?;

        Ok(count.unsigned_abs())
    }
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_embedding(blob: &[u8], dimension: usize) -> std::result::Result<Vec<f32>, String> {
    let expected = dimension * 4;
    if blob.len() != expected {
        return Err(format!(
            "embedding blob has {} bytes, expected {}",
            blob.len(),
            expected
        ));
    }

    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

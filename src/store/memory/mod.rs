#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::{DocumentSummary, VectorRecord, VectorStore, check_document_identity};
use crate::Result;

/// Ephemeral store kept entirely in memory.
///
/// Used for tests and for callers that rebuild their corpus on every run.
#[derive(Debug)]
pub struct MemoryVectorStore {
    dimension: usize,
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<String, VectorRecord>,
    /// document_id -> (pdf_name, created_at)
    documents: HashMap<String, (String, DateTime<Utc>)>,
}

impl MemoryState {
    fn prune_documents(&mut self) {
        let live: BTreeSet<&str> = self
            .records
            .values()
            .map(|r| r.metadata.document_id.as_str())
            .collect();
        self.documents.retain(|id, _| live.contains(id.as_str()));
    }
}

impl MemoryVectorStore {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            state: RwLock::new(MemoryState::default()),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn put_batch(&self, records: Vec<VectorRecord>) -> Result<usize> {
        let mut state = self.state.write().await;

        // Validate the whole batch before mutating anything so a bad record
        // leaves the store untouched.
        let mut staged: Vec<(String, String)> = Vec::new();
        for record in &records {
            record.validate(self.dimension)?;

            let known = state
                .documents
                .iter()
                .map(|(id, (name, _))| (id.as_str(), name.as_str()))
                .chain(staged.iter().map(|(id, name)| (id.as_str(), name.as_str())));
            check_document_identity(&record.metadata, known)?;

            staged.push((
                record.metadata.document_id.clone(),
                record.metadata.pdf_name.clone(),
            ));
        }

        let now = Utc::now();
        let inserted = records.len();
        for record in records {
            state
                .documents
                .entry(record.metadata.document_id.clone())
                .or_insert_with(|| (record.metadata.pdf_name.clone(), now));
            state.records.insert(record.id.clone(), record);
        }
        state.prune_documents();

        debug!("Stored {} records in memory", inserted);
        Ok(inserted)
    }

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        Ok(self.state.read().await.records.get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<VectorRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<VectorRecord> = state.records.values().cloned().collect();
        records.sort_by(|a, b| {
            a.metadata
                .document_id
                .cmp(&b.metadata.document_id)
                .then(a.metadata.page_number.cmp(&b.metadata.page_number))
                .then(a.id.cmp(&b.id))
        });
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let removed = state.records.remove(id).is_some();
        if removed {
            state.prune_documents();
        }
        Ok(removed)
    }

    async fn list_documents(&self) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let names: BTreeSet<&str> = state
            .records
            .values()
            .map(|r| r.metadata.pdf_name.as_str())
            .collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        let state = self.state.read().await;

        let mut grouped: BTreeMap<(&str, &str), (BTreeSet<u32>, u64)> = BTreeMap::new();
        for record in state.records.values() {
            let entry = grouped
                .entry((
                    record.metadata.pdf_name.as_str(),
                    record.metadata.document_id.as_str(),
                ))
                .or_default();
            entry.0.insert(record.metadata.page_number);
            entry.1 += 1;
        }

        Ok(grouped
            .into_iter()
            .map(|((pdf_name, document_id), (pages, record_count))| DocumentSummary {
                document_id: document_id.to_string(),
                pdf_name: pdf_name.to_string(),
                page_count: pages.len() as u64,
                record_count,
                created_at: state
                    .documents
                    .get(document_id)
                    .map_or_else(Utc::now, |(_, created_at)| *created_at),
            })
            .collect())
    }

    async fn delete_by_document(&self, pdf_name: &str) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.records.len();
        state.records.retain(|_, r| r.metadata.pdf_name != pdf_name);
        let deleted = (before - state.records.len()) as u64;
        state.prune_documents();

        debug!("Deleted {} records for document {}", deleted, pdf_name);
        Ok(deleted)
    }

    async fn clear(&self) -> Result<u64> {
        let mut state = self.state.write().await;
        let deleted = state.records.len() as u64;
        state.records.clear();
        state.documents.clear();
        Ok(deleted)
    }

    async fn document_exists(&self, pdf_name: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .records
            .values()
            .any(|r| r.metadata.pdf_name == pdf_name))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.state.read().await.records.len() as u64)
    }
}

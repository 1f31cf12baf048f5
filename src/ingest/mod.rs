#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Result;
use crate::embeddings::Embedder;
use crate::store::{RecordMetadata, VectorRecord, VectorStore, validate_dimension};

const PAGE_SEPARATOR: char = '\u{c}';

/// Extracted text of one PDF page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based
    pub page_number: u32,
    pub text: String,
}

impl PageText {
    #[inline]
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPage {
    pub page_number: u32,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub pdf_name: String,
    /// The document had records before this run
    pub already_present: bool,
    pub pages_stored: usize,
    /// Pages whose record was already stored and were not embedded again
    pub pages_skipped: usize,
    pub blank_pages: usize,
    pub failed_pages: Vec<FailedPage>,
}

impl IngestReport {
    fn new(document_id: &str, pdf_name: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            pdf_name: pdf_name.to_string(),
            already_present: false,
            pages_stored: 0,
            pages_skipped: 0,
            blank_pages: 0,
            failed_pages: Vec::new(),
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failed_pages.is_empty()
    }
}

/// Split text from a PDF extractor into pages on form-feed characters.
///
/// Page numbers start at 1 and follow the separators, so blank pages keep
/// their position.
#[inline]
pub fn split_pages(text: &str) -> Vec<PageText> {
    text.split(PAGE_SEPARATOR)
        .zip(1_u32..)
        .map(|(page, number)| PageText::new(number, page))
        .collect()
}

/// Id of the record holding one page; re-ingesting a page overwrites it
#[inline]
pub fn page_record_id(document_id: &str, page_number: u32) -> String {
    format!("{}:{}", document_id, page_number)
}

/// Embeds document pages and writes them to a store, one page per write
pub struct DocumentIngestor<S: VectorStore + ?Sized, E: Embedder + ?Sized + 'static> {
    store: Arc<S>,
    embedder: Arc<E>,
}

impl<S, E> DocumentIngestor<S, E>
where
    S: VectorStore + ?Sized,
    E: Embedder + ?Sized + 'static,
{
    #[inline]
    pub fn new(store: Arc<S>, embedder: Arc<E>) -> Self {
        Self { store, embedder }
    }

    /// Embed and store every non-blank page of a document.
    ///
    /// Pages of an already stored document that have a record are skipped, so
    /// running this again after a partial failure fills in only the missing
    /// pages. A page that fails to embed or store is reported without undoing
    /// earlier pages.
    #[inline]
    pub async fn ingest(
        &self,
        document_id: &str,
        pdf_name: &str,
        pages: Vec<PageText>,
    ) -> Result<IngestReport> {
        validate_dimension(self.store.dimension(), self.embedder.dimension())?;

        let mut report = IngestReport::new(document_id, pdf_name);
        report.already_present = self.store.document_exists(pdf_name).await?;

        info!(
            "Ingesting '{}' ({} pages) as document {}{}",
            pdf_name,
            pages.len(),
            document_id,
            if report.already_present {
                ", resuming"
            } else {
                ""
            }
        );

        for page in pages {
            let text = page.text.trim();
            if text.is_empty() {
                debug!("Skipping blank page {}", page.page_number);
                report.blank_pages += 1;
                continue;
            }

            if report.already_present
                && self
                    .store
                    .get(&page_record_id(document_id, page.page_number))
                    .await?
                    .is_some()
            {
                debug!("Page {} is already stored", page.page_number);
                report.pages_skipped += 1;
                continue;
            }

            match self
                .ingest_page(document_id, pdf_name, page.page_number, text)
                .await
            {
                Ok(()) => report.pages_stored += 1,
                Err(e) => {
                    warn!(
                        "Failed to ingest page {} of '{}': {}",
                        page.page_number, pdf_name, e
                    );
                    report.failed_pages.push(FailedPage {
                        page_number: page.page_number,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Stored {} pages of '{}' ({} already stored, {} blank, {} failed)",
            report.pages_stored,
            pdf_name,
            report.pages_skipped,
            report.blank_pages,
            report.failed_pages.len()
        );
        Ok(report)
    }

    /// Split `text` on form feeds and ingest the pages
    #[inline]
    pub async fn ingest_text(
        &self,
        document_id: &str,
        pdf_name: &str,
        text: &str,
    ) -> Result<IngestReport> {
        self.ingest(document_id, pdf_name, split_pages(text)).await
    }

    async fn ingest_page(
        &self,
        document_id: &str,
        pdf_name: &str,
        page_number: u32,
        text: &str,
    ) -> Result<()> {
        let embedder = Arc::clone(&self.embedder);
        let owned_text = text.to_string();
        let embedding = tokio::task::spawn_blocking(move || embedder.embed(&owned_text)).await??;

        let record = VectorRecord::with_id(
            page_record_id(document_id, page_number),
            embedding,
            RecordMetadata::new(document_id, page_number, pdf_name, text),
        );
        self.store.put(record).await
    }
}

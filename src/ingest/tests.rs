use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::LensError;
use crate::store::MemoryVectorStore;

/// Deterministic embedder: vector derived from text length and vowel count
struct FakeEmbedder {
    dimension: usize,
    /// Calls left that fail for text containing "flaky"
    flaky_failures: AtomicUsize,
}

impl FakeEmbedder {
    fn new(dimension: usize) -> Self {
        Self {
            dimension,
            flaky_failures: AtomicUsize::new(0),
        }
    }
}

impl Embedder for FakeEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                if text.contains("corrupt") {
                    return Err(LensError::Embedding("provider rejected input".to_string()));
                }
                if text.contains("flaky")
                    && self
                        .flaky_failures
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok()
                {
                    return Err(LensError::Embedding("provider timed out".to_string()));
                }
                let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
                let mut v = vec![0.0; self.dimension];
                v[0] = text.len() as f32;
                v[1] = vowels as f32;
                v[2] = 1.0;
                Ok(v)
            })
            .collect()
    }
}

fn ingestor(dimension: usize) -> DocumentIngestor<MemoryVectorStore, FakeEmbedder> {
    DocumentIngestor::new(
        Arc::new(MemoryVectorStore::new(4)),
        Arc::new(FakeEmbedder::new(dimension)),
    )
}

#[test]
fn split_pages_numbers_from_one() {
    let pages = split_pages("first page\u{c}second page\u{c}\u{c}fourth");
    assert_eq!(pages.len(), 4);
    assert_eq!(pages[0], PageText::new(1, "first page"));
    assert_eq!(pages[1], PageText::new(2, "second page"));
    assert_eq!(pages[2], PageText::new(3, ""));
    assert_eq!(pages[3], PageText::new(4, "fourth"));
}

#[test]
fn split_pages_without_separator_is_one_page() {
    let pages = split_pages("just one page");
    assert_eq!(pages, vec![PageText::new(1, "just one page")]);
}

#[test]
fn page_ids_are_stable() {
    assert_eq!(page_record_id("doc-1", 3), "doc-1:3");
}

#[tokio::test]
async fn ingest_stores_one_record_per_page() {
    let ingestor = ingestor(4);
    let pages = vec![
        PageText::new(1, "Sam Walton founded Walmart"),
        PageText::new(2, "   "),
        PageText::new(3, "Retail history continues"),
    ];

    let report = ingestor
        .ingest("doc-1", "walmart.pdf", pages)
        .await
        .expect("ingest should succeed");

    assert!(report.is_complete());
    assert!(!report.already_present);
    assert_eq!(report.pages_stored, 2);
    assert_eq!(report.blank_pages, 1);

    let store = &ingestor.store;
    assert_eq!(store.count().await.expect("count"), 2);
    let page = store
        .get("doc-1:3")
        .await
        .expect("get should succeed")
        .expect("page 3 should be stored");
    assert_eq!(page.metadata.page_number, 3);
    assert_eq!(page.metadata.pdf_name, "walmart.pdf");
    assert_eq!(page.metadata.text, "Retail history continues");
    assert!(store.get("doc-1:2").await.expect("get").is_none());
}

#[tokio::test]
async fn existing_document_is_skipped() {
    let ingestor = ingestor(4);
    ingestor
        .ingest_text("doc-1", "report.pdf", "page one\u{c}page two")
        .await
        .expect("first ingest should succeed");

    let report = ingestor
        .ingest_text("doc-1", "report.pdf", "changed text")
        .await
        .expect("second ingest should succeed");

    assert!(report.already_present);
    assert_eq!(report.pages_stored, 0);
    assert_eq!(report.pages_skipped, 1);
    let first = ingestor
        .store
        .get("doc-1:1")
        .await
        .expect("get")
        .expect("page 1 should still exist");
    assert_eq!(first.metadata.text, "page one");
}

#[tokio::test]
async fn failed_page_does_not_undo_earlier_pages() {
    let ingestor = ingestor(4);
    let pages = split_pages("good page\u{c}corrupt page\u{c}another good page");

    let report = ingestor
        .ingest("doc-1", "mixed.pdf", pages)
        .await
        .expect("ingest should report, not fail");

    assert!(!report.is_complete());
    assert_eq!(report.pages_stored, 2);
    assert_eq!(report.failed_pages.len(), 1);
    assert_eq!(report.failed_pages[0].page_number, 2);
    assert!(report.failed_pages[0].error.contains("provider rejected"));

    let store = &ingestor.store;
    assert!(store.get("doc-1:1").await.expect("get").is_some());
    assert!(store.get("doc-1:3").await.expect("get").is_some());
    assert!(store.document_exists("mixed.pdf").await.expect("exists"));
}

#[tokio::test]
async fn rerun_after_failure_stores_missing_pages() {
    let embedder = FakeEmbedder::new(4);
    embedder.flaky_failures.store(1, Ordering::SeqCst);
    let ingestor = DocumentIngestor::new(Arc::new(MemoryVectorStore::new(4)), Arc::new(embedder));
    let text = "first page\u{c}flaky second page\u{c}third page";

    let first = ingestor
        .ingest_text("doc-1", "retry.pdf", text)
        .await
        .expect("first run should report, not fail");
    assert_eq!(first.pages_stored, 2);
    assert_eq!(first.failed_pages.len(), 1);
    assert_eq!(first.failed_pages[0].page_number, 2);
    assert!(ingestor.store.get("doc-1:2").await.expect("get").is_none());

    let second = ingestor
        .ingest_text("doc-1", "retry.pdf", text)
        .await
        .expect("second run should succeed");
    assert!(second.already_present);
    assert!(second.is_complete());
    assert_eq!(second.pages_stored, 1);
    assert_eq!(second.pages_skipped, 2);

    let page = ingestor
        .store
        .get("doc-1:2")
        .await
        .expect("get")
        .expect("page 2 should be stored on the second run");
    assert_eq!(page.metadata.text, "flaky second page");
    assert_eq!(ingestor.store.count().await.expect("count"), 3);
}

#[tokio::test]
async fn name_conflict_is_reported_per_page() {
    let ingestor = ingestor(4);
    ingestor
        .ingest_text("doc-1", "shared.pdf", "original")
        .await
        .expect("first ingest");

    // Reusing a stored document id under a new name conflicts on every page
    let report = ingestor
        .ingest_text("doc-1", "renamed.pdf", "page a\u{c}page b")
        .await
        .expect("ingest should report conflicts");

    assert_eq!(report.pages_stored, 0);
    assert_eq!(report.failed_pages.len(), 2);
    assert!(report.failed_pages[0].error.contains("renamed.pdf"));
}

#[tokio::test]
async fn embedder_dimension_must_match_store() {
    let ingestor = ingestor(8);
    let err = ingestor
        .ingest_text("doc-1", "a.pdf", "text")
        .await
        .expect_err("8-d embedder against 4-d store");

    assert!(matches!(
        err,
        LensError::DimensionMismatch {
            expected: 4,
            actual: 8
        }
    ));
}

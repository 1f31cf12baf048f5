use super::*;
use crate::LensError;
use crate::store::RecordMetadata;

fn record(id: &str, document_id: &str, page: u32, pdf_name: &str, text: &str) -> VectorRecord {
    VectorRecord::with_id(
        id,
        vec![page as f32, 1.0, 0.5],
        RecordMetadata::new(document_id, page, pdf_name, text),
    )
}

#[tokio::test]
async fn put_then_read_back() {
    let store = MemoryVectorStore::new(3);
    store
        .put(record("a-1", "doc-a", 1, "a.pdf", "first page"))
        .await
        .expect("put should succeed");

    let fetched = store
        .get("a-1")
        .await
        .expect("get should succeed")
        .expect("record should exist");
    assert_eq!(fetched.metadata.text, "first page");
    assert_eq!(store.count().await.expect("count"), 1);
    assert!(store.document_exists("a.pdf").await.expect("exists"));
}

#[tokio::test]
async fn put_overwrites_by_id() {
    let store = MemoryVectorStore::new(3);
    store
        .put(record("a-1", "doc-a", 1, "a.pdf", "old text"))
        .await
        .expect("first put");
    store
        .put(record("a-1", "doc-a", 1, "a.pdf", "new text"))
        .await
        .expect("second put");

    let all = store.get_all().await.expect("get_all");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].metadata.text, "new text");
}

#[tokio::test]
async fn failed_batch_leaves_store_unchanged() {
    let store = MemoryVectorStore::new(3);
    store
        .put(record("a-1", "doc-a", 1, "a.pdf", "kept"))
        .await
        .expect("seed put");

    let mut bad = record("b-2", "doc-b", 2, "b.pdf", "bad");
    bad.embedding = vec![1.0; 5];
    let batch = vec![record("b-1", "doc-b", 1, "b.pdf", "good"), bad];

    let err = store.put_batch(batch).await.expect_err("batch must fail");
    assert!(matches!(
        err,
        LensError::DimensionMismatch {
            expected: 3,
            actual: 5
        }
    ));

    assert_eq!(store.count().await.expect("count"), 1);
    assert!(!store.document_exists("b.pdf").await.expect("exists"));
}

#[tokio::test]
async fn name_conflict_within_batch_is_rejected() {
    let store = MemoryVectorStore::new(3);
    let batch = vec![
        record("x-1", "doc-x", 1, "shared.pdf", "one"),
        record("y-1", "doc-y", 1, "shared.pdf", "two"),
    ];

    let err = store.put_batch(batch).await.expect_err("conflict expected");
    assert!(matches!(err, LensError::DocumentConflict { .. }));
    assert_eq!(store.count().await.expect("count"), 0);
}

#[tokio::test]
async fn get_all_orders_by_document_then_page() {
    let store = MemoryVectorStore::new(3);
    store
        .put_batch(vec![
            record("z", "doc-b", 2, "b.pdf", "b2"),
            record("y", "doc-a", 3, "a.pdf", "a3"),
            record("x", "doc-b", 1, "b.pdf", "b1"),
            record("w", "doc-a", 1, "a.pdf", "a1"),
        ])
        .await
        .expect("batch put");

    let texts: Vec<String> = store
        .get_all()
        .await
        .expect("get_all")
        .into_iter()
        .map(|r| r.metadata.text)
        .collect();
    assert_eq!(texts, vec!["a1", "a3", "b1", "b2"]);
}

#[tokio::test]
async fn delete_last_record_forgets_document() {
    let store = MemoryVectorStore::new(3);
    store
        .put(record("a-1", "doc-a", 1, "a.pdf", "only page"))
        .await
        .expect("put");

    assert!(store.delete("a-1").await.expect("delete"));
    assert!(!store.delete("a-1").await.expect("second delete"));
    assert!(store.list_documents().await.expect("list").is_empty());
    assert!(store.documents().await.expect("documents").is_empty());

    // The name is free again for a different document id
    store
        .put(record("c-1", "doc-c", 1, "a.pdf", "reused name"))
        .await
        .expect("name should be reusable");
}

#[tokio::test]
async fn document_summaries_count_pages() {
    let store = MemoryVectorStore::new(3);
    store
        .put_batch(vec![
            record("a-1", "doc-a", 1, "a.pdf", "p1"),
            record("a-2", "doc-a", 2, "a.pdf", "p2"),
            record("a-2b", "doc-a", 2, "a.pdf", "p2 second chunk"),
            record("b-1", "doc-b", 1, "b.pdf", "p1"),
        ])
        .await
        .expect("batch put");

    let summaries = store.documents().await.expect("documents");
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].pdf_name, "a.pdf");
    assert_eq!(summaries[0].page_count, 2);
    assert_eq!(summaries[0].record_count, 3);
    assert_eq!(summaries[1].document_id, "doc-b");
}

#[tokio::test]
async fn clear_reports_removed_count() {
    let store = MemoryVectorStore::new(3);
    store
        .put_batch(vec![
            record("a-1", "doc-a", 1, "a.pdf", "p1"),
            record("b-1", "doc-b", 1, "b.pdf", "p1"),
        ])
        .await
        .expect("batch put");

    assert_eq!(store.clear().await.expect("clear"), 2);
    assert_eq!(store.count().await.expect("count"), 0);
    assert_eq!(store.clear().await.expect("second clear"), 0);
}

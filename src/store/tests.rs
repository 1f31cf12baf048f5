use super::*;

fn metadata(document_id: &str, page: u32, pdf_name: &str) -> RecordMetadata {
    RecordMetadata::new(document_id, page, pdf_name, "Some passage text")
}

#[test]
fn new_record_gets_unique_id() {
    let first = VectorRecord::new(vec![0.0; 4], metadata("doc-1", 1, "a.pdf"));
    let second = VectorRecord::new(vec![0.0; 4], metadata("doc-1", 2, "a.pdf"));

    assert!(!first.id.is_empty());
    assert_ne!(first.id, second.id);
}

#[test]
fn validate_rejects_wrong_dimension() {
    let record = VectorRecord::with_id("r1", vec![0.1, 0.2, 0.3], metadata("doc-1", 1, "a.pdf"));

    let err = record.validate(4).expect_err("3-dimensional vector must be rejected");
    assert!(matches!(
        err,
        LensError::DimensionMismatch {
            expected: 4,
            actual: 3
        }
    ));
    assert!(record.validate(3).is_ok());
}

#[test]
fn validate_rejects_zero_page_and_blank_names() {
    let zero_page = VectorRecord::with_id("r1", vec![0.0; 2], metadata("doc-1", 0, "a.pdf"));
    assert!(matches!(
        zero_page.validate(2),
        Err(LensError::InvalidRecord(_))
    ));

    let blank_name = VectorRecord::with_id("r2", vec![0.0; 2], metadata("doc-1", 1, "  "));
    assert!(matches!(
        blank_name.validate(2),
        Err(LensError::InvalidRecord(_))
    ));

    let blank_document = VectorRecord::with_id("r3", vec![0.0; 2], metadata("", 1, "a.pdf"));
    assert!(matches!(
        blank_document.validate(2),
        Err(LensError::InvalidRecord(_))
    ));
}

#[test]
fn document_identity_allows_same_pairing() {
    let meta = metadata("doc-1", 1, "a.pdf");
    assert!(check_document_identity(&meta, [("doc-1", "a.pdf"), ("doc-2", "b.pdf")]).is_ok());
}

#[test]
fn document_identity_rejects_name_reuse() {
    let meta = metadata("doc-2", 1, "a.pdf");
    let err = check_document_identity(&meta, [("doc-1", "a.pdf")])
        .expect_err("a.pdf already belongs to doc-1");
    assert!(matches!(err, LensError::DocumentConflict { .. }));
}

#[test]
fn document_identity_rejects_renamed_document() {
    let meta = metadata("doc-1", 3, "renamed.pdf");
    let err = check_document_identity(&meta, [("doc-1", "a.pdf")])
        .expect_err("doc-1 is already stored as a.pdf");
    assert!(matches!(err, LensError::DocumentConflict { .. }));
}

#[test]
fn metadata_extra_fields_flatten_in_json() {
    let meta = metadata("doc-1", 2, "a.pdf").with_extra("section", serde_json::json!("Intro"));
    let json = serde_json::to_value(&meta).expect("metadata should serialize");

    assert_eq!(json["section"], "Intro");
    assert_eq!(json["page_number"], 2);

    let parsed: RecordMetadata = serde_json::from_value(json).expect("metadata should parse");
    assert_eq!(parsed, meta);
}

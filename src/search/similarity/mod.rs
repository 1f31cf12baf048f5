
use std::cmp::Ordering;

use tracing::debug;

use crate::Result;
use crate::store::{RecordMetadata, VectorRecord, validate_dimension};

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when either vector has zero magnitude (or is empty) so that
/// degenerate embeddings never produce NaN.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|y| y * y).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (mag_a * mag_b);
    if similarity.is_nan() {
        0.0
    } else {
        similarity.clamp(-1.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimilarityQuery<'a> {
    pub embedding: &'a [f32],
    /// Raw query text, used for the literal-containment boost
    pub text: Option<&'a str>,
    /// Skip every record belonging to this document id
    pub exclude_document: Option<&'a str>,
    pub limit: usize,
    pub threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    pub record_id: String,
    pub metadata: RecordMetadata,
    pub similarity: f32,
    /// Candidate text contains the query verbatim (case-insensitive)
    pub exact_match: bool,
}

/// Brute-force cosine ranking over a store snapshot
#[derive(Debug, Clone, Copy)]
pub struct SimilarityEngine {
    dimension: usize,
}

impl SimilarityEngine {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Rank `candidates` against the query embedding.
    ///
    /// Literal containment of the query text overrides the cosine score with
    /// 1.0. Results keep only similarity above the threshold or exact matches,
    /// ordered by exact match, then similarity, then record id.
    #[inline]
    pub fn search(
        &self,
        query: &SimilarityQuery<'_>,
        candidates: &[VectorRecord],
    ) -> Result<Vec<SemanticMatch>> {
        validate_dimension(self.dimension, query.embedding.len())?;

        let needle = query
            .text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        let mut matches = Vec::new();
        for record in candidates {
            if query
                .exclude_document
                .is_some_and(|excluded| excluded == record.metadata.document_id)
            {
                continue;
            }

            validate_dimension(self.dimension, record.embedding.len())?;

            let exact_match = needle
                .as_deref()
                .is_some_and(|n| record.metadata.text.to_lowercase().contains(n));

            let similarity = if exact_match {
                1.0
            } else {
                cosine_similarity(query.embedding, &record.embedding)
            };

            if exact_match || similarity > query.threshold {
                matches.push(SemanticMatch {
                    record_id: record.id.clone(),
                    metadata: record.metadata.clone(),
                    similarity,
                    exact_match,
                });
            }
        }

        matches.sort_by(compare_matches);
        matches.truncate(query.limit);

        debug!(
            "Semantic search kept {} of {} candidates",
            matches.len(),
            candidates.len()
        );
        Ok(matches)
    }
}

fn compare_matches(a: &SemanticMatch, b: &SemanticMatch) -> Ordering {
    b.exact_match
        .cmp(&a.exact_match)
        .then_with(|| b.similarity.total_cmp(&a.similarity))
        .then_with(|| a.record_id.cmp(&b.record_id))
}


use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::store::{RecordMetadata, VectorRecord};

/// Lower-case `text`, drop punctuation and collapse whitespace.
///
/// Word boundaries follow Unicode segmentation rules, so the result is the
/// space-joined sequence of tokens produced by [`tokenize`].
#[inline]
pub fn normalize(text: &str) -> String {
    tokenize(text).join(" ")
}

#[inline]
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordMatch {
    pub record_id: String,
    pub metadata: RecordMetadata,
    /// Sum of TF-IDF contributions of the query terms
    pub score: f32,
    /// 1.0 for a verbatim phrase match, otherwise the fraction of distinct
    /// query terms present in the candidate
    pub exact_match_score: f32,
}

struct ScoredDocument<'a> {
    record: &'a VectorRecord,
    normalized: String,
    term_counts: HashMap<String, usize>,
    token_count: usize,
}

/// Lexical relevance scoring that needs no embeddings
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordScorer;

impl KeywordScorer {
    #[inline]
    pub fn new() -> Self {
        Self
    }

    /// Score every candidate containing at least one query term.
    ///
    /// A query with no usable terms yields an empty list.
    #[inline]
    pub fn score(&self, query: &str, candidates: &[VectorRecord]) -> Vec<KeywordMatch> {
        let query_terms: Vec<String> = tokenize(query).into_iter().unique().collect();
        if query_terms.is_empty() {
            debug!("Keyword query has no usable terms");
            return Vec::new();
        }
        let query_phrase = normalize(query);

        let documents: Vec<ScoredDocument<'_>> = candidates
            .iter()
            .map(|record| {
                let tokens = tokenize(&record.metadata.text);
                let token_count = tokens.len();
                let normalized = tokens.join(" ");
                let term_counts = tokens.into_iter().counts();
                ScoredDocument {
                    record,
                    normalized,
                    term_counts,
                    token_count,
                }
            })
            .collect();

        let idf = inverse_document_frequencies(&query_terms, &documents);

        let mut matches: Vec<KeywordMatch> = documents
            .iter()
            .filter_map(|doc| {
                let mut score = 0.0_f32;
                let mut matched_terms = 0_usize;

                for term in &query_terms {
                    if let Some(&count) = doc.term_counts.get(term) {
                        let tf = count as f32 / doc.token_count as f32;
                        score += tf * idf.get(term).copied().unwrap_or(0.0);
                        matched_terms += 1;
                    }
                }

                if matched_terms == 0 {
                    return None;
                }

                let exact_match_score = if doc.normalized.contains(&query_phrase) {
                    1.0
                } else {
                    matched_terms as f32 / query_terms.len() as f32
                };

                Some(KeywordMatch {
                    record_id: doc.record.id.clone(),
                    metadata: doc.record.metadata.clone(),
                    score,
                    exact_match_score,
                })
            })
            .collect();

        matches.sort_by(compare_matches);

        debug!(
            "Keyword search matched {} of {} candidates for {} terms",
            matches.len(),
            candidates.len(),
            query_terms.len()
        );
        matches
    }
}

/// Smoothed IDF: `ln((N + 1) / (df + 1)) + 1`, always positive
fn inverse_document_frequencies(
    terms: &[String],
    documents: &[ScoredDocument<'_>],
) -> HashMap<String, f32> {
    let total = documents.len() as f32;
    let wanted: HashSet<&str> = terms.iter().map(String::as_str).collect();

    let mut document_frequency: HashMap<&str, usize> = HashMap::new();
    for doc in documents {
        for term in doc.term_counts.keys() {
            if wanted.contains(term.as_str()) {
                *document_frequency.entry(term.as_str()).or_default() += 1;
            }
        }
    }

    terms
        .iter()
        .map(|term| {
            let df = document_frequency.get(term.as_str()).copied().unwrap_or(0) as f32;
            (term.clone(), ((total + 1.0) / (df + 1.0)).ln() + 1.0)
        })
        .collect()
}

fn compare_matches(a: &KeywordMatch, b: &KeywordMatch) -> Ordering {
    b.exact_match_score
        .total_cmp(&a.exact_match_score)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.record_id.cmp(&b.record_id))
}

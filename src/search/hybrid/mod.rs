
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;
use crate::config::ConfigError;
use crate::search::ScoredResult;
use crate::search::keyword::{KeywordMatch, KeywordScorer};
use crate::search::similarity::{SemanticMatch, SimilarityEngine, SimilarityQuery};
use crate::store::{RecordMetadata, VectorStore};

/// Each sub-search returns this many times the requested limit before fusion
const CANDIDATE_MULTIPLIER: usize = 2;

/// Tunable parameters for score fusion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    pub keyword_weight: f32,
    pub semantic_weight: f32,
    /// Keyword matches with an exact-match score above this get full weight,
    /// the rest get half
    pub confident_match_threshold: f32,
    pub default_limit: usize,
    pub similarity_threshold: f32,
    pub min_score: f32,
}

impl Default for RankingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            keyword_weight: 0.6,
            semantic_weight: 0.4,
            confident_match_threshold: 0.8,
            default_limit: 5,
            similarity_threshold: 0.1,
            min_score: 0.01,
        }
    }
}

impl RankingConfig {
    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (name, value) in [
            ("keyword_weight", self.keyword_weight),
            ("semantic_weight", self.semantic_weight),
            ("confident_match_threshold", self.confident_match_threshold),
            ("min_score", self.min_score),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidWeight(name, value));
            }
        }

        if !self.similarity_threshold.is_finite()
            || !(-1.0..=1.0).contains(&self.similarity_threshold)
        {
            return Err(ConfigError::InvalidSimilarityThreshold(
                self.similarity_threshold,
            ));
        }

        if self.default_limit == 0 {
            return Err(ConfigError::InvalidLimit(self.default_limit));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HybridQuery {
    pub text: String,
    /// Pre-computed query embedding; without one only keyword matches count
    pub embedding: Option<Vec<f32>>,
    /// Skip every record of this document id
    pub exclude_document: Option<String>,
    pub limit: usize,
    pub similarity_threshold: f32,
    pub min_score: f32,
}

impl HybridQuery {
    /// A query using the limit and thresholds from `config`
    #[inline]
    pub fn new(text: impl Into<String>, config: &RankingConfig) -> Self {
        Self {
            text: text.into(),
            embedding: None,
            exclude_document: None,
            limit: config.default_limit,
            similarity_threshold: config.similarity_threshold,
            min_score: config.min_score,
        }
    }

    #[inline]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    #[inline]
    pub fn excluding(mut self, document_id: impl Into<String>) -> Self {
        self.exclude_document = Some(document_id.into());
        self
    }

    #[inline]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[inline]
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    #[inline]
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    fn candidate_limit(&self) -> usize {
        self.limit.saturating_mul(CANDIDATE_MULTIPLIER)
    }

    fn is_excluded(&self, metadata: &RecordMetadata) -> bool {
        self.exclude_document
            .as_deref()
            .is_some_and(|excluded| excluded == metadata.document_id)
    }
}

/// Combines keyword and semantic relevance over one store snapshot.
///
/// The ranker only reads from the store. Both scorers see the same snapshot
/// and run concurrently on the blocking pool; an error from either one fails
/// the whole search.
pub struct HybridRanker<S: VectorStore + ?Sized> {
    store: Arc<S>,
    config: RankingConfig,
}

impl<S: VectorStore + ?Sized> HybridRanker<S> {
    #[inline]
    pub fn new(store: Arc<S>, config: RankingConfig) -> Self {
        Self { store, config }
    }

    #[inline]
    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    #[inline]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Fused keyword and semantic search
    #[inline]
    pub async fn search(&self, query: &HybridQuery) -> Result<Vec<ScoredResult>> {
        let snapshot = Arc::new(self.store.get_all().await?);
        let dimension = self.store.dimension();
        debug!(
            "Hybrid search over {} records for '{}'",
            snapshot.len(),
            query.text
        );

        let keyword_task = {
            let snapshot = Arc::clone(&snapshot);
            let query = query.clone();
            tokio::task::spawn_blocking(move || {
                let mut matches = KeywordScorer::new().score(&query.text, &snapshot);
                matches.retain(|m| !query.is_excluded(&m.metadata));
                matches.truncate(query.candidate_limit());
                matches
            })
        };

        let semantic_task = {
            let snapshot = Arc::clone(&snapshot);
            let query = query.clone();
            tokio::task::spawn_blocking(move || -> Result<Vec<SemanticMatch>> {
                let Some(embedding) = query.embedding.as_deref() else {
                    return Ok(Vec::new());
                };
                SimilarityEngine::new(dimension).search(
                    &SimilarityQuery {
                        embedding,
                        text: Some(&query.text),
                        exclude_document: query.exclude_document.as_deref(),
                        limit: query.candidate_limit(),
                        threshold: query.similarity_threshold,
                    },
                    &snapshot,
                )
            })
        };

        let (keyword, semantic) = tokio::try_join!(keyword_task, semantic_task)?;
        let semantic = semantic?;

        let results = fuse(
            &keyword,
            &semantic,
            &self.config,
            query.min_score,
            query.limit,
        );
        info!(
            "Hybrid search returned {} results ({} keyword, {} semantic matches)",
            results.len(),
            keyword.len(),
            semantic.len()
        );
        Ok(results)
    }

    /// Lexical matches only, no embedding needed
    #[inline]
    pub async fn keyword_search(&self, text: &str, limit: usize) -> Result<Vec<KeywordMatch>> {
        let snapshot = self.store.get_all().await?;
        let text = text.to_string();
        let mut matches =
            tokio::task::spawn_blocking(move || KeywordScorer::new().score(&text, &snapshot))
                .await?;
        matches.truncate(limit);
        Ok(matches)
    }

    /// Cosine ranking only
    #[inline]
    pub async fn semantic_search(
        &self,
        embedding: &[f32],
        text: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SemanticMatch>> {
        let snapshot = self.store.get_all().await?;
        SimilarityEngine::new(self.store.dimension()).search(
            &SimilarityQuery {
                embedding,
                text,
                exclude_document: None,
                limit,
                threshold: self.config.similarity_threshold,
            },
            &snapshot,
        )
    }
}

struct FusedCandidate {
    record_id: String,
    metadata: RecordMetadata,
    similarity: Option<f32>,
    keyword_score: Option<f32>,
    exact_match_score: Option<f32>,
    keyword_contribution: f32,
    semantic_contribution: f32,
}

impl FusedCandidate {
    fn new(record_id: &str, metadata: &RecordMetadata) -> Self {
        Self {
            record_id: record_id.to_string(),
            metadata: metadata.clone(),
            similarity: None,
            keyword_score: None,
            exact_match_score: None,
            keyword_contribution: 0.0,
            semantic_contribution: 0.0,
        }
    }

    fn into_result(self) -> ScoredResult {
        let final_score =
            (self.keyword_contribution + self.semantic_contribution).clamp(0.0, 1.0);
        ScoredResult {
            record_id: self.record_id,
            metadata: self.metadata,
            similarity: self.similarity,
            keyword_score: self.keyword_score,
            exact_match_score: self.exact_match_score,
            final_score,
        }
    }
}

/// Merge keyword and semantic matches into one ranked list.
///
/// Candidates are identified by their literal text. A candidate found by both
/// scorers gets the sum of both weighted contributions, capped at 1.0.
/// Keyword scores are divided by `max(1, highest keyword score)` first so the
/// keyword contribution never exceeds its weight.
#[inline]
pub fn fuse(
    keyword: &[KeywordMatch],
    semantic: &[SemanticMatch],
    config: &RankingConfig,
    min_score: f32,
    limit: usize,
) -> Vec<ScoredResult> {
    let keyword_scale = keyword
        .iter()
        .map(|m| m.score)
        .fold(1.0_f32, f32::max);

    let mut merged: HashMap<&str, FusedCandidate> = HashMap::new();

    for m in keyword {
        let weight = if m.exact_match_score > config.confident_match_threshold {
            config.keyword_weight
        } else {
            config.keyword_weight * 0.5
        };
        let contribution = (m.score / keyword_scale) * weight;

        let candidate = merged
            .entry(m.metadata.text.as_str())
            .or_insert_with(|| FusedCandidate::new(&m.record_id, &m.metadata));
        if candidate.keyword_score.is_none() || contribution > candidate.keyword_contribution {
            candidate.keyword_contribution = contribution;
            candidate.keyword_score = Some(m.score);
            candidate.exact_match_score = Some(
                candidate
                    .exact_match_score
                    .map_or(m.exact_match_score, |s| s.max(m.exact_match_score)),
            );
        }
    }

    for m in semantic {
        let contribution = m.similarity * config.semantic_weight;

        let candidate = merged
            .entry(m.metadata.text.as_str())
            .or_insert_with(|| FusedCandidate::new(&m.record_id, &m.metadata));
        if candidate.similarity.is_none() || contribution > candidate.semantic_contribution {
            candidate.semantic_contribution = contribution;
            candidate.similarity = Some(m.similarity);
        }
        if m.exact_match {
            candidate.exact_match_score = Some(1.0);
        }
    }

    let mut results: Vec<ScoredResult> = merged
        .into_values()
        .map(FusedCandidate::into_result)
        .filter(|r| r.final_score >= min_score)
        .collect();

    results.sort_by(compare_results);
    results.truncate(limit);
    results
}

fn compare_results(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    let exact = |r: &ScoredResult| r.exact_match_score.unwrap_or(0.0);
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| exact(b).total_cmp(&exact(a)))
        .then_with(|| a.record_id.cmp(&b.record_id))
}

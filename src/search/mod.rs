// Search module
// Semantic similarity, keyword scoring and hybrid fusion over the vector store

pub mod hybrid;
pub mod keyword;
pub mod similarity;

use serde::{Deserialize, Serialize};

use crate::store::RecordMetadata;

pub use hybrid::{HybridQuery, HybridRanker, RankingConfig, fuse};
pub use keyword::{KeywordMatch, KeywordScorer};
pub use similarity::{SemanticMatch, SimilarityEngine, SimilarityQuery, cosine_similarity};

/// One passage in a ranked result list handed to the prompt builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub record_id: String,
    pub metadata: RecordMetadata,
    /// Cosine similarity, present when the semantic path matched
    pub similarity: Option<f32>,
    /// Raw TF-IDF score, present when the keyword path matched
    pub keyword_score: Option<f32>,
    pub exact_match_score: Option<f32>,
    /// Fused score in `[0, 1]`, used for ordering
    pub final_score: f32,
}

// Embeddings module
// Turns passage and query text into fixed-length vectors via a hosted provider

pub mod together;

use crate::{LensError, Result};

pub use together::TogetherClient;

/// Source of embedding vectors.
///
/// Implementations block the calling thread; async callers should run them
/// on the blocking pool.
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| LensError::Embedding("provider returned no embedding".to_string()))
    }

    /// One vector per input, in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

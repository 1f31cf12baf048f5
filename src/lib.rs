use thiserror::Error;

pub type Result<T> = std::result::Result<T, LensError>;

#[derive(Error, Debug)]
pub enum LensError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Document conflict for '{pdf_name}': {reason}")]
    DocumentConflict { pdf_name: String, reason: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Search task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<config::ConfigError> for LensError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod ingest;
pub mod search;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimilarityError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unreadable document: {0}")]
    UnreadableDocument(String),
    #[error("degenerate input: {0}")]
    DegenerateInput(&'static str),
    #[error("semantic similarity requested but no embedding model is configured")]
    EngineNotConfigured,
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("invalid reference document {path:?}: {reason}")]
    InvalidReference { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, SimilarityError>;

impl From<anyhow::Error> for SimilarityError {
    fn from(value: anyhow::Error) -> Self {
        Self::Embedding(value.to_string())
    }
}

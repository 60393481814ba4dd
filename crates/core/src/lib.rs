mod embedding;
mod engine;
mod error;
mod extract;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;
mod local;
mod reference;
mod similarity;

pub use embedding::{cosine_similarity, HashEmbedder, HashEmbedderConfig, TextEmbedder};
pub use engine::{SimilarityEngine, SimilarityEngineBuilder, Strategy};
pub use error::{Result, SimilarityError};
pub use extract::{extract_pages, extract_text};
pub use local::{local_model, local_model_names, FastEmbedEmbedder};
pub use reference::{ReferenceDocument, ReferenceEncoding};
pub use similarity::{
    decode_lossy, raw_byte_similarity, sequence_ratio, token_overlap_similarity,
    DEFAULT_SAMPLE_SIZE,
};

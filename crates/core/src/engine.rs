use std::fmt;
use std::str::FromStr;

use once_cell::sync::OnceCell;

use crate::embedding::{cosine_similarity, TextEmbedder};
use crate::error::{Result, SimilarityError};
use crate::extract;
use crate::reference::ReferenceDocument;
use crate::similarity::{self, DEFAULT_SAMPLE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Cosine similarity of embeddings of the extracted texts.
    Semantic,
    /// Jaccard overlap of the extracted texts' token sets.
    TokenOverlap,
    /// Sequence ratio over the leading bytes, no document parsing.
    RawBytes { sample_size: usize },
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Semantic => "semantic",
            Strategy::TokenOverlap => "tokens",
            Strategy::RawBytes { .. } => "bytes",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "semantic" | "embedding" => Ok(Strategy::Semantic),
            "tokens" | "jaccard" => Ok(Strategy::TokenOverlap),
            "bytes" | "raw" => Ok(Strategy::RawBytes {
                sample_size: DEFAULT_SAMPLE_SIZE,
            }),
            other => Err(format!("unknown similarity strategy '{other}'")),
        }
    }
}

pub struct SimilarityEngineBuilder {
    reference: ReferenceDocument,
    embedder: Option<Box<dyn TextEmbedder>>,
    strategy: Option<Strategy>,
}

impl SimilarityEngineBuilder {
    pub fn embedder(mut self, embedder: Box<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn maybe_embedder(mut self, embedder: Option<Box<dyn TextEmbedder>>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Without an explicit strategy the engine compares semantically when an
    /// embedder is present and falls back to raw bytes otherwise.
    pub fn build(self) -> SimilarityEngine {
        let strategy = self.strategy.unwrap_or(match self.embedder {
            Some(_) => Strategy::Semantic,
            None => Strategy::RawBytes {
                sample_size: DEFAULT_SAMPLE_SIZE,
            },
        });
        SimilarityEngine {
            reference: self.reference,
            embedder: self.embedder,
            strategy,
            reference_text: OnceCell::new(),
            reference_embedding: OnceCell::new(),
        }
    }
}

/// Scores candidate documents against one reference document.
///
/// Owns the reference and the embedding model for its whole lifetime. The
/// reference text and embedding are computed on first use and then reused.
pub struct SimilarityEngine {
    reference: ReferenceDocument,
    embedder: Option<Box<dyn TextEmbedder>>,
    strategy: Strategy,
    reference_text: OnceCell<String>,
    reference_embedding: OnceCell<Vec<f32>>,
}

impl SimilarityEngine {
    pub fn builder(reference: ReferenceDocument) -> SimilarityEngineBuilder {
        SimilarityEngineBuilder {
            reference,
            embedder: None,
            strategy: None,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn reference(&self) -> &ReferenceDocument {
        &self.reference
    }

    pub fn model_name(&self) -> Option<&str> {
        self.embedder.as_deref().map(|embedder| embedder.model_name())
    }

    pub fn extract_text(&self, document_bytes: &[u8]) -> Result<String> {
        extract::extract_text(document_bytes)
    }

    /// Cosine similarity of the two texts' embeddings, clamped to [0.0, 1.0].
    pub fn semantic_similarity(&self, text_a: &str, text_b: &str) -> Result<f64> {
        let embedder = self.embedder()?;
        let a = embedder.embed(text_a)?;
        let b = embedder.embed(text_b)?;
        Ok(clamp_score(cosine_similarity(&a, &b)?))
    }

    pub fn token_overlap_similarity(&self, text_a: &str, text_b: &str) -> Result<f64> {
        similarity::token_overlap_similarity(text_a, text_b)
    }

    pub fn raw_byte_similarity(&self, bytes_a: &[u8], bytes_b: &[u8], sample_size: usize) -> f64 {
        similarity::raw_byte_similarity(bytes_a, bytes_b, sample_size)
    }

    /// Scores a candidate payload against the reference with the configured strategy.
    pub fn compare_to_reference(&self, document_bytes: &[u8]) -> Result<f64> {
        self.compare_with(self.strategy, document_bytes)
    }

    pub fn compare_with(&self, strategy: Strategy, document_bytes: &[u8]) -> Result<f64> {
        let score = match strategy {
            Strategy::Semantic => {
                let embedder = self.embedder()?;
                let candidate_text = self.extract_text(document_bytes)?;
                let reference = self
                    .reference_embedding
                    .get_or_try_init(|| embedder.embed(self.reference_text()?))?;
                let candidate = embedder.embed(&candidate_text)?;
                clamp_score(cosine_similarity(reference, &candidate)?)
            }
            Strategy::TokenOverlap => {
                let candidate_text = self.extract_text(document_bytes)?;
                self.token_overlap_similarity(self.reference_text()?, &candidate_text)?
            }
            Strategy::RawBytes { sample_size } => {
                self.raw_byte_similarity(self.reference.bytes(), document_bytes, sample_size)
            }
        };
        tracing::debug!(strategy = %strategy, score, "compared document to reference");
        Ok(score)
    }

    fn reference_text(&self) -> Result<&str> {
        self.reference_text
            .get_or_try_init(|| self.extract_text(self.reference.bytes()))
            .map(String::as_str)
    }

    fn embedder(&self) -> Result<&dyn TextEmbedder> {
        self.embedder
            .as_deref()
            .ok_or(SimilarityError::EngineNotConfigured)
    }
}

fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 1.0)
}

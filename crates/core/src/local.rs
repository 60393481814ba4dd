use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::embedding::TextEmbedder;
use crate::error::{Result, SimilarityError};

/// Sentence-embedding models that run in process, by their published names.
const LOCAL_MODELS: &[(&str, EmbeddingModel)] = &[
    ("all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2),
    ("all-MiniLM-L12-v2", EmbeddingModel::AllMiniLML12V2),
    ("bge-small-en-v1.5", EmbeddingModel::BGESmallENV15),
    ("bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15),
    (
        "paraphrase-multilingual-MiniLM-L12-v2",
        EmbeddingModel::ParaphraseMLMiniLML12V2,
    ),
    ("multilingual-e5-small", EmbeddingModel::MultilingualE5Small),
];

const ORGANIZATION_PREFIXES: &[&str] = &["sentence-transformers/", "BAAI/", "Qdrant/", "intfloat/"];

/// Resolves a model name such as `all-MiniLM-L6-v2` or
/// `sentence-transformers/all-MiniLM-L6-v2`, ignoring case.
pub fn local_model(name: &str) -> Option<(&'static str, EmbeddingModel)> {
    let trimmed = name.trim();
    let bare = ORGANIZATION_PREFIXES
        .iter()
        .find_map(|prefix| {
            trimmed
                .get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| &trimmed[prefix.len()..])
        })
        .unwrap_or(trimmed);
    LOCAL_MODELS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(bare))
        .map(|(known, model)| (*known, model.clone()))
}

pub fn local_model_names() -> impl Iterator<Item = &'static str> {
    LOCAL_MODELS.iter().map(|(name, _)| *name)
}

/// Pretrained sentence-embedding model run locally through ONNX Runtime.
///
/// The weights are downloaded on first use into `cache_dir` (or fastembed's
/// default cache) and loaded once; every `embed` reuses the loaded session.
pub struct FastEmbedEmbedder {
    name: &'static str,
    model: Mutex<TextEmbedding>,
}

impl FastEmbedEmbedder {
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
        let (name, model) = local_model(model_name).ok_or_else(|| {
            SimilarityError::Embedding(format!("unknown local embedding model '{model_name}'"))
        })?;
        let mut options = InitOptions::new(model).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }
        let model = TextEmbedding::try_new(options)?;
        tracing::info!(model = name, "local embedding model loaded");
        Ok(Self {
            name,
            model: Mutex::new(model),
        })
    }
}

impl TextEmbedder for FastEmbedEmbedder {
    fn model_name(&self) -> &str {
        self.name
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| SimilarityError::Embedding("embedding model lock poisoned".into()))?;
        let mut vectors = model.embed(vec![text], None)?;
        vectors
            .pop()
            .ok_or_else(|| SimilarityError::Embedding("model returned no embedding".into()))
    }
}

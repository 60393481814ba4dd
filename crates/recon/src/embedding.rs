use anyhow::{anyhow, Context};
use recon_core::{FastEmbedEmbedder, HashEmbedder, HashEmbedderConfig, TextEmbedder};
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::{EmbeddingProvider, EngineConfig};

/// Embeddings served by an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct OpenAiEmbedder {
    http: Client,
    url: String,
    model: String,
    api_key: SecretString,
}

impl OpenAiEmbedder {
    pub fn new(url: &str, model: &str, api_key: SecretString) -> Self {
        Self {
            http: Client::new(),
            url: url.to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    fn request(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let payload = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .context("embeddings request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "embeddings request failed: {}",
                response.status()
            ));
        }
        let parsed: EmbeddingResponse = response
            .json()
            .context("unexpected embeddings response")?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| anyhow!("embeddings response carried no vectors"))
    }
}

impl TextEmbedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> recon_core::Result<Vec<f32>> {
        Ok(self.request(text)?)
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Builds the embedder named by the configuration; `None` disables the
/// semantic strategy.
pub fn build_embedder(config: &EngineConfig) -> anyhow::Result<Option<Box<dyn TextEmbedder>>> {
    let embedder: Box<dyn TextEmbedder> = match config.embedding_provider {
        EmbeddingProvider::Disabled => return Ok(None),
        EmbeddingProvider::FastEmbed => Box::new(
            FastEmbedEmbedder::new(&config.model_name, config.model_cache_dir.clone())
                .with_context(|| format!("failed to load embedding model {}", config.model_name))?,
        ),
        EmbeddingProvider::Hash => Box::new(HashEmbedder::new(HashEmbedderConfig {
            dimensions: config.hash_dimensions,
            ..HashEmbedderConfig::default()
        })),
        EmbeddingProvider::OpenAi => {
            let api_key = config
                .openai_api_key
                .as_ref()
                .ok_or_else(|| anyhow!("OPENAI_API_KEY is required for openai embeddings"))?;
            Box::new(OpenAiEmbedder::new(
                &config.embedding_url,
                &config.model_name,
                SecretString::new(api_key.expose_secret().clone()),
            ))
        }
    };
    tracing::info!(
        provider = ?config.embedding_provider,
        model = embedder.model_name(),
        "embedding model ready"
    );
    Ok(Some(embedder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_core::ReferenceEncoding;
    use std::path::PathBuf;

    fn config(provider: EmbeddingProvider) -> EngineConfig {
        EngineConfig {
            reference_file: PathBuf::from("contrato.pdf"),
            reference_encoding: ReferenceEncoding::Raw,
            model_name: "all-MiniLM-L6-v2".to_string(),
            model_cache_dir: None,
            embedding_provider: provider,
            embedding_url: "http://127.0.0.1:9/v1/embeddings".to_string(),
            openai_api_key: Some(SecretString::new("sk-test".to_string())),
            hash_dimensions: 32,
        }
    }

    #[test]
    fn hash_provider_uses_configured_dimensions() {
        let embedder = build_embedder(&config(EmbeddingProvider::Hash))
            .unwrap()
            .unwrap();
        assert_eq!(embedder.embed("contrato de afiliacion").unwrap().len(), 32);
    }

    #[test]
    fn unknown_local_model_fails_to_build() {
        let mut config = config(EmbeddingProvider::FastEmbed);
        config.model_name = "not-a-model".to_string();
        let err = build_embedder(&config).err().expect("unknown model must fail");
        assert!(format!("{err:#}").contains("not-a-model"), "{err:#}");
    }

    #[test]
    fn disabled_provider_builds_nothing() {
        assert!(build_embedder(&config(EmbeddingProvider::Disabled))
            .unwrap()
            .is_none());
    }

    #[test]
    fn openai_provider_keeps_model_name() {
        let embedder = build_embedder(&config(EmbeddingProvider::OpenAi))
            .unwrap()
            .unwrap();
        assert_eq!(embedder.model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    fn unreachable_endpoint_is_an_embedding_error() {
        let embedder = OpenAiEmbedder::new(
            "http://127.0.0.1:9/v1/embeddings",
            "m",
            SecretString::new("k".to_string()),
        );
        assert!(matches!(
            embedder.embed("texto"),
            Err(recon_core::SimilarityError::Embedding(_))
        ));
    }
}

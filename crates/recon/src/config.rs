use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use recon_core::{local_model, local_model_names, ReferenceEncoding};
use secrecy::SecretString;
use thiserror::Error;

pub const REFERENCE_FILE: &str = "RECON_REFERENCE_FILE";
pub const REFERENCE_ENCODING: &str = "RECON_REFERENCE_ENCODING";
pub const MODEL_NAME: &str = "RECON_MODEL_NAME";
pub const MODEL_CACHE_DIR: &str = "RECON_MODEL_CACHE_DIR";
pub const EMBEDDING_PROVIDER: &str = "RECON_EMBEDDING_PROVIDER";
pub const EMBEDDING_URL: &str = "RECON_EMBEDDING_URL";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const HASH_DIMENSIONS: &str = "RECON_HASH_DIMENSIONS";
pub const FILES_ENDPOINT: &str = "RECON_FILES_ENDPOINT";
pub const CONTRACT_ENDPOINT: &str = "RECON_CONTRACT_ENDPOINT";
pub const FILES_TOKEN: &str = "RECON_FILES_TOKEN";
pub const CONTRACT_TOKEN: &str = "RECON_CONTRACT_TOKEN";
pub const ROSTER_PATH: &str = "RECON_ROSTER_PATH";
pub const LOG_PATH: &str = "RECON_LOG_PATH";
pub const BLOCK_SIZE: &str = "RECON_BLOCK_SIZE";
pub const PROMPT_TIMEOUT_SECS: &str = "RECON_PROMPT_TIMEOUT_SECS";
pub const MIN_SIMILARITY: &str = "RECON_MIN_SIMILARITY";

pub const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1/embeddings";
pub const DEFAULT_HASH_DIMENSIONS: usize = 64;
pub const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Pretrained sentence-embedding model run in process.
    FastEmbed,
    /// Hashed bag of words; offline runs and tests only.
    Hash,
    OpenAi,
    Disabled,
}

impl FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "fastembed" | "local" => Ok(EmbeddingProvider::FastEmbed),
            "hash" => Ok(EmbeddingProvider::Hash),
            "openai" => Ok(EmbeddingProvider::OpenAi),
            "none" | "disabled" | "off" => Ok(EmbeddingProvider::Disabled),
            other => Err(format!("unknown embedding provider '{other}'")),
        }
    }
}

/// Settings the similarity engine needs; enough for the `compare` command.
#[derive(Debug)]
pub struct EngineConfig {
    pub reference_file: PathBuf,
    pub reference_encoding: ReferenceEncoding,
    pub model_name: String,
    pub model_cache_dir: Option<PathBuf>,
    pub embedding_provider: EmbeddingProvider,
    pub embedding_url: String,
    pub openai_api_key: Option<SecretString>,
    pub hash_dimensions: usize,
}

/// Remote contract service settings.
#[derive(Debug)]
pub struct ServiceConfig {
    pub files_endpoint: String,
    pub contract_endpoint: String,
    pub files_token: SecretString,
    pub contract_token: SecretString,
}

#[derive(Debug)]
pub struct ReconConfig {
    pub engine: EngineConfig,
    pub service: ServiceConfig,
    pub roster_path: PathBuf,
    pub log_path: PathBuf,
    pub block_size: usize,
    pub prompt_timeout: Duration,
    pub min_similarity: Option<f64>,
}

/// Key/value source: the environment, optionally layered over a TOML file.
pub struct ConfigSource {
    file_values: HashMap<String, String>,
    env_lookup: Box<dyn Fn(&str) -> Option<String>>,
}

impl ConfigSource {
    /// Environment variables override values read from `file`.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_values = match file {
            Some(path) => read_file_values(path)?,
            None => HashMap::new(),
        };
        Ok(Self {
            file_values,
            env_lookup: Box::new(|key| env::var(key).ok()),
        })
    }

    #[cfg(test)]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values: HashMap<String, String> = pairs
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self {
            file_values: HashMap::new(),
            env_lookup: Box::new(move |key| values.get(key).cloned()),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        (self.env_lookup)(key)
            .or_else(|| self.file_values.get(&file_key(key)).cloned())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    pub fn parsed<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        self.get(key)
            .map(|value| {
                value.parse::<T>().map_err(|err| ConfigError::Invalid {
                    key,
                    value: value.clone(),
                    reason: err.to_string(),
                })
            })
            .transpose()
    }

    fn secret(&self, key: &'static str) -> Result<SecretString, ConfigError> {
        self.required(key).map(SecretString::new)
    }

    pub fn verbose(&self) -> bool {
        self.get("RECON_VERBOSE")
            .map(|value| crate::logging::parse_bool(&value))
            .unwrap_or(false)
    }
}

impl EngineConfig {
    pub fn from_source(source: &ConfigSource) -> Result<Self, ConfigError> {
        let embedding_provider = source
            .parsed::<EmbeddingProvider>(EMBEDDING_PROVIDER)?
            .unwrap_or(EmbeddingProvider::FastEmbed);
        let model_name = source.required(MODEL_NAME)?;
        if embedding_provider == EmbeddingProvider::FastEmbed && local_model(&model_name).is_none() {
            return Err(ConfigError::Invalid {
                key: MODEL_NAME,
                value: model_name,
                reason: format!(
                    "not a local embedding model; known: {}",
                    local_model_names().collect::<Vec<_>>().join(", ")
                ),
            });
        }
        let openai_api_key = source.get(OPENAI_API_KEY).map(SecretString::new);
        if embedding_provider == EmbeddingProvider::OpenAi && openai_api_key.is_none() {
            return Err(ConfigError::Missing(OPENAI_API_KEY));
        }
        let hash_dimensions = source
            .parsed::<usize>(HASH_DIMENSIONS)?
            .unwrap_or(DEFAULT_HASH_DIMENSIONS);
        if hash_dimensions == 0 {
            return Err(invalid(HASH_DIMENSIONS, "0", "must be positive"));
        }
        Ok(Self {
            reference_file: PathBuf::from(source.required(REFERENCE_FILE)?),
            reference_encoding: source
                .parsed::<ReferenceEncoding>(REFERENCE_ENCODING)?
                .unwrap_or_default(),
            model_name,
            model_cache_dir: source.get(MODEL_CACHE_DIR).map(PathBuf::from),
            embedding_provider,
            embedding_url: source
                .get(EMBEDDING_URL)
                .unwrap_or_else(|| DEFAULT_EMBEDDING_URL.to_string()),
            openai_api_key,
            hash_dimensions,
        })
    }
}

impl ServiceConfig {
    pub fn from_source(source: &ConfigSource) -> Result<Self, ConfigError> {
        Ok(Self {
            files_endpoint: source.required(FILES_ENDPOINT)?,
            contract_endpoint: source.required(CONTRACT_ENDPOINT)?,
            files_token: source.secret(FILES_TOKEN)?,
            contract_token: source.secret(CONTRACT_TOKEN)?,
        })
    }
}

impl ReconConfig {
    pub fn from_source(source: &ConfigSource) -> Result<Self, ConfigError> {
        let engine = EngineConfig::from_source(source)?;
        let service = ServiceConfig::from_source(source)?;
        let roster_path = PathBuf::from(source.required(ROSTER_PATH)?);
        let log_path = PathBuf::from(source.required(LOG_PATH)?);
        let block_size = source
            .parsed::<usize>(BLOCK_SIZE)?
            .ok_or(ConfigError::Missing(BLOCK_SIZE))?;
        if block_size == 0 {
            return Err(invalid(BLOCK_SIZE, "0", "must be positive"));
        }
        let prompt_timeout = Duration::from_secs(
            source
                .parsed::<u64>(PROMPT_TIMEOUT_SECS)?
                .unwrap_or(DEFAULT_PROMPT_TIMEOUT_SECS),
        );
        let min_similarity = source.parsed::<f64>(MIN_SIMILARITY)?;
        if let Some(floor) = min_similarity {
            if !(0.0..=1.0).contains(&floor) {
                return Err(invalid(
                    MIN_SIMILARITY,
                    &floor.to_string(),
                    "must be within [0, 1]",
                ));
            }
        }
        Ok(Self {
            engine,
            service,
            roster_path,
            log_path,
            block_size,
            prompt_timeout,
            min_similarity,
        })
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// `RECON_BLOCK_SIZE` is spelled `block_size` in the TOML file.
fn file_key(key: &str) -> String {
    key.strip_prefix("RECON_").unwrap_or(key).to_lowercase()
}

fn read_file_values(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table: toml::Table = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let mut values = HashMap::new();
    for (key, value) in table {
        let text = match value {
            toml::Value::String(text) => text,
            toml::Value::Integer(number) => number.to_string(),
            toml::Value::Float(number) => number.to_string(),
            toml::Value::Boolean(flag) => flag.to_string(),
            other => {
                tracing::warn!(%key, "ignoring non-scalar config value {other}");
                continue;
            }
        };
        values.insert(key.to_lowercase(), text);
    }
    Ok(values)
}

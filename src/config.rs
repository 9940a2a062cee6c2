//! Runtime configuration.
//!
//! Provider settings come from environment variables, every one of them
//! optional with a fallback default. Credentials are only checked when a
//! hosted provider is actually built, so offline stages run without them.

use std::env;
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{RAGError, Result};

pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DEPLOYMENT: &str = "text-embedding-ada-002";
pub const DEFAULT_EMBEDDING_API_VERSION: &str = "2023-05-15";
pub const DEFAULT_CHAT_DEPLOYMENT: &str = "gpt-4o-mini";
pub const DEFAULT_CHAT_API_VERSION: &str = "2024-02-15-preview";
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// fastembed running on this machine
    Local,
    /// Azure OpenAI embeddings deployment
    Azure,
}

#[derive(Debug, Clone, Default)]
pub struct AzureSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub embedding_deployment: String,
    pub embedding_api_version: String,
    pub chat_deployment: String,
    pub chat_api_version: String,
}

impl AzureSettings {
    /// Returns `(endpoint, api_key)` or the first missing one as `MissingConfig`.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(RAGError::MissingConfig("AZURE_OPENAI_ENDPOINT"))?;
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(RAGError::MissingConfig("AZURE_OPENAI_API_KEY"))?;
        Ok((endpoint, api_key))
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub azure: AzureSettings,
    pub embedding_provider: EmbeddingProvider,
    pub embedding_model: String,
    pub fastembed_cache: Option<PathBuf>,
    pub top_k: usize,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup, so callers and tests can
    /// supply values without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let azure = AzureSettings {
            endpoint: get("AZURE_OPENAI_ENDPOINT"),
            api_key: get("AZURE_OPENAI_API_KEY").or_else(|| get("OPENAI_API_KEY")),
            embedding_deployment: or_default("AZURE_OPENAI_DEPLOYMENT", DEFAULT_EMBEDDING_DEPLOYMENT),
            embedding_api_version: or_default("AZURE_OPENAI_API_VERSION", DEFAULT_EMBEDDING_API_VERSION),
            chat_deployment: or_default("AZURE_OPENAI_CHAT_DEPLOYMENT", DEFAULT_CHAT_DEPLOYMENT),
            chat_api_version: or_default("AZURE_OPENAI_CHAT_API_VERSION", DEFAULT_CHAT_API_VERSION),
        };

        let embedding_provider = match get("FINRAG_EMBEDDING_PROVIDER").as_deref() {
            None => EmbeddingProvider::Local,
            Some(v) if v.eq_ignore_ascii_case("local") => EmbeddingProvider::Local,
            Some(v) if v.eq_ignore_ascii_case("azure") => EmbeddingProvider::Azure,
            Some(other) => {
                warn!("Unknown FINRAG_EMBEDDING_PROVIDER {:?}, using local", other);
                EmbeddingProvider::Local
            }
        };

        let top_k = match get("FINRAG_TOP_K") {
            None => DEFAULT_TOP_K,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(k) if k > 0 => k,
                _ => {
                    warn!("Invalid FINRAG_TOP_K {:?}, using {}", raw, DEFAULT_TOP_K);
                    DEFAULT_TOP_K
                }
            },
        };

        let fastembed_cache = get("FASTEMBED_CACHE_PATH")
            .map(PathBuf::from)
            .or_else(|| get("HOME").map(|home| Path::new(&home).join(".cache").join("fastembed")));

        Self {
            azure,
            embedding_provider,
            embedding_model: or_default("FINRAG_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            fastembed_cache,
            top_k,
        }
    }

    /// Name recorded in the index manifest for the configured embedder.
    pub fn embedding_model_name(&self) -> &str {
        match self.embedding_provider {
            EmbeddingProvider::Local => &self.embedding_model,
            EmbeddingProvider::Azure => &self.azure.embedding_deployment,
        }
    }
}

/// On-disk locations of every pipeline stage, derived from one data root.
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub chunks_file: PathBuf,
    pub index_dir: PathBuf,
}

impl DataLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            raw_dir: root.join("raw"),
            processed_dir: root.join("processed"),
            chunks_file: root.join("chunks").join("chunks.json"),
            index_dir: root.join("index"),
        }
    }
}

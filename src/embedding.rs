use std::collections::HashMap;
use std::path::PathBuf;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use lazy_static::lazy_static;
use log::{error, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::chunking::Chunk;
use crate::config::{EmbeddingProvider, Settings};
use crate::error::{RAGError, Result};

/// Turns text into fixed-length vectors. The same model must embed the
/// corpus at index time and the query at search time.
pub trait Embedder {
    /// Name recorded alongside the persisted index.
    fn model_name(&self) -> &str;

    fn embed_documents(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&mut self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])?
            .pop()
            .ok_or(RAGError::EmptyEmbeddings)
    }
}

lazy_static! {
    pub static ref MODEL_MAP: HashMap<&'static str, EmbeddingModel> = {
        let mut m = HashMap::new();
        m.insert("all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2);
        m.insert("sentence-transformers/all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2);
        m.insert("all-MiniLM-L12-v2", EmbeddingModel::AllMiniLML12V2);
        m.insert("BAAI/bge-small-en-v1.5", EmbeddingModel::BGESmallENV15);
        m.insert("BAAI/bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15);
        m
    };
}

/// Runs a sentence-transformer locally through fastembed.
pub struct LocalEmbedder {
    name: String,
    model: TextEmbedding,
}

impl LocalEmbedder {
    pub fn new(name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
        let model = MODEL_MAP
            .get(name)
            .cloned()
            .ok_or_else(|| RAGError::UnsupportedModel(name.to_string()))?;

        info!("Initializing local embeddings ({})", name);
        let mut options = InitOptions::new(model).with_show_download_progress(true);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }
        let model = TextEmbedding::try_new(options).map_err(|e| RAGError::ModelInit(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            model,
        })
    }
}

impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn embed_documents(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| RAGError::Embedding(e.to_string()))
    }
}

/// Azure OpenAI rejects embedding requests with more inputs than this.
pub const MAX_INPUTS_PER_REQUEST: usize = 2048;

/// Azure OpenAI embeddings deployment, called over blocking HTTP.
pub struct AzureEmbedder {
    client: Client,
    url: String,
    api_key: String,
    deployment: String,
    max_inputs: usize,
}

impl AzureEmbedder {
    pub fn new(endpoint: &str, api_key: &str, deployment: &str, api_version: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(None)
            .build()
            .map_err(|e| RAGError::ModelInit(e.to_string()))?;
        let url = format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            api_version
        );
        Ok(Self {
            client,
            url,
            api_key: api_key.trim().to_string(),
            deployment: deployment.to_string(),
            max_inputs: MAX_INPUTS_PER_REQUEST,
        })
    }

    /// Caps the number of texts sent in one request. Zero is treated as one.
    pub fn with_max_inputs(mut self, max_inputs: usize) -> Self {
        self.max_inputs = max_inputs.max(1);
        self
    }

    fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let resp = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&EmbeddingRequest { input: texts })
            .send()
            .map_err(|e| RAGError::Embedding(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RAGError::Embedding(format!("{}: {}", status, body)));
        }

        let mut parsed: EmbeddingResponse = resp
            .json()
            .map_err(|e| RAGError::Embedding(e.to_string()))?;
        parsed.data.sort_by_key(|d| d.index);
        if parsed.data.len() != texts.len() {
            return Err(RAGError::Embedding(format!(
                "got {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl Embedder for AzureEmbedder {
    fn model_name(&self) -> &str {
        &self.deployment
    }

    /// Sends `texts` in order, at most `max_inputs` per request.
    fn embed_documents(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_inputs) {
            embeddings.extend(self.embed_request(batch)?);
        }
        Ok(embeddings)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Builds the embedder selected in `settings`.
pub fn from_settings(settings: &Settings) -> Result<Box<dyn Embedder>> {
    match settings.embedding_provider {
        EmbeddingProvider::Local => Ok(Box::new(LocalEmbedder::new(
            &settings.embedding_model,
            settings.fastembed_cache.clone(),
        )?)),
        EmbeddingProvider::Azure => {
            let (endpoint, api_key) = settings.azure.credentials()?;
            Ok(Box::new(AzureEmbedder::new(
                endpoint,
                api_key,
                &settings.azure.embedding_deployment,
                &settings.azure.embedding_api_version,
            )?))
        }
    }
}

/// Embeds the first chunk to check the provider configuration. Returns the
/// vector length; failures are logged, not propagated.
pub fn check_first_chunk(embedder: &mut dyn Embedder, chunks: &[Chunk]) -> Option<usize> {
    let Some(first) = chunks.first() else {
        info!("No chunks to test.");
        return None;
    };
    match embedder.embed_query(&first.content) {
        Ok(vector) => {
            info!("Embedding generated successfully, vector length {}", vector.len());
            Some(vector.len())
        }
        Err(e) => {
            error!("Error generating embedding: {}", e);
            None
        }
    }
}

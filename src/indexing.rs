use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use hnsw_rs::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chunking::Chunk;
use crate::embedding::Embedder;
use crate::error::{RAGError, Result};

pub const FORMAT_VERSION: u32 = 1;
pub const BATCH_SIZE: usize = 5000;
pub const CHECKPOINT_EVERY: usize = 10_000;

const MANIFEST_FILE: &str = "manifest.json";
const CHUNKS_FILE: &str = "chunks.json";
const VECTORS_FILE: &str = "vectors.bin";

const MAX_NB_CONNECTION: usize = 16;
const MAX_LAYER: usize = 16;
const EF_CONSTRUCTION: usize = 200;
const EF_SEARCH: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    model: String,
    dimension: usize,
    count: usize,
    checksum: String,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Chunks, their embeddings, and an HNSW graph over the embeddings.
/// Point ids in the graph are positions in `chunks`.
pub struct VectorIndex {
    model: String,
    dimension: usize,
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
    id_to_idx: HashMap<String, usize>,
    graph: Hnsw<'static, f32, DistCosine>,
}

impl VectorIndex {
    pub fn new(model: &str, capacity: usize) -> Self {
        Self {
            model: model.to_string(),
            dimension: 0,
            chunks: Vec::with_capacity(capacity),
            embeddings: Vec::with_capacity(capacity),
            id_to_idx: HashMap::with_capacity(capacity),
            graph: new_graph(capacity),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Appends a batch. All vectors must share the index dimension, which the
    /// first batch fixes.
    pub fn add(&mut self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(RAGError::Embedding(format!(
                "got {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }
        if let Some(first) = embeddings.first() {
            if first.is_empty() {
                return Err(RAGError::EmptyEmbeddings);
            }
            if self.dimension == 0 {
                self.dimension = first.len();
            }
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(RAGError::DimensionMismatch {
                expected: self.dimension,
                got: bad.len(),
            });
        }

        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            let idx = self.chunks.len();
            self.graph.insert_slice((embedding.as_slice(), idx));
            self.id_to_idx.insert(chunk.id.clone(), idx);
            self.chunks.push(chunk);
            self.embeddings.push(embedding);
        }
        Ok(())
    }

    /// Up to `k` chunks nearest to `query` by cosine distance, closest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(RAGError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }

        let mut neighbours = self.graph.search(query, k, EF_SEARCH.max(k));
        neighbours.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(neighbours
            .into_iter()
            .take(k)
            .filter_map(|n| {
                self.chunks.get(n.d_id).map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    distance: n.distance,
                })
            })
            .collect())
    }

    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.id_to_idx.get(id).map(|&idx| &self.chunks[idx])
    }

    /// Writes the payload files first and the manifest last, so an
    /// interrupted save leaves a manifest whose checksum no longer matches.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let chunks = serde_json::to_vec(&self.chunks)
            .map_err(|e| RAGError::Serialization(e.to_string()))?;
        let vectors = bincode::serialize(&self.embeddings)
            .map_err(|e| RAGError::Serialization(e.to_string()))?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            model: self.model.clone(),
            dimension: self.dimension,
            count: self.chunks.len(),
            checksum: checksum(&chunks, &vectors),
        };
        let manifest = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| RAGError::Serialization(e.to_string()))?;

        write_replace(&dir.join(CHUNKS_FILE), &chunks)?;
        write_replace(&dir.join(VECTORS_FILE), &vectors)?;
        write_replace(&dir.join(MANIFEST_FILE), &manifest)?;
        Ok(())
    }

    /// Loads a persisted index, rebuilding the graph from the stored vectors.
    /// `model` must match the name the index was built with.
    pub fn load(dir: &Path, model: &str) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(RAGError::StoreNotFound {
                path: dir.to_path_buf(),
            });
        }
        let corrupt = |reason: String| RAGError::CorruptIndex {
            path: dir.to_path_buf(),
            reason,
        };

        let manifest_raw = read(&manifest_path).map_err(|e| corrupt(e.to_string()))?;
        let manifest: Manifest = serde_json::from_slice(&manifest_raw)
            .map_err(|e| corrupt(format!("unreadable manifest: {e}")))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "format version {} is not supported",
                manifest.format_version
            )));
        }
        if manifest.model != model {
            return Err(RAGError::ModelMismatch {
                built_with: manifest.model,
                requested: model.to_string(),
            });
        }

        // With a manifest present, a missing or unreadable payload is a damaged store.
        let chunks_raw = read(&dir.join(CHUNKS_FILE)).map_err(|e| corrupt(e.to_string()))?;
        let vectors_raw = read(&dir.join(VECTORS_FILE)).map_err(|e| corrupt(e.to_string()))?;
        if checksum(&chunks_raw, &vectors_raw) != manifest.checksum {
            return Err(corrupt("checksum mismatch".to_string()));
        }

        let chunks: Vec<Chunk> = serde_json::from_slice(&chunks_raw)
            .map_err(|e| corrupt(format!("unreadable chunks: {e}")))?;
        let embeddings: Vec<Vec<f32>> = bincode::deserialize(&vectors_raw)
            .map_err(|e| corrupt(format!("unreadable vectors: {e}")))?;
        if chunks.len() != manifest.count || embeddings.len() != manifest.count {
            return Err(corrupt(format!(
                "expected {} entries, found {} chunks and {} vectors",
                manifest.count,
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut index = Self::new(&manifest.model, manifest.count);
        index.dimension = manifest.dimension;
        index
            .add(chunks, embeddings)
            .map_err(|e| corrupt(e.to_string()))?;
        info!("Loaded {} chunks from {}", index.len(), dir.display());
        Ok(index)
    }
}

fn new_graph(capacity: usize) -> Hnsw<'static, f32, DistCosine> {
    Hnsw::new(
        MAX_NB_CONNECTION,
        capacity.max(1),
        MAX_LAYER,
        EF_CONSTRUCTION,
        DistCosine {},
    )
}

fn checksum(chunks: &[u8], vectors: &[u8]) -> String {
    let mut hash = Sha256::new();
    hash.update(chunks);
    hash.update(vectors);
    format!("{:x}", hash.finalize())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| RAGError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_replace(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[derive(Debug)]
pub struct BatchFailure {
    pub start: usize,
    pub len: usize,
    pub error: RAGError,
}

#[derive(Debug, Default)]
pub struct IndexReport {
    pub total: usize,
    pub indexed: usize,
    pub checkpoints: usize,
    pub failed: Vec<BatchFailure>,
}

/// Embeds chunks batch by batch into a fresh `VectorIndex`, saving to `dir`
/// at checkpoint boundaries and once more at the end.
pub struct IndexBuilder {
    dir: PathBuf,
    batch_size: usize,
    checkpoint_every: usize,
}

impl IndexBuilder {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            batch_size: BATCH_SIZE,
            checkpoint_every: CHECKPOINT_EVERY,
        }
    }

    pub fn with_batching(mut self, batch_size: usize, checkpoint_every: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.checkpoint_every = checkpoint_every.max(1);
        self
    }

    /// Deletes any persisted index, then builds from scratch.
    pub fn rebuild(&self, chunks: &[Chunk], embedder: &mut dyn Embedder) -> Result<IndexReport> {
        if self.dir.exists() {
            info!("Removing existing index at {} for a full rebuild", self.dir.display());
            fs::remove_dir_all(&self.dir)?;
        }
        self.build(chunks, embedder)
    }

    pub fn build(&self, chunks: &[Chunk], embedder: &mut dyn Embedder) -> Result<IndexReport> {
        let total = chunks.len();
        let mut report = IndexReport {
            total,
            ..Default::default()
        };
        let mut index = VectorIndex::new(embedder.model_name(), total);
        info!("Loaded {} chunks. Starting batch indexing...", total);

        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} chunks ({eta})") {
            bar.set_style(style);
        }

        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let start = batch_no * self.batch_size;
            let end = start + batch.len();

            match self.index_batch(&mut index, batch, embedder) {
                Ok(()) => {
                    report.indexed += batch.len();
                    info!("Indexed {} / {} chunks", end, total);
                }
                Err(e) => {
                    error!("Batch {}..{} failed: {}", start, end, e);
                    report.failed.push(BatchFailure {
                        start,
                        len: batch.len(),
                        error: e,
                    });
                }
            }
            bar.inc(batch.len() as u64);

            let boundary = start + self.batch_size;
            if (boundary % self.checkpoint_every == 0 || end >= total) && !index.is_empty() {
                info!("Saving intermediate index to {}", self.dir.display());
                match index.save(&self.dir) {
                    Ok(()) => report.checkpoints += 1,
                    Err(e) => warn!("Checkpoint save failed: {}", e),
                }
            }
        }
        bar.finish_and_clear();

        if index.is_empty() {
            warn!("Nothing was indexed; no index written to {}", self.dir.display());
            return Ok(report);
        }
        info!("Saving index to {}", self.dir.display());
        index.save(&self.dir)?;
        Ok(report)
    }

    fn index_batch(
        &self,
        index: &mut VectorIndex,
        batch: &[Chunk],
        embedder: &mut dyn Embedder,
    ) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let embeddings = embedder.embed_documents(&texts)?;
        index.add(batch.to_vec(), embeddings)
    }
}

use std::{fs, path::Path};

use log::info;
use serde::{Deserialize, Serialize};
use text_splitter::{Characters, ChunkConfig, TextSplitter};

use crate::document::{Document, read_utf8};
use crate::error::{RAGError, Result};

pub const CHUNK_SIZE: usize = 1000;
pub const CHUNK_OVERLAP: usize = 200;

/// A retrievable text window. `id` is `{basename(source)}_{index}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source: String,
    pub content: String,
}

pub fn chunk_id(source: &str, index: usize) -> String {
    let base = Path::new(source)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string());
    format!("{}_{}", base, index)
}

/// Splits documents into overlapping character windows, preferring
/// paragraph, sentence and word boundaries over raw cuts.
pub struct Chunker {
    splitter: TextSplitter<Characters>,
}

impl Chunker {
    pub fn new() -> Result<Self> {
        Self::with_window(CHUNK_SIZE, CHUNK_OVERLAP)
    }

    pub fn with_window(size: usize, overlap: usize) -> Result<Self> {
        let config = ChunkConfig::new(size)
            .with_overlap(overlap)
            .map_err(|e| RAGError::Splitter(e.to_string()))?;
        Ok(Self {
            splitter: TextSplitter::new(config),
        })
    }

    pub fn chunk_all_documents(&self, docs: &[Document]) -> Vec<Chunk> {
        docs.iter()
            .flat_map(|doc| self.chunk_document(&doc.source, &doc.text))
            .collect()
    }

    pub fn chunk_document(&self, source: &str, text: &str) -> Vec<Chunk> {
        self.splitter
            .chunks(text)
            .enumerate()
            .map(|(i, window)| Chunk {
                id: chunk_id(source, i),
                source: source.to_string(),
                content: window.to_string(),
            })
            .collect()
    }
}

pub fn save_chunks(chunks: &[Chunk], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json =
        serde_json::to_string_pretty(chunks).map_err(|e| RAGError::Serialization(e.to_string()))?;
    fs::write(path, json)?;
    info!("Saved {} chunks to {}", chunks.len(), path.display());
    Ok(())
}

pub fn load_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let text = read_utf8(path)?;
    serde_json::from_str(&text).map_err(|e| RAGError::Deserialization(e.to_string()))
}

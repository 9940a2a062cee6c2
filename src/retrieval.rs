use std::path::{Path, PathBuf};

use log::debug;

use crate::embedding::Embedder;
use crate::error::{RAGError, Result};
use crate::indexing::{ScoredChunk, VectorIndex};

/// Top-K similarity search over a persisted index. The index is read from
/// disk on first use and kept for the life of the retriever.
pub struct Retriever {
    dir: PathBuf,
    embedder: Box<dyn Embedder>,
    k: usize,
    index: Option<VectorIndex>,
}

impl Retriever {
    /// Lazy: nothing is read until the first search.
    pub fn new(dir: &Path, embedder: Box<dyn Embedder>, k: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            embedder,
            k,
            index: None,
        }
    }

    /// Eager: fails with `StoreNotFound` right away if there is no index.
    pub fn load(dir: &Path, embedder: Box<dyn Embedder>, k: usize) -> Result<Self> {
        let mut retriever = Self::new(dir, embedder, k);
        retriever.index()?;
        Ok(retriever)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn index(&mut self) -> Result<&VectorIndex> {
        if self.index.is_none() {
            let index = VectorIndex::load(&self.dir, self.embedder.model_name())?;
            self.index = Some(index);
        }
        self.index.as_ref().ok_or_else(|| RAGError::StoreNotFound {
            path: self.dir.clone(),
        })
    }

    pub fn retrieve(&mut self, query: &str) -> Result<Vec<ScoredChunk>> {
        let k = self.k;
        self.similarity_search(query, k)
    }

    pub fn similarity_search(&mut self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        self.index()?;
        let vector = self.embedder.embed_query(query)?;
        let index = self.index()?;
        let hits = index.search(&vector, k)?;
        debug!("{:?} -> {} hits", query, hits.len());
        Ok(hits)
    }
}

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod filing;
pub mod frontend;
pub mod generation;
pub mod indexing;
pub mod retrieval;

pub use chunking::{Chunk, Chunker};
pub use config::{DataLayout, Settings};
pub use document::{Document, grab_all_documents};
pub use embedding::Embedder;
pub use error::{RAGError, Result};
pub use generation::{Answer, ChatModel, RagChain};
pub use indexing::{IndexBuilder, VectorIndex};
pub use retrieval::Retriever;

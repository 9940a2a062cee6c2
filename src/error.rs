use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RAGError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file at {path}: {source}")]
    FileRead { path: PathBuf, source: io::Error },

    #[error("Invalid UTF-8 in file {path}")]
    InvalidUtf8 {
        path: PathBuf,
        #[source]
        source: simdutf8::basic::Utf8Error,
    },

    #[error("Archive {path} is missing required datasets: {}", .missing.join(", "))]
    MissingInputData {
        path: PathBuf,
        missing: Vec<&'static str>,
    },

    #[error("Malformed table {table}: {reason}")]
    MalformedTable { table: String, reason: String },

    #[error("Embedding model initialization failed: {0}")]
    ModelInit(String),

    #[error("Unsupported embedding model: {0}")]
    UnsupportedModel(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    #[error("Empty embeddings vector")]
    EmptyEmbeddings,

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("No vector store found at {path}")]
    StoreNotFound { path: PathBuf },

    #[error("Index was built with model {built_with}, but {requested} was requested")]
    ModelMismatch {
        built_with: String,
        requested: String,
    },

    #[error("Corrupt index at {path}: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    #[error("Invalid splitter configuration: {0}")]
    Splitter(String),
}

impl RAGError {
    /// True for the variants the front end reports as "run ingestion first".
    pub fn is_setup_required(&self) -> bool {
        matches!(
            self,
            RAGError::StoreNotFound { .. }
                | RAGError::CorruptIndex { .. }
                | RAGError::ModelMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RAGError>;

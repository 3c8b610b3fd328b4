use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Document {document_id} not found in group {group_id}")]
    DocumentNotFound { group_id: Uuid, document_id: Uuid },

    #[error("Embedding not found: {0}")]
    EmbeddingNotFound(String),

    #[error("Embedding already exists for document {0}")]
    DuplicateEmbedding(Uuid),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Document change queue is closed")]
    QueueClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// True for the typed "row is absent" conditions, as opposed to transport
    /// or storage failures.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RagError::DocumentNotFound { .. } | RagError::EmbeddingNotFound(_)
        )
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod search;

#[cfg(test)]
mod test_support;

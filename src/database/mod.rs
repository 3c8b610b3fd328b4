// Documents live in SQLite, their embeddings in LanceDB. The two stores are
// only reconciled by the indexer.

pub mod lancedb;
pub mod sqlite;

use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;

pub use self::lancedb::{DocumentEmbedding, DocumentScore, VectorStore};
pub use self::sqlite::{Database, Document, DocumentUpdate, DocumentsFilter, NewDocument};

/// Read access to persisted documents, always scoped to the owning group.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Fails with [`crate::RagError::DocumentNotFound`] if the document is
    /// absent or belongs to another group.
    async fn get_document(&self, group_id: Uuid, document_id: Uuid) -> Result<Document>;

    async fn get_documents(&self, group_id: Uuid, filter: &DocumentsFilter)
    -> Result<Vec<Document>>;
}

/// Persistent store of at most one embedding per document.
#[async_trait]
pub trait EmbeddingRepository: Send + Sync {
    async fn get_embedding(&self, id: Uuid) -> Result<DocumentEmbedding>;

    async fn get_embedding_for(&self, document_id: Uuid) -> Result<DocumentEmbedding>;

    /// Up to `limit` documents of `group_id` ordered by non-decreasing distance
    /// to `query`.
    async fn nearest(
        &self,
        group_id: Uuid,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<DocumentScore>>;

    async fn create_embedding(&self, embedding: DocumentEmbedding) -> Result<DocumentEmbedding>;

    async fn update_embedding_for(
        &self,
        document_id: Uuid,
        embedding: DocumentEmbedding,
    ) -> Result<DocumentEmbedding>;

    /// Idempotent; returns `document_id` whether or not a row existed.
    async fn delete_embedding_for(&self, document_id: Uuid) -> Result<Uuid>;

    async fn list_embedded_documents(&self, group_id: Uuid) -> Result<Vec<Uuid>>;

    /// Compact storage after a burst of writes
    async fn optimize(&self) -> Result<()>;
}

// LanceDB vector database module
// One embedding row per document, searched with exact cosine distance

#[cfg(test)]
mod tests;

pub mod vector_store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use vector_store::VectorStore;

/// Embedding row stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEmbedding {
    /// Identifier of the embedding row itself
    pub id: Uuid,
    /// Document this embedding was computed from
    pub document_id: Uuid,
    /// Group owning the document, kept here so searches can be scoped without a join
    pub group_id: Uuid,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl DocumentEmbedding {
    #[inline]
    pub fn new(document_id: Uuid, group_id: Uuid, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            group_id,
            vector,
            created_at: Utc::now(),
        }
    }
}

/// A ranked search hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentScore {
    pub document_id: Uuid,
    /// `1 - distance`, higher is more similar
    pub score: f32,
    /// Cosine distance to the query vector
    pub distance: f32,
}

impl DocumentScore {
    #[inline]
    pub fn from_distance(document_id: Uuid, distance: f32) -> Self {
        Self {
            document_id,
            score: 1.0 - distance,
            distance,
        }
    }
}

// In-memory stand-ins for the stores and models, shared by unit tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::{
    Document, DocumentEmbedding, DocumentRepository, DocumentScore, DocumentsFilter,
    EmbeddingRepository,
};
use crate::embeddings::{EmbeddingModel, GenerationModel};
use crate::{RagError, Result};

pub const TEST_DIMENSION: usize = 4;

#[derive(Default)]
pub struct InMemoryDocuments {
    documents: Mutex<Vec<Document>>,
    unavailable: Mutex<HashSet<Uuid>>,
}

impl InMemoryDocuments {
    pub async fn insert(
        &self,
        group_id: Uuid,
        filename: &str,
        content_type: &str,
        content: &str,
    ) -> Document {
        let document = Document {
            id: Uuid::new_v4(),
            group_id,
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            content: content.as_bytes().to_vec(),
            created_date: Utc::now().naive_utc(),
        };
        self.documents.lock().await.push(document.clone());
        document
    }

    pub async fn markdown(&self, group_id: Uuid, filename: &str, content: &str) -> Document {
        self.insert(group_id, filename, "text/markdown", content)
            .await
    }

    pub async fn set_content(&self, document_id: Uuid, content: &str) {
        let mut documents = self.documents.lock().await;
        if let Some(document) = documents.iter_mut().find(|d| d.id == document_id) {
            document.content = content.as_bytes().to_vec();
        }
    }

    pub async fn remove(&self, document_id: Uuid) {
        self.documents.lock().await.retain(|d| d.id != document_id);
    }

    /// Make fetches of `document_id` fail with a storage error
    pub async fn make_unavailable(&self, document_id: Uuid) {
        self.unavailable.lock().await.insert(document_id);
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocuments {
    async fn get_document(&self, group_id: Uuid, document_id: Uuid) -> Result<Document> {
        if self.unavailable.lock().await.contains(&document_id) {
            return Err(RagError::Database("document store unavailable".to_string()));
        }

        self.documents
            .lock()
            .await
            .iter()
            .find(|d| d.id == document_id && d.group_id == group_id)
            .cloned()
            .ok_or(RagError::DocumentNotFound {
                group_id,
                document_id,
            })
    }

    async fn get_documents(
        &self,
        group_id: Uuid,
        filter: &DocumentsFilter,
    ) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .lock()
            .await
            .iter()
            .filter(|d| d.group_id == group_id)
            .filter(|d| filter.ids.as_ref().is_none_or(|ids| ids.contains(&d.id)))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryEmbeddings {
    rows: Mutex<Vec<DocumentEmbedding>>,
    nearest_calls: AtomicUsize,
    optimize_calls: AtomicUsize,
}

impl InMemoryEmbeddings {
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn rows_for(&self, document_id: Uuid) -> usize {
        self.rows
            .lock()
            .await
            .iter()
            .filter(|row| row.document_id == document_id)
            .count()
    }

    pub fn nearest_calls(&self) -> usize {
        self.nearest_calls.load(Ordering::SeqCst)
    }

    pub fn optimize_calls(&self) -> usize {
        self.optimize_calls.load(Ordering::SeqCst)
    }
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[async_trait]
impl EmbeddingRepository for InMemoryEmbeddings {
    async fn get_embedding(&self, id: Uuid) -> Result<DocumentEmbedding> {
        self.rows
            .lock()
            .await
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or_else(|| RagError::EmbeddingNotFound(format!("id {}", id)))
    }

    async fn get_embedding_for(&self, document_id: Uuid) -> Result<DocumentEmbedding> {
        self.rows
            .lock()
            .await
            .iter()
            .find(|row| row.document_id == document_id)
            .cloned()
            .ok_or_else(|| RagError::EmbeddingNotFound(format!("document {}", document_id)))
    }

    async fn nearest(
        &self,
        group_id: Uuid,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<DocumentScore>> {
        self.nearest_calls.fetch_add(1, Ordering::SeqCst);

        let mut scores: Vec<DocumentScore> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| row.group_id == group_id)
            .map(|row| {
                DocumentScore::from_distance(row.document_id, cosine_distance(query, &row.vector))
            })
            .collect();

        scores.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scores.truncate(limit);
        Ok(scores)
    }

    async fn create_embedding(&self, embedding: DocumentEmbedding) -> Result<DocumentEmbedding> {
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|row| row.document_id == embedding.document_id) {
            return Err(RagError::DuplicateEmbedding(embedding.document_id));
        }
        rows.push(embedding.clone());
        Ok(embedding)
    }

    async fn update_embedding_for(
        &self,
        document_id: Uuid,
        embedding: DocumentEmbedding,
    ) -> Result<DocumentEmbedding> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|row| row.document_id == document_id)
            .ok_or_else(|| RagError::EmbeddingNotFound(format!("document {}", document_id)))?;

        row.vector = embedding.vector;
        row.group_id = embedding.group_id;
        Ok(row.clone())
    }

    async fn delete_embedding_for(&self, document_id: Uuid) -> Result<Uuid> {
        self.rows
            .lock()
            .await
            .retain(|row| row.document_id != document_id);
        Ok(document_id)
    }

    async fn list_embedded_documents(&self, group_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| row.group_id == group_id)
            .map(|row| row.document_id)
            .collect())
    }

    async fn optimize(&self) -> Result<()> {
        self.optimize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Embedding model returning fixed vectors for known texts and a
/// length-derived vector otherwise
#[derive(Default)]
pub struct FakeEmbedder {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub async fn set_vector(&self, text: &str, vector: [f32; TEST_DIMENSION]) {
        self.vectors
            .lock()
            .await
            .insert(text.to_string(), vector.to_vec());
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingModel for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::Embedding("embedding model unavailable".to_string()));
        }

        let vectors = self.vectors.lock().await;
        Ok(texts
            .iter()
            .map(|text| {
                vectors
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| vec![1.0, text.len() as f32, 0.5, 0.25])
            })
            .collect())
    }
}

#[derive(Default)]
pub struct FakeGenerator {
    fail: AtomicBool,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl FakeGenerator {
    pub const ANSWER: &'static str = "generated answer";

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().await.clone()
    }
}

#[async_trait]
impl GenerationModel for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().await = Some(prompt.to_string());

        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::Generation("generation model unavailable".to_string()));
        }
        Ok(Self::ANSWER.to_string())
    }
}

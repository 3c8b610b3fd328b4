// Retrieval-augmented answering over a group's documents

pub mod prompt;


use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::{Document, DocumentRepository, DocumentScore, EmbeddingRepository};
use crate::embeddings::{EmbeddingModel, GenerationModel};
use crate::{RagError, Result};

pub use prompt::build_prompt;

pub const DEFAULT_SEARCH_LIMIT: usize = 3;
/// Default number of documents for a retrieval-only lookup
pub const DEFAULT_SIMILAR_LIMIT: usize = 10;
/// Upper bound on documents retrieved for one query
pub const MAX_SEARCH_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    /// Number of documents to retrieve; zero or negative means the default
    #[serde(default)]
    pub limit: i64,
}

impl SearchQuery {
    #[inline]
    pub fn new(query: impl Into<String>, limit: i64) -> Self {
        Self {
            query: query.into(),
            limit,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Ranked hits as returned by the vector store, best first
    pub scores: Vec<DocumentScore>,
    pub answer: String,
}

pub struct SearchEngine {
    documents: Arc<dyn DocumentRepository>,
    embeddings: Arc<dyn EmbeddingRepository>,
    embedder: Arc<dyn EmbeddingModel>,
    generator: Arc<dyn GenerationModel>,
    default_limit: usize,
}

impl SearchEngine {
    #[inline]
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        embeddings: Arc<dyn EmbeddingRepository>,
        embedder: Arc<dyn EmbeddingModel>,
        generator: Arc<dyn GenerationModel>,
    ) -> Self {
        Self {
            documents,
            embeddings,
            embedder,
            generator,
            default_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    #[inline]
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.clamp(1, MAX_SEARCH_LIMIT);
        self
    }

    /// Limit used for answering: the requested one if positive, otherwise the
    /// configured default, never above [`MAX_SEARCH_LIMIT`]
    #[inline]
    pub fn effective_limit(&self, requested: i64) -> usize {
        resolve_limit(requested, self.default_limit)
    }

    /// Answer `query` from the documents of `group_id`.
    ///
    /// Embedding, retrieval and generation failures fail the whole search. A
    /// document that cannot be fetched is left out of the prompt but keeps its
    /// place in the returned scores.
    #[inline]
    pub async fn search(&self, group_id: Uuid, query: &SearchQuery) -> Result<SearchResult> {
        let text = query.query.trim();
        if text.is_empty() {
            debug!("Empty query for group {}, nothing to search", group_id);
            return Ok(SearchResult::default());
        }

        let limit = self.effective_limit(query.limit);
        info!(
            "Searching group {} (limit {}): {}",
            group_id, limit, query.query
        );

        let scores = self.retrieve(group_id, &query.query, limit).await?;
        let documents: Vec<Document> = self
            .fetch_documents(group_id, &scores)
            .await
            .into_iter()
            .map(|(_, document)| document)
            .collect();
        let prompt = build_prompt(&query.query, &documents);

        let answer = self.generator.generate(&prompt).await?;

        Ok(SearchResult { scores, answer })
    }

    /// Ranked documents of `group_id` for `query`, without generating an
    /// answer. A non-positive limit means [`DEFAULT_SIMILAR_LIMIT`].
    ///
    /// Documents that cannot be fetched are left out.
    #[inline]
    pub async fn similar_documents(
        &self,
        group_id: Uuid,
        query: &SearchQuery,
    ) -> Result<Vec<(DocumentScore, Document)>> {
        if query.query.trim().is_empty() {
            debug!("Empty query for group {}, nothing to look up", group_id);
            return Ok(Vec::new());
        }

        let limit = resolve_limit(query.limit, DEFAULT_SIMILAR_LIMIT);
        info!(
            "Looking up documents similar to {:?} in group {} (limit {})",
            query.query, group_id, limit
        );

        let scores = self.retrieve(group_id, &query.query, limit).await?;
        Ok(self.fetch_documents(group_id, &scores).await)
    }

    async fn retrieve(&self, group_id: Uuid, text: &str, limit: usize) -> Result<Vec<DocumentScore>> {
        let query_vector = self.embed_query(text).await?;
        let scores = self
            .embeddings
            .nearest(group_id, &query_vector, limit)
            .await?;
        debug!("Retrieved {} candidate documents", scores.len());
        Ok(scores)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned for query".to_string()))
    }

    /// Fetch ranked documents concurrently, keeping rank order and dropping
    /// the ones that fail
    async fn fetch_documents(
        &self,
        group_id: Uuid,
        scores: &[DocumentScore],
    ) -> Vec<(DocumentScore, Document)> {
        let fetches = scores
            .iter()
            .map(|score| self.documents.get_document(group_id, score.document_id));

        join_all(fetches)
            .await
            .into_iter()
            .zip(scores)
            .filter_map(|(result, score)| match result {
                Ok(document) => Some((*score, document)),
                Err(e) => {
                    warn!(
                        "Skipping document {} in group {}: {}",
                        score.document_id, group_id, e
                    );
                    None
                }
            })
            .collect()
    }
}

fn resolve_limit(requested: i64, default: usize) -> usize {
    usize::try_from(requested)
        .ok()
        .filter(|limit| *limit > 0)
        .unwrap_or(default)
        .min(MAX_SEARCH_LIMIT)
}

// Indexer module
// Keeps document embeddings in step with document changes

pub mod consistency;
pub mod queue;


use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::database::{DocumentEmbedding, DocumentRepository, EmbeddingRepository};
use crate::embeddings::EmbeddingModel;
use crate::{RagError, Result};

pub use consistency::{ConsistencyReport, ConsistencyValidator};
pub use queue::{
    DocumentChangeEvent, DocumentCommand, EmbeddingQueue, EventReceiver, channel,
};

/// Counters for the events a worker has consumed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingStats {
    pub events_received: usize,
    pub embeddings_created: usize,
    pub embeddings_updated: usize,
    pub embeddings_deleted: usize,
    pub events_skipped: usize,
    pub events_failed: usize,
}

impl IndexingStats {
    /// Number of events that changed the vector store
    #[inline]
    pub fn writes(&self) -> usize {
        self.embeddings_created + self.embeddings_updated + self.embeddings_deleted
    }
}

/// Single consumer of the document change queue.
///
/// Events are handled strictly one at a time in arrival order. A failing
/// event is logged and dropped; it never stops the loop.
pub struct EmbeddingWorker {
    documents: Arc<dyn DocumentRepository>,
    embeddings: Arc<dyn EmbeddingRepository>,
    embedder: Arc<dyn EmbeddingModel>,
    receiver: EventReceiver,
    stats: IndexingStats,
}

impl EmbeddingWorker {
    #[inline]
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        embeddings: Arc<dyn EmbeddingRepository>,
        embedder: Arc<dyn EmbeddingModel>,
        receiver: EventReceiver,
    ) -> Self {
        Self {
            documents,
            embeddings,
            embedder,
            receiver,
            stats: IndexingStats::default(),
        }
    }

    /// Consume events until every producer is gone and the buffer is drained
    #[inline]
    pub async fn run(mut self) -> IndexingStats {
        info!("Embedding worker started");

        while let Some(event) = self.receiver.recv().await {
            self.process_event(event).await;
        }

        if self.stats.writes() > 0 {
            if let Err(e) = self.embeddings.optimize().await {
                warn!("Failed to optimize vector database: {}", e);
            }
        }

        info!(
            "Embedding worker stopped: {} events, {} created, {} updated, {} deleted, {} skipped, {} failed",
            self.stats.events_received,
            self.stats.embeddings_created,
            self.stats.embeddings_updated,
            self.stats.embeddings_deleted,
            self.stats.events_skipped,
            self.stats.events_failed
        );
        self.stats
    }

    #[inline]
    pub async fn process_event(&mut self, event: DocumentChangeEvent) {
        self.stats.events_received += 1;
        debug!(
            "Processing {} for document {} in group {}",
            event.command, event.document_id, event.group_id
        );

        let result = match event.command {
            DocumentCommand::Create => self.create(event.group_id, event.document_id).await,
            DocumentCommand::Update => self.update(event.group_id, event.document_id).await,
            DocumentCommand::Delete => self.delete(event.document_id).await,
            DocumentCommand::Unknown => {
                error!(
                    "Unknown command for document {} in group {}, skipping",
                    event.document_id, event.group_id
                );
                self.stats.events_skipped += 1;
                return;
            }
        };

        if let Err(e) = result {
            error!(
                "Dropping {} for document {} in group {}: {}",
                event.command, event.document_id, event.group_id, e
            );
            self.stats.events_failed += 1;
        }
    }

    async fn create(&mut self, group_id: Uuid, document_id: Uuid) -> Result<()> {
        let vector = self.embed_document(group_id, document_id).await?;

        self.embeddings
            .create_embedding(DocumentEmbedding::new(document_id, group_id, vector))
            .await?;

        info!("Created embedding for document {}", document_id);
        self.stats.embeddings_created += 1;
        Ok(())
    }

    async fn update(&mut self, group_id: Uuid, document_id: Uuid) -> Result<()> {
        let vector = self.embed_document(group_id, document_id).await?;
        let embedding = DocumentEmbedding::new(document_id, group_id, vector);

        match self
            .embeddings
            .update_embedding_for(document_id, embedding.clone())
            .await
        {
            Ok(_) => {
                info!("Updated embedding for document {}", document_id);
                self.stats.embeddings_updated += 1;
                Ok(())
            }
            Err(RagError::EmbeddingNotFound(_)) => {
                warn!(
                    "No embedding to update for document {}, creating one",
                    document_id
                );
                self.embeddings.create_embedding(embedding).await?;
                self.stats.embeddings_created += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&mut self, document_id: Uuid) -> Result<()> {
        self.embeddings.delete_embedding_for(document_id).await?;

        info!("Deleted embedding for document {}", document_id);
        self.stats.embeddings_deleted += 1;
        Ok(())
    }

    async fn embed_document(&self, group_id: Uuid, document_id: Uuid) -> Result<Vec<f32>> {
        let document = self.documents.get_document(group_id, document_id).await?;
        let content = document.extract_content();

        let mut vectors = self.embedder.embed(&[content]).await?;
        if vectors.len() != 1 {
            return Err(RagError::Embedding(format!(
                "Expected one embedding for document {}, got {}",
                document_id,
                vectors.len()
            )));
        }

        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("Embedding model returned nothing".to_string()))
    }
}

/// Running embedding worker plus the queue that feeds it
pub struct Indexer {
    queue: EmbeddingQueue,
    handle: JoinHandle<IndexingStats>,
}

impl Indexer {
    /// Spawn a worker on the current runtime
    #[inline]
    pub fn start(
        documents: Arc<dyn DocumentRepository>,
        embeddings: Arc<dyn EmbeddingRepository>,
        embedder: Arc<dyn EmbeddingModel>,
        queue_capacity: usize,
    ) -> Self {
        let (queue, receiver) = channel(queue_capacity);
        let worker = EmbeddingWorker::new(documents, embeddings, embedder, receiver);
        let handle = tokio::spawn(worker.run());

        debug!("Indexer started with queue capacity {}", queue.max_capacity());
        Self { queue, handle }
    }

    /// Another producer handle for the worker queue
    #[inline]
    pub fn queue(&self) -> EmbeddingQueue {
        self.queue.clone()
    }

    #[inline]
    pub async fn enqueue_document_change(&self, event: DocumentChangeEvent) -> Result<()> {
        self.queue.enqueue(event).await
    }

    /// Close this handle's producer and wait for the worker to drain.
    ///
    /// Producers obtained from [`Indexer::queue`] keep the worker alive until
    /// they are dropped as well.
    #[inline]
    pub async fn shutdown(self) -> Result<IndexingStats> {
        let Self { queue, handle } = self;
        drop(queue);

        handle
            .await
            .map_err(|e| RagError::Other(anyhow::anyhow!("Embedding worker panicked: {}", e)))
    }
}

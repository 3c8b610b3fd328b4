// Consistency validation between the document store and the embedding store

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::queue::{DocumentChangeEvent, EmbeddingQueue};
use crate::Result;
use crate::database::{DocumentRepository, DocumentsFilter, EmbeddingRepository};

/// Differences between a group's documents and its embeddings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub group_id: Uuid,
    /// Number of documents in the group
    pub documents: usize,
    /// Number of embeddings stored for the group
    pub embeddings: usize,
    /// Documents that have no embedding
    pub missing: Vec<Uuid>,
    /// Embeddings whose document no longer exists
    pub orphaned: Vec<Uuid>,
}

impl ConsistencyReport {
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty()
    }

    #[inline]
    pub fn total_issues(&self) -> usize {
        self.missing.len() + self.orphaned.len()
    }

    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent() {
            format!(
                "Group {} is consistent: {} documents, {} embeddings",
                self.group_id, self.documents, self.embeddings
            )
        } else {
            format!(
                "Group {} has {} inconsistencies: {} documents without embedding, {} orphaned embeddings",
                self.group_id,
                self.total_issues(),
                self.missing.len(),
                self.orphaned.len()
            )
        }
    }
}

/// Compares one group's documents with its embeddings
pub struct ConsistencyValidator<'a> {
    documents: &'a dyn DocumentRepository,
    embeddings: &'a dyn EmbeddingRepository,
}

impl<'a> ConsistencyValidator<'a> {
    #[inline]
    pub fn new(
        documents: &'a dyn DocumentRepository,
        embeddings: &'a dyn EmbeddingRepository,
    ) -> Self {
        Self {
            documents,
            embeddings,
        }
    }

    #[inline]
    pub async fn validate_group(&self, group_id: Uuid) -> Result<ConsistencyReport> {
        info!("Validating embeddings for group {}", group_id);

        let documents = self
            .documents
            .get_documents(group_id, &DocumentsFilter::all())
            .await?;
        let embedded = self.embeddings.list_embedded_documents(group_id).await?;
        debug!(
            "Group {} has {} documents and {} embeddings",
            group_id,
            documents.len(),
            embedded.len()
        );

        let embedded_ids: HashSet<Uuid> = embedded.iter().copied().collect();
        let document_ids: HashSet<Uuid> = documents.iter().map(|d| d.id).collect();

        let missing: Vec<Uuid> = documents
            .iter()
            .map(|d| d.id)
            .filter(|id| !embedded_ids.contains(id))
            .collect();
        let orphaned: Vec<Uuid> = embedded
            .iter()
            .copied()
            .filter(|id| !document_ids.contains(id))
            .collect();

        let report = ConsistencyReport {
            group_id,
            documents: documents.len(),
            embeddings: embedded.len(),
            missing,
            orphaned,
        };

        if report.is_consistent() {
            info!("{}", report.summary());
        } else {
            warn!("{}", report.summary());
        }

        Ok(report)
    }

    /// Queue the events that bring the group back in line with `report`.
    ///
    /// Writes go through the worker like every other change, so this only
    /// enqueues. Returns the number of events queued.
    #[inline]
    pub async fn repair(&self, report: &ConsistencyReport, queue: &EmbeddingQueue) -> Result<usize> {
        let mut queued = 0;

        for document_id in &report.missing {
            queue
                .enqueue(DocumentChangeEvent::create(report.group_id, *document_id))
                .await?;
            queued += 1;
        }

        for document_id in &report.orphaned {
            queue
                .enqueue(DocumentChangeEvent::delete(report.group_id, *document_id))
                .await?;
            queued += 1;
        }

        info!(
            "Queued {} repair events for group {}",
            queued, report.group_id
        );
        Ok(queued)
    }
}

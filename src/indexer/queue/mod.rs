// Document change events and the bounded queue feeding the embedding worker


use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::{RagError, Result};

/// What happened to a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentCommand {
    Create,
    Update,
    Delete,
    /// Any command this build does not understand; the worker skips it
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for DocumentCommand {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentCommand::Create => write!(f, "CREATE"),
            DocumentCommand::Update => write!(f, "UPDATE"),
            DocumentCommand::Delete => write!(f, "DELETE"),
            DocumentCommand::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChangeEvent {
    pub command: DocumentCommand,
    pub group_id: Uuid,
    pub document_id: Uuid,
}

impl DocumentChangeEvent {
    #[inline]
    pub fn new(command: DocumentCommand, group_id: Uuid, document_id: Uuid) -> Self {
        Self {
            command,
            group_id,
            document_id,
        }
    }

    #[inline]
    pub fn create(group_id: Uuid, document_id: Uuid) -> Self {
        Self::new(DocumentCommand::Create, group_id, document_id)
    }

    #[inline]
    pub fn update(group_id: Uuid, document_id: Uuid) -> Self {
        Self::new(DocumentCommand::Update, group_id, document_id)
    }

    #[inline]
    pub fn delete(group_id: Uuid, document_id: Uuid) -> Self {
        Self::new(DocumentCommand::Delete, group_id, document_id)
    }
}

pub type EventReceiver = mpsc::Receiver<DocumentChangeEvent>;

/// Producer side of the worker queue. Cloning yields another producer for
/// the same worker.
#[derive(Debug, Clone)]
pub struct EmbeddingQueue {
    sender: mpsc::Sender<DocumentChangeEvent>,
}

/// Create a FIFO queue holding at most `capacity` pending events.
///
/// A capacity of zero is raised to one.
#[inline]
pub fn channel(capacity: usize) -> (EmbeddingQueue, EventReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (EmbeddingQueue { sender }, receiver)
}

impl EmbeddingQueue {
    /// Queue an event, waiting while the buffer is full.
    ///
    /// Fails with [`RagError::QueueClosed`] once the worker has stopped.
    #[inline]
    pub async fn enqueue(&self, event: DocumentChangeEvent) -> Result<()> {
        debug!(
            "Queueing {} for document {} in group {}",
            event.command, event.document_id, event.group_id
        );

        self.sender
            .send(event)
            .await
            .map_err(|_| RagError::QueueClosed)
    }

    /// Free slots left before producers start waiting
    #[inline]
    pub fn available_capacity(&self) -> usize {
        self.sender.capacity()
    }

    #[inline]
    pub fn max_capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

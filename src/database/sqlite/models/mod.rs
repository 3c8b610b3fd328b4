
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::warn;
use uuid::Uuid;

/// Content types whose bytes are treated as text
pub const SUPPORTED_CONTENT_TYPES: [&str; 3] = ["text/plain", "text/x-rst", "text/markdown"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub group_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
    pub created_date: NaiveDateTime,
}

impl Document {
    /// Decoded text of the document, or an empty string when the content type
    /// is not a supported text format.
    #[inline]
    pub fn extract_content(&self) -> String {
        if !is_supported_content_type(&self.content_type) {
            warn!(
                "Unsupported content type {} for document {} ({})",
                self.content_type, self.id, self.filename
            );
            return String::new();
        }

        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Compares the media type only, so `text/markdown; charset=utf-8` and
/// `Text/Plain` are both accepted.
#[inline]
pub fn is_supported_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    SUPPORTED_CONTENT_TYPES.contains(&media_type.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub group_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DocumentUpdate {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentsFilter {
    /// Restrict results to these ids; `None` means every document in the group
    pub ids: Option<Vec<Uuid>>,
}

impl DocumentsFilter {
    #[inline]
    pub fn all() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_ids(ids: Vec<Uuid>) -> Self {
        Self { ids: Some(ids) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GroupSummary {
    pub group_id: Uuid,
    pub document_count: i64,
}

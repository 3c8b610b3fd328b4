
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str = "id, group_id, filename, content_type, content, created_date";

pub struct DocumentQueries;

impl DocumentQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_document: NewDocument) -> Result<Document> {
        let document = Document {
            id: Uuid::new_v4(),
            group_id: new_document.group_id,
            filename: new_document.filename,
            content_type: new_document.content_type,
            content: new_document.content,
            created_date: Utc::now().naive_utc(),
        };

        sqlx::query(
            "INSERT INTO documents (id, group_id, filename, content_type, content, created_date) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(document.id)
        .bind(document.group_id)
        .bind(&document.filename)
        .bind(&document.content_type)
        .bind(&document.content)
        .bind(document.created_date)
        .execute(pool)
        .await
        .with_context(|| {
            format!(
                "Failed to create document {} in group {}",
                document.filename, document.group_id
            )
        })?;

        debug!("Created document {} ({})", document.id, document.filename);
        Ok(document)
    }

    #[inline]
    pub async fn get(pool: &SqlitePool, group_id: Uuid, id: Uuid) -> Result<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE group_id = ? AND id = ?"
        ))
        .bind(group_id)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document")?;

        Ok(document)
    }

    #[inline]
    pub async fn list_by_group(pool: &SqlitePool, group_id: Uuid) -> Result<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE group_id = ? ORDER BY created_date ASC, id ASC"
        ))
        .bind(group_id)
        .fetch_all(pool)
        .await
        .context("Failed to list documents for group")?;

        Ok(documents)
    }

    /// Documents of a group restricted to `ids`. An empty id list matches nothing.
    #[inline]
    pub async fn list_by_ids(
        pool: &SqlitePool,
        group_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE group_id = "
        ));
        builder.push_bind(group_id);
        builder.push(" AND id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        builder.push(" ORDER BY created_date ASC, id ASC");

        let documents = builder
            .build_query_as::<Document>()
            .fetch_all(pool)
            .await
            .context("Failed to list documents by id")?;

        Ok(documents)
    }

    #[inline]
    pub async fn update(
        pool: &SqlitePool,
        group_id: Uuid,
        id: Uuid,
        update: DocumentUpdate,
    ) -> Result<Option<Document>> {
        let Some(existing) = Self::get(pool, group_id, id).await? else {
            return Ok(None);
        };

        let updated = Document {
            filename: update.filename.unwrap_or(existing.filename),
            content_type: update.content_type.unwrap_or(existing.content_type),
            content: update.content.unwrap_or(existing.content),
            ..existing
        };

        sqlx::query(
            "UPDATE documents SET filename = ?, content_type = ?, content = ? WHERE group_id = ? AND id = ?",
        )
        .bind(&updated.filename)
        .bind(&updated.content_type)
        .bind(&updated.content)
        .bind(group_id)
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to update document {}", id))?;

        debug!("Updated document {}", id);
        Ok(Some(updated))
    }

    /// Returns whether a row was removed
    #[inline]
    pub async fn delete(pool: &SqlitePool, group_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE group_id = ? AND id = ?")
            .bind(group_id)
            .bind(id)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to delete document {}", id))?;

        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn list_groups(pool: &SqlitePool) -> Result<Vec<GroupSummary>> {
        let groups = sqlx::query_as::<_, GroupSummary>(
            "SELECT group_id, COUNT(*) AS document_count FROM documents GROUP BY group_id ORDER BY MIN(created_date) ASC",
        )
        .fetch_all(pool)
        .await
        .context("Failed to list document groups")?;

        Ok(groups)
    }

    #[inline]
    pub async fn count_all(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(pool)
            .await
            .context("Failed to count documents")?;

        Ok(count)
    }
}

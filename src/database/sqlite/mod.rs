use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::RagError;
use crate::config::Config;
use crate::database::DocumentRepository;
use crate::database::sqlite::queries::DocumentQueries;


pub mod models;
pub mod queries;

pub use models::{Document, DocumentUpdate, DocumentsFilter, GroupSummary, NewDocument};

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Open the database at the configured path, creating the base directory
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let base_dir = config.get_base_dir();
        std::fs::create_dir_all(base_dir).with_context(|| {
            format!("Failed to create config directory: {}", base_dir.display())
        })?;

        Self::new(config.database_path()).await
    }

    // Document operations
    #[inline]
    pub async fn create_document(&self, document: NewDocument) -> Result<Document> {
        DocumentQueries::create(&self.pool, document).await
    }

    #[inline]
    pub async fn update_document(
        &self,
        group_id: Uuid,
        id: Uuid,
        update: DocumentUpdate,
    ) -> Result<Option<Document>> {
        DocumentQueries::update(&self.pool, group_id, id, update).await
    }

    #[inline]
    pub async fn delete_document(&self, group_id: Uuid, id: Uuid) -> Result<bool> {
        DocumentQueries::delete(&self.pool, group_id, id).await
    }

    #[inline]
    pub async fn list_groups(&self) -> Result<Vec<GroupSummary>> {
        DocumentQueries::list_groups(&self.pool).await
    }

    #[inline]
    pub async fn count_documents(&self) -> Result<i64> {
        DocumentQueries::count_all(&self.pool).await
    }
}

#[async_trait]
impl DocumentRepository for Database {
    async fn get_document(&self, group_id: Uuid, document_id: Uuid) -> crate::Result<Document> {
        DocumentQueries::get(&self.pool, group_id, document_id)
            .await
            .map_err(|e| RagError::Database(format!("{:#}", e)))?
            .ok_or(RagError::DocumentNotFound {
                group_id,
                document_id,
            })
    }

    async fn get_documents(
        &self,
        group_id: Uuid,
        filter: &DocumentsFilter,
    ) -> crate::Result<Vec<Document>> {
        let documents = match &filter.ids {
            Some(ids) => DocumentQueries::list_by_ids(&self.pool, group_id, ids).await,
            None => DocumentQueries::list_by_group(&self.pool, group_id).await,
        };

        documents.map_err(|e| RagError::Database(format!("{:#}", e)))
    }
}

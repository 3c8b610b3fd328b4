
use super::{DocumentEmbedding, DocumentScore};
use crate::database::EmbeddingRepository;
use crate::{RagError, Result, config::Config};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase, Select},
    table::OptimizeAction,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const TABLE_NAME: &str = "document_embeddings";

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: usize,
}

impl VectorStore {
    /// Open the store under the configured base directory, sized to the
    /// configured embedding dimension
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        Self::open(
            &config.vector_database_path(),
            config.ollama.embedding_dimension as usize,
        )
        .await
    }

    /// Open or create the embeddings table at `db_path`
    ///
    /// Fails with [`RagError::DimensionMismatch`] if the table already exists
    /// with vectors of another size.
    #[inline]
    pub async fn open(db_path: &Path, vector_dimension: usize) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = db_path.to_string_lossy().to_string();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let store = Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            vector_dimension,
        };

        store.initialize_table().await?;

        info!(
            "Vector store initialized with {} dimensions",
            store.vector_dimension
        );
        Ok(store)
    }

    #[inline]
    pub fn vector_dimension(&self) -> usize {
        self.vector_dimension
    }

    async fn initialize_table(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            let existing = self.detect_existing_vector_dimension().await?;
            if existing != self.vector_dimension {
                return Err(RagError::DimensionMismatch {
                    expected: self.vector_dimension,
                    actual: existing,
                });
            }
            debug!("Embeddings table already exists with {} dimensions", existing);
            return Ok(());
        }

        info!(
            "Creating embeddings table with {} dimensions",
            self.vector_dimension
        );

        self.connection
            .create_empty_table(&self.table_name, self.create_schema())
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(RagError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("group_id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.vector_dimension as i32,
                ),
                false,
            ),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.vector_dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.vector_dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    async fn insert(&self, embedding: &DocumentEmbedding) -> Result<()> {
        let record_batch = self.create_record_batch(embedding)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.open_table()
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert embedding: {}", e)))?;

        Ok(())
    }

    fn create_record_batch(&self, embedding: &DocumentEmbedding) -> Result<RecordBatch> {
        let values_array = Float32Array::from(embedding.vector.clone());
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.vector_dimension as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(vec![embedding.id.to_string()])),
            Arc::new(StringArray::from(vec![embedding.document_id.to_string()])),
            Arc::new(StringArray::from(vec![embedding.group_id.to_string()])),
            Arc::new(vector_array),
            Arc::new(StringArray::from(vec![embedding.created_at.to_rfc3339()])),
        ];

        RecordBatch::try_new(self.create_schema(), arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Fetch the single row matching `predicate`, if any
    async fn find_one(&self, predicate: String) -> Result<Option<DocumentEmbedding>> {
        let results = self
            .open_table()
            .await?
            .query()
            .only_if(predicate)
            .limit(1)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute lookup: {}", e)))?;

        let mut embeddings = Self::collect_embeddings(results).await?;
        Ok(embeddings.pop())
    }

    async fn count_matching(&self, predicate: String) -> Result<usize> {
        self.open_table()
            .await?
            .count_rows(Some(predicate))
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }

    async fn collect_embeddings(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<DocumentEmbedding>> {
        let mut embeddings = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            embeddings.extend(parse_embedding_batch(&batch)?);
        }

        Ok(embeddings)
    }

    /// Get the total number of embeddings stored
    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64> {
        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}

#[async_trait]
impl EmbeddingRepository for VectorStore {
    async fn get_embedding(&self, id: Uuid) -> Result<DocumentEmbedding> {
        self.find_one(format!("id = '{}'", id))
            .await?
            .ok_or_else(|| RagError::EmbeddingNotFound(format!("id {}", id)))
    }

    async fn get_embedding_for(&self, document_id: Uuid) -> Result<DocumentEmbedding> {
        self.find_one(format!("document_id = '{}'", document_id))
            .await?
            .ok_or_else(|| RagError::EmbeddingNotFound(format!("document {}", document_id)))
    }

    async fn nearest(
        &self,
        group_id: Uuid,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<DocumentScore>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        debug!(
            "Searching group {} for {} nearest documents",
            group_id, limit
        );

        let mut results = self
            .open_table()
            .await?
            .vector_search(query)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .bypass_vector_index()
            .only_if(format!("group_id = '{}'", group_id))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut scores = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            scores.extend(parse_score_batch(&batch)?);
        }

        // Batches are not guaranteed to arrive in rank order
        scores.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scores.truncate(limit);

        debug!("Found {} nearest documents", scores.len());
        Ok(scores)
    }

    async fn create_embedding(&self, embedding: DocumentEmbedding) -> Result<DocumentEmbedding> {
        self.check_dimension(&embedding.vector)?;

        let existing = self
            .count_matching(format!("document_id = '{}'", embedding.document_id))
            .await?;
        if existing > 0 {
            return Err(RagError::DuplicateEmbedding(embedding.document_id));
        }

        self.insert(&embedding).await?;
        debug!(
            "Stored embedding {} for document {}",
            embedding.id, embedding.document_id
        );
        Ok(embedding)
    }

    async fn update_embedding_for(
        &self,
        document_id: Uuid,
        embedding: DocumentEmbedding,
    ) -> Result<DocumentEmbedding> {
        self.check_dimension(&embedding.vector)?;

        let current = self.get_embedding_for(document_id).await?;
        let replacement = DocumentEmbedding {
            id: current.id,
            document_id,
            group_id: embedding.group_id,
            vector: embedding.vector,
            created_at: current.created_at,
        };

        // Single commit: the old row stays visible until the new one lands
        let record_batch = self.create_record_batch(&replacement)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let table = self.open_table().await?;
        let mut merge = table.merge_insert(&["document_id"]);
        merge.when_matched_update_all(None);
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| RagError::Database(format!("Failed to replace embedding: {}", e)))?;

        debug!("Replaced embedding for document {}", document_id);
        Ok(replacement)
    }

    async fn delete_embedding_for(&self, document_id: Uuid) -> Result<Uuid> {
        self.open_table()
            .await?
            .delete(&format!("document_id = '{}'", document_id))
            .await
            .map_err(|e| RagError::Database(format!("Failed to delete embedding: {}", e)))?;

        debug!("Deleted embedding for document {}", document_id);
        Ok(document_id)
    }

    async fn list_embedded_documents(&self, group_id: Uuid) -> Result<Vec<Uuid>> {
        let predicate = format!("group_id = '{}'", group_id);
        let count = self.count_matching(predicate.clone()).await?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut results = self
            .open_table()
            .await?
            .query()
            .only_if(predicate)
            .select(Select::Columns(vec!["document_id".to_string()]))
            .limit(count)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list embeddings: {}", e)))?;

        let mut document_ids = Vec::with_capacity(count);
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            let column = string_column(&batch, "document_id")?;
            for row in 0..batch.num_rows() {
                document_ids.push(parse_uuid(column.value(row))?);
            }
        }

        Ok(document_ids)
    }

    /// Compact fragments and prune old table versions
    async fn optimize(&self) -> Result<()> {
        debug!("Optimizing vector database");

        self.open_table()
            .await?
            .optimize(OptimizeAction::All)
            .await
            .map_err(|e| RagError::Database(format!("Failed to optimize table: {}", e)))?;

        info!("Vector database optimization completed");
        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| RagError::Database(format!("Invalid stored id {}: {}", value, e)))
}

fn parse_embedding_batch(batch: &RecordBatch) -> Result<Vec<DocumentEmbedding>> {
    let ids = string_column(batch, "id")?;
    let document_ids = string_column(batch, "document_id")?;
    let group_ids = string_column(batch, "group_id")?;
    let created_ats = string_column(batch, "created_at")?;
    let vectors = batch
        .column_by_name("vector")
        .ok_or_else(|| RagError::Database("Missing vector column".to_string()))?
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| RagError::Database("Invalid vector column type".to_string()))?;

    let mut embeddings = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let values = vectors.value(row);
        let vector = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| RagError::Database("Invalid vector value type".to_string()))?
            .values()
            .to_vec();

        let created_at = DateTime::parse_from_rfc3339(created_ats.value(row))
            .map_err(|e| RagError::Database(format!("Invalid stored timestamp: {}", e)))?
            .with_timezone(&Utc);

        embeddings.push(DocumentEmbedding {
            id: parse_uuid(ids.value(row))?,
            document_id: parse_uuid(document_ids.value(row))?,
            group_id: parse_uuid(group_ids.value(row))?,
            vector,
            created_at,
        });
    }

    Ok(embeddings)
}

fn parse_score_batch(batch: &RecordBatch) -> Result<Vec<DocumentScore>> {
    let document_ids = string_column(batch, "document_id")?;
    let distances = batch
        .column_by_name("_distance")
        .ok_or_else(|| RagError::Database("Missing _distance column".to_string()))?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| RagError::Database("Invalid _distance column type".to_string()))?;

    let mut scores = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        scores.push(DocumentScore::from_distance(
            parse_uuid(document_ids.value(row))?,
            distances.value(row),
        ));
    }

    Ok(scores)
}

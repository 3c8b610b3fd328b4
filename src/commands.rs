use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::database::{
    Database, Document, DocumentRepository, DocumentUpdate, DocumentsFilter, EmbeddingRepository,
    NewDocument, VectorStore,
};
use crate::embeddings::{EmbeddingModel, GenerationModel, OllamaClient};
use crate::indexer::{ConsistencyValidator, DocumentChangeEvent, Indexer, IndexingStats};
use crate::search::{SearchEngine, SearchQuery};


/// Everything a command needs, opened from one base directory
pub struct AppContext {
    pub config: Config,
    pub database: Arc<Database>,
    pub vector_store: Arc<VectorStore>,
    pub ollama: Arc<OllamaClient>,
}

impl AppContext {
    #[inline]
    pub async fn open(base_dir: &Path) -> Result<Self> {
        let config = Config::load(base_dir).context("Failed to load configuration")?;

        let database = Database::from_config(&config)
            .await
            .context("Failed to initialize SQLite database")?;

        let vector_store = VectorStore::new(&config)
            .await
            .context("Failed to initialize LanceDB vector store")?;

        let ollama =
            OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;

        Ok(Self {
            config,
            database: Arc::new(database),
            vector_store: Arc::new(vector_store),
            ollama: Arc::new(ollama),
        })
    }

    #[inline]
    pub fn start_indexer(&self) -> Indexer {
        Indexer::start(
            Arc::clone(&self.database) as Arc<dyn DocumentRepository>,
            Arc::clone(&self.vector_store) as Arc<dyn EmbeddingRepository>,
            Arc::clone(&self.ollama) as Arc<dyn EmbeddingModel>,
            self.config.indexer.queue_capacity,
        )
    }

    #[inline]
    pub fn search_engine(&self) -> SearchEngine {
        SearchEngine::new(
            Arc::clone(&self.database) as Arc<dyn DocumentRepository>,
            Arc::clone(&self.vector_store) as Arc<dyn EmbeddingRepository>,
            Arc::clone(&self.ollama) as Arc<dyn EmbeddingModel>,
            Arc::clone(&self.ollama) as Arc<dyn GenerationModel>,
        )
        .with_default_limit(self.config.search.default_limit)
    }

    /// Hand one event to a fresh worker and wait until it has been processed
    async fn sync_embedding(&self, event: DocumentChangeEvent) -> Result<IndexingStats> {
        let indexer = self.start_indexer();
        indexer.enqueue_document_change(event).await?;
        drain_indexer(indexer).await
    }
}

/// Content type for a file, judged by its extension
#[inline]
pub fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("md" | "markdown") => "text/markdown",
        Some("rst") => "text/x-rst",
        Some("txt" | "text") => "text/plain",
        _ => "application/octet-stream",
    }
}

async fn drain_indexer(indexer: Indexer) -> Result<IndexingStats> {
    let bar = if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner()
            .with_style(ProgressStyle::with_template("{spinner} {msg}")?)
            .with_message("Updating embeddings");
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    };

    let stats = indexer.shutdown().await;
    bar.finish_and_clear();

    let stats = stats?;
    if stats.events_failed > 0 {
        warn!(
            "{} embedding update(s) failed, see the log for details",
            stats.events_failed
        );
    }
    Ok(stats)
}

fn print_sync_outcome(group_id: Uuid, stats: &IndexingStats) {
    if stats.events_failed > 0 {
        eprintln!(
            "{}",
            style(format!(
                "⚠ Embedding could not be updated, run 'post-rag check {} --repair' later",
                group_id
            ))
            .yellow()
        );
    } else {
        eprintln!("{}", style("✓ Embedding up to date").green());
    }
}

/// Store a new document and embed it
#[inline]
pub async fn add_document(
    ctx: &AppContext,
    group_id: Uuid,
    file: &Path,
    content_type: Option<String>,
    filename: Option<String>,
) -> Result<Document> {
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let filename = match filename {
        Some(name) => name,
        None => file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("File path has no file name")?,
    };
    let content_type = content_type.unwrap_or_else(|| guess_content_type(file).to_string());

    info!("Adding {} ({}) to group {}", filename, content_type, group_id);

    let document = ctx
        .database
        .create_document(NewDocument {
            group_id,
            filename,
            content_type,
            content,
        })
        .await
        .context("Failed to store document")?;

    println!("Created document {} ({})", document.id, document.filename);

    let stats = ctx
        .sync_embedding(DocumentChangeEvent::create(group_id, document.id))
        .await?;
    print_sync_outcome(group_id, &stats);

    Ok(document)
}

/// Replace a document's content and re-embed it
#[inline]
pub async fn update_document(
    ctx: &AppContext,
    group_id: Uuid,
    document_id: Uuid,
    file: &Path,
    content_type: Option<String>,
) -> Result<Document> {
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let document = ctx
        .database
        .update_document(
            group_id,
            document_id,
            DocumentUpdate {
                content_type,
                content: Some(content),
                ..DocumentUpdate::default()
            },
        )
        .await?
        .with_context(|| format!("Document {} not found in group {}", document_id, group_id))?;

    println!("Updated document {} ({})", document.id, document.filename);

    let stats = ctx
        .sync_embedding(DocumentChangeEvent::update(group_id, document.id))
        .await?;
    print_sync_outcome(group_id, &stats);

    Ok(document)
}

/// Delete a document and its embedding
#[inline]
pub async fn remove_document(ctx: &AppContext, group_id: Uuid, document_id: Uuid) -> Result<()> {
    let removed = ctx.database.delete_document(group_id, document_id).await?;
    if removed {
        println!("Deleted document {}", document_id);
    } else {
        println!(
            "Document {} was not found in group {}, removing any leftover embedding",
            document_id, group_id
        );
    }

    let stats = ctx
        .sync_embedding(DocumentChangeEvent::delete(group_id, document_id))
        .await?;
    print_sync_outcome(group_id, &stats);

    Ok(())
}

/// List groups, or the documents of one group with their embedding state
#[inline]
pub async fn list(ctx: &AppContext, group_id: Option<Uuid>) -> Result<()> {
    let Some(group_id) = group_id else {
        let groups = ctx.database.list_groups().await?;
        if groups.is_empty() {
            println!("No documents have been added yet.");
            println!("Use 'post-rag add <group> <file>' to add one.");
            return Ok(());
        }

        println!("Groups ({} total):", groups.len());
        for group in groups {
            println!("  {} ({} documents)", group.group_id, group.document_count);
        }
        return Ok(());
    };

    let documents = ctx
        .database
        .get_documents(group_id, &DocumentsFilter::all())
        .await?;
    if documents.is_empty() {
        println!("Group {} has no documents.", group_id);
        return Ok(());
    }

    let embedded = ctx.vector_store.list_embedded_documents(group_id).await?;

    println!("Documents in group {} ({} total):", group_id, documents.len());
    for document in &documents {
        let state = if embedded.contains(&document.id) {
            style("embedded").green()
        } else {
            style("not embedded").yellow()
        };
        println!(
            "  {} {} [{}] {} bytes, {}",
            document.id,
            document.filename,
            document.content_type,
            document.content.len(),
            state
        );
        println!(
            "      Created: {}",
            document.created_date.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// Answer a question from a group's documents
#[inline]
pub async fn search(ctx: &AppContext, group_id: Uuid, query: String, limit: i64) -> Result<()> {
    let engine = ctx.search_engine();
    let result = engine
        .search(group_id, &SearchQuery::new(query, limit))
        .await
        .context("Search failed")?;

    if result.scores.is_empty() && result.answer.is_empty() {
        println!("Nothing to search for.");
        return Ok(());
    }

    println!("{}", style("Answer").bold().cyan());
    println!("{}", result.answer.trim());
    println!();

    println!("{}", style("Sources").bold().cyan());
    if result.scores.is_empty() {
        println!("  (no embedded documents in this group)");
    }

    let ids: Vec<Uuid> = result.scores.iter().map(|s| s.document_id).collect();
    let documents = ctx
        .database
        .get_documents(group_id, &DocumentsFilter::with_ids(ids))
        .await?;

    for (rank, score) in result.scores.iter().enumerate() {
        let name = documents
            .iter()
            .find(|d| d.id == score.document_id)
            .map_or("<missing>", |d| d.filename.as_str());
        println!(
            "  {}. {} {} (score {:.4})",
            rank + 1,
            score.document_id,
            name,
            score.score
        );
    }

    Ok(())
}

/// List the documents of a group closest to a query, without answering
#[inline]
pub async fn similar(ctx: &AppContext, group_id: Uuid, query: String, limit: i64) -> Result<()> {
    let engine = ctx.search_engine();
    let similar = engine
        .similar_documents(group_id, &SearchQuery::new(query, limit))
        .await
        .context("Lookup failed")?;

    if similar.is_empty() {
        println!("No similar documents found in group {}.", group_id);
        return Ok(());
    }

    println!("{}", style("Similar documents").bold().cyan());
    for (rank, (score, document)) in similar.iter().enumerate() {
        println!(
            "  {}. {} {} [{}] (score {:.4})",
            rank + 1,
            document.id,
            document.filename,
            document.content_type,
            score.score
        );
    }

    Ok(())
}

/// Compare a group's documents with its embeddings, optionally repairing
#[inline]
pub async fn check(ctx: &AppContext, group_id: Uuid, repair: bool) -> Result<()> {
    let validator = ConsistencyValidator::new(ctx.database.as_ref(), ctx.vector_store.as_ref());
    let report = validator.validate_group(group_id).await?;

    println!("{}", report.summary());
    for document_id in &report.missing {
        println!("  🚫 Missing embedding: {}", document_id);
    }
    for document_id in &report.orphaned {
        println!("  👻 Orphaned embedding: {}", document_id);
    }

    if !repair {
        return Ok(());
    }
    if report.is_consistent() {
        ctx.vector_store
            .optimize()
            .await
            .context("Failed to optimize vector database")?;
        println!("Nothing to repair, vector database compacted");
        return Ok(());
    }

    let indexer = ctx.start_indexer();
    let queued = validator.repair(&report, &indexer.queue()).await?;
    println!("Queued {} repair events", queued);

    let stats = drain_indexer(indexer).await?;
    println!(
        "Repair finished: {} created, {} deleted, {} failed",
        stats.embeddings_created, stats.embeddings_deleted, stats.events_failed
    );

    Ok(())
}

/// Show Ollama health and store counts
#[inline]
pub async fn show_status(ctx: &AppContext) -> Result<()> {
    println!("{}", style("📊 Post RAG Status").bold().cyan());
    println!();

    println!("{}", style("Ollama:").bold().yellow());
    let client = ctx.ollama.as_ref().clone().with_retry_attempts(1);
    let health = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .context("Health check task failed")?;
    match health {
        Ok(()) => println!(
            "   ✅ Connected at {} (embedding: {}, generation: {})",
            ctx.ollama.base_url(),
            ctx.config.ollama.model,
            ctx.config.ollama.generation_model
        ),
        Err(e) => println!("   ❌ Unavailable at {}: {:#}", ctx.ollama.base_url(), e),
    }

    println!();
    println!("{}", style("Storage:").bold().yellow());
    println!("   📁 Base directory: {}", ctx.config.get_base_dir().display());
    println!(
        "   📄 Documents: {} in {} groups",
        ctx.database.count_documents().await?,
        ctx.database.list_groups().await?.len()
    );
    println!(
        "   🧮 Embeddings: {} ({} dimensions)",
        ctx.vector_store.count_embeddings().await?,
        ctx.vector_store.vector_dimension()
    );

    Ok(())
}

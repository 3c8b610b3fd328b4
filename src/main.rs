use anyhow::Result;
use clap::{Parser, Subcommand};
use post_rag::commands::{
    AppContext, add_document, check, list, remove_document, search, show_status, similar,
    update_document,
};
use post_rag::config::{resolve_base_dir, run_interactive_config, show_config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "post-rag")]
#[command(about = "Embedding sync and question answering over posts' documents")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml, metadata.db and the vector store
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Attach a file to a group and embed it
    Add {
        /// Group (post) the document belongs to
        group: Uuid,
        /// File to read the content from
        file: PathBuf,
        /// Override the content type guessed from the file extension
        #[arg(long)]
        content_type: Option<String>,
        /// Override the stored file name
        #[arg(long)]
        filename: Option<String>,
    },
    /// Replace a document's content and re-embed it
    Update {
        group: Uuid,
        document: Uuid,
        /// File to read the new content from
        file: PathBuf,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Delete a document and its embedding
    Remove { group: Uuid, document: Uuid },
    /// List groups, or the documents of one group
    List { group: Option<Uuid> },
    /// Ask a question answered from a group's documents
    Search {
        group: Uuid,
        query: String,
        /// Number of documents to use as context, 0 for the configured default
        #[arg(long, default_value_t = 0)]
        limit: i64,
    },
    /// List the documents of a group closest to a query, without answering
    Similar {
        group: Uuid,
        query: String,
        /// Number of documents to list, 0 for the default of 10
        #[arg(long, default_value_t = 0)]
        limit: i64,
    },
    /// Compare a group's documents with its embeddings
    Check {
        group: Uuid,
        /// Queue create/delete events for every discrepancy found
        #[arg(long)]
        repair: bool,
    },
    /// Show Ollama health and store counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.base_dir)?;

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&base_dir)?;
        } else {
            run_interactive_config(&base_dir)?;
        }
        return Ok(());
    }

    let ctx = AppContext::open(&base_dir).await?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Add {
            group,
            file,
            content_type,
            filename,
        } => {
            add_document(&ctx, group, &file, content_type, filename).await?;
        }
        Commands::Update {
            group,
            document,
            file,
            content_type,
        } => {
            update_document(&ctx, group, document, &file, content_type).await?;
        }
        Commands::Remove { group, document } => {
            remove_document(&ctx, group, document).await?;
        }
        Commands::List { group } => {
            list(&ctx, group).await?;
        }
        Commands::Search {
            group,
            query,
            limit,
        } => {
            search(&ctx, group, query, limit).await?;
        }
        Commands::Similar {
            group,
            query,
            limit,
        } => {
            similar(&ctx, group, query, limit).await?;
        }
        Commands::Check { group, repair } => {
            check(&ctx, group, repair).await?;
        }
        Commands::Status => {
            show_status(&ctx).await?;
        }
    }

    Ok(())
}

// Embeddings module
// Model capabilities used by the pipeline and their Ollama implementation

pub mod ollama;

use async_trait::async_trait;

use crate::Result;

pub use ollama::OllamaClient;

/// Turns text into fixed-dimension vectors
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Returns exactly one vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Produces an answer for a fully assembled prompt
#[async_trait]
pub trait GenerationModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

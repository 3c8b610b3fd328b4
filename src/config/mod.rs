// Configuration management module
// TOML settings stored in the base directory plus the interactive setup

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, IndexerConfig, OllamaConfig, SearchConfig};

/// Environment variable overriding the default base directory
pub const BASE_DIR_ENV: &str = "POST_RAG_DIR";

/// Resolve the base directory: explicit path, then `POST_RAG_DIR`, then the
/// platform config directory.
#[inline]
pub fn resolve_base_dir(
    explicit: Option<std::path::PathBuf>,
) -> Result<std::path::PathBuf, ConfigError> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }

    if let Some(dir) = std::env::var_os(BASE_DIR_ENV) {
        return Ok(std::path::PathBuf::from(dir));
    }

    Config::default_base_dir()
}

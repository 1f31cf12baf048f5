// Configuration management module
// TOML settings for the embedding provider and result ranking

pub mod settings;

#[cfg(test)]
mod tests;

use anyhow::Result;
use console::style;

pub use settings::{Config, ConfigError, EmbeddingConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}

/// Print the effective configuration to stderr
#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    match config.embedding.endpoint_url() {
        Ok(url) => eprintln!("  Endpoint: {}", style(url).cyan()),
        Err(e) => eprintln!("  Endpoint: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    eprintln!(
        "  Timeout: {}s",
        style(config.embedding.timeout_seconds).cyan()
    );
    let key_state = if config.embedding.api_key().is_ok() {
        style("set").green()
    } else {
        style("not set").red()
    };
    eprintln!(
        "  API Key: ${} ({})",
        style(&config.embedding.api_key_env).cyan(),
        key_state
    );

    eprintln!();
    eprintln!("{}", style("Ranking Settings:").bold().yellow());
    eprintln!(
        "  Keyword Weight: {}",
        style(config.ranking.keyword_weight).cyan()
    );
    eprintln!(
        "  Semantic Weight: {}",
        style(config.ranking.semantic_weight).cyan()
    );
    eprintln!(
        "  Confident Match Threshold: {}",
        style(config.ranking.confident_match_threshold).cyan()
    );
    eprintln!(
        "  Default Limit: {}",
        style(config.ranking.default_limit).cyan()
    );
    eprintln!(
        "  Similarity Threshold: {}",
        style(config.ranking.similarity_threshold).cyan()
    );
    eprintln!("  Minimum Score: {}", style(config.ranking.min_score).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    eprintln!(
        "Database: {}",
        style(config.database_path().display()).dim()
    );
}

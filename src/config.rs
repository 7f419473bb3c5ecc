//! Configuration parsing and validation.
//!
//! Synapse is configured via a TOML file (default: `config/synapse.toml`).
//!
//! # Example Configuration
//!
//! ```toml
//! [db]
//! path = "./data/synapse.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:7341"
//!
//! [auth]
//! jwt_secret = "change-me"
//!
//! [embedding]
//! default_provider = "gemini"     # "gemini" or "ollama"
//! timeout_secs = 30
//! max_retries = 2
//! cache_capacity = 1024           # 0 disables the embedding cache
//! fallback_only = false           # skip providers, always use token overlap
//!
//! [embedding.gemini]
//! model = "embedding-001"
//! api_key_env = "GEMINI_API_KEY"
//!
//! [embedding.ollama]
//! url = "http://localhost:11434"
//! model = "nomic-embed-text"
//!
//! [recommendations]
//! default_limit = 10
//! min_similarity = 0.1
//! auto_relate_threshold = 0.7
//! max_relations = 5
//! ```
//!
//! # Environment
//!
//! - `SYNAPSE_JWT_SECRET` overrides `auth.jwt_secret`.
//! - The Gemini API key is read from the variable named by
//!   `embedding.gemini.api_key_env`.
//!
//! # Validation
//!
//! [`load_config`] rejects:
//! - an empty `server.bind` or `auth.jwt_secret`
//! - `recommendations.default_limit` or `max_relations` of 0
//! - thresholds outside `[0.0, 1.0]`
//! - a `default_provider` other than `gemini` or `ollama`

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that replaces `auth.jwt_secret` when set.
pub const JWT_SECRET_ENV: &str = "SYNAPSE_JWT_SECRET";

/// Provider identifiers accepted in config and in requests.
pub const PROVIDERS: [&str; 2] = ["gemini", "ollama"];

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub recommendations: RecommendationsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `127.0.0.1:7341`.
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// HS256 signing secret for bearer tokens.
    #[serde(default)]
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Provider used when a request does not name one.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Never call a provider; score everything by token overlap.
    #[serde(default)]
    pub fallback_only: bool,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            cache_capacity: default_cache_capacity(),
            fallback_only: false,
            gemini: GeminiConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_cache_capacity() -> usize {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            api_key_env: default_gemini_key_env(),
            base_url: default_gemini_base_url(),
        }
    }
}

fn default_gemini_model() -> String {
    "embedding-001".to_string()
}
fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_ollama_model(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "nomic-embed-text".to_string()
}

/// Request defaults for the recommendation endpoints.
#[derive(Debug, Deserialize, Clone)]
pub struct RecommendationsConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    #[serde(default = "default_auto_relate_threshold")]
    pub auto_relate_threshold: f64,
    #[serde(default = "default_max_relations")]
    pub max_relations: usize,
}

impl Default for RecommendationsConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            min_similarity: default_min_similarity(),
            auto_relate_threshold: default_auto_relate_threshold(),
            max_relations: default_max_relations(),
        }
    }
}

fn default_limit() -> usize {
    10
}
fn default_min_similarity() -> f64 {
    0.1
}
fn default_auto_relate_threshold() -> f64 {
    0.7
}
fn default_max_relations() -> usize {
    5
}

/// Load, apply environment overrides to, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
        if !secret.is_empty() {
            config.auth.jwt_secret = secret;
        }
    }

    validate(&config)?;
    Ok(config)
}

/// Parse TOML without touching the environment or validating.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

pub fn validate(config: &Config) -> Result<()> {
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    if config.auth.jwt_secret.is_empty() {
        anyhow::bail!(
            "auth.jwt_secret must be set (or provide {} in the environment)",
            JWT_SECRET_ENV
        );
    }

    let rec = &config.recommendations;
    if rec.default_limit < 1 {
        anyhow::bail!("recommendations.default_limit must be >= 1");
    }
    if rec.max_relations < 1 {
        anyhow::bail!("recommendations.max_relations must be >= 1");
    }
    if !(0.0..=1.0).contains(&rec.min_similarity) {
        anyhow::bail!("recommendations.min_similarity must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&rec.auto_relate_threshold) {
        anyhow::bail!("recommendations.auto_relate_threshold must be in [0.0, 1.0]");
    }

    if !PROVIDERS.contains(&config.embedding.default_provider.as_str()) {
        anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be gemini or ollama.",
            config.embedding.default_provider
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/synapse.sqlite"

[server]
bind = "127.0.0.1:7341"

[auth]
jwt_secret = "secret"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.embedding.default_provider, "gemini");
        assert_eq!(config.embedding.gemini.model, "embedding-001");
        assert_eq!(config.embedding.gemini.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.embedding.ollama.url, "http://localhost:11434");
        assert_eq!(config.embedding.ollama.model, "nomic-embed-text");
        assert_eq!(config.embedding.cache_capacity, 1024);
        assert_eq!(config.embedding.max_retries, 2);
        assert!(!config.embedding.fallback_only);
        assert_eq!(config.recommendations.default_limit, 10);
        assert_eq!(config.recommendations.min_similarity, 0.1);
        assert_eq!(config.recommendations.auto_relate_threshold, 0.7);
        assert_eq!(config.recommendations.max_relations, 5);
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let toml = format!("{}\n[embedding]\ndefault_provider = \"openai\"\n", MINIMAL);
        let config = parse_config(&toml).unwrap();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("Unknown embedding provider"));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let toml = format!("{}\n[recommendations]\nmin_similarity = 1.5\n", MINIMAL);
        let config = parse_config(&toml).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_limit() {
        let toml = format!("{}\n[recommendations]\ndefault_limit = 0\n", MINIMAL);
        let config = parse_config(&toml).unwrap();
        assert!(validate(&config)
            .unwrap_err()
            .to_string()
            .contains("default_limit"));
    }

    #[test]
    fn test_rejects_missing_secret() {
        let toml = MINIMAL.replace("jwt_secret = \"secret\"", "");
        let config = parse_config(&toml).unwrap();
        assert!(validate(&config).unwrap_err().to_string().contains("jwt_secret"));
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("synapse.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/synapse.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}

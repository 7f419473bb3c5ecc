//! Remote embedding providers.
//!
//! Implements the core [`EmbeddingProvider`] trait for two backends:
//! - **[`GeminiProvider`]**: Google Generative Language API
//!   (`POST {base}/v1beta/models/{model}:embedContent?key=KEY`).
//! - **[`OllamaProvider`]**: a self-hosted Ollama instance
//!   (`POST {url}/api/embeddings`).
//!
//! [`ProviderSet`] builds both from configuration and resolves the
//! identifier a request asks for.
//!
//! # Retry Strategy
//!
//! Both providers share one request loop:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use synapse_core::embedding::EmbeddingProvider;
use synapse_core::error::ProviderError;

use crate::config::EmbeddingConfig;

/// POST `body` to `url`, retrying transient failures.
async fn post_with_retry(
    client: &reqwest::Client,
    label: &str,
    url: &str,
    body: &Value,
    max_retries: u32,
) -> Result<Value, ProviderError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client.post(url).json(body).send().await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response.json::<Value>().await.map_err(|e| {
                        ProviderError::InvalidResponse(format!(
                            "{} response is not JSON: {}",
                            label,
                            e.without_url()
                        ))
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                let err =
                    ProviderError::Request(format!("{} API error {}: {}", label, status, body_text));

                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }

                return Err(err);
            }
            Err(e) => {
                // the Gemini URL carries the API key; keep it out of messages
                last_err = Some(ProviderError::Request(format!(
                    "{} connection error: {}",
                    label,
                    e.without_url()
                )));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        ProviderError::Request(format!("{} embedding failed after retries", label))
    }))
}

fn to_vector(values: &[Value], label: &str) -> Result<Vec<f32>, ProviderError> {
    let vector: Vec<f32> = values
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                ProviderError::InvalidResponse(format!("{} embedding holds a non-number", label))
            })
        })
        .collect::<Result<_, _>>()?;

    if vector.is_empty() {
        return Err(ProviderError::InvalidResponse(format!(
            "{} returned an empty embedding",
            label
        )));
    }
    Ok(vector)
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

// ============ Gemini Provider ============

/// Embedding provider using the Google Generative Language API.
///
/// The API key comes from the environment variable named in config. A
/// provider built without a key still exists, but every call fails with
/// [`ProviderError::Unavailable`].
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl GeminiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.gemini.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        Self::with_key(config, api_key)
    }

    pub fn with_key(config: &EmbeddingConfig, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.gemini.base_url.trim_end_matches('/').to_string(),
            model: config.gemini.model.clone(),
            api_key,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::Unavailable("Gemini API key not configured".to_string())
        })?;

        let url = format!(
            "{}/v1beta/models/{}:embedContent?key={}",
            self.base_url, self.model, api_key
        );
        let body = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
        });

        let json = post_with_retry(&self.client, "Gemini", &url, &body, self.max_retries).await?;
        parse_gemini_response(&json)
    }
}

/// Extract `embedding.values` from a Gemini `embedContent` response.
fn parse_gemini_response(json: &Value) -> Result<Vec<f32>, ProviderError> {
    let values = json
        .get("embedding")
        .and_then(|e| e.get("values"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            ProviderError::InvalidResponse(
                "Invalid Gemini response: missing embedding.values".to_string(),
            )
        })?;
    to_vector(values, "Gemini")
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Requires Ollama to be running with the model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: config.ollama.url.trim_end_matches('/').to_string(),
            model: config.ollama.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.url);
        let body = json!({
            "model": self.model,
            "prompt": text,
        });

        let json = post_with_retry(&self.client, "Ollama", &url, &body, self.max_retries).await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &Value) -> Result<Vec<f32>, ProviderError> {
    let values = json
        .get("embedding")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            ProviderError::InvalidResponse(
                "Invalid Ollama response: missing embedding array".to_string(),
            )
        })?;
    to_vector(values, "Ollama")
}

// ============ Provider selection ============

/// Every configured provider, keyed by identifier.
pub struct ProviderSet {
    providers: HashMap<String, Arc<dyn EmbeddingProvider>>,
    default_provider: String,
    fallback_only: bool,
}

impl ProviderSet {
    /// Build the Gemini and Ollama providers from configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let mut set = Self::empty(&config.default_provider, config.fallback_only);
        set.insert(Arc::new(GeminiProvider::new(config)?));
        set.insert(Arc::new(OllamaProvider::new(config)?));
        Ok(set)
    }

    pub fn empty(default_provider: &str, fallback_only: bool) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.to_string(),
            fallback_only,
        }
    }

    /// Register a provider under its own [`name`](EmbeddingProvider::name).
    pub fn insert(&mut self, provider: Arc<dyn EmbeddingProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// The provider to score with, or `None` in fallback-only mode.
    ///
    /// Returns `Err` with the offending name when it is not registered.
    pub fn resolve(&self, name: &str) -> Result<Option<Arc<dyn EmbeddingProvider>>, String> {
        let provider = self
            .providers
            .get(name)
            .cloned()
            .ok_or_else(|| name.to_string())?;
        if self.fallback_only {
            return Ok(None);
        }
        Ok(Some(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config_for(base: &str) -> EmbeddingConfig {
        let mut config = EmbeddingConfig::default();
        config.gemini.base_url = base.to_string();
        config.ollama.url = base.to_string();
        config.max_retries = 1;
        config.timeout_secs = 5;
        config
    }

    /// Serve `router` on a random local port and return its base URL.
    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_parse_gemini_response() {
        let json = json!({"embedding": {"values": [0.5, -1.0, 2.0]}});
        assert_eq!(parse_gemini_response(&json).unwrap(), vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn test_parse_gemini_rejects_missing_or_empty() {
        assert!(matches!(
            parse_gemini_response(&json!({"error": "nope"})),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_gemini_response(&json!({"embedding": {"values": []}})),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_ollama_response() {
        let json = json!({"embedding": [1.0, 2.0]});
        assert_eq!(parse_ollama_response(&json).unwrap(), vec![1.0, 2.0]);
        assert!(parse_ollama_response(&json!({"embedding": ["x"]})).is_err());
        assert!(parse_ollama_response(&json!({})).is_err());
    }

    #[tokio::test]
    async fn test_gemini_without_key_is_unavailable() {
        let provider = GeminiProvider::with_key(&EmbeddingConfig::default(), None).unwrap();
        let err = provider.embed("text").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_gemini_wire_format() {
        let router = Router::new().route(
            "/v1beta/models/{call}",
            post(
                |axum::extract::Path(call): axum::extract::Path<String>,
                 axum::extract::RawQuery(query): axum::extract::RawQuery,
                 Json(body): Json<Value>| async move {
                    assert_eq!(call, "embedding-001:embedContent");
                    assert_eq!(query.as_deref(), Some("key=test-key"));
                    assert_eq!(body["model"], "models/embedding-001");
                    assert_eq!(body["content"]["parts"][0]["text"], "hello");
                    Json(json!({"embedding": {"values": [0.1, 0.2]}}))
                },
            ),
        );
        let base = spawn(router).await;
        let provider =
            GeminiProvider::with_key(&config_for(&base), Some("test-key".to_string())).unwrap();
        assert_eq!(provider.embed("hello").await.unwrap(), vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn test_ollama_wire_format() {
        let router = Router::new().route(
            "/api/embeddings",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "nomic-embed-text");
                assert_eq!(body["prompt"], "hello");
                Json(json!({"embedding": [3.0, 4.0]}))
            }),
        );
        let base = spawn(router).await;
        let provider = OllamaProvider::new(&config_for(&base)).unwrap();
        assert_eq!(provider.embed("hello").await.unwrap(), vec![3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/api/embeddings",
                post(|State(calls): State<Arc<AtomicUsize>>| async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({})))
                    } else {
                        (StatusCode::OK, Json(json!({"embedding": [1.0]})))
                    }
                }),
            )
            .with_state(calls.clone());
        let base = spawn(router).await;
        let provider = OllamaProvider::new(&config_for(&base)).unwrap();

        assert_eq!(provider.embed("x").await.unwrap(), vec![1.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/api/embeddings",
                post(|State(calls): State<Arc<AtomicUsize>>| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::BAD_REQUEST, "model not found")
                }),
            )
            .with_state(calls.clone());
        let base = spawn(router).await;
        let provider = OllamaProvider::new(&config_for(&base)).unwrap();

        let err = provider.embed("x").await.unwrap_err();
        assert!(matches!(err, ProviderError::Request(_)));
        assert!(err.to_string().contains("400"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_provider_set_resolution() {
        let config = EmbeddingConfig::default();
        let set = ProviderSet::from_config(&config).unwrap();
        assert_eq!(set.default_provider(), "gemini");
        assert!(set.resolve("gemini").unwrap().is_some());
        assert_eq!(set.resolve("ollama").unwrap().unwrap().name(), "ollama");
        assert_eq!(set.resolve("openai").err(), Some("openai".to_string()));
    }

    #[test]
    fn test_fallback_only_resolves_to_none() {
        let mut config = EmbeddingConfig::default();
        config.fallback_only = true;
        let set = ProviderSet::from_config(&config).unwrap();
        assert!(set.resolve("gemini").unwrap().is_none());
        assert!(set.resolve("bogus").is_err());
    }
}

//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus the pure helpers the scorer needs: cosine similarity and
//! the article-to-text projection fed to the provider.
//!
//! Concrete providers (Gemini, Ollama) live in the `synapse` app crate.

use async_trait::async_trait;

use crate::error::{DimensionMismatch, ProviderError};
use crate::models::Article;

/// Trait for embedding providers.
///
/// Implementations turn text into a fixed-length vector. Every failure,
/// including an empty payload, is reported as a [`ProviderError`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier the provider is selected by (e.g. `"gemini"`, `"ollama"`).
    ///
    /// Also used as the second half of the embedding cache key.
    fn name(&self) -> &str;

    /// Returns the model identifier (e.g. `"embedding-001"`).
    fn model_name(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` when either vector has zero
/// norm (this includes two empty vectors).
///
/// # Errors
///
/// [`DimensionMismatch`] when the vectors have different lengths.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, DimensionMismatch> {
    if a.len() != b.len() {
        return Err(DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Build the text an article is embedded from.
///
/// One labelled line per non-empty field, in a fixed order.
pub fn article_text(article: &Article) -> String {
    let parts = [
        ("Title", &article.title),
        ("Abstract", &article.abstract_text),
        ("Keywords", &article.keywords),
        ("Authors", &article.authors),
        ("Journal", &article.journal),
        ("Notes", &article.notes),
    ];

    parts
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| format!("{}: {}", label, value))
        .collect::<Vec<_>>()
        .join("\n")
}

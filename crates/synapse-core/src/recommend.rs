//! Recommendation assembly: exclusion, scoring, ranking and auto-relate.
//!
//! # Pipeline
//!
//! ```text
//! candidates ──▶ exclude target + linked ──▶ score ──▶ stable sort desc
//!                      │                       │
//!               total_candidates     Embedding(provider) ──err──▶ Fallback
//! ```
//!
//! The embedding strategy is all-or-nothing: the first provider or
//! dimension error abandons it and every candidate is rescored by the
//! token-overlap fallback. Provider errors never escape this module.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::EmbeddingCache;
use crate::embedding::{article_text, cosine_similarity, EmbeddingProvider};
use crate::error::{ProviderError, ScoringError};
use crate::models::Article;
use crate::similarity::fallback_score;
use crate::store::Store;

/// How a candidate set is scored.
#[derive(Clone, Copy)]
pub enum ScoringStrategy<'a> {
    /// Cosine similarity of provider embeddings.
    Embedding(&'a dyn EmbeddingProvider),
    /// Weighted token overlap; needs no I/O.
    Fallback,
}

impl<'a> ScoringStrategy<'a> {
    /// `Embedding` when a provider is given, otherwise `Fallback`.
    pub fn from_provider(provider: Option<&'a dyn EmbeddingProvider>) -> Self {
        match provider {
            Some(p) => ScoringStrategy::Embedding(p),
            None => ScoringStrategy::Fallback,
        }
    }
}

/// The strategy that actually produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyUsed {
    Embedding,
    Fallback,
}

/// A candidate with its similarity to the target.
#[derive(Debug, Clone)]
pub struct Scored<'c> {
    pub article: &'c Article,
    pub score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct RecommendOptions {
    pub limit: usize,
    pub min_similarity: f64,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            min_similarity: 0.1,
        }
    }
}

/// One ranked recommendation.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub article: Article,
    /// Unrounded score in `[0, 1]`.
    pub similarity: f64,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct RecommendOutcome {
    pub recommendations: Vec<Recommendation>,
    /// Candidates left after excluding the target and linked articles.
    pub total_candidates: usize,
    pub strategy: StrategyUsed,
}

#[derive(Debug, Clone, Copy)]
pub struct AutoRelateOptions {
    pub threshold: f64,
    pub max_relations: usize,
}

impl Default for AutoRelateOptions {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            max_relations: 5,
        }
    }
}

/// A relation written by [`Recommender::auto_relate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRelation {
    pub article_id: String,
    pub title: String,
    pub similarity: f64,
}

#[derive(Debug, Clone)]
pub struct AutoRelateOutcome {
    pub relations_created: usize,
    pub created: Vec<CreatedRelation>,
    pub total_candidates: usize,
    pub strategy: StrategyUsed,
}

/// Round a score to two decimals for display.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Human-readable explanation of a recommendation.
pub fn recommendation_reason(article: &Article, score: f64) -> String {
    let mut reasons: Vec<&str> = Vec::new();

    if score >= 0.8 {
        reasons.push("Very high similarity");
    } else if score >= 0.6 {
        reasons.push("High similarity");
    } else if score >= 0.4 {
        reasons.push("Moderate similarity");
    } else if score >= 0.2 {
        reasons.push("Low similarity");
    }

    if !article.keywords.trim().is_empty() {
        reasons.push("Related keywords");
    }
    if article.abstract_text.chars().count() > 100 {
        reasons.push("Similar abstract content");
    }
    if article.title.chars().count() > 20 {
        reasons.push("Related title");
    }

    if reasons.is_empty() {
        "Similarity based on textual content".to_string()
    } else {
        reasons.join(", ")
    }
}

/// Candidates eligible for recommendation against `target`.
///
/// Drops the target itself, articles from another project or owner, and
/// anything linked to the target in either direction.
pub fn eligible_candidates<'c>(target: &Article, candidates: &'c [Article]) -> Vec<&'c Article> {
    candidates
        .iter()
        .filter(|c| c.id != target.id)
        .filter(|c| c.project_id == target.project_id && c.owner == target.owner)
        .filter(|c| !target.relates_to(&c.id) && !c.relates_to(&target.id))
        .collect()
}

/// Scores and ranks candidates, caching provider embeddings.
pub struct Recommender {
    cache: Arc<EmbeddingCache>,
}

impl Recommender {
    pub fn new(cache: Arc<EmbeddingCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    async fn embed_article(
        &self,
        provider: &dyn EmbeddingProvider,
        article: &Article,
    ) -> Result<Arc<Vec<f32>>, ProviderError> {
        if let Some(vector) = self.cache.get(&article.id, provider.name()) {
            debug!(
                article = %article.id,
                provider = provider.name(),
                model = provider.model_name(),
                "embedding cache hit"
            );
            return Ok(vector);
        }

        let vector = provider.embed(&article_text(article)).await?;
        if vector.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "provider returned an empty vector".to_string(),
            ));
        }

        let vector = Arc::new(vector);
        self.cache.put(&article.id, provider.name(), vector.clone());
        Ok(vector)
    }

    /// Embedding path: one score per candidate, or the first error.
    async fn embedding_scores(
        &self,
        provider: &dyn EmbeddingProvider,
        target: &Article,
        candidates: &[&Article],
    ) -> Result<Vec<f64>, ScoringError> {
        let target_vec = self.embed_article(provider, target).await?;
        let mut scores = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let vector = self.embed_article(provider, candidate).await?;
            let cosine = cosine_similarity(&target_vec, &vector)?;
            scores.push((cosine as f64).clamp(0.0, 1.0));
        }
        Ok(scores)
    }

    /// Score candidates with `strategy`, falling back on any embedding error.
    ///
    /// The result is sorted by descending score; ties keep input order.
    pub async fn score<'c>(
        &self,
        target: &Article,
        candidates: &[&'c Article],
        strategy: ScoringStrategy<'_>,
    ) -> (Vec<Scored<'c>>, StrategyUsed) {
        let (mut scored, used) = match strategy {
            ScoringStrategy::Embedding(_) if candidates.is_empty() => {
                (Vec::new(), StrategyUsed::Embedding)
            }
            ScoringStrategy::Embedding(provider) => {
                match self.embedding_scores(provider, target, candidates).await {
                    Ok(scores) => (
                        candidates
                            .iter()
                            .copied()
                            .zip(scores)
                            .map(|(article, score)| Scored { article, score })
                            .collect(),
                        StrategyUsed::Embedding,
                    ),
                    Err(e) => {
                        warn!(
                            provider = provider.name(),
                            model = provider.model_name(),
                            error = %e,
                            "embedding scoring failed, using token-overlap fallback"
                        );
                        (score_fallback(target, candidates), StrategyUsed::Fallback)
                    }
                }
            }
            ScoringStrategy::Fallback => {
                (score_fallback(target, candidates), StrategyUsed::Fallback)
            }
        };

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        (scored, used)
    }

    /// Rank recommendations for `target` among `candidates`.
    pub async fn recommend(
        &self,
        target: &Article,
        candidates: &[Article],
        provider: Option<&dyn EmbeddingProvider>,
        options: RecommendOptions,
    ) -> RecommendOutcome {
        let eligible = eligible_candidates(target, candidates);
        let total_candidates = eligible.len();

        let (scored, strategy) = self
            .score(target, &eligible, ScoringStrategy::from_provider(provider))
            .await;

        let recommendations = scored
            .into_iter()
            .take(options.limit)
            .filter(|s| s.score >= options.min_similarity)
            .map(|s| Recommendation {
                reason: recommendation_reason(s.article, s.score),
                article: s.article.clone(),
                similarity: s.score,
            })
            .collect();

        RecommendOutcome {
            recommendations,
            total_candidates,
            strategy,
        }
    }

    /// Link `target` to its most similar candidates in both directions.
    ///
    /// Each link is two independent store writes. A link counts only when
    /// both succeed; a failed write is logged and the next candidate is
    /// processed. When only the reverse write fails the forward one is
    /// removed again, so a later call can retry the pair. Calling this twice
    /// never duplicates relations.
    pub async fn auto_relate<S: Store + ?Sized>(
        &self,
        store: &S,
        target: &Article,
        candidates: &[Article],
        provider: Option<&dyn EmbeddingProvider>,
        options: AutoRelateOptions,
    ) -> Result<AutoRelateOutcome> {
        let eligible = eligible_candidates(target, candidates);
        let total_candidates = eligible.len();

        let (scored, strategy) = self
            .score(target, &eligible, ScoringStrategy::from_provider(provider))
            .await;

        let mut created = Vec::new();
        for s in scored
            .into_iter()
            .filter(|s| s.score >= options.threshold)
            .take(options.max_relations)
        {
            let candidate = s.article;

            if let Err(e) = store.add_related(&target.id, &candidate.id).await {
                warn!(article = %target.id, candidate = %candidate.id, error = %e, "failed to write relation");
                continue;
            }
            if let Err(e) = store.add_related(&candidate.id, &target.id).await {
                warn!(article = %target.id, candidate = %candidate.id, error = %e, "failed to write reverse relation");
                // a one-sided link would hide the pair from every later run
                if let Err(e) = store.remove_related(&target.id, &candidate.id).await {
                    warn!(article = %target.id, candidate = %candidate.id, error = %e, "failed to roll back forward relation");
                }
                continue;
            }

            created.push(CreatedRelation {
                article_id: candidate.id.clone(),
                title: candidate.title.clone(),
                similarity: round2(s.score),
            });
        }

        Ok(AutoRelateOutcome {
            relations_created: created.len(),
            created,
            total_candidates,
            strategy,
        })
    }
}

fn score_fallback<'c>(target: &Article, candidates: &[&'c Article]) -> Vec<Scored<'c>> {
    candidates
        .iter()
        .copied()
        .filter_map(|article| {
            fallback_score(target, article).map(|score| Scored { article, score })
        })
        .collect()
}

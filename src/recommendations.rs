//! Recommendation, auto-relate and insight endpoints.
//!
//! Handlers resolve the requested provider (falling back to
//! `[embedding].default_provider`), fill unset knobs from
//! `[recommendations]`, and hand the project's articles to the shared
//! [`Recommender`](synapse_core::recommend::Recommender). Provider failures
//! never surface here: the recommender degrades to token overlap and the
//! response reports `strategy: "fallback"`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use synapse_core::embedding::EmbeddingProvider;
use synapse_core::insights::{generate_insights, insights_metadata, MIN_ARTICLES_FOR_INSIGHTS};
use synapse_core::recommend::{
    round2, AutoRelateOptions, CreatedRelation, RecommendOptions, StrategyUsed,
};

use crate::articles::owned_article;
use crate::auth::AuthUser;
use crate::projects::owned_project;
use crate::server::{bad_request, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/articles/{id}/recommendations",
            get(recommend),
        )
        .route(
            "/projects/{project_id}/articles/{id}/recommendations/auto-relate",
            post(auto_relate),
        )
        .route(
            "/projects/{project_id}/recommendations/insights",
            get(insights),
        )
}

/// Resolve `requested` (or the default) to a provider name and handle.
fn resolve_provider(
    state: &AppState,
    requested: Option<&str>,
) -> ApiResult<(String, Option<Arc<dyn EmbeddingProvider>>)> {
    let name = requested
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.providers.default_provider())
        .to_string();
    let provider = state
        .providers
        .resolve(&name)
        .map_err(|unknown| bad_request(format!("Unknown embedding provider: {}", unknown)))?;
    Ok((name, provider))
}

fn check_unit_interval(name: &str, value: f64) -> ApiResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(bad_request(format!("{} must be between 0 and 1", name)));
    }
    Ok(())
}

// ============ GET .../articles/{id}/recommendations ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendQuery {
    provider: Option<String>,
    limit: Option<usize>,
    min_similarity: Option<f64>,
}

#[derive(Debug, Serialize)]
struct TargetSummary {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    authors: String,
    year: i32,
}

#[derive(Debug, Serialize)]
struct RecommendationItem {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    authors: String,
    year: i32,
    journal: String,
    #[serde(rename = "abstract")]
    abstract_text: String,
    keywords: String,
    similarity: f64,
    reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendMetadata {
    total_candidates: usize,
    recommendations_found: usize,
    provider: String,
    min_similarity: f64,
    strategy: StrategyUsed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendResponse {
    target_article: TargetSummary,
    recommendations: Vec<RecommendationItem>,
    metadata: RecommendMetadata,
}

async fn recommend(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, id)): Path<(String, String)>,
    query: Result<Query<RecommendQuery>, QueryRejection>,
) -> ApiResult<Json<RecommendResponse>> {
    let Query(query) = query?;
    let defaults = &state.config.recommendations;

    let limit = query.limit.unwrap_or(defaults.default_limit);
    if limit < 1 {
        return Err(bad_request("limit must be >= 1"));
    }
    let min_similarity = query.min_similarity.unwrap_or(defaults.min_similarity);
    check_unit_interval("minSimilarity", min_similarity)?;
    let (provider_name, provider) = resolve_provider(&state, query.provider.as_deref())?;

    let target = owned_article(&state, &user, &project_id, &id).await?;
    let candidates = state.store.list_articles(&user.user_id, &project_id).await?;

    let outcome = state
        .recommender
        .recommend(
            &target,
            &candidates,
            provider.as_deref(),
            RecommendOptions {
                limit,
                min_similarity,
            },
        )
        .await;

    let recommendations: Vec<RecommendationItem> = outcome
        .recommendations
        .into_iter()
        .map(|r| RecommendationItem {
            id: r.article.id,
            title: r.article.title,
            authors: r.article.authors,
            year: r.article.year,
            journal: r.article.journal,
            abstract_text: r.article.abstract_text,
            keywords: r.article.keywords,
            similarity: round2(r.similarity),
            reason: r.reason,
        })
        .collect();

    Ok(Json(RecommendResponse {
        target_article: TargetSummary {
            id: target.id,
            title: target.title,
            authors: target.authors,
            year: target.year,
        },
        metadata: RecommendMetadata {
            total_candidates: outcome.total_candidates,
            recommendations_found: recommendations.len(),
            provider: provider_name,
            min_similarity,
            strategy: outcome.strategy,
        },
        recommendations,
    }))
}

// ============ POST .../articles/{id}/recommendations/auto-relate ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutoRelateInput {
    provider: Option<String>,
    similarity_threshold: Option<f64>,
    max_relations: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AutoRelateMetadata {
    similarity_threshold: f64,
    max_relations: usize,
    provider: String,
    strategy: StrategyUsed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AutoRelateResponse {
    success: bool,
    message: String,
    relations_created: usize,
    created_relations: Vec<CreatedRelation>,
    metadata: AutoRelateMetadata,
}

async fn auto_relate(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, id)): Path<(String, String)>,
    payload: Result<Json<AutoRelateInput>, JsonRejection>,
) -> ApiResult<Json<AutoRelateResponse>> {
    // The body is optional: no body means all defaults.
    let input = match payload {
        Ok(Json(input)) => input,
        Err(JsonRejection::MissingJsonContentType(_)) => AutoRelateInput::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let defaults = &state.config.recommendations;

    let threshold = input
        .similarity_threshold
        .unwrap_or(defaults.auto_relate_threshold);
    check_unit_interval("similarityThreshold", threshold)?;
    let max_relations = input.max_relations.unwrap_or(defaults.max_relations);
    if max_relations < 1 {
        return Err(bad_request("maxRelations must be >= 1"));
    }
    let (provider_name, provider) = resolve_provider(&state, input.provider.as_deref())?;

    let target = owned_article(&state, &user, &project_id, &id).await?;
    let candidates = state.store.list_articles(&user.user_id, &project_id).await?;

    let outcome = state
        .recommender
        .auto_relate(
            state.store.as_ref(),
            &target,
            &candidates,
            provider.as_deref(),
            AutoRelateOptions {
                threshold,
                max_relations,
            },
        )
        .await?;

    Ok(Json(AutoRelateResponse {
        success: true,
        message: format!(
            "Created {} new relationship(s) for \"{}\"",
            outcome.relations_created, target.title
        ),
        relations_created: outcome.relations_created,
        created_relations: outcome.created,
        metadata: AutoRelateMetadata {
            similarity_threshold: threshold,
            max_relations,
            provider: provider_name,
            strategy: outcome.strategy,
        },
    }))
}

// ============ GET /projects/{project_id}/recommendations/insights ============

async fn insights(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Value>> {
    owned_project(&state, &user, &project_id).await?;
    let articles = state.store.list_articles(&user.user_id, &project_id).await?;

    if articles.len() < MIN_ARTICLES_FOR_INSIGHTS {
        return Ok(Json(json!({
            "insights": [],
            "message": format!(
                "Add at least {} articles to generate insights",
                MIN_ARTICLES_FOR_INSIGHTS
            ),
        })));
    }

    Ok(Json(json!({
        "insights": generate_insights(&articles),
        "metadata": insights_metadata(&articles, Utc::now()),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_interval_bounds() {
        assert!(check_unit_interval("x", 0.0).is_ok());
        assert!(check_unit_interval("x", 1.0).is_ok());
        assert!(check_unit_interval("x", 1.5).is_err());
        assert!(check_unit_interval("x", -0.1).is_err());
        assert!(check_unit_interval("x", f64::NAN).is_err());
    }

    #[test]
    fn test_recommend_query_uses_camel_case() {
        let query: RecommendQuery =
            serde_json::from_value(json!({ "minSimilarity": 0.3, "limit": 4 })).unwrap();
        assert_eq!(query.min_similarity, Some(0.3));
        assert_eq!(query.limit, Some(4));
        assert!(query.provider.is_none());
    }
}

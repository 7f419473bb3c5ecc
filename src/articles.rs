//! Article CRUD, screening updates and manual relationships.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{delete, get, patch},
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use synapse_core::models::{Article, ArticleInput, ArticleStatus};

use crate::auth::AuthUser;
use crate::projects::owned_project;
use crate::server::{bad_request, not_found, paginate, ApiResult, AppState, Pagination};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/articles",
            get(list_articles).post(create_article),
        )
        .route(
            "/projects/{project_id}/articles/{id}",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route(
            "/projects/{project_id}/articles/{id}/status",
            patch(update_status),
        )
        .route(
            "/projects/{project_id}/articles/{id}/notes",
            patch(update_notes),
        )
        .route(
            "/projects/{project_id}/articles/{id}/relationships",
            get(list_relationships).post(add_relationship),
        )
        .route(
            "/projects/{project_id}/articles/{id}/relationships/{related_id}",
            delete(remove_relationship),
        )
}

/// Load an article of an owned project, or 404.
pub(crate) async fn owned_article(
    state: &AppState,
    user: &AuthUser,
    project_id: &str,
    id: &str,
) -> ApiResult<Article> {
    owned_project(state, user, project_id).await?;
    state
        .store
        .get_article(&user.user_id, project_id, id)
        .await?
        .ok_or_else(|| not_found("article not found"))
}

/// Case-insensitive substring match over title, authors and abstract.
fn matches_search(article: &Article, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    [&article.title, &article.authors, &article.abstract_text]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

// ============ GET /projects/{project_id}/articles ============

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    search: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ArticleListResponse {
    articles: Vec<Article>,
    pagination: Pagination,
}

async fn list_articles(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ArticleListResponse>> {
    let Query(query) = query?;
    owned_project(&state, &user, &project_id).await?;

    let status = match query.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(s) => Some(
            ArticleStatus::parse(s)
                .ok_or_else(|| bad_request(format!("invalid article status: {}", s)))?,
        ),
    };
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let articles: Vec<Article> = state
        .store
        .list_articles(&user.user_id, &project_id)
        .await?
        .into_iter()
        .filter(|a| status.map_or(true, |s| a.status == s))
        .filter(|a| search.map_or(true, |s| matches_search(a, s)))
        .collect();

    let (articles, pagination) = paginate(
        articles,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(20),
    )?;

    Ok(Json(ArticleListResponse {
        articles,
        pagination,
    }))
}

// ============ POST /projects/{project_id}/articles ============

async fn create_article(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    payload: Result<Json<ArticleInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(input) = payload?;
    owned_project(&state, &user, &project_id).await?;

    let now = Utc::now();
    let mut article = Article::blank(
        &uuid::Uuid::new_v4().to_string(),
        &project_id,
        &user.user_id,
        now,
    );
    input.apply_to(&mut article);
    article.validate(now.year())?;

    state.store.insert_article(&article).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Article created",
            "article": article,
        })),
    ))
}

// ============ GET /projects/{project_id}/articles/{id} ============

async fn get_article(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let article = owned_article(&state, &user, &project_id, &id).await?;
    Ok(Json(json!({ "article": article })))
}

// ============ PUT /projects/{project_id}/articles/{id} ============

async fn update_article(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, id)): Path<(String, String)>,
    payload: Result<Json<ArticleInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    let mut article = owned_article(&state, &user, &project_id, &id).await?;

    let now = Utc::now();
    input.apply_to(&mut article);
    article.validate(now.year())?;
    article.updated_at = now;

    save(&state, &article).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Article updated",
        "article": article,
    })))
}

async fn save(state: &AppState, article: &Article) -> ApiResult<()> {
    if !state.store.update_article(article).await? {
        return Err(not_found("article not found"));
    }
    state.forget_embeddings(&article.id);
    Ok(())
}

// ============ DELETE /projects/{project_id}/articles/{id} ============

async fn delete_article(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    owned_project(&state, &user, &project_id).await?;

    if !state
        .store
        .delete_article(&user.user_id, &project_id, &id)
        .await?
    {
        return Err(not_found("article not found"));
    }
    state.forget_embeddings(&id);

    Ok(Json(json!({
        "success": true,
        "message": "Article deleted",
    })))
}

// ============ PATCH .../status and .../notes ============

#[derive(Debug, Deserialize)]
struct StatusInput {
    status: Option<String>,
}

async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, id)): Path<(String, String)>,
    payload: Result<Json<StatusInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    let raw = input
        .status
        .ok_or_else(|| bad_request("status is required"))?;
    let status = ArticleStatus::parse(raw.trim()).ok_or_else(|| {
        bad_request("status must be one of pending, reviewed, excluded")
    })?;

    let mut article = owned_article(&state, &user, &project_id, &id).await?;
    article.status = status;
    article.updated_at = Utc::now();
    save(&state, &article).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Article status updated",
        "article": article,
    })))
}

#[derive(Debug, Deserialize)]
struct NotesInput {
    #[serde(default)]
    notes: String,
}

async fn update_notes(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, id)): Path<(String, String)>,
    payload: Result<Json<NotesInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;

    let mut article = owned_article(&state, &user, &project_id, &id).await?;
    article.notes = input.notes.trim().to_string();
    article.updated_at = Utc::now();
    save(&state, &article).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Article notes updated",
        "article": article,
    })))
}

// ============ Relationships ============

#[derive(Debug, Serialize, PartialEq)]
struct RelatedSummary {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    authors: String,
    year: i32,
    journal: String,
}

async fn list_relationships(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let article = owned_article(&state, &user, &project_id, &id).await?;
    let project_articles = state.store.list_articles(&user.user_id, &project_id).await?;

    let related: Vec<RelatedSummary> = article
        .related_articles
        .iter()
        .filter_map(|rid| project_articles.iter().find(|a| &a.id == rid))
        .map(|a| RelatedSummary {
            id: a.id.clone(),
            title: a.title.clone(),
            authors: a.authors.clone(),
            year: a.year,
            journal: a.journal.clone(),
        })
        .collect();

    Ok(Json(json!({
        "article": {
            "_id": article.id,
            "title": article.title,
        },
        "relatedArticles": related,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationshipInput {
    related_article_id: Option<String>,
}

async fn add_relationship(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, id)): Path<(String, String)>,
    payload: Result<Json<RelationshipInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    let related_id = input
        .related_article_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("relatedArticleId is required"))?;

    let article = owned_article(&state, &user, &project_id, &id).await?;
    if related_id == article.id {
        return Err(bad_request("an article cannot be related to itself"));
    }
    state
        .store
        .get_article(&user.user_id, &project_id, &related_id)
        .await?
        .ok_or_else(|| not_found("related article not found"))?;

    let added = state.store.add_related(&article.id, &related_id).await?;
    let article = owned_article(&state, &user, &project_id, &id).await?;

    Ok(Json(json!({
        "success": true,
        "message": if added { "Relationship added" } else { "Relationship already exists" },
        "article": article,
    })))
}

async fn remove_relationship(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, id, related_id)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    owned_article(&state, &user, &project_id, &id).await?;

    let removed = state.store.remove_related(&id, &related_id).await?;
    let article = owned_article(&state, &user, &project_id, &id).await?;

    Ok(Json(json!({
        "success": true,
        "message": if removed { "Relationship removed" } else { "Relationship did not exist" },
        "article": article,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_is_case_insensitive_over_three_fields() {
        let mut a = Article::blank("a", "p", "u", Utc::now());
        a.title = "Serious Games".into();
        a.authors = "Silva, J.".into();
        a.abstract_text = "A study of Motivation".into();
        a.journal = "Nature".into();

        assert!(matches_search(&a, "games"));
        assert!(matches_search(&a, "SILVA"));
        assert!(matches_search(&a, "motivation"));
        assert!(!matches_search(&a, "nature"));
    }
}

//! Project CRUD and the project relationship graph.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

use synapse_core::models::{Article, ArticleStatus, Project, ProjectInput, ProjectStatus};

use crate::auth::AuthUser;
use crate::server::{bad_request, not_found, paginate, ApiResult, AppState, Pagination};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{project_id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/{project_id}/graph", get(project_graph))
}

/// Load a project the caller owns, or 404.
pub(crate) async fn owned_project(
    state: &AppState,
    user: &AuthUser,
    project_id: &str,
) -> ApiResult<Project> {
    state
        .store
        .get_project(&user.user_id, project_id)
        .await?
        .ok_or_else(|| not_found("project not found"))
}

#[derive(Debug, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub total_articles: usize,
    pub reviewed_articles: usize,
    pub pending_articles: usize,
    /// Reviewed share in percent, rounded.
    pub progress: u32,
}

impl ProjectStats {
    pub fn of(articles: &[Article]) -> Self {
        let total = articles.len();
        let reviewed = articles
            .iter()
            .filter(|a| a.status == ArticleStatus::Reviewed)
            .count();
        let pending = articles
            .iter()
            .filter(|a| a.status == ArticleStatus::Pending)
            .count();
        let progress = if total > 0 {
            (reviewed as f64 / total as f64 * 100.0).round() as u32
        } else {
            0
        };
        Self {
            total_articles: total,
            reviewed_articles: reviewed,
            pending_articles: pending,
            progress,
        }
    }
}

// ============ GET /projects ============

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectSummary {
    #[serde(flatten)]
    project: Project,
    progress: u32,
    total_articles: usize,
    reviewed_articles: usize,
}

#[derive(Serialize)]
struct ProjectListResponse {
    projects: Vec<ProjectSummary>,
    pagination: Pagination,
}

async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ProjectListResponse>> {
    let Query(query) = query?;

    let status = match query.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(s) => Some(
            ProjectStatus::parse(s)
                .ok_or_else(|| bad_request(format!("invalid project status: {}", s)))?,
        ),
    };

    let projects: Vec<Project> = state
        .store
        .list_projects(&user.user_id)
        .await?
        .into_iter()
        .filter(|p| status.map_or(true, |s| p.status == s))
        .collect();

    let (page, pagination) = paginate(
        projects,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(10),
    )?;

    let mut summaries = Vec::with_capacity(page.len());
    for project in page {
        let articles = state.store.list_articles(&user.user_id, &project.id).await?;
        let stats = ProjectStats::of(&articles);
        summaries.push(ProjectSummary {
            project,
            progress: stats.progress,
            total_articles: stats.total_articles,
            reviewed_articles: stats.reviewed_articles,
        });
    }

    Ok(Json(ProjectListResponse {
        projects: summaries,
        pagination,
    }))
}

// ============ POST /projects ============

async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<ProjectInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(input) = payload?;

    let now = Utc::now();
    let mut project = Project::blank(&uuid::Uuid::new_v4().to_string(), &user.user_id, now);
    input.apply_to(&mut project);
    project.validate()?;

    state.store.create_project(&project).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Project created",
            "project": project,
        })),
    ))
}

// ============ GET /projects/{project_id} ============

async fn get_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let project = owned_project(&state, &user, &project_id).await?;
    let articles = state.store.list_articles(&user.user_id, &project_id).await?;

    Ok(Json(json!({
        "project": project,
        "stats": ProjectStats::of(&articles),
    })))
}

// ============ PUT /projects/{project_id} ============

async fn update_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    payload: Result<Json<ProjectInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    let mut project = owned_project(&state, &user, &project_id).await?;

    input.apply_to(&mut project);
    project.validate()?;
    project.updated_at = Utc::now();

    if !state.store.update_project(&project).await? {
        return Err(not_found("project not found"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Project updated",
        "project": project,
    })))
}

// ============ DELETE /projects/{project_id} ============

async fn delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Value>> {
    owned_project(&state, &user, &project_id).await?;

    let articles = state.store.list_articles(&user.user_id, &project_id).await?;
    if !state.store.delete_project(&user.user_id, &project_id).await? {
        return Err(not_found("project not found"));
    }
    for article in &articles {
        state.forget_embeddings(&article.id);
    }

    Ok(Json(json!({
        "success": true,
        "message": "Project deleted",
    })))
}

// ============ GET /projects/{project_id}/graph ============

#[derive(Debug, Serialize, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub title: String,
    pub authors: String,
    pub year: i32,
    pub journal: String,
    pub status: ArticleStatus,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Serialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Nodes for every article; an edge per related id that is also a node.
pub fn build_graph(articles: &[Article]) -> Graph {
    let ids: HashSet<&str> = articles.iter().map(|a| a.id.as_str()).collect();

    let nodes = articles
        .iter()
        .map(|a| GraphNode {
            id: a.id.clone(),
            title: a.title.clone(),
            authors: a.authors.clone(),
            year: a.year,
            journal: a.journal.clone(),
            status: a.status,
        })
        .collect();

    let edges = articles
        .iter()
        .flat_map(|a| {
            a.related_articles
                .iter()
                .filter(|r| ids.contains(r.as_str()))
                .map(move |r| GraphEdge {
                    source: a.id.clone(),
                    target: r.clone(),
                })
        })
        .collect();

    Graph { nodes, edges }
}

async fn project_graph(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Graph>> {
    owned_project(&state, &user, &project_id).await?;
    let articles = state.store.list_articles(&user.user_id, &project_id).await?;
    Ok(Json(build_graph(&articles)))
}

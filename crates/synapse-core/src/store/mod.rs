//! Storage abstraction for Synapse.
//!
//! The [`Store`] trait covers every persistence operation the HTTP handlers
//! and the recommender need, so the engine can run against SQLite in the
//! server and against [`memory::InMemoryStore`] in tests.
//!
//! Reads are scoped by owner: a record owned by someone else is reported as
//! absent (`None` / `false`), never as a distinct error.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Article, Project};

/// Abstract storage backend for projects and articles.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_project`](Store::create_project) | Insert a new project |
/// | [`update_project`](Store::update_project) | Overwrite an existing project |
/// | [`get_project`](Store::get_project) | Fetch one project by owner + id |
/// | [`list_projects`](Store::list_projects) | All projects of an owner, newest first |
/// | [`delete_project`](Store::delete_project) | Delete a project with its articles and relations |
/// | [`insert_article`](Store::insert_article) | Insert a new article |
/// | [`update_article`](Store::update_article) | Overwrite an article's fields |
/// | [`get_article`](Store::get_article) | Fetch one article within a project |
/// | [`list_articles`](Store::list_articles) | All articles of a project, newest first |
/// | [`delete_article`](Store::delete_article) | Delete an article and every relation touching it |
/// | [`add_related`](Store::add_related) | Append one directed relation |
/// | [`remove_related`](Store::remove_related) | Remove one directed relation |
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_project(&self, project: &Project) -> Result<()>;

    /// Returns `false` when no project with that id and owner exists.
    async fn update_project(&self, project: &Project) -> Result<bool>;

    async fn get_project(&self, owner: &str, id: &str) -> Result<Option<Project>>;

    async fn list_projects(&self, owner: &str) -> Result<Vec<Project>>;

    /// Returns `false` when nothing was deleted.
    async fn delete_project(&self, owner: &str, id: &str) -> Result<bool>;

    async fn insert_article(&self, article: &Article) -> Result<()>;

    /// Writes every field except `related_articles`, which only changes
    /// through [`add_related`](Store::add_related) and
    /// [`remove_related`](Store::remove_related).
    async fn update_article(&self, article: &Article) -> Result<bool>;

    async fn get_article(
        &self,
        owner: &str,
        project_id: &str,
        id: &str,
    ) -> Result<Option<Article>>;

    async fn list_articles(&self, owner: &str, project_id: &str) -> Result<Vec<Article>>;

    async fn delete_article(&self, owner: &str, project_id: &str, id: &str) -> Result<bool>;

    /// Append `related_id` to `article_id`'s related set.
    ///
    /// Returns `false` if the relation already existed.
    async fn add_related(&self, article_id: &str, related_id: &str) -> Result<bool>;

    /// Returns `false` if there was no such relation.
    async fn remove_related(&self, article_id: &str, related_id: &str) -> Result<bool>;
}

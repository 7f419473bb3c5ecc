//! SQLite-backed [`Store`] implementation.
//!
//! Projects keep their list-valued fields as JSON text columns. Relations
//! are rows of `article_relations`; an article's related set is read back
//! in `rowid` order, which is insertion order.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use synapse_core::models::{Article, ArticleStatus, Picoc, Project, ProjectStatus};
use synapse_core::store::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn related_ids(&self, article_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT related_id FROM article_relations WHERE article_id = ? ORDER BY rowid",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("related_id")).collect())
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("invalid timestamp: {}", ms))
}

fn json_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let raw: String = row.get(column);
    Ok(serde_json::from_str(&raw)?)
}

fn project_from_row(row: &SqliteRow) -> Result<Project> {
    let status: String = row.get("status");
    let picoc: String = row.get("picoc_json");
    Ok(Project {
        id: row.get("id"),
        owner: row.get("owner"),
        title: row.get("title"),
        objective: row.get("objective"),
        status: ProjectStatus::parse(&status)
            .ok_or_else(|| anyhow!("invalid project status in database: {}", status))?,
        picoc: serde_json::from_str::<Picoc>(&picoc)?,
        research_questions: json_list(row, "research_questions_json")?,
        keywords: json_list(row, "keywords_json")?,
        search_strings: json_list(row, "search_strings_json")?,
        inclusion_criteria: json_list(row, "inclusion_criteria_json")?,
        exclusion_criteria: json_list(row, "exclusion_criteria_json")?,
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}

fn article_from_row(row: &SqliteRow, related_articles: Vec<String>) -> Result<Article> {
    let status: String = row.get("status");
    Ok(Article {
        id: row.get("id"),
        project_id: row.get("project_id"),
        owner: row.get("owner"),
        title: row.get("title"),
        authors: row.get("authors"),
        year: row.get("year"),
        journal: row.get("journal"),
        doi: row.get("doi"),
        abstract_text: row.get("abstract"),
        keywords: row.get("keywords"),
        notes: row.get("notes"),
        pages: row.get("pages"),
        volume: row.get("volume"),
        number: row.get("number"),
        issn: row.get("issn"),
        status: ArticleStatus::parse(&status)
            .ok_or_else(|| anyhow!("invalid article status in database: {}", status))?,
        related_articles,
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_project(&self, project: &Project) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, owner, title, objective, status, picoc_json,
                                  research_questions_json, keywords_json, search_strings_json,
                                  inclusion_criteria_json, exclusion_criteria_json,
                                  created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project.id)
        .bind(&project.owner)
        .bind(&project.title)
        .bind(&project.objective)
        .bind(project.status.as_str())
        .bind(serde_json::to_string(&project.picoc)?)
        .bind(serde_json::to_string(&project.research_questions)?)
        .bind(serde_json::to_string(&project.keywords)?)
        .bind(serde_json::to_string(&project.search_strings)?)
        .bind(serde_json::to_string(&project.inclusion_criteria)?)
        .bind(serde_json::to_string(&project.exclusion_criteria)?)
        .bind(to_millis(project.created_at))
        .bind(to_millis(project.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_project(&self, project: &Project) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE projects SET
                title = ?, objective = ?, status = ?, picoc_json = ?,
                research_questions_json = ?, keywords_json = ?, search_strings_json = ?,
                inclusion_criteria_json = ?, exclusion_criteria_json = ?, updated_at = ?
            WHERE id = ? AND owner = ?
            "#,
        )
        .bind(&project.title)
        .bind(&project.objective)
        .bind(project.status.as_str())
        .bind(serde_json::to_string(&project.picoc)?)
        .bind(serde_json::to_string(&project.research_questions)?)
        .bind(serde_json::to_string(&project.keywords)?)
        .bind(serde_json::to_string(&project.search_strings)?)
        .bind(serde_json::to_string(&project.inclusion_criteria)?)
        .bind(serde_json::to_string(&project.exclusion_criteria)?)
        .bind(to_millis(project.updated_at))
        .bind(&project.id)
        .bind(&project.owner)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_project(&self, owner: &str, id: &str) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ? AND owner = ?")
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(project_from_row).transpose()
    }

    async fn list_projects(&self, owner: &str) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT * FROM projects WHERE owner = ? ORDER BY created_at DESC, rowid DESC")
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(project_from_row).collect()
    }

    async fn delete_project(&self, owner: &str, id: &str) -> Result<bool> {
        // articles and their relations go with it via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM projects WHERE id = ? AND owner = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_article(&self, article: &Article) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles (id, project_id, owner, title, authors, year, journal, doi,
                                  abstract, keywords, notes, pages, volume, number, issn,
                                  status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.id)
        .bind(&article.project_id)
        .bind(&article.owner)
        .bind(&article.title)
        .bind(&article.authors)
        .bind(article.year)
        .bind(&article.journal)
        .bind(&article.doi)
        .bind(&article.abstract_text)
        .bind(&article.keywords)
        .bind(&article.notes)
        .bind(&article.pages)
        .bind(&article.volume)
        .bind(&article.number)
        .bind(&article.issn)
        .bind(article.status.as_str())
        .bind(to_millis(article.created_at))
        .bind(to_millis(article.updated_at))
        .execute(&self.pool)
        .await?;

        for related_id in &article.related_articles {
            self.add_related(&article.id, related_id).await?;
        }
        Ok(())
    }

    async fn update_article(&self, article: &Article) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE articles SET
                title = ?, authors = ?, year = ?, journal = ?, doi = ?, abstract = ?,
                keywords = ?, notes = ?, pages = ?, volume = ?, number = ?, issn = ?,
                status = ?, updated_at = ?
            WHERE id = ? AND owner = ?
            "#,
        )
        .bind(&article.title)
        .bind(&article.authors)
        .bind(article.year)
        .bind(&article.journal)
        .bind(&article.doi)
        .bind(&article.abstract_text)
        .bind(&article.keywords)
        .bind(&article.notes)
        .bind(&article.pages)
        .bind(&article.volume)
        .bind(&article.number)
        .bind(&article.issn)
        .bind(article.status.as_str())
        .bind(to_millis(article.updated_at))
        .bind(&article.id)
        .bind(&article.owner)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_article(
        &self,
        owner: &str,
        project_id: &str,
        id: &str,
    ) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ? AND project_id = ? AND owner = ?")
            .bind(id)
            .bind(project_id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let related = self.related_ids(id).await?;
                Ok(Some(article_from_row(&row, related)?))
            }
            None => Ok(None),
        }
    }

    async fn list_articles(&self, owner: &str, project_id: &str) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            "SELECT * FROM articles WHERE project_id = ? AND owner = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(project_id)
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let relation_rows = sqlx::query(
            r#"
            SELECT r.article_id, r.related_id
            FROM article_relations r
            JOIN articles a ON a.id = r.article_id
            WHERE a.project_id = ? AND a.owner = ?
            ORDER BY r.rowid
            "#,
        )
        .bind(project_id)
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let mut related: HashMap<String, Vec<String>> = HashMap::new();
        for r in &relation_rows {
            related
                .entry(r.get("article_id"))
                .or_default()
                .push(r.get("related_id"));
        }

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                article_from_row(row, related.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn delete_article(&self, owner: &str, project_id: &str, id: &str) -> Result<bool> {
        // relations in both directions cascade
        let result = sqlx::query("DELETE FROM articles WHERE id = ? AND project_id = ? AND owner = ?")
            .bind(id)
            .bind(project_id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_related(&self, article_id: &str, related_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO article_relations (article_id, related_id) VALUES (?, ?)",
        )
        .bind(article_id)
        .bind(related_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_related(&self, article_id: &str, related_id: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM article_relations WHERE article_id = ? AND related_id = ?")
                .bind(article_id)
                .bind(related_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::db;
    use crate::migrate;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn open_store(tmp: &TempDir) -> SqliteStore {
        let toml = format!(
            "[db]\npath = \"{}\"\n[server]\nbind = \"127.0.0.1:0\"\n",
            tmp.path().join("test.sqlite").display()
        );
        let config = parse_config(&toml).unwrap();
        let pool = db::connect(&config).await.unwrap();
        migrate::apply(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn project(id: &str, owner: &str) -> Project {
        let mut p = Project::blank(id, owner, Utc::now());
        p.title = "Review".into();
        p.objective = "Map the field".into();
        p.keywords = vec!["games".into(), "learning".into()];
        p.picoc.population = "students".into();
        p
    }

    fn article(id: &str, project_id: &str, owner: &str) -> Article {
        let mut a = Article::blank(id, project_id, owner, Utc::now());
        a.title = format!("Title {}", id);
        a.authors = "Doe, J.".into();
        a.year = 2020;
        a.journal = "Journal".into();
        a
    }

    #[tokio::test]
    async fn test_project_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        let mut p = project("p1", "alice");
        p.status = ProjectStatus::InProgress;
        store.create_project(&p).await.unwrap();

        let loaded = store.get_project("alice", "p1").await.unwrap().unwrap();
        assert_eq!(loaded.keywords, p.keywords);
        assert_eq!(loaded.picoc.population, "students");
        assert_eq!(loaded.status, ProjectStatus::InProgress);
        assert!(store.get_project("bob", "p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_project_scoped_by_owner() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store.create_project(&project("p1", "alice")).await.unwrap();

        let mut hijack = project("p1", "bob");
        hijack.title = "Mine now".into();
        assert!(!store.update_project(&hijack).await.unwrap());

        let mut p = project("p1", "alice");
        p.title = "Renamed".into();
        assert!(store.update_project(&p).await.unwrap());
        let loaded = store.get_project("alice", "p1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Renamed");
    }

    #[tokio::test]
    async fn test_relations_keep_insertion_order() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store.create_project(&project("p1", "u")).await.unwrap();
        for id in ["a1", "a2", "a3", "a4"] {
            store.insert_article(&article(id, "p1", "u")).await.unwrap();
        }

        assert!(store.add_related("a1", "a4").await.unwrap());
        assert!(store.add_related("a1", "a2").await.unwrap());
        assert!(store.add_related("a1", "a3").await.unwrap());
        assert!(!store.add_related("a1", "a2").await.unwrap());

        let a1 = store.get_article("u", "p1", "a1").await.unwrap().unwrap();
        assert_eq!(a1.related_articles, vec!["a4", "a2", "a3"]);

        let listed = store.list_articles("u", "p1").await.unwrap();
        let a1 = listed.iter().find(|a| a.id == "a1").unwrap();
        assert_eq!(a1.related_articles, vec!["a4", "a2", "a3"]);

        assert!(store.remove_related("a1", "a2").await.unwrap());
        assert!(!store.remove_related("a1", "a2").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_related_to_missing_article_fails() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store.create_project(&project("p1", "u")).await.unwrap();
        store.insert_article(&article("a1", "p1", "u")).await.unwrap();
        assert!(store.add_related("a1", "ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_article_removes_relations_both_ways() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store.create_project(&project("p1", "u")).await.unwrap();
        store.insert_article(&article("a1", "p1", "u")).await.unwrap();
        store.insert_article(&article("a2", "p1", "u")).await.unwrap();
        store.add_related("a1", "a2").await.unwrap();
        store.add_related("a2", "a1").await.unwrap();

        assert!(store.delete_article("u", "p1", "a2").await.unwrap());
        let a1 = store.get_article("u", "p1", "a1").await.unwrap().unwrap();
        assert!(a1.related_articles.is_empty());
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store.create_project(&project("p1", "u")).await.unwrap();
        store.insert_article(&article("a1", "p1", "u")).await.unwrap();
        store.insert_article(&article("a2", "p1", "u")).await.unwrap();
        store.add_related("a1", "a2").await.unwrap();

        assert!(!store.delete_project("someone-else", "p1").await.unwrap());
        assert!(store.delete_project("u", "p1").await.unwrap());

        assert!(store.list_articles("u", "p1").await.unwrap().is_empty());
        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM article_relations")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_list_articles_newest_first() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store.create_project(&project("p1", "u")).await.unwrap();
        let mut old = article("old", "p1", "u");
        old.created_at = Utc::now() - Duration::days(1);
        store.insert_article(&old).await.unwrap();
        store.insert_article(&article("new", "p1", "u")).await.unwrap();

        let ids: Vec<String> = store
            .list_articles("u", "p1")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_update_article_fields() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store.create_project(&project("p1", "u")).await.unwrap();
        store.insert_article(&article("a1", "p1", "u")).await.unwrap();

        let mut a = store.get_article("u", "p1", "a1").await.unwrap().unwrap();
        a.status = ArticleStatus::Reviewed;
        a.notes = "checked".into();
        assert!(store.update_article(&a).await.unwrap());

        let loaded = store.get_article("u", "p1", "a1").await.unwrap().unwrap();
        assert_eq!(loaded.status, ArticleStatus::Reviewed);
        assert_eq!(loaded.notes, "checked");
    }
}

//! In-memory [`Store`] implementation for tests.
//!
//! Uses `HashMap`s behind `std::sync::RwLock`. Relations live inside each
//! stored article's `related_articles`, so ordering is insertion order.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{Article, Project};

use super::Store;

/// In-memory store for tests.
pub struct InMemoryStore {
    projects: RwLock<HashMap<String, Project>>,
    articles: RwLock<HashMap<String, Article>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            articles: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first<T>(items: &mut [T], created: impl Fn(&T) -> chrono::DateTime<chrono::Utc>) {
    items.sort_by_key(|item| std::cmp::Reverse(created(item)));
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_project(&self, project: &Project) -> Result<()> {
        let mut projects = self.projects.write().unwrap();
        if projects.contains_key(&project.id) {
            bail!("project {} already exists", project.id);
        }
        projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn update_project(&self, project: &Project) -> Result<bool> {
        let mut projects = self.projects.write().unwrap();
        match projects.get_mut(&project.id) {
            Some(existing) if existing.owner == project.owner => {
                *existing = project.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_project(&self, owner: &str, id: &str) -> Result<Option<Project>> {
        let projects = self.projects.read().unwrap();
        Ok(projects.get(id).filter(|p| p.owner == owner).cloned())
    }

    async fn list_projects(&self, owner: &str) -> Result<Vec<Project>> {
        let projects = self.projects.read().unwrap();
        let mut out: Vec<Project> = projects
            .values()
            .filter(|p| p.owner == owner)
            .cloned()
            .collect();
        newest_first(&mut out, |p| p.created_at);
        Ok(out)
    }

    async fn delete_project(&self, owner: &str, id: &str) -> Result<bool> {
        {
            let mut projects = self.projects.write().unwrap();
            match projects.get(id) {
                Some(p) if p.owner == owner => {
                    projects.remove(id);
                }
                _ => return Ok(false),
            }
        }

        let mut articles = self.articles.write().unwrap();
        let removed: Vec<String> = articles
            .values()
            .filter(|a| a.project_id == id)
            .map(|a| a.id.clone())
            .collect();
        articles.retain(|_, a| a.project_id != id);
        for article in articles.values_mut() {
            article.related_articles.retain(|r| !removed.contains(r));
        }
        Ok(true)
    }

    async fn insert_article(&self, article: &Article) -> Result<()> {
        let mut articles = self.articles.write().unwrap();
        if articles.contains_key(&article.id) {
            bail!("article {} already exists", article.id);
        }
        articles.insert(article.id.clone(), article.clone());
        Ok(())
    }

    async fn update_article(&self, article: &Article) -> Result<bool> {
        let mut articles = self.articles.write().unwrap();
        match articles.get_mut(&article.id) {
            Some(existing) if existing.owner == article.owner => {
                let related = std::mem::take(&mut existing.related_articles);
                *existing = article.clone();
                existing.related_articles = related;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_article(
        &self,
        owner: &str,
        project_id: &str,
        id: &str,
    ) -> Result<Option<Article>> {
        let articles = self.articles.read().unwrap();
        Ok(articles
            .get(id)
            .filter(|a| a.owner == owner && a.project_id == project_id)
            .cloned())
    }

    async fn list_articles(&self, owner: &str, project_id: &str) -> Result<Vec<Article>> {
        let articles = self.articles.read().unwrap();
        let mut out: Vec<Article> = articles
            .values()
            .filter(|a| a.owner == owner && a.project_id == project_id)
            .cloned()
            .collect();
        newest_first(&mut out, |a| a.created_at);
        Ok(out)
    }

    async fn delete_article(&self, owner: &str, project_id: &str, id: &str) -> Result<bool> {
        let mut articles = self.articles.write().unwrap();
        match articles.get(id) {
            Some(a) if a.owner == owner && a.project_id == project_id => {
                articles.remove(id);
            }
            _ => return Ok(false),
        }
        for article in articles.values_mut() {
            article.related_articles.retain(|r| r != id);
        }
        Ok(true)
    }

    async fn add_related(&self, article_id: &str, related_id: &str) -> Result<bool> {
        let mut articles = self.articles.write().unwrap();
        if !articles.contains_key(related_id) {
            bail!("related article {} does not exist", related_id);
        }
        let Some(article) = articles.get_mut(article_id) else {
            bail!("article {} does not exist", article_id);
        };
        if article.relates_to(related_id) {
            return Ok(false);
        }
        article.related_articles.push(related_id.to_string());
        Ok(true)
    }

    async fn remove_related(&self, article_id: &str, related_id: &str) -> Result<bool> {
        let mut articles = self.articles.write().unwrap();
        let Some(article) = articles.get_mut(article_id) else {
            return Ok(false);
        };
        let before = article.related_articles.len();
        article.related_articles.retain(|r| r != related_id);
        Ok(article.related_articles.len() != before)
    }
}

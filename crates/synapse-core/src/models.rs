//! Review data model: projects, articles, and their request payloads.
//!
//! Entities serialize with camelCase keys and expose their id as `_id`,
//! which is the shape HTTP clients consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Screening status of an article within a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Pending,
    Reviewed,
    Excluded,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Pending => "pending",
            ArticleStatus::Reviewed => "reviewed",
            ArticleStatus::Excluded => "excluded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ArticleStatus::Pending),
            "reviewed" => Some(ArticleStatus::Reviewed),
            "excluded" => Some(ArticleStatus::Excluded),
            _ => None,
        }
    }
}

/// Lifecycle status of a review project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Idea,
    InProgress,
    Completed,
    Paused,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Idea => "idea",
            ProjectStatus::InProgress => "in-progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idea" => Some(ProjectStatus::Idea),
            "in-progress" => Some(ProjectStatus::InProgress),
            "completed" => Some(ProjectStatus::Completed),
            "paused" => Some(ProjectStatus::Paused),
            _ => None,
        }
    }
}

/// A bibliographic record attached to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(rename = "_id")]
    pub id: String,
    pub project_id: String,
    pub owner: String,
    pub title: String,
    pub authors: String,
    pub year: i32,
    pub journal: String,
    pub doi: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: String,
    pub notes: String,
    pub pages: String,
    pub volume: String,
    pub number: String,
    pub issn: String,
    pub status: ArticleStatus,
    /// Ids of related articles, in insertion order.
    pub related_articles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// An article with only identity fields set; everything else is empty.
    pub fn blank(id: &str, project_id: &str, owner: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            project_id: project_id.to_string(),
            owner: owner.to_string(),
            title: String::new(),
            authors: String::new(),
            year: 0,
            journal: String::new(),
            doi: String::new(),
            abstract_text: String::new(),
            keywords: String::new(),
            notes: String::new(),
            pages: String::new(),
            volume: String::new(),
            number: String::new(),
            issn: String::new(),
            status: ArticleStatus::Pending,
            related_articles: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True when `other_id` is in this article's related set.
    pub fn relates_to(&self, other_id: &str) -> bool {
        self.related_articles.iter().any(|id| id == other_id)
    }

    /// Checks every field constraint, collecting all violations.
    pub fn validate(&self, current_year: i32) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        required(&mut errors, "title", &self.title, 200);
        required(&mut errors, "authors", &self.authors, 300);
        required(&mut errors, "journal", &self.journal, 200);
        max_len(&mut errors, "doi", &self.doi, 50);
        max_len(&mut errors, "abstract", &self.abstract_text, 3000);
        max_len(&mut errors, "keywords", &self.keywords, 500);
        max_len(&mut errors, "pages", &self.pages, 20);
        max_len(&mut errors, "volume", &self.volume, 20);
        max_len(&mut errors, "number", &self.number, 20);
        max_len(&mut errors, "issn", &self.issn, 20);

        if self.year == 0 {
            errors.push("year is required".to_string());
        } else if self.year < 1900 {
            errors.push("year must be 1900 or later".to_string());
        } else if self.year > current_year + 1 {
            errors.push("year cannot be in the future".to_string());
        }

        ValidationError::check(errors)
    }
}

/// PICOC research framing: Population, Intervention, Comparison, Outcome, Context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Picoc {
    pub population: String,
    pub intervention: String,
    pub comparison: String,
    pub outcome: String,
    pub context: String,
}

/// A systematic review owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
    pub title: String,
    pub objective: String,
    pub status: ProjectStatus,
    pub picoc: Picoc,
    pub research_questions: Vec<String>,
    pub keywords: Vec<String>,
    pub search_strings: Vec<String>,
    pub inclusion_criteria: Vec<String>,
    pub exclusion_criteria: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn blank(id: &str, owner: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            owner: owner.to_string(),
            title: String::new(),
            objective: String::new(),
            status: ProjectStatus::Idea,
            picoc: Picoc::default(),
            research_questions: Vec::new(),
            keywords: Vec::new(),
            search_strings: Vec::new(),
            inclusion_criteria: Vec::new(),
            exclusion_criteria: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        required(&mut errors, "title", &self.title, 100);
        required(&mut errors, "objective", &self.objective, 1000);

        max_len(&mut errors, "picoc.population", &self.picoc.population, 500);
        max_len(&mut errors, "picoc.intervention", &self.picoc.intervention, 500);
        max_len(&mut errors, "picoc.comparison", &self.picoc.comparison, 500);
        max_len(&mut errors, "picoc.outcome", &self.picoc.outcome, 500);
        max_len(&mut errors, "picoc.context", &self.picoc.context, 500);

        each_max_len(&mut errors, "research question", &self.research_questions, 1000);
        each_max_len(&mut errors, "keyword", &self.keywords, 100);
        each_max_len(&mut errors, "search string", &self.search_strings, 2000);
        each_max_len(&mut errors, "inclusion criterion", &self.inclusion_criteria, 1000);
        each_max_len(&mut errors, "exclusion criterion", &self.exclusion_criteria, 1000);

        ValidationError::check(errors)
    }
}

fn required(errors: &mut Vec<String>, field: &str, value: &str, max: usize) {
    if value.is_empty() {
        errors.push(format!("{} is required", field));
    } else {
        max_len(errors, field, value, max);
    }
}

fn max_len(errors: &mut Vec<String>, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.push(format!("{} cannot exceed {} characters", field, max));
    }
}

fn each_max_len(errors: &mut Vec<String>, label: &str, values: &[String], max: usize) {
    if values.iter().any(|v| v.chars().count() > max) {
        errors.push(format!("{} cannot exceed {} characters", label, max));
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|v| v.trim().to_string())
}

fn trimmed_list(values: &Option<Vec<String>>) -> Option<Vec<String>> {
    values
        .as_ref()
        .map(|vs| vs.iter().map(|v| v.trim().to_string()).collect())
}

// ============ Request payloads ============

/// Article fields accepted on create (`POST`) and partial update (`PUT`).
///
/// Absent fields leave the target untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleInput {
    pub title: Option<String>,
    pub authors: Option<String>,
    pub year: Option<i32>,
    pub journal: Option<String>,
    pub doi: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
    pub notes: Option<String>,
    pub pages: Option<String>,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub issn: Option<String>,
    pub status: Option<ArticleStatus>,
}

impl ArticleInput {
    pub fn apply_to(&self, article: &mut Article) {
        let fields: [(&Option<String>, &mut String); 11] = [
            (&self.title, &mut article.title),
            (&self.authors, &mut article.authors),
            (&self.journal, &mut article.journal),
            (&self.doi, &mut article.doi),
            (&self.abstract_text, &mut article.abstract_text),
            (&self.keywords, &mut article.keywords),
            (&self.notes, &mut article.notes),
            (&self.pages, &mut article.pages),
            (&self.volume, &mut article.volume),
            (&self.number, &mut article.number),
            (&self.issn, &mut article.issn),
        ];
        for (input, target) in fields {
            if let Some(v) = trimmed(input) {
                *target = v;
            }
        }
        if let Some(year) = self.year {
            article.year = year;
        }
        if let Some(status) = self.status {
            article.status = status;
        }
    }
}

/// Partial PICOC update; absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PicocInput {
    pub population: Option<String>,
    pub intervention: Option<String>,
    pub comparison: Option<String>,
    pub outcome: Option<String>,
    pub context: Option<String>,
}

/// Project fields accepted on create and partial update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub title: Option<String>,
    pub objective: Option<String>,
    pub status: Option<ProjectStatus>,
    pub picoc: Option<PicocInput>,
    pub research_questions: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub search_strings: Option<Vec<String>>,
    pub inclusion_criteria: Option<Vec<String>>,
    pub exclusion_criteria: Option<Vec<String>>,
}

impl ProjectInput {
    pub fn apply_to(&self, project: &mut Project) {
        if let Some(v) = trimmed(&self.title) {
            project.title = v;
        }
        if let Some(v) = trimmed(&self.objective) {
            project.objective = v;
        }
        if let Some(status) = self.status {
            project.status = status;
        }
        if let Some(picoc) = &self.picoc {
            let fields: [(&Option<String>, &mut String); 5] = [
                (&picoc.population, &mut project.picoc.population),
                (&picoc.intervention, &mut project.picoc.intervention),
                (&picoc.comparison, &mut project.picoc.comparison),
                (&picoc.outcome, &mut project.picoc.outcome),
                (&picoc.context, &mut project.picoc.context),
            ];
            for (input, target) in fields {
                if let Some(v) = trimmed(input) {
                    *target = v;
                }
            }
        }
        let lists: [(&Option<Vec<String>>, &mut Vec<String>); 5] = [
            (&self.research_questions, &mut project.research_questions),
            (&self.keywords, &mut project.keywords),
            (&self.search_strings, &mut project.search_strings),
            (&self.inclusion_criteria, &mut project.inclusion_criteria),
            (&self.exclusion_criteria, &mut project.exclusion_criteria),
        ];
        for (input, target) in lists {
            if let Some(v) = trimmed_list(input) {
                *target = v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_article() -> Article {
        let mut a = Article::blank("a1", "p1", "u1", Utc::now());
        a.title = "Deep learning in classrooms".into();
        a.authors = "Silva, J.".into();
        a.year = 2021;
        a.journal = "Computers & Education".into();
        a
    }

    #[test]
    fn test_valid_article_passes() {
        assert!(valid_article().validate(2025).is_ok());
    }

    #[test]
    fn test_blank_article_reports_all_required_fields() {
        let a = Article::blank("a1", "p1", "u1", Utc::now());
        let msg = a.validate(2025).unwrap_err().to_string();
        assert!(msg.contains("title is required"));
        assert!(msg.contains("authors is required"));
        assert!(msg.contains("journal is required"));
        assert!(msg.contains("year is required"));
    }

    #[test]
    fn test_year_bounds() {
        let mut a = valid_article();
        a.year = 1899;
        assert!(a.validate(2025).is_err());
        a.year = 2026;
        assert!(a.validate(2025).is_ok());
        a.year = 2027;
        assert!(a.validate(2025).is_err());
    }

    #[test]
    fn test_field_length_limits() {
        let mut a = valid_article();
        a.doi = "x".repeat(51);
        let msg = a.validate(2025).unwrap_err().to_string();
        assert_eq!(msg, "doi cannot exceed 50 characters");
    }

    #[test]
    fn test_article_input_trims_and_keeps_absent_fields() {
        let mut a = valid_article();
        let input = ArticleInput {
            title: Some("  New title  ".into()),
            notes: Some("read again".into()),
            ..Default::default()
        };
        input.apply_to(&mut a);
        assert_eq!(a.title, "New title");
        assert_eq!(a.notes, "read again");
        assert_eq!(a.authors, "Silva, J.");
    }

    #[test]
    fn test_article_serializes_with_id_and_abstract_keys() {
        let mut a = valid_article();
        a.abstract_text = "text".into();
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["_id"], "a1");
        assert_eq!(json["abstract"], "text");
        assert_eq!(json["projectId"], "p1");
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn test_project_status_parse_and_serde() {
        assert_eq!(ProjectStatus::parse("In-Progress"), Some(ProjectStatus::InProgress));
        assert_eq!(ProjectStatus::parse("done"), None);
        let json = serde_json::to_value(ProjectStatus::InProgress).unwrap();
        assert_eq!(json, "in-progress");
    }

    #[test]
    fn test_project_input_partial_picoc_update() {
        let mut p = Project::blank("p1", "u1", Utc::now());
        p.picoc.population = "teachers".into();
        let input: ProjectInput =
            serde_json::from_value(serde_json::json!({"picoc": {"outcome": "engagement"}}))
                .unwrap();
        input.apply_to(&mut p);
        assert_eq!(p.picoc.population, "teachers");
        assert_eq!(p.picoc.outcome, "engagement");
    }

    #[test]
    fn test_project_validation() {
        let mut p = Project::blank("p1", "u1", Utc::now());
        assert!(p.validate().is_err());
        p.title = "Review".into();
        p.objective = "Map the field".into();
        assert!(p.validate().is_ok());
        p.keywords = vec!["k".repeat(101)];
        assert_eq!(
            p.validate().unwrap_err().to_string(),
            "keyword cannot exceed 100 characters"
        );
    }
}

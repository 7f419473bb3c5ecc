//! Project-level relationship report.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::models::Article;

/// Below this many articles no insights are produced.
pub const MIN_ARTICLES_FOR_INSIGHTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    MostConnected,
    IsolatedArticles,
    YearDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionCount {
    pub title: String,
    pub connections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsolatedArticle {
    pub title: String,
    pub authors: String,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearCount {
    pub year: i32,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InsightData {
    Connections(Vec<ConnectionCount>),
    Isolated(Vec<IsolatedArticle>),
    Years(Vec<YearCount>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: &'static str,
    pub description: &'static str,
    pub data: InsightData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsMetadata {
    pub total_articles: usize,
    /// Half the sum of related-set sizes; fractional when links are one-sided.
    pub total_relations: f64,
    pub generated_at: String,
}

/// Build the insight list for a project's articles.
pub fn generate_insights(articles: &[Article]) -> Vec<Insight> {
    let mut insights = Vec::new();

    let mut connected: Vec<ConnectionCount> = articles
        .iter()
        .map(|a| ConnectionCount {
            title: a.title.clone(),
            connections: a.related_articles.len(),
        })
        .collect();
    connected.sort_by(|a, b| b.connections.cmp(&a.connections));
    connected.truncate(3);
    if !connected.is_empty() {
        insights.push(Insight {
            kind: InsightKind::MostConnected,
            title: "Most connected articles",
            description: "Articles with the largest number of relationships",
            data: InsightData::Connections(connected),
            recommendation: None,
        });
    }

    let isolated: Vec<IsolatedArticle> = articles
        .iter()
        .filter(|a| a.related_articles.is_empty())
        .map(|a| IsolatedArticle {
            title: a.title.clone(),
            authors: a.authors.clone(),
            year: a.year,
        })
        .collect();
    if !isolated.is_empty() {
        insights.push(Insight {
            kind: InsightKind::IsolatedArticles,
            title: "Isolated articles",
            description: "Articles without any relationships yet",
            data: InsightData::Isolated(isolated),
            recommendation: Some("Review these articles to find possible connections"),
        });
    }

    let mut years: BTreeMap<i32, usize> = BTreeMap::new();
    for a in articles {
        *years.entry(a.year).or_default() += 1;
    }
    insights.push(Insight {
        kind: InsightKind::YearDistribution,
        title: "Distribution by year",
        description: "Number of articles per publication year",
        data: InsightData::Years(
            years
                .into_iter()
                .rev()
                .map(|(year, count)| YearCount { year, count })
                .collect(),
        ),
        recommendation: None,
    });

    insights
}

pub fn insights_metadata(articles: &[Article], now: DateTime<Utc>) -> InsightsMetadata {
    let links: usize = articles.iter().map(|a| a.related_articles.len()).sum();
    InsightsMetadata {
        total_articles: articles.len(),
        total_relations: links as f64 / 2.0,
        generated_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str, year: i32, related: &[&str]) -> Article {
        let mut a = Article::blank(id, "p1", "u1", Utc::now());
        a.title = format!("Article {}", id);
        a.authors = "Doe, J.".into();
        a.year = year;
        a.related_articles = related.iter().map(|s| s.to_string()).collect();
        a
    }

    #[test]
    fn test_most_connected_top_three_stable() {
        let articles = vec![
            article("a", 2020, &["b"]),
            article("b", 2020, &["a", "c"]),
            article("c", 2021, &["b"]),
            article("d", 2019, &[]),
        ];
        let insights = generate_insights(&articles);
        assert_eq!(insights[0].kind, InsightKind::MostConnected);
        let InsightData::Connections(data) = &insights[0].data else {
            panic!("expected connections");
        };
        let titles: Vec<&str> = data.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Article b", "Article a", "Article c"]);
    }

    #[test]
    fn test_isolated_omitted_when_all_connected() {
        let articles = vec![article("a", 2020, &["b"]), article("b", 2020, &["a"])];
        let kinds: Vec<InsightKind> = generate_insights(&articles).iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![InsightKind::MostConnected, InsightKind::YearDistribution]
        );
    }

    #[test]
    fn test_year_distribution_descending() {
        let articles = vec![
            article("a", 2018, &[]),
            article("b", 2022, &[]),
            article("c", 2018, &[]),
        ];
        let insights = generate_insights(&articles);
        let years = insights
            .iter()
            .find(|i| i.kind == InsightKind::YearDistribution)
            .unwrap();
        assert_eq!(
            years.data,
            InsightData::Years(vec![
                YearCount { year: 2022, count: 1 },
                YearCount { year: 2018, count: 2 },
            ])
        );
    }

    #[test]
    fn test_insight_json_shape() {
        let articles = vec![article("a", 2020, &[]), article("b", 2021, &[])];
        let json = serde_json::to_value(generate_insights(&articles)).unwrap();
        assert_eq!(json[1]["type"], "isolated_articles");
        assert_eq!(json[1]["data"][0]["authors"], "Doe, J.");
        assert!(json[1]["recommendation"].is_string());
        assert!(json[0].get("recommendation").is_none());
    }

    #[test]
    fn test_metadata_counts_half_links() {
        let articles = vec![
            article("a", 2020, &["b"]),
            article("b", 2020, &["a"]),
            article("c", 2020, &["a"]),
        ];
        let meta = insights_metadata(&articles, Utc::now());
        assert_eq!(meta.total_articles, 3);
        assert_eq!(meta.total_relations, 1.5);
    }
}

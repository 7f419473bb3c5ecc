//! Token-overlap similarity used when embeddings are unavailable.
//!
//! # Scoring Law
//!
//! For each of title, keywords, abstract and authors:
//!
//! 1. The field is *compared* only if it is non-empty on both articles.
//! 2. Both sides are lower-cased and split on whitespace into token sets;
//!    the field score is their Jaccard index `|A ∩ B| / |A ∪ B|`.
//! 3. The field *passes* if its score exceeds the field's noise threshold,
//!    and then contributes `score × weight`.
//!
//! The sum is divided by the number of compared fields, `0.1` is added for
//! every passing field beyond the first, and the result is clamped to
//! `[0, 1]`.
//!
//! | Field | Threshold | Weight |
//! |-------|-----------|--------|
//! | title | 0.10 | 0.4 |
//! | keywords | 0.05 | 0.3 |
//! | abstract | 0.02 | 0.2 |
//! | authors | 0.10 | 0.1 |

use std::collections::HashSet;

use tracing::trace;

use crate::models::Article;

/// Bonus added per passing field beyond the first.
pub const MULTI_FIELD_BONUS: f64 = 0.1;

/// Threshold and weight for one compared field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub threshold: f64,
    pub weight: f64,
    extract: fn(&Article) -> &str,
}

pub const FIELD_RULES: [FieldRule; 4] = [
    FieldRule {
        name: "title",
        threshold: 0.1,
        weight: 0.4,
        extract: |a| &a.title,
    },
    FieldRule {
        name: "keywords",
        threshold: 0.05,
        weight: 0.3,
        extract: |a| &a.keywords,
    },
    FieldRule {
        name: "abstract",
        threshold: 0.02,
        weight: 0.2,
        extract: |a| &a.abstract_text,
    },
    FieldRule {
        name: "authors",
        threshold: 0.1,
        weight: 0.1,
        extract: |a| &a.authors,
    },
];

/// Jaccard index of the whitespace token sets of two texts.
///
/// Case-insensitive. Returns `0.0` when both texts are empty.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64
}

/// Score a candidate against a target with the token-overlap law.
///
/// Returns `None` when no field is non-empty on both sides; such a
/// candidate cannot be compared at all.
pub fn fallback_score(target: &Article, candidate: &Article) -> Option<f64> {
    let mut total = 0.0;
    let mut compared = 0usize;
    let mut passed = 0usize;

    for rule in FIELD_RULES.iter() {
        let t = (rule.extract)(target).trim();
        let c = (rule.extract)(candidate).trim();
        if t.is_empty() || c.is_empty() {
            continue;
        }
        compared += 1;

        let score = jaccard(t, c);
        trace!(field = rule.name, score, "field compared");
        if score > rule.threshold {
            total += score * rule.weight;
            passed += 1;
        }
    }

    if compared == 0 {
        return None;
    }

    let mut score = total / compared as f64;
    if passed > 1 {
        score += (passed - 1) as f64 * MULTI_FIELD_BONUS;
    }
    Some(score.clamp(0.0, 1.0))
}

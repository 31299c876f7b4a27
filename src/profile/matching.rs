use super::{Category, Profile};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Display;

/// Score of two item lists that are both empty after normalization.
pub const EMPTY_PAIR_SIMILARITY: f64 = 1.0;

/// Overall score of two profiles without a single category between them.
pub const NO_CATEGORIES_OVERALL: f64 = 0.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryMatch {
    pub category: String,
    pub sim: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfileMatch {
    pub overall: f64,
    pub details: Vec<CategoryMatch>,
}

impl Display for ProfileMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Overall Match: {}", percent(self.overall))?;
        for detail in self.details.iter() {
            write!(f, "\n{} → {} match", detail.category, percent(detail.sim))?;
        }
        Ok(())
    }
}

fn percent(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

/// Trims and lower-cases an item, `None` if nothing is left.
pub fn normalize(item: &str) -> Option<String> {
    let trimmed = item.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn normalized_set<S: AsRef<str>>(items: &[S]) -> HashSet<String> {
    items.iter().filter_map(|i| normalize(i.as_ref())).collect()
}

/// Jaccard index of the normalized item sets, `EMPTY_PAIR_SIMILARITY` when both are empty.
pub fn set_similarity<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> f64 {
    let set_a = normalized_set(a);
    let set_b = normalized_set(b);
    if set_a.is_empty() && set_b.is_empty() {
        return EMPTY_PAIR_SIMILARITY;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.len() + set_b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

// later categories win when two names fold to the same key
fn category_map(categories: &[Category]) -> BTreeMap<String, &[String]> {
    categories
        .iter()
        .map(|c| (c.name.to_lowercase(), c.items.as_slice()))
        .collect()
}

pub fn profile_similarity(a: &Profile, b: &Profile) -> ProfileMatch {
    let categories_a = category_map(&a.categories);
    let categories_b = category_map(&b.categories);

    let keys: BTreeSet<&String> = categories_a.keys().chain(categories_b.keys()).collect();
    let details = keys
        .into_iter()
        .map(|key| {
            let items_a = categories_a.get(key).copied().unwrap_or_default();
            let items_b = categories_b.get(key).copied().unwrap_or_default();
            let sim = set_similarity(items_a, items_b);
            debug!("category: {}, sim: {}", key, sim);
            CategoryMatch {
                category: title_case(key),
                sim,
            }
        })
        .collect::<Vec<_>>();

    let overall = if details.is_empty() {
        NO_CATEGORIES_OVERALL
    } else {
        details.iter().map(|d| d.sim).sum::<f64>() / details.len() as f64
    };

    ProfileMatch { overall, details }
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the rest.
pub fn title_case(s: &str) -> String {
    let mut titled = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                titled.extend(c.to_lowercase());
            } else {
                titled.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            titled.push(c);
            in_word = false;
        }
    }
    titled
}

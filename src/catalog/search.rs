//! Fuzzy title search over pack list entries.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use super::ReleaseOffer;

/// Default similarity cutoff (0.0-1.0); titles scoring below it are dropped.
pub const DEFAULT_CUTOFF: f64 = 0.6;

/// Maximum number of distinct titles a search keeps.
pub const MAX_TITLES: usize = 8;

/// Normalizes text for search: collapse whitespace and lowercase.
#[must_use]
pub fn normalize_title(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Similarity between a normalized query and a raw title.
#[must_use]
pub fn title_similarity(query_norm: &str, title: &str) -> f64 {
    let normalized = normalize_title(title);
    if normalized == query_norm {
        return 1.0;
    }
    strsim::normalized_levenshtein(query_norm, &normalized)
}

/// Up to [`MAX_TITLES`] distinct titles scoring at least `cutoff`, best
/// first. Ties keep alphabetical order.
#[must_use]
pub fn closest_titles<'a, I>(query: &str, titles: I, cutoff: f64) -> Vec<(&'a str, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let query_norm = normalize_title(query);
    if query_norm.is_empty() {
        return Vec::new();
    }

    let distinct: BTreeMap<&str, f64> = titles
        .into_iter()
        .map(|title| (title, title_similarity(&query_norm, title)))
        .collect();
    let mut scored: Vec<(&str, f64)> = distinct
        .into_iter()
        .filter(|(_, score)| *score >= cutoff)
        .collect();
    scored.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
    scored.truncate(MAX_TITLES);
    scored
}

/// Keeps the offers whose title is among the closest matches for `query`.
#[must_use]
pub fn filter_by_title(offers: Vec<ReleaseOffer>, query: &str, cutoff: f64) -> Vec<ReleaseOffer> {
    let titles = offers.iter().map(|o| o.title.as_str());
    let keep: HashSet<String> = closest_titles(query, titles, cutoff)
        .into_iter()
        .map(|(title, _)| title.to_string())
        .collect();
    offers
        .into_iter()
        .filter(|offer| keep.contains(&offer.title))
        .collect()
}

//! Canonical search result envelope

use crate::search::document::Document;
use serde::Serialize;
use std::collections::BTreeMap;

/// Document type reported for every hit
pub const DOCUMENT_TYPE: &str = "_doc";

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Logical id of the document
    #[serde(rename = "_id")]
    pub id: String,

    /// Index the hit came from
    #[serde(rename = "_index")]
    pub index: String,

    #[serde(rename = "_type")]
    pub doc_type: String,

    /// Decoded document body
    pub data: Document,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SearchHit {
    pub fn new(id: impl Into<String>, index: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            index: index.into(),
            doc_type: DOCUMENT_TYPE.to_string(),
            data,
            score: None,
        }
    }

    pub fn with_score(mut self, score: Option<f64>) -> Self {
        self.score = score;
        self
    }
}

/// Term counts for one facet
///
/// `total` always equals the sum of `terms` plus `other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FacetResult {
    /// Count per reported term
    pub terms: BTreeMap<String, u64>,

    /// Number of values counted across all terms
    pub total: u64,

    /// Values belonging to terms cut off by the facet size
    pub other: u64,
}

impl FacetResult {
    /// Build from a complete value distribution, keeping the `size` most frequent
    /// values (ties broken by value)
    pub fn from_distribution<'a>(
        distribution: impl IntoIterator<Item = (&'a String, &'a u64)>,
        size: Option<usize>,
    ) -> Self {
        let mut counts: Vec<(&String, u64)> = distribution
            .into_iter()
            .map(|(term, count)| (term, *count))
            .collect();
        let total: u64 = counts.iter().map(|(_, count)| count).sum();

        counts.sort_by(|(a_term, a_count), (b_term, b_count)| {
            b_count.cmp(a_count).then_with(|| a_term.cmp(b_term))
        });
        if let Some(size) = size {
            counts.truncate(size);
        }

        let terms: BTreeMap<String, u64> = counts
            .into_iter()
            .map(|(term, count)| (term.clone(), count))
            .collect();
        let kept: u64 = terms.values().sum();

        Self {
            terms,
            total,
            other: total.saturating_sub(kept),
        }
    }

    /// Build from already truncated buckets and the number of values the backend
    /// counted for the field
    pub fn from_buckets(buckets: impl IntoIterator<Item = (String, u64)>, total_values: u64) -> Self {
        let terms: BTreeMap<String, u64> = buckets.into_iter().collect();
        let kept: u64 = terms.values().sum();
        let other = total_values.saturating_sub(kept);

        Self {
            terms,
            total: kept + other,
            other,
        }
    }
}

/// Backend-agnostic search result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    /// Number of matching documents, independent of pagination
    pub total: u64,

    /// Best score on the page, absent when there are no hits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,

    /// Backend-reported time in milliseconds
    pub took: u64,

    /// Hits in backend rank order
    pub results: Vec<SearchHit>,

    /// Facet counts keyed by field
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aggs: BTreeMap<String, FacetResult>,
}

impl SearchResult {
    /// Logical ids of the hits, in rank order
    pub fn ids(&self) -> Vec<&str> {
        self.results.iter().map(|hit| hit.id.as_str()).collect()
    }
}

//! Meilisearch responses to canonical result

use crate::search::document::{decode, PRIMARY_KEY_FIELD_NAME};
use crate::search::error::{SearchEngineError, SearchEngineResult, TransportError};
use crate::search::query::SearchRequest;
use crate::search::response::{FacetResult, SearchHit, SearchResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keys Meilisearch adds to hits that are not part of the document
const INTERNAL_FIELDS: [&str; 5] = [
    PRIMARY_KEY_FIELD_NAME,
    "_rankingScore",
    "_formatted",
    "_matchesPosition",
    "_rankingScoreDetails",
];

/// Value counts for one facet
pub type Distribution = BTreeMap<String, u64>;

/// Merge the primary response with supplementary facet distributions
///
/// `supplementary` maps a facet field to the distribution counted without that
/// field's own filters; it replaces the primary distribution for that field.
pub fn normalize(
    primary: &Value,
    supplementary: &BTreeMap<String, Distribution>,
    index_name: &str,
    request: &SearchRequest,
) -> SearchEngineResult<SearchResult> {
    let hits = primary
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("response has no `hits` array"))?;

    let results: Vec<SearchHit> = hits
        .iter()
        .filter_map(Value::as_object)
        .map(|hit| normalize_hit(hit, index_name))
        .collect();

    let max_score = results
        .iter()
        .filter_map(|hit| hit.score)
        .fold(None, |best: Option<f64>, score| {
            Some(best.map_or(score, |best| best.max(score)))
        });

    let total = primary
        .get("estimatedTotalHits")
        .or_else(|| primary.get("totalHits"))
        .and_then(Value::as_u64)
        .unwrap_or_default();

    let aggs = request
        .aggregations
        .iter()
        .map(|aggregation| {
            let field = aggregation.field.as_str();
            let distribution = match supplementary.get(field) {
                Some(expanded) => expanded.clone(),
                None => facet_distribution(primary, field),
            };
            (
                field.to_string(),
                FacetResult::from_distribution(&distribution, aggregation.size),
            )
        })
        .collect();

    Ok(SearchResult {
        total,
        max_score,
        took: primary
            .get("processingTimeMs")
            .and_then(Value::as_u64)
            .unwrap_or_default(),
        results,
        aggs,
    })
}

/// Distribution of one facet in a search response, empty when absent
pub fn facet_distribution(response: &Value, field: &str) -> Distribution {
    response
        .get("facetDistribution")
        .and_then(|facets| facets.get(field))
        .and_then(Value::as_object)
        .map(|counts| {
            counts
                .iter()
                .filter_map(|(term, count)| Some((term.clone(), count.as_u64()?)))
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_hit(hit: &Map<String, Value>, index_name: &str) -> SearchHit {
    let score = hit.get("_rankingScore").and_then(Value::as_f64);
    let mut fields = hit.clone();
    for key in INTERNAL_FIELDS {
        fields.remove(key);
    }
    let data = decode(&fields);
    let id = data.id().unwrap_or_default();
    SearchHit::new(id, index_name, data).with_score(score)
}

fn invalid(message: &str) -> SearchEngineError {
    SearchEngineError::search(
        "Meilisearch returned an unexpected response",
        TransportError::InvalidResponse(message.to_string()),
    )
}

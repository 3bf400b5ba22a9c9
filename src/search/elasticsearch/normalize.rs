//! Elasticsearch response to canonical result

use super::translate::{
    total_docs_name, GLOBAL_AGGREGATION, TOTAL_DOCS_AGGREGATION, VALUES_AGGREGATION,
};
use crate::search::document::decode;
use crate::search::error::{SearchEngineError, SearchEngineResult, TransportError};
use crate::search::query::SearchRequest;
use crate::search::response::{FacetResult, SearchHit, SearchResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Convert a `_search` response into a [`SearchResult`]
pub fn normalize(
    response: &Value,
    index_name: &str,
    request: &SearchRequest,
) -> SearchEngineResult<SearchResult> {
    let hits = response
        .get("hits")
        .and_then(Value::as_object)
        .ok_or_else(|| invalid("response has no `hits` section"))?;

    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or_default(),
        Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64).unwrap_or_default(),
        _ => 0,
    };

    let results: Vec<SearchHit> = hits
        .get("hits")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(|hit| normalize_hit(hit, index_name)).collect())
        .unwrap_or_default();

    let max_score = if results.is_empty() {
        None
    } else {
        hits.get("max_score").and_then(Value::as_f64)
    };

    let empty = Map::new();
    let aggregations = response
        .get("aggregations")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let aggs = request
        .aggregations
        .iter()
        .map(|aggregation| {
            let field = aggregation.field.as_str();
            let facet = if request.is_multivalue {
                multi_value_facet(aggregations, field)
            } else {
                single_value_facet(aggregations, field)
            };
            (field.to_string(), facet)
        })
        .collect();

    Ok(SearchResult {
        total,
        max_score,
        took: response.get("took").and_then(Value::as_u64).unwrap_or_default(),
        results,
        aggs,
    })
}

fn normalize_hit(hit: &Value, index_name: &str) -> SearchHit {
    let data = hit
        .get("_source")
        .and_then(Value::as_object)
        .map(decode)
        .unwrap_or_default();

    let id = data
        .id()
        .or_else(|| hit.get("_id").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default();
    let index = hit
        .get("_index")
        .and_then(Value::as_str)
        .unwrap_or(index_name);

    SearchHit::new(id, index, data).with_score(hit.get("_score").and_then(Value::as_f64))
}

fn single_value_facet(aggregations: &Map<String, Value>, field: &str) -> FacetResult {
    let Some(terms) = aggregations.get(field) else {
        return FacetResult::default();
    };
    let counted = aggregations
        .get(&total_docs_name(field))
        .and_then(|total| total.get("value"))
        .and_then(Value::as_f64);
    facet_from_terms(terms, counted)
}

fn multi_value_facet(aggregations: &Map<String, Value>, field: &str) -> FacetResult {
    let Some(facet) = aggregations
        .get(GLOBAL_AGGREGATION)
        .and_then(|global| global.get(field))
    else {
        return FacetResult::default();
    };
    let Some(terms) = facet.get(VALUES_AGGREGATION) else {
        return FacetResult::default();
    };
    let counted = facet
        .get(TOTAL_DOCS_AGGREGATION)
        .and_then(|total| total.get("value"))
        .and_then(Value::as_f64);
    facet_from_terms(terms, counted)
}

/// Facet from a `terms` aggregation; without a value count the total is the
/// returned buckets plus `sum_other_doc_count`
fn facet_from_terms(terms: &Value, counted: Option<f64>) -> FacetResult {
    let buckets: BTreeMap<String, u64> = terms
        .get("buckets")
        .and_then(Value::as_array)
        .map(|buckets| buckets.iter().filter_map(bucket_entry).collect())
        .unwrap_or_default();

    let total_values = match counted {
        Some(value) => value.max(0.0) as u64,
        None => {
            let remainder = terms
                .get("sum_other_doc_count")
                .and_then(Value::as_u64)
                .unwrap_or_default();
            buckets.values().sum::<u64>() + remainder
        }
    };

    FacetResult::from_buckets(buckets, total_values)
}

fn bucket_entry(bucket: &Value) -> Option<(String, u64)> {
    let key = match bucket.get("key_as_string").and_then(Value::as_str) {
        Some(key) => key.to_string(),
        None => match bucket.get("key")? {
            Value::String(key) => key.clone(),
            other => other.to_string(),
        },
    };
    let count = bucket.get("doc_count").and_then(Value::as_u64)?;
    Some((key, count))
}

fn invalid(message: &str) -> SearchEngineError {
    SearchEngineError::search(
        "Elasticsearch returned an unexpected response",
        TransportError::InvalidResponse(message.to_string()),
    )
}

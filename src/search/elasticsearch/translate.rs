//! Canonical request to Elasticsearch query DSL

use crate::search::document::{primary_key, ID_FIELD_NAME};
use crate::search::error::SearchEngineResult;
use crate::search::query::{ExclusionSpec, FilterSpec, FilterValue, RangeSpec, SearchRequest};
use serde_json::{json, Map, Value};

/// Characters with special meaning in `query_string` syntax; stripped from user input
pub const RESERVED_CHARACTERS: &str = "+=><!(){}[]^~*:\\/&|?";

/// Name of the wrapper aggregation used for multi-value facets
pub const GLOBAL_AGGREGATION: &str = "global_aggs";

/// Name of the per-facet terms sub-aggregation in multi-value mode
pub const VALUES_AGGREGATION: &str = "values";

/// Name of the per-facet value count sub-aggregation in multi-value mode
pub const TOTAL_DOCS_AGGREGATION: &str = "total_docs";

/// Value count aggregation paired with each single-value facet
pub fn total_docs_name(field: &str) -> String {
    format!("total_{}_docs", field)
}

/// Remove query syntax characters from free text
pub fn strip_reserved(query: &str) -> String {
    query
        .chars()
        .filter(|ch| !RESERVED_CHARACTERS.contains(*ch))
        .collect()
}

/// Builds Elasticsearch search bodies
#[derive(Debug, Clone)]
pub struct ElasticsearchTranslator {
    query_fields: Vec<String>,
}

impl ElasticsearchTranslator {
    pub fn new(query_fields: Vec<String>) -> Self {
        Self { query_fields }
    }

    pub fn query_fields(&self) -> &[String] {
        &self.query_fields
    }

    /// Full `_search` body for a request
    pub fn translate(&self, request: &SearchRequest) -> SearchEngineResult<Value> {
        request.validate()?;

        let mut body = Map::new();
        body.insert("query".to_string(), self.query(request, None));
        body.insert("from".to_string(), json!(request.from));
        body.insert("size".to_string(), json!(request.size));
        // Otherwise totals stop at 10000
        body.insert("track_total_hits".to_string(), json!(true));

        if !request.sort_by.is_empty() {
            let sort: Vec<Value> = request
                .sort_by
                .iter()
                .map(|field| json!({ field.name.clone(): { "order": field.order.as_str() } }))
                .collect();
            body.insert("sort".to_string(), Value::Array(sort));
        }

        if !request.aggregations.is_empty() {
            let aggs = if request.is_multivalue {
                self.global_aggregations(request)
            } else {
                single_value_aggregations(request)
            };
            body.insert("aggs".to_string(), aggs);
        }

        Ok(Value::Object(body))
    }

    /// Query clause; filters on `skip_field` are left out
    fn query(&self, request: &SearchRequest, skip_field: Option<&str>) -> Value {
        let mut must = Vec::new();
        if let Some(text) = request.text_query() {
            let text = strip_reserved(text);
            if !text.trim().is_empty() {
                must.push(json!({
                    "query_string": {
                        "fields": self.query_fields,
                        "query": text,
                    }
                }));
            }
        }

        let filter: Vec<Value> = request
            .filters
            .iter()
            .filter(|spec| Some(spec.field()) != skip_field)
            .map(filter_clause)
            .collect();

        let must_not: Vec<Value> = request
            .exclusions
            .iter()
            .flat_map(exclusion_clauses)
            .collect();

        if must.is_empty() && filter.is_empty() && must_not.is_empty() {
            return json!({ "match_all": {} });
        }

        let mut clauses = Map::new();
        for (occur, list) in [("must", must), ("filter", filter), ("must_not", must_not)] {
            if !list.is_empty() {
                clauses.insert(occur.to_string(), Value::Array(list));
            }
        }
        json!({ "bool": clauses })
    }

    /// One `global` aggregation whose per-facet `filter` drops that facet's own filters
    fn global_aggregations(&self, request: &SearchRequest) -> Value {
        let mut facets = Map::new();
        for aggregation in &request.aggregations {
            let field = aggregation.field.as_str();
            facets.insert(
                field.to_string(),
                json!({
                    "filter": self.query(request, Some(field)),
                    "aggs": {
                        VALUES_AGGREGATION: terms_aggregation(field, aggregation.size),
                        TOTAL_DOCS_AGGREGATION: { "value_count": { "field": field } },
                    }
                }),
            );
        }
        json!({
            GLOBAL_AGGREGATION: {
                "global": {},
                "aggs": facets,
            }
        })
    }
}

impl Default for ElasticsearchTranslator {
    fn default() -> Self {
        Self::new(vec!["content.*".to_string()])
    }
}

fn single_value_aggregations(request: &SearchRequest) -> Value {
    let mut aggs = Map::new();
    for aggregation in &request.aggregations {
        let field = aggregation.field.as_str();
        aggs.insert(field.to_string(), terms_aggregation(field, aggregation.size));
        aggs.insert(
            total_docs_name(field),
            json!({ "value_count": { "field": field } }),
        );
    }
    Value::Object(aggs)
}

fn terms_aggregation(field: &str, size: Option<usize>) -> Value {
    match size {
        Some(size) => json!({ "terms": { "field": field, "size": size } }),
        None => json!({ "terms": { "field": field } }),
    }
}

fn filter_clause(spec: &FilterSpec) -> Value {
    match spec {
        FilterSpec::Equality { field, values } => equality_clause(field, values),
        FilterSpec::Range {
            field,
            range,
            allow_missing,
        } => {
            let clause = range_clause(field, range);
            if *allow_missing {
                or_missing(field, clause)
            } else {
                clause
            }
        }
        FilterSpec::ExistsPassthrough { field, value } => {
            or_missing(field, equality_clause(field, std::slice::from_ref(value)))
        }
    }
}

fn equality_clause(field: &str, values: &[FilterValue]) -> Value {
    if field == ID_FIELD_NAME {
        let ids: Vec<String> = values.iter().map(|v| primary_key(&v.as_text())).collect();
        return json!({ "ids": { "values": ids } });
    }
    match values {
        [value] => json!({ "term": { field: value.to_json() } }),
        _ => {
            let values: Vec<Value> = values.iter().map(FilterValue::to_json).collect();
            json!({ "terms": { field: values } })
        }
    }
}

fn range_clause(field: &str, range: &RangeSpec) -> Value {
    let mut bounds = Map::new();
    if let Some(lower) = &range.lower {
        bounds.insert("gte".to_string(), lower.to_json());
    }
    if let Some(upper) = &range.upper {
        bounds.insert("lte".to_string(), upper.to_json());
    }
    json!({ "range": { field: bounds } })
}

fn or_missing(field: &str, clause: Value) -> Value {
    json!({
        "bool": {
            "should": [
                clause,
                { "bool": { "must_not": { "exists": { "field": field } } } },
            ],
            "minimum_should_match": 1,
        }
    })
}

fn exclusion_clauses(exclusion: &ExclusionSpec) -> Vec<Value> {
    exclusion
        .values
        .iter()
        .map(|value| equality_clause(&exclusion.field, std::slice::from_ref(value)))
        .collect()
}

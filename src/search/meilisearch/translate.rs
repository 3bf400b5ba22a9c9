//! Canonical request to Meilisearch search parameters

use crate::search::document::{primary_key, ID_FIELD_NAME, PRIMARY_KEY_FIELD_NAME};
use crate::search::error::SearchEngineResult;
use crate::search::query::{ExclusionSpec, FilterSpec, FilterValue, RangeSpec, SearchRequest};
use serde::Serialize;

/// Body of a `POST /indexes/{index}/search` request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Free text; empty matches every document
    pub q: String,

    /// Ask for `_rankingScore` on each hit
    pub show_ranking_score: bool,

    /// Number of hits to skip
    pub offset: usize,

    /// Maximum number of hits returned
    pub limit: usize,

    /// Fields to return a `facetDistribution` for
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<String>,

    /// Rules joined with AND
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<String>,

    /// `field:asc` or `field:desc` criteria, in priority order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<String>,
}

/// Whether a rule narrows by a field's filters or by an exclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Filter,
    Exclusion,
}

/// One filter expression and the field it constrains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    pub field: String,
    pub kind: RuleKind,
    pub expression: String,
}

/// Zero-hit query recounting one facet without its own filters
#[derive(Debug, Clone, PartialEq)]
pub struct SupplementaryQuery {
    /// Facet being recounted
    pub field: String,

    /// Primary parameters minus that facet's filters, with `limit` 0
    pub params: SearchParams,
}

/// Everything needed to answer one request
#[derive(Debug, Clone, PartialEq)]
pub struct MeilisearchQuerySet {
    /// Query producing hits, total and unfiltered facet counts
    pub primary: SearchParams,

    /// One per facet that carries its own filter in multi-value mode
    pub supplementary: Vec<SupplementaryQuery>,
}

/// Translate a request into the primary query plus any supplementary facet queries
pub fn translate(request: &SearchRequest) -> SearchEngineResult<MeilisearchQuerySet> {
    request.validate()?;

    let rules = filter_rules(request);
    let q = request.text_query().unwrap_or_default().to_string();
    let facets: Vec<String> = request
        .aggregations
        .iter()
        .map(|aggregation| aggregation.field.clone())
        .collect();

    let primary = SearchParams {
        q: q.clone(),
        show_ranking_score: true,
        offset: request.from,
        limit: request.size,
        facets: facets.clone(),
        filter: rules.iter().map(|rule| rule.expression.clone()).collect(),
        sort: request
            .sort_by
            .iter()
            .map(|field| format!("{}:{}", field.name, field.order.as_str()))
            .collect(),
    };

    let supplementary = if request.is_multivalue {
        let filtered = request.filtered_fields();
        facets
            .iter()
            .filter(|field| filtered.contains(field.as_str()))
            .map(|field| SupplementaryQuery {
                field: field.clone(),
                params: SearchParams {
                    q: q.clone(),
                    show_ranking_score: false,
                    offset: 0,
                    limit: 0,
                    facets: vec![field.clone()],
                    filter: rules
                        .iter()
                        .filter(|rule| rule.kind == RuleKind::Exclusion || &rule.field != field)
                        .map(|rule| rule.expression.clone())
                        .collect(),
                    sort: Vec::new(),
                },
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(MeilisearchQuerySet {
        primary,
        supplementary,
    })
}

/// Filter rules in request order, exclusions last
pub fn filter_rules(request: &SearchRequest) -> Vec<FilterRule> {
    let filters = request.filters.iter().map(|spec| FilterRule {
        field: spec.field().to_string(),
        kind: RuleKind::Filter,
        expression: filter_expression(spec),
    });
    let exclusions = request
        .exclusions
        .iter()
        .flat_map(exclusion_rules);
    filters.chain(exclusions).collect()
}

fn filter_expression(spec: &FilterSpec) -> String {
    match spec {
        FilterSpec::Equality { field, values } => values
            .iter()
            .map(|value| equals(field, value))
            .collect::<Vec<_>>()
            .join(" OR "),
        FilterSpec::Range {
            field,
            range,
            allow_missing,
        } => {
            let bounds = range_expression(field, range);
            if *allow_missing {
                let bounds = if range.lower.is_some() && range.upper.is_some() {
                    format!("({})", bounds)
                } else {
                    bounds
                };
                format!("{} OR {} NOT EXISTS", bounds, field)
            } else {
                bounds
            }
        }
        FilterSpec::ExistsPassthrough { field, value } => {
            format!("{} OR {} NOT EXISTS", equals(field, value), field)
        }
    }
}

fn range_expression(field: &str, range: &RangeSpec) -> String {
    let mut parts = Vec::with_capacity(2);
    if let Some(lower) = &range.lower {
        parts.push(format!("{} >= {}", field, lower.to_filter_literal()));
    }
    if let Some(upper) = &range.upper {
        parts.push(format!("{} <= {}", field, upper.to_filter_literal()));
    }
    parts.join(" AND ")
}

/// Equality on `id` compares the stored primary key instead
fn equals(field: &str, value: &FilterValue) -> String {
    if field == ID_FIELD_NAME {
        let key = FilterValue::Text(primary_key(&value.as_text()));
        format!("{} = {}", PRIMARY_KEY_FIELD_NAME, key.to_filter_literal())
    } else {
        format!("{} = {}", field, value.to_filter_literal())
    }
}

fn exclusion_rules(exclusion: &ExclusionSpec) -> impl Iterator<Item = FilterRule> + '_ {
    exclusion.values.iter().map(move |value| FilterRule {
        field: exclusion.field.clone(),
        kind: RuleKind::Exclusion,
        expression: format!("NOT {}", equals(&exclusion.field, value)),
    })
}

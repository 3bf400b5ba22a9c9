//! Canonical search request model
//!
//! A [`SearchRequest`] is what client code builds; each backend translator turns
//! it into native queries.

use crate::search::document::{epoch_seconds, naive_epoch_seconds};
use crate::search::error::{SearchEngineError, SearchEngineResult};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Page size used when the caller does not set one
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Sort direction
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order `{}`", other)),
        }
    }
}

/// One sort criterion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortField {
    pub name: String,
    pub order: SortOrder,
}

/// A value compared against document fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<FixedOffset>),
    NaiveDateTime(NaiveDateTime),
}

impl FilterValue {
    /// JSON form used in backend query bodies; timestamps become epoch seconds
    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::Bool(b) => Value::Bool(*b),
            FilterValue::Integer(i) => Value::from(*i),
            FilterValue::Float(f) => Value::from(*f),
            FilterValue::Text(s) => Value::String(s.clone()),
            FilterValue::DateTime(dt) => Value::from(epoch_seconds(dt)),
            FilterValue::NaiveDateTime(naive) => Value::from(naive_epoch_seconds(naive)),
        }
    }

    /// Literal form for filter expression strings
    ///
    /// Strings are double quoted with `"` and `\` escaped; floats and
    /// timestamps always carry a fractional part.
    pub fn to_filter_literal(&self) -> String {
        match self {
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::Integer(i) => i.to_string(),
            FilterValue::Float(f) => format!("{:?}", f),
            FilterValue::Text(s) => quote(s),
            FilterValue::DateTime(dt) => format!("{:?}", epoch_seconds(dt)),
            FilterValue::NaiveDateTime(naive) => format!("{:?}", naive_epoch_seconds(naive)),
        }
    }

    /// Plain text form, used where a value names a logical document id
    pub fn as_text(&self) -> String {
        match self {
            FilterValue::Text(s) => s.clone(),
            other => other.to_json().to_string(),
        }
    }
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<&String> for FilterValue {
    fn from(value: &String) -> Self {
        FilterValue::Text(value.clone())
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Integer(value.into())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<DateTime<FixedOffset>> for FilterValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        FilterValue::DateTime(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::DateTime(value.fixed_offset())
    }
}

impl From<NaiveDateTime> for FilterValue {
    fn from(value: NaiveDateTime) -> Self {
        FilterValue::NaiveDateTime(value)
    }
}

/// Inclusive bounds; an unset bound does not constrain
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeSpec {
    pub lower: Option<FilterValue>,
    pub upper: Option<FilterValue>,
}

impl RangeSpec {
    pub fn between(lower: impl Into<FilterValue>, upper: impl Into<FilterValue>) -> Self {
        Self {
            lower: Some(lower.into()),
            upper: Some(upper.into()),
        }
    }

    pub fn at_least(lower: impl Into<FilterValue>) -> Self {
        Self {
            lower: Some(lower.into()),
            upper: None,
        }
    }

    pub fn at_most(upper: impl Into<FilterValue>) -> Self {
        Self {
            lower: None,
            upper: Some(upper.into()),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }
}

/// A constraint on one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterSpec {
    /// Field equals one of the values
    Equality { field: String, values: Vec<FilterValue> },

    /// Field falls within the range, optionally also matching when absent
    Range {
        field: String,
        range: RangeSpec,
        allow_missing: bool,
    },

    /// Field equals the value, or the field is absent
    ExistsPassthrough { field: String, value: FilterValue },
}

impl FilterSpec {
    pub fn field(&self) -> &str {
        match self {
            FilterSpec::Equality { field, .. }
            | FilterSpec::Range { field, .. }
            | FilterSpec::ExistsPassthrough { field, .. } => field,
        }
    }
}

/// Values a field must not hold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExclusionSpec {
    pub field: String,
    pub values: Vec<FilterValue>,
}

/// A requested facet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationRequest {
    pub field: String,

    /// Keep only the top N terms, the rest counts as `other`
    pub size: Option<usize>,
}

/// Backend-agnostic search request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    /// Free text; blank means "match everything"
    pub query_string: Option<String>,

    pub filters: Vec<FilterSpec>,

    pub exclusions: Vec<ExclusionSpec>,

    pub aggregations: Vec<AggregationRequest>,

    pub sort_by: Vec<SortField>,

    /// Offset of the first hit
    pub from: usize,

    /// Page size
    pub size: usize,

    /// Count each facet as if its own filters were not applied
    pub is_multivalue: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query_string: None,
            filters: Vec::new(),
            exclusions: Vec::new(),
            aggregations: Vec::new(),
            sort_by: Vec::new(),
            from: 0,
            size: DEFAULT_PAGE_SIZE,
            is_multivalue: false,
        }
    }
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a text-only request
    pub fn text(query: impl Into<String>) -> Self {
        Self::new().with_query_string(query)
    }

    pub fn with_query_string(mut self, query: impl Into<String>) -> Self {
        self.query_string = Some(query.into());
        self
    }

    /// Field must equal one of `values`
    pub fn with_field<V: Into<FilterValue>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filters.push(FilterSpec::Equality {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Field must equal `value` or be absent
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.push(FilterSpec::ExistsPassthrough {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Field must fall within `range` or be absent
    pub fn with_range(mut self, field: impl Into<String>, range: RangeSpec) -> Self {
        self.filters.push(FilterSpec::Range {
            field: field.into(),
            range,
            allow_missing: true,
        });
        self
    }

    /// Field must be present and fall within `range`
    pub fn with_strict_range(mut self, field: impl Into<String>, range: RangeSpec) -> Self {
        self.filters.push(FilterSpec::Range {
            field: field.into(),
            range,
            allow_missing: false,
        });
        self
    }

    pub fn excluding<V: Into<FilterValue>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.exclusions.push(ExclusionSpec {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn with_aggregation(mut self, field: impl Into<String>, size: Option<usize>) -> Self {
        self.aggregations.push(AggregationRequest {
            field: field.into(),
            size,
        });
        self
    }

    pub fn with_sort(mut self, name: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by.push(SortField {
            name: name.into(),
            order,
        });
        self
    }

    pub fn with_from(mut self, from: usize) -> Self {
        self.from = from;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn multivalue(mut self, is_multivalue: bool) -> Self {
        self.is_multivalue = is_multivalue;
        self
    }

    /// Trimmed free text, `None` when blank
    pub fn text_query(&self) -> Option<&str> {
        self.query_string
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    /// Fields carrying at least one filter
    pub fn filtered_fields(&self) -> BTreeSet<&str> {
        self.filters.iter().map(FilterSpec::field).collect()
    }

    /// Reject requests no backend can express
    pub fn validate(&self) -> SearchEngineResult<()> {
        for filter in &self.filters {
            match filter {
                FilterSpec::Range { field, range, .. } if range.is_unbounded() => {
                    return Err(SearchEngineError::invalid_query(format!(
                        "range filter on `{}` has neither a lower nor an upper bound",
                        field
                    )));
                }
                FilterSpec::Equality { field, values } if values.is_empty() => {
                    return Err(SearchEngineError::invalid_query(format!(
                        "equality filter on `{}` has no values",
                        field
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

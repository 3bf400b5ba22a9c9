//! Common test utilities for search engine testing
//!
//! In-memory stand-ins for both backends. They evaluate the queries the
//! translators produce against stored documents, so engine behaviour can be
//! checked end to end without a running server.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use faceted_search::search::elasticsearch::{BulkItemResult, BulkOperation, BulkResponse};
use faceted_search::search::meilisearch::{SearchParams, Task, TaskError, TaskInfo, TaskStatus};
use faceted_search::search::{
    Document, ElasticsearchEngine, ElasticsearchTransport, MeilisearchEngine, MeilisearchTransport,
    SearchEngine, TransportError, TransportResult, WriteOptions,
};
use faceted_search::search::elasticsearch::ElasticsearchTranslator;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Document helpers
// ---------------------------------------------------------------------------

/// Value at a dotted path
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |value, key| value.get(key))
        .filter(|value| !value.is_null())
}

/// Scalars stored under a field, arrays flattened
fn field_values(doc: &Value, path: &str) -> Vec<Value> {
    match lookup(doc, path) {
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
        Some(value) => vec![value.clone()],
        None => Vec::new(),
    }
}

fn same_value(stored: &Value, expected: &Value) -> bool {
    match (stored.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => stored == expected,
    }
}

/// Lowercased alphanumeric words of every string under `doc`
fn words(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(
            s.split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase),
        ),
        Value::Array(items) => items.iter().for_each(|item| words(item, out)),
        Value::Object(map) => map.values().for_each(|item| words(item, out)),
        _ => {}
    }
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn bucket_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Documents per distinct value of `field`, plus the number of values seen
fn count_values<'a>(docs: impl Iterator<Item = &'a Value>, field: &str) -> (BTreeMap<String, u64>, u64) {
    let mut counts = BTreeMap::new();
    let mut values_seen = 0;
    for doc in docs {
        let mut keys: Vec<String> = field_values(doc, field).iter().map(bucket_key).collect();
        values_seen += keys.len() as u64;
        keys.sort();
        keys.dedup();
        for key in keys {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    (counts, values_seen)
}

fn compare_field(a: &Value, b: &Value, field: &str) -> std::cmp::Ordering {
    let left = lookup(a, field);
    let right = lookup(b, field);
    match (left.and_then(Value::as_f64), right.and_then(Value::as_f64)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => left
            .map(bucket_key)
            .unwrap_or_default()
            .cmp(&right.map(bucket_key).unwrap_or_default()),
    }
}

// ---------------------------------------------------------------------------
// Elasticsearch fake
// ---------------------------------------------------------------------------

/// In-memory Elasticsearch understanding the query DSL subset the translator emits
#[derive(Default)]
pub struct FakeElasticsearch {
    docs: Mutex<Vec<(String, Value)>>,
    failing_ids: Mutex<Vec<String>>,
    fail_search: AtomicBool,
    pub bodies: Mutex<Vec<Value>>,
}

impl FakeElasticsearch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reject writes of documents with these logical ids
    pub fn fail_ids(&self, ids: &[&str]) {
        *self.failing_ids.lock().unwrap() = ids.iter().map(|id| id.to_string()).collect();
    }

    pub fn fail_searches(&self) {
        self.fail_search.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn stored(&self, key: &str) -> Option<Value> {
        self.docs
            .lock()
            .unwrap()
            .iter()
            .find(|(pk, _)| pk == key)
            .map(|(_, doc)| doc.clone())
    }

    fn matches(query: &Value, pk: &str, doc: &Value) -> bool {
        let Some((kind, body)) = query.as_object().and_then(|q| q.iter().next()) else {
            return true;
        };
        match kind.as_str() {
            "match_all" => true,
            "bool" => {
                let all = |occur: &str| {
                    body.get(occur)
                        .and_then(Value::as_array)
                        .map(|clauses| clauses.iter().all(|c| Self::matches(c, pk, doc)))
                        .unwrap_or(true)
                };
                let must_not = match body.get("must_not") {
                    Some(Value::Array(clauses)) => clauses.iter().any(|c| Self::matches(c, pk, doc)),
                    Some(clause) => Self::matches(clause, pk, doc),
                    None => false,
                };
                let should = body
                    .get("should")
                    .and_then(Value::as_array)
                    .map(|clauses| clauses.iter().any(|c| Self::matches(c, pk, doc)))
                    .unwrap_or(true);
                all("must") && all("filter") && !must_not && should
            }
            "term" => body.as_object().map_or(false, |term| {
                term.iter().all(|(field, expected)| {
                    field_values(doc, field).iter().any(|v| same_value(v, expected))
                })
            }),
            "terms" => body.as_object().map_or(false, |terms| {
                terms.iter().all(|(field, expected)| {
                    let expected = expected.as_array().cloned().unwrap_or_default();
                    field_values(doc, field)
                        .iter()
                        .any(|v| expected.iter().any(|e| same_value(v, e)))
                })
            }),
            "ids" => body["values"]
                .as_array()
                .map_or(false, |ids| ids.iter().any(|id| id.as_str() == Some(pk))),
            "exists" => body["field"]
                .as_str()
                .map_or(false, |field| lookup(doc, field).is_some()),
            "range" => body.as_object().map_or(false, |range| {
                range.iter().all(|(field, bounds)| {
                    field_values(doc, field).iter().filter_map(Value::as_f64).any(|v| {
                        bounds.get("gte").and_then(Value::as_f64).map_or(true, |lo| v >= lo)
                            && bounds.get("lte").and_then(Value::as_f64).map_or(true, |hi| v <= hi)
                    })
                })
            }),
            "query_string" => {
                let fields: Vec<&str> = body["fields"]
                    .as_array()
                    .map(|f| f.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                let mut text = Vec::new();
                for field in fields {
                    match field.strip_suffix(".*") {
                        Some(prefix) => {
                            if let Some(value) = lookup(doc, prefix) {
                                words(value, &mut text);
                            }
                        }
                        None => {
                            if let Some(value) = lookup(doc, field) {
                                words(value, &mut text);
                            }
                        }
                    }
                }
                // default_operator OR
                query_terms(body["query"].as_str().unwrap_or_default())
                    .iter()
                    .any(|term| text.contains(term))
            }
            other => panic!("unsupported query clause `{}`", other),
        }
    }

    fn terms_aggregation<'a>(docs: impl Iterator<Item = &'a Value>, spec: &Value) -> Value {
        let field = spec["field"].as_str().unwrap_or_default();
        let size = spec.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let (counts, _) = count_values(docs, field);

        let mut sorted: Vec<(String, u64)> = counts.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let total: u64 = sorted.iter().map(|(_, c)| c).sum();
        sorted.truncate(size);
        let kept: u64 = sorted.iter().map(|(_, c)| c).sum();

        json!({
            "doc_count_error_upper_bound": 0,
            "sum_other_doc_count": total - kept,
            "buckets": sorted
                .into_iter()
                .map(|(key, count)| json!({"key": key, "doc_count": count}))
                .collect::<Vec<_>>(),
        })
    }

    fn value_count<'a>(docs: impl Iterator<Item = &'a Value>, spec: &Value) -> Value {
        let field = spec["field"].as_str().unwrap_or_default();
        let (_, values_seen) = count_values(docs, field);
        json!({ "value": values_seen as f64 })
    }

    fn aggregate(docs: &[(String, Value)], matched: &[&(String, Value)], aggs: &Map<String, Value>) -> Value {
        let mut out = Map::new();
        for (name, spec) in aggs {
            if spec.get("global").is_some() {
                let mut facets = Map::new();
                for (facet, facet_spec) in spec["aggs"].as_object().cloned().unwrap_or_default() {
                    let filter = &facet_spec["filter"];
                    let scoped: Vec<&Value> = docs
                        .iter()
                        .filter(|(pk, doc)| Self::matches(filter, pk, doc))
                        .map(|(_, doc)| doc)
                        .collect();
                    let sub = &facet_spec["aggs"];
                    facets.insert(
                        facet,
                        json!({
                            "doc_count": scoped.len(),
                            "values": Self::terms_aggregation(scoped.iter().copied(), &sub["values"]["terms"]),
                            "total_docs": Self::value_count(scoped.iter().copied(), &sub["total_docs"]["value_count"]),
                        }),
                    );
                }
                out.insert(name.clone(), Value::Object(facets));
            } else if let Some(terms) = spec.get("terms") {
                out.insert(
                    name.clone(),
                    Self::terms_aggregation(matched.iter().map(|(_, doc)| doc), terms),
                );
            } else if let Some(count) = spec.get("value_count") {
                out.insert(
                    name.clone(),
                    Self::value_count(matched.iter().map(|(_, doc)| doc), count),
                );
            }
        }
        Value::Object(out)
    }
}

#[async_trait]
impl ElasticsearchTransport for FakeElasticsearch {
    async fn search(&self, index: &str, body: &Value) -> TransportResult<Value> {
        self.bodies.lock().unwrap().push(body.clone());
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("connection refused".to_string()));
        }

        let docs = self.docs.lock().unwrap();
        let mut matched: Vec<&(String, Value)> = docs
            .iter()
            .filter(|(pk, doc)| Self::matches(&body["query"], pk, doc))
            .collect();

        if let Some(sort) = body.get("sort").and_then(Value::as_array) {
            matched.sort_by(|(_, a), (_, b)| {
                sort.iter()
                    .filter_map(Value::as_object)
                    .flat_map(|s| s.iter())
                    .map(|(field, order)| {
                        let ordering = compare_field(a, b, field);
                        if order["order"] == "desc" {
                            ordering.reverse()
                        } else {
                            ordering
                        }
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let from = body["from"].as_u64().unwrap_or(0) as usize;
        let size = body["size"].as_u64().unwrap_or(10) as usize;
        let hits: Vec<Value> = matched
            .iter()
            .skip(from)
            .take(size)
            .map(|(pk, doc)| json!({"_index": index, "_id": pk, "_score": 1.0, "_source": doc}))
            .collect();

        let mut response = json!({
            "took": 3,
            "timed_out": false,
            "hits": {
                "total": {"value": matched.len(), "relation": "eq"},
                "max_score": if hits.is_empty() { Value::Null } else { json!(1.0) },
                "hits": hits,
            },
        });
        if let Some(aggs) = body.get("aggs").and_then(Value::as_object) {
            response["aggregations"] = Self::aggregate(&docs, &matched, aggs);
        }
        Ok(response)
    }

    async fn bulk(
        &self,
        _index: &str,
        operations: &[BulkOperation],
        _refresh: bool,
    ) -> TransportResult<BulkResponse> {
        let failing = self.failing_ids.lock().unwrap().clone();
        let mut docs = self.docs.lock().unwrap();
        let mut items = Vec::new();

        for operation in operations {
            let (action, result) = match operation {
                BulkOperation::Index { id, source } => {
                    let logical = source["id"].as_str().unwrap_or_default();
                    if failing.iter().any(|f| f == logical) {
                        ("index", BulkItemResult {
                            id: id.clone(),
                            status: 400,
                            error: Some(json!({"type": "mapper_parsing_exception", "reason": "rejected"})),
                        })
                    } else {
                        docs.retain(|(pk, _)| pk != id);
                        docs.push((id.clone(), source.clone()));
                        ("index", BulkItemResult { id: id.clone(), status: 201, error: None })
                    }
                }
                BulkOperation::Delete { id } => {
                    let before = docs.len();
                    docs.retain(|(pk, _)| pk != id);
                    let status = if docs.len() < before { 200 } else { 404 };
                    ("delete", BulkItemResult { id: id.clone(), status, error: None })
                }
            };
            let mut item = BTreeMap::new();
            item.insert(action.to_string(), result);
            items.push(item);
        }

        let errors = items
            .iter()
            .flat_map(|item| item.values())
            .any(|result| result.error.is_some());
        Ok(BulkResponse { errors, items })
    }
}

// ---------------------------------------------------------------------------
// Meilisearch fake
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
enum FilterExpr {
    Or(Vec<FilterExpr>),
    And(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    Eq(String, Literal),
    Gte(String, f64),
    Lte(String, f64),
    Exists(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Op(&'static str),
    Open,
    Close,
}

fn tokenize(input: &str) -> Vec<Token> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '"' => {
                let mut text = String::new();
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        i += 1;
                    }
                    text.push(chars[i]);
                    i += 1;
                }
                i += 1;
                tokens.push(Token::Quoted(text));
            }
            '>' | '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(if c == '>' { ">=" } else { "<=" }));
                i += 2;
            }
            '=' => {
                tokens.push(Token::Op("="));
                i += 1;
            }
            _ => {
                let mut word = String::new();
                while i < chars.len() && !" \t()\"=<>".contains(chars[i]) {
                    word.push(chars[i]);
                    i += 1;
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    tokens
}

struct FilterParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl FilterParser {
    fn parse(input: &str) -> FilterExpr {
        let mut parser = Self {
            tokens: tokenize(input),
            pos: 0,
        };
        let expr = parser.or();
        assert_eq!(parser.pos, parser.tokens.len(), "trailing tokens in `{}`", input);
        expr
    }

    fn peek_word(&self, word: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Word(w)) if w == word)
    }

    fn next(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        token
    }

    fn or(&mut self) -> FilterExpr {
        let mut terms = vec![self.and()];
        while self.peek_word("OR") {
            self.pos += 1;
            terms.push(self.and());
        }
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            FilterExpr::Or(terms)
        }
    }

    fn and(&mut self) -> FilterExpr {
        let mut terms = vec![self.not()];
        while self.peek_word("AND") {
            self.pos += 1;
            terms.push(self.not());
        }
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            FilterExpr::And(terms)
        }
    }

    fn not(&mut self) -> FilterExpr {
        if self.peek_word("NOT") {
            self.pos += 1;
            FilterExpr::Not(Box::new(self.not()))
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> FilterExpr {
        match self.next() {
            Token::Open => {
                let expr = self.or();
                assert_eq!(self.next(), Token::Close);
                expr
            }
            Token::Word(field) => {
                if self.peek_word("EXISTS") {
                    self.pos += 1;
                    return FilterExpr::Exists(field);
                }
                if self.peek_word("NOT") {
                    self.pos += 1;
                    assert_eq!(self.next(), Token::Word("EXISTS".to_string()));
                    return FilterExpr::Not(Box::new(FilterExpr::Exists(field)));
                }
                let op = self.next();
                let value = match self.next() {
                    Token::Quoted(text) => Literal::Text(text),
                    Token::Word(word) => match word.parse::<f64>() {
                        Ok(number) => Literal::Number(number),
                        Err(_) => Literal::Text(word),
                    },
                    other => panic!("unexpected token {:?}", other),
                };
                let number = || match &value {
                    Literal::Number(n) => *n,
                    Literal::Text(t) => t.parse().unwrap(),
                };
                match op {
                    Token::Op("=") => FilterExpr::Eq(field, value.clone()),
                    Token::Op(">=") => FilterExpr::Gte(field, number()),
                    Token::Op("<=") => FilterExpr::Lte(field, number()),
                    other => panic!("unsupported operator {:?}", other),
                }
            }
            other => panic!("unexpected token {:?}", other),
        }
    }
}

impl FilterExpr {
    fn eval(&self, doc: &Value) -> bool {
        match self {
            FilterExpr::Or(terms) => terms.iter().any(|t| t.eval(doc)),
            FilterExpr::And(terms) => terms.iter().all(|t| t.eval(doc)),
            FilterExpr::Not(inner) => !inner.eval(doc),
            FilterExpr::Exists(field) => lookup(doc, field).is_some(),
            FilterExpr::Eq(field, literal) => field_values(doc, field).iter().any(|v| match literal {
                Literal::Number(n) => v.as_f64().map_or(false, |x| (x - n).abs() < f64::EPSILON),
                Literal::Text(t) => bucket_key(v) == *t,
            }),
            FilterExpr::Gte(field, bound) => field_values(doc, field)
                .iter()
                .filter_map(Value::as_f64)
                .any(|v| v >= *bound),
            FilterExpr::Lte(field, bound) => field_values(doc, field)
                .iter()
                .filter_map(Value::as_f64)
                .any(|v| v <= *bound),
        }
    }
}

/// In-memory Meilisearch evaluating filter expressions and facet distributions
#[derive(Default)]
pub struct FakeMeilisearch {
    docs: Mutex<Vec<Value>>,
    tasks: Mutex<BTreeMap<u64, Task>>,
    next_task: AtomicU64,
    fail_tasks: AtomicBool,
    fail_search: AtomicBool,
    pub searches: Mutex<Vec<SearchParams>>,
}

impl FakeMeilisearch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every later write task end as failed
    pub fn fail_tasks(&self) {
        self.fail_tasks.store(true, Ordering::SeqCst);
    }

    pub fn fail_searches(&self) {
        self.fail_search.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn stored(&self, key: &str) -> Option<Value> {
        self.docs
            .lock()
            .unwrap()
            .iter()
            .find(|doc| doc["_pk"] == key)
            .cloned()
    }

    fn enqueue(&self) -> TaskInfo {
        let uid = self.next_task.fetch_add(1, Ordering::SeqCst);
        let failed = self.fail_tasks.load(Ordering::SeqCst);
        self.tasks.lock().unwrap().insert(
            uid,
            Task {
                uid,
                status: if failed { TaskStatus::Failed } else { TaskStatus::Succeeded },
                error: failed.then(|| TaskError {
                    message: "Index `courseware_content` not found.".to_string(),
                    code: "index_not_found".to_string(),
                    error_type: "invalid_request".to_string(),
                }),
            },
        );
        TaskInfo { task_uid: uid }
    }
}

#[async_trait]
impl MeilisearchTransport for FakeMeilisearch {
    async fn search(&self, _index: &str, params: &SearchParams) -> TransportResult<Value> {
        self.searches.lock().unwrap().push(params.clone());
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(TransportError::Status {
                status: 500,
                body: "internal".to_string(),
            });
        }

        let rules: Vec<FilterExpr> = params.filter.iter().map(|f| FilterParser::parse(f)).collect();
        let terms = query_terms(&params.q);
        let docs = self.docs.lock().unwrap();

        let mut matched: Vec<&Value> = docs
            .iter()
            .filter(|doc| rules.iter().all(|rule| rule.eval(doc)))
            .filter(|doc| {
                let mut text = Vec::new();
                for (key, value) in doc.as_object().into_iter().flatten() {
                    if key != "_pk" {
                        words(value, &mut text);
                    }
                }
                terms.iter().all(|term| text.contains(term))
            })
            .collect();

        for criterion in params.sort.iter().rev() {
            let (field, order) = criterion.split_once(':').unwrap();
            matched.sort_by(|a, b| {
                let ordering = compare_field(a, b, field);
                if order == "desc" {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let hits: Vec<Value> = matched
            .iter()
            .skip(params.offset)
            .take(params.limit)
            .map(|doc| {
                let mut hit = (*doc).clone();
                if params.show_ranking_score {
                    hit["_rankingScore"] = json!(1.0);
                }
                hit
            })
            .collect();

        let mut response = json!({
            "hits": hits,
            "query": params.q,
            "processingTimeMs": 1,
            "limit": params.limit,
            "offset": params.offset,
            "estimatedTotalHits": matched.len(),
        });
        if !params.facets.is_empty() {
            let mut distribution = Map::new();
            for facet in &params.facets {
                let (counts, _) = count_values(matched.iter().copied(), facet);
                distribution.insert(facet.clone(), json!(counts));
            }
            response["facetDistribution"] = Value::Object(distribution);
        }
        Ok(response)
    }

    async fn add_documents(
        &self,
        _index: &str,
        documents: &[Value],
        primary_key: &str,
    ) -> TransportResult<TaskInfo> {
        if !self.fail_tasks.load(Ordering::SeqCst) {
            let mut docs = self.docs.lock().unwrap();
            for document in documents {
                docs.retain(|doc| doc[primary_key] != document[primary_key]);
                docs.push(document.clone());
            }
        }
        Ok(self.enqueue())
    }

    async fn delete_documents(&self, _index: &str, keys: &[String]) -> TransportResult<TaskInfo> {
        if !self.fail_tasks.load(Ordering::SeqCst) {
            self.docs
                .lock()
                .unwrap()
                .retain(|doc| !keys.iter().any(|key| doc["_pk"] == key.as_str()));
        }
        Ok(self.enqueue())
    }

    async fn get_task(&self, uid: u64) -> TransportResult<Task> {
        self.tasks
            .lock()
            .unwrap()
            .get(&uid)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                status: 404,
                body: format!("Task `{}` not found.", uid),
            })
    }
}

// ---------------------------------------------------------------------------
// Engines and corpus
// ---------------------------------------------------------------------------

pub const TEST_INDEX_NAME: &str = "test_index";

/// One engine of each backend over fresh fakes
pub struct Backends {
    pub elasticsearch: Arc<FakeElasticsearch>,
    pub meilisearch: Arc<FakeMeilisearch>,
}

impl Backends {
    pub fn new() -> Self {
        Self {
            elasticsearch: FakeElasticsearch::new(),
            meilisearch: FakeMeilisearch::new(),
        }
    }

    pub fn engines(&self) -> Vec<(&'static str, Arc<dyn SearchEngine>)> {
        vec![
            ("elasticsearch", self.elasticsearch_engine()),
            ("meilisearch", self.meilisearch_engine()),
        ]
    }

    pub fn elasticsearch_engine(&self) -> Arc<dyn SearchEngine> {
        Arc::new(ElasticsearchEngine::new(
            TEST_INDEX_NAME,
            self.elasticsearch.clone(),
            ElasticsearchTranslator::default(),
        ))
    }

    pub fn meilisearch_engine(&self) -> Arc<dyn SearchEngine> {
        Arc::new(
            MeilisearchEngine::new(TEST_INDEX_NAME, self.meilisearch.clone())
                .with_task_polling(Duration::from_millis(1), Duration::from_millis(200)),
        )
    }
}

/// Builder for demo course documents; the caller supplies the sequence number
pub struct DemoCourse {
    document: Document,
}

impl DemoCourse {
    pub const ID_PREFIX: &'static str = "edX/DemoX/Demo_Course";

    pub fn new(sequence: u32) -> Self {
        let day = |y, m, d| {
            NaiveDate::from_ymd_opt(y, m, d)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .unwrap()
        };
        let document = Document::with_id(format!("{}_{}", Self::ID_PREFIX, sequence))
            .with("start", day(2014, 2, 1))
            .with("number", "DemoX")
            .with(
                "content",
                Document::new()
                    .with("short_description", "Short description")
                    .with("overview", "Long overview page")
                    .with("display_name", "edX Demonstration Course")
                    .with("number", "DemoX"),
            )
            .with("course", Self::ID_PREFIX)
            .with("image_url", "/c4x/edX/DemoX/asset/images_course_image.jpg")
            .with("effort", "5:30")
            .with("enrollment_start", day(2014, 1, 1));
        Self { document }
    }

    pub fn with(mut self, field: &str, value: impl Into<faceted_search::search::DocumentValue>) -> Self {
        self.document.insert(field, value);
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        let content = Document::new()
            .with("short_description", text)
            .with("overview", "Long overview page")
            .with("display_name", "edX Demonstration Course")
            .with("number", "DemoX");
        self.document.insert("content", content);
        self
    }

    pub fn without(mut self, field: &str) -> Self {
        self.document.remove(field);
        self
    }

    pub fn build(self) -> Document {
        self.document
    }

    pub fn id(sequence: u32) -> String {
        format!("{}_{}", Self::ID_PREFIX, sequence)
    }
}

/// Three courses: OrgA/en, OrgB/fr, OrgC/en
pub fn demo_corpus() -> Vec<Document> {
    vec![
        DemoCourse::new(1)
            .with("org", "OrgA")
            .with("language", "en")
            .description("Find this one with the right parameter")
            .build(),
        DemoCourse::new(2)
            .with("org", "OrgB")
            .with("language", "fr")
            .description("Find this one with another parameter")
            .build(),
        DemoCourse::new(3)
            .with("org", "OrgC")
            .with("language", "en")
            .description("Find this one somehow")
            .build(),
    ]
}

/// Seven courses with uneven subject and org distributions
pub fn aggregation_corpus() -> Vec<Document> {
    let rows: [(&str, Option<&str>); 7] = [
        ("Harvard", Some("mathematics")),
        ("Harvard", Some("mathematics")),
        ("Harvard", Some("mathematics")),
        ("Harvard", Some("physics")),
        ("MIT", Some("physics")),
        ("MIT", Some("history")),
        ("edX", None),
    ];
    rows.iter()
        .enumerate()
        .map(|(i, (org, subject))| {
            let course = DemoCourse::new(100 + i as u32).with("org", *org);
            let course = match subject {
                Some(subject) => course.with("subject", *subject),
                None => course,
            };
            course.build()
        })
        .collect()
}

/// Index documents and wait for them to become searchable
pub async fn index_all(engine: &Arc<dyn SearchEngine>, documents: &[Document]) {
    engine
        .index(documents, WriteOptions::refresh())
        .await
        .expect("indexing failed");
}

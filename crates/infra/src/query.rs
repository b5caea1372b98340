//! Query Feature Builder.
//!
//! Turns a flat query-string map into a [`DocumentQuery`] (filter, sort,
//! projection, window) and evaluates it in memory over snake_case JSON
//! documents.
//!
//! ```text
//! ApiFeatures::new(base, &params)
//!     .filter()
//!     .sort()
//!     .limit_fields(Tour::FIELDS)
//!     .paginate()
//!     .into_query()
//!     .execute(docs)
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

use tourbook_core::casing::snake_path;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 100;
pub const DEFAULT_SORT: &str = "-created_at";

const RESERVED: [&str; 4] = ["page", "sort", "limit", "fields"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Gte,
    Gt,
    Lte,
    Lt,
}

impl RangeOp {
    fn admits(self, ord: Ordering) -> bool {
        match self {
            RangeOp::Gte => ord != Ordering::Less,
            RangeOp::Gt => ord == Ordering::Greater,
            RangeOp::Lte => ord != Ordering::Greater,
            RangeOp::Lt => ord == Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq { path: String, value: Value },
    Range { path: String, op: RangeOp, value: Value },
}

impl Condition {
    fn matches(&self, doc: &Value) -> bool {
        match self {
            Condition::Eq { path, value } => {
                lookup(doc, path).is_some_and(|stored| eq_matches(stored, value))
            }
            Condition::Range { path, op, value } => lookup(doc, path).is_some_and(|stored| {
                any_scalar(stored, |s| {
                    compare_typed(s, value).is_some_and(|ord| op.admits(ord))
                })
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub path: String,
    pub descending: bool,
}

/// Structured query handle evaluated against one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub conditions: Vec<Condition>,
    pub sort: Vec<SortKey>,
    pub projection: Option<Vec<String>>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base restriction, e.g. `secret_tour == false` or `tour == <id>`.
    pub fn where_eq(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            path: path.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }

    /// Filter, sort, window, then project.
    pub fn execute(&self, docs: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut hits: Vec<Value> = docs.into_iter().filter(|d| self.matches(d)).collect();

        if !self.sort.is_empty() {
            hits.sort_by(|a, b| {
                for key in &self.sort {
                    let ord = compare_for_sort(lookup(a, &key.path), lookup(b, &key.path));
                    let ord = if key.descending { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let window = hits.into_iter().skip(self.skip);
        let window: Vec<Value> = match self.limit {
            Some(limit) => window.take(limit).collect(),
            None => window.collect(),
        };

        match &self.projection {
            Some(fields) => window.iter().map(|d| project(d, fields)).collect(),
            None => window,
        }
    }
}

/// Builder applying query-string features to a base query.
///
/// Each stage consumes and returns the builder so stages chain and may be
/// applied partially.
#[derive(Debug, Clone)]
pub struct ApiFeatures {
    query: DocumentQuery,
    params: BTreeMap<String, String>,
}

impl ApiFeatures {
    pub fn new(base: DocumentQuery, params: &HashMap<String, String>) -> Self {
        Self {
            query: base,
            params: params.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    pub fn filter(mut self) -> Self {
        for (key, raw) in &self.params {
            if RESERVED.contains(&key.as_str()) {
                continue;
            }
            let value = Value::String(raw.clone());
            let condition = match split_operator(key) {
                Some((field, op)) => Condition::Range {
                    path: snake_path(field),
                    op,
                    value,
                },
                None => Condition::Eq {
                    path: snake_path(key),
                    value,
                },
            };
            self.query.conditions.push(condition);
        }
        tracing::debug!(conditions = self.query.conditions.len(), "filter applied");
        self
    }

    pub fn sort(mut self) -> Self {
        let spec = self
            .params
            .get("sort")
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SORT);

        self.query.sort = spec
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "-")
            .map(|s| match s.strip_prefix('-') {
                Some(field) => SortKey {
                    path: snake_path(field),
                    descending: true,
                },
                None => SortKey {
                    path: snake_path(s.trim_start_matches('+')),
                    descending: false,
                },
            })
            .collect();
        self
    }

    /// Restrict output to the requested fields that exist in `allowed`.
    pub fn limit_fields(mut self, allowed: &[&str]) -> Self {
        let Some(raw) = self.params.get("fields") else {
            return self;
        };

        let mut valid = Vec::new();
        for field in raw.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            let path = snake_path(field);
            let root = path.split('.').next().unwrap_or_default();
            if allowed.contains(&root) {
                if !valid.contains(&path) {
                    valid.push(path);
                }
            } else {
                tracing::warn!(field = %field, "invalid field ignored");
            }
        }

        if valid.is_empty() {
            tracing::debug!("no valid fields to limit");
            return self;
        }
        if !valid.iter().any(|f| f == "id") {
            valid.insert(0, "id".to_string());
        }
        self.query.projection = Some(valid);
        self
    }

    pub fn paginate(mut self) -> Self {
        let page = self.positive_param("page", DEFAULT_PAGE);
        let limit = self.positive_param("limit", DEFAULT_LIMIT);
        self.query.skip = (page - 1).saturating_mul(limit);
        self.query.limit = Some(limit);
        tracing::debug!(page, limit, "paginated");
        self
    }

    pub fn into_query(self) -> DocumentQuery {
        self.query
    }

    fn positive_param(&self, name: &str, default: usize) -> usize {
        match self.params.get(name) {
            None => default,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    tracing::warn!(param = name, value = %raw, default, "bad pagination value, using default");
                    default
                }
            },
        }
    }
}

fn split_operator(key: &str) -> Option<(&str, RangeOp)> {
    const OPS: [(&str, RangeOp); 4] = [
        ("[gte]", RangeOp::Gte),
        ("[gt]", RangeOp::Gt),
        ("[lte]", RangeOp::Lte),
        ("[lt]", RangeOp::Lt),
    ];
    OPS.iter()
        .find_map(|(suffix, op)| key.strip_suffix(suffix).map(|field| (field, *op)))
        .filter(|(field, _)| !field.is_empty())
}

/// Walk a dotted path through objects (and array indexes).
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |cur, seg| match cur {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn any_scalar(stored: &Value, pred: impl Fn(&Value) -> bool) -> bool {
    match stored {
        Value::Array(items) => items.iter().any(pred),
        other => pred(other),
    }
}

fn eq_matches(stored: &Value, wanted: &Value) -> bool {
    any_scalar(stored, |s| compare_typed(s, wanted) == Some(Ordering::Equal))
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Compare a stored value with a wanted one, typing the wanted value after
/// the stored field. `None` means the two are not comparable.
fn compare_typed(stored: &Value, wanted: &Value) -> Option<Ordering> {
    match (stored, wanted) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Number(a), Value::String(b)) => a.as_f64()?.partial_cmp(&b.trim().parse::<f64>().ok()?),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::String(b)) => Some(a.cmp(&b.trim().parse::<bool>().ok()?)),
        (Value::String(a), Value::String(b)) => match (parse_instant(a), parse_instant(b)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(a.as_str().cmp(b.as_str())),
        },
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, Value::String(b)) if b == "null" => Some(Ordering::Equal),
        _ => None,
    }
}

fn type_rank(v: Option<&Value>) -> u8 {
    match v {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order for sorting; missing fields sort first.
fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(x @ (Value::Number(_) | Value::Bool(_) | Value::String(_))), Some(y))
            if type_rank(a) == type_rank(Some(y)) =>
        {
            compare_typed(x, y).unwrap_or(Ordering::Equal)
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn project(doc: &Value, fields: &[String]) -> Value {
    let mut out = Map::new();
    for path in fields {
        if let Some(value) = lookup(doc, path) {
            insert_path(&mut out, path, value.clone());
        }
    }
    Value::Object(out)
}

fn insert_path(out: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            out.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = out
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn tours() -> Vec<Value> {
        vec![
            json!({"id": "a", "name": "Alpha", "price": 497, "difficulty": "easy", "secret_tour": false,
                   "created_at": "2024-01-01T00:00:00Z", "start_location": {"address": "Miami"},
                   "guides": ["g1", "g2"], "start_dates": ["2021-04-25T09:00:00Z"]}),
            json!({"id": "b", "name": "Beta", "price": 997, "difficulty": "medium", "secret_tour": false,
                   "created_at": "2024-01-02T00:00:00Z", "start_location": {"address": "Aspen"},
                   "guides": ["g2"], "start_dates": ["2021-07-20T09:00:00Z"]}),
            json!({"id": "c", "name": "Gamma", "price": 1497, "difficulty": "difficult", "secret_tour": true,
                   "created_at": "2024-01-03T00:00:00.500Z", "start_location": {"address": "Banff"},
                   "guides": [], "start_dates": []}),
        ]
    }

    fn ids(out: &[Value]) -> Vec<&str> {
        out.iter().filter_map(|d| d["id"].as_str()).collect()
    }

    fn run(base: DocumentQuery, p: &[(&str, &str)]) -> Vec<Value> {
        ApiFeatures::new(base, &params(p))
            .filter()
            .sort()
            .limit_fields(&["id", "name", "price", "difficulty", "start_location", "created_at"])
            .paginate()
            .into_query()
            .execute(tours())
    }

    #[test]
    fn default_sort_is_newest_first() {
        assert_eq!(ids(&run(DocumentQuery::new(), &[])), ["c", "b", "a"]);
    }

    #[test]
    fn base_query_restricts_results() {
        let base = DocumentQuery::new().where_eq("secret_tour", false);
        assert_eq!(ids(&run(base, &[])), ["b", "a"]);
    }

    #[test]
    fn range_filters_compare_numerically() {
        let out = run(DocumentQuery::new(), &[("price[gte]", "900"), ("price[lt]", "1497")]);
        assert_eq!(ids(&out), ["b"]);
    }

    #[test]
    fn equality_is_typed_against_field() {
        assert_eq!(ids(&run(DocumentQuery::new(), &[("price", "497")])), ["a"]);
        assert_eq!(ids(&run(DocumentQuery::new(), &[("secretTour", "true")])), ["c"]);
        assert_eq!(ids(&run(DocumentQuery::new(), &[("difficulty", "medium")])), ["b"]);
    }

    #[test]
    fn array_field_matches_any_element() {
        let out = run(DocumentQuery::new(), &[("guides", "g2"), ("sort", "name")]);
        assert_eq!(ids(&out), ["a", "b"]);
    }

    #[test]
    fn date_range_on_array_field() {
        let out = run(DocumentQuery::new(), &[("startDates[gte]", "2021-06-01")]);
        assert_eq!(ids(&out), ["b"]);
    }

    #[test]
    fn dotted_path_filters_nested_field() {
        let out = run(DocumentQuery::new(), &[("start_location.address", "Aspen")]);
        assert_eq!(ids(&out), ["b"]);
    }

    #[test]
    fn unknown_suffix_is_literal_equality() {
        assert!(run(DocumentQuery::new(), &[("price[ne]", "497")]).is_empty());
    }

    #[test]
    fn multi_key_sort_with_direction() {
        let out = run(DocumentQuery::new(), &[("sort", "-secret_tour,price")]);
        assert_eq!(ids(&out), ["c", "a", "b"]);
    }

    #[test]
    fn fields_projection_keeps_id_and_drops_unknown() {
        let out = run(DocumentQuery::new(), &[("fields", "name,bogus"), ("sort", "price")]);
        assert_eq!(out[0], json!({"id": "a", "name": "Alpha"}));
    }

    #[test]
    fn no_valid_fields_returns_full_document() {
        let out = run(DocumentQuery::new(), &[("fields", "bogus"), ("sort", "price")]);
        assert_eq!(out[0]["difficulty"], "easy");
    }

    #[test]
    fn nested_projection() {
        let out = run(DocumentQuery::new(), &[("fields", "startLocation.address"), ("sort", "price")]);
        assert_eq!(out[0], json!({"id": "a", "start_location": {"address": "Miami"}}));
    }

    #[test]
    fn bad_pagination_values_fall_back() {
        let q = ApiFeatures::new(DocumentQuery::new(), &params(&[("page", "zero"), ("limit", "0")]))
            .paginate()
            .into_query();
        assert_eq!(q.skip, 0);
        assert_eq!(q.limit, Some(DEFAULT_LIMIT));
    }

    #[test]
    fn stages_apply_partially() {
        let q = ApiFeatures::new(DocumentQuery::new(), &params(&[("price", "1")]))
            .sort()
            .into_query();
        assert!(q.conditions.is_empty());
        assert_eq!(q.sort.len(), 1);
        assert!(q.limit.is_none());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn page_window_is_the_expected_slice(total in 0usize..60, page in 1usize..8, limit in 1usize..15) {
                let docs: Vec<Value> = (0..total).map(|i| json!({"id": i.to_string(), "n": i})).collect();
                let p = params(&[("sort", "n"), ("page", &page.to_string()), ("limit", &limit.to_string())]);
                let out = ApiFeatures::new(DocumentQuery::new(), &p)
                    .filter().sort().paginate().into_query().execute(docs);

                let start = (page - 1) * limit;
                let expected: Vec<u64> = (start..total.min(start + limit)).map(|i| i as u64).collect();
                let got: Vec<u64> = out.iter().filter_map(|d| d["n"].as_u64()).collect();
                prop_assert_eq!(got, expected);
            }
        }
    }
}

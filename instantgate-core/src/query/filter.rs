//! Query-string parsing into a typed query model.
//!
//! A request's query string is decoded into [`QueryParams`]: filters,
//! pagination, sorting and projection. Reserved keys (`limit`, `offset`,
//! `page`, `order`, `sort`, `fields`) are consumed as structure; every other
//! key is a candidate filter.
//!
//! A filter value of the form `OP.OPERAND` selects operator `OP` when `OP`
//! is one of the known operator tokens; anything else is an equality match
//! on the whole value. Operands are coerced in a fixed order: quoted string,
//! boolean, null, integer, float, RFC-3339 timestamp, `YYYY-MM-DD` date,
//! and finally plain string.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use url::form_urlencoded;

use crate::error::{GateError, Result};

/// Keys consumed as query structure rather than filters.
const RESERVED_KEYS: [&str; 6] = ["limit", "offset", "page", "order", "sort", "fields"];

/// Pagination bounds.
const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 1000;

/// Comparison operator of a single filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterOperator {
    #[serde(rename = "eq")]
    Eq,
    #[serde(rename = "ne")]
    Ne,
    #[serde(rename = "gt")]
    Gt,
    #[serde(rename = "gte")]
    Gte,
    #[serde(rename = "lt")]
    Lt,
    #[serde(rename = "lte")]
    Lte,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "nlike")]
    NotLike,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "nin")]
    NotIn,
}

impl FilterOperator {
    /// Parses an operator token; returns `None` for anything outside the set.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "like" => Some(Self::Like),
            "nlike" => Some(Self::NotLike),
            "in" => Some(Self::In),
            "nin" => Some(Self::NotIn),
            _ => None,
        }
    }

    /// True for operators that carry a list of values.
    pub fn is_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

/// A dynamically-typed value flowing through the query pipeline.
///
/// Filter operands and write-payload cells are carried as this sum type and
/// only bound to the driver at execution time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

impl ScalarValue {
    /// Coerces a raw operand string, first success wins.
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim();

        if let Some(inner) = strip_matching_quotes(value) {
            return Self::Text(inner.to_string());
        }

        match value.to_ascii_lowercase().as_str() {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            "null" => return Self::Null,
            _ => {}
        }

        if let Ok(int) = value.parse::<i64>() {
            return Self::Int(int);
        }
        if let Ok(float) = value.parse::<f64>() {
            return Self::Float(float);
        }
        if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
            return Self::DateTime(timestamp.with_timezone(&Utc));
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Self::Date(date);
        }

        Self::Text(value.to_string())
    }

    /// Converts a JSON payload cell for binding.
    ///
    /// Nested arrays and objects are carried as their JSON text so the
    /// engine can store them in JSON columns.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(int) = n.as_i64() {
                    Self::Int(int)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

/// Scalar or list operand of a filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterOperand {
    Scalar(ScalarValue),
    List(Vec<ScalarValue>),
}

/// One predicate derived from a query-string pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    pub operand: FilterOperand,
}

/// Clamped pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u64,
    pub page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            page: 0,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Requested ordering, not yet validated against the schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sorting {
    pub field: String,
    pub direction: SortDirection,
}

/// Everything the query string expressed about one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryParams {
    pub filters: Vec<Filter>,
    pub pagination: Pagination,
    pub sorting: Option<Sorting>,
    pub fields: Vec<String>,
}

/// Parses a URL-encoded query string into [`QueryParams`].
///
/// Reserved keys are matched case-insensitively and never treated as
/// filters. Duplicate filter keys keep their first occurrence. Malformed
/// pagination values silently fall back to defaults; malformed filter
/// values fail with [`GateError::InvalidFilter`].
pub fn parse_query(query: &str) -> Result<QueryParams> {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    let mut params = QueryParams::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (key, value) in &pairs {
        let key = key.to_ascii_lowercase();
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        if !seen.insert(key.clone()) {
            continue;
        }
        if let Some(filter) = parse_filter(&key, value)? {
            params.filters.push(filter);
        }
    }

    params.pagination = parse_pagination(&pairs);
    params.sorting = parse_sorting(&pairs);
    params.fields = parse_fields(&pairs);

    Ok(params)
}

/// Parses one key/value pair into a filter, or `None` for empty values.
fn parse_filter(field: &str, value: &str) -> Result<Option<Filter>> {
    if value.is_empty() {
        return Ok(None);
    }

    if let Some((token, operand)) = value.split_once('.') {
        if let Some(operator) = FilterOperator::from_token(&token.to_ascii_lowercase()) {
            if operator.is_list() {
                if operand.is_empty() {
                    return Err(GateError::invalid_filter(field, "empty list operand"));
                }
                let values = operand
                    .split(',')
                    .map(|element| ScalarValue::Text(unquote_element(element)))
                    .collect();
                return Ok(Some(Filter {
                    field: field.to_string(),
                    operator,
                    operand: FilterOperand::List(values),
                }));
            }

            return Ok(Some(Filter {
                field: field.to_string(),
                operator,
                operand: FilterOperand::Scalar(ScalarValue::parse(operand)),
            }));
        }
    }

    Ok(Some(Filter {
        field: field.to_string(),
        operator: FilterOperator::Eq,
        operand: FilterOperand::Scalar(ScalarValue::parse(value)),
    }))
}

/// Trims a list element and strips one matching pair of quotes.
fn unquote_element(element: &str) -> String {
    let trimmed = element.trim();
    strip_matching_quotes(trimmed)
        .unwrap_or(trimmed)
        .to_string()
}

/// Returns the inner text when the value is wrapped in matching quotes.
fn strip_matching_quotes(value: &str) -> Option<&str> {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return Some(&value[1..value.len() - 1]);
        }
    }
    None
}

fn first_value<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn parse_pagination(pairs: &[(String, String)]) -> Pagination {
    let mut pagination = Pagination::default();

    if let Some(raw) = first_value(pairs, "limit") {
        if let Ok(limit) = raw.parse::<i64>() {
            if limit > 0 {
                pagination.limit = (limit as u64).min(u64::from(MAX_LIMIT)) as u32;
            }
        }
    }

    if let Some(raw) = first_value(pairs, "offset") {
        if let Ok(offset) = raw.parse::<i64>() {
            if offset >= 0 {
                pagination.offset = offset as u64;
            }
        }
    }

    if let Some(raw) = first_value(pairs, "page") {
        if let Ok(page) = raw.parse::<i64>() {
            if page > 0 {
                let page = page.min(i64::from(u32::MAX)) as u32;
                pagination.page = page;
                pagination.offset = u64::from(page - 1) * u64::from(pagination.limit);
            }
        }
    }

    pagination
}

fn parse_sorting(pairs: &[(String, String)]) -> Option<Sorting> {
    let raw = first_value(pairs, "order")
        .filter(|value| !value.is_empty())
        .or_else(|| first_value(pairs, "sort").filter(|value| !value.is_empty()))?;

    let (field, suffix) = match raw.split_once('.') {
        Some((field, suffix)) => (field, Some(suffix)),
        None => (raw, None),
    };

    let direction = match suffix.map(str::to_ascii_lowercase).as_deref() {
        Some("desc") | Some("d") | Some("-") => SortDirection::Desc,
        _ => SortDirection::Asc,
    };

    Some(Sorting {
        field: field.to_string(),
        direction,
    })
}

fn parse_fields(pairs: &[(String, String)]) -> Vec<String> {
    let Some(raw) = first_value(pairs, "fields") else {
        return Vec::new();
    };

    raw.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}

//! Filter, sort and pagination requests and their compilation
//!
//! A [`FilterRequest`] arrives as untrusted JSON. [`QueryEngine::build`]
//! checks every referenced field against the resource's static [`FieldSet`],
//! coerces every filter value to the field's kind and produces a
//! [`CompiledQuery`] that any [`RecordStore`](crate::core::store::RecordStore)
//! can evaluate. Nothing touches a store before compilation succeeds.
//!
//! # Wire format
//!
//! ```json
//! {
//!     "query": [["mail", "==", "a@b.c"], ["created", ">=", "2024-01-01T00:00:00Z"]],
//!     "sort": [["created", "desc"]],
//!     "page": 0,
//!     "items_per_page": 10
//! }
//! ```
//!
//! All `query` terms are AND-combined. There is no OR or grouping: callers
//! that need a disjunction issue one request per branch.

use crate::core::entity::Record;
use crate::core::error::QueryError;
use crate::core::field::{FieldDescriptor, FieldKind, FieldSet, FieldValue};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Default page size when the request omits `items_per_page`
pub const DEFAULT_ITEMS_PER_PAGE: i64 = 10;

/// Comparison operator of a filter term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "==", alias = "eq")]
    Eq,
    #[serde(rename = "!=", alias = "neq")]
    Neq,
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = "<=", alias = "lte")]
    Lte,
    #[serde(rename = "contains")]
    Contains,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            FilterOperator::Eq => "==",
            FilterOperator::Neq => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
            FilterOperator::Contains => "contains",
        };
        f.write_str(symbol)
    }
}

/// Sort direction of a sort term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// `[field, operator, value]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterTerm(pub String, pub FilterOperator, pub Value);

/// `[field, direction]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortTerm(pub String, pub SortDirection);

/// Declarative search request accepted by every `/_filter` endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRequest {
    /// Conjunction of filter terms
    #[serde(default)]
    pub query: Vec<FilterTerm>,

    /// Sort keys, primary first
    #[serde(default)]
    pub sort: Vec<SortTerm>,

    /// Zero-based page index (defaults to 0)
    #[serde(default)]
    pub page: Option<i64>,

    /// Page size (defaults to 10)
    #[serde(default)]
    pub items_per_page: Option<i64>,
}

impl FilterRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter term
    pub fn filter(mut self, field: &str, operator: FilterOperator, value: Value) -> Self {
        self.query.push(FilterTerm(field.to_string(), operator, value));
        self
    }

    /// Add a sort term
    pub fn sort_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort.push(SortTerm(field.to_string(), direction));
        self
    }

    /// Select a page window
    pub fn page(mut self, page: i64, items_per_page: i64) -> Self {
        self.page = Some(page);
        self.items_per_page = Some(items_per_page);
        self
    }
}

/// One compiled comparison
#[derive(Debug, Clone)]
pub struct Predicate {
    pub field: &'static FieldDescriptor,
    pub operator: FilterOperator,
    pub value: FieldValue,
}

impl Predicate {
    /// Evaluate against a record.
    ///
    /// Follows SQL semantics for absent values: a null attribute only
    /// matches `== null`, and `!= null` matches every present attribute.
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        let actual = record
            .field_value(self.field.name)
            .unwrap_or(FieldValue::Null);

        if self.value.is_null() {
            return match self.operator {
                FilterOperator::Eq => actual.is_null(),
                FilterOperator::Neq => !actual.is_null(),
                _ => false,
            };
        }
        if actual.is_null() {
            return false;
        }

        let ordering = actual.total_cmp(&self.value);
        match self.operator {
            FilterOperator::Eq => ordering == Ordering::Equal,
            FilterOperator::Neq => ordering != Ordering::Equal,
            FilterOperator::Gt => ordering == Ordering::Greater,
            FilterOperator::Gte => ordering != Ordering::Less,
            FilterOperator::Lt => ordering == Ordering::Less,
            FilterOperator::Lte => ordering != Ordering::Greater,
            FilterOperator::Contains => match (actual.as_text(), self.value.as_text()) {
                (Some(haystack), Some(needle)) => haystack
                    .to_lowercase()
                    .contains(&needle.to_lowercase()),
                _ => false,
            },
        }
    }
}

/// One compiled sort key
#[derive(Debug, Clone)]
pub struct OrderKey {
    pub field: &'static FieldDescriptor,
    pub direction: SortDirection,
}

/// Offset/limit window applied to the fetch only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: usize,
    pub limit: usize,
}

impl PageWindow {
    /// Restrict an already ordered sequence to this window
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

/// Validated, store-executable form of a [`FilterRequest`]
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub resource: &'static str,
    pub predicates: Vec<Predicate>,
    pub ordering: Vec<OrderKey>,
    pub window: PageWindow,
}

impl CompiledQuery {
    /// Whether a record satisfies every predicate
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    /// Total order: requested keys left to right, then id ascending
    pub fn compare<R: Record>(&self, a: &R, b: &R) -> Ordering {
        for key in &self.ordering {
            let left = a.field_value(key.field.name).unwrap_or(FieldValue::Null);
            let right = b.field_value(key.field.name).unwrap_or(FieldValue::Null);
            let ordering = match key.direction {
                SortDirection::Asc => left.total_cmp(&right),
                SortDirection::Desc => right.total_cmp(&left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.id().cmp(&b.id())
    }

    /// Filter, order and window an in-memory collection.
    ///
    /// Returns the unpaginated match count alongside the page.
    pub fn evaluate<'a, R: Record>(
        &self,
        records: impl IntoIterator<Item = &'a R>,
    ) -> (u64, Vec<R>) {
        let mut matched: Vec<&R> = records.into_iter().filter(|r| self.matches(*r)).collect();
        let total = matched.len() as u64;
        matched.sort_by(|a, b| self.compare(*a, *b));
        let page = self.window.apply(matched.into_iter().cloned());
        (total, page)
    }
}

/// Compiles filter requests against a resource field registry
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine {
    max_items_per_page: i64,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(100)
    }
}

impl QueryEngine {
    pub fn new(max_items_per_page: u32) -> Self {
        Self {
            max_items_per_page: i64::from(max_items_per_page.max(1)),
        }
    }

    /// Validate and translate a request.
    ///
    /// Fails with `InvalidField`, `UnsupportedOperator`, `InvalidValue` or
    /// `InvalidPageWindow`; never touches a store.
    pub fn build(
        &self,
        fields: &'static FieldSet,
        request: &FilterRequest,
    ) -> Result<CompiledQuery, QueryError> {
        let predicates = request
            .query
            .iter()
            .map(|term| compile_term(fields, term))
            .collect::<Result<Vec<_>, _>>()?;

        let ordering = request
            .sort
            .iter()
            .map(|SortTerm(name, direction)| {
                Ok(OrderKey {
                    field: lookup(fields, name)?,
                    direction: *direction,
                })
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        let window = self.window(request)?;

        tracing::debug!(
            resource = fields.resource(),
            predicates = predicates.len(),
            sort_keys = ordering.len(),
            offset = window.offset,
            limit = window.limit,
            "compiled filter request"
        );

        Ok(CompiledQuery {
            resource: fields.resource(),
            predicates,
            ordering,
            window,
        })
    }

    fn window(&self, request: &FilterRequest) -> Result<PageWindow, QueryError> {
        let page = request.page.unwrap_or(0);
        let items_per_page = request.items_per_page.unwrap_or(DEFAULT_ITEMS_PER_PAGE);

        if page < 0 {
            return Err(QueryError::InvalidPageWindow {
                message: format!("page must be >= 0, got {}", page),
            });
        }
        if items_per_page <= 0 {
            return Err(QueryError::InvalidPageWindow {
                message: format!("items_per_page must be > 0, got {}", items_per_page),
            });
        }
        if items_per_page > self.max_items_per_page {
            return Err(QueryError::InvalidPageWindow {
                message: format!(
                    "items_per_page must be <= {}, got {}",
                    self.max_items_per_page, items_per_page
                ),
            });
        }

        let offset = page
            .checked_mul(items_per_page)
            .and_then(|o| usize::try_from(o).ok())
            .ok_or_else(|| QueryError::InvalidPageWindow {
                message: format!("page {} is out of range", page),
            })?;

        Ok(PageWindow {
            offset,
            limit: items_per_page as usize,
        })
    }
}

fn lookup(fields: &'static FieldSet, name: &str) -> Result<&'static FieldDescriptor, QueryError> {
    fields.lookup(name).ok_or_else(|| QueryError::InvalidField {
        resource: fields.resource().to_string(),
        field: name.to_string(),
    })
}

fn compile_term(fields: &'static FieldSet, term: &FilterTerm) -> Result<Predicate, QueryError> {
    let FilterTerm(name, operator, raw) = term;
    let field = lookup(fields, name)?;

    if *operator == FilterOperator::Contains && !field.kind.is_text() {
        return Err(QueryError::UnsupportedOperator {
            field: name.clone(),
            operator: operator.to_string(),
        });
    }

    let value = coerce(field, *operator, raw)?;
    Ok(Predicate {
        field,
        operator: *operator,
        value,
    })
}

fn coerce(
    field: &FieldDescriptor,
    operator: FilterOperator,
    raw: &Value,
) -> Result<FieldValue, QueryError> {
    let invalid = |message: String| QueryError::InvalidValue {
        field: field.name.to_string(),
        message,
    };

    if raw.is_null() {
        return match operator {
            FilterOperator::Eq | FilterOperator::Neq if field.nullable => Ok(FieldValue::Null),
            FilterOperator::Eq | FilterOperator::Neq => {
                Err(invalid("field is never null".to_string()))
            }
            _ => Err(invalid(format!("null cannot be used with '{}'", operator))),
        };
    }

    match field.kind {
        FieldKind::Integer => raw
            .as_i64()
            .map(FieldValue::Integer)
            .ok_or_else(|| invalid(format!("expected an integer, got {}", raw))),
        FieldKind::Float => raw
            .as_f64()
            .map(FieldValue::Float)
            .ok_or_else(|| invalid(format!("expected a number, got {}", raw))),
        FieldKind::Boolean => raw
            .as_bool()
            .map(FieldValue::Boolean)
            .ok_or_else(|| invalid(format!("expected a boolean, got {}", raw))),
        FieldKind::Text => raw
            .as_str()
            .map(|s| FieldValue::Text(s.to_string()))
            .ok_or_else(|| invalid(format!("expected a string, got {}", raw))),
        FieldKind::DateTime => raw
            .as_str()
            .and_then(parse_datetime)
            .map(FieldValue::DateTime)
            .ok_or_else(|| invalid(format!("expected an RFC 3339 timestamp, got {}", raw))),
    }
}

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` read as UTC
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Response of every `/_filter` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterResponse<T> {
    /// Size of the full filtered set, independent of the page window
    pub total_count: u64,
    pub items: Vec<T>,
}

impl<T> FilterResponse<T> {
    pub fn new(total_count: u64, items: Vec<T>) -> Self {
        Self { total_count, items }
    }
}

//! Query filters, sort options and index models
//!
//! Filters use the document-store dialect: `{"status": "queued"}` for equality,
//! `{"fetched": {"$ne": true}}` for operators, dotted keys for nested fields.
//! Every collection backend evaluates the same grammar.

use std::cmp::Ordering;

use serde_json::Value;

use super::document::{Document, get_path};
use super::errors::{StoreError, StoreResult};

/// A single per-field condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Exists(bool),
    In(Vec<Value>),
}

impl Condition {
    fn parse(path: &str, value: &Value) -> StoreResult<Vec<Self>> {
        let Value::Object(operators) = value else {
            return Ok(vec![Self::Eq(value.clone())]);
        };
        if !operators.keys().any(|key| key.starts_with('$')) {
            return Ok(vec![Self::Eq(value.clone())]);
        }

        operators
            .iter()
            .map(|(operator, operand)| match operator.as_str() {
                "$eq" => Ok(Self::Eq(operand.clone())),
                "$ne" => Ok(Self::Ne(operand.clone())),
                "$exists" => operand.as_bool().map(Self::Exists).ok_or_else(|| {
                    StoreError::unsupported_filter(format!("`$exists` on `{path}` expects a boolean"))
                }),
                "$in" => operand.as_array().map(|values| Self::In(values.clone())).ok_or_else(|| {
                    StoreError::unsupported_filter(format!("`$in` on `{path}` expects an array"))
                }),
                other => Err(StoreError::unsupported_filter(format!(
                    "operator `{other}` on `{path}`"
                ))),
            })
            .collect()
    }

    /// Evaluate against the value found at the condition's path.
    pub fn matches(&self, found: Option<&Value>) -> bool {
        match self {
            Self::Eq(expected) => values_equal(found, expected),
            Self::Ne(expected) => !values_equal(found, expected),
            Self::Exists(should_exist) => found.is_some() == *should_exist,
            Self::In(candidates) => candidates.iter().any(|candidate| values_equal(found, candidate)),
        }
    }
}

/// Conjunction of `(path, condition)` clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a filter document.
    pub fn from_document(document: &Document) -> StoreResult<Self> {
        let mut filter = Self::new();
        for (path, value) in document {
            if path.starts_with('$') {
                return Err(StoreError::unsupported_filter(format!("top-level operator `{path}`")));
            }
            for condition in Condition::parse(path, value)? {
                filter.clauses.push((path.clone(), condition));
            }
        }
        Ok(filter)
    }

    #[must_use]
    pub fn equals(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(path, Condition::Eq(value.into()))
    }

    #[must_use]
    pub fn exists(self, path: impl Into<String>) -> Self {
        self.with(path, Condition::Exists(true))
    }

    #[must_use]
    pub fn with(mut self, path: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push((path.into(), condition));
        self
    }

    /// Conjoin another filter; clauses of both must hold.
    #[must_use]
    pub fn and(mut self, other: Self) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(path, condition)| condition.matches(get_path(document, path)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Options for `find_one`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Vec<(String, SortOrder)>,
}

impl FindOptions {
    pub fn sorted_by(path: impl Into<String>, order: SortOrder) -> Self {
        Self { sort: vec![(path.into(), order)] }
    }

    /// Compare two documents under the configured sort keys.
    pub fn compare(&self, left: &Document, right: &Document) -> Ordering {
        self.sort
            .iter()
            .map(|(path, order)| {
                let ordering = compare_values(get_path(left, path), get_path(right, path));
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Ascending,
    Descending,
    Hashed,
}

impl IndexKind {
    fn suffix(self) -> &'static str {
        match self {
            Self::Ascending => "1",
            Self::Descending => "-1",
            Self::Hashed => "hashed",
        }
    }
}

/// Index definition handed to `create_indexes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexModel {
    pub keys: Vec<(String, IndexKind)>,
}

impl IndexModel {
    pub fn new(keys: &[(&str, IndexKind)]) -> Self {
        Self {
            keys: keys.iter().map(|(path, kind)| ((*path).to_string(), *kind)).collect(),
        }
    }

    /// Conventional name: `field_1_other_-1`, `url_hashed`.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(path, kind)| format!("{path}_{}", kind.suffix()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order across JSON values: missing/null < numbers < strings < objects
/// < arrays < booleans.
pub fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Array(a)), Some(Value::Array(b))) => a
            .iter()
            .zip(b)
            .map(|(x, y)| compare_values(Some(x), Some(y)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            serde_json::to_string(a).unwrap_or_default().cmp(&serde_json::to_string(b).unwrap_or_default())
        }
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

/// Equality as the filter grammar defines it; `null` also matches a missing field.
pub fn values_equal(found: Option<&Value>, expected: &Value) -> bool {
    match (found, expected) {
        (None | Some(Value::Null), Value::Null) => true,
        (None, _) => false,
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(found), expected) => found == expected,
    }
}

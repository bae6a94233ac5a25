//! Structured predicate tree for source-system queries.
//!
//! The tree is transport-neutral; adapters encode it into whatever notation
//! their remote API expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comparison operator of a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    /// Case-insensitive substring match.
    ILike,
}

/// Right-hand side of a leaf condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Ints(Vec<i64>),
    Bools(Vec<bool>),
    Texts(Vec<String>),
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<i64>> for FilterValue {
    fn from(v: Vec<i64>) -> Self {
        Self::Ints(v)
    }
}

/// A single `field op value` test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

/// Predicate tree over source records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordFilter {
    /// Matches every record.
    #[default]
    All,
    Condition(Condition),
    And(Vec<RecordFilter>),
    Or(Vec<RecordFilter>),
    Not(Box<RecordFilter>),
}

impl RecordFilter {
    pub fn condition(field: &str, op: FilterOp, value: impl Into<FilterValue>) -> Self {
        Self::Condition(Condition { field: field.to_string(), op, value: value.into() })
    }

    pub fn eq(field: &str, value: impl Into<FilterValue>) -> Self {
        Self::condition(field, FilterOp::Eq, value)
    }

    pub fn ge(field: &str, value: impl Into<FilterValue>) -> Self {
        Self::condition(field, FilterOp::Ge, value)
    }

    pub fn is_in(field: &str, value: impl Into<FilterValue>) -> Self {
        Self::condition(field, FilterOp::In, value)
    }

    /// Records modified at or after `since`.
    pub fn modified_since(since: DateTime<Utc>) -> Self {
        Self::ge("write_date", since.format("%Y-%m-%d %H:%M:%S").to_string())
    }

    /// Matches both active and archived records. Sources hide archived rows
    /// unless `active` is constrained explicitly.
    pub fn including_archived() -> Self {
        Self::condition("active", FilterOp::In, FilterValue::Bools(vec![true, false]))
    }

    /// Conjunction that drops `All` operands and flattens nested `And`s.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        let mut parts = Vec::new();
        for part in [self, other] {
            match part {
                Self::All => {}
                Self::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Self::All,
            1 => parts.pop().unwrap_or_default(),
            _ => Self::And(parts),
        }
    }

    /// Negation.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Number of leaf conditions.
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::All => 0,
            Self::Condition(_) => 1,
            Self::And(parts) | Self::Or(parts) => parts.iter().map(Self::leaf_count).sum(),
            Self::Not(inner) => inner.leaf_count(),
        }
    }
}

//! Business records as read from the source system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Many-to-one reference resolved to its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

impl NamedRef {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// Pipeline position of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    #[default]
    Lead,
    Opportunity,
}

impl RecordType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Opportunity => "opportunity",
        }
    }
}

/// One lead/opportunity from the source system.
///
/// Absent optional fields are `None`; the source's own "false means empty"
/// convention is resolved by the adapter before a record gets here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub record_type: RecordType,
    #[serde(default = "default_active")]
    pub active: bool,
    pub contact_name: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub stage: Option<NamedRef>,
    pub team: Option<NamedRef>,
    pub salesperson: Option<NamedRef>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    pub expected_revenue: Option<f64>,
    pub probability: Option<f64>,
    /// Star rating, 0 to 3.
    pub priority: Option<u8>,
    pub city: Option<String>,
    pub country: Option<NamedRef>,
    /// Free-text notes, may contain HTML markup.
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}

impl SourceRecord {
    /// Minimal record, mostly useful for tests and fixtures.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            record_type: RecordType::Lead,
            active: true,
            contact_name: None,
            company_name: None,
            email: None,
            phone: None,
            stage: None,
            team: None,
            salesperson: None,
            tag_ids: Vec::new(),
            expected_revenue: None,
            probability: None,
            priority: None,
            city: None,
            country: None,
            description: None,
            created_at: None,
            updated_at: None,
        }
    }
}

//! Vector index records, payload schema and search types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{RecordType, SourceRecord};

/// Embedding input role; some providers embed queries and documents
/// asymmetrically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Document,
    Query,
}

/// Similarity metric of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

/// Payload stored next to each vector.
///
/// Every key the index knows about is a named field here; an absent value is
/// `None` and is omitted from the stored payload. Filters address fields by
/// the serialized names returned from [`RecordPayload::field`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RecordPayload {
    pub source_id: i64,
    pub name: String,
    pub record_type: RecordType,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salesperson_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salesperson_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_revenue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// `created_at` as epoch seconds, for range filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_epoch: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Text the vector was computed from.
    pub content: String,
    pub sync_version: u64,
    pub synced_at: DateTime<Utc>,
}

/// Scalar view of one payload field, used by filter evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue<'a> {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(&'a str),
    Ints(&'a [i64]),
}

impl RecordPayload {
    /// Denormalizes `record` into a payload.
    pub fn from_record(
        record: &SourceRecord,
        content: String,
        sync_version: u64,
        synced_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: record.id,
            name: record.name.clone(),
            record_type: record.record_type,
            active: record.active,
            contact_name: record.contact_name.clone(),
            company_name: record.company_name.clone(),
            email: record.email.clone(),
            phone: record.phone.clone(),
            stage_id: record.stage.as_ref().map(|r| r.id),
            stage_name: record.stage.as_ref().map(|r| r.name.clone()),
            team_id: record.team.as_ref().map(|r| r.id),
            team_name: record.team.as_ref().map(|r| r.name.clone()),
            salesperson_id: record.salesperson.as_ref().map(|r| r.id),
            salesperson_name: record.salesperson.as_ref().map(|r| r.name.clone()),
            tag_ids: record.tag_ids.clone(),
            expected_revenue: record.expected_revenue,
            probability: record.probability,
            priority: record.priority,
            city: record.city.clone(),
            country_name: record.country.as_ref().map(|r| r.name.clone()),
            created_at: record.created_at,
            created_epoch: record.created_at.map(|t| t.timestamp()),
            updated_at: record.updated_at,
            content,
            sync_version,
            synced_at,
        }
    }

    /// Looks up a filterable field by its serialized name.
    pub fn field(&self, key: &str) -> Option<PayloadValue<'_>> {
        match key {
            "source_id" => Some(PayloadValue::Int(self.source_id)),
            "name" => Some(PayloadValue::Text(&self.name)),
            "record_type" => Some(PayloadValue::Text(self.record_type.as_str())),
            "active" => Some(PayloadValue::Bool(self.active)),
            "company_name" => self.company_name.as_deref().map(PayloadValue::Text),
            "stage_id" => self.stage_id.map(PayloadValue::Int),
            "team_id" => self.team_id.map(PayloadValue::Int),
            "salesperson_id" => self.salesperson_id.map(PayloadValue::Int),
            "tag_ids" => Some(PayloadValue::Ints(&self.tag_ids)),
            "expected_revenue" => self.expected_revenue.map(PayloadValue::Float),
            "probability" => self.probability.map(PayloadValue::Float),
            "priority" => self.priority.map(|p| PayloadValue::Int(i64::from(p))),
            "city" => self.city.as_deref().map(PayloadValue::Text),
            "created_epoch" => self.created_epoch.map(PayloadValue::Int),
            "sync_version" => {
                Some(PayloadValue::Int(i64::try_from(self.sync_version).unwrap_or(i64::MAX)))
            }
            _ => None,
        }
    }
}

/// One point in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Stable external identifier derived from the source id.
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordPayload,
}

impl VectorRecord {
    /// Identifier for the vector of source record `source_id`.
    pub fn id_for(source_id: i64) -> String {
        format!("lead-{source_id}")
    }

    pub fn new(values: Vec<f32>, metadata: RecordPayload) -> Self {
        Self { id: Self::id_for(metadata.source_id), values, metadata }
    }
}

/// Ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub payload: Option<RecordPayload>,
}

/// Collection statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub status: String,
    pub points_count: u64,
    pub indexed_vectors_count: u64,
    pub segments_count: u64,
    pub dimensions: usize,
}

/// Graph index parameters for collection creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    pub m: u32,
    pub ef_construct: u32,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self { m: 16, ef_construct: 100 }
    }
}

/// Collection definition passed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub dimensions: usize,
    pub distance: Distance,
    pub index: IndexParams,
}

//==============================================================================
// Filters
//==============================================================================

/// Scalar used in exact-match conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

/// One store-side condition on a payload field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldCondition {
    /// Field equals the value.
    Match { key: String, value: MatchValue },
    /// Field equals any of the values; for array fields, any element does.
    MatchAny { key: String, values: Vec<MatchValue> },
    /// Numeric field within bounds, both inclusive.
    Range { key: String, gte: Option<f64>, lte: Option<f64> },
}

impl FieldCondition {
    pub fn key(&self) -> &str {
        match self {
            Self::Match { key, .. } | Self::MatchAny { key, .. } | Self::Range { key, .. } => key,
        }
    }
}

/// Conjunctive store filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VectorFilter {
    pub must: Vec<FieldCondition>,
    pub must_not: Vec<FieldCondition>,
}

impl VectorFilter {
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.must_not.is_empty()
    }
}

/// Caller-facing search constraints over denormalized record fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RecordQuery {
    pub stage_ids: Vec<i64>,
    pub team_ids: Vec<i64>,
    pub salesperson_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
    pub record_type: Option<RecordType>,
    pub active: Option<bool>,
    pub exclude_stage_ids: Vec<i64>,
    pub min_expected_revenue: Option<f64>,
    pub max_expected_revenue: Option<f64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// Similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub score_threshold: Option<f32>,
    #[serde(default)]
    pub query: RecordQuery,
}

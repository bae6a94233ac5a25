//! Wire conventions of the source system's JSON-RPC API.
//!
//! Two quirks shape everything here:
//! - empty scalar and many-to-one fields come back as `false`, not `null`
//! - filters are flat lists in prefix (Polish) notation, e.g.
//!   `["&", ["active", "=", true], ["stage_id", "in", [1, 2]]]`

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{json, Value};
use vectorsync_domain::{
    FilterOp, NamedRef, RecordFilter, RecordType, Result, Salesperson, SourceRecord, Stage, Tag,
    Team, VectorSyncError,
};

/// Timestamp layout used by the source for datetime fields.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fields read for every synced record.
pub const RECORD_FIELDS: &[&str] = &[
    "id",
    "name",
    "type",
    "active",
    "contact_name",
    "partner_name",
    "email_from",
    "phone",
    "stage_id",
    "team_id",
    "user_id",
    "tag_ids",
    "expected_revenue",
    "probability",
    "priority",
    "city",
    "country_id",
    "description",
    "create_date",
    "write_date",
];

pub const STAGE_FIELDS: &[&str] = &["id", "name", "sequence", "is_won"];
pub const TEAM_FIELDS: &[&str] = &["id", "name", "active"];
pub const SALESPERSON_FIELDS: &[&str] = &["id", "name", "login"];
pub const TAG_FIELDS: &[&str] = &["id", "name"];

//==============================================================================
// Filter encoding
//==============================================================================

/// Encode a filter tree into the source's prefix-notation domain list.
pub fn encode_filter(filter: &RecordFilter) -> Value {
    let mut out = Vec::new();
    push_filter(filter, &mut out);
    Value::Array(out)
}

fn push_filter(filter: &RecordFilter, out: &mut Vec<Value>) {
    match filter {
        RecordFilter::All => {}
        RecordFilter::Condition(cond) => {
            out.push(json!([cond.field, op_symbol(cond.op), cond.value]));
        }
        RecordFilter::And(parts) => push_nary("&", parts, out),
        RecordFilter::Or(parts) => push_nary("|", parts, out),
        RecordFilter::Not(inner) => {
            if matches!(**inner, RecordFilter::All) {
                // NOT(everything) matches nothing.
                out.push(json!(["id", "=", 0]));
            } else {
                out.push(json!("!"));
                push_filter(inner, out);
            }
        }
    }
}

fn push_nary(operator: &str, parts: &[RecordFilter], out: &mut Vec<Value>) {
    let parts: Vec<&RecordFilter> =
        parts.iter().filter(|p| !matches!(p, RecordFilter::All)).collect();
    for _ in 1..parts.len() {
        out.push(json!(operator));
    }
    for part in parts {
        push_filter(part, out);
    }
}

const fn op_symbol(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => "=",
        FilterOp::Ne => "!=",
        FilterOp::Gt => ">",
        FilterOp::Ge => ">=",
        FilterOp::Lt => "<",
        FilterOp::Le => "<=",
        FilterOp::In => "in",
        FilterOp::NotIn => "not in",
        FilterOp::ILike => "ilike",
    }
}

//==============================================================================
// Field decoding
//==============================================================================

fn text(row: &Value, key: &str) -> Option<String> {
    match row.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn many2one(row: &Value, key: &str) -> Option<NamedRef> {
    let pair = row.get(key)?.as_array()?;
    let id = pair.first()?.as_i64()?;
    let name = pair.get(1).and_then(Value::as_str).unwrap_or_default();
    Some(NamedRef::new(id, name))
}

fn ids(row: &Value, key: &str) -> Vec<i64> {
    row.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

fn float(row: &Value, key: &str) -> Option<f64> {
    row.get(key).and_then(Value::as_f64)
}

fn boolean(row: &Value, key: &str, default: bool) -> bool {
    row.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn timestamp(row: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = row.get(key)?.as_str()?;
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT).ok().map(|naive| naive.and_utc())
}

fn require_id(row: &Value) -> Result<i64> {
    row.get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| VectorSyncError::Remote(format!("row without integer id: {row}")))
}

/// Decode one `search_read` row into a record.
pub fn decode_record(row: &Value) -> Result<SourceRecord> {
    let id = require_id(row)?;
    let record_type = match row.get("type").and_then(Value::as_str) {
        Some("opportunity") => RecordType::Opportunity,
        _ => RecordType::Lead,
    };
    let priority = match row.get("priority") {
        Some(Value::String(p)) => p.parse::<u8>().ok(),
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        _ => None,
    };

    Ok(SourceRecord {
        id,
        name: text(row, "name").unwrap_or_default(),
        record_type,
        active: boolean(row, "active", true),
        contact_name: text(row, "contact_name"),
        company_name: text(row, "partner_name"),
        email: text(row, "email_from"),
        phone: text(row, "phone"),
        stage: many2one(row, "stage_id"),
        team: many2one(row, "team_id"),
        salesperson: many2one(row, "user_id"),
        tag_ids: ids(row, "tag_ids"),
        expected_revenue: float(row, "expected_revenue"),
        probability: float(row, "probability"),
        priority,
        city: text(row, "city"),
        country: many2one(row, "country_id"),
        description: text(row, "description"),
        created_at: timestamp(row, "create_date"),
        updated_at: timestamp(row, "write_date"),
    })
}

pub fn decode_stage(row: &Value) -> Result<Stage> {
    Ok(Stage {
        id: require_id(row)?,
        name: text(row, "name").unwrap_or_default(),
        sequence: row
            .get("sequence")
            .and_then(Value::as_i64)
            .and_then(|s| i32::try_from(s).ok())
            .unwrap_or_default(),
        is_won: boolean(row, "is_won", false),
    })
}

pub fn decode_team(row: &Value) -> Result<Team> {
    Ok(Team {
        id: require_id(row)?,
        name: text(row, "name").unwrap_or_default(),
        active: boolean(row, "active", true),
    })
}

pub fn decode_salesperson(row: &Value) -> Result<Salesperson> {
    Ok(Salesperson {
        id: require_id(row)?,
        name: text(row, "name").unwrap_or_default(),
        login: text(row, "login"),
    })
}

pub fn decode_tag(row: &Value) -> Result<Tag> {
    Ok(Tag { id: require_id(row)?, name: text(row, "name").unwrap_or_default() })
}

/// Decode every row with `decode`, failing on the first malformed row.
pub fn decode_rows<T>(rows: &[Value], decode: fn(&Value) -> Result<T>) -> Result<Vec<T>> {
    rows.iter().map(decode).collect()
}

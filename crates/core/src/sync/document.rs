//! Embedding text and vector record construction.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use vectorsync_domain::{RecordPayload, RecordType, SourceRecord, VectorRecord};

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?s)<[^>]*>").unwrap()
});
static SPACE_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\s+").unwrap()
});

/// Removes markup and entities from rich-text notes and collapses
/// whitespace.
pub fn strip_markup(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    SPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Text embedded for `record`: one labelled line per populated field.
pub fn build_embedding_text(record: &SourceRecord) -> String {
    let mut text = String::new();
    let label = match record.record_type {
        RecordType::Lead => "Lead",
        RecordType::Opportunity => "Opportunity",
    };
    let _ = writeln!(text, "{label}: {}", record.name.trim());

    let mut line = |name: &str, value: Option<&str>| {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            let _ = writeln!(text, "{name}: {value}");
        }
    };
    line("Company", record.company_name.as_deref());
    line("Contact", record.contact_name.as_deref());
    line("Email", record.email.as_deref());
    line("Phone", record.phone.as_deref());
    line("Stage", record.stage.as_ref().map(|r| r.name.as_str()));
    line("Team", record.team.as_ref().map(|r| r.name.as_str()));
    line("Salesperson", record.salesperson.as_ref().map(|r| r.name.as_str()));

    let location = [record.city.as_deref(), record.country.as_ref().map(|c| c.name.as_str())]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    line("Location", Some(location.as_str()));

    if let Some(revenue) = record.expected_revenue.filter(|r| *r > 0.0) {
        let _ = match record.probability {
            Some(p) => writeln!(text, "Expected revenue: {revenue:.2} ({p:.0}% probability)"),
            None => writeln!(text, "Expected revenue: {revenue:.2}"),
        };
    }

    if let Some(notes) = record.description.as_deref().map(strip_markup).filter(|n| !n.is_empty()) {
        let _ = writeln!(text, "Notes: {notes}");
    }

    text.trim_end().to_string()
}

/// Pairs a record with its vector and denormalized payload.
pub fn build_vector_record(
    record: &SourceRecord,
    text: String,
    values: Vec<f32>,
    sync_version: u64,
    synced_at: DateTime<Utc>,
) -> VectorRecord {
    VectorRecord::new(values, RecordPayload::from_record(record, text, sync_version, synced_at))
}

//! Fact record model shared by the API client, the favorites registry and
//! the favorites view.
//!
//! `created_at` stays a raw string on the wire so records round-trip exactly
//! as the API or the persisted blob wrote them. Ordering goes through
//! [`parse_timestamp`], which accepts the shapes the API and older blobs use.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// A single fact, either fetched from the API or owned by the favorites registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactRecord {
    /// Externally assigned identifier, unique per fact.
    pub id: String,
    /// Fact body.
    pub text: String,
    /// Optional attribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// ISO-8601 timestamp. Overwritten with the favoriting instant by the registry.
    /// Missing on some API responses; an empty value sorts as undated.
    #[serde(default)]
    pub created_at: String,
}

impl FactRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), source: None, created_at: created_at.into() }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Parsed `created_at`, or `None` when it is not a recognizable timestamp.
    #[must_use]
    pub fn created_instant(&self) -> Option<OffsetDateTime> {
        parse_timestamp(&self.created_at)
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 date-times, date-times without an offset (read as UTC)
/// and bare calendar dates (midnight UTC).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }
    let naive_with_fraction = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    let naive = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let naive_minutes = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    for format in [naive_with_fraction, naive, naive_minutes] {
        if let Ok(parsed) = PrimitiveDateTime::parse(raw, format) {
            return Some(parsed.assume_utc());
        }
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

/// Format an instant the way the registry stamps `created_at`.
#[must_use]
pub fn format_timestamp(instant: OffsetDateTime) -> String {
    // Rfc3339 only fails for years outside 0..=9999.
    instant.format(&Rfc3339).unwrap_or_else(|_| instant.unix_timestamp().to_string())
}

/// Compare two records newest first. Unparseable timestamps sort last.
#[must_use]
pub fn newest_first(a: &FactRecord, b: &FactRecord) -> Ordering {
    match (a.created_instant(), b.created_instant()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Compare two records oldest first. Unparseable timestamps still sort last.
#[must_use]
pub fn oldest_first(a: &FactRecord, b: &FactRecord) -> Ordering {
    match (a.created_instant(), b.created_instant()) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort, newest first.
pub fn sort_newest_first(facts: &mut [FactRecord]) {
    facts.sort_by(newest_first);
}

#[cfg(test)]
#[path = "fact_test.rs"]
mod tests;

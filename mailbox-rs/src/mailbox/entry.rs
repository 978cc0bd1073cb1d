use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mime::ParsedMessage;
use crate::storage::Metadata;
use crate::utils::fallback::first_non_empty;

/// Metadata fields consulted, in order, for a message's ordering date
pub const DATE_FIELDS: [&str; 3] = ["date", "receivedAt", "sentAt"];

/// A message in a folder listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailboxEntry {
    pub path: String,
    pub size: u64,
    #[serde(rename = "uploaded")]
    pub uploaded_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl MailboxEntry {
    /// Date this entry sorts by; `None` when the chosen value is unparseable
    pub fn resolved_date(&self) -> Option<DateTime<Utc>> {
        resolve_entry_date(&self.metadata, self.uploaded_at)
    }
}

/// A single fetched message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub path: String,
    pub metadata: Metadata,
    pub parsed: ParsedMessage,
}

/// Resolve the ordering date: `date`, `receivedAt`, `sentAt`, then the upload time.
///
/// The first non-empty metadata value is used even if it does not parse, in
/// which case the entry has no date.
pub fn resolve_entry_date(metadata: &Metadata, uploaded_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let candidates = DATE_FIELDS.map(|field| metadata.get(field).map(String::as_str));

    match first_non_empty(&candidates) {
        Some(value) => parse_date(value),
        None => Some(uploaded_at),
    }
}

/// Parse the date formats seen in stored metadata
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(date) = NaiveDateTime::parse_from_str(value, format) {
            return Some(date.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}

// # Publication Records
//
// In-memory description of one discovered document. A record is created by
// a monitor during discovery, gains a `remote_id` once the orchestrator has
// uploaded it, and is dropped when the run ends. Nothing here is persisted.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Display/naming format for publication dates (ISO-8601, second precision)
pub const ISO_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S";

/// A publication discovered by a monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    /// Display title
    pub title: String,

    /// Identifier of the source publisher
    pub publisher: String,

    /// Location used to re-fetch the document at download time
    pub url: String,

    /// Publication timestamp
    pub date: NaiveDateTime,

    /// Provider-assigned identifier, stable between discovery and download
    pub publication_id: String,

    /// Page count (display only)
    pub page_count: u32,

    /// Storage identifier, present only after a successful upload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

impl Publication {
    /// Create a freshly discovered (not yet uploaded) publication
    pub fn new(
        title: impl Into<String>,
        publisher: impl Into<String>,
        url: impl Into<String>,
        date: NaiveDateTime,
        publication_id: impl Into<String>,
        page_count: u32,
    ) -> Self {
        Self {
            title: title.into(),
            publisher: publisher.into(),
            url: url.into(),
            date,
            publication_id: publication_id.into(),
            page_count,
            remote_id: None,
        }
    }

    /// The publication date rendered as an ISO-8601 date-time string
    pub fn date_iso(&self) -> String {
        self.date.format(ISO_DATE_TIME).to_string()
    }

    /// Whether this publication is strictly newer than `cutoff`
    ///
    /// A publication dated exactly at the cutoff is not newer.
    pub fn is_newer_than(&self, cutoff: &NaiveDateTime) -> bool {
        self.date > *cutoff
    }

    /// Deterministic name used when uploading to storage
    ///
    /// `{publisher}_{title}_{date}.pdf`
    pub fn remote_name(&self) -> String {
        format!("{}_{}_{}.pdf", self.publisher, self.title, self.date_iso())
    }

    /// File name used for the temporary local download
    ///
    /// Derived from `publication_id`, with characters that are unsafe in
    /// file names replaced by `_`.
    pub fn local_file_name(&self) -> String {
        format!("{}.pdf", sanitize_file_component(&self.publication_id))
    }

    /// Whether the record has been uploaded
    pub fn is_uploaded(&self) -> bool {
        self.remote_id.is_some()
    }
}

/// A file entry listed from a storage backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Backend identifier
    pub id: String,

    /// File name in the destination folder
    pub name: String,

    /// Creation time reported by the backend
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
}

/// Parse a date cutoff or timestamp
///
/// Accepts, in order:
/// - RFC 3339 (`2024-05-01T10:00:00Z`), converted to naive UTC
/// - naive ISO date-time (`2024-05-01T10:00:00`, optional fraction)
/// - plain date (`2024-05-01`), interpreted as midnight
pub fn parse_date(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt);
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .map_err(|e| Error::invalid_input(format!("Unrecognized date '{}': {}", value, e)))
}

/// Replace characters that are not safe in a single path component
pub fn sanitize_file_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // "." and ".." would escape the directory
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        format!("_{}", cleaned)
    } else {
        cleaned
    }
}

/// Data models for database entities
///
/// All models map to database tables and use sqlx for type-safe queries.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Maximum number of tags shown in a summary before eliding
const SUMMARY_TAG_LIMIT: usize = 3;

/// Maximum characters of opaque tag text shown in a summary
const SUMMARY_TEXT_LIMIT: usize = 30;

/// A stored prompt with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Record {
    pub id: i64,
    pub created: String,  // RFC 3339, UTC
    pub modified: String, // RFC 3339, UTC
    pub purpose: Option<String>,
    pub body: Option<String>,
    pub urls: Option<String>,
    pub tags: Option<String>, // JSON array, not guaranteed to parse
    pub note: Option<String>,
}

impl Record {
    /// The mutable part of this record, e.g. for duplication
    pub fn fields(&self) -> RecordFields {
        RecordFields {
            purpose: self.purpose.clone(),
            body: self.body.clone(),
            urls: self.urls.clone(),
            tags: self.tags.clone(),
            note: self.note.clone(),
        }
    }

    pub fn parsed_tags(&self) -> ParsedTags {
        ParsedTags::parse(self.tags.as_deref())
    }

    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id,
            created: self.created.clone(),
            modified: self.modified.clone(),
            purpose: self.purpose.clone(),
            tags_summary: self.parsed_tags().summary(),
        }
    }
}

/// Input for creating or updating a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFields {
    pub purpose: Option<String>,
    pub body: Option<String>,
    pub urls: Option<String>,
    pub tags: Option<String>,
    pub note: Option<String>,
}

impl RecordFields {
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_urls(mut self, urls: impl Into<String>) -> Self {
        self.urls = Some(urls.into());
        self
    }

    /// Store tags as a JSON list
    pub fn with_tags<S: AsRef<str>>(mut self, tags: &[S]) -> Result<Self, serde_json::Error> {
        let tags: Vec<&str> = tags.iter().map(|t| t.as_ref()).collect();
        self.tags = if tags.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&tags)?)
        };
        Ok(self)
    }

    /// Store tags verbatim, even if they are not a JSON list
    pub fn with_raw_tags(mut self, raw: impl Into<String>) -> Self {
        self.tags = Some(raw.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Lightweight row of a result set
///
/// Never carries body, note or URLs; those go through the detail cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub id: i64,
    pub created: String,
    pub modified: String,
    pub purpose: Option<String>,
    pub tags_summary: String,
}

/// Row shape used by index and listing queries
#[derive(Debug, Clone, FromRow)]
pub(crate) struct SummaryRow {
    pub id: i64,
    pub created: String,
    pub modified: String,
    pub purpose: Option<String>,
    pub tags: Option<String>,
}

impl From<SummaryRow> for RecordSummary {
    fn from(row: SummaryRow) -> Self {
        RecordSummary {
            id: row.id,
            created: row.created,
            modified: row.modified,
            purpose: row.purpose,
            tags_summary: ParsedTags::parse(row.tags.as_deref()).summary(),
        }
    }
}

/// An ordered set of search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub rows: Vec<RecordSummary>,
    /// The index had to be rebuilt to answer this query
    pub recovered: bool,
}

impl ResultSet {
    pub fn new(rows: Vec<RecordSummary>) -> Self {
        Self {
            rows,
            recovered: false,
        }
    }

    pub fn ids(&self) -> Vec<i64> {
        self.rows.iter().map(|r| r.id).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Tags as stored, interpreted
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedTags {
    None,
    List(Vec<String>),
    /// Text that did not parse as a list; shown and indexed verbatim
    Opaque(String),
}

impl ParsedTags {
    /// Interpret a stored tags value
    ///
    /// A value starting with `[` is read as a JSON list, anything else as
    /// comma-separated text. Bad JSON is kept as opaque text.
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = match raw {
            Some(r) if !r.trim().is_empty() => r,
            _ => return ParsedTags::None,
        };

        let trimmed = raw.trim();
        let list: Vec<String> = if trimmed.starts_with('[') {
            match serde_json::from_str::<Vec<String>>(trimmed) {
                Ok(tags) => tags,
                Err(e) => {
                    tracing::warn!("Malformed tags {:?}: {}", raw, e);
                    return ParsedTags::Opaque(raw.to_string());
                }
            }
        } else {
            trimmed.split(',').map(str::to_string).collect()
        };

        let list: Vec<String> = list
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        if list.is_empty() {
            ParsedTags::None
        } else {
            ParsedTags::List(list)
        }
    }

    /// Short text for result lists
    pub fn summary(&self) -> String {
        match self {
            ParsedTags::None => String::new(),
            ParsedTags::List(tags) => {
                let mut summary = tags
                    .iter()
                    .take(SUMMARY_TAG_LIMIT)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
                if tags.len() > SUMMARY_TAG_LIMIT {
                    summary.push_str("...");
                }
                summary
            }
            ParsedTags::Opaque(raw) => {
                let trimmed = raw.trim();
                if trimmed.chars().count() > SUMMARY_TEXT_LIMIT {
                    let head: String = trimmed.chars().take(SUMMARY_TEXT_LIMIT).collect();
                    format!("{}...", head.trim())
                } else {
                    trimmed.to_string()
                }
            }
        }
    }

    /// Text written to the full-text index
    pub fn index_text(&self) -> String {
        match self {
            ParsedTags::None => String::new(),
            ParsedTags::List(tags) => tags.join(" "),
            ParsedTags::Opaque(raw) => raw.clone(),
        }
    }
}

/// Build the stored tags value from comma-separated user input
///
/// `"rust, cli,"` becomes `["rust","cli"]`; blank input becomes `None`.
pub fn tags_from_input(input: &str) -> Result<Option<String>, serde_json::Error> {
    let tags: Vec<&str> = input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    if tags.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(&tags)?))
    }
}

/// Query expression matching one tag exactly
pub fn tag_query(tag: &str) -> String {
    format!("tags: \"{}\"", tag.replace('"', "\"\""))
}

/// Current time in the stored timestamp format
///
/// Fixed width with a `Z` suffix so string order is chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Format a stored timestamp for display, or return it unchanged if it
/// does not parse
pub fn display_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.format("%Y-%m-%d %I:%M %p").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_tags(tags: Option<&str>) -> Record {
        Record {
            id: 1,
            created: "2025-11-25T00:00:00.000000Z".to_string(),
            modified: "2025-11-25T00:00:00.000000Z".to_string(),
            purpose: Some("Summarize".to_string()),
            body: Some("Summarize this article".to_string()),
            urls: None,
            tags: tags.map(str::to_string),
            note: None,
        }
    }

    #[test]
    fn test_parse_json_tags() {
        let record = record_with_tags(Some(r#"["git", " test ", ""]"#));
        assert_eq!(
            record.parsed_tags(),
            ParsedTags::List(vec!["git".to_string(), "test".to_string()])
        );
    }

    #[test]
    fn test_parse_comma_tags() {
        let tags = ParsedTags::parse(Some("writing, email"));
        assert_eq!(
            tags,
            ParsedTags::List(vec!["writing".to_string(), "email".to_string()])
        );
    }

    #[test]
    fn test_malformed_tags_are_opaque() {
        let tags = ParsedTags::parse(Some("[\"unterminated"));
        assert_eq!(tags, ParsedTags::Opaque("[\"unterminated".to_string()));
        assert_eq!(tags.index_text(), "[\"unterminated");
    }

    #[test]
    fn test_empty_tags() {
        assert_eq!(ParsedTags::parse(None), ParsedTags::None);
        assert_eq!(ParsedTags::parse(Some("  ")), ParsedTags::None);
        assert_eq!(ParsedTags::parse(Some("[]")), ParsedTags::None);
        assert_eq!(ParsedTags::None.index_text(), "");
    }

    #[test]
    fn test_tags_summary() {
        let tags = ParsedTags::parse(Some(r#"["a","b","c","d"]"#));
        assert_eq!(tags.summary(), "a, b, c...");

        let tags = ParsedTags::parse(Some(r#"["a","b"]"#));
        assert_eq!(tags.summary(), "a, b");

        let long = format!("[{}", "x".repeat(40));
        assert_eq!(ParsedTags::parse(Some(&long)).summary(), format!("[{}...", "x".repeat(29)));
    }

    #[test]
    fn test_tags_from_input() {
        assert_eq!(
            tags_from_input("rust, cli,").unwrap(),
            Some(r#"["rust","cli"]"#.to_string())
        );
        assert_eq!(tags_from_input("  , ").unwrap(), None);
    }

    #[test]
    fn test_tag_query_escapes_quotes() {
        assert_eq!(tag_query("email"), "tags: \"email\"");
        assert_eq!(tag_query("say \"hi\""), "tags: \"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_timestamps_sort_chronologically() {
        let a = now_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = now_timestamp();
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn test_display_timestamp() {
        assert_eq!(
            display_timestamp("2025-11-25T14:05:00.000000Z"),
            "2025-11-25 02:05 PM"
        );
        assert_eq!(display_timestamp("yesterday"), "yesterday");
    }

    #[test]
    fn test_fields_roundtrip_and_summary() {
        let record = record_with_tags(Some(r#"["writing"]"#));
        let fields = record.fields();
        assert_eq!(fields.purpose.as_deref(), Some("Summarize"));
        assert_eq!(fields.tags.as_deref(), Some(r#"["writing"]"#));

        let summary = record.summary();
        assert_eq!(summary.id, 1);
        assert_eq!(summary.tags_summary, "writing");
    }
}

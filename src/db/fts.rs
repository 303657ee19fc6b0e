/// Full-text index over records
///
/// `records_fts` is an FTS5 table keyed by record id (its rowid). It is kept
/// in step with `records` by the store itself: each write applies an
/// [`IndexEffect`] on the same transaction, and [`Database::reindex_all`]
/// rebuilds it from scratch.

use crate::db::models::{ParsedTags, Record, RecordSummary, ResultSet};
use crate::db::Database;
use crate::error::{KeeperError, Result};
use regex::Regex;
use sqlx::sqlite::SqliteConnection;
use sqlx::FromRow;
use std::sync::OnceLock;
use tracing::instrument;

/// FTS5 operators, which are only operators in upper case
const OPERATORS: &[&str] = &["AND", "OR", "NOT", "NEAR"];

/// Change to the index that accompanies a store write
#[derive(Debug, Clone, Copy)]
pub(crate) enum IndexEffect<'a> {
    Insert(&'a Record),
    Replace(&'a Record),
    Remove(i64),
}

/// Searchable projection of one record
struct IndexEntry {
    id: i64,
    purpose: String,
    body: String,
    urls: String,
    tags: String,
    note: String,
}

impl IndexEntry {
    fn from_record(record: &Record) -> Self {
        Self {
            id: record.id,
            purpose: record.purpose.clone().unwrap_or_default(),
            body: record.body.clone().unwrap_or_default(),
            urls: record.urls.clone().unwrap_or_default(),
            tags: ParsedTags::parse(record.tags.as_deref()).index_text(),
            note: record.note.clone().unwrap_or_default(),
        }
    }
}

async fn insert_entry(conn: &mut SqliteConnection, entry: &IndexEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO records_fts (rowid, purpose, body, urls, tags, note) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.id)
    .bind(&entry.purpose)
    .bind(&entry.body)
    .bind(&entry.urls)
    .bind(&entry.tags)
    .bind(&entry.note)
    .execute(conn)
    .await?;

    Ok(())
}

async fn remove_entry(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM records_fts WHERE rowid = ?")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Apply an index change on the caller's transaction
pub(crate) async fn apply(conn: &mut SqliteConnection, effect: IndexEffect<'_>) -> Result<()> {
    match effect {
        IndexEffect::Insert(record) => insert_entry(conn, &IndexEntry::from_record(record)).await,
        IndexEffect::Replace(record) => {
            remove_entry(&mut *conn, record.id).await?;
            insert_entry(conn, &IndexEntry::from_record(record)).await
        }
        IndexEffect::Remove(id) => remove_entry(conn, id).await,
    }
}

fn bare_term_regex() -> &'static Regex {
    static BARE: OnceLock<Regex> = OnceLock::new();
    BARE.get_or_init(|| Regex::new(r"^[\p{L}\p{N}_]+$").expect("bare term pattern is valid"))
}

/// Split on whitespace that is not inside a double-quoted phrase
fn split_tokens(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    for ch in input.chars() {
        if ch == '"' {
            in_quote = !in_quote;
            current.push(ch);
        } else if ch.is_whitespace() && !in_quote {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Whether a token is a plain word that should match as a prefix
pub fn is_bare_term(token: &str) -> bool {
    bare_term_regex().is_match(token) && !OPERATORS.contains(&token)
}

/// Turn user input into an FTS5 MATCH expression
///
/// Every bare term gets a trailing `*` so partially typed words match.
/// Quoted phrases, `column:` qualifiers, groups, operators and terms that
/// already carry a wildcard are passed through as typed.
pub fn prepare_match_expression(input: &str) -> String {
    split_tokens(input.trim())
        .into_iter()
        .map(|token| {
            if is_bare_term(&token) {
                format!("{}*", token)
            } else {
                token
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Row of a MATCH joined back to the store
///
/// The store columns are NULL when the index holds an id the store lacks.
#[derive(Debug, FromRow)]
struct IndexHit {
    hit: i64,
    id: Option<i64>,
    created: Option<String>,
    modified: Option<String>,
    purpose: Option<String>,
    tags: Option<String>,
}

/// Result of comparing the index against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHealth {
    /// Records with no index entry
    pub missing: Vec<i64>,
    /// Index entries with no record
    pub orphaned: Vec<i64>,
}

impl IndexHealth {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty()
    }
}

/// Map engine complaints about the expression to `InvalidQuery`
fn classify_match_error(err: sqlx::Error) -> KeeperError {
    if let sqlx::Error::Database(ref db_err) = err {
        let message = db_err.message();
        if message.starts_with("fts5:")
            || message.contains("unterminated string")
            || message.starts_with("no such column")
            || message.contains("malformed MATCH")
        {
            return KeeperError::InvalidQuery(message.to_string());
        }
    }
    err.into()
}

impl Database {
    /// Rebuild the whole index from the store
    ///
    /// Used after restore/import, and to recover from a detected mismatch.
    /// Returns the number of indexed records.
    #[instrument(skip(self))]
    pub async fn reindex_all(&self) -> Result<usize> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM records_fts").execute(&mut *tx).await?;

        let records = sqlx::query_as::<_, Record>(
            "SELECT id, created, modified, purpose, body, urls, tags, note FROM records ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await?;

        for record in &records {
            insert_entry(&mut tx, &IndexEntry::from_record(record)).await?;
        }

        tx.commit().await?;
        tracing::info!("Reindexed {} records", records.len());

        Ok(records.len())
    }

    /// Search the index
    ///
    /// Results come most relevant first, ties broken by most recently
    /// modified. An empty term lists every record straight from the store.
    /// If the index points at records that no longer exist, it is rebuilt
    /// and the query rerun; the returned set is then marked `recovered`.
    #[instrument(skip(self))]
    pub async fn query_index(&self, term: &str) -> Result<ResultSet> {
        if term.trim().is_empty() {
            return Ok(ResultSet::new(self.list_summaries().await?));
        }

        let expression = prepare_match_expression(term);

        match self.match_records(&expression).await {
            Err(KeeperError::StorageCorruption(detail)) => {
                tracing::warn!("Index out of step with store ({}); rebuilding", detail);
                self.reindex_all().await?;

                let rows = self.match_records(&expression).await?;
                Ok(ResultSet {
                    rows,
                    recovered: true,
                })
            }
            other => other.map(ResultSet::new),
        }
    }

    async fn match_records(&self, expression: &str) -> Result<Vec<RecordSummary>> {
        tracing::trace!("MATCH {:?}", expression);

        let hits = sqlx::query_as::<_, IndexHit>(
            r#"
            SELECT records_fts.rowid AS hit, records.id AS id, records.created AS created,
                   records.modified AS modified, records.purpose AS purpose, records.tags AS tags
            FROM records_fts
            LEFT JOIN records ON records.id = records_fts.rowid
            WHERE records_fts MATCH ?
            ORDER BY records_fts.rank, records.modified DESC
            "#,
        )
        .bind(expression)
        .fetch_all(self.pool())
        .await
        .map_err(classify_match_error)?;

        let mut rows = Vec::with_capacity(hits.len());
        for hit in hits {
            match (hit.id, hit.created, hit.modified) {
                (Some(id), Some(created), Some(modified)) => rows.push(RecordSummary {
                    id,
                    created,
                    modified,
                    purpose: hit.purpose,
                    tags_summary: ParsedTags::parse(hit.tags.as_deref()).summary(),
                }),
                _ => {
                    return Err(KeeperError::StorageCorruption(format!(
                        "index entry {} has no record",
                        hit.hit
                    )))
                }
            }
        }

        Ok(rows)
    }

    /// Compare index ids with store ids
    pub async fn verify_index(&self) -> Result<IndexHealth> {
        let missing: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM records WHERE id NOT IN (SELECT rowid FROM records_fts) ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;

        let orphaned: Vec<(i64,)> = sqlx::query_as(
            "SELECT rowid FROM records_fts WHERE rowid NOT IN (SELECT id FROM records) ORDER BY rowid",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(IndexHealth {
            missing: missing.into_iter().map(|(id,)| id).collect(),
            orphaned: orphaned.into_iter().map(|(id,)| id).collect(),
        })
    }
}

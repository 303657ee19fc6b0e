/// SQL query functions for the record store
///
/// Every mutation runs in one transaction that also applies the matching
/// full-text index change, so readers never see one without the other.

use crate::db::fts::{self, IndexEffect};
use crate::db::models::*;
use crate::db::Database;
use crate::error::{KeeperError, Result};
use tracing::instrument;

const RECORD_COLUMNS: &str = "id, created, modified, purpose, body, urls, tags, note";

impl Database {
    /// Insert a new record
    ///
    /// # Returns
    /// * `Ok(i64)` - The identity assigned by the store
    #[instrument(skip(self, fields))]
    pub async fn create_record(&self, fields: &RecordFields) -> Result<i64> {
        let now = now_timestamp();
        let mut tx = self.pool().begin().await?;

        let record = sqlx::query_as::<_, Record>(&format!(
            r#"
            INSERT INTO records (created, modified, purpose, body, urls, tags, note)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(&now)
        .bind(&now)
        .bind(&fields.purpose)
        .bind(&fields.body)
        .bind(&fields.urls)
        .bind(&fields.tags)
        .bind(&fields.note)
        .fetch_one(&mut *tx)
        .await?;

        fts::apply(&mut tx, IndexEffect::Insert(&record)).await?;
        tx.commit().await?;

        tracing::debug!("Created record {}", record.id);
        Ok(record.id)
    }

    /// Copy every field of an existing record into a new one
    ///
    /// The copy gets a fresh identity and fresh timestamps.
    #[instrument(skip(self))]
    pub async fn duplicate_record(&self, id: i64) -> Result<i64> {
        let now = now_timestamp();
        let mut tx = self.pool().begin().await?;

        let record = sqlx::query_as::<_, Record>(&format!(
            r#"
            INSERT INTO records (created, modified, purpose, body, urls, tags, note)
            SELECT ?, ?, purpose, body, urls, tags, note FROM records WHERE id = ?
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(&now)
        .bind(&now)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(KeeperError::NotFound(id))?;

        fts::apply(&mut tx, IndexEffect::Insert(&record)).await?;
        tx.commit().await?;

        tracing::debug!("Duplicated record {} as {}", id, record.id);
        Ok(record.id)
    }

    /// Get record by ID
    pub async fn get_record(&self, id: i64) -> Result<Option<Record>> {
        let record = sqlx::query_as::<_, Record>(&format!(
            "SELECT {} FROM records WHERE id = ?",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(record)
    }

    /// Get record by ID, failing with `NotFound` if it is absent
    pub async fn read_record(&self, id: i64) -> Result<Record> {
        self.get_record(id).await?.ok_or(KeeperError::NotFound(id))
    }

    /// Replace the fields of a record and refresh its modified timestamp
    ///
    /// The index entry is rebuilt from the updated row, not patched.
    #[instrument(skip(self, fields))]
    pub async fn update_record(&self, id: i64, fields: &RecordFields) -> Result<()> {
        let now = now_timestamp();
        let mut tx = self.pool().begin().await?;

        // max() keeps modified >= created even if the clock went backwards
        let record = sqlx::query_as::<_, Record>(&format!(
            r#"
            UPDATE records
            SET modified = max(?, created), purpose = ?, body = ?, urls = ?, tags = ?, note = ?
            WHERE id = ?
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(&now)
        .bind(&fields.purpose)
        .bind(&fields.body)
        .bind(&fields.urls)
        .bind(&fields.tags)
        .bind(&fields.note)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(KeeperError::NotFound(id))?;

        fts::apply(&mut tx, IndexEffect::Replace(&record)).await?;
        tx.commit().await?;

        tracing::debug!("Updated record {}", id);
        Ok(())
    }

    /// Delete a record and its index entry
    #[instrument(skip(self))]
    pub async fn delete_record(&self, id: i64) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(KeeperError::NotFound(id));
        }

        fts::apply(&mut tx, IndexEffect::Remove(id)).await?;
        tx.commit().await?;

        tracing::debug!("Deleted record {}", id);
        Ok(())
    }

    /// All records, most recently modified first
    pub async fn list_all(&self) -> Result<Vec<Record>> {
        let records = sqlx::query_as::<_, Record>(&format!(
            "SELECT {} FROM records ORDER BY modified DESC, id DESC",
            RECORD_COLUMNS
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(records)
    }

    /// Result-set projection of every record, most recently modified first
    pub async fn list_summaries(&self) -> Result<Vec<RecordSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            "SELECT id, created, modified, purpose, tags FROM records ORDER BY modified DESC, id DESC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(RecordSummary::from).collect())
    }

    /// Number of records in the store
    pub async fn count_records(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM records")
            .fetch_one(self.pool())
            .await?;

        Ok(count.0)
    }
}

/// Prompt library
///
/// The one object collaborators talk to. It owns the store, the detail cache
/// and the search worker, and makes sure a write has cleared the cache
/// before it reports success.

use crate::config::Settings;
use crate::core::cache::DetailCache;
use crate::core::scheduler::{SearchScheduler, SearchTicket, SessionState};
use crate::core::sorter::SortState;
use crate::db::{Database, IndexHealth, Record, RecordFields};
use crate::error::Result;
use std::sync::Arc;
use tracing::instrument;

/// Counts for a status display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryStats {
    pub records: i64,
    pub indexed: i64,
    pub cached: usize,
    pub cache_capacity: usize,
    pub connections: u32,
    pub idle_connections: usize,
}

pub struct PromptLibrary {
    db: Database,
    cache: DetailCache,
    scheduler: SearchScheduler,
}

impl PromptLibrary {
    /// Open the store named in `settings` and start the search worker
    pub async fn open(settings: &Settings) -> Result<Self> {
        let db = Database::new(&settings.database).await?;
        Ok(Self::with_database(db, settings))
    }

    /// Build a library around an already opened store
    pub fn with_database(db: Database, settings: &Settings) -> Self {
        let cache = DetailCache::new(db.clone(), settings.cache.capacity);
        let scheduler =
            SearchScheduler::spawn(Arc::new(db.clone()), settings.search.quiet_period());

        Self {
            db,
            cache,
            scheduler,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn cache(&self) -> &DetailCache {
        &self.cache
    }

    #[instrument(skip(self, fields))]
    pub async fn create(&self, fields: &RecordFields) -> Result<i64> {
        let id = self.db.create_record(fields).await?;
        self.cache.invalidate(id);
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn duplicate(&self, id: i64) -> Result<i64> {
        let copy = self.db.duplicate_record(id).await?;
        self.cache.invalidate(copy);
        Ok(copy)
    }

    /// Read straight from the store, bypassing the cache
    pub async fn read(&self, id: i64) -> Result<Record> {
        self.db.read_record(id).await
    }

    /// Replace a record's fields
    ///
    /// The cache entry is dropped even when the update fails, since a
    /// `NotFound` means the cached copy is stale too.
    #[instrument(skip(self, fields))]
    pub async fn update(&self, id: i64, fields: &RecordFields) -> Result<()> {
        let result = self.db.update_record(id, fields).await;
        self.cache.invalidate(id);
        result
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = self.db.delete_record(id).await;
        self.cache.invalidate(id);
        result
    }

    /// Delete several records, stopping at the first failure
    pub async fn delete_many(&self, ids: &[i64]) -> Result<usize> {
        for id in ids {
            self.delete(*id).await?;
        }
        tracing::info!("Deleted {} records", ids.len());
        Ok(ids.len())
    }

    /// Full record for a detail view, served from the cache when possible
    pub async fn get_or_fetch(&self, id: i64) -> Result<Record> {
        self.cache.get_or_fetch(id).await
    }

    pub fn search(&self, term: &str) -> SearchTicket {
        self.scheduler.search(term)
    }

    pub fn search_sorted(&self, term: &str, sort: SortState) -> SearchTicket {
        self.scheduler.search_sorted(term, sort)
    }

    pub fn search_state(&self) -> SessionState {
        self.scheduler.state()
    }

    /// Every record, most recently modified first
    pub async fn list_all(&self) -> Result<Vec<Record>> {
        self.db.list_all().await
    }

    /// Rebuild the index after the store file was replaced or merged into
    ///
    /// Cached records may predate the new store contents, so the whole cache
    /// goes too.
    pub async fn reindex_all(&self) -> Result<usize> {
        let count = self.db.reindex_all().await?;
        self.cache.invalidate_all();
        Ok(count)
    }

    pub async fn verify_index(&self) -> Result<IndexHealth> {
        self.db.verify_index().await
    }

    pub async fn stats(&self) -> Result<LibraryStats> {
        let stats = self.db.stats().await?;
        Ok(LibraryStats {
            records: stats.total_records,
            indexed: stats.indexed_records,
            cached: self.cache.len(),
            cache_capacity: self.cache.capacity(),
            connections: stats.pool_size,
            idle_connections: stats.idle_connections,
        })
    }

    /// Stop the search worker and close the store
    pub async fn close(self) {
        self.scheduler.shutdown().await;
        self.db.close().await;
    }
}

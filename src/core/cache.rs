/// Detail cache
///
/// Keeps full records for recently displayed prompts so that selecting a row
/// does not hit the database every time. Writers must call `invalidate`
/// before reporting success; entries are dropped, never patched.

use crate::db::{Database, Record};
use crate::error::Result;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

/// Which entry leaves when the cache is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Oldest inserted entry goes first; reads do not refresh it
    #[default]
    InsertionOrder,
    /// Least recently read entry goes first
    LeastRecentlyUsed,
}

struct CacheState {
    entries: LruCache<i64, Record>,
    /// Bumped by every invalidation. A fetch that started under an older
    /// epoch may have read pre-write data and must not be cached.
    epoch: u64,
}

/// Bounded `id -> Record` cache in front of the store
pub struct DetailCache {
    db: Database,
    policy: EvictionPolicy,
    state: Mutex<CacheState>,
}

impl DetailCache {
    pub fn new(db: Database, capacity: usize) -> Self {
        Self::with_policy(db, capacity, EvictionPolicy::default())
    }

    pub fn with_policy(db: Database, capacity: usize, policy: EvictionPolicy) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            db,
            policy,
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                epoch: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // The state stays valid even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the cached record, or read it from the store and cache it
    pub async fn get_or_fetch(&self, id: i64) -> Result<Record> {
        let epoch = {
            let mut state = self.lock();
            let hit = match self.policy {
                EvictionPolicy::InsertionOrder => state.entries.peek(&id).cloned(),
                EvictionPolicy::LeastRecentlyUsed => state.entries.get(&id).cloned(),
            };
            if let Some(record) = hit {
                tracing::debug!("Using cached data for record {}", id);
                return Ok(record);
            }
            state.epoch
        };

        let record = self.db.read_record(id).await?;

        let mut state = self.lock();
        if state.epoch != epoch {
            tracing::debug!("Record {} changed while fetching; not caching", id);
            return Ok(record);
        }

        // Another fetch got here first with the same data
        if state.entries.contains(&id) {
            return Ok(record);
        }

        if let Some((evicted, _)) = state.entries.push(id, record.clone()) {
            tracing::debug!("Evicted record {} from cache", evicted);
        }
        tracing::debug!("Fetched and cached record {}", id);

        Ok(record)
    }

    /// Drop one record from the cache
    pub fn invalidate(&self, id: i64) {
        let mut state = self.lock();
        state.epoch += 1;
        if state.entries.pop(&id).is_some() {
            tracing::debug!("Cleared cache for record {}", id);
        }
    }

    /// Drop everything, e.g. after a restore
    pub fn invalidate_all(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.entries.clear();
        tracing::debug!("Cleared entire detail cache");
    }

    pub fn contains(&self, id: i64) -> bool {
        self.lock().entries.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().entries.cap().get()
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RecordFields;
    use crate::error::KeeperError;

    async fn setup(count: usize) -> (Database, Vec<i64>) {
        let db = Database::new_test().await.unwrap();
        let mut ids = Vec::new();
        for i in 0..count {
            let fields = RecordFields::default().with_body(format!("prompt {}", i));
            ids.push(db.create_record(&fields).await.unwrap());
        }
        (db, ids)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (db, ids) = setup(1).await;
        let cache = DetailCache::new(db.clone(), 50);

        let first = cache.get_or_fetch(ids[0]).await.unwrap();
        assert!(cache.contains(ids[0]));

        // Remove behind the cache's back: a hit must not touch the store
        sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(ids[0])
            .execute(db.pool())
            .await
            .unwrap();
        let second = cache.get_or_fetch(ids[0]).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_record_not_cached() {
        let (db, _) = setup(0).await;
        let cache = DetailCache::new(db, 50);

        assert!(matches!(
            cache.get_or_fetch(404).await,
            Err(KeeperError::NotFound(404))
        ));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_evicts_oldest_inserted() {
        let (db, ids) = setup(4).await;
        let cache = DetailCache::new(db, 3);

        for id in &ids[..3] {
            cache.get_or_fetch(*id).await.unwrap();
        }
        // Reading the oldest does not save it under insertion order
        cache.get_or_fetch(ids[0]).await.unwrap();
        cache.get_or_fetch(ids[3]).await.unwrap();

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(ids[0]));
        assert!(cache.contains(ids[1]));
        assert!(cache.contains(ids[3]));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let (db, ids) = setup(1).await;
        let cache = DetailCache::new(db.clone(), 50);

        cache.get_or_fetch(ids[0]).await.unwrap();
        db.update_record(ids[0], &RecordFields::default().with_body("rewritten"))
            .await
            .unwrap();
        cache.invalidate(ids[0]);
        assert!(!cache.contains(ids[0]));

        let fresh = cache.get_or_fetch(ids[0]).await.unwrap();
        assert_eq!(fresh.body.as_deref(), Some("rewritten"));
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let (db, ids) = setup(3).await;
        let cache = DetailCache::new(db, 50);

        for id in &ids {
            cache.get_or_fetch(*id).await.unwrap();
        }
        cache.invalidate_all();
        assert!(cache.is_empty());

        // Queue was cleared too: refilling does not evict early
        for id in &ids {
            cache.get_or_fetch(*id).await.unwrap();
        }
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_least_recently_used_keeps_read_entries() {
        let (db, ids) = setup(4).await;
        let cache = DetailCache::with_policy(db, 3, EvictionPolicy::LeastRecentlyUsed);
        assert_eq!(cache.policy(), EvictionPolicy::LeastRecentlyUsed);

        for id in &ids[..3] {
            cache.get_or_fetch(*id).await.unwrap();
        }
        // Reading the oldest makes ids[1] the eviction candidate
        cache.get_or_fetch(ids[0]).await.unwrap();
        cache.get_or_fetch(ids[3]).await.unwrap();

        assert!(cache.contains(ids[0]));
        assert!(!cache.contains(ids[1]));
        assert!(cache.contains(ids[3]));
    }

    #[tokio::test]
    async fn test_default_capacity_bound() {
        let (db, ids) = setup(51).await;
        let cache = DetailCache::new(db, 50);
        assert_eq!(cache.capacity(), 50);

        for id in &ids {
            cache.get_or_fetch(*id).await.unwrap();
        }

        assert_eq!(cache.len(), 50);
        assert!(!cache.contains(ids[0]));
        assert!(cache.contains(ids[50]));
    }

    #[tokio::test]
    async fn test_zero_capacity_holds_one() {
        let (db, ids) = setup(2).await;
        let cache = DetailCache::new(db, 0);
        assert_eq!(cache.capacity(), 1);

        cache.get_or_fetch(ids[0]).await.unwrap();
        cache.get_or_fetch(ids[1]).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(ids[1]));
    }
}

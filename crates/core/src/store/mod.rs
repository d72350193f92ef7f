//! Gallery Store: per-gallery state behind an injectable persistence backend.
//!
//! - [`GalleryDb`]: SQLite backend (WAL mode, migrations), the production default
//! - [`MemoryBackend`]: process-local backend for tests and ephemeral sessions
//! - [`GalleryStore`]: the facade every caller goes through; it serializes
//!   operations per gallery id and reads the preload capacity fresh per call

pub mod connection;
pub mod memory;
pub mod migrations;
pub mod pages;
pub mod preloads;
pub mod record;

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::Error;
use crate::config::SharedConfig;
use crate::eviction::PreloadCache;

pub use connection::GalleryDb;
pub use memory::MemoryBackend;
pub use record::GalleryRecord;

/// Persistence backend for gallery records.
///
/// Every mutating call must be durable (as far as the backend allows)
/// before it returns. Mutations create the record when it is missing.
#[async_trait]
pub trait GalleryBackend: Send + Sync {
    /// Current record, or `None` if the gallery was never created.
    async fn load(&self, gallery_id: &str) -> Result<Option<GalleryRecord>, Error>;

    /// Existing record or a freshly persisted empty one.
    async fn ensure(&self, gallery_id: &str) -> Result<GalleryRecord, Error>;

    /// Overwrite whichever counts are `Some`.
    async fn write_metadata(
        &self, gallery_id: &str, total_pages: Option<u32>, total_images: Option<u32>,
    ) -> Result<(), Error>;

    /// Store (or replace) the links of one source page.
    async fn write_page_links(&self, gallery_id: &str, page_index: u32, links: &[String]) -> Result<(), Error>;

    async fn indexed_pages(&self, gallery_id: &str) -> Result<BTreeSet<u32>, Error>;

    async fn page_links(&self, gallery_id: &str, page_index: u32) -> Result<Option<Vec<String>>, Error>;

    /// Insert into the preload cache, evicting oldest-inserted entries beyond `capacity`.
    ///
    /// Returns the evicted item links.
    async fn record_preload(
        &self, gallery_id: &str, page_url: &str, image_url: &str, capacity: usize,
    ) -> Result<Vec<String>, Error>;

    /// Remove one record. Returns whether it existed.
    async fn delete(&self, gallery_id: &str) -> Result<bool, Error>;

    /// Remove every record. Returns how many were removed.
    async fn delete_all(&self) -> Result<u64, Error>;

    /// Push buffered state to durable storage.
    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Facade over a [`GalleryBackend`].
///
/// Operations on the same gallery id run one at a time, so a
/// read-modify-write from one message can never interleave with another
/// message for that gallery. Operations on different galleries proceed
/// independently.
#[derive(Clone)]
pub struct GalleryStore {
    backend: Arc<dyn GalleryBackend>,
    config: SharedConfig,
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl std::fmt::Debug for GalleryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryStore").finish_non_exhaustive()
    }
}

impl GalleryStore {
    pub fn new(backend: Arc<dyn GalleryBackend>, config: SharedConfig) -> Self {
        Self { backend, config, locks: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Store backed by process memory.
    pub fn in_memory(config: SharedConfig) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), config)
    }

    /// Store backed by the SQLite database at the configured path.
    pub async fn open(config: SharedConfig) -> Result<Self, Error> {
        let path = config.snapshot().await.db_path;
        let db = GalleryDb::open(&path).await?;
        tracing::info!(path = %path.display(), "opened gallery store");
        Ok(Self::new(Arc::new(db), config))
    }

    async fn lock(&self, gallery_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(gallery_id.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// Every registered gallery lock, taken in id order.
    async fn lock_all(&self) -> Vec<OwnedMutexGuard<()>> {
        let mut slots: Vec<(String, Arc<AsyncMutex<()>>)> = {
            let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.iter().map(|(id, slot)| (id.clone(), slot.clone())).collect()
        };
        slots.sort_by(|a, b| a.0.cmp(&b.0));

        let mut guards = Vec::with_capacity(slots.len());
        for (_, slot) in slots {
            guards.push(slot.lock_owned().await);
        }
        guards
    }

    fn prune_locks(&self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    pub async fn get(&self, gallery_id: &str) -> Result<Option<GalleryRecord>, Error> {
        let _guard = self.lock(gallery_id).await;
        self.backend.load(gallery_id).await
    }

    /// Idempotent: never resets data already stored for `gallery_id`.
    pub async fn ensure(&self, gallery_id: &str) -> Result<GalleryRecord, Error> {
        let _guard = self.lock(gallery_id).await;
        self.backend.ensure(gallery_id).await
    }

    /// Record gallery counts.
    ///
    /// Known values are overwritten when a different count arrives; the
    /// change is logged since a source gallery rarely changes size mid-session.
    pub async fn set_metadata(
        &self, gallery_id: &str, total_pages: Option<u32>, total_images: Option<u32>,
    ) -> Result<(), Error> {
        let _guard = self.lock(gallery_id).await;
        if let Some(existing) = self.backend.load(gallery_id).await? {
            let pages_changed = matches!((existing.total_pages, total_pages), (Some(a), Some(b)) if a != b);
            let images_changed = matches!((existing.total_images, total_images), (Some(a), Some(b)) if a != b);
            if pages_changed || images_changed {
                tracing::warn!(
                    gallery_id,
                    old_pages = ?existing.total_pages,
                    new_pages = ?total_pages,
                    old_images = ?existing.total_images,
                    new_images = ?total_images,
                    "gallery metadata corrected"
                );
            }
        }
        self.backend.write_metadata(gallery_id, total_pages, total_images).await
    }

    /// Store the links of one source page, replacing any earlier indexing of it.
    pub async fn set_page_links(&self, gallery_id: &str, page_index: u32, links: &[String]) -> Result<(), Error> {
        let _guard = self.lock(gallery_id).await;
        self.backend.write_page_links(gallery_id, page_index, links).await?;
        tracing::debug!(gallery_id, page_index, links = links.len(), "page links stored");
        Ok(())
    }

    pub async fn indexed_page_indices(&self, gallery_id: &str) -> Result<BTreeSet<u32>, Error> {
        let _guard = self.lock(gallery_id).await;
        self.backend.indexed_pages(gallery_id).await
    }

    pub async fn page_links(&self, gallery_id: &str, page_index: u32) -> Result<Option<Vec<String>>, Error> {
        let _guard = self.lock(gallery_id).await;
        self.backend.page_links(gallery_id, page_index).await
    }

    /// Candidates that are not indexed yet, ascending and de-duplicated.
    pub async fn missing_pages(&self, gallery_id: &str, candidates: &[u32]) -> Result<Vec<u32>, Error> {
        let indexed = self.indexed_page_indices(gallery_id).await?;
        let missing: BTreeSet<u32> = candidates.iter().copied().filter(|p| !indexed.contains(p)).collect();
        Ok(missing.into_iter().collect())
    }

    /// Assembled master list plus the preload cache, empty for unknown galleries.
    pub async fn master_list(&self, gallery_id: &str) -> Result<(Vec<String>, PreloadCache), Error> {
        let _guard = self.lock(gallery_id).await;
        match self.backend.load(gallery_id).await? {
            Some(record) => Ok((record.master_list(), record.preloaded_pages)),
            None => Ok((Vec::new(), PreloadCache::new())),
        }
    }

    /// Cache a resolved resource URL, bounded by the current `cache_capacity`.
    pub async fn record_preload(&self, gallery_id: &str, page_url: &str, image_url: &str) -> Result<(), Error> {
        let capacity = self.config.cache_capacity().await;
        let _guard = self.lock(gallery_id).await;
        let evicted = self.backend.record_preload(gallery_id, page_url, image_url, capacity).await?;
        if !evicted.is_empty() {
            tracing::debug!(gallery_id, capacity, evicted = evicted.len(), "preload cache evicted entries");
        }
        Ok(())
    }

    /// Remove one gallery's record.
    pub async fn clear(&self, gallery_id: &str) -> Result<bool, Error> {
        let removed = {
            let _guard = self.lock(gallery_id).await;
            self.backend.delete(gallery_id).await?
        };
        self.prune_locks();
        tracing::info!(gallery_id, removed, "gallery cache cleared");
        Ok(removed)
    }

    /// Remove every gallery record.
    ///
    /// Waits for operations already holding a gallery lock. Galleries first
    /// touched while the clear runs are ordered after it.
    pub async fn clear_all(&self) -> Result<u64, Error> {
        let count = {
            let _guards = self.lock_all().await;
            self.backend.delete_all().await?
        };
        self.prune_locks();
        tracing::info!(count, "all gallery caches cleared");
        Ok(count)
    }

    /// Flush the backend; call once when the hosting process shuts down.
    pub async fn close(&self) -> Result<(), Error> {
        self.backend.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    async fn stores() -> Vec<GalleryStore> {
        let config = SharedConfig::new(AppConfig::default());
        let db = GalleryDb::open_in_memory().await.unwrap();
        vec![GalleryStore::in_memory(config.clone()), GalleryStore::new(Arc::new(db), config)]
    }

    fn links(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_get_unknown_is_none() {
        for store in stores().await {
            assert!(store.get("missing").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent_and_never_resets() {
        for store in stores().await {
            let first = store.ensure("g1").await.unwrap();
            let second = store.ensure("g1").await.unwrap();
            assert_eq!(first, second);
            assert_eq!(first, GalleryRecord::default());

            store.set_page_links("g1", 0, &links(&["a"])).await.unwrap();
            let third = store.ensure("g1").await.unwrap();
            assert_eq!(third.pages.get(&0), Some(&links(&["a"])));
        }
    }

    #[tokio::test]
    async fn test_set_page_links_overwrites_same_index() {
        for store in stores().await {
            store.set_page_links("g1", 1, &links(&["d", "e"])).await.unwrap();
            store.set_page_links("g1", 0, &links(&["a", "b"])).await.unwrap();
            store.set_page_links("g1", 1, &links(&["d", "e", "f"])).await.unwrap();

            let (master, _) = store.master_list("g1").await.unwrap();
            assert_eq!(master, links(&["a", "b", "d", "e", "f"]));
            assert_eq!(store.indexed_page_indices("g1").await.unwrap(), BTreeSet::from([0, 1]));
            assert_eq!(store.page_links("g1", 1).await.unwrap(), Some(links(&["d", "e", "f"])));
            assert_eq!(store.page_links("g1", 7).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_missing_pages() {
        for store in stores().await {
            assert_eq!(store.missing_pages("g1", &[2, 0, 2]).await.unwrap(), vec![0, 2]);
            store.set_page_links("g1", 0, &links(&["a"])).await.unwrap();
            assert_eq!(store.missing_pages("g1", &[0, 1, 2]).await.unwrap(), vec![1, 2]);
        }
    }

    #[tokio::test]
    async fn test_metadata_overwrites() {
        for store in stores().await {
            store.set_metadata("g1", Some(2), Some(6)).await.unwrap();
            store.set_metadata("g1", Some(3), None).await.unwrap();
            let record = store.get("g1").await.unwrap().unwrap();
            assert_eq!(record.total_pages, Some(3));
            assert_eq!(record.total_images, Some(6));
        }
    }

    #[tokio::test]
    async fn test_record_preload_reads_capacity_per_call() {
        let config = SharedConfig::new(AppConfig { cache_capacity: 3, ..Default::default() });
        let db = GalleryDb::open_in_memory().await.unwrap();
        for store in [GalleryStore::in_memory(config.clone()), GalleryStore::new(Arc::new(db), config.clone())] {
            config.update(|c| c.cache_capacity = 3).await.unwrap();
            for i in 0..4 {
                store.record_preload("g1", &format!("p{i}"), &format!("i{i}")).await.unwrap();
            }
            let (_, preloads) = store.master_list("g1").await.unwrap();
            let keys: Vec<_> = preloads.iter().map(|(k, _)| k.to_string()).collect();
            assert_eq!(keys, links(&["p1", "p2", "p3"]));

            config.update(|c| c.cache_capacity = 1).await.unwrap();
            store.record_preload("g1", "p4", "i4").await.unwrap();
            let (_, preloads) = store.master_list("g1").await.unwrap();
            assert_eq!(preloads.len(), 1);
            assert_eq!(preloads.get("p4"), Some("i4"));
        }
    }

    #[tokio::test]
    async fn test_record_preload_existing_key_keeps_position() {
        let config = SharedConfig::new(AppConfig { cache_capacity: 2, ..Default::default() });
        let db = GalleryDb::open_in_memory().await.unwrap();
        for store in [GalleryStore::in_memory(config.clone()), GalleryStore::new(Arc::new(db), config.clone())] {
            store.record_preload("g1", "p0", "i0").await.unwrap();
            store.record_preload("g1", "p1", "i1").await.unwrap();
            store.record_preload("g1", "p0", "i0b").await.unwrap();
            store.record_preload("g1", "p2", "i2").await.unwrap();

            let (_, preloads) = store.master_list("g1").await.unwrap();
            assert!(!preloads.contains("p0"));
            assert_eq!(preloads.get("p1"), Some("i1"));
            assert_eq!(preloads.get("p2"), Some("i2"));
        }
    }

    #[tokio::test]
    async fn test_clear_and_clear_all() {
        for store in stores().await {
            for id in ["g1", "g2", "g3"] {
                store.set_page_links(id, 0, &links(&["a"])).await.unwrap();
            }
            assert!(store.clear("g1").await.unwrap());
            assert!(!store.clear("g1").await.unwrap());
            assert!(store.get("g1").await.unwrap().is_none());

            assert_eq!(store.clear_all().await.unwrap(), 2);
            assert!(store.get("g2").await.unwrap().is_none());
            assert!(store.get("g3").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_clear_all_waits_for_gallery_in_use() {
        for store in stores().await {
            store.set_page_links("g1", 0, &links(&["a"])).await.unwrap();
            let in_use = store.lock("g1").await;

            let clearing = tokio::spawn({
                let store = store.clone();
                async move { store.clear_all().await }
            });
            for _ in 0..20 {
                tokio::task::yield_now().await;
            }
            assert!(!clearing.is_finished());

            drop(in_use);
            assert_eq!(clearing.await.unwrap().unwrap(), 1);
            assert!(store.get("g1").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_concurrent_writers_same_gallery() {
        for store in stores().await {
            let mut tasks = tokio::task::JoinSet::new();
            for page in 0..8u32 {
                let store = store.clone();
                tasks.spawn(async move { store.set_page_links("g1", page, &[format!("l{page}")]).await });
            }
            while let Some(result) = tasks.join_next().await {
                result.unwrap().unwrap();
            }
            let (master, _) = store.master_list("g1").await.unwrap();
            let expected: Vec<String> = (0..8).map(|p| format!("l{p}")).collect();
            assert_eq!(master, expected);
        }
    }
}

//! Process-local gallery backend.
//!
//! Holds records in a map behind a tokio RwLock. Nothing survives a restart,
//! so this backend suits tests and throwaway sessions only.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{GalleryBackend, GalleryRecord};
use crate::Error;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    galleries: RwLock<HashMap<String, GalleryRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GalleryBackend for MemoryBackend {
    async fn load(&self, gallery_id: &str) -> Result<Option<GalleryRecord>, Error> {
        Ok(self.galleries.read().await.get(gallery_id).cloned())
    }

    async fn ensure(&self, gallery_id: &str) -> Result<GalleryRecord, Error> {
        let mut galleries = self.galleries.write().await;
        Ok(galleries.entry(gallery_id.to_string()).or_default().clone())
    }

    async fn write_metadata(
        &self, gallery_id: &str, total_pages: Option<u32>, total_images: Option<u32>,
    ) -> Result<(), Error> {
        let mut galleries = self.galleries.write().await;
        galleries
            .entry(gallery_id.to_string())
            .or_default()
            .apply_metadata(total_pages, total_images);
        Ok(())
    }

    async fn write_page_links(&self, gallery_id: &str, page_index: u32, links: &[String]) -> Result<(), Error> {
        let mut galleries = self.galleries.write().await;
        galleries
            .entry(gallery_id.to_string())
            .or_default()
            .pages
            .insert(page_index, links.to_vec());
        Ok(())
    }

    async fn indexed_pages(&self, gallery_id: &str) -> Result<BTreeSet<u32>, Error> {
        let galleries = self.galleries.read().await;
        Ok(galleries.get(gallery_id).map(GalleryRecord::indexed_pages).unwrap_or_default())
    }

    async fn page_links(&self, gallery_id: &str, page_index: u32) -> Result<Option<Vec<String>>, Error> {
        let galleries = self.galleries.read().await;
        Ok(galleries.get(gallery_id).and_then(|r| r.pages.get(&page_index).cloned()))
    }

    async fn record_preload(
        &self, gallery_id: &str, page_url: &str, image_url: &str, capacity: usize,
    ) -> Result<Vec<String>, Error> {
        let mut galleries = self.galleries.write().await;
        let record = galleries.entry(gallery_id.to_string()).or_default();
        Ok(record.preloaded_pages.record(page_url, image_url, capacity))
    }

    async fn delete(&self, gallery_id: &str) -> Result<bool, Error> {
        Ok(self.galleries.write().await.remove(gallery_id).is_some())
    }

    async fn delete_all(&self) -> Result<u64, Error> {
        let mut galleries = self.galleries.write().await;
        let count = galleries.len() as u64;
        galleries.clear();
        Ok(count)
    }
}

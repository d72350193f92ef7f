//! Epoch-tagged look-ahead around the current item.
//!
//! Each navigation advances the [`Epoch`]. Tasks carry the epoch they were
//! spawned under and re-check it after every suspension point; once a newer
//! navigation has committed, their results are dropped without touching the
//! view or the cache. A newer navigation never aborts an underlying fetch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use pagewalk_client::extract_resource_url;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use url::Url;

use crate::session::Shared;

/// Navigation generation counter.
#[derive(Debug, Default)]
pub(crate) struct Epoch(AtomicU64);

impl Epoch {
    /// Start a new generation and return its token.
    pub(crate) fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn is_current(&self, token: u64) -> bool {
        self.0.load(Ordering::Acquire) == token
    }
}

/// One async lock per item link, so concurrent tasks never fetch the same item twice.
#[derive(Debug, Default)]
pub(crate) struct LinkLocks(Mutex<HashMap<String, Arc<AsyncMutex<()>>>>);

impl LinkLocks {
    async fn lock(&self, link: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(link.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }
}

/// Preview offsets nearest first, alternating sides: +1, -1, +2, -2, ...
pub(crate) fn preview_offsets(radius: usize) -> impl Iterator<Item = isize> {
    (1..=radius as isize).flat_map(|distance| [distance, -distance])
}

fn offset_index(origin: usize, offset: isize, len: usize) -> Option<usize> {
    origin.checked_add_signed(offset).filter(|index| *index < len)
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Item,
    Neighbor,
    Preview,
}

/// Show the target item, then prime its right and left neighbours.
pub(crate) async fn display(shared: Arc<Shared>, token: u64, target: usize) {
    let plan = [(0, Slot::Item), (1, Slot::Neighbor), (-1, Slot::Neighbor)];
    for (offset, slot) in plan {
        if !present(&shared, token, target, offset, slot).await {
            return;
        }
    }
}

/// Refresh previews within `radius` of the target, nearest first.
pub(crate) async fn previews(shared: Arc<Shared>, token: u64, target: usize, radius: usize) {
    for offset in preview_offsets(radius) {
        if !present(&shared, token, target, offset, Slot::Preview).await {
            return;
        }
    }
}

/// Resolve and show one slot. Returns `false` once the epoch is stale.
async fn present(shared: &Shared, token: u64, target: usize, offset: isize, slot: Slot) -> bool {
    if !shared.epoch.is_current(token) {
        return false;
    }

    let (index, link) = {
        let state = shared.state.read().await;
        match offset_index(target, offset, state.master_list.len()) {
            Some(index) => (index, state.master_list[index].clone()),
            None => return true,
        }
    };

    let Some(resource) = resolve(shared, token, &link).await else {
        return shared.epoch.is_current(token);
    };
    if !shared.epoch.is_current(token) {
        tracing::debug!(gallery_id = %shared.gallery_id, index, ?slot, "discarding stale look-ahead result");
        return false;
    }

    match slot {
        Slot::Item => shared.view.show_item(index, &link, &resource),
        Slot::Neighbor => shared.view.prime_neighbor(index, &link, &resource),
        Slot::Preview => shared.view.show_preview(index, &link, &resource),
    }
    true
}

async fn cached(shared: &Shared, link: &str) -> Option<String> {
    let hit = shared.state.read().await.preloaded.get(link).map(str::to_string);
    if hit.is_some() {
        tracing::debug!(gallery_id = %shared.gallery_id, link, "preload cache hit");
    }
    hit
}

/// Resource URL for `link`: preload cache first, else fetch, extract and cache.
///
/// A task that finds the link already being fetched waits for that fetch
/// and reads its result from the cache.
async fn resolve(shared: &Shared, token: u64, link: &str) -> Option<String> {
    if let Some(hit) = cached(shared, link).await {
        return Some(hit);
    }
    let _fetching = shared.fetching.lock(link).await;
    if let Some(hit) = cached(shared, link).await {
        return Some(hit);
    }
    tracing::debug!(gallery_id = %shared.gallery_id, link, "preload cache miss");

    let url = match Url::parse(link) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(gallery_id = %shared.gallery_id, link, error = %e, "unparseable item link");
            return None;
        }
    };

    let image_selector = shared.config.snapshot().await.image_selector;
    let html = match shared.source.fetch_html(&url).await {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!(gallery_id = %shared.gallery_id, link, error = %e, "item fetch failed");
            return None;
        }
    };
    let resource = match extract_resource_url(&html, &url, &image_selector) {
        Ok(Some(resource)) => resource,
        Ok(None) => {
            tracing::warn!(gallery_id = %shared.gallery_id, link, selector = %image_selector, "no resource on item page");
            return None;
        }
        Err(e) => {
            tracing::warn!(gallery_id = %shared.gallery_id, link, error = %e, "resource extraction failed");
            return None;
        }
    };

    if !shared.epoch.is_current(token) {
        return Some(resource);
    }

    if let Err(e) = shared.store.cache_image(&shared.gallery_id, link, &resource).await {
        tracing::warn!(gallery_id = %shared.gallery_id, link, error = %e, "failed to cache resource");
    }
    let capacity = shared.config.cache_capacity().await;
    shared.state.write().await.preloaded.record(link, resource.clone(), capacity);

    Some(resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_offsets_alternate_nearest_first() {
        let offsets: Vec<isize> = preview_offsets(3).collect();
        assert_eq!(offsets, vec![1, -1, 2, -2, 3, -3]);
        assert_eq!(preview_offsets(0).count(), 0);
    }

    #[test]
    fn test_offset_index_bounds() {
        assert_eq!(offset_index(0, -1, 5), None);
        assert_eq!(offset_index(4, 1, 5), None);
        assert_eq!(offset_index(2, -2, 5), Some(0));
        assert_eq!(offset_index(2, 2, 5), Some(4));
    }

    #[test]
    fn test_epoch_tokens() {
        let epoch = Epoch::default();
        let first = epoch.advance();
        assert!(epoch.is_current(first));
        let second = epoch.advance();
        assert!(!epoch.is_current(first));
        assert!(epoch.is_current(second));
    }
}

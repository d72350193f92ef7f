//! Per-gallery state record.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::eviction::PreloadCache;
use crate::sequence;

/// Everything the store knows about one gallery.
///
/// `pages` is sparse: a page index is present only once it has been indexed.
/// Source pages are disjoint, so no link appears under two page indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GalleryRecord {
    /// Item links per source page index.
    pub pages: BTreeMap<u32, Vec<String>>,

    /// Item link -> resolved resource URL, oldest first.
    #[schemars(with = "BTreeMap<String, String>")]
    pub preloaded_pages: PreloadCache,

    /// Number of source pages, once discovered.
    pub total_pages: Option<u32>,

    /// Number of items, once discovered.
    pub total_images: Option<u32>,
}

impl GalleryRecord {
    /// Page indices that have been indexed.
    pub fn indexed_pages(&self) -> BTreeSet<u32> {
        self.pages.keys().copied().collect()
    }

    /// Flattened item links across all indexed pages.
    pub fn master_list(&self) -> Vec<String> {
        sequence::assemble(&self.pages)
    }

    /// Apply newly discovered counts. `None` leaves a known value alone.
    pub fn apply_metadata(&mut self, total_pages: Option<u32>, total_images: Option<u32>) {
        if total_pages.is_some() {
            self.total_pages = total_pages;
        }
        if total_images.is_some() {
            self.total_images = total_images;
        }
    }
}

//! Indexer: turns source pages of a gallery into stored link pages.
//!
//! For every requested page that the store does not know yet, the page is
//! fetched, its item links are extracted and recorded under its index.
//! Pages are handled in ascending order and the first fetch failure stops
//! the run; pages indexed before it stay recorded.
//!
//! A page that parses but yields no links is stored as an empty page and
//! reported in [`IndexReport::empty`]. It is never refetched automatically.

use std::sync::Arc;

use pagewalk_core::{Error, StoreClient};
use serde::Serialize;
use url::Url;

use crate::extract::{extract_gallery_meta, extract_item_links};
use crate::fetch::{PageSource, page_url};

/// Outcome of an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Page indices fetched and recorded during this run.
    pub indexed: Vec<u32>,
    /// Subset of `indexed` that yielded zero links.
    pub empty: Vec<u32>,
}

impl IndexReport {
    pub fn is_noop(&self) -> bool {
        self.indexed.is_empty()
    }
}

/// Fetches and records gallery source pages through the store protocol.
#[derive(Clone)]
pub struct Indexer {
    source: Arc<dyn PageSource>,
    store: StoreClient,
    item_selector: String,
}

impl Indexer {
    pub fn new(source: Arc<dyn PageSource>, store: StoreClient, item_selector: impl Into<String>) -> Self {
        Self { source, store, item_selector: item_selector.into() }
    }

    /// Make sure every page in `page_indices` is recorded for `gallery_id`.
    ///
    /// `base` is the gallery's first listing page; page `n` is addressed by
    /// [`page_url`].
    pub async fn ensure_indexed(&self, gallery_id: &str, page_indices: &[u32], base: &Url) -> Result<IndexReport, Error> {
        let mut report = IndexReport::default();
        if page_indices.is_empty() {
            return Ok(report);
        }

        let missing = self.store.missing_pages(gallery_id, page_indices.to_vec()).await?;
        if missing.is_empty() {
            tracing::debug!(gallery_id, ?page_indices, "pages already indexed");
            return Ok(report);
        }

        for page_index in missing {
            let link_count = self.index_page(gallery_id, page_index, base).await?;
            report.indexed.push(page_index);
            if link_count == 0 {
                report.empty.push(page_index);
            }
        }

        Ok(report)
    }

    /// Fetch, parse and record one page. Returns the number of links stored.
    async fn index_page(&self, gallery_id: &str, page_index: u32, base: &Url) -> Result<usize, Error> {
        let url = page_url(base, page_index);
        let html = self.source.fetch_html(&url).await?;

        let links = extract_item_links(&html, &url, &self.item_selector)?;
        let mut meta = extract_gallery_meta(&html);

        if links.is_empty() {
            tracing::warn!(
                gallery_id,
                page_index,
                %url,
                selector = %self.item_selector,
                "no item links found; recording page as empty"
            );
        } else if meta.total_pages.is_none() && page_index == 0 {
            meta.total_pages = Some(1);
        }

        if meta.total_pages.is_some() || meta.total_images.is_some() {
            self.store
                .set_metadata(gallery_id, meta.total_pages, meta.total_images)
                .await?;
        }

        let count = links.len();
        self.store.set_page_links(gallery_id, page_index, links).await?;
        tracing::info!(gallery_id, page_index, links = count, "indexed gallery page");

        Ok(count)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use pagewalk_core::{AppConfig, GalleryStore, SharedConfig, StoreService};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned HTML by URL and counts requests.
    #[derive(Default)]
    pub(crate) struct CannedSource {
        pub pages: HashMap<String, String>,
        pub hits: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PageSource for CannedSource {
        async fn fetch_html(&self, url: &Url) -> Result<String, Error> {
            self.hits.lock().unwrap().push(url.to_string());
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| Error::FetchExhausted { url: url.to_string(), attempts: 3, last: "status 404".into() })
        }
    }

    pub(crate) fn listing(items: &[&str], total_pages: u32, total_images: u32) -> String {
        let anchors: String = items.iter().map(|i| format!(r#"<a href="/s/{i}"><img></a>"#)).collect();
        let cells: String = (1..=total_pages).map(|p| format!("<td>{p}</td>")).collect();
        format!(
            r#"<html><body><p class="gpc">Showing 1 - {n} of {total_images} images</p>
            <table class="ptt"><tr>{cells}</tr></table><div id="gdt">{anchors}</div></body></html>"#,
            n = items.len()
        )
    }

    fn base() -> Url {
        Url::parse("https://example.org/g/1/abc/").unwrap()
    }

    fn indexer(source: Arc<CannedSource>) -> (Indexer, StoreClient) {
        let store = GalleryStore::in_memory(SharedConfig::new(AppConfig::default()));
        let (client, _) = StoreService::spawn(store);
        (Indexer::new(source, client.clone(), "#gdt a[href]"), client)
    }

    #[tokio::test]
    async fn test_indexes_missing_pages_only() {
        let mut source = CannedSource::default();
        source.pages.insert(base().to_string(), listing(&["a", "b", "c"], 2, 6));
        source.pages.insert(page_url(&base(), 1).to_string(), listing(&["d", "e", "f"], 2, 6));
        let source = Arc::new(source);
        let (indexer, store) = indexer(source.clone());

        let report = indexer.ensure_indexed("1/abc", &[0], &base()).await.unwrap();
        assert_eq!(report.indexed, vec![0]);

        let report = indexer.ensure_indexed("1/abc", &[0, 1], &base()).await.unwrap();
        assert_eq!(report.indexed, vec![1]);
        assert_eq!(source.hits.lock().unwrap().len(), 2);

        let (master, _) = store.all_links("1/abc").await.unwrap();
        let expected: Vec<String> =
            ["a", "b", "c", "d", "e", "f"].iter().map(|i| format!("https://example.org/s/{i}")).collect();
        assert_eq!(master, expected);

        let record = store.gallery_data("1/abc").await.unwrap().unwrap();
        assert_eq!(record.total_pages, Some(2));
        assert_eq!(record.total_images, Some(6));
    }

    #[tokio::test]
    async fn test_zero_links_recorded_as_empty_page() {
        let mut source = CannedSource::default();
        source.pages.insert(base().to_string(), "<html><body>moved</body></html>".into());
        let source = Arc::new(source);
        let (indexer, store) = indexer(source);

        let report = indexer.ensure_indexed("1/abc", &[0], &base()).await.unwrap();
        assert_eq!(report.empty, vec![0]);
        assert_eq!(store.page_links("1/abc", 0).await.unwrap(), Some(Vec::new()));

        let again = indexer.ensure_indexed("1/abc", &[0], &base()).await.unwrap();
        assert!(again.is_noop());
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let source = Arc::new(CannedSource::default());
        let (indexer, store) = indexer(source);

        let err = indexer.ensure_indexed("1/abc", &[0], &base()).await.unwrap_err();
        assert_eq!(err.code(), "FETCH_EXHAUSTED");
        assert_eq!(store.missing_pages("1/abc", vec![0]).await.unwrap(), vec![0]);
    }
}

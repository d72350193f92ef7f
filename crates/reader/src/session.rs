//! Reader session: navigation over one gallery's master list.
//!
//! Only one navigation runs at a time; a second request while one is in
//! flight is rejected, not queued. Position changes are committed before
//! any look-ahead work starts, and every look-ahead task carries the epoch
//! of the navigation that spawned it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pagewalk_client::fetch::{PageSource, canonicalize, gallery_base, gallery_id_from_url};
use pagewalk_client::{FetchClient, FetchConfig, Indexer};
use pagewalk_core::sequence::next_unindexed;
use pagewalk_core::{Error, GalleryRecord, SharedConfig, StoreClient};
use tokio::sync::{Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use url::Url;

use crate::lookahead::{self, Epoch, LinkLocks};
use crate::state::{NavigateOutcome, NavigationState, Rejection};
use crate::view::ReaderView;

/// State shared between a session and its background tasks.
pub(crate) struct Shared {
    pub(crate) gallery_id: String,
    pub(crate) base: Url,
    pub(crate) store: StoreClient,
    pub(crate) source: Arc<dyn PageSource>,
    pub(crate) indexer: Indexer,
    pub(crate) config: SharedConfig,
    pub(crate) view: Arc<dyn ReaderView>,
    pub(crate) state: RwLock<NavigationState>,
    pub(crate) epoch: Epoch,
    pub(crate) fetching: LinkLocks,
    navigating: AtomicBool,
    /// Held while extending the sequence; proactive indexing only try-locks it.
    index_lock: Mutex<()>,
    tasks: Mutex<JoinSet<()>>,
}

impl Shared {
    /// Reload the master list and counts from the store.
    ///
    /// The local preload cache is left alone; look-ahead keeps it in step
    /// with its own store writes.
    async fn refresh(&self) -> Result<GalleryRecord, Error> {
        let record = self.store.gallery_data(&self.gallery_id).await?.unwrap_or_default();
        let mut state = self.state.write().await;
        state.master_list = record.master_list();
        state.total_gallery_pages = record.total_pages;
        state.total_image_count = record.total_images;
        Ok(record)
    }

    /// Index the lowest page `record` is missing. `None` when all pages are known.
    ///
    /// Callers must hold `index_lock`.
    async fn index_next_page(&self, record: &GalleryRecord) -> Result<Option<u32>, Error> {
        let total = record.total_pages.unwrap_or(0);
        let Some(next) = next_unindexed(&record.indexed_pages(), total) else {
            return Ok(None);
        };

        let report = self.indexer.ensure_indexed(&self.gallery_id, &[next], &self.base).await?;
        if !report.empty.is_empty() {
            tracing::warn!(gallery_id = %self.gallery_id, page_index = next, "source page yielded no items");
        }
        self.refresh().await?;
        Ok(Some(next))
    }

    async fn link(&self, index: usize) -> Option<String> {
        self.state.read().await.link(index).map(str::to_string)
    }
}

/// Clears the navigating flag on every exit path.
struct NavigatingGuard<'a>(&'a AtomicBool);

impl<'a> NavigatingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for NavigatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One reader over one gallery.
pub struct ReaderSession {
    shared: Arc<Shared>,
}

impl ReaderSession {
    /// Open a session for `gallery_url`, indexing its first source page.
    pub async fn open(
        gallery_url: &str, store: StoreClient, source: Arc<dyn PageSource>, config: SharedConfig,
        view: Arc<dyn ReaderView>,
    ) -> Result<Self, Error> {
        let url = canonicalize(gallery_url)?;
        let gallery_id = gallery_id_from_url(&url)?;
        let base = gallery_base(&url)?;

        let item_selector = config.snapshot().await.item_selector;
        let indexer = Indexer::new(source.clone(), store.clone(), item_selector);
        indexer.ensure_indexed(&gallery_id, &[0], &base).await?;

        let shared = Arc::new(Shared {
            gallery_id,
            base,
            store,
            source,
            indexer,
            config,
            view,
            state: RwLock::new(NavigationState::default()),
            epoch: Epoch::default(),
            fetching: LinkLocks::default(),
            navigating: AtomicBool::new(false),
            index_lock: Mutex::new(()),
            tasks: Mutex::new(JoinSet::new()),
        });
        let record = shared.refresh().await?;
        shared.state.write().await.preloaded = record.preloaded_pages.clone();

        tracing::info!(
            gallery_id = %shared.gallery_id,
            items = record.pages.values().map(Vec::len).sum::<usize>(),
            total_pages = ?record.total_pages,
            total_images = ?record.total_images,
            "reader session opened"
        );

        Ok(Self { shared })
    }

    /// Open a session that fetches pages over HTTP with the configured client settings.
    pub async fn open_http(
        gallery_url: &str, store: StoreClient, config: SharedConfig, view: Arc<dyn ReaderView>,
    ) -> Result<Self, Error> {
        let fetch = FetchClient::new(FetchConfig::from(&config.snapshot().await))?;
        Self::open(gallery_url, store, Arc::new(fetch), config, view).await
    }

    pub fn gallery_id(&self) -> &str {
        &self.shared.gallery_id
    }

    pub fn is_navigating(&self) -> bool {
        self.shared.navigating.load(Ordering::Acquire)
    }

    pub async fn state(&self) -> NavigationState {
        self.shared.state.read().await.clone()
    }

    pub async fn current_index(&self) -> i64 {
        self.shared.state.read().await.current_index
    }

    /// Move to `target` in the master list, indexing more source pages if needed.
    ///
    /// Failures leave the position where it was and the session idle.
    pub async fn navigate_to(&self, target: i64) -> Result<NavigateOutcome, Error> {
        let gallery_id = self.shared.gallery_id.as_str();
        let Ok(target) = usize::try_from(target) else {
            tracing::warn!(gallery_id, target, "rejected navigation to negative index");
            return Ok(NavigateOutcome::Rejected(Rejection::InvalidTarget));
        };
        let Some(_navigating) = NavigatingGuard::acquire(&self.shared.navigating) else {
            tracing::debug!(gallery_id, target, "navigation already in flight");
            return Ok(NavigateOutcome::Rejected(Rejection::Busy));
        };

        let link = match self.extend_to(target).await {
            Ok(Some(link)) => link,
            Ok(None) => {
                let len = self.shared.state.read().await.master_list.len();
                tracing::warn!(gallery_id, target, len, "end of gallery");
                return Ok(NavigateOutcome::EndOfGallery { len });
            }
            Err(e) => {
                tracing::error!(gallery_id, target, error = %e, "navigation failed");
                return Err(e);
            }
        };

        let token = {
            let mut state = self.shared.state.write().await;
            state.current_index = target as i64;
            self.shared.epoch.advance()
        };
        tracing::info!(gallery_id, index = target, %link, "navigated");

        let config = self.shared.config.snapshot().await;
        let mut tasks = self.shared.tasks.lock().await;
        while tasks.try_join_next().is_some() {}
        tasks.spawn(lookahead::display(self.shared.clone(), token, target));
        tasks.spawn(lookahead::previews(self.shared.clone(), token, target, config.preload_radius));
        tasks.spawn(index_ahead(self.shared.clone(), config.proactive_index_distance));

        Ok(NavigateOutcome::Moved { index: target, link })
    }

    pub async fn next(&self) -> Result<NavigateOutcome, Error> {
        let current = self.current_index().await;
        self.navigate_to(current + 1).await
    }

    pub async fn previous(&self) -> Result<NavigateOutcome, Error> {
        let current = self.current_index().await;
        self.navigate_to(current - 1).await
    }

    /// Wait for outstanding look-ahead and proactive indexing tasks.
    pub async fn settle(&self) {
        let mut tasks = std::mem::take(&mut *self.shared.tasks.lock().await);
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(gallery_id = %self.shared.gallery_id, error = %e, "look-ahead task failed");
            }
        }
    }

    /// End the session and drop the gallery's cached state from the store.
    ///
    /// Teardown runs on its own task; the handle may be awaited or dropped.
    /// Look-ahead and proactive indexing tasks are cancelled before the
    /// clear, so none of them can write the gallery back afterwards.
    pub fn close(self) -> JoinHandle<()> {
        let shared = self.shared;
        shared.epoch.advance();

        tokio::spawn(async move {
            let gallery_id = shared.gallery_id.as_str();
            let mut tasks = std::mem::take(&mut *shared.tasks.lock().await);
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}

            if let Err(e) = shared.store.clear_gallery(gallery_id).await {
                tracing::warn!(gallery_id, error = %e, "failed to clear gallery on close");
            }
            tracing::info!(gallery_id, "reader session closed");
        })
    }

    /// Link at `target`, indexing further source pages until it exists.
    /// `None` once every source page is indexed and `target` is still out of range.
    async fn extend_to(&self, target: usize) -> Result<Option<String>, Error> {
        loop {
            if let Some(link) = self.shared.link(target).await {
                return Ok(Some(link));
            }

            let _indexing = self.shared.index_lock.lock().await;
            let record = self.shared.refresh().await?;
            if self.shared.link(target).await.is_some() {
                continue;
            }
            if self.shared.index_next_page(&record).await?.is_none() {
                return Ok(None);
            }
        }
    }
}

/// Index the next source page early when the reader nears the known end.
async fn index_ahead(shared: Arc<Shared>, distance: usize) {
    let remaining = shared.state.read().await.remaining();
    if remaining > distance {
        return;
    }
    let Ok(_indexing) = shared.index_lock.try_lock() else {
        tracing::debug!(gallery_id = %shared.gallery_id, "indexing already in flight");
        return;
    };

    let result = match shared.refresh().await {
        Ok(record) => shared.index_next_page(&record).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(Some(page_index)) => {
            tracing::info!(gallery_id = %shared.gallery_id, page_index, remaining, "indexed ahead of reader");
        }
        Ok(None) => tracing::debug!(gallery_id = %shared.gallery_id, "no source pages left to index"),
        Err(e) => tracing::warn!(gallery_id = %shared.gallery_id, error = %e, "proactive indexing failed"),
    }
}

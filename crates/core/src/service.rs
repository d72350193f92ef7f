//! Background store service.
//!
//! The store runs as its own task and is reached only through messages: a
//! [`StoreClient`] sends a [`Request`] with a oneshot reply channel and
//! awaits the [`Response`]. Requests are handled concurrently; the store
//! itself serializes work per gallery id.

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

use crate::Error;
use crate::eviction::PreloadCache;
use crate::protocol::{Request, Response, dispatch};
use crate::store::{GalleryRecord, GalleryStore};

const CHANNEL_CAPACITY: usize = 64;

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Result<Response, Error>>,
}

/// Owner of the store task.
pub struct StoreService;

impl StoreService {
    /// Start serving `store`.
    ///
    /// The task stops once every [`StoreClient`] clone is dropped, after
    /// in-flight requests finish and the store has been flushed.
    pub fn spawn(store: GalleryStore) -> (StoreClient, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(run(store, rx));
        (StoreClient { tx }, handle)
    }
}

async fn run(store: GalleryStore, mut rx: mpsc::Receiver<Envelope>) {
    tracing::info!("gallery store service started");
    let mut inflight = JoinSet::new();

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(Envelope { request, reply }) = message else { break };
                let store = store.clone();
                inflight.spawn(async move {
                    let kind = request.kind();
                    let result = dispatch(&store, request).await;
                    if let Err(e) = &result {
                        tracing::warn!(kind, error = %e, "store request failed");
                    }
                    let _ = reply.send(result);
                });
            }
            Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "store request task panicked");
                }
            }
        }
    }

    while inflight.join_next().await.is_some() {}

    if let Err(e) = store.close().await {
        tracing::warn!(error = %e, "failed to flush gallery store");
    }
    tracing::info!("gallery store service stopped");
}

/// Cloneable handle for sending requests to the store service.
#[derive(Clone, Debug)]
pub struct StoreClient {
    tx: mpsc::Sender<Envelope>,
}

fn unexpected(kind: &str, response: &Response) -> Error {
    Error::Protocol(format!("unexpected response to {kind}: {response:?}"))
}

impl StoreClient {
    /// Send a request and wait for its response.
    pub async fn send(&self, request: Request) -> Result<Response, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| Error::ChannelClosed("store service stopped".into()))?;
        rx.await
            .map_err(|_| Error::ChannelClosed("store service dropped the reply".into()))?
    }

    async fn acknowledge(&self, request: Request) -> Result<(), Error> {
        let kind = request.kind();
        match self.send(request).await? {
            Response::Success { .. } => Ok(()),
            other => Err(unexpected(kind, &other)),
        }
    }

    pub async fn gallery_data(&self, gallery_id: &str) -> Result<Option<GalleryRecord>, Error> {
        match self.send(Request::GetGalleryData { gallery_id: gallery_id.into() }).await? {
            Response::GalleryData(record) => Ok(record),
            other => Err(unexpected("get_gallery_data", &other)),
        }
    }

    pub async fn set_metadata(
        &self, gallery_id: &str, total_pages: Option<u32>, total_images: Option<u32>,
    ) -> Result<(), Error> {
        self.acknowledge(Request::SetGalleryMetadata { gallery_id: gallery_id.into(), total_pages, total_images })
            .await
    }

    pub async fn missing_pages(&self, gallery_id: &str, pages_to_check: Vec<u32>) -> Result<Vec<u32>, Error> {
        match self.send(Request::CheckIndexedPages { gallery_id: gallery_id.into(), pages_to_check }).await? {
            Response::MissingPages { missing_pages } => Ok(missing_pages),
            other => Err(unexpected("check_indexed_pages", &other)),
        }
    }

    pub async fn set_page_links(&self, gallery_id: &str, page_index: u32, links: Vec<String>) -> Result<(), Error> {
        self.acknowledge(Request::SetPageLinks { gallery_id: gallery_id.into(), page_index, links })
            .await
    }

    pub async fn all_links(&self, gallery_id: &str) -> Result<(Vec<String>, PreloadCache), Error> {
        match self.send(Request::GetAllLinks { gallery_id: gallery_id.into() }).await? {
            Response::AllLinks { master_list, preloaded_pages } => Ok((master_list, preloaded_pages)),
            other => Err(unexpected("get_all_links", &other)),
        }
    }

    pub async fn page_links(&self, gallery_id: &str, page_index: u32) -> Result<Option<Vec<String>>, Error> {
        match self.send(Request::GetSpecificPageLinks { gallery_id: gallery_id.into(), page_index }).await? {
            Response::PageLinks { links } => Ok(links),
            other => Err(unexpected("get_specific_page_links", &other)),
        }
    }

    pub async fn cache_image(&self, gallery_id: &str, page_url: &str, image_url: &str) -> Result<(), Error> {
        self.acknowledge(Request::CacheImage {
            gallery_id: gallery_id.into(),
            page_url: page_url.into(),
            image_url: image_url.into(),
        })
        .await
    }

    pub async fn clear_gallery(&self, gallery_id: &str) -> Result<(), Error> {
        self.acknowledge(Request::ClearGalleryCache { gallery_id: gallery_id.into() }).await
    }

    pub async fn clear_all(&self) -> Result<u64, Error> {
        match self.send(Request::ClearAllCache).await? {
            Response::Cleared { cleared_count, .. } => Ok(cleared_count),
            other => Err(unexpected("clear_all_cache", &other)),
        }
    }
}

//! Store message protocol.
//!
//! Requests are a closed tagged union keyed by `type`; responses are plain
//! objects whose shape depends on the request. [`dispatch`] is the single
//! exhaustive handler, so adding a request variant without handling it does
//! not compile.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::eviction::PreloadCache;
use crate::store::{GalleryRecord, GalleryStore};

/// A message sent to the background store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Full record, or `null` if the gallery was never created.
    #[serde(rename_all = "camelCase")]
    GetGalleryData { gallery_id: String },

    #[serde(rename_all = "camelCase")]
    SetGalleryMetadata {
        gallery_id: String,
        #[serde(default)]
        total_pages: Option<u32>,
        #[serde(default)]
        total_images: Option<u32>,
    },

    /// Which of `pages_to_check` are not indexed yet.
    #[serde(rename_all = "camelCase")]
    CheckIndexedPages { gallery_id: String, pages_to_check: Vec<u32> },

    #[serde(rename_all = "camelCase")]
    SetPageLinks { gallery_id: String, page_index: u32, links: Vec<String> },

    /// Assembled master list and the preload cache.
    #[serde(rename_all = "camelCase")]
    GetAllLinks { gallery_id: String },

    #[serde(rename_all = "camelCase")]
    GetSpecificPageLinks { gallery_id: String, page_index: u32 },

    /// Record a resolved resource URL for an item link.
    #[serde(rename_all = "camelCase")]
    CacheImage { gallery_id: String, page_url: String, image_url: String },

    #[serde(rename_all = "camelCase")]
    ClearGalleryCache { gallery_id: String },

    ClearAllCache,
}

impl Request {
    /// Wire tag of this request.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::GetGalleryData { .. } => "get_gallery_data",
            Request::SetGalleryMetadata { .. } => "set_gallery_metadata",
            Request::CheckIndexedPages { .. } => "check_indexed_pages",
            Request::SetPageLinks { .. } => "set_page_links",
            Request::GetAllLinks { .. } => "get_all_links",
            Request::GetSpecificPageLinks { .. } => "get_specific_page_links",
            Request::CacheImage { .. } => "cache_image",
            Request::ClearGalleryCache { .. } => "clear_gallery_cache",
            Request::ClearAllCache => "clear_all_cache",
        }
    }

    /// Gallery this request targets, if any.
    pub fn gallery_id(&self) -> Option<&str> {
        match self {
            Request::GetGalleryData { gallery_id }
            | Request::SetGalleryMetadata { gallery_id, .. }
            | Request::CheckIndexedPages { gallery_id, .. }
            | Request::SetPageLinks { gallery_id, .. }
            | Request::GetAllLinks { gallery_id }
            | Request::GetSpecificPageLinks { gallery_id, .. }
            | Request::CacheImage { gallery_id, .. }
            | Request::ClearGalleryCache { gallery_id } => Some(gallery_id),
            Request::ClearAllCache => None,
        }
    }

    /// Reject malformed requests before they reach the store.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(gallery_id) = self.gallery_id()
            && gallery_id.trim().is_empty()
        {
            return Err(Error::InvalidInput(format!("{}: galleryId is required", self.kind())));
        }

        if let Request::CacheImage { page_url, image_url, .. } = self {
            if page_url.trim().is_empty() {
                return Err(Error::InvalidInput("cache_image: pageUrl is required".into()));
            }
            if image_url.trim().is_empty() {
                return Err(Error::InvalidInput("cache_image: imageUrl is required".into()));
            }
        }

        Ok(())
    }
}

/// Reply from the background store.
///
/// Serialized without a tag; each shape is the one documented for its request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Response {
    /// `get_gallery_data`: the record or `null`.
    GalleryData(Option<GalleryRecord>),

    /// `clear_all_cache`.
    #[serde(rename_all = "camelCase")]
    Cleared { success: bool, cleared_count: u64 },

    /// `check_indexed_pages`.
    #[serde(rename_all = "camelCase")]
    MissingPages { missing_pages: Vec<u32> },

    /// `get_all_links`.
    #[serde(rename_all = "camelCase")]
    AllLinks {
        master_list: Vec<String>,
        #[schemars(with = "std::collections::BTreeMap<String, String>")]
        preloaded_pages: PreloadCache,
    },

    /// Acknowledgement for mutations.
    Success { success: bool },

    /// `get_specific_page_links`.
    PageLinks { links: Option<Vec<String>> },
}

impl Response {
    pub fn success() -> Self {
        Response::Success { success: true }
    }
}

/// Error frame written in place of a response when a request fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorFrame {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<&Error> for ErrorFrame {
    fn from(err: &Error) -> Self {
        ErrorFrame { error: ErrorBody { code: err.code().to_string(), message: err.to_string() } }
    }
}

/// Handle one request against the store.
pub async fn dispatch(store: &GalleryStore, request: Request) -> Result<Response, Error> {
    request.validate()?;

    let response = match request {
        Request::GetGalleryData { gallery_id } => Response::GalleryData(store.get(&gallery_id).await?),
        Request::SetGalleryMetadata { gallery_id, total_pages, total_images } => {
            store.set_metadata(&gallery_id, total_pages, total_images).await?;
            Response::success()
        }
        Request::CheckIndexedPages { gallery_id, pages_to_check } => {
            Response::MissingPages { missing_pages: store.missing_pages(&gallery_id, &pages_to_check).await? }
        }
        Request::SetPageLinks { gallery_id, page_index, links } => {
            store.set_page_links(&gallery_id, page_index, &links).await?;
            Response::success()
        }
        Request::GetAllLinks { gallery_id } => {
            let (master_list, preloaded_pages) = store.master_list(&gallery_id).await?;
            Response::AllLinks { master_list, preloaded_pages }
        }
        Request::GetSpecificPageLinks { gallery_id, page_index } => {
            Response::PageLinks { links: store.page_links(&gallery_id, page_index).await? }
        }
        Request::CacheImage { gallery_id, page_url, image_url } => {
            store.record_preload(&gallery_id, &page_url, &image_url).await?;
            Response::success()
        }
        Request::ClearGalleryCache { gallery_id } => {
            store.clear(&gallery_id).await?;
            Response::success()
        }
        Request::ClearAllCache => {
            let cleared_count = store.clear_all().await?;
            Response::Cleared { success: true, cleared_count }
        }
    };

    Ok(response)
}

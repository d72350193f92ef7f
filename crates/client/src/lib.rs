//! Client code for pagewalk.
//!
//! This crate provides the page fetch primitive, gallery page extraction
//! and the indexer that records source pages into the store.

pub mod extract;
pub mod fetch;
pub mod indexer;

pub use extract::{GalleryMeta, extract_gallery_meta, extract_item_links, extract_resource_url};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, PageSource, RetryError, RetryPolicy};
pub use indexer::{IndexReport, Indexer};

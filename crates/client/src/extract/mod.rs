//! Gallery page extraction.
//!
//! Pure functions over fetched HTML:
//! - [`extract_item_links`]: ordered item links from a listing page's content region
//! - [`extract_gallery_meta`]: page and item counts from pagination and caption
//! - [`extract_resource_url`]: direct resource URL from an item page

pub mod links;
pub mod meta;

pub use links::{extract_item_links, extract_resource_url};
pub use meta::{GalleryMeta, extract_gallery_meta};

use pagewalk_core::Error;
use scraper::Selector;

/// Parse a configured CSS selector.
pub(crate) fn selector(css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|e| Error::InvalidInput(format!("invalid selector {css:?}: {e}")))
}

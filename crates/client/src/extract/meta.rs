//! Gallery metadata: source page count and item count.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;

static IMAGE_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)of\s+([\d,]+)\s+images?").expect("invalid image count pattern"));

/// Counts discovered on a listing page. `None` when the marker was absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GalleryMeta {
    pub total_pages: Option<u32>,
    pub total_images: Option<u32>,
}

/// Read the pagination table and the "Showing a - b of N images" caption.
///
/// The page count is the largest numeric cell in the pagination table.
pub fn extract_gallery_meta(html: &str) -> GalleryMeta {
    let document = Html::parse_document(html);
    let pagination = Selector::parse("table.ptt td").expect("invalid selector");
    let caption = Selector::parse(".gpc").expect("invalid selector");

    let total_pages = document
        .select(&pagination)
        .filter_map(|cell| cell.text().collect::<String>().trim().parse::<u32>().ok())
        .max();

    let total_images = document.select(&caption).find_map(|element| {
        let text = element.text().collect::<String>();
        IMAGE_COUNT
            .captures(&text)
            .and_then(|caps| caps[1].replace(',', "").parse::<u32>().ok())
    });

    GalleryMeta { total_pages, total_images }
}

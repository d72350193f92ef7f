//! Item link harvesting and resource URL resolution.

use std::collections::HashSet;

use pagewalk_core::Error;
use scraper::Html;
use url::Url;

use super::selector;

/// Extract item links from a gallery listing page.
///
/// Selects `item_selector` (anchors inside the content region), resolves
/// each `href` against `base_url` and drops duplicates, keeping document
/// order. An empty result means the page did not have the expected markup.
pub fn extract_item_links(html: &str, base_url: &Url, item_selector: &str) -> Result<Vec<String>, Error> {
    let document = Html::parse_document(html);
    let selector = selector(item_selector)?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let resolved = match base_url.join(href.trim()) {
            Ok(u) => u.to_string(),
            Err(_) => continue,
        };

        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }

    Ok(links)
}

/// Resolve the direct resource URL (the image `src`) on an item page.
pub fn extract_resource_url(html: &str, base_url: &Url, image_selector: &str) -> Result<Option<String>, Error> {
    let document = Html::parse_document(html);
    let selector = selector(image_selector)?;

    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().attr("src"))
        .find_map(|src| base_url.join(src.trim()).ok())
        .map(|u| u.to_string()))
}

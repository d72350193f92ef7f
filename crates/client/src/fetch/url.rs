//! Gallery URL handling: canonicalization, page addressing and gallery ids.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Query parameter carrying the zero-based source page index.
pub const PAGE_PARAM: &str = "p";

static GALLERY_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/g/(\d+)/([0-9A-Za-z]+)/?").expect("invalid gallery path pattern"));

/// Error type for URL handling failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("not a gallery URL: {0}")]
    NotAGallery(String),
}

impl From<UrlError> for pagewalk_core::Error {
    fn from(err: UrlError) -> Self {
        pagewalk_core::Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize a URL string.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Address of source page `page_index` of the gallery at `base`.
///
/// Page 0 carries no page parameter; every other page sets `p=<index>`.
/// Unrelated query parameters are preserved in order.
pub fn page_url(base: &Url, page_index: u32) -> Url {
    let retained: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != PAGE_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    url.set_query(None);

    if !retained.is_empty() || page_index > 0 {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        if page_index > 0 {
            pairs.append_pair(PAGE_PARAM, &page_index.to_string());
        }
    }

    url
}

/// Gallery id (`<id>/<token>`) from a `/g/<id>/<token>/` URL.
pub fn gallery_id_from_url(url: &Url) -> Result<String, UrlError> {
    GALLERY_PATH
        .captures(url.path())
        .map(|caps| format!("{}/{}", &caps[1], &caps[2]))
        .ok_or_else(|| UrlError::NotAGallery(url.to_string()))
}

/// Gallery root URL: scheme, host and `/g/<id>/<token>/` with no query.
pub fn gallery_base(url: &Url) -> Result<Url, UrlError> {
    let id = gallery_id_from_url(url)?;
    let mut base = url.clone();
    base.set_path(&format!("/g/{id}/"));
    base.set_query(None);
    base.set_fragment(None);
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("example.org/g/1/abc/").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.org"));
    }

    #[test]
    fn test_canonicalize_lowercase_host_and_fragment() {
        let url = canonicalize("  https://EXAMPLE.ORG/g/1/abc/#top ").unwrap();
        assert_eq!(url.as_str(), "https://example.org/g/1/abc/");
    }

    #[test]
    fn test_canonicalize_rejects() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
        assert!(matches!(canonicalize("file:///etc/passwd"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_page_url_omits_param_for_first_page() {
        let base = Url::parse("https://example.org/g/1/abc/?p=3").unwrap();
        assert_eq!(page_url(&base, 0).as_str(), "https://example.org/g/1/abc/");
    }

    #[test]
    fn test_page_url_sets_index() {
        let base = Url::parse("https://example.org/g/1/abc/").unwrap();
        assert_eq!(page_url(&base, 2).as_str(), "https://example.org/g/1/abc/?p=2");
    }

    #[test]
    fn test_page_url_preserves_other_params() {
        let base = Url::parse("https://example.org/g/1/abc/?hc=1&p=5").unwrap();
        assert_eq!(page_url(&base, 1).as_str(), "https://example.org/g/1/abc/?hc=1&p=1");
        assert_eq!(page_url(&base, 0).as_str(), "https://example.org/g/1/abc/?hc=1");
    }

    #[test]
    fn test_gallery_id_from_url() {
        let url = Url::parse("https://example.org/g/2231/9f0e1d/?p=1").unwrap();
        assert_eq!(gallery_id_from_url(&url).unwrap(), "2231/9f0e1d");

        let other = Url::parse("https://example.org/s/aa/2231-3").unwrap();
        assert!(matches!(gallery_id_from_url(&other), Err(UrlError::NotAGallery(_))));
    }

    #[test]
    fn test_gallery_base_strips_query() {
        let url = Url::parse("https://example.org/g/2231/9f0e1d/?p=4#x").unwrap();
        assert_eq!(gallery_base(&url).unwrap().as_str(), "https://example.org/g/2231/9f0e1d/");
    }
}

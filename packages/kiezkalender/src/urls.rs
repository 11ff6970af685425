//! Small URL helpers shared across the pipeline.

use url::Url;

/// Resolve `href` against `base`. Absolute hrefs pass through; if the base
/// itself cannot be parsed the href is returned unchanged.
pub(crate) fn absolutize(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// True for http(s) URLs with a host.
pub(crate) fn is_valid_http(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// Hrefs that never lead to another page.
pub(crate) fn is_skippable_href(href: &str) -> bool {
    let href = href.trim();
    href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
}

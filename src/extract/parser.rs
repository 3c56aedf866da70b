//! HTML parser for extracting page text and image references

use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Elements whose text is never visible on the rendered page
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    /// Visible body text, one trimmed text node per line
    pub text: String,

    /// Absolute image URLs (deduplicated)
    pub image_urls: BTreeSet<String>,
}

/// Parses HTML content and extracts text and image URLs
///
/// # Image Extraction Rules
///
/// **Include:**
/// - `<img src="...">`
/// - `<img data-src="...">` when `src` is missing, empty, or only whitespace
///   (lazy loading). A whitespace-only `src` would otherwise resolve to the
///   page itself.
///
/// **Exclude:**
/// - Inline `data:` images
/// - References that do not resolve to an HTTP(S) URL
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The base URL for resolving relative references. The
///   harvester passes the page's final URL after redirects, the way a browser
///   resolves them, so `img/a.png` on a page reached via `/` -> `/en/home`
///   becomes `/en/img/a.png` rather than `/img/a.png`.
///
/// # Example
///
/// ```
/// use page_harvest::extract::extract_content;
/// use url::Url;
///
/// let html = r#"<html><body><p>Hello</p><img src="/logo.png"></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let content = extract_content(html, &base_url);
/// assert_eq!(content.text, "Hello");
/// assert!(content.image_urls.contains("https://example.com/logo.png"));
/// ```
pub fn extract_content(html: &str, base_url: &Url) -> ExtractedContent {
    let document = Html::parse_document(html);

    let text = extract_text(&document);
    let image_urls = extract_image_urls(&document, base_url);

    tracing::debug!(
        "Extracted {} characters of text and {} unique image URLs",
        text.chars().count(),
        image_urls.len()
    );

    ExtractedContent { text, image_urls }
}

/// Collects the visible text under `<body>`
fn extract_text(document: &Html) -> String {
    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };
    let Some(body) = document.select(&body_selector).next() else {
        return String::new();
    };

    body.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|element| INVISIBLE_ELEMENTS.contains(&element.value().name()));
            if hidden {
                None
            } else {
                Some(text.trim())
            }
        })
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts all downloadable image URLs from the HTML document
fn extract_image_urls(document: &Html, base_url: &Url) -> BTreeSet<String> {
    let mut urls = BTreeSet::new();

    let Ok(img_selector) = Selector::parse("img") else {
        return urls;
    };

    for element in document.select(&img_selector) {
        let reference = element
            .value()
            .attr("src")
            .filter(|src| !src.trim().is_empty())
            .or_else(|| element.value().attr("data-src"));

        if let Some(absolute_url) = reference.and_then(|r| resolve_image(r, base_url)) {
            urls.insert(absolute_url);
        }
    }

    urls
}

/// Resolves an image reference to an absolute URL
///
/// Returns None if the reference should be excluded:
/// - empty references
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_image(reference: &str, base_url: &Url) -> Option<String> {
    let reference = reference.trim();

    if reference.is_empty() {
        return None;
    }

    if reference
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
    {
        return None;
    }

    match base_url.join(reference) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

//! Listing-document validation
//!
//! Decides whether a fetched payload is worth handing to the parser. A fetch
//! that yields HTTP 200 can still be useless: truncated bodies, soft-404
//! pages, and pretty HTML error screens all come back with success status.
//! Validation failures count as silent fetch failures and trigger the next
//! fallback candidate; they are never errors.

use scraper::{Html, Selector};

/// Phrases that identify an error page when they appear near the top of the
/// payload or in an HTML title
const ERROR_FINGERPRINTS: &[&str] = &[
    "404 not found",
    "403 forbidden",
    "page not found",
    "access denied",
    "service unavailable",
];

/// Returns true when the payload looks like a genuine, uncorrupted listing
/// document.
///
/// Rejects near-empty payloads, payloads without any location tag, and known
/// error-page shapes. Pure function; the `source_url` only feeds the trace
/// output.
pub fn looks_like_listing(body: &str, source_url: &str) -> bool {
    let trimmed = body.trim();

    if trimmed.len() < 10 {
        tracing::debug!(url = %source_url, "rejecting near-empty listing payload");
        return false;
    }

    if is_error_page(trimmed) {
        tracing::debug!(url = %source_url, "rejecting error-page payload");
        return false;
    }

    if !trimmed.contains("<loc") {
        tracing::debug!(url = %source_url, "payload has no location tags");
        return false;
    }

    true
}

/// Checks the head of the payload, and the `<title>` of HTML payloads, for
/// error-page fingerprints.
fn is_error_page(body: &str) -> bool {
    let head: String = body.chars().take(512).collect::<String>().to_lowercase();

    if ERROR_FINGERPRINTS.iter().any(|f| head.contains(f)) {
        return true;
    }

    if head.contains("<html") || head.contains("<!doctype html") {
        let document = Html::parse_document(body);
        if let Ok(selector) = Selector::parse("title") {
            if let Some(title) = document.select(&selector).next() {
                let title = title.text().collect::<String>().to_lowercase();
                return title.contains("404")
                    || title.contains("403")
                    || title.contains("error")
                    || title.contains("not found")
                    || title.contains("forbidden");
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/recipe/pasta/</loc></url>
</urlset>"#;

    #[test]
    fn test_accepts_urlset() {
        assert!(looks_like_listing(VALID_URLSET, "https://example.com/sitemap.xml"));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(!looks_like_listing("", "https://example.com/sitemap.xml"));
        assert!(!looks_like_listing("   \n  ", "https://example.com/sitemap.xml"));
        assert!(!looks_like_listing("<loc>", "https://example.com/sitemap.xml"));
    }

    #[test]
    fn test_rejects_missing_location_tags() {
        let body = r#"<?xml version="1.0"?><urlset></urlset>"#;
        assert!(!looks_like_listing(body, "https://example.com/sitemap.xml"));
    }

    #[test]
    fn test_rejects_plain_error_text() {
        assert!(!looks_like_listing(
            "404 Not Found - nothing here",
            "https://example.com/sitemap.xml"
        ));
        assert!(!looks_like_listing(
            "403 Forbidden: request blocked",
            "https://example.com/sitemap.xml"
        ));
    }

    #[test]
    fn test_rejects_html_error_page() {
        let body = r#"<!DOCTYPE html><html><head><title>Oops! Page Not Found</title></head>
<body><p>The page you requested could not be located. <loc></p></body></html>"#;
        assert!(!looks_like_listing(body, "https://example.com/sitemap.xml"));
    }

    #[test]
    fn test_error_title_without_fingerprint_text() {
        let body = format!(
            "<html><head><title>Error</title></head><body>{}</body></html>",
            "x".repeat(50)
        );
        assert!(!looks_like_listing(&body, "https://example.com/sitemap.xml"));
    }
}

//! URL handling for Ladle
//!
//! Normalization (visited-set keys), host extraction, wildcard domain
//! patterns, and the content-vs-listing page classifier.

mod classify;
mod domain;
mod matcher;
mod normalize;

pub use classify::{ClassifierRules, DomainOverride};
pub use domain::extract_domain;
pub use matcher::matches_wildcard;
pub use normalize::normalize_url;

/// Returns true when a URL's final path segment looks like a reference to
/// another listing document rather than a content page.
///
/// Used to recognize nested indexes that surface inside leaf containers of
/// malformed documents (the permissive extraction path cannot rely on the
/// container element to tag them).
pub fn is_listing_ref(url: &::url::Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    let last = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("");
    last.ends_with(".xml") || last.ends_with(".xml.gz") || last.contains("sitemap")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::url::Url;

    #[test]
    fn test_listing_ref_by_extension() {
        let url = Url::parse("https://example.com/wp-sitemap-posts-1.xml").unwrap();
        assert!(is_listing_ref(&url));

        let url = Url::parse("https://example.com/maps/posts.xml.gz").unwrap();
        assert!(is_listing_ref(&url));
    }

    #[test]
    fn test_listing_ref_by_name() {
        let url = Url::parse("https://example.com/sitemap").unwrap();
        assert!(is_listing_ref(&url));
    }

    #[test]
    fn test_content_page_is_not_listing_ref() {
        let url = Url::parse("https://example.com/recipe/garlic-butter-naan/").unwrap();
        assert!(!is_listing_ref(&url));
    }
}

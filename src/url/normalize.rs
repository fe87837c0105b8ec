//! Listing-URL normalization
//!
//! The visited set is keyed by normalized URL strings so that trivially
//! different spellings of the same listing document are fetched exactly once
//! per run.

use crate::UrlError;
use url::Url;

/// Query parameters that carry tracking state, never document identity
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Normalizes a URL for deduplication.
///
/// Steps: parse and require an HTTP(S) scheme, lowercase the host and strip a
/// leading `www.`, collapse dot segments and duplicate slashes in the path,
/// drop the fragment, drop tracking query parameters and sort the remainder.
///
/// # Examples
///
/// ```
/// use ladle::normalize_url;
///
/// let url = normalize_url("https://WWW.Example.com/a//b/../sitemap.xml#frag").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/a/sitemap.xml");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "expected http or https, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("failed to set host: {}", e)))?;

    let cleaned = clean_path(url.path());
    url.set_path(&cleaned);

    url.set_fragment(None);

    if url.query().is_some() {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.sort();

        if params.is_empty() {
            url.set_query(None);
        } else {
            let query = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
    }

    Ok(url)
}

/// Removes `.`/`..` segments and duplicate slashes, and strips the trailing
/// slash everywhere except the root path.
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_host_and_strips_www() {
        let url = normalize_url("https://WWW.EXAMPLE.COM/sitemap.xml").unwrap();
        assert_eq!(url.as_str(), "https://example.com/sitemap.xml");
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        assert!(normalize_url("ftp://example.com/sitemap.xml").is_err());
        assert!(normalize_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(normalize_url("not a url at all").is_err());
    }

    #[test]
    fn test_strips_fragment() {
        let url = normalize_url("https://example.com/sitemap.xml#section").unwrap();
        assert_eq!(url.as_str(), "https://example.com/sitemap.xml");
    }

    #[test]
    fn test_removes_trailing_slash() {
        let url = normalize_url("https://example.com/recipes/sitemap/").unwrap();
        assert_eq!(url.as_str(), "https://example.com/recipes/sitemap");
    }

    #[test]
    fn test_root_path_keeps_slash() {
        let url = normalize_url("https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_collapses_dot_segments() {
        let url = normalize_url("https://example.com/a/./b/../sitemap.xml").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a/sitemap.xml");
    }

    #[test]
    fn test_drops_tracking_params_and_sorts_rest() {
        let url =
            normalize_url("https://example.com/map.xml?utm_source=x&page=2&filter=a").unwrap();
        assert_eq!(url.as_str(), "https://example.com/map.xml?filter=a&page=2");
    }

    #[test]
    fn test_all_params_tracking_drops_query() {
        let url = normalize_url("https://example.com/map.xml?utm_source=x&fbclid=y").unwrap();
        assert_eq!(url.as_str(), "https://example.com/map.xml");
    }

    #[test]
    fn test_http_allowed_for_local_servers() {
        let url = normalize_url("http://127.0.0.1:8080/sitemap.xml").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/sitemap.xml");
    }
}

use url::Url;

/// Extracts the lowercase host from a URL.
///
/// Returns `None` for URLs without a host, which cannot occur for well-formed
/// HTTP(S) URLs but callers still have to handle.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ladle::extract_domain;
///
/// let url = Url::parse("https://Blog.Example.COM/recipe/soup/").unwrap();
/// assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_host() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_subdomain_host() {
        let url = Url::parse("https://api.v2.example.com/endpoint").unwrap();
        assert_eq!(extract_domain(&url), Some("api.v2.example.com".to_string()));
    }

    #[test]
    fn test_extract_lowercases() {
        let url = Url::parse("https://EXAMPLE.COM/Path").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_port_is_not_part_of_domain() {
        let url = Url::parse("https://example.com:8443/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }
}

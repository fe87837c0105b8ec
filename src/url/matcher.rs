/// Checks whether a domain matches a pattern from the override registry.
///
/// Two pattern shapes are supported:
/// - exact: `"example.com"` matches only `example.com`
/// - wildcard: `"*.example.com"` matches `example.com` itself and every
///   subdomain (`www.example.com`, `cdn.img.example.com`, ...)
///
/// Both sides are expected to be lowercase already; matching is
/// case-sensitive.
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

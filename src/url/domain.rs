use url::Url;

/// Extracts the host from a URL
///
/// Returns the lowercase host portion of a URL. Hosts are the unit of
/// politeness pacing and domain-scope checks, so they are always compared
/// in lowercase form. Returns None if the URL has no host (which cannot
/// happen for a URL that passed normalization).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use harvestman::url::extract_host;
///
/// let url = Url::parse("https://Blog.Example.com/post").unwrap();
/// assert_eq!(extract_host(&url), Some("blog.example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_host() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_subdomain_host() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(extract_host(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_extract_host_ignores_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_host_lowercases() {
        let url = Url::parse("https://Example.COM/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_host_with_path_and_query() {
        let url = Url::parse("https://example.com/path?query=value").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }
}

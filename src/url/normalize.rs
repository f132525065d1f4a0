use crate::UrlError;
use url::Url;

/// Normalizes a URL into the canonical form used as the dedup key
///
/// Two URLs that are semantically equivalent must normalize identically,
/// since the frontier's visited-set is keyed on the normalized string.
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject non-HTTP(S) schemes
/// 3. Lowercase the host
/// 4. Drop an explicit default port (`:80` for http, `:443` for https)
/// 5. Normalize the path:
///    - Remove dot segments (`.` and `..`)
///    - Collapse duplicate slashes
///    - Remove trailing slash (except for the root `/`)
///    - Empty path becomes `/`
/// 6. Remove the fragment
/// 7. Sort query parameters alphabetically by key
/// 8. Remove an empty query string (trailing `?`)
///
/// Unlike more aggressive canonicalizers, this keeps the scheme, the
/// `www.` prefix, and every query parameter: those distinctions are
/// semantically meaningful, and collapsing them would merge pages that
/// may serve different content.
///
/// # Examples
///
/// ```
/// use harvestman::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.COM:443/page/?b=2&a=1#frag").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page?a=1&b=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // Lowercase the host. The url crate already strips default ports
    // during parsing, so step 4 needs no explicit handling.
    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            url.set_host(Some(&lowered))
                .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
        }
    } else {
        return Err(UrlError::MissingHost);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let sorted = sorted_query_params(&url);

        if sorted.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(sorted).finish();
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            // Skip empty segments (from duplicate slashes) and current-dir markers
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Collects query parameters sorted alphabetically by key
fn sorted_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();

    params
}

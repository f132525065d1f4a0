//! HTML parser for extracting links and page metadata
//!
//! Parsing is best-effort: malformed HTML still yields a document with
//! whatever title, text, and links could be recovered. Only a non-HTML
//! content type is reported as a typed failure, which the caller records
//! on the page node without aborting the crawl.

use encoding_rs::{Encoding, UTF_8};
use scraper::{Html, Selector};
use url::Url;

/// A parsed page
#[derive(Debug, Clone)]
pub struct Document {
    /// The page title (from the `<title>` tag)
    pub title: Option<String>,

    /// Visible text content, whitespace-collapsed
    pub text: String,

    /// Links in document order, duplicates preserved
    pub links: Vec<PageLink>,
}

/// A hyperlink discovered in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Absolute URL, resolved against the page's final URL
    pub url: Url,

    /// Anchor text, trimmed; may be empty
    pub anchor: String,
}

/// Why a fetched body could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// The response was not an HTML document
    NotHtml { content_type: String },
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotHtml { content_type } => {
                write!(f, "not parseable as html: '{}'", content_type)
            }
        }
    }
}

/// Parses a fetched body into a document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document
/// - `rel="nofollow"` links (the engine is not a search indexer)
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` hrefs
/// - Fragment-only hrefs (same-page anchors)
/// - Anything that does not resolve to an HTTP(S) URL
///
/// # Arguments
///
/// * `body` - The response body
/// * `content_type` - The Content-Type header value (may be empty)
/// * `base_url` - The final URL after redirects, for resolving relative links
///
/// # Example
///
/// ```
/// use harvestman::crawler::parse_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let doc = parse_page(html, "text/html; charset=utf-8", &base).unwrap();
/// assert_eq!(doc.title.as_deref(), Some("Test"));
/// assert_eq!(doc.links.len(), 1);
/// ```
pub fn parse_page(
    body: &str,
    content_type: &str,
    base_url: &Url,
) -> Result<Document, ParseFailure> {
    if !is_html_content_type(content_type) {
        return Err(ParseFailure::NotHtml {
            content_type: content_type.to_string(),
        });
    }

    let document = Html::parse_document(body);

    Ok(Document {
        title: extract_title(&document),
        text: extract_text(&document),
        links: extract_links(&document, base_url),
    })
}

/// Decodes raw response bytes using the charset from the Content-Type
/// header, falling back to UTF-8
///
/// Unknown or absent charsets decode as UTF-8 with replacement characters
/// for invalid sequences, so this never fails.
pub fn decode_body(bytes: &[u8], content_type: &str) -> String {
    let encoding = charset_from_content_type(content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Pulls the charset parameter out of a Content-Type header value
fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

/// An empty content type is treated as HTML and parsed best-effort
fn is_html_content_type(content_type: &str) -> bool {
    let ct = content_type.trim();
    ct.is_empty() || ct.contains("text/html") || ct.contains("application/xhtml+xml")
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Collects visible text, skipping non-rendered subtrees
fn extract_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        if let Some(text) = node.value().as_text() {
            let hidden = node.ancestors().any(|ancestor| {
                ancestor.value().as_element().is_some_and(|el| {
                    matches!(el.name(), "script" | "style" | "noscript" | "head")
                })
            });
            if hidden {
                continue;
            }

            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
    }

    parts.join(" ")
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<PageLink> {
    let mut links = Vec::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        if let Some(href) = element.value().attr("href") {
            if let Some(url) = resolve_link(href, base_url) {
                links.push(PageLink {
                    url,
                    anchor: element.text().collect::<String>().trim().to_string(),
                });
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;

    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    fn parse(html: &str) -> Document {
        parse_page(html, "text/html", &base_url()).unwrap()
    }

    #[test]
    fn test_extract_title() {
        let doc = parse(r#"<html><head><title>Test Page</title></head><body></body></html>"#);
        assert_eq!(doc.title, Some("Test Page".to_string()));
    }

    #[test]
    fn test_extract_title_with_whitespace() {
        let doc = parse(r#"<html><head><title>  Test Page  </title></head><body></body></html>"#);
        assert_eq!(doc.title, Some("Test Page".to_string()));
    }

    #[test]
    fn test_no_title() {
        let doc = parse(r#"<html><head></head><body></body></html>"#);
        assert_eq!(doc.title, None);
    }

    #[test]
    fn test_non_html_content_type() {
        let result = parse_page("%PDF-1.4", "application/pdf", &base_url());
        assert_eq!(
            result.unwrap_err(),
            ParseFailure::NotHtml {
                content_type: "application/pdf".to_string()
            }
        );
    }

    #[test]
    fn test_empty_content_type_parsed_best_effort() {
        let doc = parse_page("<title>Untyped</title>", "", &base_url()).unwrap();
        assert_eq!(doc.title, Some("Untyped".to_string()));
    }

    #[test]
    fn test_malformed_html_degrades_gracefully() {
        let doc = parse(r#"<html><body><a href="/a">Link<div></span></html>"#);
        assert_eq!(doc.links.len(), 1);
    }

    #[test]
    fn test_extract_absolute_link() {
        let doc = parse(r#"<html><body><a href="https://other.com/page">Link</a></body></html>"#);
        assert_eq!(doc.links.len(), 1);
        assert_eq!(doc.links[0].url.as_str(), "https://other.com/page");
        assert_eq!(doc.links[0].anchor, "Link");
    }

    #[test]
    fn test_extract_relative_link() {
        let doc = parse(r#"<html><body><a href="/other">Link</a></body></html>"#);
        assert_eq!(doc.links[0].url.as_str(), "https://example.com/other");
    }

    #[test]
    fn test_extract_relative_path_link() {
        let doc = parse(r#"<html><body><a href="other">Link</a></body></html>"#);
        assert_eq!(doc.links[0].url.as_str(), "https://example.com/other");
    }

    #[test]
    fn test_duplicate_links_preserved_in_order() {
        let doc = parse(
            r#"<html><body>
                <a href="/a">First</a>
                <a href="/b">Second</a>
                <a href="/a">Again</a>
            </body></html>"#,
        );
        let urls: Vec<&str> = doc.links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/a",
                "https://example.com/b",
                "https://example.com/a"
            ]
        );
    }

    #[test]
    fn test_skip_javascript_link() {
        let doc = parse(r#"<html><body><a href="javascript:void(0)">Link</a></body></html>"#);
        assert!(doc.links.is_empty());
    }

    #[test]
    fn test_skip_mailto_link() {
        let doc = parse(r#"<html><body><a href="mailto:test@example.com">Email</a></body></html>"#);
        assert!(doc.links.is_empty());
    }

    #[test]
    fn test_skip_tel_link() {
        let doc = parse(r#"<html><body><a href="tel:+1234567890">Call</a></body></html>"#);
        assert!(doc.links.is_empty());
    }

    #[test]
    fn test_skip_data_uri() {
        let doc = parse(r#"<html><body><a href="data:text/html,<h1>x</h1>">Data</a></body></html>"#);
        assert!(doc.links.is_empty());
    }

    #[test]
    fn test_skip_download_link() {
        let doc = parse(r#"<html><body><a href="/file.pdf" download>Download</a></body></html>"#);
        assert!(doc.links.is_empty());
    }

    #[test]
    fn test_skip_fragment_only() {
        let doc = parse(r##"<html><body><a href="#section">Jump</a></body></html>"##);
        assert!(doc.links.is_empty());
    }

    #[test]
    fn test_follow_nofollow_links() {
        let doc = parse(r#"<html><body><a href="/page" rel="nofollow">Link</a></body></html>"#);
        assert_eq!(doc.links.len(), 1);
    }

    #[test]
    fn test_decode_body_defaults_to_utf8() {
        assert_eq!(decode_body("café".as_bytes(), "text/html"), "café");
    }

    #[test]
    fn test_decode_body_latin1() {
        let bytes = b"caf\xE9";
        assert_eq!(
            decode_body(bytes, "text/html; charset=iso-8859-1"),
            "café"
        );
    }

    #[test]
    fn test_decode_body_quoted_charset() {
        let bytes = b"caf\xE9";
        assert_eq!(
            decode_body(bytes, "text/html; charset=\"windows-1252\""),
            "café"
        );
    }

    #[test]
    fn test_decode_body_unknown_charset_falls_back() {
        assert_eq!(
            decode_body("café".as_bytes(), "text/html; charset=bogus"),
            "café"
        );
    }

    #[test]
    fn test_visible_text_skips_scripts() {
        let doc = parse(
            r#"<html><head><style>body { color: red }</style></head>
            <body><p>Hello</p><script>var x = 1;</script><p>world</p></body></html>"#,
        );
        assert_eq!(doc.text, "Hello world");
    }
}

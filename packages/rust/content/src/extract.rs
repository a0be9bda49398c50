//! Image-reference extraction from article bodies.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Markdown image syntax: `![alt](url "optional title")`.
static MARKDOWN_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[[^\]]*\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#).expect("valid regex")
});

/// HTML image tags: `<img src="url">`, attribute match case-insensitive,
/// single or double quotes.
static HTML_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["'][^>]*>"#).expect("valid regex"));

/// Scan an article body for embedded image references.
///
/// Both Markdown and HTML `img` syntaxes are recognized. URLs are returned
/// in order of first appearance in the body; duplicates are removed with the
/// first occurrence winning.
pub fn extract_image_urls(body: &str) -> Vec<String> {
    let mut hits: Vec<(usize, &str)> = Vec::new();

    for re in [&*MARKDOWN_IMAGE_RE, &*HTML_IMAGE_RE] {
        for caps in re.captures_iter(body) {
            if let Some(url) = caps.get(1) {
                hits.push((url.start(), url.as_str()));
            }
        }
    }

    // Two separate scans; sort by byte offset to restore document order.
    hits.sort_by_key(|(pos, _)| *pos);

    let mut seen = HashSet::new();
    let urls: Vec<String> = hits
        .into_iter()
        .filter(|(_, url)| seen.insert(*url))
        .map(|(_, url)| url.to_string())
        .collect();

    debug!(count = urls.len(), "extracted image references");
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_markdown_and_html_in_order() {
        let body = r#"![a](https://x/1.png) <img src='https://x/2.jpg'>"#;
        let urls = extract_image_urls(body);
        assert_eq!(urls, vec!["https://x/1.png", "https://x/2.jpg"]);
    }

    #[test]
    fn order_follows_first_appearance_across_syntaxes() {
        let body = r#"<img src="https://x/first.png"> then ![md](https://x/second.png)"#;
        let urls = extract_image_urls(body);
        assert_eq!(urls, vec!["https://x/first.png", "https://x/second.png"]);
    }

    #[test]
    fn duplicates_removed_first_wins() {
        let body = r#"![a](https://x/1.png) ![b](https://x/1.png) <img src="https://x/1.png">"#;
        let urls = extract_image_urls(body);
        assert_eq!(urls, vec!["https://x/1.png"]);
    }

    #[test]
    fn markdown_title_is_not_part_of_the_url() {
        let body = r#"![logo](https://x/logo.png "the logo")"#;
        let urls = extract_image_urls(body);
        assert_eq!(urls, vec!["https://x/logo.png"]);
    }

    #[test]
    fn html_attribute_is_case_insensitive() {
        let body = r#"<IMG SRC="https://x/shout.png">"#;
        let urls = extract_image_urls(body);
        assert_eq!(urls, vec!["https://x/shout.png"]);
    }

    #[test]
    fn html_double_and_single_quotes() {
        let body = r#"<img src="https://x/d.png"> <img src='https://x/s.png' alt="x">"#;
        let urls = extract_image_urls(body);
        assert_eq!(urls, vec!["https://x/d.png", "https://x/s.png"]);
    }

    #[test]
    fn empty_body_yields_nothing() {
        assert!(extract_image_urls("").is_empty());
        assert!(extract_image_urls("plain text, no images").is_empty());
    }

    #[test]
    fn non_image_links_ignored() {
        let body = "[not an image](https://x/page.html)";
        assert!(extract_image_urls(body).is_empty());
    }
}

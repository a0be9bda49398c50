//! In-body image URL rewriting.

use std::collections::BTreeMap;

use tracing::debug;

/// Replace every occurrence of each original image URL with its platform URL.
///
/// Matching is literal substring replacement — URLs routinely contain `.`,
/// `?`, `(` and other characters a pattern matcher would interpret, so no
/// pattern compilation is involved. Map entries with an empty key or value
/// are skipped.
pub fn rewrite_image_urls(body: &str, url_map: &BTreeMap<String, String>) -> String {
    let mut replaced = body.to_string();

    for (original, platform) in url_map {
        if original.is_empty() || platform.is_empty() {
            continue;
        }
        replaced = replaced.replace(original.as_str(), platform);
    }

    debug!(mappings = url_map.len(), "rewrote image references");
    replaced
}

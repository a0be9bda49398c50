//! Body-text processing for article content.
//!
//! Two concerns live here: finding image references embedded in an article
//! body (the fallback photo list when the caller supplies none), and
//! rewriting those references to their platform-hosted counterparts after
//! upload.

mod extract;
mod rewrite;

pub use extract::extract_image_urls;
pub use rewrite::rewrite_image_urls;

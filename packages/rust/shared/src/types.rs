//! Core domain types for the publishing pipeline.

use std::collections::BTreeMap;

use serde::Serialize;

// ---------------------------------------------------------------------------
// UploadedMedia
// ---------------------------------------------------------------------------

/// One successfully uploaded photo, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedMedia {
    /// The photo reference as supplied by the caller (URL, path, or data URI).
    pub original_url: String,
    /// Platform-assigned media identifier.
    pub media_id: String,
    /// Platform-hosted URL for the asset. Empty when the platform returned none.
    pub platform_url: String,
    /// Position in the input photo list. Upload order is preserved.
    pub index: usize,
}

// ---------------------------------------------------------------------------
// UploadResult
// ---------------------------------------------------------------------------

/// Aggregate outcome of uploading every photo in one invocation.
///
/// Exists only when all uploads succeeded: a single failed upload aborts the
/// invocation and no partial result is produced.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    /// Uploaded media entries, same order as the input photo list.
    pub uploaded_media: Vec<UploadedMedia>,
    /// Original reference → platform URL. Falls back to the original
    /// reference when the platform returned no substitute URL.
    pub image_url_map: BTreeMap<String, String>,
    /// Media id designated as the draft cover: the first uploaded entry.
    pub cover_media_id: String,
    /// Number of uploads performed.
    pub total_uploaded: usize,
    /// The input photo list with each entry mapped to its platform URL
    /// (or left as-is when no substitute exists). Same length and order as
    /// the input.
    pub photos: Vec<String>,
}

impl UploadResult {
    /// Assemble the aggregate from per-photo upload entries.
    ///
    /// The cover media id is the first entry's, a positional convention the
    /// sequential upload order guarantees.
    pub fn from_media(uploaded_media: Vec<UploadedMedia>, input_photos: &[String]) -> Self {
        let mut image_url_map = BTreeMap::new();
        for media in &uploaded_media {
            let mapped = if media.platform_url.is_empty() {
                media.original_url.clone()
            } else {
                media.platform_url.clone()
            };
            image_url_map.insert(media.original_url.clone(), mapped);
        }

        let cover_media_id = uploaded_media
            .first()
            .map(|m| m.media_id.clone())
            .unwrap_or_default();

        let photos = input_photos
            .iter()
            .map(|url| image_url_map.get(url).cloned().unwrap_or_else(|| url.clone()))
            .collect();

        Self {
            total_uploaded: uploaded_media.len(),
            uploaded_media,
            image_url_map,
            cover_media_id,
            photos,
        }
    }
}

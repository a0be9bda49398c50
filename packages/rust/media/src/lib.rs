//! Photo source resolution.
//!
//! A photo reference arrives as an untagged string in one of four shapes:
//! an inline `data:` URI, a remote `http(s)` URL, a `file://` URL, or a bare
//! filesystem path. Classification is an ordered chain of prefix checks, and
//! every shape resolves to the same [`ResolvedPayload`]: raw bytes plus the
//! filename and content type the upload form needs.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use reqwest::Client;
use tracing::debug;
use url::Url;

use draftgate_shared::{DraftgateError, Result};

/// Strict inline-image shape: `data:<mime>;base64,<payload>`.
static DATA_URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:([^;]+);base64,(.+)$").expect("valid regex"));

/// Recognized image filename extensions.
static IMAGE_EXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|bmp)$").expect("valid regex"));

/// MIME type → filename extension.
const MIME_EXTENSIONS: [(&str, &str); 6] = [
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/bmp", "bmp"),
];

/// Filename extension → MIME type.
const EXTENSION_CONTENT_TYPES: [(&str, &str); 6] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
];

/// A photo reference resolved to uploadable form. Created and consumed
/// within a single upload step.
#[derive(Debug, Clone)]
pub struct ResolvedPayload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// Resolve a photo reference of unknown shape into a uniform payload.
///
/// `index` is the photo's position in the input list, used for synthesized
/// filenames. Remote downloads are bound to `timeout`.
pub async fn resolve(
    client: &Client,
    reference: &str,
    index: usize,
    timeout: Duration,
) -> Result<ResolvedPayload> {
    if reference.starts_with("data:") {
        return resolve_data_uri(reference, index);
    }

    if reference.starts_with("http://") || reference.starts_with("https://") {
        return resolve_remote(client, reference, index, timeout).await;
    }

    if reference.starts_with("file://") {
        let path = file_url_to_path(reference)?;
        return resolve_file(&path, index).await;
    }

    resolve_file(Path::new(reference), index).await
}

// ---------------------------------------------------------------------------
// Inline data URIs
// ---------------------------------------------------------------------------

fn resolve_data_uri(reference: &str, index: usize) -> Result<ResolvedPayload> {
    let malformed = || DraftgateError::MalformedDataUri {
        reference: shorten(reference),
    };

    let caps = DATA_URI_RE.captures(reference).ok_or_else(malformed)?;
    let content_type = caps[1].to_string();
    let bytes = BASE64.decode(&caps[2]).map_err(|_| malformed())?;

    let extension = extension_for_mime(&content_type.to_lowercase()).unwrap_or("png");
    let filename = format!("image_{}.{extension}", index + 1);

    debug!(len = bytes.len(), %content_type, "decoded inline image");
    Ok(ResolvedPayload {
        bytes,
        filename,
        content_type,
    })
}

// ---------------------------------------------------------------------------
// Remote URLs
// ---------------------------------------------------------------------------

async fn resolve_remote(
    client: &Client,
    url: &str,
    index: usize,
    timeout: Duration,
) -> Result<ResolvedPayload> {
    debug!(%url, "downloading image");

    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DraftgateError::DownloadFailed {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();

    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(url, e))?
        .to_vec();

    let filename = filename_from_url(url, &content_type, index);

    Ok(ResolvedPayload {
        bytes,
        filename,
        content_type,
    })
}

fn transport_error(url: &str, e: reqwest::Error) -> DraftgateError {
    if e.is_timeout() {
        DraftgateError::TransportTimeout {
            url: url.to_string(),
        }
    } else {
        DraftgateError::Network(format!("{url}: {e}"))
    }
}

/// Derive an upload filename from a URL's last path segment.
///
/// The query string is stripped, and the extension is corrected to match the
/// response's declared content type when they disagree (or appended when the
/// segment has no recognized image extension).
fn filename_from_url(url: &str, content_type: &str, index: usize) -> String {
    let last = url.rsplit('/').next().unwrap_or("");
    let name = last.split('?').next().unwrap_or(last);
    let name = if name.is_empty() {
        format!("image_{}", index + 1)
    } else {
        name.to_string()
    };

    let expected = extension_for_mime(&content_type.to_lowercase()).unwrap_or("jpg");

    if !IMAGE_EXT_RE.is_match(&name) {
        return format!("{name}.{expected}");
    }

    let current = name.rsplit('.').next().unwrap_or("").to_lowercase();
    if current != expected {
        let stem = &name[..name.len() - current.len() - 1];
        return format!("{stem}.{expected}");
    }

    name
}

// ---------------------------------------------------------------------------
// Local files
// ---------------------------------------------------------------------------

/// Convert a `file://` URL to a filesystem path, percent-decoding as needed.
fn file_url_to_path(reference: &str) -> Result<PathBuf> {
    Url::parse(reference)
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .ok_or_else(|| DraftgateError::config(format!("invalid file URL: {reference}")))
}

async fn resolve_file(path: &Path, index: usize) -> Result<ResolvedPayload> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DraftgateError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => DraftgateError::io(path, e),
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    let content_type = extension
        .as_deref()
        .and_then(content_type_for_extension)
        .unwrap_or("image/jpeg")
        .to_string();

    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) if extension.is_some() => name.to_string(),
        Some(name) => format!(
            "{name}.{}",
            extension_for_mime(&content_type).unwrap_or("jpg")
        ),
        None => format!(
            "image_{}.{}",
            index + 1,
            extension_for_mime(&content_type).unwrap_or("jpg")
        ),
    };

    debug!(path = %path.display(), len = bytes.len(), "read local image");
    Ok(ResolvedPayload {
        bytes,
        filename,
        content_type,
    })
}

// ---------------------------------------------------------------------------
// Lookup tables
// ---------------------------------------------------------------------------

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    MIME_EXTENSIONS
        .iter()
        .find(|(m, _)| *m == mime)
        .map(|(_, ext)| *ext)
}

fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    EXTENSION_CONTENT_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, ct)| *ct)
}

/// Trim long references (inline payloads especially) for error messages.
fn shorten(reference: &str) -> String {
    const MAX: usize = 64;
    if reference.len() <= MAX {
        reference.to_string()
    } else {
        let cut = reference
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &reference[..cut])
    }
}

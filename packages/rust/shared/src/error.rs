//! Error types for draftgate.
//!
//! Library crates use [`DraftgateError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics and
//! renders the remediation hints attached to configuration errors.

use std::path::PathBuf;

/// Top-level error type for all draftgate operations.
///
/// Every variant is terminal for the invocation that produced it: the
/// pipeline surfaces the first error and aborts the remaining stages.
#[derive(Debug, thiserror::Error)]
pub enum DraftgateError {
    /// A required credential/config field is empty after merging CLI flags,
    /// environment variables, and the persisted config file.
    #[error("missing required configuration: {field}")]
    MissingConfiguration {
        field: String,
        /// Remediation suggestions (CLI flag, config-set command, env var).
        hints: Vec<String>,
    },

    /// Configuration loading, parsing, or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A `data:` photo reference did not match `data:<mime>;base64,<payload>`.
    #[error("malformed data URI: {reference}")]
    MalformedDataUri { reference: String },

    /// A remote photo download returned a non-success HTTP status.
    #[error("failed to download image: HTTP {status} from {url}")]
    DownloadFailed { url: String, status: u16 },

    /// A local photo path does not exist.
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// The photo list is empty after fallback extraction from the body.
    #[error("no photos available for upload, add at least one image")]
    NoPhotosAvailable,

    /// The token endpoint response carried no access token field.
    #[error("access token not found in token response")]
    TokenNotFound,

    /// The platform reported a non-zero error code.
    #[error("platform API error {code}: {message}")]
    RemoteApiError { code: i64, message: String },

    /// An otherwise-successful upload response carried no media identifier.
    #[error("no media id in upload response: {raw}")]
    MediaIdMissing { raw: String },

    /// An outbound request exceeded its deadline.
    #[error("request timed out: {url}")]
    TransportTimeout { url: String },

    /// A non-2xx HTTP response, with the raw body text.
    #[error("API request failed with status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Transport-level failure other than a timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DraftgateError>;

impl DraftgateError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a missing-configuration error with its remediation hints.
    pub fn missing(field: impl Into<String>, hints: Vec<String>) -> Self {
        Self::MissingConfiguration {
            field: field.into(),
            hints,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Remediation suggestions to show the user, if any.
    pub fn hints(&self) -> &[String] {
        match self {
            Self::MissingConfiguration { hints, .. } => hints,
            _ => &[],
        }
    }
}

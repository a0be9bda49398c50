//! Intermediary API client and the end-to-end publish pipeline.
//!
//! [`api`] speaks the wire protocol: token exchange, multipart material
//! upload, and draft submission, each bound to its own request deadline.
//! [`pipeline`] sequences those calls for the two draft shapes (`news`,
//! `newspic`), resolving photos and rewriting content along the way.

pub mod api;
pub mod pipeline;

pub use api::{
    Article, DEFAULT_DRAFT_TIMEOUT_MS, DEFAULT_TOKEN_TIMEOUT_MS, DEFAULT_UPLOAD_TIMEOUT_MS,
    HubClient, Timeouts, UploadedAsset,
};
pub use pipeline::{
    NewsDraft, NewspicDraft, ProgressReporter, SilentProgress, fetch_token, publish_news,
    publish_newspic, upload_photos,
};

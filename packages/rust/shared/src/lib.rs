//! Shared types, error model, and configuration for draftgate.
//!
//! This crate is the foundation depended on by all other draftgate crates.
//! It provides:
//! - [`DraftgateError`] — the unified error type
//! - Domain types ([`UploadedMedia`], [`UploadResult`])
//! - Configuration ([`AppConfig`], [`RuntimeCredentials`], config loading,
//!   layered credential resolution)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CredentialOverrides, ENV_APP_ID, ENV_APP_SECRET, ENV_BASE_URL, ENV_PAT,
    RuntimeCredentials, WxConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_credentials, resolve_credentials_with, save_config, save_config_to,
};
pub use error::{DraftgateError, Result};
pub use types::{UploadResult, UploadedMedia};

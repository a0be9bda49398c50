//! Application configuration for draftgate.
//!
//! Persisted config lives at `~/.draftgate/draftgate.toml`. At runtime each
//! credential field is resolved by layering three sources, first non-empty
//! wins: CLI flag > environment variable > persisted config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DraftgateError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "draftgate.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".draftgate";

/// Environment variable holding the intermediary API personal access token.
pub const ENV_PAT: &str = "DRAFTGATE_PAT";

/// Environment variable holding the official-account app id.
pub const ENV_APP_ID: &str = "WX_APPID";

/// Environment variable holding the official-account app secret.
pub const ENV_APP_SECRET: &str = "WX_APPSECRET";

/// Environment variable holding the intermediary API base URL.
pub const ENV_BASE_URL: &str = "DRAFTGATE_BASE_URL";

// ---------------------------------------------------------------------------
// Config structs (matching draftgate.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Official-account publishing settings.
    #[serde(default)]
    pub wx: WxConfig,
}

/// `[wx]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WxConfig {
    /// Intermediary API base URL (e.g. `https://hub.example.com`).
    #[serde(default)]
    pub base_url: String,

    /// Personal access token authorizing calls to the intermediary API.
    #[serde(default)]
    pub pat: String,

    /// Official-account app id.
    #[serde(default)]
    pub app_id: String,

    /// Official-account app secret.
    #[serde(default)]
    pub app_secret: String,

    /// Request timeout in milliseconds, applied to every outbound call
    /// unless overridden per invocation. `None` falls back to the per-step
    /// defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Runtime credentials (merged from CLI flags + env + config)
// ---------------------------------------------------------------------------

/// Per-field CLI overrides for credential resolution.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub base_url: Option<String>,
    pub pat: Option<String>,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
}

/// Fully-resolved credential set for one invocation. Immutable once built.
#[derive(Debug, Clone)]
pub struct RuntimeCredentials {
    /// Intermediary API base URL, trailing slash stripped.
    pub base_url: String,
    /// Bearer token for the intermediary API.
    pub pat: String,
    /// Official-account app id (token request payload).
    pub app_id: String,
    /// Official-account app secret (token request payload).
    pub app_secret: String,
    /// Persisted timeout override in milliseconds, if configured.
    pub timeout_ms: Option<u64>,
}

/// Resolve runtime credentials by layering CLI flags, environment variables,
/// and the persisted config, first non-empty wins per field.
///
/// Fails with [`DraftgateError::MissingConfiguration`] naming the specific
/// field when a required value is empty after merging.
pub fn resolve_credentials(
    overrides: &CredentialOverrides,
    config: &AppConfig,
) -> Result<RuntimeCredentials> {
    resolve_credentials_with(overrides, config, |name| std::env::var(name).ok())
}

/// Same as [`resolve_credentials`] but with an injectable environment lookup.
pub fn resolve_credentials_with(
    overrides: &CredentialOverrides,
    config: &AppConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<RuntimeCredentials> {
    let base_url = require_field(
        "base_url",
        layered(
            overrides.base_url.as_deref(),
            env(ENV_BASE_URL),
            &config.wx.base_url,
        ),
        "--base-url <url>",
        ENV_BASE_URL,
    )?;
    // The API treats `https://host` and `https://host/` the same; normalize
    // so path concatenation never produces a double slash.
    let base_url = base_url.trim_end_matches('/').to_string();

    let pat = require_field(
        "pat",
        layered(overrides.pat.as_deref(), env(ENV_PAT), &config.wx.pat),
        "--pat <token>",
        ENV_PAT,
    )?;

    let app_id = require_field(
        "app_id",
        layered(
            overrides.app_id.as_deref(),
            env(ENV_APP_ID),
            &config.wx.app_id,
        ),
        "--app-id <id>",
        ENV_APP_ID,
    )?;

    let app_secret = require_field(
        "app_secret",
        layered(
            overrides.app_secret.as_deref(),
            env(ENV_APP_SECRET),
            &config.wx.app_secret,
        ),
        "--app-secret <secret>",
        ENV_APP_SECRET,
    )?;

    Ok(RuntimeCredentials {
        base_url,
        pat,
        app_id,
        app_secret,
        timeout_ms: config.wx.timeout_ms,
    })
}

/// First non-empty value of CLI flag, environment variable, persisted config.
fn layered(cli: Option<&str>, env_value: Option<String>, persisted: &str) -> String {
    if let Some(v) = cli {
        if !v.is_empty() {
            return v.to_string();
        }
    }
    if let Some(v) = env_value {
        if !v.is_empty() {
            return v;
        }
    }
    persisted.to_string()
}

fn require_field(field: &str, value: String, flag: &str, env_var: &str) -> Result<String> {
    if value.is_empty() {
        let cli_flag = flag.split_whitespace().next().unwrap_or(flag);
        return Err(DraftgateError::missing(
            field,
            vec![
                format!("pass {flag} for this invocation"),
                format!("persist it: draftgate config set {cli_flag} <value>"),
                format!("set the {env_var} environment variable"),
            ],
        ));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.draftgate/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DraftgateError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.draftgate/draftgate.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DraftgateError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DraftgateError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Persist the config to its default location, creating the directory if needed.
pub fn save_config(config: &AppConfig) -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DraftgateError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    save_config_to(config, &path)?;
    Ok(path)
}

/// Persist the config to a specific file path.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(config).map_err(|e| DraftgateError::config(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| DraftgateError::io(path, e))?;
    tracing::debug!(?path, "config saved");
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = save_config(&AppConfig::default())?;
    tracing::info!(?path, "created default config file");
    Ok(path)
}

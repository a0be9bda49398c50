//! HTTP client for the intermediary publishing API.
//!
//! The intermediary proxies requests to the content platform. Two distinct
//! credentials are in play on every call: the personal access token (`pat`)
//! authorizes the call to the intermediary itself via a `Bearer` header,
//! while the app id/secret pair (token exchange) and the resulting
//! `access_token` (upload, draft) authenticate the platform account inside
//! the request payload.

use std::time::Duration;

use reqwest::{Client, multipart};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use draftgate_media::ResolvedPayload;
use draftgate_shared::{DraftgateError, Result, RuntimeCredentials};

const TOKEN_PATH: &str = "/api/v1/wx/cgi-bin/token";
const MATERIAL_PATH: &str = "/api/v1/wx/cgi-bin/material/add_material";
const DRAFT_PATH: &str = "/api/v1/wx/cgi-bin/draft/add";

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("draftgate/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// Default token exchange timeout (ms).
pub const DEFAULT_TOKEN_TIMEOUT_MS: u64 = 10_000;
/// Default media upload timeout (ms).
pub const DEFAULT_UPLOAD_TIMEOUT_MS: u64 = 60_000;
/// Default draft submission timeout (ms).
pub const DEFAULT_DRAFT_TIMEOUT_MS: u64 = 30_000;

/// Per-step request deadlines for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub token: Duration,
    pub upload: Duration,
    pub draft: Duration,
}

impl Timeouts {
    /// Resolve each step's deadline: invocation override > persisted config
    /// value > hardcoded default. Zero values are treated as unset.
    pub fn resolve(config_ms: Option<u64>, override_ms: Option<u64>) -> Self {
        let pick = |default_ms: u64| {
            let ms = override_ms
                .filter(|ms| *ms > 0)
                .or(config_ms.filter(|ms| *ms > 0))
                .unwrap_or(default_ms);
            Duration::from_millis(ms)
        };

        Self {
            token: pick(DEFAULT_TOKEN_TIMEOUT_MS),
            upload: pick(DEFAULT_UPLOAD_TIMEOUT_MS),
            draft: pick(DEFAULT_DRAFT_TIMEOUT_MS),
        }
    }
}

// ---------------------------------------------------------------------------
// Draft article payloads
// ---------------------------------------------------------------------------

/// One `image_info.image_list` entry of a `newspic` draft.
#[derive(Debug, Clone, Serialize)]
pub struct ImageListEntry {
    pub image_media_id: String,
}

/// Gallery descriptor of a `newspic` draft, in upload order.
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    pub image_list: Vec<ImageListEntry>,
}

/// A draft article in one of the two mutually exclusive platform shapes.
///
/// `news` is a rich HTML article; `newspic` is plain text plus an image
/// gallery. Exactly one variant is submitted per invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Article {
    News {
        article_type: &'static str,
        title: String,
        content: String,
        thumb_media_id: String,
    },
    Newspic {
        article_type: &'static str,
        title: String,
        content: String,
        thumb_media_id: String,
        image_info: ImageInfo,
    },
}

impl Article {
    /// Build a `news` article: title, rewritten HTML body, cover media id.
    pub fn news(
        title: impl Into<String>,
        content: impl Into<String>,
        thumb_media_id: impl Into<String>,
    ) -> Self {
        Self::News {
            article_type: "news",
            title: title.into(),
            content: content.into(),
            thumb_media_id: thumb_media_id.into(),
        }
    }

    /// Build a `newspic` article: title, raw text body, cover media id, and
    /// the gallery media ids in upload order.
    pub fn newspic(
        title: impl Into<String>,
        content: impl Into<String>,
        thumb_media_id: impl Into<String>,
        media_ids: Vec<String>,
    ) -> Self {
        Self::Newspic {
            article_type: "newspic",
            title: title.into(),
            content: content.into(),
            thumb_media_id: thumb_media_id.into(),
            image_info: ImageInfo {
                image_list: media_ids
                    .into_iter()
                    .map(|id| ImageListEntry { image_media_id: id })
                    .collect(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// One uploaded binary asset as reported by the material endpoint.
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    /// Platform-assigned media identifier.
    pub media_id: String,
    /// Platform-hosted URL, empty when the platform returned none.
    pub url: String,
}

/// Client for the intermediary publishing API.
#[derive(Debug)]
pub struct HubClient {
    http: Client,
    base_url: String,
    pat: String,
}

impl HubClient {
    /// Create a client for the given resolved credentials.
    pub fn new(creds: &RuntimeCredentials) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DraftgateError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: creds.base_url.clone(),
            pat: creds.pat.clone(),
        })
    }

    /// The underlying HTTP client, shared with photo resolution.
    pub fn http(&self) -> &Client {
        &self.http
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Exchange app credentials for the raw token endpoint response.
    pub async fn request_token(
        &self,
        app_id: &str,
        app_secret: &str,
        timeout: Duration,
    ) -> Result<Value> {
        let body = serde_json::json!({ "appId": app_id, "appSecret": app_secret });
        self.post_json(&self.endpoint(TOKEN_PATH), &body, timeout)
            .await
    }

    /// Exchange app credentials for a platform access token.
    ///
    /// The token is read from `data.accessToken`, falling back to a
    /// top-level `accessToken` field.
    pub async fn fetch_access_token(
        &self,
        app_id: &str,
        app_secret: &str,
        timeout: Duration,
    ) -> Result<String> {
        let response = self.request_token(app_id, app_secret, timeout).await?;
        extract_access_token(&response).ok_or(DraftgateError::TokenNotFound)
    }

    /// Upload one resolved photo payload as permanent image material.
    pub async fn upload_material(
        &self,
        access_token: &str,
        payload: ResolvedPayload,
        timeout: Duration,
    ) -> Result<UploadedAsset> {
        let url = self.endpoint(MATERIAL_PATH);
        debug!(filename = %payload.filename, len = payload.bytes.len(), "uploading material");

        let part = multipart::Part::bytes(payload.bytes)
            .file_name(payload.filename)
            .mime_str(&payload.content_type)
            .map_err(|e| DraftgateError::Network(format!("invalid content type: {e}")))?;

        let form = multipart::Form::new()
            .text("access_token", access_token.to_string())
            .text("type", "image")
            .part("media", part);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.pat)
            .multipart(form)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let value = Self::decode_response(&url, response).await?;

        if let Some(code) = value.get("errcode").and_then(Value::as_i64) {
            if code != 0 {
                let message = value
                    .get("errmsg")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string();
                return Err(DraftgateError::RemoteApiError { code, message });
            }
        }

        let media_id = value
            .pointer("/data/media_id")
            .and_then(Value::as_str)
            .or_else(|| value.get("media_id").and_then(Value::as_str));

        let Some(media_id) = media_id else {
            return Err(DraftgateError::MediaIdMissing {
                raw: value.to_string(),
            });
        };

        let platform_url = value
            .pointer("/data/url")
            .and_then(Value::as_str)
            .or_else(|| value.get("url").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        Ok(UploadedAsset {
            media_id: media_id.to_string(),
            url: platform_url,
        })
    }

    /// Submit a draft article, returning the raw decoded response.
    pub async fn add_draft(
        &self,
        access_token: &str,
        article: &Article,
        timeout: Duration,
    ) -> Result<Value> {
        let body = serde_json::json!({
            "access_token": access_token,
            "articles": [article],
        });
        self.post_json(&self.endpoint(DRAFT_PATH), &body, timeout)
            .await
    }

    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<Value> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.pat)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        Self::decode_response(url, response).await
    }

    async fn decode_response(url: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(url, e))?;

        if !status.is_success() {
            return Err(DraftgateError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        serde_json::from_str(&text)
            .map_err(|e| DraftgateError::Network(format!("{url}: invalid JSON response: {e}")))
    }
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

fn extract_access_token(response: &Value) -> Option<String> {
    response
        .pointer("/data/accessToken")
        .and_then(Value::as_str)
        .or_else(|| response.get("accessToken").and_then(Value::as_str))
        .map(str::to_string)
}

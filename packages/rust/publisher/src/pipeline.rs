//! End-to-end publish pipeline: credentials → access token → photo list →
//! sequential uploads → content preparation → draft submission.
//!
//! Each stage's output feeds the next, and any failure is terminal for the
//! invocation — no retries, no partial results, no resumption across runs.

use std::time::Duration;

use serde_json::Value;
use tracing::{info, instrument};

use draftgate_content::{extract_image_urls, rewrite_image_urls};
use draftgate_shared::{DraftgateError, Result, RuntimeCredentials, UploadResult, UploadedMedia};

use crate::api::{Article, HubClient, Timeouts};

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a pipeline stage.
    fn stage(&self, current: usize, total: usize, name: &str);
    /// Called after each photo finishes uploading.
    fn photo_uploaded(&self, reference: &str, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _current: usize, _total: usize, _name: &str) {}
    fn photo_uploaded(&self, _reference: &str, _current: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A `news` draft request: rich HTML article.
#[derive(Debug, Clone)]
pub struct NewsDraft {
    pub title: String,
    /// HTML fragment submitted as the article body (after image rewriting).
    pub html: String,
    /// Explicit photo references. Empty means "extract from the body".
    pub photos: Vec<String>,
}

/// A `newspic` draft request: plain text plus an image gallery.
#[derive(Debug, Clone)]
pub struct NewspicDraft {
    pub title: String,
    /// Text submitted untouched alongside the structured image list.
    pub content: String,
    /// Explicit photo references. Empty means "extract from the body".
    pub photos: Vec<String>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Exchange app credentials for the raw token endpoint response.
pub async fn fetch_token(
    creds: &RuntimeCredentials,
    timeout_override_ms: Option<u64>,
) -> Result<Value> {
    let client = HubClient::new(creds)?;
    let timeouts = Timeouts::resolve(creds.timeout_ms, timeout_override_ms);
    client
        .request_token(&creds.app_id, &creds.app_secret, timeouts.token)
        .await
}

/// Upload a caller-supplied photo list without creating a draft.
#[instrument(skip_all, fields(photos = photos.len()))]
pub async fn upload_photos(
    creds: &RuntimeCredentials,
    photos: &[String],
    timeout_override_ms: Option<u64>,
    progress: &dyn ProgressReporter,
) -> Result<UploadResult> {
    if photos.is_empty() {
        return Err(DraftgateError::NoPhotosAvailable);
    }

    let client = HubClient::new(creds)?;
    let timeouts = Timeouts::resolve(creds.timeout_ms, timeout_override_ms);

    progress.stage(1, 2, "fetching access token");
    let access_token = client
        .fetch_access_token(&creds.app_id, &creds.app_secret, timeouts.token)
        .await?;

    progress.stage(2, 2, "uploading photo material");
    upload_all(&client, &access_token, photos, timeouts.upload, progress).await
}

/// Submit a `news` draft: the HTML body has its image references rewritten
/// to the uploaded platform URLs, and the first upload becomes the cover.
#[instrument(skip_all, fields(title = %draft.title))]
pub async fn publish_news(
    creds: &RuntimeCredentials,
    draft: &NewsDraft,
    timeout_override_ms: Option<u64>,
    progress: &dyn ProgressReporter,
) -> Result<Value> {
    let photos = effective_photos(&draft.photos, &draft.html)?;

    let client = HubClient::new(creds)?;
    let timeouts = Timeouts::resolve(creds.timeout_ms, timeout_override_ms);

    progress.stage(1, 3, "fetching access token");
    let access_token = client
        .fetch_access_token(&creds.app_id, &creds.app_secret, timeouts.token)
        .await?;

    progress.stage(2, 3, "uploading photo material");
    let upload_result =
        upload_all(&client, &access_token, &photos, timeouts.upload, progress).await?;

    progress.stage(3, 3, "creating draft");
    let content = rewrite_image_urls(&draft.html, &upload_result.image_url_map);
    let article = Article::news(
        draft.title.clone(),
        content,
        upload_result.cover_media_id.clone(),
    );

    let response = client
        .add_draft(&access_token, &article, timeouts.draft)
        .await?;

    info!(
        total_uploaded = upload_result.total_uploaded,
        "news draft submitted"
    );
    Ok(response)
}

/// Submit a `newspic` draft: the text body is untouched and every uploaded
/// photo appears in `image_info.image_list`, preserving upload order.
#[instrument(skip_all, fields(title = %draft.title))]
pub async fn publish_newspic(
    creds: &RuntimeCredentials,
    draft: &NewspicDraft,
    timeout_override_ms: Option<u64>,
    progress: &dyn ProgressReporter,
) -> Result<Value> {
    let photos = effective_photos(&draft.photos, &draft.content)?;

    let client = HubClient::new(creds)?;
    let timeouts = Timeouts::resolve(creds.timeout_ms, timeout_override_ms);

    progress.stage(1, 4, "fetching access token");
    let access_token = client
        .fetch_access_token(&creds.app_id, &creds.app_secret, timeouts.token)
        .await?;

    progress.stage(2, 4, "uploading photo material");
    let upload_result =
        upload_all(&client, &access_token, &photos, timeouts.upload, progress).await?;

    progress.stage(3, 4, "preparing image gallery");
    let media_ids: Vec<String> = upload_result
        .uploaded_media
        .iter()
        .map(|m| m.media_id.clone())
        .collect();

    progress.stage(4, 4, "creating draft");
    let article = Article::newspic(
        draft.title.clone(),
        draft.content.clone(),
        upload_result.cover_media_id.clone(),
        media_ids,
    );

    let response = client
        .add_draft(&access_token, &article, timeouts.draft)
        .await?;

    info!(
        total_uploaded = upload_result.total_uploaded,
        "newspic draft submitted"
    );
    Ok(response)
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// The explicit photo list, or the body-extraction fallback when none was
/// supplied. An empty result is rejected here, before any network call.
fn effective_photos(explicit: &[String], body: &str) -> Result<Vec<String>> {
    let photos = if explicit.is_empty() {
        extract_image_urls(body)
    } else {
        explicit.to_vec()
    };

    if photos.is_empty() {
        return Err(DraftgateError::NoPhotosAvailable);
    }
    Ok(photos)
}

/// Upload every photo, strictly sequentially.
///
/// Ordinal position designates the cover image and the draft's gallery must
/// preserve input order, so uploads are not parallelized. The first failure
/// aborts the remaining uploads and no partial result is returned.
async fn upload_all(
    client: &HubClient,
    access_token: &str,
    photos: &[String],
    timeout: Duration,
    progress: &dyn ProgressReporter,
) -> Result<UploadResult> {
    let total = photos.len();
    let mut uploaded = Vec::with_capacity(total);

    for (index, reference) in photos.iter().enumerate() {
        if reference.is_empty() {
            continue;
        }

        let payload = draftgate_media::resolve(client.http(), reference, index, timeout).await?;
        let asset = client
            .upload_material(access_token, payload, timeout)
            .await?;

        progress.photo_uploaded(reference, index + 1, total);
        info!(reference = %reference, media_id = %asset.media_id, "uploaded photo");

        uploaded.push(UploadedMedia {
            original_url: reference.clone(),
            media_id: asset.media_id,
            platform_url: asset.url,
            index,
        });
    }

    Ok(UploadResult::from_media(uploaded, photos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN_PATH: &str = "/api/v1/wx/cgi-bin/token";
    const MATERIAL_PATH: &str = "/api/v1/wx/cgi-bin/material/add_material";
    const DRAFT_PATH: &str = "/api/v1/wx/cgi-bin/draft/add";

    // Distinct inline references so photo resolution needs no filesystem or
    // extra network fixtures.
    fn photo(n: u32) -> String {
        format!("data:image/png;base64,aW1hZ2UtcGF5bG9hZC17bn0t{n:04}")
    }

    fn creds(server: &MockServer) -> RuntimeCredentials {
        RuntimeCredentials {
            base_url: server.uri(),
            pat: "pat-token".into(),
            app_id: "wx123".into(),
            app_secret: "secret".into(),
            timeout_ms: None,
        }
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(header("authorization", "Bearer pat-token"))
            .and(body_partial_json(
                serde_json::json!({"appId": "wx123", "appSecret": "secret"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"code": 0, "data": {"accessToken": "AT", "expiresIn": 7200}}),
            ))
            .mount(server)
            .await;
    }

    fn material_response(media_id: &str, url: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(
            serde_json::json!({"code": 0, "data": {"media_id": media_id, "url": url}}),
        )
    }

    async fn material_requests(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == MATERIAL_PATH)
            .count()
    }

    #[tokio::test]
    async fn fetch_token_returns_raw_response() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        let response = fetch_token(&creds(&server), None).await.unwrap();
        assert_eq!(response["data"]["accessToken"], "AT");
        assert_eq!(response["data"]["expiresIn"], 7200);
    }

    #[tokio::test]
    async fn missing_access_token_in_both_positions_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"code": 0, "data": {"expiresIn": 7200}})),
            )
            .mount(&server)
            .await;

        let err = upload_photos(&creds(&server), &[photo(1)], None, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DraftgateError::TokenNotFound));
    }

    #[tokio::test]
    async fn top_level_access_token_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"accessToken": "FLAT"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(MATERIAL_PATH))
            .respond_with(material_response("m1", "https://wx/1.png"))
            .mount(&server)
            .await;

        let result = upload_photos(&creds(&server), &[photo(1)], None, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(result.cover_media_id, "m1");
    }

    #[tokio::test]
    async fn upload_preserves_order_and_designates_cover() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path(MATERIAL_PATH))
            .and(header("authorization", "Bearer pat-token"))
            .respond_with(material_response("m1", "https://wx/1.png"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(MATERIAL_PATH))
            .respond_with(material_response("m2", "https://wx/2.png"))
            .mount(&server)
            .await;

        let photos = vec![photo(1), photo(2)];
        let result = upload_photos(&creds(&server), &photos, None, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.total_uploaded, 2);
        assert_eq!(result.cover_media_id, "m1");
        assert_eq!(result.uploaded_media[0].index, 0);
        assert_eq!(result.uploaded_media[1].index, 1);
        assert_eq!(result.uploaded_media[1].media_id, "m2");
        assert_eq!(result.photos, vec!["https://wx/1.png", "https://wx/2.png"]);
    }

    #[tokio::test]
    async fn upload_sends_multipart_fields() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path(MATERIAL_PATH))
            .respond_with(material_response("m1", ""))
            .mount(&server)
            .await;

        upload_photos(&creds(&server), &[photo(7)], None, &SilentProgress)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let upload = requests
            .iter()
            .find(|r| r.url.path() == MATERIAL_PATH)
            .expect("material request");

        let content_type = upload
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.starts_with("multipart/form-data"));

        let body = String::from_utf8_lossy(&upload.body);
        assert!(body.contains("name=\"access_token\""));
        assert!(body.contains("AT"));
        assert!(body.contains("name=\"type\""));
        assert!(body.contains("image"));
        assert!(body.contains("name=\"media\""));
        assert!(body.contains("filename=\"image_1.png\""));
    }

    #[tokio::test]
    async fn platform_error_code_aborts_with_remote_api_error() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path(MATERIAL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"errcode": 40004, "errmsg": "invalid media type"}),
            ))
            .mount(&server)
            .await;

        let err = upload_photos(&creds(&server), &[photo(1)], None, &SilentProgress)
            .await
            .unwrap_err();

        match err {
            DraftgateError::RemoteApiError { code, message } => {
                assert_eq!(code, 40004);
                assert_eq!(message, "invalid media type");
            }
            other => panic!("expected RemoteApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_media_id_in_success_response_fails() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path(MATERIAL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"code": 0, "data": {"url": "https://wx/1.png"}}),
            ))
            .mount(&server)
            .await;

        let err = upload_photos(&creds(&server), &[photo(1)], None, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DraftgateError::MediaIdMissing { .. }));
    }

    #[tokio::test]
    async fn second_photo_failure_aborts_remaining_uploads() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        // First upload succeeds, everything after fails.
        Mock::given(method("POST"))
            .and(path(MATERIAL_PATH))
            .respond_with(material_response("m1", "https://wx/1.png"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(MATERIAL_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"errcode": 45009, "errmsg": "quota"})),
            )
            .mount(&server)
            .await;

        let photos = vec![photo(1), photo(2), photo(3)];
        let err = upload_photos(&creds(&server), &photos, None, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, DraftgateError::RemoteApiError { .. }));
        // The third photo is never attempted.
        assert_eq!(material_requests(&server).await, 2);
    }

    #[tokio::test]
    async fn news_draft_rewrites_body_and_sets_cover() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        // The article references a remote photo served by the mock too.
        Mock::given(method("GET"))
            .and(path("/orig.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0u8; 8]),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(MATERIAL_PATH))
            .respond_with(material_response("m1", "https://wx/new.png"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(DRAFT_PATH))
            .and(header("authorization", "Bearer pat-token"))
            .and(body_partial_json(serde_json::json!({
                "access_token": "AT",
                "articles": [{
                    "article_type": "news",
                    "title": "Hello",
                    "content": "<img src=\"https://wx/new.png\">",
                    "thumb_media_id": "m1",
                }],
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"code": 0, "data": {"media_id": "draft-1"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let original = format!("{}/orig.png", server.uri());
        let draft = NewsDraft {
            title: "Hello".into(),
            html: format!("<img src=\"{original}\">"),
            photos: vec![original],
        };

        let response = publish_news(&creds(&server), &draft, None, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(response["data"]["media_id"], "draft-1");
    }

    #[tokio::test]
    async fn newspic_draft_keeps_body_and_orders_gallery() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        for (i, id) in ["m1", "m2", "m3"].iter().enumerate() {
            Mock::given(method("POST"))
                .and(path(MATERIAL_PATH))
                .respond_with(material_response(id, &format!("https://wx/{i}.png")))
                .up_to_n_times(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("POST"))
            .and(path(DRAFT_PATH))
            .and(body_partial_json(serde_json::json!({
                "access_token": "AT",
                "articles": [{
                    "article_type": "newspic",
                    "title": "Gallery",
                    "content": "three cats, no markup rewriting",
                    "thumb_media_id": "m1",
                    "image_info": {"image_list": [
                        {"image_media_id": "m1"},
                        {"image_media_id": "m2"},
                        {"image_media_id": "m3"},
                    ]},
                }],
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"code": 0, "data": {"media_id": "draft-2"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let draft = NewspicDraft {
            title: "Gallery".into(),
            content: "three cats, no markup rewriting".into(),
            photos: vec![photo(1), photo(2), photo(3)],
        };

        let response = publish_newspic(&creds(&server), &draft, None, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(response["data"]["media_id"], "draft-2");
    }

    #[tokio::test]
    async fn no_photos_fails_before_any_network_call() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        let draft = NewsDraft {
            title: "Empty".into(),
            html: "<p>no images here</p>".into(),
            photos: vec![],
        };

        let err = publish_news(&creds(&server), &draft, None, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DraftgateError::NoPhotosAvailable));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fallback_extraction_supplies_photos() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path(MATERIAL_PATH))
            .respond_with(material_response("m1", "https://wx/1.png"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(DRAFT_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": 0})),
            )
            .mount(&server)
            .await;

        let inline = photo(9);
        let draft = NewspicDraft {
            title: "Fallback".into(),
            content: format!("intro ![pic]({inline}) outro"),
            photos: vec![],
        };

        publish_newspic(&creds(&server), &draft, None, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(material_requests(&server).await, 1);
    }

    #[tokio::test]
    async fn slow_endpoint_times_out_distinctly() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"accessToken": "AT"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = fetch_token(&creds(&server), Some(50)).await.unwrap_err();
        assert!(matches!(err, DraftgateError::TransportTimeout { .. }));
    }

    #[tokio::test]
    async fn http_error_status_carries_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = fetch_token(&creds(&server), None).await.unwrap_err();
        match err {
            DraftgateError::HttpStatus { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }
}

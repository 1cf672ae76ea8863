//! HTTP API server.
//!
//! Every response uses the same envelope: `{"code":"success","data":...}` on
//! success and `{"code":"error","errors":[...]}` on failure.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::ShadowifyError;
use crate::orchestrator::Orchestrator;
use crate::store::{Pagination, VideoFilter, VideoSort};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Run the HTTP API server until Ctrl+C, then drain background jobs.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(&settings)?;
    let state = Arc::new(AppState { orchestrator });

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Shadowify API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Ingest", "POST /videos");
    Output::kv("List", "GET  /videos?q=&category=&type=popular&page=&page_size=");
    Output::kv("Categories", "GET  /videos/categories");
    Output::kv("Video", "GET  /videos/{id}");
    Output::kv("Segments", "GET  /videos/{id}/segments");
    Output::kv("Segment", "GET  /segments/{id}");
    Output::kv("Recording", "POST /stt/transcribe");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, waiting for background jobs");
    state.orchestrator.jobs().shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/videos", get(list_videos).post(create_video))
        .route("/videos/categories", get(categories))
        .route("/videos/{id}", get(get_video))
        .route("/videos/{id}/segments", get(list_segments))
        .route("/segments/{id}", get(get_segment))
        .route("/stt/transcribe", post(transcribe_recording))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// === Envelope ===

#[derive(Serialize)]
struct Success<T: Serialize> {
    code: &'static str,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<PageInfo>,
}

impl<T: Serialize> Success<T> {
    fn new(data: T) -> Self {
        Self {
            code: "success",
            data,
            pagination: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct PageInfo {
    page: u32,
    page_size: u32,
    total: u64,
    total_pages: u64,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    errors: Vec<ErrorItem>,
}

#[derive(Serialize)]
struct ErrorItem {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    params: ErrorParams,
}

#[derive(Serialize)]
struct ErrorParams {
    cause: &'static str,
}

/// An error response with its HTTP status and API code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    field: Option<&'static str>,
    cause: &'static str,
}

impl ApiError {
    fn bad_request(message: impl Into<String>, field: Option<&'static str>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
            field,
            cause: "invalid_request",
        }
    }

    /// Wrap a library error under the given API code.
    fn from_error(code: &'static str, err: &ShadowifyError) -> Self {
        Self {
            status: status_for(err),
            code,
            message: err.to_string(),
            field: None,
            cause: err.cause(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: "error",
            errors: vec![ErrorItem {
                code: self.code,
                message: self.message,
                field: self.field,
                params: ErrorParams { cause: self.cause },
            }],
        };
        (self.status, Json(body)).into_response()
    }
}

/// HTTP status for a library error.
pub fn status_for(err: &ShadowifyError) -> StatusCode {
    match err {
        ShadowifyError::InvalidReference(_) | ShadowifyError::InvalidAudio(_) => StatusCode::BAD_REQUEST,
        ShadowifyError::NotFound(_) => StatusCode::NOT_FOUND,
        ShadowifyError::AlreadyExists(_) => StatusCode::CONFLICT,
        ShadowifyError::UnsupportedLanguage { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ShadowifyError::Fetch(_)
        | ShadowifyError::Detection(_)
        | ShadowifyError::Transcription(_)
        | ShadowifyError::Classification(_)
        | ShadowifyError::ToolNotFound(_)
        | ShadowifyError::Http(_) => StatusCode::BAD_GATEWAY,
        ShadowifyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Reads report missing rows under their own code and anything else under `fallback`.
fn read_error(not_found: &'static str, fallback: &'static str, err: ShadowifyError) -> ApiError {
    match err {
        ShadowifyError::NotFound(_) => ApiError::from_error(not_found, &err),
        _ => ApiError::from_error(fallback, &err),
    }
}

// === Requests ===

#[derive(Deserialize)]
struct CreateVideoRequest {
    #[serde(rename = "youtubeId", alias = "youtube_id")]
    youtube_id: String,
}

#[derive(Deserialize)]
struct TranscribeRequest {
    audio_base64: String,
    #[serde(default)]
    evaluate: bool,
}

#[derive(Deserialize, Default)]
struct ListParams {
    q: Option<String>,
    category: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
}

impl ListParams {
    fn filter(&self) -> VideoFilter {
        let sort = self
            .kind
            .as_deref()
            .and_then(|k| k.parse().ok())
            .unwrap_or(VideoSort::Latest);

        VideoFilter {
            q: self.q.clone().filter(|q| !q.trim().is_empty()),
            category: self.category.clone().filter(|c| !c.trim().is_empty()),
            sort,
        }
    }

    fn pagination(&self) -> Pagination {
        let clamp = |v: Option<i64>, default: u32| -> u32 {
            v.map(|v| v.clamp(0, u32::MAX as i64) as u32).unwrap_or(default)
        };
        Pagination::new(clamp(self.page, 1), clamp(self.page_size, Pagination::DEFAULT_PAGE_SIZE))
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_video(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateVideoRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text(), Some("youtubeId")))?;

    match state.orchestrator.ingest(&req.youtube_id).await {
        Ok(outcome) => Ok((StatusCode::CREATED, Json(Success::new(outcome.video_id))).into_response()),
        Err(e @ ShadowifyError::InvalidReference(_)) => Err(ApiError {
            field: Some("youtubeId"),
            ..ApiError::from_error("bad_request", &e)
        }),
        Err(e) => Err(ApiError::from_error("video.create.error", &e)),
    }
}

async fn transcribe_recording(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TranscribeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text(), Some("audio_base64")))?;

    let invalid_audio = |e: &ShadowifyError| ApiError {
        field: Some("audio_base64"),
        ..ApiError::from_error("bad_request", e)
    };

    let audio = general_purpose::STANDARD
        .decode(req.audio_base64.trim())
        .map_err(|e| invalid_audio(&ShadowifyError::InvalidAudio(format!("not base64: {}", e))))?;

    match state.orchestrator.transcribe_recording(&audio, req.evaluate).await {
        Ok(transcript) => Ok(Json(Success::new(transcript)).into_response()),
        Err(e @ ShadowifyError::InvalidAudio(_)) => Err(invalid_audio(&e)),
        Err(e) => Err(ApiError::from_error("stt.transcribe.error", &e)),
    }
}

async fn list_videos(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text(), None))?;
    let pagination = params.pagination();

    let page = state
        .orchestrator
        .list_videos(&params.filter(), pagination)
        .await
        .map_err(|e| ApiError::from_error("video.list.error", &e))?;

    let info = PageInfo {
        page: pagination.page,
        page_size: pagination.page_size,
        total: page.total,
        total_pages: pagination.total_pages(page.total),
    };

    Ok(Json(Success {
        pagination: Some(info),
        ..Success::new(page.items)
    })
    .into_response())
}

async fn categories(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let categories = state
        .orchestrator
        .categories()
        .await
        .map_err(|e| ApiError::from_error("video.list.error", &e))?;
    Ok(Json(Success::new(categories)).into_response())
}

async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let video = state
        .orchestrator
        .get_video(&id)
        .await
        .map_err(|e| read_error("video.not_found", "video.list.error", e))?;
    Ok(Json(Success::new(video)).into_response())
}

async fn list_segments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let segments = state
        .orchestrator
        .segments(&id)
        .await
        .map_err(|e| read_error("video.not_found", "segment.list.error", e))?;
    Ok(Json(Success::new(segments)).into_response())
}

async fn get_segment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let segment = state
        .orchestrator
        .segment(&id)
        .await
        .map_err(|e| read_error("segment.not_found", "segment.list.error", e))?;
    Ok(Json(Success::new(segment)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_source::{FetchedMedia, MediaFetcher};
    use crate::difficulty::DifficultyClassifier;
    use crate::error::Result;
    use crate::store::{NewSegment, NewVideo, SqliteVideoStore};
    use crate::transcription::{SpeechRecognizer, Transcript};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::path::Path as FsPath;
    use tempfile::TempDir;

    struct OfflineFetcher;

    #[async_trait]
    impl MediaFetcher for OfflineFetcher {
        async fn fetch(&self, _youtube_id: &str) -> Result<FetchedMedia> {
            Err(ShadowifyError::Fetch("yt-dlp exited with exit status: 1".into()))
        }
    }

    /// Only plain-text recordings can be transcribed.
    struct RecordingsOnly;

    #[async_trait]
    impl SpeechRecognizer for RecordingsOnly {
        async fn detect_language(&self, _audio_path: &FsPath) -> Result<String> {
            Err(ShadowifyError::Internal("not reachable".into()))
        }

        async fn transcribe(&self, _audio_path: &FsPath) -> Result<Transcript> {
            Err(ShadowifyError::Internal("not reachable".into()))
        }

        async fn transcribe_text(&self, audio_path: &FsPath) -> Result<String> {
            assert!(audio_path.is_file());
            Ok("Hello there.".to_string())
        }
    }

    /// Grades every sentence B1.
    struct FixedLevel;

    #[async_trait]
    impl DifficultyClassifier for FixedLevel {
        async fn classify(&self, texts: &[String]) -> Result<Vec<String>> {
            Ok(vec!["B1".to_string(); texts.len()])
        }
    }

    struct TestServer {
        base: String,
        state: Arc<AppState>,
        client: reqwest::Client,
        scratch: TempDir,
    }

    impl TestServer {
        async fn start() -> Self {
            let scratch = tempfile::tempdir().unwrap();
            let mut settings = Settings::default();
            settings.general.temp_dir = scratch.path().to_string_lossy().into_owned();

            let store = Arc::new(SqliteVideoStore::in_memory().unwrap());
            let orchestrator = Orchestrator::with_components(
                &settings,
                Arc::new(OfflineFetcher),
                Arc::new(RecordingsOnly),
                Arc::new(FixedLevel),
                store,
            );
            let state = Arc::new(AppState { orchestrator });

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let app = router(state.clone());
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            Self {
                base: format!("http://{}", addr),
                state,
                client: reqwest::Client::new(),
                scratch,
            }
        }

        async fn seed(&self, youtube_id: &str, categories: &[&str]) -> String {
            let video = NewVideo {
                youtube_id: youtube_id.to_string(),
                title: format!("Video {}", youtube_id),
                duration_string: "00:05".into(),
                categories: categories.iter().map(|c| c.to_string()).collect(),
                difficulty: Some("A2".into()),
                ..Default::default()
            };
            let segments = [
                NewSegment {
                    start_sec: 2.5,
                    end_sec: 5.0,
                    content: "world".into(),
                    difficulty: Some("A2".into()),
                },
                NewSegment {
                    start_sec: 0.0,
                    end_sec: 2.5,
                    content: "hello".into(),
                    difficulty: Some("A1".into()),
                },
            ];
            self.state
                .orchestrator
                .store()
                .create_with_segments(&video, &segments)
                .await
                .unwrap()
        }

        async fn get(&self, path: &str) -> (StatusCode, Value) {
            let response = self.client.get(format!("{}{}", self.base, path)).send().await.unwrap();
            let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
            (status, response.json().await.unwrap())
        }

        async fn post_raw(&self, body: &str) -> (StatusCode, Value) {
            self.post_to("/videos", body).await
        }

        async fn post_to(&self, path: &str, body: &str) -> (StatusCode, Value) {
            let response = self
                .client
                .post(format!("{}{}", self.base, path))
                .header("content-type", "application/json")
                .body(body.to_string())
                .send()
                .await
                .unwrap();
            let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
            (status, response.json().await.unwrap())
        }
    }

    fn first_error(body: &Value) -> &Value {
        &body["errors"][0]
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&ShadowifyError::InvalidReference("".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&ShadowifyError::AlreadyExists("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&ShadowifyError::UnsupportedLanguage {
                detected: "ja".into(),
                supported: "en".into()
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(&ShadowifyError::Classification("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&ShadowifyError::Timeout(30)), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(&ShadowifyError::Persist("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_list_params_defaults() {
        let params = ListParams {
            page: Some(-3),
            page_size: Some(500),
            kind: Some("popular".into()),
            q: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(params.pagination(), Pagination { page: 1, page_size: 10 });
        let filter = params.filter();
        assert_eq!(filter.sort, VideoSort::Popular);
        assert!(filter.q.is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let server = TestServer::start().await;
        let (status, body) = server.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_bodies() {
        let server = TestServer::start().await;

        let (status, body) = server.post_raw("{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "error");
        assert_eq!(first_error(&body)["code"], "bad_request");

        let (status, body) = server.post_raw(r#"{"youtubeId": "   "}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(first_error(&body)["params"]["cause"], "invalid_reference");
        assert_eq!(first_error(&body)["field"], "youtubeId");
    }

    #[tokio::test]
    async fn test_create_existing_is_conflict() {
        let server = TestServer::start().await;
        server.seed("abc123", &[]).await;

        let (status, body) = server
            .post_raw(r#"{"youtubeId": "https://www.youtube.com/watch?v=abc123"}"#)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(first_error(&body)["code"], "video.create.error");
        assert_eq!(first_error(&body)["params"]["cause"], "already_exists");
    }

    #[tokio::test]
    async fn test_create_fetch_failure_is_bad_gateway() {
        let server = TestServer::start().await;
        let (status, body) = server.post_raw(&json!({"youtubeId": "new1"}).to_string()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(first_error(&body)["params"]["cause"], "fetch");
    }

    #[tokio::test]
    async fn test_video_reads() {
        let server = TestServer::start().await;
        let id = server.seed("abc123", &["Education"]).await;

        let (status, body) = server.get(&format!("/videos/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "success");
        assert_eq!(body["data"]["youtube_id"], "abc123");

        server.state.orchestrator.jobs().wait_idle().await;
        let (_, body) = server.get(&format!("/videos/{}", id)).await;
        assert_eq!(body["data"]["view_count"], 1);

        let (status, body) = server.get(&format!("/videos/{}/segments", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["content"], "hello");
        assert_eq!(body["data"][1]["content"], "world");

        let segment_id = body["data"][1]["id"].as_str().unwrap().to_string();
        let (status, body) = server.get(&format!("/segments/{}", segment_id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["difficulty"], "A2");

        let (_, body) = server.get("/videos/categories").await;
        assert_eq!(body["data"], json!(["Education"]));
    }

    #[tokio::test]
    async fn test_missing_reads() {
        let server = TestServer::start().await;

        let (status, body) = server.get("/videos/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(first_error(&body)["code"], "video.not_found");

        let (status, body) = server.get("/videos/nope/segments").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(first_error(&body)["code"], "video.not_found");

        let (status, body) = server.get("/segments/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(first_error(&body)["code"], "segment.not_found");
    }

    #[tokio::test]
    async fn test_list_with_pagination() {
        let server = TestServer::start().await;
        for i in 0..3 {
            server.seed(&format!("v{}", i), &["Music"]).await;
        }

        let (status, body) = server.get("/videos?page=2&page_size=2&category=Music").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        let info: PageInfo = serde_json::from_value(body["pagination"].clone()).unwrap();
        assert_eq!(
            info,
            PageInfo {
                page: 2,
                page_size: 2,
                total: 3,
                total_pages: 2
            }
        );

        let (_, body) = server.get("/videos?q=video%20v1").await;
        assert_eq!(body["pagination"]["total"], 1);
        assert_eq!(body["data"][0]["youtube_id"], "v1");
    }

    #[tokio::test]
    async fn test_transcribe_recording() {
        let server = TestServer::start().await;
        let audio = general_purpose::STANDARD.encode(b"RIFF");

        let (status, body) = server
            .post_to("/stt/transcribe", &json!({ "audio_base64": audio }).to_string())
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "success");
        assert_eq!(body["data"], json!({ "text": "Hello there." }));

        let (status, body) = server
            .post_to(
                "/stt/transcribe",
                &json!({ "audio_base64": audio, "evaluate": true }).to_string(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["cefr"], "B1");

        assert_eq!(std::fs::read_dir(server.scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_transcribe_rejects_bad_audio() {
        let server = TestServer::start().await;

        for body in [r#"{"audio_base64": "%%%"}"#, r#"{"audio_base64": ""}"#, r#"{"evaluate": true}"#] {
            let (status, response) = server.post_to("/stt/transcribe", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
            assert_eq!(first_error(&response)["code"], "bad_request");
            assert_eq!(first_error(&response)["field"], "audio_base64");
        }

        let (_, response) = server
            .post_to("/stt/transcribe", r#"{"audio_base64": "%%%"}"#)
            .await;
        assert_eq!(first_error(&response)["params"]["cause"], "invalid_audio");
    }
}

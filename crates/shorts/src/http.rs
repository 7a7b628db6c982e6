//! HTTP surface: landing page, generate endpoint and static clip serving.

use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use crate::error::PipelineError;
use crate::pipeline::Pipeline;

/// Shown to the client on success
pub const SUCCESS_MESSAGE: &str = "Short generated successfully!";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        AppState { pipeline: Arc::new(pipeline) }
    }
}

/// `POST /api/generate` body
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// `POST /api/generate` success body
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub video_url: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Error response: 400 for bad input, 500 for everything downstream
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        if err.is_client_error() {
            ApiError::bad_request(err.to_string())
        } else {
            ApiError::internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cfg = state.pipeline.config();
    let clips = ServeDir::new(&cfg.output_dir);
    let prefix = cfg.public_prefix.trim_end_matches('/').to_string();

    let app = Router::new()
        .route_service("/", ServeFile::new(&cfg.index_page))
        .route("/api/generate", post(generate));

    let app = if prefix.is_empty() {
        app.fallback_service(clips)
    } else {
        app.nest_service(&prefix, clips)
    };

    app.with_state(state)
}

async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            // Sweep regardless of what the body looked like
            state.pipeline.janitor().spawn_sweep();
            return Err(ApiError::bad_request(rejection.body_text()));
        }
    };

    // Owned by its own task: a client hanging up does not cancel a
    // download or encode that has already started
    let pipeline = Arc::clone(&state.pipeline);
    let short = tokio::spawn(async move { pipeline.generate(request.url.as_deref()).await })
        .await
        .map_err(|e| ApiError::internal(format!("Request task failed: {}", e)))??;

    Ok(Json(GenerateResponse {
        success: true,
        video_url: short.public_url,
        message: SUCCESS_MESSAGE.to_string(),
    }))
}

/// Serve until Ctrl-C
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🚀 Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;
    use crate::config::ShortsConfig;

    fn test_config(root: &Path) -> ShortsConfig {
        let cfg = ShortsConfig {
            staging_dir: root.join("downloads"),
            output_dir: root.join("static/outputs"),
            index_page: root.join("index.html"),
            ytdlp_bin: PathBuf::from("/nonexistent/yt-dlp"),
            ffmpeg_bin: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe_bin: PathBuf::from("/nonexistent/ffprobe"),
            ..Default::default()
        };
        cfg.ensure_dirs().unwrap();
        cfg
    }

    fn app(cfg: &ShortsConfig) -> Router {
        router(AppState::new(Pipeline::new(cfg)))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn error_of(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice::<ErrorBody>(&bytes).unwrap().error
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    /// Point the config at fake yt-dlp/ffprobe/ffmpeg scripts under `root/bin`
    #[cfg(unix)]
    fn with_fake_tools(mut cfg: ShortsConfig, root: &Path, download_delay_secs: u32) -> ShortsConfig {
        use crate::fake_tools;

        let bin = root.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        cfg.ytdlp_bin = fake_tools::ytdlp(&bin, download_delay_secs);
        cfg.ffprobe_bin = fake_tools::ffprobe(&bin, fake_tools::LANDSCAPE_JSON);
        cfg.ffmpeg_bin = fake_tools::ffmpeg(&bin);
        cfg
    }

    #[tokio::test]
    async fn test_missing_url_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());

        for body in [r#"{}"#, r#"{"url": ""}"#, r#"{"url": null}"#, r#"{"url": "  "}"#] {
            let response = app(&cfg).oneshot(post_json(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
            assert_eq!(error_of(response).await, crate::pipeline::MISSING_URL_MESSAGE);
        }

        assert_eq!(file_count(&cfg.staging_dir), 0);
        assert_eq!(file_count(&cfg.output_dir), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());

        let response = app(&cfg).oneshot(post_json("{ not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!error_of(response).await.is_empty());

        let response = app(&cfg).oneshot(post_json(r#"{"url": 42}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_downstream_failure_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        let app = app(&cfg);

        let response = app
            .clone()
            .oneshot(post_json(r#"{"url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error = error_of(response).await;
        assert!(error.contains("yt-dlp"), "unexpected error: {}", error);

        // Router still answers after a failure
        let response = app.oneshot(post_json(r#"{}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_success_body() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = with_fake_tools(test_config(dir.path()), dir.path(), 0);

        let response = app(&cfg)
            .oneshot(post_json(r#"{"url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: GenerateResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(body.success);
        assert_eq!(body.message, SUCCESS_MESSAGE);
        assert!(body.video_url.starts_with("/static/outputs/video_"), "{}", body.video_url);
        assert!(body.video_url.ends_with("_short.mp4"), "{}", body.video_url);

        // Source consumed, one clip left behind and reachable at video_url
        assert_eq!(file_count(&cfg.staging_dir), 0);
        assert_eq!(file_count(&cfg.output_dir), 1);
        let file_name = body.video_url.rsplit('/').next().unwrap();
        assert!(cfg.output_dir.join(file_name).is_file());

        let response = app(&cfg)
            .oneshot(Request::get(body.video_url.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_outlives_dropped_request() {
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let cfg = with_fake_tools(test_config(dir.path()), dir.path(), 1);

        // Give up on the response while yt-dlp is still sleeping
        let request = app(&cfg)
            .oneshot(post_json(r#"{"url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"}"#));
        let abandoned = tokio::time::timeout(Duration::from_millis(200), request).await;
        assert!(abandoned.is_err());

        let mut finished = false;
        for _ in 0..100 {
            if file_count(&cfg.output_dir) == 1 && file_count(&cfg.staging_dir) == 0 {
                finished = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(finished, "request work stopped when the client went away");
    }

    #[tokio::test]
    async fn test_serves_landing_page_and_clips() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        std::fs::write(&cfg.index_page, "<h1>shorts</h1>").unwrap();
        std::fs::write(cfg.output_dir.join("video_1_short.mp4"), b"mp4").unwrap();

        let response = app(&cfg)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>shorts</h1>");

        let response = app(&cfg)
            .oneshot(Request::get("/static/outputs/video_1_short.mp4").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(&cfg)
            .oneshot(Request::get("/static/outputs/missing.mp4").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_pipeline_errors_map_to_status() {
        let err: ApiError = PipelineError::InvalidInput("x".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = PipelineError::Fetch(anyhow::anyhow!("network down")).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "network down");

        let err: ApiError = PipelineError::Transform(anyhow::anyhow!("bad codec")).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}

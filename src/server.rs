//! # HTTP Server Module
//!
//! Superficie HTTP locale (axum) sopra `MediaPress`.
//!
//! ## Rotte:
//! - `POST /check_files` (multipart `files[]`): nomi già presenti in source/output
//! - `POST /upload` (multipart `files[]` + campi settings): un job per file
//! - `GET /processing_status`: `{"active_jobs": n}`
//! - `GET /status`: `{"log": [...]}`
//! - `GET /clear_log`, `POST /clear_all`
//! - `GET /get_results`: elenco dei risultati con anteprima
//! - `GET|POST /work_directory`: cartella di lavoro corrente / nuova base
//! - `GET /output/...`, `GET /static/...`: file prodotti e asset statici
//!
//! Ogni risposta porta gli header no-cache.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Request, State},
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info, warn};

use crate::error::PressError;
use crate::service::{MediaPress, UploadedFile};
use crate::settings::UserSettings;

pub type AppState = Arc<MediaPress>;

/// `PressError` rendered as `{"error": ...}` with 400 or 500
#[derive(Debug)]
pub struct HttpError(pub PressError);

impl From<PressError> for HttpError {
    fn from(err: PressError) -> Self {
        HttpError(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            warn!(error = %self.0, "Rejected request");
            StatusCode::BAD_REQUEST
        } else {
            error!(error = ?self.0, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type HttpResult<T> = Result<T, HttpError>;

pub fn router(press: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/check_files", post(check_files))
        .route("/upload", post(upload))
        .route("/processing_status", get(processing_status))
        .route("/status", get(status))
        .route("/clear_log", get(clear_log))
        .route("/clear_all", post(clear_all))
        .route("/get_results", get(get_results))
        .route("/work_directory", get(get_work_directory).post(set_work_directory))
        .route("/output/{*path}", get(serve_output))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::disable())
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(header::EXPIRES, HeaderValue::from_static("0")))
        .with_state(press)
}

/// Bind on localhost and serve until Ctrl-C, then drain in-flight jobs
pub async fn serve(press: AppState, port: u16, static_dir: &Path) -> anyhow::Result<()> {
    let app = router(press.clone(), static_dir);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🚀 Media press listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    press.shutdown().await;
    info!("👋 Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

struct UploadForm {
    files: Vec<UploadedFile>,
    fields: Vec<(String, String)>,
}

async fn read_form(mut multipart: Multipart) -> HttpResult<UploadForm> {
    let bad_request = |e: axum::extract::multipart::MultipartError| {
        HttpError(PressError::Validation(format!("Failed to read multipart: {}", e)))
    };

    let mut form = UploadForm { files: Vec::new(), fields: Vec::new() };
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        if field_name == "files[]" || field_name == "files" {
            let name = field.file_name().map(|s| s.to_string()).unwrap_or_default();
            let contents = field.bytes().await.map_err(bad_request)?;
            form.files.push(UploadedFile { name, contents: contents.to_vec() });
        } else {
            let value = field.text().await.map_err(bad_request)?;
            form.fields.push((field_name, value));
        }
    }
    Ok(form)
}

async fn check_files(
    State(press): State<AppState>,
    multipart: Multipart,
) -> HttpResult<Json<Value>> {
    let form = read_form(multipart).await?;
    let names: Vec<String> = form.files.into_iter().map(|f| f.name).collect();
    let report = press.check_files(&names).await?;
    Ok(Json(json!(report)))
}

async fn upload(State(press): State<AppState>, multipart: Multipart) -> HttpResult<Json<Value>> {
    // fail before reading the whole body when nothing is configured
    if press.work_dirs().await.is_none() {
        return Err(PressError::NotConfigured.into());
    }
    let form = read_form(multipart).await?;
    let settings =
        UserSettings::from_form(form.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    let job_ids = press.upload(form.files, settings).await?;
    Ok(Json(json!({ "status": "success", "job_ids": job_ids })))
}

async fn processing_status(State(press): State<AppState>) -> Json<Value> {
    Json(json!({ "active_jobs": press.processing_status() }))
}

async fn status(State(press): State<AppState>) -> Json<Value> {
    Json(json!({ "log": press.log_snapshot() }))
}

async fn clear_log(State(press): State<AppState>) -> Json<Value> {
    press.clear_log();
    Json(json!({ "status": "cleared" }))
}

async fn clear_all(State(press): State<AppState>) -> HttpResult<Json<Value>> {
    press.clear_all().await?;
    Ok(Json(json!({ "status": "success" })))
}

async fn get_results(State(press): State<AppState>) -> Json<Value> {
    Json(json!({ "results": press.results().await }))
}

async fn get_work_directory(State(press): State<AppState>) -> Json<Value> {
    Json(json!({ "work_directory": press.work_directory().await }))
}

#[derive(Debug, Deserialize)]
struct WorkDirectoryRequest {
    base_directory: PathBuf,
}

async fn set_work_directory(
    State(press): State<AppState>,
    Json(request): Json<WorkDirectoryRequest>,
) -> HttpResult<Json<Value>> {
    let dirs = press.set_work_directory(&request.base_directory).await?;
    Ok(Json(json!({ "work_directory": dirs.work_dir })))
}

async fn serve_output(State(press): State<AppState>, mut request: Request) -> Response {
    let Some(dirs) = press.work_dirs().await else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let relative = request.uri().path().strip_prefix("/output").unwrap_or("/").to_string();
    match relative.parse::<Uri>() {
        Ok(uri) => *request.uri_mut() = uri,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    }

    match ServeDir::new(&dirs.output_dir).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

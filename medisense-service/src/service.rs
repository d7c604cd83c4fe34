use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use report_flow::{FlowError, InMemorySessionStorage, PipelineRunner, Session, SessionStorage};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    agent::{AnalysisAgent, GeminiAgent},
    config::AppConfig,
    models::{AnalysisReport, AnalyzeResponse, Language, SessionResponse, session_keys},
    pdf,
    sanitize::clean_for_speech,
    speech::{GoogleSpeechSynthesizer, SpeechSynthesizer, SynthesisError},
    translate::{GoogleTranslator, Translator},
    upload::{UploadFormat, sniff_format},
    workflow,
};

const PDF_FILENAME: &str = "Medical_Analysis_Report.pdf";
const AUDIO_FILENAME: &str = "analysis_audio.mp3";
const UPLOAD_LIMIT_BYTES: usize = 32 * 1024 * 1024;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn conflict_error(message: &str) -> ApiError {
    (StatusCode::CONFLICT, Json(json!({ "error": message })))
}

fn service_disabled_error() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "analysis is disabled: GOOGLE_API_KEY is not configured"
        })),
    )
}

fn upstream_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub session_storage: Arc<dyn SessionStorage>,
    pub runner: PipelineRunner,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl AppState {
    /// State backed by the real external services.
    pub fn new(config: AppConfig) -> Self {
        let api_key = config.api_key.clone().unwrap_or_default();
        Self::with_services(
            config,
            Arc::new(GeminiAgent::new(api_key)),
            Arc::new(GoogleTranslator::new()),
            Arc::new(GoogleSpeechSynthesizer::new()),
        )
    }

    /// State with explicit collaborators.
    pub fn with_services(
        config: AppConfig,
        agent: Arc<dyn AnalysisAgent>,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let session_storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let runner = workflow::create_runner(agent, translator, session_storage.clone());

        Self {
            config: Arc::new(config),
            session_storage,
            runner,
            synthesizer,
        }
    }
}

pub async fn create_app(config: AppConfig) -> Router {
    build_router(AppState::new(config))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/analysis", post(start_analysis))
        .route(
            "/analysis/{session_id}",
            get(get_session_status)
                .post(reanalyze)
                .delete(delete_session),
        )
        .route("/analysis/{session_id}/report.pdf", get(download_report))
        .route("/analysis/{session_id}/speech.mp3", get(download_speech))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "MediSense Analysis Service",
        "version": "1.0.0",
        "description": "AI-powered analysis of medical imaging data with translation, speech and PDF export",
        "analysis_enabled": state.config.analysis_enabled(),
        "endpoints": {
            "POST /analysis": "Upload an image (multipart: image, language) and run analysis",
            "POST /analysis/{session_id}": "Re-run analysis for a session with a fresh upload",
            "GET /analysis/{session_id}": "Get session status and report",
            "GET /analysis/{session_id}/report.pdf": "Download the report as PDF",
            "GET /analysis/{session_id}/speech.mp3": "Synthesize and download the spoken report",
            "DELETE /analysis/{session_id}": "Remove the session and its artifacts",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let mut body = json!({
        "status": "healthy",
        "analysis_enabled": state.config.analysis_enabled(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    });
    if !state.config.analysis_enabled() {
        body["warning"] =
            json!("GOOGLE_API_KEY is not configured; the analyze action is disabled");
    }
    Json(body)
}

/// One parsed multipart upload.
struct Upload {
    bytes: Vec<u8>,
    format: UploadFormat,
    language: Language,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut image: Option<Vec<u8>> = None;
    let mut language = Language::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request_error(&format!("invalid multipart payload: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request_error(&format!("failed to read image field: {e}")))?;
                image = Some(bytes.to_vec());
            }
            Some("language") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request_error(&format!("failed to read language field: {e}")))?;
                language = value
                    .trim()
                    .parse()
                    .map_err(|e: crate::models::UnsupportedLanguage| {
                        bad_request_error(&e.to_string())
                    })?;
            }
            _ => {}
        }
    }

    let bytes = image.ok_or_else(|| bad_request_error("an 'image' file field is required"))?;
    if bytes.is_empty() {
        return Err(bad_request_error("uploaded image is empty"));
    }
    let format = sniff_format(&bytes).ok_or_else(|| {
        bad_request_error("unsupported image format; expected JPG, JPEG, PNG or DICOM")
    })?;

    Ok(Upload {
        bytes,
        format,
        language,
    })
}

async fn persist_upload(
    state: &AppState,
    session_id: &str,
    upload: &Upload,
) -> Result<PathBuf, ApiError> {
    let dir = state.config.session_dir(session_id);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| internal_error("failed to create session directory", &e.to_string()))?;

    let path = dir.join(format!("upload.{}", upload.format.extension()));
    tokio::fs::write(&path, &upload.bytes)
        .await
        .map_err(|e| internal_error("failed to persist uploaded image", &e.to_string()))?;

    Ok(path)
}

async fn start_analysis(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<AnalyzeResponse> {
    if !state.config.analysis_enabled() {
        warn!("analysis requested while the service credential is missing");
        return Err(service_disabled_error());
    }

    let upload = read_upload(multipart).await?;
    let session_id = Uuid::new_v4().to_string();

    info!(
        session_id = %session_id,
        language = upload.language.code(),
        bytes = upload.bytes.len(),
        "starting analysis for new upload"
    );

    let image_path = persist_upload(&state, &session_id, &upload).await?;
    let session = workflow::create_analysis_session(
        session_id.clone(),
        image_path.to_string_lossy().into_owned(),
        upload.format,
        upload.language,
    );

    save_session(&state, session).await?;
    run_analysis(&state, &session_id).await
}

async fn reanalyze(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    multipart: Multipart,
) -> ApiResult<AnalyzeResponse> {
    if !state.config.analysis_enabled() {
        warn!("analysis requested while the service credential is missing");
        return Err(service_disabled_error());
    }

    let mut session = load_session(&state, &session_id).await?;
    let upload = read_upload(multipart).await?;

    info!(
        session_id = %session_id,
        language = upload.language.code(),
        "re-running analysis with a fresh upload"
    );

    let image_path = persist_upload(&state, &session_id, &upload).await?;
    workflow::reset_session(
        &mut session,
        image_path.to_string_lossy().into_owned(),
        upload.format,
        upload.language,
    );

    save_session(&state, session).await?;
    run_analysis(&state, &session_id).await
}

async fn save_session(state: &AppState, session: Session) -> Result<(), ApiError> {
    state.session_storage.save(session).await.map_err(|e| {
        error!("failed to save session: {}", e);
        internal_error("failed to save analysis session", &e.to_string())
    })
}

async fn load_session(state: &AppState, session_id: &str) -> Result<Session, ApiError> {
    match state.session_storage.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => {
            error!("failed to load session {}: {}", session_id, e);
            Err(internal_error("failed to load session", &e.to_string()))
        }
    }
}

fn load_report(session: &Session) -> Result<AnalysisReport, ApiError> {
    session
        .context
        .get(session_keys::REPORT)
        .ok_or_else(|| internal_error("session has no report", &session.id))
}

async fn run_analysis(state: &AppState, session_id: &str) -> ApiResult<AnalyzeResponse> {
    match state.runner.run(session_id).await {
        Ok(outcome) => {
            let session = load_session(state, session_id).await?;
            let report = load_report(&session)?;

            let analysis = outcome
                .response
                .or_else(|| report.display_text().map(str::to_string))
                .unwrap_or_default();

            info!(session_id = %session_id, "analysis completed");

            Ok(Json(AnalyzeResponse {
                session_id: session_id.to_string(),
                status: "completed".to_string(),
                language: report.language,
                analysis,
                translation_degraded: report.translation_degraded,
            }))
        }
        Err(FlowError::SessionNotFound(_)) => {
            Err(not_found_error("Session not found", session_id))
        }
        Err(e) => {
            error!("analysis failed for session {}: {}", session_id, e);
            Err(upstream_error("image analysis failed", &e.to_string()))
        }
    }
}

async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let session = load_session(&state, &session_id).await?;

    let status = if session.completed {
        "completed".to_string()
    } else {
        "active".to_string()
    };

    let mut context_map = std::collections::HashMap::new();
    if let Ok(report) = load_report(&session) {
        if let Some(analysis) = &report.analysis_text {
            context_map.insert("analysis_text".to_string(), json!(analysis));
        }
        if let Some(translated) = &report.translated_text {
            context_map.insert("translated_text".to_string(), json!(translated));
        }
        if let Some(note) = &report.translation_degraded {
            context_map.insert("translation_degraded".to_string(), json!(note));
        }
        if let Some(audio) = &report.audio_path {
            context_map.insert("audio_path".to_string(), json!(audio));
        }
        context_map.insert("language".to_string(), json!(report.language));
    }

    Ok(Json(SessionResponse {
        session_id: session.id.clone(),
        status,
        status_message: session.status_message.clone(),
        context: context_map,
    }))
}

async fn download_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_session(&state, &session_id).await?;
    let report = load_report(&session)?;

    let text = report
        .display_text()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| conflict_error("no analysis available to export yet"))?;

    let bytes = pdf::render_report(text).map_err(|e| {
        error!("PDF export failed for session {}: {}", session_id, e);
        internal_error("failed to export report", &e.to_string())
    })?;

    info!(session_id = %session_id, bytes = bytes.len(), "report exported as PDF");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", PDF_FILENAME),
            ),
        ],
        bytes,
    ))
}

async fn download_speech(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_session(&state, &session_id).await?;
    let mut report = load_report(&session)?;

    let text = report
        .display_text()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| conflict_error("no analysis available to synthesize yet"))?;

    let spoken = clean_for_speech(text);
    let audio_path = state.config.session_dir(&session_id).join(AUDIO_FILENAME);

    let written = state
        .synthesizer
        .synthesize(&spoken, report.language, &audio_path)
        .await
        .map_err(|e| {
            error!("speech synthesis failed for session {}: {}", session_id, e);
            match e {
                SynthesisError::EmptyText => {
                    conflict_error("analysis text is empty after cleanup")
                }
                other => upstream_error("speech synthesis failed", &other.to_string()),
            }
        })?;

    let bytes = tokio::fs::read(&written)
        .await
        .map_err(|e| internal_error("failed to read synthesized audio", &e.to_string()))?;

    report.audio_path = Some(written.to_string_lossy().into_owned());
    session.context.set(session_keys::REPORT, &report);
    save_session(&state, session).await?;

    info!(session_id = %session_id, bytes = bytes.len(), "spoken report synthesized");

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mp3".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", AUDIO_FILENAME),
            ),
        ],
        bytes,
    ))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    // Confirm the session exists before touching the filesystem.
    let _ = load_session(&state, &session_id).await?;

    if let Err(e) = state.session_storage.delete(&session_id).await {
        error!("failed to delete session {}: {}", session_id, e);
        return Err(internal_error("failed to delete session", &e.to_string()));
    }

    let dir = state.config.session_dir(&session_id);
    if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(session_id = %session_id, "failed to remove artifacts: {}", e);
        }
    }

    info!(session_id = %session_id, "session and artifacts removed");

    Ok(Json(json!({
        "session_id": session_id,
        "status": "deleted"
    })))
}

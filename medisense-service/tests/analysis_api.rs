//! End-to-end tests for the analysis API, with the external collaborators
//! (agent, translator, speech service) replaced by deterministic stubs.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use image::{ImageFormat, RgbImage};
use medisense_service::agent::{AgentError, AnalysisAgent};
use medisense_service::models::{AnalyzeResponse, Language, SessionResponse};
use medisense_service::speech::{SpeechSynthesizer, SynthesisError};
use medisense_service::translate::{TranslationError, Translator};
use medisense_service::{AppConfig, AppState, build_router};
use std::collections::VecDeque;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const AGENT_RESPONSE: &str = "Okay, here is the analysis:\n\
### 1. Image Type & Region\n\
- Chest X-ray, PA view\n\
### 2. Key Findings\n\
- Lungs are clear, severity: Normal";

const SPANISH_STUB: &str =
    "### 1. Tipo de imagen\n- Radiografía de tórax\n### 2. Hallazgos\n- Pulmones despejados";

struct StubAgent {
    responses: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl StubAgent {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisAgent for StubAgent {
    async fn analyze(&self, image_path: &Path, _mime_type: &str) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(
            image_path.exists(),
            "uploaded image must be persisted before the agent call"
        );
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| AGENT_RESPONSE.to_string());
        Ok(next)
    }
}

/// Returns a fixed translation, or echoes the input when none is configured.
struct StubTranslator {
    fixed: Option<String>,
}

#[async_trait]
impl Translator for StubTranslator {
    async fn translate(
        &self,
        text: &str,
        _target: Language,
    ) -> Result<String, TranslationError> {
        Ok(self.fixed.clone().unwrap_or_else(|| text.to_string()))
    }
}

/// Always fails, for the fault-isolation test.
struct FailingTranslator;

#[async_trait]
impl Translator for FailingTranslator {
    async fn translate(
        &self,
        _text: &str,
        _target: Language,
    ) -> Result<String, TranslationError> {
        Err(TranslationError::MalformedResponse)
    }
}

struct StubSynthesizer;

#[async_trait]
impl SpeechSynthesizer for StubSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _language: Language,
        output_path: &Path,
    ) -> Result<PathBuf, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut frame = vec![0xFFu8, 0xFB, 0x90, 0x00];
        frame.extend_from_slice(text.as_bytes());
        tokio::fs::write(output_path, &frame).await?;
        Ok(output_path.to_path_buf())
    }
}

fn test_router(
    artifact_dir: PathBuf,
    api_key: Option<&str>,
    agent: Arc<dyn AnalysisAgent>,
    translator: Arc<dyn Translator>,
) -> Router {
    let config = AppConfig {
        api_key: api_key.map(str::to_string),
        port: 0,
        artifact_dir,
    };
    build_router(AppState::with_services(
        config,
        agent,
        translator,
        Arc::new(StubSynthesizer),
    ))
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::new(width, height);
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

fn multipart_upload(image: &[u8], language: Option<&str>) -> (String, Vec<u8>) {
    let boundary = "medisense-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"image\"; filename=\"scan.png\"\r\n\
          Content-Type: image/png\r\n\r\n",
    );
    body.extend_from_slice(image);
    body.extend_from_slice(b"\r\n");
    if let Some(language) = language {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"language\"\r\n\r\n");
        body.extend_from_slice(language.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

async fn post_analysis(
    app: &Router,
    uri: &str,
    image: &[u8],
    language: Option<&str>,
) -> (StatusCode, Vec<u8>) {
    let (content_type, body) = multipart_upload(image, language);
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn full_analysis_flow_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let agent = StubAgent::new(&[AGENT_RESPONSE]);
    let app = test_router(
        dir.path().to_path_buf(),
        Some("test-key"),
        agent.clone(),
        Arc::new(StubTranslator {
            fixed: Some(SPANISH_STUB.to_string()),
        }),
    );

    // Upload a 500x300 PNG and analyze to Spanish.
    let (status, body) = post_analysis(&app, "/analysis", &png_bytes(500, 300), Some("es")).await;
    assert_eq!(status, StatusCode::OK);
    let analyze: AnalyzeResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(analyze.status, "completed");
    assert_eq!(analyze.language, Language::Es);
    assert_eq!(analyze.analysis, SPANISH_STUB);
    assert_eq!(agent.call_count(), 1);

    // The stored English analysis has the preamble stripped but keeps the
    // structured sections.
    let (status, body) = get(&app, &format!("/analysis/{}", analyze.session_id)).await;
    assert_eq!(status, StatusCode::OK);
    let session: SessionResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(session.status, "completed");
    let analysis_text = session.context["analysis_text"].as_str().unwrap();
    assert!(!analysis_text.contains("Okay, here is the analysis:"));
    assert!(analysis_text.contains("### 2. Key Findings"));

    // The uploaded image was removed once the agent call finished.
    let upload_path = dir.path().join(&analyze.session_id).join("upload.png");
    assert!(!upload_path.exists());

    // On-demand PDF export.
    let (status, body) = get(
        &app,
        &format!("/analysis/{}/report.pdf", analyze.session_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(b"%PDF-"));

    // Lazy speech synthesis produces a non-empty MP3 on disk.
    let (status, body) = get(
        &app,
        &format!("/analysis/{}/speech.mp3", analyze.session_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.is_empty());
    let audio_path = dir
        .path()
        .join(&analyze.session_id)
        .join("analysis_audio.mp3");
    assert!(audio_path.exists());
    assert!(std::fs::metadata(&audio_path).unwrap().len() > 0);

    // Deleting the session removes its artifacts.
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/analysis/{}", analyze.session_id))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!audio_path.exists());
}

#[tokio::test]
async fn missing_credential_disables_analysis_without_network_calls() {
    let dir = tempfile::tempdir().unwrap();
    let agent = StubAgent::new(&[]);
    let app = test_router(
        dir.path().to_path_buf(),
        None,
        agent.clone(),
        Arc::new(StubTranslator { fixed: None }),
    );

    let (status, _) = post_analysis(&app, "/analysis", &png_bytes(100, 100), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(agent.call_count(), 0);

    // Health advertises the degraded state instead of crashing.
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["analysis_enabled"], serde_json::json!(false));
    assert!(health["warning"].as_str().unwrap().contains("GOOGLE_API_KEY"));
}

#[tokio::test]
async fn repeated_analysis_overwrites_previous_report() {
    let dir = tempfile::tempdir().unwrap();
    let agent = StubAgent::new(&[
        "### Findings\nFirst run: small nodule noted.",
        "### Findings\nSecond run: nodule resolved.",
    ]);
    let app = test_router(
        dir.path().to_path_buf(),
        Some("test-key"),
        agent.clone(),
        Arc::new(StubTranslator { fixed: None }),
    );

    let (status, body) = post_analysis(&app, "/analysis", &png_bytes(64, 64), None).await;
    assert_eq!(status, StatusCode::OK);
    let first: AnalyzeResponse = serde_json::from_slice(&body).unwrap();
    assert!(first.analysis.contains("First run"));

    let (status, body) = post_analysis(
        &app,
        &format!("/analysis/{}", first.session_id),
        &png_bytes(64, 64),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let second: AnalyzeResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert!(second.analysis.contains("Second run"));
    assert_eq!(agent.call_count(), 2);

    // The stored report now reflects only the second run.
    let (_, body) = get(&app, &format!("/analysis/{}", first.session_id)).await;
    let session: SessionResponse = serde_json::from_slice(&body).unwrap();
    let stored = session.context["translated_text"].as_str().unwrap();
    assert!(stored.contains("Second run"));
    assert!(!stored.contains("First run"));
}

#[tokio::test]
async fn translation_failure_degrades_to_original_text() {
    let dir = tempfile::tempdir().unwrap();
    let agent = StubAgent::new(&[AGENT_RESPONSE]);
    let app = test_router(
        dir.path().to_path_buf(),
        Some("test-key"),
        agent,
        Arc::new(FailingTranslator),
    );

    let (status, body) = post_analysis(&app, "/analysis", &png_bytes(64, 64), Some("hi")).await;
    assert_eq!(status, StatusCode::OK);
    let analyze: AnalyzeResponse = serde_json::from_slice(&body).unwrap();

    // The untranslated analysis is shown, with a degradation note.
    assert!(analyze.analysis.contains("### 2. Key Findings"));
    let note = analyze.translation_degraded.expect("degradation note");
    assert!(note.contains("hi"));

    // The PDF download still works despite the translation failure.
    let (status, body) = get(
        &app,
        &format!("/analysis/{}/report.pdf", analyze.session_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn rejects_bad_uploads_and_unknown_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let agent = StubAgent::new(&[]);
    let app = test_router(
        dir.path().to_path_buf(),
        Some("test-key"),
        agent.clone(),
        Arc::new(StubTranslator { fixed: None }),
    );

    // Unsupported language code.
    let (status, _) = post_analysis(&app, "/analysis", &png_bytes(32, 32), Some("de")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Bytes that are neither JPG, PNG nor DICOM.
    let (status, _) = post_analysis(&app, "/analysis", b"plain text, not an image", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No image field at all.
    let request = Request::builder()
        .method("POST")
        .uri("/analysis")
        .header(
            header::CONTENT_TYPE,
            "multipart/form-data; boundary=medisense-test-boundary",
        )
        .body(Body::from("--medisense-test-boundary--\r\n"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // None of the rejected requests reached the agent.
    assert_eq!(agent.call_count(), 0);

    // Artifacts of unknown sessions are 404s.
    let (status, _) = get(&app, "/analysis/no-such-session/report.pdf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&app, "/analysis/no-such-session/speech.mp3").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&app, "/analysis/no-such-session").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

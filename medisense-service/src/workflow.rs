use report_flow::{Pipeline, PipelineBuilder, PipelineRunner, Session, SessionStorage};
use std::sync::Arc;
use uuid::Uuid;

use crate::agent::AnalysisAgent;
use crate::models::{AnalysisReport, Language, session_keys};
use crate::stages::{ANALYZE_IMAGE_STAGE, AnalyzeImageStage, TranslateReportStage};
use crate::translate::Translator;
use crate::upload::UploadFormat;

pub fn build_analysis_pipeline(
    agent: Arc<dyn AnalysisAgent>,
    translator: Arc<dyn Translator>,
) -> Pipeline {
    PipelineBuilder::new("medical_image_analysis")
        .stage(Arc::new(AnalyzeImageStage::new(agent)))
        .stage(Arc::new(TranslateReportStage::new(translator)))
        .build()
}

pub fn create_runner(
    agent: Arc<dyn AnalysisAgent>,
    translator: Arc<dyn Translator>,
    session_storage: Arc<dyn SessionStorage>,
) -> PipelineRunner {
    let pipeline = Arc::new(build_analysis_pipeline(agent, translator));
    PipelineRunner::new(pipeline, session_storage)
}

fn fresh_report(image_path: String, format: UploadFormat, language: Language) -> AnalysisReport {
    AnalysisReport {
        id: Uuid::new_v4().to_string(),
        image_path,
        image_mime: format.mime_type().to_string(),
        language,
        raw_analysis: None,
        analysis_text: None,
        translated_text: None,
        translation_degraded: None,
        audio_path: None,
    }
}

/// New session positioned at the start of the analysis pipeline.
pub fn create_analysis_session(
    session_id: String,
    image_path: String,
    format: UploadFormat,
    language: Language,
) -> Session {
    let session = Session::new(session_id, ANALYZE_IMAGE_STAGE);
    session
        .context
        .set(session_keys::REPORT, fresh_report(image_path, format, language));
    session
}

/// Point an existing session at a fresh upload: the stored report is
/// replaced wholesale and the cursor moves back to the first stage
/// (last-write-wins, no history retained).
pub fn reset_session(
    session: &mut Session,
    image_path: String,
    format: UploadFormat,
    language: Language,
) {
    session
        .context
        .set(session_keys::REPORT, fresh_report(image_path, format, language));
    session.current_stage_id = ANALYZE_IMAGE_STAGE.to_string();
    session.status_message = None;
    session.completed = false;
}

use async_trait::async_trait;
use report_flow::{Context, FlowError, Result, Stage, StageResult};
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{AnalysisReport, session_keys};
use crate::translate::Translator;

pub const TRANSLATE_REPORT_STAGE: &str = "translate_report";

/// Translates the report into the session's target language.
///
/// A translation failure keeps the untranslated text and records a
/// degradation note instead of failing the whole analysis.
pub struct TranslateReportStage {
    translator: Arc<dyn Translator>,
}

impl TranslateReportStage {
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self { translator }
    }
}

#[async_trait]
impl Stage for TranslateReportStage {
    fn id(&self) -> &str {
        TRANSLATE_REPORT_STAGE
    }

    async fn run(&self, context: &Context) -> Result<StageResult> {
        let mut report: AnalysisReport = context
            .get(session_keys::REPORT)
            .ok_or_else(|| FlowError::ContextMissing("report not found in context".to_string()))?;

        let analysis = report.analysis_text.clone().ok_or_else(|| {
            FlowError::ContextMissing("analysis text not found in context".to_string())
        })?;

        match self.translator.translate(&analysis, report.language).await {
            Ok(translated) => {
                info!(language = report.language.code(), "report translated");
                report.translated_text = Some(translated);
                report.translation_degraded = None;
            }
            Err(e) => {
                warn!(
                    language = report.language.code(),
                    "translation failed, keeping original text: {}", e
                );
                report.translated_text = Some(analysis);
                report.translation_degraded = Some(format!(
                    "translation to {} unavailable: {}",
                    report.language.code(),
                    e
                ));
            }
        }

        context.set(session_keys::REPORT, &report);

        let response = report.translated_text.clone();
        Ok(StageResult::finish(response, "analysis complete"))
    }
}

use async_trait::async_trait;
use report_flow::{Context, FlowError, Result, Stage, StageResult};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::agent::AnalysisAgent;
use crate::models::{AnalysisReport, session_keys};
use crate::sanitize::strip_preamble;

pub const ANALYZE_IMAGE_STAGE: &str = "analyze_image";

/// Runs the multimodal agent on the uploaded image and stores the
/// preamble-filtered report text.
pub struct AnalyzeImageStage {
    agent: Arc<dyn AnalysisAgent>,
}

impl AnalyzeImageStage {
    pub fn new(agent: Arc<dyn AnalysisAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Stage for AnalyzeImageStage {
    fn id(&self) -> &str {
        ANALYZE_IMAGE_STAGE
    }

    async fn run(&self, context: &Context) -> Result<StageResult> {
        let mut report: AnalysisReport = context
            .get(session_keys::REPORT)
            .ok_or_else(|| FlowError::ContextMissing("report not found in context".to_string()))?;

        info!(image = %report.image_path, "starting image analysis");

        let raw = self
            .agent
            .analyze(Path::new(&report.image_path), &report.image_mime)
            .await
            .map_err(|e| FlowError::StageFailed(format!("analysis agent call failed: {e}")))?;

        let analysis = strip_preamble(&raw);
        if analysis.trim().is_empty() {
            return Err(FlowError::StageFailed(
                "analysis agent returned no usable text".to_string(),
            ));
        }

        info!("analysis produced {} characters", analysis.len());

        report.raw_analysis = Some(raw);
        report.analysis_text = Some(analysis);
        context.set(session_keys::REPORT, &report);

        // The uploaded image is only needed for the agent call.
        if let Err(e) = tokio::fs::remove_file(&report.image_path).await {
            warn!(image = %report.image_path, "failed to remove uploaded image: {}", e);
        }

        Ok(StageResult::advance("image analyzed, report text ready"))
    }
}

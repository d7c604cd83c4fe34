use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// Outcome of one stage execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Text to surface to the caller, if any.
    pub response: Option<String>,
    /// How the pipeline should proceed.
    pub next: NextStep,
    /// Human-readable progress note stored on the session.
    pub status: Option<String>,
}

impl StageResult {
    /// Advance to the next stage and execute it in the same request.
    pub fn advance(status: impl Into<String>) -> Self {
        Self {
            response: None,
            next: NextStep::RunNext,
            status: Some(status.into()),
        }
    }

    /// Advance the cursor and stop; the next request resumes from there.
    pub fn pause(response: Option<String>, status: impl Into<String>) -> Self {
        Self {
            response,
            next: NextStep::Continue,
            status: Some(status.into()),
        }
    }

    /// The pipeline is done for this session.
    pub fn finish(response: Option<String>, status: impl Into<String>) -> Self {
        Self {
            response,
            next: NextStep::Finish,
            status: Some(status.into()),
        }
    }
}

/// What the pipeline does after a stage returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NextStep {
    /// Move the cursor to the next stage and return to the caller.
    Continue,
    /// Move the cursor to the next stage and execute it immediately.
    RunNext,
    /// Mark the session complete.
    Finish,
}

/// One unit of pipeline work.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique identifier, used as the session cursor.
    fn id(&self) -> &str;

    async fn run(&self, context: &Context) -> Result<StageResult>;
}

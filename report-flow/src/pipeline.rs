use std::sync::Arc;
use tracing::debug;

use crate::{
    error::{FlowError, Result},
    stage::{NextStep, Stage},
    storage::Session,
};

/// An ordered sequence of stages executed against a session.
///
/// The successor of a stage is simply the next stage in insertion order;
/// there is no branching.
pub struct Pipeline {
    pub id: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    /// First stage of the pipeline, used as the cursor for new sessions.
    pub fn first_stage_id(&self) -> Option<&str> {
        self.stages.first().map(|s| s.id())
    }

    fn stage(&self, stage_id: &str) -> Result<&Arc<dyn Stage>> {
        self.stages
            .iter()
            .find(|s| s.id() == stage_id)
            .ok_or_else(|| FlowError::StageNotFound(stage_id.to_string()))
    }

    fn successor(&self, stage_id: &str) -> Option<&str> {
        let position = self.stages.iter().position(|s| s.id() == stage_id)?;
        self.stages.get(position + 1).map(|s| s.id())
    }

    /// Execute the session's current stage, following `RunNext` chains until
    /// a stage pauses, the pipeline finishes, or a stage fails.
    pub async fn run_session(&self, session: &mut Session) -> Result<RunOutcome> {
        loop {
            let stage = self.stage(&session.current_stage_id)?;
            debug!(pipeline = %self.id, stage = stage.id(), session = %session.id, "executing stage");

            let result = stage.run(&session.context).await?;
            session.status_message = result.status.clone();

            match result.next {
                NextStep::Continue => {
                    if let Some(next) = self.successor(&session.current_stage_id) {
                        session.current_stage_id = next.to_string();
                    }
                    return Ok(RunOutcome {
                        response: result.response,
                        status: RunStatus::InProgress,
                    });
                }
                NextStep::RunNext => match self.successor(&session.current_stage_id) {
                    Some(next) => {
                        session.current_stage_id = next.to_string();
                    }
                    None => {
                        session.completed = true;
                        return Ok(RunOutcome {
                            response: result.response,
                            status: RunStatus::Completed,
                        });
                    }
                },
                NextStep::Finish => {
                    session.completed = true;
                    return Ok(RunOutcome {
                        response: result.response,
                        status: RunStatus::Completed,
                    });
                }
            }
        }
    }
}

/// Builder for assembling pipelines.
pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            pipeline: Pipeline {
                id: id.into(),
                stages: Vec::new(),
            },
        }
    }

    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.pipeline.stages.push(stage);
        self
    }

    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}

/// Result of running a session through the pipeline.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub response: Option<String>,
    pub status: RunStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The session paused partway through; another run resumes it.
    InProgress,
    /// All stages ran to completion.
    Completed,
}

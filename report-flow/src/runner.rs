//! PipelineRunner – convenience wrapper that loads a session, executes the
//! pipeline from the session's cursor, and persists the updated session back
//! to storage.
//!
//! Web services usually want exactly this load → execute → save roundtrip per
//! request. Callers that need custom persistence (batching, transactions) can
//! use [`Pipeline::run_session`] directly.

use std::sync::Arc;

use crate::{
    error::{FlowError, Result},
    pipeline::{Pipeline, RunOutcome},
    storage::SessionStorage,
};

/// High-level helper that orchestrates the common _load → execute → save_ pattern.
#[derive(Clone)]
pub struct PipelineRunner {
    pipeline: Arc<Pipeline>,
    storage: Arc<dyn SessionStorage>,
}

impl PipelineRunner {
    pub fn new(pipeline: Arc<Pipeline>, storage: Arc<dyn SessionStorage>) -> Self {
        Self { pipeline, storage }
    }

    /// Execute the pipeline for `session_id` and persist the updated session.
    pub async fn run(&self, session_id: &str) -> Result<RunOutcome> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;

        let outcome = self.pipeline.run_session(&mut session).await?;

        self.storage.save(session).await?;

        Ok(outcome)
    }
}

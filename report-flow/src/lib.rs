pub mod context;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod stage;
pub mod storage;

// Re-export commonly used types
pub use context::Context;
pub use error::{FlowError, Result};
pub use pipeline::{Pipeline, PipelineBuilder, RunOutcome, RunStatus};
pub use runner::PipelineRunner;
pub use stage::{NextStep, Stage, StageResult};
pub use storage::{InMemorySessionStorage, Session, SessionStorage};

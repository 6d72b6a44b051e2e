//! The avatar generation pipeline: stage model, progress aggregation and the
//! orchestrator that drives a job to a terminal state.

mod job;
mod orchestrator;
mod phase;
mod stage;
mod state;

pub use job::{Job, JobReport, RetryConfig};
pub use orchestrator::{CancelHandle, JobOrchestrator, PollConfig};
pub use phase::{Lifecycle, Phase, PhaseEvent, Transition};
pub use stage::{PipelineStage, resolve};
pub use state::{PipelineState, apply};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::Phase;
use super::state::PipelineState;
use crate::api::{GeneratedAssets, Submission};
use crate::error::PipelineError;

/// Tolerance for transient poll failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Consecutive transient poll failures tolerated before the job fails.
    /// Zero means the first failure is terminal.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    /// delay = base_delay_ms * 2^(attempt - 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay_ms.saturating_mul(1u64 << exponent)
    }
}

/// A submitted generation request, created once the upload succeeds.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    /// Backend estimate in seconds, informational only.
    pub estimated_time_secs: u64,
    pub state: PipelineState,
}

impl Job {
    pub fn from_submission(submission: &Submission) -> Self {
        Self {
            id: submission.job_id.clone(),
            submitted_at: Utc::now(),
            estimated_time_secs: submission.estimated_time,
            state: PipelineState::initial(),
        }
    }
}

/// Record produced when an orchestration finishes.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// `None` when the upload never produced a job.
    pub job_id: Option<String>,
    pub phases: Vec<Phase>,
    /// Status requests actually issued.
    pub polls: u32,
    pub final_state: PipelineState,
    pub started_at: DateTime<Utc>,
    /// When the backend accepted the upload; `None` alongside `job_id`.
    pub submitted_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl JobReport {
    pub fn final_phase(&self) -> Phase {
        self.phases.last().copied().unwrap_or(Phase::Idle)
    }

    pub fn into_result(self) -> Result<GeneratedAssets, PipelineError> {
        if let Some(error) = self.final_state.error() {
            return Err(error.clone());
        }
        match self.final_state.assets() {
            Some(assets) => Ok(assets.clone()),
            None => Err(PipelineError::Cancelled),
        }
    }
}

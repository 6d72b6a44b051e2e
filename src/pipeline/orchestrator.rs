use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::job::{Job, JobReport, RetryConfig};
use super::phase::{Lifecycle, PhaseEvent, Transition};
use super::state::{PipelineState, apply};
use crate::api::AvatarTransport;
use crate::error::PipelineError;

/// Cadence, deadline and failure tolerance of the poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between successive status requests.
    pub interval: Duration,
    /// Wall-clock budget for the polling phase.
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1500),
            timeout: Duration::from_secs(300),
            retry: RetryConfig::default(),
        }
    }
}

/// Cloneable handle that requests cancellation of a running job.
///
/// Cancelling more than once, or after the job has finished, has no effect.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// In-order delivery of states to the single subscriber. Closes itself after
/// the first terminal state.
#[derive(Debug, Default)]
struct Publisher {
    tx: Option<mpsc::UnboundedSender<PipelineState>>,
    last: Option<PipelineState>,
    closed: bool,
}

impl Publisher {
    fn publish(&mut self, state: &PipelineState) -> bool {
        if self.closed || self.last.as_ref() == Some(state) {
            return false;
        }
        self.closed = state.is_terminal();
        debug!(
            stage = %state.stage(),
            progress = state.progress(),
            terminal = self.closed,
            "publishing pipeline state"
        );
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(state.clone());
        }
        self.last = Some(state.clone());
        true
    }
}

enum Interrupt {
    Cancelled,
    TimedOut,
}

/// Await `fut` unless cancellation or the deadline comes first. A result that
/// lands after cancellation was requested is discarded.
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    deadline: Option<Instant>,
    fut: F,
) -> Result<F::Output, Interrupt> {
    let timer = async {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        _ = timer => Err(Interrupt::TimedOut),
        out = fut => {
            if cancel.is_cancelled() {
                Err(Interrupt::Cancelled)
            } else {
                Ok(out)
            }
        }
    }
}

/// Advance `lifecycle`, logging events the current phase does not accept.
fn step(lifecycle: &mut Lifecycle, event: PhaseEvent) -> bool {
    match lifecycle.advance(event) {
        Transition::Rejected { phase, event } => {
            warn!(%phase, ?event, "lifecycle event rejected");
            false
        }
        Transition::Next(_) | Transition::Stay(_) => true,
    }
}

/// Drives one job from upload to a terminal state.
///
/// Owns the job, its cancellation token and the publishing side of the
/// state channel. One instance handles exactly one job; [`run`](Self::run)
/// consumes it.
pub struct JobOrchestrator<T> {
    transport: T,
    config: PollConfig,
    cancel: CancellationToken,
    publisher: Publisher,
    lifecycle: Lifecycle,
    polls: u32,
}

impl<T: AvatarTransport> JobOrchestrator<T> {
    pub fn new(transport: T, config: PollConfig) -> Self {
        Self {
            transport,
            config,
            cancel: CancellationToken::new(),
            publisher: Publisher::default(),
            lifecycle: Lifecycle::new(),
            polls: 0,
        }
    }

    /// Use a caller-provided token instead of a fresh one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Receive every published state, in order. Calling this again replaces
    /// the previous subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PipelineState> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.publisher.tx = Some(tx);
        rx
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.cancel.clone(),
        }
    }

    /// Upload `image`, poll until the job is terminal and report the outcome.
    pub async fn run(mut self, image: &[u8], content_type: &str) -> JobReport {
        let started_at = Utc::now();
        step(&mut self.lifecycle, PhaseEvent::Submit);
        info!(bytes = image.len(), content_type, "submitting photo");

        let upload = guarded(
            &self.cancel,
            None,
            self.transport.upload(image, content_type),
        )
        .await;
        let submission = match upload {
            Ok(Ok(submission)) => submission,
            Ok(Err(err)) => {
                let state = PipelineState::initial().fail(err);
                return self.finish(None, PhaseEvent::Failed, state, started_at);
            }
            Err(_) => {
                let state = PipelineState::initial().fail(PipelineError::Cancelled);
                return self.finish(None, PhaseEvent::Cancel, state, started_at);
            }
        };

        let mut job = Job::from_submission(&submission);
        step(&mut self.lifecycle, PhaseEvent::Uploaded);
        info!(
            job_id = %job.id,
            estimated_secs = job.estimated_time_secs,
            "job accepted, polling for progress"
        );

        let deadline = Instant::now() + self.config.timeout;
        let mut delay = self.config.interval;
        let mut consecutive_failures = 0u32;

        loop {
            if let Err(interrupt) = guarded(&self.cancel, Some(deadline), sleep(delay)).await {
                return self.interrupted(job, interrupt, started_at);
            }

            step(&mut self.lifecycle, PhaseEvent::Tick);
            self.polls += 1;
            let polled = guarded(
                &self.cancel,
                Some(deadline),
                self.transport.poll_status(&job.id),
            )
            .await;

            let response = match polled {
                Err(interrupt) => return self.interrupted(job, interrupt, started_at),
                Ok(Ok(response)) => response,
                Ok(Err(err)) => {
                    if err.is_transient() && consecutive_failures < self.config.retry.max_retries {
                        consecutive_failures += 1;
                        delay = Duration::from_millis(
                            self.config.retry.delay_for_attempt(consecutive_failures),
                        );
                        warn!(
                            job_id = %job.id,
                            attempt = consecutive_failures,
                            max = self.config.retry.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "transient poll failure, retrying"
                        );
                        continue;
                    }
                    let state = job.state.fail(err);
                    return self.finish(Some(job), PhaseEvent::Failed, state, started_at);
                }
            };
            consecutive_failures = 0;
            delay = self.config.interval;

            if !response.job_id.is_empty() && response.job_id != job.id {
                warn!(
                    job_id = %job.id,
                    reported = %response.job_id,
                    "ignoring status for a different job"
                );
                continue;
            }

            let next = apply(&job.state, &response);
            if next.is_terminal() {
                let event = if next.error().is_some() {
                    PhaseEvent::Failed
                } else {
                    PhaseEvent::Succeeded
                };
                return self.finish(Some(job), event, next, started_at);
            }
            self.publisher.publish(&next);
            job.state = next;
        }
    }

    fn interrupted(self, job: Job, interrupt: Interrupt, started_at: DateTime<Utc>) -> JobReport {
        let (event, error) = match interrupt {
            Interrupt::Cancelled => (PhaseEvent::Cancel, PipelineError::Cancelled),
            Interrupt::TimedOut => (PhaseEvent::Failed, PipelineError::Timeout),
        };
        let state = job.state.fail(error);
        self.finish(Some(job), event, state, started_at)
    }

    fn finish(
        mut self,
        job: Option<Job>,
        event: PhaseEvent,
        state: PipelineState,
        started_at: DateTime<Utc>,
    ) -> JobReport {
        step(&mut self.lifecycle, event);
        self.publisher.publish(&state);

        let (job_id, submitted_at) = match job {
            Some(job) => (Some(job.id), Some(job.submitted_at)),
            None => (None, None),
        };

        match state.error() {
            Some(PipelineError::Cancelled) => info!(job_id = ?job_id, "job cancelled"),
            Some(err) => warn!(job_id = ?job_id, error = %err, "job failed"),
            None => info!(job_id = ?job_id, polls = self.polls, "avatar ready"),
        }

        let finished_at = Utc::now();
        JobReport {
            job_id,
            phases: self.lifecycle.history().to_vec(),
            polls: self.polls,
            final_state: state,
            started_at,
            submitted_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
        }
    }
}

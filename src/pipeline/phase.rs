use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle phases of a [`JobOrchestrator`](super::JobOrchestrator).
///
/// Each job flows through: IDLE → SUBMITTING → POLLING → one of
/// COMPLETED / FAILED / CANCELLED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Idle,
    Submitting,
    Polling,
    Completed,
    Failed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed | Phase::Cancelled)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "IDLE"),
            Phase::Submitting => write!(f, "SUBMITTING"),
            Phase::Polling => write!(f, "POLLING"),
            Phase::Completed => write!(f, "COMPLETED"),
            Phase::Failed => write!(f, "FAILED"),
            Phase::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Inputs that drive the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Submit,
    Uploaded,
    Tick,
    Succeeded,
    /// Upload failure, poll failure, server-reported error or timeout.
    Failed,
    Cancel,
}

/// The result of feeding an event to the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Moved to a new phase.
    Next(Phase),
    /// Stayed in the current phase (a poll tick).
    Stay(Phase),
    /// The event is not valid in the current phase; nothing changed.
    Rejected { phase: Phase, event: PhaseEvent },
}

/// Tracks the current phase and every phase entered so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    phase: Phase,
    history: Vec<Phase>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            history: vec![Phase::Idle],
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Phases entered so far, oldest first, ending with the current one.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Compute and apply the transition for `event`.
    ///
    /// Terminal phases reject every event, so no transition ever leaves
    /// them. `Cancel` is accepted from any non-terminal phase.
    pub fn advance(&mut self, event: PhaseEvent) -> Transition {
        let next = match (self.phase, event) {
            (phase, _) if phase.is_terminal() => None,
            (_, PhaseEvent::Cancel) => Some(Phase::Cancelled),
            (Phase::Idle, PhaseEvent::Submit) => Some(Phase::Submitting),
            (Phase::Submitting, PhaseEvent::Uploaded) => Some(Phase::Polling),
            (Phase::Submitting, PhaseEvent::Failed) => Some(Phase::Failed),
            (Phase::Polling, PhaseEvent::Tick) => return Transition::Stay(Phase::Polling),
            (Phase::Polling, PhaseEvent::Succeeded) => Some(Phase::Completed),
            (Phase::Polling, PhaseEvent::Failed) => Some(Phase::Failed),
            _ => None,
        };

        match next {
            Some(phase) => {
                self.phase = phase;
                self.history.push(phase);
                Transition::Next(phase)
            }
            None => Transition::Rejected {
                phase: self.phase,
                event,
            },
        }
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::Job;

/// The four externally visible job states.
///
/// Each job flows through: PENDING → RUNNING → {COMPLETED, FAILED}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "PENDING"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

/// The result of asking the state machine to move a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The job moved from one state to another.
    Applied { from: JobState, to: JobState },
    /// The job was already in (or past) the requested state; nothing changed.
    Duplicate(JobState),
    /// The move is not allowed from the current state.
    Rejected { from: JobState, to: JobState },
}

/// Validates and applies job state transitions.
pub struct StateMachine;

impl StateMachine {
    /// Move `job` towards `target`.
    ///
    /// - `Pending → Running` and `Running → {Completed, Failed}` are applied.
    /// - `Running → Running` and any request against a terminal job are
    ///   duplicates: at-least-once delivery makes them expected, not errors.
    /// - Everything else (e.g. `Pending → Completed`) is rejected.
    pub fn transition(job: &mut Job, target: JobState) -> Transition {
        let from = job.state;
        let transition = match (from, target) {
            (JobState::Pending, JobState::Running)
            | (JobState::Running, JobState::Completed)
            | (JobState::Running, JobState::Failed) => Transition::Applied { from, to: target },
            (JobState::Running, JobState::Running) => Transition::Duplicate(from),
            (state, _) if state.is_terminal() => Transition::Duplicate(from),
            _ => Transition::Rejected { from, to: target },
        };

        if let Transition::Applied { to, .. } = transition {
            job.state_history.push(from);
            job.state = to;
            job.touch();
        }

        transition
    }
}

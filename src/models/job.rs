use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::analysis::AnalysisOutcome;

/// Status of a palm reading job as seen by clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Lifecycle state of a job. The outcome and the failure cause live inside
/// the terminal variants so a job can never carry both.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Processing,
    Completed(AnalysisOutcome),
    Failed(String),
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::Processing => JobStatus::Processing,
            JobState::Completed(_) => JobStatus::Completed,
            JobState::Failed(_) => JobStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Whether moving from `self` to `next` is a legal state machine edge.
    pub fn can_transition_to(&self, next: &JobState) -> bool {
        match (self, next) {
            (JobState::Completed(_) | JobState::Failed(_), _) => false,
            (_, JobState::Pending) => false,
            _ => true,
        }
    }
}

/// Partial set of fields applied to a job in one transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub state: Option<JobState>,
    pub progress: Option<u8>,
    pub message: Option<String>,
}

impl JobUpdate {
    pub fn processing(progress: u8, message: impl Into<String>) -> Self {
        Self {
            state: Some(JobState::Processing),
            progress: Some(progress),
            message: Some(message.into()),
        }
    }

    pub fn completed(outcome: AnalysisOutcome, message: impl Into<String>) -> Self {
        Self {
            state: Some(JobState::Completed(outcome)),
            progress: Some(100),
            message: Some(message.into()),
        }
    }

    /// Failure keeps whatever progress the job had already reached.
    pub fn failed(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            state: Some(JobState::Failed(error.into())),
            progress: None,
            message: Some(message.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.as_ref().is_some_and(JobState::is_terminal)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("job {id} is already {status}")]
    AlreadyTerminal { id: Uuid, status: JobStatus },

    #[error("job {id} cannot move from {from} to {to}")]
    Illegal {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}

/// A palm reading job tracked in memory.
#[derive(Debug, Clone)]
pub struct Job {
    id: Uuid,
    state: JobState,
    progress: u8,
    message: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    touched_at: Instant,
}

impl Job {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: JobState::Pending,
            progress: 0,
            message: "Job created".to_string(),
            created_at: now,
            updated_at: now,
            touched_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Monotonic time of the last mutation, used for eviction.
    pub fn touched_at(&self) -> Instant {
        self.touched_at
    }

    /// Apply a partial update and refresh the timestamps.
    ///
    /// Terminal jobs reject every update, and no update may move a job back
    /// to `pending`. Progress is clamped to 100.
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                id: self.id,
                status: self.status(),
            });
        }

        if let Some(next) = &update.state {
            if !self.state.can_transition_to(next) {
                return Err(TransitionError::Illegal {
                    id: self.id,
                    from: self.status(),
                    to: next.status(),
                });
            }
        }

        if let Some(state) = update.state {
            self.state = state;
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        self.updated_at = Utc::now();
        self.touched_at = Instant::now();
        Ok(())
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let (result, error) = match &self.state {
            JobState::Completed(outcome) => (Some(outcome.clone()), None),
            JobState::Failed(cause) => (None, Some(cause.clone())),
            JobState::Pending | JobState::Processing => (None, None),
        };

        JobSnapshot {
            id: self.id,
            status: self.status(),
            progress: self.progress,
            message: self.message.clone(),
            result,
            error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

/// Public shape of a job, as pushed to observers and returned by lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<AnalysisOutcome>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

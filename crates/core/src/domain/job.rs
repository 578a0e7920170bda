// Prompt Job Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};
use crate::domain::platform::ServiceTarget;

/// Job ID (UUID v4)
pub type JobId = String;

/// Lifecycle of one prompt inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Submitting,
    AwaitingReady,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Submitting or AwaitingReady: the job owns the platform's input control
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobStatus::Submitting | JobStatus::AwaitingReady)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Submitting => write!(f, "SUBMITTING"),
            JobStatus::AwaitingReady => write!(f, "AWAITING_READY"),
            JobStatus::Succeeded => write!(f, "SUCCEEDED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// How the submission was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMethod {
    Button,
    Keyboard,
}

impl std::fmt::Display for SubmitMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitMethod::Button => write!(f, "button"),
            SubmitMethod::Keyboard => write!(f, "keyboard"),
        }
    }
}

/// One prompt destined for one platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptJob {
    pub id: JobId,
    pub text: String,
    pub service: ServiceTarget,
    pub status: JobStatus,
    pub error: Option<String>,
    pub note: Option<String>,
    pub method: Option<SubmitMethod>,

    pub started_at: Option<i64>, // epoch ms
    pub finished_at: Option<i64>,
}

impl PromptJob {
    /// Create a pending job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `text` - Prompt text
    /// * `service` - Platform that receives the prompt
    pub fn new(id: impl Into<String>, text: impl Into<String>, service: ServiceTarget) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            service,
            status: JobStatus::Pending,
            error: None,
            note: None,
            method: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn invalid(&self, to: JobStatus) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// Pending -> Submitting
    pub fn begin_submit(&mut self, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Pending {
            return Err(self.invalid(JobStatus::Submitting));
        }
        self.status = JobStatus::Submitting;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Submitting -> AwaitingReady
    pub fn mark_submitted(&mut self, method: SubmitMethod) -> Result<()> {
        if self.status != JobStatus::Submitting {
            return Err(self.invalid(JobStatus::AwaitingReady));
        }
        self.status = JobStatus::AwaitingReady;
        self.method = Some(method);
        Ok(())
    }

    /// AwaitingReady -> Succeeded
    pub fn succeed(&mut self, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::AwaitingReady {
            return Err(self.invalid(JobStatus::Succeeded));
        }
        self.status = JobStatus::Succeeded;
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// Submitting -> Succeeded without a submit outcome (page went away mid-submit)
    pub fn succeed_implicitly(&mut self, note: impl Into<String>, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Submitting {
            return Err(self.invalid(JobStatus::Succeeded));
        }
        self.status = JobStatus::Succeeded;
        self.note = Some(note.into());
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// Any non-terminal state -> Failed
    pub fn fail(&mut self, error: impl Into<String>, now_millis: i64) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.invalid(JobStatus::Failed));
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(now_millis);
        Ok(())
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}

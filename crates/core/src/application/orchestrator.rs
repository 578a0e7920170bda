// Batch Orchestrator
// Runs a BatchRequest strictly in order against one platform and always
// returns per-job results, never an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::application::adapter::{AdapterRegistry, ServiceAdapter};
use crate::application::constants::IMPLICIT_SUCCESS_NOTE;
use crate::application::readiness::{release, wait_until_ready, ReadinessOutcome};
use crate::domain::{BatchRequest, DomainError, JobId, PromptJob, ServiceTarget, SubmitMethod};
use crate::error::AutomationError;
use crate::port::{PageDriver, SessionError, SessionProvider, TimeProvider};

/// Per-job result, in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub id: JobId,
    pub prompt: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<SubmitMethod>,
}

impl From<&PromptJob> for JobResult {
    fn from(job: &PromptJob) -> Self {
        Self {
            id: job.id.clone(),
            prompt: job.text.clone(),
            success: job.is_success(),
            error: job.error.clone(),
            note: job.note.clone(),
            method: job.method,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub results: Vec<JobResult>,
    pub success_count: usize,
    pub fail_count: usize,
    /// Set when a non-recoverable condition stopped the batch early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_by: Option<String>,
}

impl BatchReport {
    fn from_jobs(jobs: &[PromptJob], halted_by: Option<String>) -> Self {
        let results: Vec<JobResult> = jobs.iter().map(JobResult::from).collect();
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            fail_count: results.len() - success_count,
            success_count,
            results,
            halted_by,
        }
    }

    /// Every job succeeded and nothing halted the batch
    pub fn success(&self) -> bool {
        self.halted_by.is_none() && self.fail_count == 0
    }
}

/// Apply a job state change; a rejected one leaves the job as it was
fn transition(job: &mut PromptJob, step: impl FnOnce(&mut PromptJob) -> Result<(), DomainError>) {
    if let Err(e) = step(job) {
        debug!(job_id = %job.id, status = ?job.status, error = %e, "Job state unchanged");
    }
}

/// How one job ended, before pacing for the next
enum JobEnd {
    /// Submitted on this page; wait for it to settle
    Submitted(Arc<dyn PageDriver>),
    /// Page navigated during submission; the next acquire re-resolves it
    Navigated,
    Failed,
    Halted(String),
}

pub struct BatchOrchestrator {
    sessions: Arc<dyn SessionProvider>,
    adapters: AdapterRegistry,
    time_provider: Arc<dyn TimeProvider>,
    locks: std::sync::Mutex<HashMap<ServiceTarget, Arc<Mutex<()>>>>,
}

impl BatchOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        adapters: AdapterRegistry,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            sessions,
            adapters,
            time_provider,
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// One async lock per platform: batches on the same platform queue up,
    /// different platforms run concurrently. Anything else that drives the
    /// platform's page takes it too.
    pub(crate) fn target_lock(&self, target: ServiceTarget) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(target).or_default())
    }

    /// Run every job in order.
    ///
    /// Between jobs the platform's readiness predicate is polled, then the
    /// caller's delay floor is slept. An `AuthenticationRequired` session
    /// error fails the current and remaining jobs and sets `halted_by`.
    pub async fn run(&self, batch: BatchRequest) -> BatchReport {
        let target = batch.service();
        let delay = Duration::from_millis(batch.delay_ms());
        let lock = self.target_lock(target);
        let _guard = lock.lock().await;

        let mut jobs = batch.into_jobs();
        let total = jobs.len();
        info!(service = %target, jobs = total, delay_ms = delay.as_millis() as u64, "Batch started");

        let Some(adapter) = self.adapters.get(target) else {
            let reason = format!("No adapter registered for {}", target);
            error!(service = %target, "{}", reason);
            let now = self.time_provider.now_millis();
            for job in jobs.iter_mut() {
                transition(job, |j| j.fail(reason.clone(), now));
            }
            return BatchReport::from_jobs(&jobs, None);
        };

        let mut halted_by = None;
        for index in 0..total {
            if let Some(reason) = &halted_by {
                transition(&mut jobs[index], |j| {
                    j.fail(format!("Skipped: {}", reason), self.time_provider.now_millis())
                });
                continue;
            }

            let end = self.run_job(adapter.as_ref(), &mut jobs[index]).await;
            let is_last = index + 1 == total;

            match end {
                JobEnd::Halted(reason) => halted_by = Some(reason),
                JobEnd::Failed => {}
                JobEnd::Submitted(page) => {
                    if !is_last {
                        self.await_ready(adapter.as_ref(), page.as_ref(), &jobs[index].id).await;
                    }
                    transition(&mut jobs[index], |j| j.succeed(self.time_provider.now_millis()));
                }
                JobEnd::Navigated => {
                    if !is_last {
                        if let Ok(page) = self.sessions.acquire(target).await {
                            self.await_ready(adapter.as_ref(), page.as_ref(), &jobs[index].id)
                                .await;
                        }
                    }
                }
            }

            if !is_last && halted_by.is_none() && !delay.is_zero() {
                sleep(delay).await;
            }
        }

        let report = BatchReport::from_jobs(&jobs, halted_by);
        info!(
            service = %target,
            success_count = report.success_count,
            fail_count = report.fail_count,
            halted = report.halted_by.is_some(),
            "Batch finished"
        );
        report
    }

    async fn run_job(&self, adapter: &dyn ServiceAdapter, job: &mut PromptJob) -> JobEnd {
        let target = adapter.target();
        let now = self.time_provider.now_millis();
        if let Err(e) = job.begin_submit(now) {
            error!(job_id = %job.id, error = %e, "Job not pending");
            return JobEnd::Failed;
        }

        let page = match self.sessions.acquire(target).await {
            Ok(page) => page,
            Err(SessionError::AuthenticationRequired { target }) => {
                let reason = format!("Authentication required for {}", target);
                error!(job_id = %job.id, service = %target, "Batch halted: authentication required");
                transition(job, |j| j.fail(reason.clone(), self.time_provider.now_millis()));
                return JobEnd::Halted(reason);
            }
            Err(e) => {
                error!(job_id = %job.id, service = %target, error = %e, "Session unavailable");
                transition(job, |j| j.fail(e.to_string(), self.time_provider.now_millis()));
                return JobEnd::Failed;
            }
        };

        let submitted = adapter.submit_prompt(page.as_ref(), &job.text).await;
        release(page.as_ref()).await;
        match submitted {
            Ok(outcome) if outcome.success => {
                info!(job_id = %job.id, service = %target, method = %outcome.method, "Prompt submitted");
                transition(job, |j| j.mark_submitted(outcome.method));
                JobEnd::Submitted(page)
            }
            Ok(outcome) => {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "submission failed".to_string());
                error!(job_id = %job.id, service = %target, method = %outcome.method, error = %message, "Submit failed");
                job.method = Some(outcome.method);
                transition(job, |j| j.fail(message, self.time_provider.now_millis()));
                JobEnd::Failed
            }
            Err(e) if e.is_frame_destroyed() => {
                info!(job_id = %job.id, service = %target, "Page navigated during submit, treating as success");
                transition(job, |j| {
                    j.succeed_implicitly(IMPLICIT_SUCCESS_NOTE, self.time_provider.now_millis())
                });
                JobEnd::Navigated
            }
            Err(e) => {
                error!(job_id = %job.id, service = %target, error = %e, "Submit failed");
                self.record_diagnostics(target, page.as_ref(), job, &e).await;
                transition(job, |j| j.fail(e.to_string(), self.time_provider.now_millis()));
                JobEnd::Failed
            }
        }
    }

    async fn record_diagnostics(
        &self,
        target: ServiceTarget,
        page: &dyn PageDriver,
        job: &mut PromptJob,
        err: &AutomationError,
    ) {
        if !err.is_locator_failure() {
            return;
        }
        let label = match err {
            AutomationError::LocatorTimeout { .. } => "locator-timeout",
            _ => "element-not-found",
        };
        if let Some(path) = self.sessions.capture_diagnostics(target, page, label).await {
            job.note = Some(format!("diagnostics: {}", path.display()));
        }
    }

    async fn await_ready(&self, adapter: &dyn ServiceAdapter, page: &dyn PageDriver, job_id: &str) {
        match wait_until_ready(adapter, page).await {
            ReadinessOutcome::Ready { checks } => {
                info!(job_id = %job_id, checks, "UI ready for next prompt");
            }
            ReadinessOutcome::TimedOut { checks } => {
                warn!(job_id = %job_id, checks, "UI not ready, continuing with next prompt");
            }
        }
    }
}

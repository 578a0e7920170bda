// Batch Request Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};
use crate::domain::job::PromptJob;
use crate::domain::platform::ServiceTarget;

/// Upper bound on prompts per batch
pub const MAX_BATCH_PROMPTS: usize = 500;

/// Upper bound on a single prompt's length (characters)
pub const MAX_PROMPT_CHARS: usize = 4000;

/// Upper bound on the caller-supplied delay floor (10 minutes)
pub const MAX_DELAY_MS: u64 = 600_000;

/// Ordered prompts for one platform, consumed once by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    service: ServiceTarget,
    jobs: Vec<PromptJob>,
    delay_ms: u64,
}

impl BatchRequest {
    /// Build a validated batch, assigning ids from `next_id` in input order
    pub fn from_prompts<I, F>(
        service: ServiceTarget,
        prompts: I,
        delay_ms: u64,
        mut next_id: F,
    ) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        F: FnMut() -> String,
    {
        let prompts: Vec<String> = prompts.into_iter().map(Into::into).collect();
        validate(&prompts, delay_ms)?;

        let jobs = prompts
            .into_iter()
            .map(|text| PromptJob::new(next_id(), text, service))
            .collect();

        Ok(Self {
            service,
            jobs,
            delay_ms,
        })
    }

    pub fn service(&self) -> ServiceTarget {
        self.service
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[PromptJob] {
        &self.jobs
    }

    /// Consume the request; order is preserved
    pub fn into_jobs(self) -> Vec<PromptJob> {
        self.jobs
    }
}

fn validate(prompts: &[String], delay_ms: u64) -> Result<()> {
    if prompts.is_empty() {
        return Err(DomainError::ValidationError(
            "Batch must contain at least one prompt".to_string(),
        ));
    }

    if prompts.len() > MAX_BATCH_PROMPTS {
        return Err(DomainError::ValidationError(format!(
            "Batch too large: {} prompts (max {})",
            prompts.len(),
            MAX_BATCH_PROMPTS
        )));
    }

    for (index, prompt) in prompts.iter().enumerate() {
        if prompt.trim().is_empty() {
            return Err(DomainError::ValidationError(format!(
                "Prompt #{} is empty",
                index + 1
            )));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(DomainError::ValidationError(format!(
                "Prompt #{} too long (max {} characters)",
                index + 1,
                MAX_PROMPT_CHARS
            )));
        }
    }

    if delay_ms > MAX_DELAY_MS {
        return Err(DomainError::ValidationError(format!(
            "delayMs {} exceeds maximum {}",
            delay_ms, MAX_DELAY_MS
        )));
    }

    Ok(())
}

// Readiness Predicate
// Has the driven UI returned to an idle state that is safe for the next prompt?

use std::convert::Infallible;

use tracing::{debug, warn};

use crate::application::adapter::ServiceAdapter;
use crate::application::constants::{GENERIC_MAX_CHECKS, READINESS_INTERVAL, SLOW_MAX_CHECKS};
use crate::application::poll::{poll_until, PollOutcome, PollSpec};
use crate::port::{DriverError, ElementHandle, PageDriver};

/// Which condition marks the UI idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessRule {
    /// The prompt input is empty
    InputEmpty,
    /// The prompt input is empty and the submit control is not disabled
    InputEmptyAndSubmitEnabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessSpec {
    pub rule: ReadinessRule,
    pub poll: PollSpec,
}

impl ReadinessSpec {
    /// Platforms that settle quickly
    pub const fn generic(rule: ReadinessRule) -> Self {
        Self {
            rule,
            poll: PollSpec::new(READINESS_INTERVAL, GENERIC_MAX_CHECKS),
        }
    }

    /// Slow-rendering platforms
    pub const fn slow(rule: ReadinessRule) -> Self {
        Self {
            rule,
            poll: PollSpec::new(READINESS_INTERVAL, SLOW_MAX_CHECKS),
        }
    }

    pub fn max_checks(&self) -> u32 {
        self.poll.max_attempts
    }
}

/// Apply `rule` to an observed input value and submit-control state.
///
/// `submit_disabled` is `None` when no control could be resolved; that never
/// blocks readiness on its own.
pub fn evaluate(rule: ReadinessRule, input_value: &str, submit_disabled: Option<bool>) -> bool {
    let input_empty = input_value.trim().is_empty();
    match rule {
        ReadinessRule::InputEmpty => input_empty,
        ReadinessRule::InputEmptyAndSubmitEnabled => input_empty && submit_disabled != Some(true),
    }
}

/// Disabled state of a control, looking through its own shadow root when it has one
pub async fn control_disabled(
    page: &dyn PageDriver,
    control: &ElementHandle,
) -> Result<bool, DriverError> {
    if page.is_disabled(control).await? {
        return Ok(true);
    }
    if let Some(root) = page.shadow_root(control).await? {
        if let Some(inner) = page.query_selector(&root, "button").await? {
            return page.is_disabled(&inner).await;
        }
    }
    Ok(false)
}

/// How a readiness wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessOutcome {
    Ready { checks: u32 },
    /// Cap reached; the caller proceeds anyway
    TimedOut { checks: u32 },
}

/// Poll `adapter.is_ready` until it holds or the platform's cap is reached.
/// A check that errors counts as "not ready".
pub async fn wait_until_ready(
    adapter: &dyn ServiceAdapter,
    page: &dyn PageDriver,
) -> ReadinessOutcome {
    let spec = adapter.readiness();
    let target = adapter.target();

    let result = poll_until(spec.poll, move |check| async move {
        let ready = adapter.is_ready(page).await;
        release(page).await;
        match ready {
            Ok(true) => Ok::<_, Infallible>(Some(())),
            Ok(false) => {
                debug!(service = %target, check, "UI not ready yet");
                Ok(None)
            }
            Err(e) => {
                debug!(service = %target, check, error = %e, "Readiness check failed, counting as not ready");
                Ok(None)
            }
        }
    })
    .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(never) => match never {},
    };

    match outcome {
        PollOutcome::Ready { attempts, .. } => ReadinessOutcome::Ready { checks: attempts },
        PollOutcome::Exhausted { attempts } => {
            warn!(
                service = %target,
                checks = attempts,
                max_checks = spec.max_checks(),
                "Readiness wait timed out, proceeding anyway"
            );
            ReadinessOutcome::TimedOut { checks: attempts }
        }
    }
}

/// Handles from a finished check or submission are never reused
pub(crate) async fn release(page: &dyn PageDriver) {
    if let Err(e) = page.release_handles().await {
        debug!(error = %e, "Releasing page handles failed");
    }
}

// Poll-until routine shared by the locator, readiness checks and load waits

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Interval and attempt budget for one bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollSpec {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// How a bounded wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready { value: T, attempts: u32 },
    Exhausted { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Ready { attempts, .. } | PollOutcome::Exhausted { attempts } => *attempts,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            PollOutcome::Ready { value, .. } => Some(value),
            PollOutcome::Exhausted { .. } => None,
        }
    }
}

/// Run `check` until it yields `Some`, at most `spec.max_attempts` times.
///
/// The check receives the 1-based attempt number. Sleeps happen only between
/// attempts, so a check that succeeds on attempt `n` costs `(n - 1) * interval`.
/// A check error ends the wait immediately and is returned as-is.
///
/// # Example
/// ```text
/// let outcome = poll_until(PollSpec::new(LOAD_INTERVAL, LOAD_MAX_CHECKS), |_| async {
///     Ok::<_, DriverError>((page.ready_state().await? == "complete").then_some(()))
/// }).await?;
/// ```
pub async fn poll_until<T, E, F, Fut>(spec: PollSpec, mut check: F) -> Result<PollOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let mut attempt = 0;
    while attempt < spec.max_attempts {
        attempt += 1;
        if let Some(value) = check(attempt).await? {
            return Ok(PollOutcome::Ready {
                value,
                attempts: attempt,
            });
        }
        if attempt < spec.max_attempts {
            sleep(spec.interval).await;
        }
    }
    Ok(PollOutcome::Exhausted { attempts: attempt })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_nth_attempt_sleeps_between_only() {
        let start = Instant::now();
        let outcome = poll_until(PollSpec::new(Duration::from_millis(200), 10), |n| async move {
            Ok::<_, Infallible>((n == 5).then_some(n))
        })
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Ready { value: 5, attempts: 5 });
        assert_eq!(start.elapsed(), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_within_budget() {
        let mut calls = 0;
        let outcome = poll_until(PollSpec::new(Duration::from_secs(1), 3), |_| {
            calls += 1;
            async { Ok::<Option<()>, Infallible>(None) }
        })
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Exhausted { attempts: 3 });
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_stops_immediately() {
        let mut calls = 0;
        let result: Result<PollOutcome<()>, &str> =
            poll_until(PollSpec::new(Duration::from_secs(1), 10), |_| {
                calls += 1;
                async { Err("boom") }
            })
            .await;

        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(calls, 1);
    }
}

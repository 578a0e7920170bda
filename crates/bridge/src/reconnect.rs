// Reconnect policy for the relay socket

use std::time::Duration;

/// Close code for a locally requested shutdown
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Close code the relay uses to reject the identity token; never retried
pub const AUTH_REJECTED_CLOSE_CODE: u16 = 4001;

/// Fixed delay before each reconnect (3s)
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Reconnects allowed without an authenticated session in between
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Keep-alive ping while authenticated (20s)
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Wait for `auth_success` after sending credentials (10s)
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry { delay: Duration },
    /// The relay rejected our credentials
    Rejected,
    /// Attempt budget spent
    GiveUp,
    /// Local shutdown
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: RECONNECT_DELAY,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// What to do after the socket closed
    ///
    /// # Arguments
    /// * `close_code` - code from the close frame, None if the socket just dropped
    /// * `attempts` - reconnects already made since the last successful auth
    /// * `shutting_down` - a local shutdown was requested
    pub fn decide(
        &self,
        close_code: Option<u16>,
        attempts: u32,
        shutting_down: bool,
    ) -> ReconnectDecision {
        if shutting_down {
            return ReconnectDecision::Stop;
        }
        if close_code == Some(AUTH_REJECTED_CLOSE_CODE) {
            return ReconnectDecision::Rejected;
        }
        if attempts >= self.max_attempts {
            return ReconnectDecision::GiveUp;
        }
        ReconnectDecision::Retry { delay: self.delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_rejection_never_retries() {
        let policy = ReconnectPolicy::default();
        for attempts in [0, 3, MAX_RECONNECT_ATTEMPTS] {
            assert_eq!(
                policy.decide(Some(AUTH_REJECTED_CLOSE_CODE), attempts, false),
                ReconnectDecision::Rejected
            );
        }
    }

    #[test]
    fn test_abnormal_close_retries_after_fixed_delay() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            policy.decide(Some(1006), 0, false),
            ReconnectDecision::Retry { delay: RECONNECT_DELAY }
        );
        assert_eq!(
            policy.decide(None, MAX_RECONNECT_ATTEMPTS - 1, false),
            ReconnectDecision::Retry { delay: RECONNECT_DELAY }
        );
    }

    #[test]
    fn test_budget_exhausted() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            policy.decide(Some(1011), MAX_RECONNECT_ATTEMPTS, false),
            ReconnectDecision::GiveUp
        );
    }

    #[test]
    fn test_local_shutdown_wins() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            policy.decide(Some(NORMAL_CLOSE_CODE), 0, true),
            ReconnectDecision::Stop
        );
        assert_eq!(
            policy.decide(Some(AUTH_REJECTED_CLOSE_CODE), 0, true),
            ReconnectDecision::Stop
        );
    }

    #[test]
    fn test_remote_normal_close_still_reconnects() {
        let policy = ReconnectPolicy::default();
        assert!(matches!(
            policy.decide(Some(NORMAL_CLOSE_CODE), 0, false),
            ReconnectDecision::Retry { .. }
        ));
    }
}

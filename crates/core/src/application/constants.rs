// Engine constants (No magic values)
use std::time::Duration;

/// Interval between per-hop locator attempts (200ms)
pub const LOCATOR_INTERVAL: Duration = Duration::from_millis(200);

/// Attempts per shadow hop before LocatorTimeout (100 x 200ms = 20s)
pub const LOCATOR_MAX_ATTEMPTS: u32 = 100;

/// Attempts for the terminal selector before ElementNotFound (5s)
pub const TERMINAL_MAX_ATTEMPTS: u32 = 25;

/// Interval between readiness checks (1s)
pub const READINESS_INTERVAL: Duration = Duration::from_secs(1);

/// Readiness cap for platforms that settle quickly
pub const GENERIC_MAX_CHECKS: u32 = 30;

/// Readiness cap for slow-rendering platforms
pub const SLOW_MAX_CHECKS: u32 = 150;

/// Interval between `document.readyState` checks (250ms)
pub const LOAD_INTERVAL: Duration = Duration::from_millis(250);

/// readyState checks before giving up on a load (30s)
pub const LOAD_MAX_CHECKS: u32 = 120;

/// Note attached to jobs whose page navigated during submission
pub const IMPLICIT_SUCCESS_NOTE: &str = "page reloaded (likely successful)";

/// Wait for a launched browser to print its DevTools endpoint (30s)
pub const BROWSER_LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period between SIGTERM and SIGKILL when stopping a browser (5s)
pub const BROWSER_STOP_GRACE: Duration = Duration::from_secs(5);

/// Liveness check interval while waiting for a browser to exit
pub const BROWSER_STOP_POLL: Duration = Duration::from_millis(100);

/// Pid file guarding a profile directory against a second browser
pub const PROFILE_LOCK_FILE: &str = ".promptrelay.lock";

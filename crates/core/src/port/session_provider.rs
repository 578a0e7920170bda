// Session Provider Port
// "Give me a live, authenticated page for platform X"

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ServiceTarget;
use crate::port::page_driver::{DriverError, PageDriver};

/// Session errors
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    #[error("Authentication required for {target}")]
    AuthenticationRequired { target: ServiceTarget },

    #[error("Session unavailable: {0}")]
    Unavailable(String),

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Profile {path} is in use by pid {pid}")]
    ProfileInUse { path: PathBuf, pid: u32 },

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

/// Session Provider trait
///
/// Implementations:
/// - TabSessionProvider: tabs of the end-user browser (bridge backend)
/// - PersistentBrowserProvider: one dedicated browser per platform (persistent backend)
/// - MockSessionProvider: fixed pages for tests
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Backend name reported by `session.status`
    fn backend(&self) -> &'static str;

    /// Acquire (or refresh) the platform's page
    ///
    /// # Errors
    /// - SessionError::AuthenticationRequired if the platform bounced to a login page
    /// - SessionError::Launch / Unavailable if no browser could be reached
    async fn acquire(&self, target: ServiceTarget) -> Result<Arc<dyn PageDriver>, SessionError>;

    /// Advisory login check; may race a login that just completed
    async fn is_logged_in(&self, target: ServiceTarget) -> Result<bool, SessionError>;

    /// Drop the platform's session. Returns whether one existed.
    async fn close(&self, target: ServiceTarget) -> Result<bool, SessionError>;

    /// Persist a DOM snapshot for post-mortem debugging
    async fn capture_diagnostics(
        &self,
        _target: ServiceTarget,
        _page: &dyn PageDriver,
        _label: &str,
    ) -> Option<PathBuf> {
        None
    }

    /// Release every resource (browsers, tabs)
    async fn shutdown(&self) {}
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::page_driver::mocks::FakeDom;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Session provider handing out fixed FakeDom pages
    #[derive(Default)]
    pub struct MockSessionProvider {
        pages: Mutex<HashMap<ServiceTarget, Arc<FakeDom>>>,
        logged_out: Mutex<Vec<ServiceTarget>>,
        acquire_count: Mutex<usize>,
        diagnostics: Mutex<Vec<String>>,
    }

    impl MockSessionProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(self, target: ServiceTarget, page: Arc<FakeDom>) -> Self {
            self.pages.lock().unwrap().insert(target, page);
            self
        }

        /// Make `acquire` fail with AuthenticationRequired
        pub fn log_out(&self, target: ServiceTarget) {
            self.logged_out.lock().unwrap().push(target);
        }

        pub fn acquire_count(&self) -> usize {
            *self.acquire_count.lock().unwrap()
        }

        /// Labels passed to `capture_diagnostics`
        pub fn diagnostics(&self) -> Vec<String> {
            self.diagnostics.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SessionProvider for MockSessionProvider {
        fn backend(&self) -> &'static str {
            "mock"
        }

        async fn acquire(
            &self,
            target: ServiceTarget,
        ) -> Result<Arc<dyn PageDriver>, SessionError> {
            *self.acquire_count.lock().unwrap() += 1;
            if self.logged_out.lock().unwrap().contains(&target) {
                return Err(SessionError::AuthenticationRequired { target });
            }
            self.pages
                .lock()
                .unwrap()
                .get(&target)
                .cloned()
                .map(|p| p as Arc<dyn PageDriver>)
                .ok_or_else(|| SessionError::Unavailable(format!("no page for {}", target)))
        }

        async fn is_logged_in(&self, target: ServiceTarget) -> Result<bool, SessionError> {
            Ok(!self.logged_out.lock().unwrap().contains(&target))
        }

        async fn close(&self, target: ServiceTarget) -> Result<bool, SessionError> {
            Ok(self.pages.lock().unwrap().remove(&target).is_some())
        }

        async fn capture_diagnostics(
            &self,
            target: ServiceTarget,
            _page: &dyn PageDriver,
            label: &str,
        ) -> Option<PathBuf> {
            self.diagnostics.lock().unwrap().push(label.to_string());
            Some(PathBuf::from(format!("/tmp/{}-{}.html", target, label)))
        }
    }
}

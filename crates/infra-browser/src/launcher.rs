// Launcher seam: how a dedicated browser comes to life

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use promptrelay_core::domain::ServiceTarget;
use promptrelay_core::port::TabHost;

use crate::error::BrowserError;

/// A running browser process
#[async_trait]
pub trait BrowserInstance: Send + Sync {
    /// HTTP DevTools endpoint, e.g. `http://127.0.0.1:40123`
    fn devtools_url(&self) -> &str;

    /// Tabs of this browser
    fn tab_host(&self) -> Arc<dyn TabHost>;

    /// False once the process exit (or socket loss) has been observed
    fn is_connected(&self) -> bool;

    /// Stop the process (SIGTERM, then SIGKILL after the grace period)
    async fn shutdown(&self) -> Result<(), BrowserError>;
}

/// Browser Launcher trait
///
/// Implementations:
/// - ChromeLauncher: spawns Chrome with a per-platform user-data-dir
/// - test launchers hand out in-memory instances
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(
        &self,
        target: ServiceTarget,
        profile_dir: &Path,
    ) -> Result<Arc<dyn BrowserInstance>, BrowserError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use promptrelay_core::port::tab_host::mocks::MockTabHost;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory browser whose tabs are a MockTabHost
    pub struct FakeBrowser {
        tabs: Arc<MockTabHost>,
        connected: AtomicBool,
        shutdowns: AtomicUsize,
    }

    impl FakeBrowser {
        pub fn new() -> Self {
            Self {
                tabs: Arc::new(MockTabHost::new()),
                connected: AtomicBool::new(true),
                shutdowns: AtomicUsize::new(0),
            }
        }

        pub fn tabs(&self) -> Arc<MockTabHost> {
            Arc::clone(&self.tabs)
        }

        /// Simulate the process dying underneath us
        pub fn crash(&self) {
            self.connected.store(false, Ordering::SeqCst);
        }

        pub fn shutdown_count(&self) -> usize {
            self.shutdowns.load(Ordering::SeqCst)
        }
    }

    impl Default for FakeBrowser {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl BrowserInstance for FakeBrowser {
        fn devtools_url(&self) -> &str {
            "http://127.0.0.1:0"
        }

        fn tab_host(&self) -> Arc<dyn TabHost> {
            Arc::clone(&self.tabs) as Arc<dyn TabHost>
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn shutdown(&self) -> Result<(), BrowserError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Launcher handing out FakeBrowsers and recording every launch
    #[derive(Default)]
    pub struct FakeLauncher {
        launched: Mutex<Vec<(ServiceTarget, PathBuf, Arc<FakeBrowser>)>>,
        fail_with: Mutex<Option<String>>,
    }

    impl FakeLauncher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the next launches fail
        pub fn fail(&self, reason: &str) {
            *self.fail_with.lock().unwrap() = Some(reason.to_string());
        }

        pub fn launch_count(&self) -> usize {
            self.launched.lock().unwrap().len()
        }

        /// Most recent browser launched for the platform
        pub fn browser(&self, target: ServiceTarget) -> Option<Arc<FakeBrowser>> {
            self.launched
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(t, _, _)| *t == target)
                .map(|(_, _, b)| Arc::clone(b))
        }

        pub fn profile_dirs(&self) -> Vec<PathBuf> {
            self.launched
                .lock()
                .unwrap()
                .iter()
                .map(|(_, dir, _)| dir.clone())
                .collect()
        }
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(
            &self,
            target: ServiceTarget,
            profile_dir: &Path,
        ) -> Result<Arc<dyn BrowserInstance>, BrowserError> {
            if let Some(reason) = self.fail_with.lock().unwrap().clone() {
                return Err(BrowserError::Launch(reason));
            }
            let browser = Arc::new(FakeBrowser::new());
            self.launched.lock().unwrap().push((
                target,
                profile_dir.to_path_buf(),
                Arc::clone(&browser),
            ));
            Ok(browser)
        }
    }
}

// Persistent Browser Provider
// SessionProvider backed by one dedicated, profile-persistent browser per platform

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use promptrelay_core::application::TabSessionPool;
use promptrelay_core::domain::ServiceTarget;
use promptrelay_core::port::{PageDriver, SessionError, SessionProvider, TimeProvider};

use crate::launcher::{BrowserInstance, BrowserLauncher};
use crate::manager::{BrowserHealth, BrowserManager};
use crate::profile::ProfileStore;

pub struct PersistentBrowserProvider {
    managers: HashMap<ServiceTarget, BrowserManager>,
    pool: TabSessionPool,
    diagnostics_dir: PathBuf,
    time_provider: Arc<dyn TimeProvider>,
}

impl PersistentBrowserProvider {
    /// # Arguments
    /// * `profiles` - root of the per-platform user-data-dirs
    /// * `launcher` - starts a browser on a profile (Chrome in production)
    /// * `diagnostics_dir` - where DOM snapshots of failed locates are written
    pub fn new(
        profiles: ProfileStore,
        launcher: Arc<dyn BrowserLauncher>,
        diagnostics_dir: impl Into<PathBuf>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let managers = ServiceTarget::ALL
            .iter()
            .map(|&target| {
                (
                    target,
                    BrowserManager::new(target, profiles.clone(), Arc::clone(&launcher)),
                )
            })
            .collect();

        Self {
            managers,
            pool: TabSessionPool::new(Arc::clone(&time_provider)),
            diagnostics_dir: diagnostics_dir.into(),
            time_provider,
        }
    }

    pub fn diagnostics_dir(&self) -> &Path {
        &self.diagnostics_dir
    }

    fn manager(&self, target: ServiceTarget) -> Result<&BrowserManager, SessionError> {
        self.managers
            .get(&target)
            .ok_or_else(|| SessionError::Unavailable(format!("no browser manager for {}", target)))
    }

    pub async fn health(&self, target: ServiceTarget) -> BrowserHealth {
        match self.managers.get(&target) {
            Some(manager) => manager.health().await,
            None => BrowserHealth::NotStarted,
        }
    }

    /// Live browser for the platform; a fresh launch invalidates the cached tab
    async fn browser(
        &self,
        target: ServiceTarget,
    ) -> Result<Arc<dyn BrowserInstance>, SessionError> {
        let acquired = self.manager(target)?.acquire().await?;
        if acquired.launched {
            self.pool.release(target).await;
        }
        Ok(acquired.instance)
    }
}

#[async_trait]
impl SessionProvider for PersistentBrowserProvider {
    fn backend(&self) -> &'static str {
        "persistent"
    }

    async fn acquire(&self, target: ServiceTarget) -> Result<Arc<dyn PageDriver>, SessionError> {
        let browser = self.browser(target).await?;
        let tabs = browser.tab_host();
        self.pool.acquire(tabs.as_ref(), target).await
    }

    async fn is_logged_in(&self, target: ServiceTarget) -> Result<bool, SessionError> {
        let browser = self.browser(target).await?;
        let tabs = browser.tab_host();
        self.pool.is_logged_in(tabs.as_ref(), target).await
    }

    /// Stops the platform's browser; its profile stays on disk
    async fn close(&self, target: ServiceTarget) -> Result<bool, SessionError> {
        self.pool.release(target).await;
        Ok(self.manager(target)?.shutdown().await?)
    }

    async fn capture_diagnostics(
        &self,
        target: ServiceTarget,
        page: &dyn PageDriver,
        label: &str,
    ) -> Option<PathBuf> {
        let html = match page.snapshot_html().await {
            Ok(html) => html,
            Err(e) => {
                warn!(service = %target, error = %e, "DOM snapshot failed");
                return None;
            }
        };

        let file = self.diagnostics_dir.join(format!(
            "{}-{}-{}.html",
            target,
            self.time_provider.now_millis(),
            label
        ));
        let written = async {
            tokio::fs::create_dir_all(&self.diagnostics_dir).await?;
            tokio::fs::write(&file, html).await
        };
        match written.await {
            Ok(()) => {
                info!(service = %target, path = %file.display(), "Diagnostics captured");
                Some(file)
            }
            Err(e) => {
                warn!(service = %target, error = %e, "Failed to write diagnostics");
                None
            }
        }
    }

    async fn shutdown(&self) {
        self.pool.clear().await;
        for manager in self.managers.values() {
            if let Err(e) = manager.shutdown().await {
                warn!(service = %manager.target(), error = %e, "Browser stop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::mocks::FakeLauncher;
    use promptrelay_core::port::page_driver::mocks::FakeDom;
    use promptrelay_core::port::time_provider::mocks::FixedTimeProvider;

    struct Fixture {
        _root: tempfile::TempDir,
        diag: PathBuf,
        launcher: Arc<FakeLauncher>,
        provider: PersistentBrowserProvider,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let diag = root.path().join("diagnostics");
        let launcher = Arc::new(FakeLauncher::new());
        let provider = PersistentBrowserProvider::new(
            ProfileStore::new(root.path().join("profiles")),
            Arc::clone(&launcher) as Arc<dyn BrowserLauncher>,
            diag.clone(),
            Arc::new(FixedTimeProvider::new(1_700_000_000_000)),
        );
        Fixture {
            _root: root,
            diag,
            launcher,
            provider,
        }
    }

    #[tokio::test]
    async fn test_acquire_launches_lazily_and_reuses_page() {
        let f = fixture();
        assert_eq!(f.launcher.launch_count(), 0);

        let first = f.provider.acquire(ServiceTarget::Ideogram).await.unwrap();
        let second = f.provider.acquire(ServiceTarget::Ideogram).await.unwrap();

        assert_eq!(f.launcher.launch_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        let browser = f.launcher.browser(ServiceTarget::Ideogram).unwrap();
        assert_eq!(browser.tabs().opened(), vec![ServiceTarget::Ideogram.home_url()]);
        assert_eq!(f.provider.backend(), "persistent");
    }

    #[tokio::test]
    async fn test_platforms_get_separate_browsers() {
        let f = fixture();
        f.provider.acquire(ServiceTarget::Firefly).await.unwrap();
        f.provider.acquire(ServiceTarget::Leonardo).await.unwrap();

        assert_eq!(f.launcher.launch_count(), 2);
        assert_eq!(
            f.provider.health(ServiceTarget::Midjourney).await,
            BrowserHealth::NotStarted
        );
    }

    #[tokio::test]
    async fn test_crash_relaunches_and_opens_fresh_tab() {
        let f = fixture();
        let before = f.provider.acquire(ServiceTarget::Leonardo).await.unwrap();
        f.launcher.browser(ServiceTarget::Leonardo).unwrap().crash();

        let after = f.provider.acquire(ServiceTarget::Leonardo).await.unwrap();

        assert_eq!(f.launcher.launch_count(), 2);
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_close_stops_browser() {
        let f = fixture();
        f.provider.acquire(ServiceTarget::Firefly).await.unwrap();

        assert!(f.provider.close(ServiceTarget::Firefly).await.unwrap());
        assert!(!f.provider.close(ServiceTarget::Firefly).await.unwrap());
        assert_eq!(
            f.launcher.browser(ServiceTarget::Firefly).unwrap().shutdown_count(),
            1
        );
    }

    #[tokio::test]
    async fn test_launch_failure_maps_to_session_error() {
        let f = fixture();
        f.launcher.fail("executable not found");

        let err = f.provider.acquire(ServiceTarget::Midjourney).await.err().unwrap();
        assert!(matches!(err, SessionError::Launch(ref m) if m == "executable not found"));
    }

    #[tokio::test]
    async fn test_capture_diagnostics_writes_snapshot() {
        let f = fixture();
        let page = FakeDom::new("https://firefly.adobe.com/generate/images");

        let path = f
            .provider
            .capture_diagnostics(ServiceTarget::Firefly, &page, "locator-timeout")
            .await
            .unwrap();

        assert_eq!(
            path,
            f.diag.join("firefly-1700000000000-locator-timeout.html")
        );
        assert!(std::fs::read_to_string(&path).unwrap().contains("<html"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_every_running_browser() {
        let f = fixture();
        f.provider.acquire(ServiceTarget::Ideogram).await.unwrap();
        f.provider.acquire(ServiceTarget::Midjourney).await.unwrap();

        f.provider.shutdown().await;

        for target in [ServiceTarget::Ideogram, ServiceTarget::Midjourney] {
            assert_eq!(f.launcher.browser(target).unwrap().shutdown_count(), 1);
            assert_eq!(f.provider.health(target).await, BrowserHealth::NotStarted);
        }
    }
}

// Tab Session Pool
// Finds, reuses or opens the tab that serves each platform, and keeps one
// ServiceSession per platform. Shared by both session backends.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::constants::{LOAD_INTERVAL, LOAD_MAX_CHECKS};
use crate::application::poll::{poll_until, PollOutcome, PollSpec};
use crate::domain::{AuthState, ServiceTarget};
use crate::port::{
    DriverError, PageDriver, SessionError, SessionProvider, TabHost, TabInfo, TimeProvider,
};

/// A platform's live page, owned by at most one in-flight job at a time
pub struct ServiceSession {
    pub target: ServiceTarget,
    pub tab_id: String,
    pub page: Arc<dyn PageDriver>,
    pub auth: AuthState,
    pub last_activity: i64, // epoch ms
}

/// Poll `document.readyState` until "complete". Returns false if the budget ran out.
pub async fn wait_for_load(page: &dyn PageDriver, spec: PollSpec) -> Result<bool, DriverError> {
    let outcome = poll_until(spec, move |_| async move {
        let state = page.ready_state().await?;
        Ok::<_, DriverError>((state == "complete").then_some(()))
    })
    .await?;

    match outcome {
        PollOutcome::Ready { attempts, .. } => {
            debug!(attempts, "Page load complete");
            Ok(true)
        }
        PollOutcome::Exhausted { attempts } => {
            warn!(attempts, "Page load did not complete, continuing");
            Ok(false)
        }
    }
}

type Slot = Arc<Mutex<Option<ServiceSession>>>;

pub struct TabSessionPool {
    /// One slot per platform; the map lock is only held to look a slot up
    slots: std::sync::Mutex<HashMap<ServiceTarget, Slot>>,
    time_provider: Arc<dyn TimeProvider>,
    load: PollSpec,
}

impl TabSessionPool {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            slots: std::sync::Mutex::new(HashMap::new()),
            time_provider,
            load: PollSpec::new(LOAD_INTERVAL, LOAD_MAX_CHECKS),
        }
    }

    /// Slow work on one platform (tab open, load wait) never blocks another
    fn slot(&self, target: ServiceTarget) -> Slot {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(slots.entry(target).or_default())
    }

    fn all_slots(&self) -> Vec<Slot> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Return the platform's page, re-resolving the tab when the cached one
    /// closed or navigated off the platform.
    ///
    /// # Errors
    /// - SessionError::AuthenticationRequired if the tab sits on a login page
    pub async fn acquire(
        &self,
        host: &dyn TabHost,
        target: ServiceTarget,
    ) -> Result<Arc<dyn PageDriver>, SessionError> {
        let slot = self.slot(target);
        let mut current = slot.lock().await;
        let now = self.time_provider.now_millis();

        if let Some(session) = current.as_mut() {
            if let Some(url) = still_on_platform(session.page.as_ref(), target).await {
                if target.is_login_url(&url) {
                    session.auth = AuthState::LoggedOut;
                    return Err(SessionError::AuthenticationRequired { target });
                }
                session.last_activity = now;
                return Ok(Arc::clone(&session.page));
            }
            info!(service = %target, tab_id = %session.tab_id, "Cached tab went away, re-resolving");
            *current = None;
        }

        let (tab, page) = self.resolve_tab(host, target).await?;
        let url = page.current_url().await?;
        let auth = if target.is_login_url(&url) {
            AuthState::LoggedOut
        } else {
            AuthState::Unknown
        };

        *current = Some(ServiceSession {
            target,
            tab_id: tab.id.clone(),
            page: Arc::clone(&page),
            auth,
            last_activity: now,
        });

        if auth == AuthState::LoggedOut {
            warn!(service = %target, url = %url, "Platform redirected to login");
            return Err(SessionError::AuthenticationRequired { target });
        }
        Ok(page)
    }

    /// Reuse and focus a matching tab, else open the platform's home page
    async fn resolve_tab(
        &self,
        host: &dyn TabHost,
        target: ServiceTarget,
    ) -> Result<(TabInfo, Arc<dyn PageDriver>), SessionError> {
        let existing = host
            .list_tabs()
            .await?
            .into_iter()
            .find(|t| t.is_page() && target.matches_url(&t.url));

        match existing {
            Some(tab) => {
                info!(service = %target, tab_id = %tab.id, "Reusing open tab");
                host.activate(&tab.id).await?;
                let page = host.attach(&tab).await?;
                Ok((tab, page))
            }
            None => {
                info!(service = %target, url = target.home_url(), "Opening new tab");
                let tab = host.open(target.home_url()).await?;
                let page = host.attach(&tab).await?;
                wait_for_load(page.as_ref(), self.load).await?;
                Ok((tab, page))
            }
        }
    }

    /// Advisory: navigate to the home page and look for the login affordance.
    /// A login that completes while this runs can be missed.
    pub async fn is_logged_in(
        &self,
        host: &dyn TabHost,
        target: ServiceTarget,
    ) -> Result<bool, SessionError> {
        let page = match self.acquire(host, target).await {
            Ok(page) => page,
            Err(SessionError::AuthenticationRequired { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };

        page.navigate(target.home_url()).await?;
        wait_for_load(page.as_ref(), self.load).await?;

        let url = page.current_url().await?;
        let document = page.document().await?;
        let affordance = page
            .query_selector(&document, target.login_affordance())
            .await?;
        let logged_in = !target.is_login_url(&url) && affordance.is_none();

        if let Some(session) = self.slot(target).lock().await.as_mut() {
            session.auth = if logged_in {
                AuthState::Authenticated
            } else {
                AuthState::LoggedOut
            };
        }
        Ok(logged_in)
    }

    pub async fn auth_state(&self, target: ServiceTarget) -> Option<AuthState> {
        self.slot(target).lock().await.as_ref().map(|s| s.auth)
    }

    /// Forget the platform's session. Returns the tab id it held.
    pub async fn release(&self, target: ServiceTarget) -> Option<String> {
        self.slot(target).lock().await.take().map(|s| s.tab_id)
    }

    pub async fn clear(&self) {
        for slot in self.all_slots() {
            slot.lock().await.take();
        }
    }
}

/// Current URL if the page is alive and still on the platform
async fn still_on_platform(page: &dyn PageDriver, target: ServiceTarget) -> Option<String> {
    if page.is_closed() {
        return None;
    }
    match page.current_url().await {
        Ok(url) if target.matches_url(&url) => Some(url),
        Ok(_) => None,
        Err(e) => {
            debug!(service = %target, error = %e, "Cached page unreachable");
            None
        }
    }
}

/// Session provider over the tabs of one browser (the end-user's, in bridge mode)
pub struct TabSessionProvider {
    host: Arc<dyn TabHost>,
    pool: TabSessionPool,
}

impl TabSessionProvider {
    pub fn new(host: Arc<dyn TabHost>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            host,
            pool: TabSessionPool::new(time_provider),
        }
    }
}

#[async_trait]
impl SessionProvider for TabSessionProvider {
    fn backend(&self) -> &'static str {
        "bridge"
    }

    async fn acquire(&self, target: ServiceTarget) -> Result<Arc<dyn PageDriver>, SessionError> {
        self.pool.acquire(self.host.as_ref(), target).await
    }

    async fn is_logged_in(&self, target: ServiceTarget) -> Result<bool, SessionError> {
        self.pool.is_logged_in(self.host.as_ref(), target).await
    }

    /// The tab belongs to the user; only our handle on it is dropped
    async fn close(&self, target: ServiceTarget) -> Result<bool, SessionError> {
        Ok(self.pool.release(target).await.is_some())
    }

    async fn shutdown(&self) {
        self.pool.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::page_driver::mocks::FakeDom;
    use crate::port::tab_host::mocks::MockTabHost;
    use crate::port::time_provider::mocks::FixedTimeProvider;

    fn pool() -> TabSessionPool {
        TabSessionPool::new(Arc::new(FixedTimeProvider::new(1_000)))
    }

    #[tokio::test]
    async fn test_reuses_and_focuses_matching_tab() {
        let host = MockTabHost::new();
        host.add_tab("https://example.com", Arc::new(FakeDom::new("https://example.com")));
        let url = "https://ideogram.ai/t/explore";
        let tab = host.add_tab(url, Arc::new(FakeDom::new(url)));

        let pool = pool();
        pool.acquire(&host, ServiceTarget::Ideogram).await.unwrap();
        pool.acquire(&host, ServiceTarget::Ideogram).await.unwrap();

        assert_eq!(host.activated(), vec![tab]);
        assert_eq!(host.attach_count(), 1);
        assert!(host.opened().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_home_page_when_no_tab_matches() {
        let host = MockTabHost::new();
        let pool = pool();

        pool.acquire(&host, ServiceTarget::Leonardo).await.unwrap();

        assert_eq!(host.opened(), vec![ServiceTarget::Leonardo.home_url().to_string()]);
        assert_eq!(
            pool.auth_state(ServiceTarget::Leonardo).await,
            Some(AuthState::Unknown)
        );
    }

    #[tokio::test]
    async fn test_re_resolves_after_navigation_away() {
        let host = MockTabHost::new();
        let url = "https://www.midjourney.com/imagine";
        let dom = Arc::new(FakeDom::new(url));
        host.add_tab(url, Arc::clone(&dom));

        let pool = pool();
        pool.acquire(&host, ServiceTarget::Midjourney).await.unwrap();
        dom.set_url("https://example.com/elsewhere");
        // the stale tab is still listed under its old url, so it is re-attached
        pool.acquire(&host, ServiceTarget::Midjourney).await.unwrap();

        assert_eq!(host.attach_count(), 2);
    }

    #[tokio::test]
    async fn test_login_redirect_requires_authentication() {
        let host = MockTabHost::new();
        let url = "https://ideogram.ai/login?next=/t/explore";
        host.add_tab(url, Arc::new(FakeDom::new(url)));

        let err = pool()
            .acquire(&host, ServiceTarget::Ideogram)
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            SessionError::AuthenticationRequired {
                target: ServiceTarget::Ideogram
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_check_looks_for_affordance() {
        let host = MockTabHost::new();
        let url = ServiceTarget::Midjourney.home_url();
        let dom = Arc::new(FakeDom::new(url));
        host.add_tab(url, Arc::clone(&dom));
        let pool = pool();

        assert!(pool.is_logged_in(&host, ServiceTarget::Midjourney).await.unwrap());
        assert_eq!(
            pool.auth_state(ServiceTarget::Midjourney).await,
            Some(AuthState::Authenticated)
        );

        dom.add_element(&dom.root(), "a", &[ServiceTarget::Midjourney.login_affordance()]);
        assert!(!pool.is_logged_in(&host, ServiceTarget::Midjourney).await.unwrap());
        assert_eq!(dom.navigations().len(), 2);
    }

    /// Tabs it opens never finish loading
    struct SlowLoadHost {
        inner: MockTabHost,
    }

    #[async_trait]
    impl TabHost for SlowLoadHost {
        async fn list_tabs(&self) -> Result<Vec<TabInfo>, DriverError> {
            self.inner.list_tabs().await
        }

        async fn activate(&self, tab_id: &str) -> Result<(), DriverError> {
            self.inner.activate(tab_id).await
        }

        async fn open(&self, url: &str) -> Result<TabInfo, DriverError> {
            let dom = Arc::new(FakeDom::new(url));
            dom.set_ready_state("loading");
            let id = self.inner.add_tab(url, dom);
            Ok(TabInfo {
                id,
                url: url.to_string(),
                kind: "page".to_string(),
            })
        }

        async fn attach(&self, tab: &TabInfo) -> Result<Arc<dyn PageDriver>, DriverError> {
            self.inner.attach(tab).await
        }

        async fn close_tab(&self, tab_id: &str) -> Result<(), DriverError> {
            self.inner.close_tab(tab_id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_load_does_not_block_other_platforms() {
        let host = Arc::new(SlowLoadHost {
            inner: MockTabHost::new(),
        });
        let leonardo = ServiceTarget::Leonardo.home_url();
        host.inner.add_tab(leonardo, Arc::new(FakeDom::new(leonardo)));
        let pool = Arc::new(pool());

        let loading = {
            let (host, pool) = (Arc::clone(&host), Arc::clone(&pool));
            tokio::spawn(async move {
                pool.acquire(host.as_ref(), ServiceTarget::Firefly).await.map(|_| ())
            })
        };
        // let the firefly acquire reach its load wait
        tokio::time::sleep(LOAD_INTERVAL).await;

        let started = tokio::time::Instant::now();
        pool.acquire(host.as_ref(), ServiceTarget::Leonardo)
            .await
            .unwrap();
        assert!(started.elapsed() < LOAD_INTERVAL);
        assert!(!loading.is_finished());

        // the stalled load gives up after its budget and still yields the page
        loading.await.unwrap().unwrap();
    }
}

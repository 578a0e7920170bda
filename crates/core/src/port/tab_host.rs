// Tab Host Port
// A browser that owns tabs: list, focus, open, attach a page driver

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::port::page_driver::{DriverError, PageDriver};

/// One open browser target as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: String,
    pub url: String,
    /// "page", "service_worker", "iframe", ...
    pub kind: String,
}

impl TabInfo {
    pub fn is_page(&self) -> bool {
        self.kind == "page"
    }
}

/// Tab Host trait
///
/// Implementations:
/// - CdpTabHost: a Chrome instance reached through its DevTools endpoint
/// - MockTabHost: scripted tabs for tests
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, DriverError>;

    /// Bring a tab to the foreground
    async fn activate(&self, tab_id: &str) -> Result<(), DriverError>;

    /// Open a new tab at `url`
    async fn open(&self, url: &str) -> Result<TabInfo, DriverError>;

    /// Get a driver for an existing tab
    async fn attach(&self, tab: &TabInfo) -> Result<Arc<dyn PageDriver>, DriverError>;

    async fn close_tab(&self, tab_id: &str) -> Result<(), DriverError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::page_driver::mocks::FakeDom;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct State {
        tabs: Vec<TabInfo>,
        pages: HashMap<String, Arc<FakeDom>>,
        activated: Vec<String>,
        opened: Vec<String>,
        attach_count: usize,
        next_id: u32,
    }

    /// Tab host backed by FakeDom pages
    #[derive(Default)]
    pub struct MockTabHost {
        state: Mutex<State>,
    }

    impl MockTabHost {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register an already-open tab
        pub fn add_tab(&self, url: &str, page: Arc<FakeDom>) -> String {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = format!("tab-{}", state.next_id);
            state.tabs.push(TabInfo {
                id: id.clone(),
                url: url.to_string(),
                kind: "page".to_string(),
            });
            state.pages.insert(id.clone(), page);
            id
        }

        pub fn page(&self, tab_id: &str) -> Option<Arc<FakeDom>> {
            self.state.lock().unwrap().pages.get(tab_id).cloned()
        }

        pub fn activated(&self) -> Vec<String> {
            self.state.lock().unwrap().activated.clone()
        }

        pub fn opened(&self) -> Vec<String> {
            self.state.lock().unwrap().opened.clone()
        }

        pub fn attach_count(&self) -> usize {
            self.state.lock().unwrap().attach_count
        }
    }

    #[async_trait]
    impl TabHost for MockTabHost {
        async fn list_tabs(&self) -> Result<Vec<TabInfo>, DriverError> {
            Ok(self.state.lock().unwrap().tabs.clone())
        }

        async fn activate(&self, tab_id: &str) -> Result<(), DriverError> {
            self.state.lock().unwrap().activated.push(tab_id.to_string());
            Ok(())
        }

        async fn open(&self, url: &str) -> Result<TabInfo, DriverError> {
            let page = Arc::new(FakeDom::new(url));
            let id = self.add_tab(url, page);
            self.state.lock().unwrap().opened.push(url.to_string());
            Ok(TabInfo {
                id,
                url: url.to_string(),
                kind: "page".to_string(),
            })
        }

        async fn attach(&self, tab: &TabInfo) -> Result<Arc<dyn PageDriver>, DriverError> {
            let mut state = self.state.lock().unwrap();
            state.attach_count += 1;
            state
                .pages
                .get(&tab.id)
                .cloned()
                .map(|p| p as Arc<dyn PageDriver>)
                .ok_or_else(|| DriverError::Protocol(format!("No tab with id: {}", tab.id)))
        }

        async fn close_tab(&self, tab_id: &str) -> Result<(), DriverError> {
            let mut state = self.state.lock().unwrap();
            state.tabs.retain(|t| t.id != tab_id);
            if let Some(page) = state.pages.remove(tab_id) {
                page.close();
            }
            Ok(())
        }
    }
}

// CdpTabHost - TabHost over a Chrome DevTools endpoint

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use promptrelay_core::port::{DriverError, PageDriver, TabHost, TabInfo};

use crate::devtools::{DevToolsHttp, TargetEntry};
use crate::page::CdpPage;

impl From<TargetEntry> for TabInfo {
    fn from(entry: TargetEntry) -> Self {
        TabInfo {
            id: entry.id,
            url: entry.url,
            kind: entry.kind,
        }
    }
}

pub struct CdpTabHost {
    http: DevToolsHttp,
    /// Live page sessions by target id, reused across attaches
    pages: Mutex<HashMap<String, Arc<CdpPage>>>,
}

impl CdpTabHost {
    pub fn new(http: DevToolsHttp) -> Self {
        Self {
            http,
            pages: Mutex::new(HashMap::new()),
        }
    }

    pub fn http(&self) -> &DevToolsHttp {
        &self.http
    }

    /// Drop every page session (closes their sockets)
    pub async fn detach_all(&self) {
        self.pages.lock().await.clear();
    }
}

#[async_trait]
impl TabHost for CdpTabHost {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, DriverError> {
        let targets = self.http.list().await?;
        Ok(targets.into_iter().map(TabInfo::from).collect())
    }

    async fn activate(&self, tab_id: &str) -> Result<(), DriverError> {
        Ok(self.http.activate(tab_id).await?)
    }

    async fn open(&self, url: &str) -> Result<TabInfo, DriverError> {
        let entry = self.http.new_tab(url).await?;
        info!(tab_id = %entry.id, url = %url, "Opened tab");
        Ok(entry.into())
    }

    async fn attach(&self, tab: &TabInfo) -> Result<Arc<dyn PageDriver>, DriverError> {
        let mut pages = self.pages.lock().await;
        if let Some(page) = pages.get(&tab.id) {
            if !page.is_closed() {
                return Ok(Arc::clone(page) as Arc<dyn PageDriver>);
            }
            debug!(tab_id = %tab.id, "Page session closed, reattaching");
        }

        let page = Arc::new(CdpPage::attach(&self.http.page_ws_url(&tab.id)).await?);
        pages.insert(tab.id.clone(), Arc::clone(&page));
        Ok(page)
    }

    async fn close_tab(&self, tab_id: &str) -> Result<(), DriverError> {
        self.pages.lock().await.remove(tab_id);
        Ok(self.http.close(tab_id).await?)
    }
}

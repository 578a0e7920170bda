// DevTools HTTP endpoints (/json/version, /json/list, /json/new, ...)

use serde::Deserialize;
use tracing::debug;

use crate::error::CdpError;

/// `/json/version`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserVersion {
    #[serde(rename = "Browser")]
    pub browser: String,
    pub web_socket_debugger_url: String,
}

/// One entry of `/json/list`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Absent while another client holds an exclusive session
    pub web_socket_debugger_url: Option<String>,
}

#[derive(Clone)]
pub struct DevToolsHttp {
    base_url: String,
    client: reqwest::Client,
}

impl DevToolsHttp {
    /// # Arguments
    /// * `base_url` - e.g. `http://127.0.0.1:9222`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn version(&self) -> Result<BrowserVersion, CdpError> {
        self.get_json("/json/version").await
    }

    pub async fn list(&self) -> Result<Vec<TargetEntry>, CdpError> {
        self.get_json("/json/list").await
    }

    /// Open a tab (Chrome requires PUT here)
    pub async fn new_tab(&self, url: &str) -> Result<TargetEntry, CdpError> {
        let endpoint = format!("{}/json/new?{}", self.base_url, url);
        debug!(endpoint = %endpoint, "DevTools new tab");
        let response = self.client.put(&endpoint).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn activate(&self, id: &str) -> Result<(), CdpError> {
        self.get_text(&format!("/json/activate/{}", id)).await.map(|_| ())
    }

    pub async fn close(&self, id: &str) -> Result<(), CdpError> {
        self.get_text(&format!("/json/close/{}", id)).await.map(|_| ())
    }

    /// WebSocket URL of a page target, derived from the HTTP endpoint
    pub fn page_ws_url(&self, id: &str) -> String {
        let host = self
            .base_url
            .trim_start_matches("http://")
            .trim_start_matches("https://");
        format!("ws://{}/devtools/page/{}", host, id)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, CdpError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        Ok(response.error_for_status()?.json().await?)
    }

    async fn get_text(&self, path: &str) -> Result<String, CdpError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        Ok(response.error_for_status()?.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_list_parses() {
        let body = r#"[
            {"description":"","devtoolsFrontendUrl":"/devtools/inspector.html","id":"ABC",
             "title":"Ideogram","type":"page","url":"https://ideogram.ai/t/explore",
             "webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/page/ABC"},
            {"id":"SW1","type":"service_worker","url":"https://ideogram.ai/sw.js"}
        ]"#;
        let targets: Vec<TargetEntry> = serde_json::from_str(body).unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].kind, "page");
        assert!(targets[1].web_socket_debugger_url.is_none());
    }

    #[test]
    fn test_version_parses() {
        let body = r#"{"Browser":"Chrome/126.0.6478.126","Protocol-Version":"1.3",
            "webSocketDebuggerUrl":"ws://127.0.0.1:40123/devtools/browser/xyz"}"#;
        let version: BrowserVersion = serde_json::from_str(body).unwrap();
        assert!(version.browser.starts_with("Chrome/"));
    }

    #[test]
    fn test_page_ws_url() {
        let http = DevToolsHttp::new("http://127.0.0.1:9222/");
        assert_eq!(
            http.page_ws_url("ABC"),
            "ws://127.0.0.1:9222/devtools/page/ABC"
        );
    }
}

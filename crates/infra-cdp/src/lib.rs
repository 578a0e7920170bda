// PromptRelay Infrastructure - Chrome DevTools Protocol
// Implements: PageDriver (CdpPage), TabHost (CdpTabHost)

pub mod connection;
pub mod devtools;
pub mod error;
pub mod page;
pub mod tab_host;

pub use connection::CdpConnection;
pub use devtools::{BrowserVersion, DevToolsHttp, TargetEntry};
pub use error::CdpError;
pub use page::CdpPage;
pub use tab_host::CdpTabHost;

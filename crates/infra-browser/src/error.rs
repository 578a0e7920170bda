// Browser backend error types

use std::path::PathBuf;

use promptrelay_core::port::SessionError;
use promptrelay_infra_cdp::CdpError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Profile {path} is in use by pid {pid}")]
    ProfileInUse { path: PathBuf, pid: u32 },

    #[error("Browser stop failed: {0}")]
    Stop(String),

    #[error("DevTools error: {0}")]
    DevTools(#[from] CdpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BrowserError> for SessionError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Launch(msg) => SessionError::Launch(msg),
            BrowserError::ProfileInUse { path, pid } => SessionError::ProfileInUse { path, pid },
            other => SessionError::Unavailable(other.to_string()),
        }
    }
}

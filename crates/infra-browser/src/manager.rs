// Browser Manager
// Lazily launches one browser per platform and relaunches it once it is
// observed to be gone. The profile lock lives exactly as long as the browser.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use promptrelay_core::domain::ServiceTarget;

use crate::error::BrowserError;
use crate::launcher::{BrowserInstance, BrowserLauncher};
use crate::profile::{ProfileLock, ProfileStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserHealth {
    NotStarted,
    Connected,
    Disconnected,
}

struct Running {
    instance: Arc<dyn BrowserInstance>,
    _lock: ProfileLock,
}

/// Result of `BrowserManager::acquire`
pub struct Acquired {
    pub instance: Arc<dyn BrowserInstance>,
    /// True when this call started a new browser
    pub launched: bool,
}

pub struct BrowserManager {
    target: ServiceTarget,
    profiles: ProfileStore,
    launcher: Arc<dyn BrowserLauncher>,
    running: Mutex<Option<Running>>,
    launches: AtomicU32,
}

impl BrowserManager {
    pub fn new(
        target: ServiceTarget,
        profiles: ProfileStore,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            target,
            profiles,
            launcher,
            running: Mutex::new(None),
            launches: AtomicU32::new(0),
        }
    }

    pub fn target(&self) -> ServiceTarget {
        self.target
    }

    /// Return the live browser, launching (or relaunching) it if needed
    ///
    /// # Errors
    /// - BrowserError::ProfileInUse if another process holds the profile
    /// - BrowserError::Launch if the browser did not come up
    pub async fn acquire(&self) -> Result<Acquired, BrowserError> {
        let mut running = self.running.lock().await;

        if let Some(current) = running.as_ref() {
            if current.instance.is_connected() {
                return Ok(Acquired {
                    instance: Arc::clone(&current.instance),
                    launched: false,
                });
            }
            warn!(service = %self.target, "Browser disconnected, relaunching");
            // releases the profile lock before we claim it again
            *running = None;
        }

        let lock = self.profiles.lock(self.target)?;
        let instance = self.launcher.launch(self.target, lock.dir()).await?;
        let launches = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        info!(service = %self.target, launches, "Browser launched");

        *running = Some(Running {
            instance: Arc::clone(&instance),
            _lock: lock,
        });
        Ok(Acquired {
            instance,
            launched: true,
        })
    }

    pub async fn health(&self) -> BrowserHealth {
        match self.running.lock().await.as_ref() {
            None => BrowserHealth::NotStarted,
            Some(r) if r.instance.is_connected() => BrowserHealth::Connected,
            Some(_) => BrowserHealth::Disconnected,
        }
    }

    pub fn launch_count(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }

    /// Stop the browser and release its profile. Returns whether one was running.
    pub async fn shutdown(&self) -> Result<bool, BrowserError> {
        let Some(current) = self.running.lock().await.take() else {
            return Ok(false);
        };
        info!(service = %self.target, "Stopping browser");
        current.instance.shutdown().await?;
        Ok(true)
    }
}

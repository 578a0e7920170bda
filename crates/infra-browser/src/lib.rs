// PromptRelay Infrastructure - Persistent Browser Backend
// Implements: SessionProvider (PersistentBrowserProvider)
// One dedicated Chrome per platform, backed by an on-disk profile

pub mod chrome;
pub mod error;
pub mod launcher;
pub mod manager;
pub mod profile;
pub mod provider;

pub use chrome::{ChromeLauncher, ChromeOptions};
pub use error::BrowserError;
pub use launcher::{BrowserInstance, BrowserLauncher};
pub use manager::{Acquired, BrowserHealth, BrowserManager};
pub use profile::{ProfileLock, ProfileStore};
pub use provider::PersistentBrowserProvider;

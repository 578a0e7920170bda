// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod page_driver;
pub mod session_provider;
pub mod tab_host;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use page_driver::{DomEvent, DriverError, ElementHandle, PageDriver};
pub use session_provider::{SessionError, SessionProvider};
pub use tab_host::{TabHost, TabInfo};
pub use time_provider::TimeProvider;

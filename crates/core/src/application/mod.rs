// Application Layer - Submission engine and use cases

pub mod adapter;
pub mod constants;
pub mod locator;
pub mod orchestrator;
pub mod poll;
pub mod readiness;
pub mod service;
pub mod session;

// Re-exports
pub use adapter::{AdapterRegistry, ServiceAdapter, SubmitOutcome};
pub use locator::{locate, LocatorConfig, ShadowPath};
pub use orchestrator::{BatchOrchestrator, BatchReport, JobResult};
pub use poll::{poll_until, PollOutcome, PollSpec};
pub use readiness::{wait_until_ready, ReadinessOutcome, ReadinessRule, ReadinessSpec};
pub use service::{PromptService, SessionStatus, SubmitResponse};
pub use session::{wait_for_load, ServiceSession, TabSessionPool, TabSessionProvider};

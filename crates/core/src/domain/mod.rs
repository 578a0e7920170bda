// Domain Layer - Pure business logic and entities

pub mod batch;
pub mod error;
pub mod job;
pub mod platform;
pub mod session;

// Re-exports
pub use batch::BatchRequest;
pub use error::DomainError;
pub use job::{JobId, JobStatus, PromptJob, SubmitMethod};
pub use platform::ServiceTarget;
pub use session::{AuthState, BridgeConnection, BridgeState};

// PromptRelay Core - Domain Logic, Ports & Submission Engine
// NO infrastructure dependencies (hexagonal: browsers and sockets live behind ports)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, AutomationError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

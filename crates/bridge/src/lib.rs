// PromptRelay Bridge Transport
// Outbound persistent connection to a local relay that forwards prompt jobs
// into the end-user's browser session.

pub mod client;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod reconnect;

pub use client::{BridgeClient, BridgeConfig};
pub use dispatch::Dispatcher;
pub use error::BridgeError;
pub use protocol::{decode, BridgeMessage, Incoming};
pub use reconnect::{ReconnectDecision, ReconnectPolicy};

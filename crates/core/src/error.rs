// Central Error Types for the Engine

use thiserror::Error;

use crate::domain::DomainError;
use crate::port::page_driver::DriverError;
use crate::port::session_provider::SessionError;

/// Locator / adapter failure taxonomy
///
/// Ambiguous submit controls and destroyed frames are not listed here:
/// the first is recovered by the keyboard fallback, the second surfaces as
/// `Driver(..)` and is reclassified by the orchestrator as an implicit success.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AutomationError {
    #[error("Locator timeout at hop {hop_index} ({hop}) after {attempts} attempts")]
    LocatorTimeout {
        hop_index: usize,
        hop: String,
        attempts: u32,
    },

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl AutomationError {
    /// The document being driven went away (navigation, reload, tab closed)
    pub fn is_frame_destroyed(&self) -> bool {
        match self {
            AutomationError::Driver(err) => err.is_frame_destroyed(),
            _ => false,
        }
    }

    /// Worth a diagnostic snapshot
    pub fn is_locator_failure(&self) -> bool {
        matches!(
            self,
            AutomationError::LocatorTimeout { .. } | AutomationError::ElementNotFound { .. }
        )
    }
}

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("Transport rejected: {0}")]
    TransportRejected(String),

    #[error("Automation error: {0}")]
    Automation(#[from] AutomationError),

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ValidationError(msg) => AppError::Validation(msg),
            DomainError::UnknownService(name) => {
                AppError::Validation(format!("Unknown service: {}", name))
            }
            other => AppError::Domain(other),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AuthenticationRequired { target } => {
                AppError::AuthenticationRequired(target.to_string())
            }
            other => AppError::Session(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ServiceTarget;

    #[test]
    fn test_frame_destroyed_only_for_driver_errors() {
        let err = AutomationError::Driver(DriverError::Protocol(
            "Execution context was destroyed, most likely because of a navigation".to_string(),
        ));
        assert!(err.is_frame_destroyed());

        let err = AutomationError::ElementNotFound {
            selector: "textarea".to_string(),
        };
        assert!(!err.is_frame_destroyed());
        assert!(err.is_locator_failure());
    }

    #[test]
    fn test_session_auth_maps_to_surfaced_variant() {
        let err: AppError = SessionError::AuthenticationRequired {
            target: ServiceTarget::Firefly,
        }
        .into();
        assert!(matches!(err, AppError::AuthenticationRequired(ref s) if s == "firefly"));
    }

    #[test]
    fn test_domain_validation_maps_to_validation() {
        let err: AppError = DomainError::ValidationError("empty".to_string()).into();
        assert!(matches!(err, AppError::Validation(_)));
    }
}

// Session Domain Models (service sessions + bridge connection)

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

/// Authentication state of a platform session as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    Unknown,
    Authenticated,
    LoggedOut,
}

/// Bridge socket state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeState {
    Connecting,
    Open,
    Authenticated,
    Closed,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeState::Connecting => write!(f, "CONNECTING"),
            BridgeState::Open => write!(f, "OPEN"),
            BridgeState::Authenticated => write!(f, "AUTHENTICATED"),
            BridgeState::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Relay connection bookkeeping
///
/// Transitions only move forward (Connecting -> Open -> Authenticated -> Closed),
/// except Closed -> Connecting when a retry is scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConnection {
    state: BridgeState,
    reconnect_attempts: u32,
}

impl Default for BridgeConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeConnection {
    pub fn new() -> Self {
        Self {
            state: BridgeState::Connecting,
            reconnect_attempts: 0,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    fn transition(&mut self, allowed_from: &[BridgeState], to: BridgeState) -> Result<()> {
        if !allowed_from.contains(&self.state) {
            return Err(DomainError::InvalidBridgeTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    /// Connecting -> Open
    pub fn opened(&mut self) -> Result<()> {
        self.transition(&[BridgeState::Connecting], BridgeState::Open)
    }

    /// Open -> Authenticated (resets the retry budget)
    pub fn authenticated(&mut self) -> Result<()> {
        self.transition(&[BridgeState::Open], BridgeState::Authenticated)?;
        self.reconnect_attempts = 0;
        Ok(())
    }

    /// Connecting | Open | Authenticated -> Closed
    pub fn closed(&mut self) -> Result<()> {
        self.transition(
            &[
                BridgeState::Connecting,
                BridgeState::Open,
                BridgeState::Authenticated,
            ],
            BridgeState::Closed,
        )
    }

    /// Closed -> Connecting, counting the attempt
    pub fn retry(&mut self) -> Result<()> {
        self.transition(&[BridgeState::Closed], BridgeState::Connecting)?;
        self.reconnect_attempts += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_lifecycle() {
        let mut conn = BridgeConnection::new();
        assert_eq!(conn.state(), BridgeState::Connecting);
        conn.opened().unwrap();
        conn.authenticated().unwrap();
        conn.closed().unwrap();
        assert_eq!(conn.state(), BridgeState::Closed);
    }

    #[test]
    fn test_retry_counts_and_auth_resets() {
        let mut conn = BridgeConnection::new();
        conn.closed().unwrap();
        conn.retry().unwrap();
        conn.closed().unwrap();
        conn.retry().unwrap();
        assert_eq!(conn.reconnect_attempts(), 2);

        conn.opened().unwrap();
        conn.authenticated().unwrap();
        assert_eq!(conn.reconnect_attempts(), 0);
    }

    #[test]
    fn test_backward_transitions_rejected() {
        let mut conn = BridgeConnection::new();
        conn.opened().unwrap();
        conn.authenticated().unwrap();
        assert!(conn.opened().is_err());
        assert!(conn.retry().is_err());

        conn.closed().unwrap();
        assert!(conn.closed().is_err());
        assert!(conn.authenticated().is_err());
    }
}

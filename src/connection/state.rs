//! Connection state machine

use crate::{Error, Result};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected, ready for a query
    Idle,

    /// Diagnostic query in progress
    QueryInProgress,

    /// Released
    Closed,
}

impl ConnectionState {
    /// Check if transition is valid
    ///
    /// `Closed` is terminal: closing twice is a lifecycle error.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Idle, QueryInProgress)
                | (QueryInProgress, Idle)
                | (Idle, Closed)
                | (QueryInProgress, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {}", self),
                actual: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::QueryInProgress => write!(f, "query_in_progress"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

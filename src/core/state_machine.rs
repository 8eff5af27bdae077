//! Link State Machine
//!
//! Explicit lifecycle of the physical GPS link:
//!
//! ```text
//! Closed -> Opening -> Open -> Reconnecting -> Opening -> ...
//! ```
//!
//! There is no terminal state while the supervisor runs; shutdown forces
//! `Closed`. Invalid transitions are rejected so that the supervisor's event
//! handling stays auditable.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkState {
    /// No transport
    Closed,
    /// Open requested, not yet confirmed
    Opening,
    /// Transport open, data flowing
    Open,
    /// Transport failed, backoff timer pending
    Reconnecting,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Opening => write!(f, "opening"),
            Self::Open => write!(f, "open"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Rejected transition
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid transition from {from} to {to}")]
pub struct InvalidTransition {
    /// Current state
    pub from: LinkState,
    /// Requested state
    pub to: LinkState,
}

/// Link state machine
#[derive(Debug)]
pub struct LinkStateMachine {
    state: LinkState,
    /// Reconnect cycles since the link was last open
    reconnect_attempt: u32,
}

impl Default for LinkStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStateMachine {
    /// Create a new state machine in `Closed`
    pub fn new() -> Self {
        Self {
            state: LinkState::Closed,
            reconnect_attempt: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Get current reconnection attempt
    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    /// Transition to a new state. Same-state transitions are accepted and ignored.
    pub fn transition(&mut self, new_state: LinkState, reason: &str) -> Result<(), InvalidTransition> {
        if new_state == self.state {
            return Ok(());
        }
        if !self.is_valid_transition(new_state) {
            return Err(InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }

        match new_state {
            LinkState::Reconnecting => self.reconnect_attempt += 1,
            LinkState::Open => self.reconnect_attempt = 0,
            _ => {}
        }

        tracing::info!("Link {} -> {} ({})", self.state, new_state, reason);
        self.state = new_state;

        Ok(())
    }

    fn is_valid_transition(&self, new_state: LinkState) -> bool {
        use LinkState::*;

        matches!(
            (self.state, new_state),
            (Closed, Opening)
                | (Opening, Open)
                // Open failed: retried through the reconnect path
                | (Opening, Reconnecting)
                | (Opening, Closed)
                | (Open, Reconnecting)
                | (Open, Closed)
                | (Reconnecting, Opening)
                // Data kept flowing after an error event
                | (Reconnecting, Open)
                | (Reconnecting, Closed)
        )
    }
}

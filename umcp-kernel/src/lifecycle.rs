//! Dispatch state machine for the request loop.

use thiserror::Error;
use tracing::trace;

/// States the dispatch loop moves through for each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Waiting for the next line.
    AwaitingRequest,
    /// A request was read and is being resolved to a handler.
    Routing,
    /// A handler is running.
    Handling,
    /// A response is being written.
    Responding,
    /// The input stream ended; no further requests are read.
    Closed,
}

impl DispatchState {
    /// Returns `true` once the loop has closed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Events that drive dispatch transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    /// A request line was decoded.
    Received,
    /// A line could not be decoded and is answered directly.
    Malformed,
    /// The method resolved to a handler.
    Routed,
    /// The method is unknown and is answered directly.
    Rejected,
    /// The handler produced a response.
    Handled,
    /// The handler completed without a response (notifications).
    Acknowledged,
    /// The response was written.
    Sent,
    /// The input stream reached end of file.
    Disconnected,
}

/// Errors emitted by the dispatch state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Transition was not permitted from the current state.
    #[error("invalid dispatch transition from {from:?} via {event:?}")]
    InvalidTransition {
        /// State prior to the attempted transition.
        from: DispatchState,
        /// Event that triggered the failure.
        event: DispatchEvent,
    },
}

/// Result alias used for dispatch transitions.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Tracks the dispatch loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchLifecycle {
    state: DispatchState,
}

impl Default for DispatchLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchLifecycle {
    /// Creates a lifecycle awaiting its first request.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DispatchState::AwaitingRequest,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> DispatchState {
        self.state
    }

    /// Applies an event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidTransition`] when the event is not
    /// allowed from the current state.
    pub fn transition(&mut self, event: DispatchEvent) -> DispatchResult<DispatchState> {
        let next = match (self.state, event) {
            (DispatchState::AwaitingRequest, DispatchEvent::Received) => {
                Some(DispatchState::Routing)
            }
            (DispatchState::Routing, DispatchEvent::Routed) => Some(DispatchState::Handling),
            (DispatchState::AwaitingRequest, DispatchEvent::Malformed)
            | (DispatchState::Routing, DispatchEvent::Rejected)
            | (DispatchState::Handling, DispatchEvent::Handled) => Some(DispatchState::Responding),
            (DispatchState::Handling, DispatchEvent::Acknowledged)
            | (DispatchState::Responding, DispatchEvent::Sent) => {
                Some(DispatchState::AwaitingRequest)
            }
            (
                DispatchState::AwaitingRequest | DispatchState::Closed,
                DispatchEvent::Disconnected,
            ) => Some(DispatchState::Closed),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(DispatchError::InvalidTransition {
                from: self.state,
                event,
            });
        };

        if next_state != self.state {
            trace!(?self.state, ?next_state, ?event, "dispatch transition");
            self.state = next_state;
        }
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_flow_returns_to_awaiting() {
        let mut lifecycle = DispatchLifecycle::new();
        for (event, expected) in [
            (DispatchEvent::Received, DispatchState::Routing),
            (DispatchEvent::Routed, DispatchState::Handling),
            (DispatchEvent::Handled, DispatchState::Responding),
            (DispatchEvent::Sent, DispatchState::AwaitingRequest),
        ] {
            assert_eq!(lifecycle.transition(event).unwrap(), expected);
        }
    }

    #[test]
    fn notifications_and_rejections_short_circuit() {
        let mut lifecycle = DispatchLifecycle::new();
        lifecycle.transition(DispatchEvent::Received).unwrap();
        lifecycle.transition(DispatchEvent::Routed).unwrap();
        assert_eq!(
            lifecycle.transition(DispatchEvent::Acknowledged).unwrap(),
            DispatchState::AwaitingRequest
        );

        lifecycle.transition(DispatchEvent::Received).unwrap();
        assert_eq!(
            lifecycle.transition(DispatchEvent::Rejected).unwrap(),
            DispatchState::Responding
        );
        lifecycle.transition(DispatchEvent::Sent).unwrap();

        assert_eq!(
            lifecycle.transition(DispatchEvent::Malformed).unwrap(),
            DispatchState::Responding
        );
    }

    #[test]
    fn disconnect_closes_from_awaiting_only() {
        let mut lifecycle = DispatchLifecycle::new();
        lifecycle.transition(DispatchEvent::Received).unwrap();
        let err = lifecycle.transition(DispatchEvent::Disconnected).unwrap_err();
        assert_eq!(
            err,
            DispatchError::InvalidTransition {
                from: DispatchState::Routing,
                event: DispatchEvent::Disconnected
            }
        );

        let mut lifecycle = DispatchLifecycle::new();
        lifecycle.transition(DispatchEvent::Disconnected).unwrap();
        assert!(lifecycle.state().is_terminal());
        assert!(lifecycle.transition(DispatchEvent::Received).is_err());
    }
}

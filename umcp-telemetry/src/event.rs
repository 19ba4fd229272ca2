//! Recorded trace events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which way an event crossed the server boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from the client.
    In,
    /// Sent to the client.
    Out,
    /// Process execution inside the server.
    Internal,
}

/// Category of a trace event.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// JSON-RPC request carrying an id.
    Request,
    /// JSON-RPC response.
    Response,
    /// Process invocation.
    Command,
    /// Process result.
    Output,
    /// JSON-RPC notification.
    Notification,
}

/// One recorded protocol or process occurrence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    timestamp: DateTime<Utc>,
    direction: Direction,
    #[serde(rename = "type")]
    kind: EventKind,
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
}

impl TraceEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn now(direction: Direction, kind: EventKind, data: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            direction,
            kind,
            data,
            metadata: None,
        }
    }

    /// Attaches free-form metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Returns when the event was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the event direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the event category.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns the event payload.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Returns the metadata, if any.
    #[must_use]
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_wire_field_names() {
        let event = TraceEvent::now(Direction::Internal, EventKind::Command, json!("git status"));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["direction"], "internal");
        assert_eq!(value["type"], "command");
        assert_eq!(value["data"], "git status");
        assert!(value.get("metadata").is_none());
        assert!(value["timestamp"].is_string());
    }
}

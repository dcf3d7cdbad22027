//! Request and response bodies exchanged with the persistence service.
//!
//! All payloads are JSON records of primitives; strokes travel as
//! [`Stroke`](crate::stroke::Stroke) with camelCase field names.

use crate::stroke::{NewStroke, Stroke, StrokeId};
use serde::{Deserialize, Serialize};

/// Response to a single stroke creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeCreated {
    pub id: StrokeId,
}

/// Request body for a batched creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub strokes: Vec<NewStroke>,
}

/// Response to a batched creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreated {
    pub ids: Vec<StrokeId>,
    pub count: usize,
}

/// Response to an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub success: bool,
}

/// Response to a bulk deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCount {
    pub deleted_count: usize,
}

/// Caller's usage of the current admission window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStatus {
    /// Cost units charged in the current window.
    pub used: f64,
    /// Units left before requests are rejected, never negative.
    pub remaining: f64,
    /// Milliseconds since the Unix epoch at which the window rolls over.
    pub window_reset_time: u64,
    pub is_limited: bool,
}

/// Messages pushed to subscribed clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full stroke collection in insertion order.
    Snapshot { revision: u64, strokes: Vec<Stroke> },
    /// Error message
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_status_field_names() {
        let status = AdmissionStatus {
            used: 1.5,
            remaining: 298.5,
            window_reset_time: 60_000,
            is_limited: false,
        };
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["windowResetTime"], 60_000);
        assert_eq!(json["isLimited"], false);
    }

    #[test]
    fn test_snapshot_is_tagged() {
        let msg = ServerMessage::Snapshot { revision: 3, strokes: vec![] };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"snapshot","revision":3,"strokes":[]}"#);
        assert_eq!(serde_json::from_str::<ServerMessage>(&json).unwrap(), msg);
    }
}

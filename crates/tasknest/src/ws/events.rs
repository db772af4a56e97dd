//! Wire protocol for the live-sync session.
//!
//! Every message in either direction is a `{"type": ..., "data": ...}`
//! envelope. The envelope decodes the tag and keeps the payload
//! uninterpreted; payloads are parsed on demand by the accessor for the
//! variant the dispatcher selected. An unrecognized tag is not a decode
//! error; the dispatcher ignores it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Tag of a wire event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Ping,
    Pong,
    TaskCreated,
    TaskUpdated,
    TaskStoreError,
    /// Any tag this build does not know. Ignored at dispatch.
    #[serde(other)]
    Unknown,
}

/// The outer wire envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Payload of a `task_created` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCreatedEvent {
    pub id: Uuid,
    pub title: String,
    pub created_by: i64,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub cost: i64,
}

/// Payload of a `task_updated` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdatedEvent {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
    #[serde(default)]
    pub cost: i64,
}

impl Envelope {
    /// Decode the outer envelope from a raw text frame.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Parse the payload as a `task_created` event.
    pub fn task_created(&self) -> Result<TaskCreatedEvent, serde_json::Error> {
        serde_json::from_value(self.data.clone().unwrap_or(Value::Null))
    }

    /// Parse the payload as a `task_updated` event.
    pub fn task_updated(&self) -> Result<TaskUpdatedEvent, serde_json::Error> {
        serde_json::from_value(self.data.clone().unwrap_or(Value::Null))
    }

    /// Build a `pong` reply.
    pub fn pong() -> Self {
        Self {
            kind: EventKind::Pong,
            data: None,
        }
    }

    /// Build a `task_store_error` reply carrying the failure text.
    pub fn store_error(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::TaskStoreError,
            data: Some(json!({ "error": message.into() })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_task_created() {
        let raw = r#"{
            "type": "task_created",
            "data": {
                "id": "a3afc3d5-9717-40d8-9e66-2c0b9c2b6a51",
                "title": "buy milk",
                "created_by": 7,
                "cost": 4
            }
        }"#;

        let envelope = Envelope::decode(raw).unwrap();
        assert_eq!(envelope.kind, EventKind::TaskCreated);

        let payload = envelope.task_created().unwrap();
        assert_eq!(payload.title, "buy milk");
        assert_eq!(payload.created_by, 7);
        assert_eq!(payload.parent_id, None);
        assert_eq!(payload.cost, 4);
    }

    #[test]
    fn test_decode_task_updated() {
        let raw = r#"{
            "type": "task_updated",
            "data": {
                "id": "a3afc3d5-9717-40d8-9e66-2c0b9c2b6a51",
                "title": "buy milk",
                "completed": true
            }
        }"#;

        let payload = Envelope::decode(raw).unwrap().task_updated().unwrap();
        assert!(payload.completed);
        assert_eq!(payload.cost, 0);
    }

    #[test]
    fn test_unknown_kind_is_not_a_decode_error() {
        let envelope = Envelope::decode(r#"{"type": "emoji_reaction", "data": {}}"#).unwrap();
        assert_eq!(envelope.kind, EventKind::Unknown);
    }

    #[test]
    fn test_ping_without_data() {
        let envelope = Envelope::decode(r#"{"type": "ping"}"#).unwrap();
        assert_eq!(envelope.kind, EventKind::Ping);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_payload_accessor_rejects_wrong_shape() {
        let envelope = Envelope::decode(r#"{"type": "task_created", "data": {"id": 12}}"#).unwrap();
        assert!(envelope.task_created().is_err());
    }

    #[test]
    fn test_pong_wire_shape() {
        let json = serde_json::to_string(&Envelope::pong()).unwrap();
        assert_eq!(json, r#"{"type":"pong","data":null}"#);
    }

    #[test]
    fn test_store_error_wire_shape() {
        let json = serde_json::to_string(&Envelope::store_error("boom")).unwrap();
        assert_eq!(json, r#"{"type":"task_store_error","data":{"error":"boom"}}"#);
    }
}

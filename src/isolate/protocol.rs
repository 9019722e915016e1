//! Isolation message protocol
//!
//! Host and isolate exchange JSON documents. The process backend frames them
//! as one document per line; the thread backend passes them through a
//! channel after the same encoding so both backends agree on what can cross
//! the boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::IsolateError;
use crate::models::Descriptor;

/// Outbound: which registered test to run, with its input data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IsolateRequest {
    pub index: usize,
    pub name: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl IsolateRequest {
    pub fn for_descriptor(descriptor: &Descriptor, data: Option<Value>) -> Self {
        Self {
            index: descriptor.index,
            name: descriptor.name.clone(),
            data,
        }
    }

    pub fn encode(&self) -> Result<String, IsolateError> {
        serde_json::to_string(self).map_err(|e| IsolateError::Serialization(e.to_string()))
    }

    pub fn decode(line: &str) -> Result<Self, IsolateError> {
        serde_json::from_str(line.trim()).map_err(|e| IsolateError::Serialization(e.to_string()))
    }

    /// Whether this request identifies `descriptor`
    pub fn matches(&self, descriptor: &Descriptor) -> bool {
        self.index == descriptor.index && self.name == descriptor.name
    }
}

/// Inbound: streamed from the isolate to the host
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IsolateMessage {
    #[serde(rename_all = "camelCase")]
    Assertion {
        /// Count of passing assertions inside the isolate so far
        sequence_number: usize,
        operator: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Done {
        ok: bool,
        elapsed_ms: f64,
        assertion_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

impl IsolateMessage {
    pub fn passed(elapsed_ms: f64, assertion_count: usize) -> Self {
        IsolateMessage::Done {
            ok: true,
            elapsed_ms,
            assertion_count,
            error_message: None,
        }
    }

    pub fn failed(elapsed_ms: f64, assertion_count: usize, error: impl Into<String>) -> Self {
        IsolateMessage::Done {
            ok: false,
            elapsed_ms,
            assertion_count,
            error_message: Some(error.into()),
        }
    }

    pub fn encode(&self) -> Result<String, IsolateError> {
        serde_json::to_string(self).map_err(|e| IsolateError::Serialization(e.to_string()))
    }

    /// Parse one line; `None` for anything that is not a protocol message
    pub fn decode(line: &str) -> Option<Self> {
        serde_json::from_str(line.trim()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assertion_wire_shape() {
        let msg = IsolateMessage::Assertion {
            sequence_number: 1,
            operator: "is".to_string(),
            message: "baseline".to_string(),
        };
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "type": "assertion", "sequenceNumber": 1, "operator": "is", "message": "baseline" })
        );
    }

    #[test]
    fn test_done_wire_shapes() {
        let ok: Value = serde_json::from_str(&IsolateMessage::passed(1.5, 3).encode().unwrap()).unwrap();
        assert_eq!(
            ok,
            json!({ "type": "done", "ok": true, "elapsedMs": 1.5, "assertionCount": 3 })
        );

        let failed: Value =
            serde_json::from_str(&IsolateMessage::failed(2.0, 1, "boom").encode().unwrap()).unwrap();
        assert_eq!(failed["errorMessage"], "boom");
        assert_eq!(failed["ok"], false);
    }

    #[test]
    fn test_decode_ignores_foreign_lines() {
        assert!(IsolateMessage::decode("hello from a test body").is_none());
        assert!(IsolateMessage::decode(r#"{"unrelated": true}"#).is_none());
        assert_eq!(
            IsolateMessage::decode(
                r#"{"type":"done","ok":false,"elapsedMs":0,"assertionCount":2,"errorMessage":"x"}"#
            ),
            Some(IsolateMessage::failed(0.0, 2, "x"))
        );
    }

    #[test]
    fn test_request_encoding() {
        let request = IsolateRequest {
            index: 4,
            name: "fork: baseline".to_string(),
            data: Some(json!({ "baseline": 42 })),
        };
        let decoded = IsolateRequest::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded, request);
        assert!(IsolateRequest::decode("not json").is_err());
    }
}

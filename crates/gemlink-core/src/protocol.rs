//! Host <-> relay wire protocol.
//!
//! Request:
//! `{ "type": "GEMINI_REQUEST", "data": { "apiKey", "model", "requestBody", "requestId" } }`
//!
//! Responses:
//! `{ "type": "SUCCESS", "requestId", "data" }` or
//! `{ "type": "ERROR", "requestId", "error" }`
//!
//! The relay ignores any other message `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::{CorrelationId, Credential, Outcome, RequestEnvelope, ResponseEnvelope};

/// Message type of the only request the relay accepts.
pub const GEMINI_REQUEST: &str = "GEMINI_REQUEST";

/// Payload of a `GEMINI_REQUEST` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    pub api_key: Credential,
    pub model: String,
    pub request_body: Value,
    pub request_id: CorrelationId,
}

/// Messages sent from the host to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    #[serde(rename = "GEMINI_REQUEST")]
    GeminiRequest { data: RequestData },
}

/// Messages sent from the relay back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayMessage {
    #[serde(rename = "SUCCESS")]
    Success {
        #[serde(rename = "requestId")]
        request_id: CorrelationId,
        data: Value,
    },
    #[serde(rename = "ERROR")]
    Error {
        #[serde(rename = "requestId")]
        request_id: CorrelationId,
        error: String,
    },
}

impl RelayMessage {
    pub fn request_id(&self) -> &CorrelationId {
        match self {
            RelayMessage::Success { request_id, .. } | RelayMessage::Error { request_id, .. } => {
                request_id
            }
        }
    }
}

/// Classification of a raw inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A well-formed `GEMINI_REQUEST`.
    Request(RequestEnvelope),
    /// Any other message type (or none at all); produces no response.
    Ignored { kind: Option<String> },
    /// A `GEMINI_REQUEST` whose data could not be decoded. `request_id` is
    /// set when `data.requestId` was still readable, so the host can be
    /// answered with an `ERROR`.
    Invalid {
        request_id: Option<CorrelationId>,
        reason: String,
    },
}

/// Classifies a raw wire message received by the relay.
pub fn decode_host_message(value: &Value) -> Inbound {
    match value.get("type").and_then(Value::as_str) {
        Some(GEMINI_REQUEST) => match HostMessage::deserialize(value) {
            Ok(message) => Inbound::Request(message.into()),
            Err(err) => Inbound::Invalid {
                request_id: recover_request_id(value),
                reason: err.to_string(),
            },
        },
        other => Inbound::Ignored {
            kind: other.map(str::to_string),
        },
    }
}

/// Reads `data.requestId` from a message that failed to decode. Numeric ids
/// are accepted and answered in their decimal form.
fn recover_request_id(value: &Value) -> Option<CorrelationId> {
    match value.get("data")?.get("requestId")? {
        Value::String(id) => Some(CorrelationId::from(id.as_str())),
        Value::Number(id) => Some(CorrelationId::from(id.to_string())),
        _ => None,
    }
}

impl From<RequestEnvelope> for HostMessage {
    fn from(envelope: RequestEnvelope) -> Self {
        HostMessage::GeminiRequest {
            data: RequestData {
                api_key: envelope.credential,
                model: envelope.target,
                request_body: envelope.payload,
                request_id: envelope.correlation_id,
            },
        }
    }
}

impl From<HostMessage> for RequestEnvelope {
    fn from(message: HostMessage) -> Self {
        let HostMessage::GeminiRequest { data } = message;
        RequestEnvelope {
            correlation_id: data.request_id,
            credential: data.api_key,
            target: data.model,
            payload: data.request_body,
        }
    }
}

impl From<ResponseEnvelope> for RelayMessage {
    fn from(envelope: ResponseEnvelope) -> Self {
        match envelope.outcome {
            Outcome::Success { body } => RelayMessage::Success {
                request_id: envelope.correlation_id,
                data: body,
            },
            Outcome::Failure { message } => RelayMessage::Error {
                request_id: envelope.correlation_id,
                error: message,
            },
        }
    }
}

impl From<RelayMessage> for ResponseEnvelope {
    fn from(message: RelayMessage) -> Self {
        match message {
            RelayMessage::Success { request_id, data } => ResponseEnvelope::success(request_id, data),
            RelayMessage::Error { request_id, error } => ResponseEnvelope::failure(request_id, error),
        }
    }
}

//! Typed request/response envelopes exchanged with the relay.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque token pairing a request with its eventual response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::generate()
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque API credential. Never inspected; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the secret for placing it on the outbound request.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// One API call handed to the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub correlation_id: CorrelationId,
    pub credential: Credential,
    /// Model (endpoint variant) to invoke, e.g. `gemini-2.5-flash`.
    pub target: String,
    /// Request body, forwarded verbatim.
    pub payload: Value,
}

impl RequestEnvelope {
    /// Builds an envelope with a freshly generated correlation id.
    pub fn new(credential: Credential, target: impl Into<String>, payload: Value) -> Self {
        Self {
            correlation_id: CorrelationId::generate(),
            credential,
            target: target.into(),
            payload,
        }
    }
}

/// Result of one relayed call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { body: Value },
    Failure { message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Converts into a `Result`, keeping the failure message as the error.
    ///
    /// # Errors
    /// Returns the failure message for `Outcome::Failure`.
    pub fn into_result(self) -> Result<Value, String> {
        match self {
            Outcome::Success { body } => Ok(body),
            Outcome::Failure { message } => Err(message),
        }
    }
}

/// The single answer produced for a `RequestEnvelope`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub correlation_id: CorrelationId,
    pub outcome: Outcome,
}

impl ResponseEnvelope {
    pub fn success(correlation_id: CorrelationId, body: Value) -> Self {
        Self {
            correlation_id,
            outcome: Outcome::Success { body },
        }
    }

    pub fn failure(correlation_id: CorrelationId, message: impl Into<String>) -> Self {
        Self {
            correlation_id,
            outcome: Outcome::Failure {
                message: message.into(),
            },
        }
    }
}

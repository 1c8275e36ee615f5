//! Relay error taxonomy.
//!
//! Every variant is non-fatal: the relay converts each one into an `ERROR`
//! message for the originating request and keeps serving.

use std::error::Error as StdError;
use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;

/// Categories of relay failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayErrorKind {
    /// The remote API answered with a non-success status.
    RemoteRejection,
    /// No response was received (DNS, TLS, connect, reset, timeout).
    TransportFault,
    /// Success status, but the body could not be parsed as JSON.
    MalformedResponseBody,
}

impl RelayErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RelayErrorKind::RemoteRejection => "remote_rejection",
            RelayErrorKind::TransportFault => "transport_fault",
            RelayErrorKind::MalformedResponseBody => "malformed_response_body",
        }
    }
}

impl fmt::Display for RelayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised while relaying a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayError {
    /// Error category
    pub kind: RelayErrorKind,
    /// One-line summary, delivered to the host as the failure message
    pub message: String,
    /// Optional raw detail (e.g. the rejected response body)
    pub details: Option<String>,
}

impl RelayError {
    pub fn new(kind: RelayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a remote rejection from a non-success status and its body.
    ///
    /// Uses `error.message` from a JSON body when present, otherwise the
    /// status line text.
    pub fn http_status(status: StatusCode, body: &str) -> Self {
        let reason = extract_error_message(body).unwrap_or_else(|| status_line_text(status));
        Self {
            kind: RelayErrorKind::RemoteRejection,
            message: format!("HTTP {}: {reason}", status.as_u16()),
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }

    /// Classifies a reqwest failure that happened before a full response
    /// was read.
    ///
    /// The URL is stripped first: it carries the credential in its query.
    pub fn transport(err: reqwest::Error) -> Self {
        let err = err.without_url();
        let description = describe_chain(&err);
        let message = if err.is_timeout() {
            format!("Request timed out: {description}")
        } else if err.is_connect() {
            format!("Connection failed: {description}")
        } else if err.is_request() || err.is_builder() {
            format!("Request error: {description}")
        } else {
            format!("Network error: {description}")
        };
        Self::new(RelayErrorKind::TransportFault, message)
    }

    /// Creates a failure for a success response whose body is not JSON.
    pub fn malformed_body(err: &serde_json::Error, body: &str) -> Self {
        Self {
            kind: RelayErrorKind::MalformedResponseBody,
            message: format!("Failed to parse response body: {err}"),
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for RelayError {}

fn extract_error_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body).ok()?;
    json.get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

fn status_line_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown Status")
        .to_string()
}

/// Joins an error and its sources into one line.
fn describe_chain(err: &dyn StdError) -> String {
    let mut description = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !description.contains(&text) {
            description.push_str(": ");
            description.push_str(&text);
        }
        source = cause.source();
    }
    description
}

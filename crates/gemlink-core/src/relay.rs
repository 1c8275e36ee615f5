//! Isolated request relay.
//!
//! The relay owns one HTTP client and nothing else. It runs in its own task
//! (see [`Relay::spawn`]) or process (`gemlink relay`) and talks to its host
//! only through wire messages. Every accepted `GEMINI_REQUEST` runs in its
//! own sub-task and produces exactly one `SUCCESS` or `ERROR` message tagged
//! with the request's id. No retries, no cancellation, no state between
//! requests.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::header::{CONTENT_TYPE, HeaderValue, USER_AGENT};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use url::Url;

use crate::envelope::{CorrelationId, Credential, RequestEnvelope, ResponseEnvelope};
use crate::error::{RelayError, RelayErrorKind};
use crate::protocol::{Inbound, RelayMessage, decode_host_message};

/// Production Generative Language API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// User-Agent sent with every relayed request.
pub const RELAY_USER_AGENT: &str = concat!("gemlink/", env!("CARGO_PKG_VERSION"));

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// API root; requests go to `{base_url}/models/{target}:generateContent`.
    pub base_url: String,
    /// Client-side timeout. `None` leaves the call unbounded.
    pub timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

/// Performs one `generateContent` call per request envelope.
#[derive(Debug, Clone)]
pub struct Relay {
    base_url: String,
    http: reqwest::Client,
}

impl Relay {
    /// Creates a relay with its own HTTP client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: RelayConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Builds the endpoint URL for a target, with the credential in `key`.
    ///
    /// # Errors
    /// Returns a transport fault if the base URL and target do not form a
    /// valid URL.
    pub fn endpoint_url(&self, target: &str, credential: &Credential) -> Result<Url, RelayError> {
        let invalid = |reason: &dyn fmt::Display| {
            RelayError::new(
                RelayErrorKind::TransportFault,
                format!("Invalid request URL {}: {reason}", self.base_url),
            )
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(&e))?;
        // One escaped segment: `?`, `#` and `/` in the target stay in the path.
        url.path_segments_mut()
            .map_err(|()| invalid(&"cannot be a base"))?
            .pop_if_empty()
            .push("models")
            .push(&format!("{target}:generateContent"));
        url.query_pairs_mut().append_pair("key", credential.expose());
        Ok(url)
    }

    /// Relays one request and always returns its response envelope.
    pub async fn execute(&self, request: RequestEnvelope) -> ResponseEnvelope {
        let RequestEnvelope {
            correlation_id,
            credential,
            target,
            payload,
        } = request;

        let started = Instant::now();
        match self.call(&target, &credential, &payload).await {
            Ok(body) => {
                debug!(
                    request_id = %correlation_id,
                    target = %target,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "relay request succeeded"
                );
                ResponseEnvelope::success(correlation_id, body)
            }
            Err(err) => {
                warn!(
                    request_id = %correlation_id,
                    target = %target,
                    kind = %err.kind,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "relay request failed: {}",
                    err.message
                );
                if let Some(details) = &err.details {
                    debug!(request_id = %correlation_id, "rejected response body: {details}");
                }
                ResponseEnvelope::failure(correlation_id, err.message)
            }
        }
    }

    async fn call(
        &self,
        target: &str,
        credential: &Credential,
        payload: &Value,
    ) -> Result<Value, RelayError> {
        let url = self.endpoint_url(target, credential)?;

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(USER_AGENT, HeaderValue::from_static(RELAY_USER_AGENT))
            .json(payload)
            .send()
            .await
            .map_err(RelayError::transport)?;

        let status = response.status();
        let body = response.text().await.map_err(RelayError::transport)?;
        if !status.is_success() {
            return Err(RelayError::http_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| RelayError::malformed_body(&e, &body))
    }

    /// Spawns the relay as an isolated task and returns its channels.
    pub fn spawn(self) -> RelayHandle {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.serve(inbox_rx, outbox_tx));
        RelayHandle {
            inbox: inbox_tx,
            outbox: outbox_rx,
            task,
        }
    }

    /// Serves wire messages until the inbox closes and every accepted
    /// request has been answered.
    pub async fn serve(
        self,
        mut inbox: mpsc::UnboundedReceiver<Value>,
        outbox: mpsc::UnboundedSender<RelayMessage>,
    ) {
        let mut in_flight: JoinSet<ResponseEnvelope> = JoinSet::new();
        let mut owners: HashMap<tokio::task::Id, CorrelationId> = HashMap::new();

        info!(base_url = %self.base_url, "relay started");
        loop {
            tokio::select! {
                message = inbox.recv() => {
                    let Some(message) = message else {
                        break;
                    };
                    self.accept(&message, &mut in_flight, &mut owners, &outbox);
                }
                Some(joined) = in_flight.join_next_with_id(), if !in_flight.is_empty() => {
                    deliver(joined, &mut owners, &outbox);
                }
            }
        }

        debug!(in_flight = in_flight.len(), "relay inbox closed, draining");
        while let Some(joined) = in_flight.join_next_with_id().await {
            deliver(joined, &mut owners, &outbox);
        }
        info!("relay stopped");
    }

    fn accept(
        &self,
        message: &Value,
        in_flight: &mut JoinSet<ResponseEnvelope>,
        owners: &mut HashMap<tokio::task::Id, CorrelationId>,
        outbox: &mpsc::UnboundedSender<RelayMessage>,
    ) {
        match decode_host_message(message) {
            Inbound::Request(envelope) => {
                debug!(
                    request_id = %envelope.correlation_id,
                    target = %envelope.target,
                    "relay accepted request"
                );
                let correlation_id = envelope.correlation_id.clone();
                let relay = self.clone();
                let handle = in_flight.spawn(async move { relay.execute(envelope).await });
                owners.insert(handle.id(), correlation_id);
            }
            Inbound::Ignored { kind } => {
                debug!(kind = ?kind, "relay ignored message");
            }
            Inbound::Invalid {
                request_id: Some(request_id),
                reason,
            } => {
                warn!(request_id = %request_id, "relay rejected malformed GEMINI_REQUEST: {reason}");
                let response = ResponseEnvelope::failure(
                    request_id,
                    format!("Invalid GEMINI_REQUEST: {reason}"),
                );
                if outbox.send(response.into()).is_err() {
                    debug!("relay outbox closed, response discarded");
                }
            }
            Inbound::Invalid {
                request_id: None,
                reason,
            } => {
                warn!("relay dropped GEMINI_REQUEST without a usable requestId: {reason}");
            }
        }
    }
}

/// Sends the response for a finished request task.
///
/// A task that panicked still answers its request with an `ERROR`.
fn deliver(
    joined: Result<(tokio::task::Id, ResponseEnvelope), tokio::task::JoinError>,
    owners: &mut HashMap<tokio::task::Id, CorrelationId>,
    outbox: &mpsc::UnboundedSender<RelayMessage>,
) {
    let response = match joined {
        Ok((id, response)) => {
            owners.remove(&id);
            response
        }
        Err(err) => {
            let Some(correlation_id) = owners.remove(&err.id()) else {
                warn!("relay task failed without an owner: {err}");
                return;
            };
            warn!(request_id = %correlation_id, "relay task failed: {err}");
            ResponseEnvelope::failure(correlation_id, format!("Relay task failed: {err}"))
        }
    };

    if outbox.send(response.into()).is_err() {
        debug!("relay outbox closed, response discarded");
    }
}

/// Channels connected to a spawned relay.
#[derive(Debug)]
pub struct RelayHandle {
    /// Raw wire messages into the relay.
    pub inbox: mpsc::UnboundedSender<Value>,
    /// Response messages out of the relay.
    pub outbox: mpsc::UnboundedReceiver<RelayMessage>,
    /// The relay's serve loop. Finishes after `inbox` is dropped and all
    /// in-flight requests have been answered.
    pub task: JoinHandle<()>,
}

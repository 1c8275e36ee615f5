//! Host-side relay client.
//!
//! Correlates relay responses back to callers: each submitted request
//! registers a one-shot completion keyed by its correlation id, and a
//! dispatcher task fulfils it when the matching response message arrives.
//! Responses for unknown or abandoned ids are discarded.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::credentials::CredentialAuthority;
use crate::envelope::{CorrelationId, RequestEnvelope, ResponseEnvelope};
use crate::protocol::{HostMessage, RelayMessage};
use crate::relay::RelayHandle;

type PendingMap = HashMap<CorrelationId, oneshot::Sender<ResponseEnvelope>>;

/// Submits requests to a relay and awaits their correlated responses.
pub struct RelayClient {
    inbox: mpsc::UnboundedSender<Value>,
    pending: Arc<Mutex<PendingMap>>,
    authority: Arc<dyn CredentialAuthority>,
    dispatcher: JoinHandle<()>,
    relay_task: JoinHandle<()>,
}

impl RelayClient {
    /// Connects to a spawned relay.
    ///
    /// `authority` is consulted for a credential before every request.
    pub fn connect(relay: RelayHandle, authority: Arc<dyn CredentialAuthority>) -> Self {
        let RelayHandle {
            inbox,
            outbox,
            task,
        } = relay;
        let pending = Arc::new(Mutex::new(PendingMap::new()));
        let dispatcher = tokio::spawn(dispatch(outbox, Arc::clone(&pending)));
        Self {
            inbox,
            pending,
            authority,
            dispatcher,
            relay_task: task,
        }
    }

    /// Submits a request for `target` with a fresh correlation id.
    ///
    /// # Errors
    /// Returns an error if no credential is available or the relay has
    /// stopped.
    pub fn submit(&self, target: &str, payload: Value) -> Result<PendingResponse> {
        let credential = self
            .authority
            .credential(target)
            .with_context(|| format!("No credential available for {target}"))?;
        self.submit_envelope(RequestEnvelope::new(credential, target, payload))
    }

    /// Submits a caller-built envelope.
    ///
    /// # Errors
    /// Returns an error if a request with the same correlation id is still
    /// outstanding, or the relay has stopped.
    pub fn submit_envelope(&self, envelope: RequestEnvelope) -> Result<PendingResponse> {
        let correlation_id = envelope.correlation_id.clone();
        let (tx, rx) = oneshot::channel();

        match lock(&self.pending).entry(correlation_id.clone()) {
            Entry::Occupied(_) => {
                bail!("Request {correlation_id} is already in flight");
            }
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }

        let message = serde_json::to_value(HostMessage::from(envelope))
            .context("Failed to encode relay request");
        let sent = message
            .and_then(|message| self.inbox.send(message).context("Relay is not running"));
        if let Err(err) = sent {
            lock(&self.pending).remove(&correlation_id);
            return Err(err);
        }

        debug!(request_id = %correlation_id, "request submitted to relay");
        Ok(PendingResponse { correlation_id, rx })
    }

    /// Submits a request and waits for its response.
    ///
    /// # Errors
    /// Returns an error if submission fails or the relay stops before
    /// answering.
    pub async fn request(&self, target: &str, payload: Value) -> Result<ResponseEnvelope> {
        self.submit(target, payload)?.await
    }

    /// Number of requests still awaiting a response.
    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Closes the relay inbox and waits for the relay to finish answering
    /// everything already submitted.
    ///
    /// # Errors
    /// Returns an error if the relay or dispatcher task panicked.
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            inbox,
            dispatcher,
            relay_task,
            ..
        } = self;
        drop(inbox);
        relay_task.await.context("Relay task failed")?;
        dispatcher.await.context("Relay dispatcher failed")?;
        Ok(())
    }
}

/// A submitted request awaiting its response.
///
/// Dropping it abandons the request; the relay still runs it to completion
/// and the late response is discarded.
#[derive(Debug)]
pub struct PendingResponse {
    correlation_id: CorrelationId,
    rx: oneshot::Receiver<ResponseEnvelope>,
}

impl PendingResponse {
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Waits for the correlated response.
    ///
    /// # Errors
    /// Returns an error if the relay stopped before responding.
    pub async fn wait(self) -> Result<ResponseEnvelope> {
        let correlation_id = self.correlation_id;
        self.rx
            .await
            .with_context(|| format!("Relay stopped before answering request {correlation_id}"))
    }
}

impl IntoFuture for PendingResponse {
    type Output = Result<ResponseEnvelope>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

async fn dispatch(
    mut outbox: mpsc::UnboundedReceiver<RelayMessage>,
    pending: Arc<Mutex<PendingMap>>,
) {
    while let Some(message) = outbox.recv().await {
        let response = ResponseEnvelope::from(message);
        let waiter = lock(&pending).remove(&response.correlation_id);
        match waiter {
            Some(tx) => {
                let correlation_id = response.correlation_id.clone();
                if tx.send(response).is_err() {
                    debug!(
                        request_id = %correlation_id,
                        "caller abandoned request, response discarded"
                    );
                }
            }
            None => {
                warn!(
                    request_id = %response.correlation_id,
                    "discarding response with no pending request"
                );
            }
        }
    }

    // Relay gone: dropping the senders wakes every waiter with an error.
    let abandoned = std::mem::take(&mut *lock(&pending));
    if !abandoned.is_empty() {
        warn!(count = abandoned.len(), "relay stopped with requests outstanding");
    }
}

fn lock(pending: &Mutex<PendingMap>) -> MutexGuard<'_, PendingMap> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

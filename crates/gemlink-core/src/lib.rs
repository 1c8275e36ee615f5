//! Core library for gemlink.
//!
//! - `relay`: the isolated unit that performs one `generateContent` call per
//!   accepted request and answers with exactly one correlated message
//! - `stdio`: NDJSON transport for running the relay as its own process
//! - `client`: host-side handle that correlates relay responses back to callers
//! - `protocol` / `envelope`: wire messages and their typed counterparts
//! - `credentials`: the seam to the external credential/quota authority
//! - `auth`: the externally owned authentication status rendered by the panel

pub mod auth;
pub mod client;
pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod relay;
pub mod stdio;

pub use auth::AuthStatus;
pub use client::{PendingResponse, RelayClient};
pub use credentials::{CredentialAuthority, EnvCredential, StaticCredential};
pub use envelope::{CorrelationId, Credential, Outcome, RequestEnvelope, ResponseEnvelope};
pub use error::{RelayError, RelayErrorKind};
pub use protocol::{HostMessage, Inbound, RelayMessage};
pub use relay::{Relay, RelayConfig, RelayHandle};

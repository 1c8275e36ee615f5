//! `gemlink panel`: the authentication status panel.
//!
//! The panel only renders the status it is given. With `--check` this
//! command acts as the host: it sends one small request with the configured
//! key and publishes the resulting status.

use std::sync::Arc;

use anyhow::Result;
use gemlink_core::config::Config;
use gemlink_core::{AuthStatus, EnvCredential, Outcome, Relay, RelayClient};
use gemlink_tui::PanelRuntime;
use tokio::sync::watch;
use tracing::{info, warn};

use super::generate::prompt_payload;

pub struct PanelOptions<'a> {
    pub status: &'a str,
    pub check: bool,
    pub model_override: Option<&'a str>,
    pub config: &'a Config,
}

pub async fn run(opts: PanelOptions<'_>) -> Result<()> {
    let login_url = opts.config.manual_login_url.clone();
    let recovery_action = move || {
        info!(url = %login_url, "opening manual sign-in page");
        if let Err(e) = open::that(&login_url) {
            warn!("Failed to open browser: {e}");
        }
    };

    let initial = if opts.check {
        Some(AuthStatus::Loading)
    } else {
        let status = AuthStatus::from_wire(opts.status);
        if status.is_none() {
            warn!(status = opts.status, "unknown status, panel will stay empty");
        }
        status
    };
    let mut runtime = PanelRuntime::new(initial, recovery_action);

    let check_task = if opts.check {
        let (tx, rx) = watch::channel(initial);
        runtime = runtime.with_updates(rx);
        let config = opts.config.clone();
        let model = opts
            .model_override
            .unwrap_or(&opts.config.model)
            .to_string();
        Some(tokio::spawn(async move {
            let status = check_credential(&config, &model).await;
            info!(status = %status, "credential check finished");
            let _ = tx.send(Some(status));
        }))
    } else {
        None
    };

    let result = tokio::task::block_in_place(|| runtime.run());

    if let Some(task) = check_task {
        task.abort();
    }
    result
}

async fn check_credential(config: &Config, model: &str) -> AuthStatus {
    match check_outcome(config, model).await {
        Ok(outcome) => status_for_outcome(&outcome),
        Err(err) => {
            warn!("credential check could not run: {err:#}");
            AuthStatus::ManualRequired
        }
    }
}

async fn check_outcome(config: &Config, model: &str) -> Result<Outcome> {
    let relay = Relay::new(config.relay_config()?)?;
    let authority = Arc::new(EnvCredential::new(config.relay.api_key.clone()));
    let client = RelayClient::connect(relay.spawn(), authority);

    let response = client.request(model, prompt_payload("ping")).await;
    client.shutdown().await?;
    Ok(response?.outcome)
}

/// Maps a credential check result to the status shown by the panel.
///
/// Key rejections need the user to sign in again; anything else is a plain
/// failure.
pub fn status_for_outcome(outcome: &Outcome) -> AuthStatus {
    match outcome {
        Outcome::Success { .. } => AuthStatus::Ready,
        Outcome::Failure { message } if is_credential_rejection(message) => {
            AuthStatus::ManualRequired
        }
        Outcome::Failure { .. } => AuthStatus::Failed,
    }
}

fn is_credential_rejection(message: &str) -> bool {
    message.starts_with("HTTP 401")
        || message.starts_with("HTTP 403")
        || (message.starts_with("HTTP 400") && message.contains("API key"))
}

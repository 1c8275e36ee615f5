//! `gemlink generate`: one request through an in-process relay.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use gemlink_core::config::Config;
use gemlink_core::{EnvCredential, Outcome, Relay, RelayClient};
use serde_json::{Value, json};
use tokio::io::{self, AsyncReadExt};
use tracing::debug;

pub struct GenerateOptions<'a> {
    pub prompt: Option<&'a str>,
    pub body: Option<&'a str>,
    pub model_override: Option<&'a str>,
    pub config: &'a Config,
}

pub async fn run(opts: GenerateOptions<'_>) -> Result<()> {
    let payload = load_payload(opts.prompt, opts.body).await?;
    let model = opts.model_override.unwrap_or(&opts.config.model);

    let relay = Relay::new(opts.config.relay_config()?)?;
    let authority = Arc::new(EnvCredential::new(opts.config.relay.api_key.clone()));
    let client = RelayClient::connect(relay.spawn(), authority);

    let response = client.request(model, payload).await;
    client.shutdown().await?;
    let response = response?;
    debug!(request_id = %response.correlation_id, "response received");

    match response.outcome {
        Outcome::Success { body } => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Outcome::Failure { message } => bail!("Request failed: {message}"),
    }
}

/// Wraps a text prompt into a single-turn `generateContent` body.
pub fn prompt_payload(prompt: &str) -> Value {
    json!({
        "contents": [
            { "role": "user", "parts": [{ "text": prompt }] }
        ]
    })
}

async fn load_payload(prompt: Option<&str>, body: Option<&str>) -> Result<Value> {
    let raw = match (prompt, body) {
        (Some(prompt), None) => return Ok(prompt_payload(prompt)),
        (None, Some("-")) => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read request body from stdin")?;
            raw
        }
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read request body from {path}"))?,
        _ => bail!("Pass either --prompt or --body"),
    };

    let payload: Value = serde_json::from_str(&raw).context("Request body is not valid JSON")?;
    if !payload.is_object() {
        bail!("Request body must be a JSON object");
    }
    Ok(payload)
}

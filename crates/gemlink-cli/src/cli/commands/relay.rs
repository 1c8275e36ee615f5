//! `gemlink relay`: the relay as an isolated process.

use anyhow::Result;
use gemlink_core::config::Config;
use gemlink_core::{Relay, stdio};
use tokio::io::{self, BufReader};
use tracing::info;

pub async fn run(config: &Config) -> Result<()> {
    let relay = Relay::new(config.relay_config()?)?;
    info!("relay listening on stdin");

    let mut stdout = io::stdout();
    stdio::serve_ndjson(relay, BufReader::new(io::stdin()), &mut stdout).await?;

    info!("relay input closed, exiting");
    Ok(())
}

//! NDJSON transport for running the relay as a separate process.
//!
//! Each input line is one wire message; each output line is one response
//! message. Output lines are written by a single loop, so concurrent
//! responses never interleave.

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::relay::{Relay, RelayHandle};

/// Serves NDJSON requests from `reader`, writing responses to `writer`.
///
/// Returns once `reader` reaches EOF and every accepted request has been
/// answered. Lines that are not JSON (including invalid UTF-8) are skipped.
/// A read error ends the input like EOF does, so accepted requests are still
/// answered.
///
/// # Errors
/// Returns an error if writing output fails.
pub async fn serve_ndjson<R, W>(relay: Relay, reader: R, writer: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let RelayHandle {
        inbox,
        mut outbox,
        task,
    } = relay.spawn();
    let mut inbox = Some(inbox);
    let mut lines = reader.split(b'\n');

    loop {
        tokio::select! {
            line = lines.next_segment(), if inbox.is_some() => {
                match line {
                    Ok(Some(line)) => forward_line(&line, inbox.as_ref()),
                    Ok(None) => {
                        debug!("relay input closed");
                        inbox = None;
                    }
                    Err(err) => {
                        warn!("relay input failed, no further requests accepted: {err}");
                        inbox = None;
                    }
                }
            }
            message = outbox.recv() => {
                let Some(message) = message else {
                    break;
                };
                let mut encoded =
                    serde_json::to_vec(&message).context("Failed to encode relay response")?;
                encoded.push(b'\n');
                writer
                    .write_all(&encoded)
                    .await
                    .context("Failed to write relay response")?;
                writer.flush().await.context("Failed to flush relay output")?;
            }
        }
    }

    task.await.context("Relay task failed")?;
    Ok(())
}

fn forward_line(line: &[u8], inbox: Option<&mpsc::UnboundedSender<Value>>) {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return;
    }
    match serde_json::from_slice::<Value>(trimmed) {
        Ok(message) => {
            if let Some(inbox) = inbox
                && inbox.send(message).is_err()
            {
                warn!("relay stopped accepting messages");
            }
        }
        Err(err) => warn!("ignoring non-JSON input line: {err}"),
    }
}

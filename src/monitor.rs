// SPDX-License-Identifier: AGPL-3.0-or-later

//! Component H: the monitor (§4.H). A dedicated unix socket listener: one
//! JSON status document per inbound connection, then close. Shares no
//! mutable state with the classification path beyond read-only counter
//! reads.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::{io::AsyncWriteExt, net::UnixListener};
use tokio_util::sync::CancellationToken;

use crate::counters::Counters;

#[derive(Serialize)]
struct MonitorReply {
    filter_status: String,
    clients_num: u64,
    received: u64,
    parse_error: u64,
    match_count: u64,
}

impl MonitorReply {
    fn from_counters(counters: &Counters) -> Self {
        Self {
            filter_status: counters.status().to_string(),
            clients_num: counters.clients_num(),
            received: counters.received(),
            parse_error: counters.parse_error_count(),
            match_count: counters.match_count(),
        }
    }
}

/// Runs the monitor accept loop until `cancel` fires.
pub async fn run(socket_path: &str, counters: Arc<Counters>, cancel: CancellationToken) -> Result<()> {
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("binding monitor socket {socket_path}"))?;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => {
                let (mut stream, _) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        tracing::debug!(%err, "monitor accept failed");
                        continue;
                    }
                };
                let reply = MonitorReply::from_counters(&counters);
                match serde_json::to_vec(&reply) {
                    Ok(body) => {
                        // A disconnecting monitor client is MonitorTransient (§7): ignore.
                        let _ = stream.write_all(&body).await;
                    }
                    Err(err) => tracing::error!(%err, "failed to serialise monitor reply"),
                }
            }
        }
    }

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

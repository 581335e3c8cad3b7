// SPDX-License-Identifier: AGPL-3.0-or-later

//! Component F: the per-connection Session state machine (§4.F). Stream
//! transports (unix, tcp) share one generic read loop; UDP is one-shot and
//! handled separately since each datagram is a complete frame with no
//! client write-back.

pub mod registry;

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::{
    cfg::enums::OutputType,
    next_filter::NextFilterConnector,
    pool::TaskPool,
    session::registry::SessionHandle,
    task::{self, TaskContext},
    wire::{self, FrameType, HEADER_LEN, ResponseMode},
};

/// Everything a Session needs beyond the raw stream: shared runtime
/// components and this filter's static configuration (§3.2).
#[derive(Clone)]
pub struct SessionConfig {
    pub task_ctx: Arc<TaskContext>,
    pub task_pool: Arc<TaskPool>,
    pub next_filter: Option<Arc<NextFilterConnector>>,
    pub output_type: OutputType,
}

/// Runs the read/execute/dispatch loop for one stream-oriented connection
/// (unix or tcp) until EOF or a fatal transport error. Generic over the
/// concrete stream type so unix and tcp sessions share one implementation,
/// per §9's "share the middle of the state machine but differ in
/// read/write mechanics".
pub async fn run_stream_session<S>(mut stream: S, config: SessionConfig, handle: SessionHandle)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let terminate = handle.terminate_token();

    loop {
        if handle.is_terminated() {
            return;
        }

        let mut header_buf = [0u8; HEADER_LEN];
        let read_result = tokio::select! {
            result = stream.read_exact(&mut header_buf) => result,
            _ = terminate.cancelled() => return,
        };
        if read_result.is_err() {
            // EOF before a header, or a transport error: silent Terminal.
            return;
        }

        let header = match wire::parse_header(&header_buf) {
            Ok(header) => header,
            Err(err) => {
                tracing::debug!(%err, "dropping connection on framing error");
                return;
            },
        };

        let tail_len = header.tail_len();
        let mut tail = vec![0u8; tail_len];
        if tail_len > 0 && stream.read_exact(&mut tail).await.is_err() {
            return;
        }

        let tail = match wire::parse_tail(&header, &tail) {
            Ok(tail) => tail,
            Err(err) => {
                tracing::debug!(%err, "dropping connection on framing error");
                return;
            },
        };

        let entries = match parse_body_entries(&tail.body) {
            Ok(entries) => entries,
            Err(()) => {
                config.task_ctx.counters.parse_error();
                if header.response_mode.replies_to_client() {
                    let error_body = client_error_body();
                    let reply = wire::emit_frame(
                        FrameType::Filter,
                        header.response_mode,
                        header.filter_code,
                        header.event_id,
                        &[0],
                        error_body.as_bytes(),
                    );
                    let _ = stream.write_all(&reply).await;
                }
                // Forward-only mode silently drops malformed frames (§9 open question).
                continue;
            },
        };

        let result = run_task(&config, header.event_id, &tail.body, entries.clone()).await;

        if handle.is_terminated() {
            // §5: a task result destined for a Terminal session is dropped silently.
            continue;
        }

        if header.response_mode.replies_to_client() {
            let reply = wire::emit_frame(
                FrameType::Filter,
                header.response_mode,
                header.filter_code,
                header.event_id,
                &result.certitudes,
                &[],
            );
            if stream.write_all(&reply).await.is_err() {
                return;
            }
        }

        if header.response_mode.forwards_to_next() {
            if let Some(next_filter) = &config.next_filter {
                let body = transform_body(config.output_type, &tail.body, &entries, &result.log_lines);
                let forward = wire::emit_frame(
                    FrameType::Filter,
                    header.response_mode,
                    header.filter_code,
                    header.event_id,
                    &result.certitudes,
                    &body,
                );
                next_filter.send(forward).await;
            }
        }
    }
}

/// Handles one UDP datagram as a complete, self-contained frame (§4.F UDP
/// variant). Never writes back to the client.
pub async fn run_udp_datagram(
    datagram: &[u8],
    config: &SessionConfig,
) -> Result<()> {
    if datagram.len() < HEADER_LEN {
        anyhow::bail!("datagram shorter than a header");
    }
    let mut header_buf = [0u8; HEADER_LEN];
    header_buf.copy_from_slice(&datagram[..HEADER_LEN]);
    let header = wire::parse_header(&header_buf)?;

    let tail = &datagram[HEADER_LEN..];
    anyhow::ensure!(
        tail.len() == header.tail_len(),
        "datagram length does not match header_len + body_size + N*4"
    );
    let tail = wire::parse_tail(&header, tail)?;

    let entries = match parse_body_entries(&tail.body) {
        Ok(entries) => entries,
        Err(()) => {
            config.task_ctx.counters.parse_error();
            return Ok(());
        },
    };

    let result = run_task(config, header.event_id, &tail.body, entries.clone()).await;

    if header.response_mode.forwards_to_next() {
        if let Some(next_filter) = &config.next_filter {
            let body = transform_body(config.output_type, &tail.body, &entries, &result.log_lines);
            let forward = wire::emit_frame(
                FrameType::Filter,
                header.response_mode,
                header.filter_code,
                header.event_id,
                &result.certitudes,
                &body,
            );
            next_filter.send(forward).await;
        }
    }

    Ok(())
}

/// Submits the classification work to the task pool and awaits its result
/// over a one-shot channel, keeping the actual classify() call off the I/O
/// reactor (§4.F "Execute"). `body` is the raw request body, threaded
/// through to the classifier's default cache keying (§4.B).
async fn run_task(config: &SessionConfig, event_id: Uuid, body: &[u8], entries: Vec<Value>) -> task::TaskResult {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let ctx = Arc::clone(&config.task_ctx);
    let body = body.to_vec();
    config.task_pool.submit(move || {
        let result = task::execute(&ctx, event_id, &body, &entries);
        let _ = tx.send(result);
    });

    match rx.await {
        Ok(result) => result,
        Err(_) => task::TaskResult { certitudes: vec![crate::classifier::ERROR_RETURN], log_lines: Vec::new() },
    }
}

/// Parses the request body's outer JSON array. An empty body with `N <= 1`
/// is not an error — it is the empty-entries control frame (§8). A
/// non-empty body that fails to parse as a JSON array is `RequestParse`.
fn parse_body_entries(body: &[u8]) -> Result<Vec<Value>, ()> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_slice::<Vec<Value>>(body) {
        Ok(entries) => Ok(entries),
        Err(_) => Err(()),
    }
}

fn client_error_body() -> String {
    serde_json::json!({ "error": "request body is not a JSON array", "error_code": 400 }).to_string()
}

/// Rewrites the body handed to the Next-filter connector according to
/// `output_type` (§4.F).
fn transform_body(output_type: OutputType, raw_body: &[u8], entries: &[Value], log_lines: &[String]) -> Vec<u8> {
    match output_type {
        OutputType::Raw => raw_body.to_vec(),
        OutputType::Parsed => serde_json::to_vec(entries).unwrap_or_default(),
        OutputType::Log => {
            let mut buf = String::new();
            for line in log_lines {
                buf.push_str(line);
                buf.push('\n');
            }
            buf.into_bytes()
        },
        OutputType::None => Vec::new(),
    }
}

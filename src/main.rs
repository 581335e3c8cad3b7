// SPDX-License-Identifier: AGPL-3.0-or-later

//! Reference filter binary: wires the shared runtime to the bundled
//! [`darwin_filter_runtime::classifier::EchoClassifier`]. Real filters swap
//! in their own [`darwin_filter_runtime::classifier::Classifier`]
//! implementation and otherwise reuse everything in this file.

use std::sync::Arc;

use anyhow::Result;
use darwin_filter_runtime::{
    acceptor,
    cfg::{cli, logger},
    classifier::EchoClassifier,
    monitor,
    runtime::{Runtime, resolve_listen_transport},
    session::registry::SessionRegistry,
};

/// Reserved filter code placeholder; real filters use their own assigned
/// 4-byte identifier (§6.5 — `0x00000000` itself stays reserved).
const FILTER_CODE: u32 = 0x0000_0001;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse_args(std::env::args().skip(1))?;
    let _logger_guard = logger::init_logger(&args.name, args.log_level)?;

    if let Err(err) = run(args).await {
        tracing::error!(%err, "fatal startup or runtime error");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: cli::CliArgs) -> Result<()> {
    let classifier = Arc::new(EchoClassifier::new(FILTER_CODE));
    let runtime = Runtime::start(args, classifier)?;
    let cancel = runtime.cancel_token();

    let registry = Arc::new(SessionRegistry::new());
    let listen_transport = resolve_listen_transport(&runtime.args().socket, runtime.args().listen_udp)?;

    let session_config_factory = {
        let config = runtime.session_config();
        Arc::new(move || config.clone())
    };

    let acceptor_handle = tokio::spawn(acceptor::run(
        listen_transport,
        Arc::clone(&registry),
        session_config_factory,
        cancel.clone(),
    ));

    let monitor_handle = tokio::spawn({
        let counters = runtime.counters();
        let mon_socket = runtime.args().mon_socket.to_string_lossy().to_string();
        let cancel = cancel.clone();
        async move { monitor::run(&mon_socket, counters, cancel).await }
    });

    let next_filter_handle = runtime.next_filter().map(|connector| {
        tokio::spawn(async move {
            connector.run().await;
        })
    });

    runtime.wait_for_shutdown_signal().await?;

    let _ = acceptor_handle.await;
    let _ = monitor_handle.await;
    if let Some(handle) = next_filter_handle {
        let _ = handle.await;
    }

    registry.terminate_all();
    runtime.cleanup_pid_file();

    Ok(())
}

// SPDX-License-Identifier: AGPL-3.0-or-later

//! Component J: the runtime orchestrator (§4.J). Wires every component
//! together at startup and tears them down in order on shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use crate::{
    alert::AlertManager,
    cache::SharedCache,
    cfg::{cli::CliArgs, config::FilterConfigDocument},
    classifier::Classifier,
    counters::{Counters, FilterStatus},
    error::FatalError,
    next_filter::NextFilterConnector,
    pool::TaskPool,
    session::SessionConfig,
    task::TaskContext,
};

/// Owns every long-lived component for one filter process.
pub struct Runtime {
    args: CliArgs,
    counters: Arc<Counters>,
    task_ctx: Arc<TaskContext>,
    task_pool: Arc<TaskPool>,
    next_filter: Option<Arc<NextFilterConnector>>,
    cancel: CancellationToken,
}

impl Runtime {
    /// Startup (§4.J): write the PID file exclusively, build the cache,
    /// alert manager, classifier, thread pool, and next-filter connector.
    pub fn start(args: CliArgs, classifier: Arc<dyn Classifier>) -> Result<Self> {
        let counters = Arc::new(Counters::new());
        counters.set_status(FilterStatus::Configuring);

        write_pid_file_exclusively(&args.pid_file).map_err(|err| {
            if err.kind() == std::io::ErrorKind::AlreadyExists {
                anyhow::Error::from(FatalError::PidFileExists { path: args.pid_file.display().to_string() })
            } else {
                anyhow::Error::from(err).context(format!("writing pid file {:?}", args.pid_file))
            }
        })?;

        ignore_sigpipe();

        let config_doc = FilterConfigDocument::load_from_file(&args.config)
            .map_err(|err| anyhow::Error::from(FatalError::Configuration(err)))?;

        let alert_manager = Arc::new(AlertManager::configure(&args.name, &config_doc));
        let cache = Arc::new(SharedCache::new(args.cache_size));

        let task_ctx = Arc::new(TaskContext {
            classifier,
            cache,
            alert_manager,
            counters: Arc::clone(&counters),
            threshold: args.threshold,
        });

        let task_pool = Arc::new(TaskPool::new(args.nb_threads));

        let cancel = CancellationToken::new();
        let next_filter = if args.next_filter.is_none() {
            None
        } else {
            Some(Arc::new(NextFilterConnector::new(args.next_filter.clone(), cancel.clone())))
        };

        counters.set_status(FilterStatus::Running);

        Ok(Self { args, counters, task_ctx, task_pool, next_filter, cancel })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            task_ctx: Arc::clone(&self.task_ctx),
            task_pool: Arc::clone(&self.task_pool),
            next_filter: self.next_filter.clone(),
            output_type: self.args.output,
        }
    }

    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    pub fn next_filter(&self) -> Option<Arc<NextFilterConnector>> {
        self.next_filter.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Blocks until SIGINT, SIGTERM, or SIGQUIT arrives, then fires the
    /// cancellation token every long-lived task observes.
    pub async fn wait_for_shutdown_signal(&self) -> Result<()> {
        let mut sigint = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
        let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        let mut sigquit = signal(SignalKind::quit()).context("installing SIGQUIT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;

        loop {
            tokio::select! {
                _ = sigint.recv() => break,
                _ = sigterm.recv() => break,
                _ = sigquit.recv() => break,
                _ = sighup.recv() => {
                    self.task_ctx.alert_manager.rotate();
                }
            }
        }

        self.counters.set_status(FilterStatus::Stopping);
        self.cancel.cancel();
        Ok(())
    }

    /// Shutdown step 5 (§4.J): unlink the PID file. Socket unlinking is
    /// handled by each acceptor as it exits.
    pub fn cleanup_pid_file(&self) {
        let _ = std::fs::remove_file(&self.args.pid_file);
    }
}

fn write_pid_file_exclusively(path: &std::path::Path) -> std::io::Result<()> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    write!(file, "{}", std::process::id())?;
    Ok(())
}

fn ignore_sigpipe() {
    // SAFETY: SIG_IGN is a valid disposition for SIGPIPE; this affects the
    // whole process before any sockets are opened, per §6.4.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

/// Resolves the configured next-filter/listen endpoint into an
/// acceptor-friendly [`crate::acceptor::ListenTransport`]. Kept here since
/// it is only ever needed by `main`'s wiring.
pub fn resolve_listen_transport(
    socket: &str,
    listen_udp: bool,
) -> Result<crate::acceptor::ListenTransport> {
    if listen_udp {
        let addr = socket.parse().context("SOCKET must be ip:port when -u is set")?;
        Ok(crate::acceptor::ListenTransport::Udp(addr))
    } else if let Ok(addr) = socket.parse() {
        Ok(crate::acceptor::ListenTransport::Tcp(addr))
    } else {
        Ok(crate::acceptor::ListenTransport::Unix(socket.to_string()))
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transport-agnostic runtime embedded by every classification filter
//! instance: wire framing, the per-connection session state machine, the
//! task thread pool, the response cache, the next-filter connector, the
//! alert manager, and the monitoring socket. Individual classifiers are
//! external collaborators that implement [`classifier::Classifier`].

pub mod acceptor;
pub mod alert;
pub mod cache;
pub mod cfg;
pub mod classifier;
pub mod counters;
pub mod error;
pub mod monitor;
pub mod next_filter;
pub mod pool;
pub mod runtime;
pub mod session;
pub mod task;
pub mod wire;

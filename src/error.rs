// SPDX-License-Identifier: AGPL-3.0-or-later

//! Top-level error type for the orchestrator boundary (§7 `Fatal`). Every
//! component reports its own `thiserror` error; `anyhow::Context` carries
//! those up through `Runtime::start`, and this type is used only where the
//! caller needs to distinguish "fatal, exit 1" from everything else.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FatalError {
    #[error("pid file {path} already exists")]
    PidFileExists { path: String },

    #[error("configuration error: {0}")]
    Configuration(#[source] anyhow::Error),
}

// SPDX-License-Identifier: AGPL-3.0-or-later

//! Loading and validating the filter configuration JSON document (§6.2).
//!
//! Per spec, loading the raw JSON from disk is an external collaborator's
//! concern ("a pure function `path → config document`"); this module owns
//! only the parsing/validation of the common keys every filter shares, and
//! keeps anything else around as an opaque JSON map for the classifier.

use std::{collections::HashMap, fs, net::IpAddr, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The common configuration keys shared by every filter (§6.2), plus
/// whatever classifier-specific keys were present, preserved verbatim.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterConfigDocument {
    #[serde(default)]
    pub redis_socket_path: Option<String>,
    #[serde(default)]
    pub redis_ip: Option<IpAddr>,
    #[serde(default)]
    pub redis_port: Option<u16>,
    #[serde(default)]
    pub redis_list_name: Option<String>,
    #[serde(default)]
    pub redis_channel_name: Option<String>,
    #[serde(default)]
    pub log_file_path: Option<String>,
    #[serde(default)]
    pub alert_tags: Option<Vec<String>>,

    /// Anything else in the document — classifier-specific keys the runtime
    /// does not interpret.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl FilterConfigDocument {
    /// Loads and parses the configuration JSON from `path`. Unknown keys are
    /// retained in `extra` and never rejected.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        let doc: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config JSON {path:?}"))?;

        if doc.redis_ip.is_some() && doc.redis_socket_path.is_some() {
            tracing::warn!(
                "config specifies both redis_ip and redis_socket_path; \
                 redis_socket_path takes precedence"
            );
        }

        Ok(doc)
    }

    /// Whether at least one alert broker sink was configured.
    pub fn has_broker(&self) -> bool {
        self.redis_socket_path.is_some() || (self.redis_ip.is_some() && self.redis_port.is_some())
    }

    pub fn has_file_sink(&self) -> bool {
        self.log_file_path.is_some()
    }
}

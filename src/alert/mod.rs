// SPDX-License-Identifier: AGPL-3.0-or-later

//! Component C: the alert manager (§4.C). A process-wide singleton,
//! constructed once at startup and handed to every Session/Task by shared
//! reference (§9 "prefer one constructed-at-startup instance ... avoid
//! late static initialisation").

mod broker;
mod file_sink;

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::cfg::config::FilterConfigDocument;

pub use broker::BrokerSink;
pub use file_sink::FileSink;

/// Number of times a failing sink write is retried, after reopening,
/// before the record is dropped for that sink (§4.C default `RETRY = 1`).
pub const RETRY: u32 = 1;

/// `{evt_id, time, filter, rule_name, tags, entry, score, details?}` (§3.5).
/// The alert manager never mutates classifier-supplied fields other than to
/// frame them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub evt_id: Uuid,
    pub time: String,
    pub filter: String,
    pub rule_name: String,
    pub tags: Vec<String>,
    pub entry: String,
    pub score: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Process-wide alert fan-out across the configured sinks. Constructed once
/// at startup; every Session/Task holds a shared reference.
pub struct AlertManager {
    filter_name: String,
    default_tags: Vec<String>,
    file_sink: Option<Mutex<FileSink>>,
    broker_sink: Option<BrokerSink>,
}

impl AlertManager {
    /// Builds the manager from the common configuration keys (§6.2). Per
    /// §4.C, at least one sink must be configured; a configuration with
    /// neither is accepted (alerts are then silently dropped) but logs a
    /// warning, matching the "configuration returns a warning" contract.
    pub fn configure(filter_name: &str, config: &FilterConfigDocument) -> Self {
        let file_sink = config
            .log_file_path
            .as_deref()
            .map(FileSink::open)
            .transpose()
            .unwrap_or_else(|err| {
                tracing::error!(%err, "failed to open alert file sink");
                None
            })
            .map(Mutex::new);

        let broker_sink = BrokerSink::from_config(config);

        if file_sink.is_none() && broker_sink.is_none() {
            tracing::warn!("alert manager configured with no sinks; alerts will be dropped");
        }

        Self {
            filter_name: filter_name.to_string(),
            default_tags: config.alert_tags.clone().unwrap_or_default(),
            file_sink,
            broker_sink,
        }
    }

    /// Builds a manager with no sinks at all, for tests and for filters
    /// that run with alerting disabled.
    pub fn disabled(filter_name: &str) -> Self {
        Self {
            filter_name: filter_name.to_string(),
            default_tags: Vec::new(),
            file_sink: None,
            broker_sink: None,
        }
    }

    /// Formats and fans out one alert record. Tags and rule name default to
    /// the values set at configuration time when not supplied.
    pub fn alert(
        &self,
        rule_name: &str,
        entry: &str,
        score: u16,
        evt_id: Uuid,
        details: Option<Value>,
        tags: Option<Vec<String>>,
    ) {
        let record = AlertRecord {
            evt_id,
            time: chrono::Utc::now().to_rfc3339(),
            filter: self.filter_name.clone(),
            rule_name: rule_name.to_string(),
            tags: tags.unwrap_or_else(|| self.default_tags.clone()),
            entry: entry.to_string(),
            score,
            details,
        };

        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(%err, "failed to serialise alert record");
                return;
            },
        };

        if let Some(sink) = &self.file_sink {
            let mut guard = sink.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(err) = guard.write_with_retry(&line, RETRY) {
                tracing::error!(%err, "alert file sink dropped a record");
            }
        }

        if let Some(sink) = &self.broker_sink {
            if let Err(err) = sink.publish(&line) {
                tracing::error!(%err, "alert broker sink dropped a record");
            }
        }
    }

    /// Closes and reopens the file sink. Used by the SIGHUP handler.
    pub fn rotate(&self) {
        if let Some(sink) = &self.file_sink {
            let mut guard = sink.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(err) = guard.reopen() {
                tracing::error!(%err, "failed to rotate alert file sink");
            }
        }
    }

    pub fn has_file_sink(&self) -> bool {
        self.file_sink.is_some()
    }

    pub fn has_broker_sink(&self) -> bool {
        self.broker_sink.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_manager_has_no_sinks() {
        let manager = AlertManager::disabled("test-filter");
        assert!(!manager.has_file_sink());
        assert!(!manager.has_broker_sink());
        // Must not panic even with nothing configured.
        manager.alert("rule", "entry", 90, Uuid::new_v4(), None, None);
    }

    #[test]
    fn configure_with_file_sink_only() {
        let dir = tempfile::tempdir().expect("tempdir creation");
        let path = dir.path().join("alerts.log");
        let config = FilterConfigDocument {
            log_file_path: Some(path.to_string_lossy().to_string()),
            ..Default::default()
        };
        let manager = AlertManager::configure("test-filter", &config);
        assert!(manager.has_file_sink());
        assert!(!manager.has_broker_sink());

        manager.alert("rule", "entry", 90, Uuid::new_v4(), None, None);

        let contents = std::fs::read_to_string(&path).expect("reading alert log");
        assert!(contents.contains("\"rule_name\":\"rule\""));
    }
}

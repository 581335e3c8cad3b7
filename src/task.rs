// SPDX-License-Identifier: AGPL-3.0-or-later

//! Component §3.3: the single-frame classification work unit. Borrows the
//! shared classifier, cache, alert manager, and counters; runs once on a
//! worker thread and produces certitudes plus any alerts raised.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::{
    alert::AlertManager,
    cache::SharedCache,
    classifier::{Classifier, ERROR_RETURN},
    counters::Counters,
};

/// Everything a Task needs, shared across every Task a filter runs.
pub struct TaskContext {
    pub classifier: Arc<dyn Classifier>,
    pub cache: Arc<SharedCache>,
    pub alert_manager: Arc<AlertManager>,
    pub counters: Arc<Counters>,
    /// 0-100 alert threshold; certitudes at or above this raise an alert
    /// in addition to whatever the classifier itself requested.
    pub threshold: u8,
}

/// Outcome of classifying one request body.
pub struct TaskResult {
    pub certitudes: Vec<u16>,
    /// One newline-ready JSON alert record per alert raised this task, for
    /// Sessions forwarding with `output_type = log` (§4.F).
    pub log_lines: Vec<String>,
}

/// Runs classification over every entry in `entries` (already parsed from
/// the request body's outer JSON array), or produces the single-entry
/// default when the request was an empty control frame (§8 boundary
/// behaviour). `body` is the raw, unparsed request body bytes, passed
/// through to the classifier's default cache keying (§4.B).
pub fn execute(ctx: &TaskContext, event_id: Uuid, body: &[u8], entries: &[Value]) -> TaskResult {
    if entries.is_empty() {
        return TaskResult { certitudes: vec![ctx.classifier.default_certitude()], log_lines: Vec::new() };
    }

    let mut certitudes = Vec::with_capacity(entries.len());
    let mut log_lines = Vec::new();
    for entry in entries {
        ctx.counters.entry_received();
        let certitude = classify_one(ctx, event_id, body, entry, &mut log_lines);
        if certitude >= ctx.threshold as u16 {
            ctx.counters.matched();
        }
        certitudes.push(certitude);
    }

    TaskResult { certitudes, log_lines }
}

fn classify_one(ctx: &TaskContext, event_id: Uuid, body: &[u8], entry: &Value, log_lines: &mut Vec<String>) -> u16 {
    let hash = ctx.classifier.hash_key(body);

    if let Some(cached) = ctx.cache.get(hash) {
        return cached;
    }

    let verdict = ctx.classifier.classify(entry);

    if verdict.certitude != ERROR_RETURN {
        ctx.cache.insert(hash, verdict.certitude);
    }

    if let Some(alert) = verdict.alert {
        let record = serde_json::json!({
            "evt_id": event_id,
            "rule_name": alert.rule_name,
            "entry": alert.entry,
            "tags": alert.tags.clone(),
            "details": alert.details.clone(),
            "score": verdict.certitude,
        });
        log_lines.push(record.to_string());

        ctx.alert_manager.alert(
            &alert.rule_name,
            &alert.entry,
            verdict.certitude,
            event_id,
            alert.details,
            alert.tags,
        );
    }

    verdict.certitude
}

// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-wide structured logger, initialised once at startup from the
//! CLI's NAME (used as the root span's target prefix) and `-l LEVEL`.

use std::{fmt::Debug, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::{Event, Subscriber};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FmtContext, FormatEvent, FormatFields, format::Writer},
    layer::SubscriberExt,
    registry::LookupSpan,
};

use crate::cfg::enums::LogLevel;

#[derive(Serialize)]
struct LogEntry<'a> {
    timestamp: String,
    level: String,
    filter: &'a str,
    target: &'a str,
    fields: serde_json::Map<String, serde_json::Value>,
}

struct JsonFormatter {
    filter_name: String,
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let _ = ctx;

        let entry = LogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: event.metadata().level().to_string(),
            filter: &self.filter_name,
            target: event.metadata().target(),
            fields: visitor.fields,
        };

        writeln!(
            writer,
            "{}",
            serde_json::to_string(&entry).map_err(|_| std::fmt::Error)?
        )
    }
}

#[derive(Default)]
struct JsonVisitor {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn Debug) {
        self.fields
            .insert(field.name().to_string(), json!(format!("{:?}", value)));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.fields.insert(field.name().to_string(), json!(value));
    }
}

/// Initialises the global tracing subscriber. `filter_name` is the CLI's
/// NAME argument, carried on every log entry. `level` maps DEVELOPER to
/// DEBUG plus ANSI-friendly stdout output; any other level logs structured
/// JSON to stdout (daemonised filters redirect stdout to their own log
/// management).
///
/// Returns a `WorkerGuard` that must be kept alive for the duration of the
/// process — dropping it flushes and stops the non-blocking writer.
pub fn init_logger(filter_name: &str, level: LogLevel) -> Result<WorkerGuard> {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_tracing_level().to_string()));

    if level.is_developer() {
        let subscriber = Registry::default().with(env_filter).with(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(true),
        );
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to set global default subscriber")?;
    } else {
        let subscriber = Registry::default().with(env_filter).with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .event_format(JsonFormatter {
                    filter_name: filter_name.to_string(),
                }),
        );
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to set global default subscriber")?;
    }

    Ok(guard)
}

/// Builds a rotating file appender for use outside the tracing subscriber
/// (the alert manager's file sink uses this directly rather than going
/// through `tracing`, since alert records are a distinct on-disk format).
pub fn rolling_file_appender(path: &Path) -> Result<rolling::RollingFileAppender> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .context("log_file_path must name a file")?;
    Ok(rolling::RollingFileAppender::new(
        rolling::Rotation::NEVER,
        dir,
        file_name,
    ))
}

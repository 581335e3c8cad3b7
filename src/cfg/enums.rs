// SPDX-License-Identifier: AGPL-3.0-or-later

use core::fmt;
use std::{net::SocketAddr, str::FromStr};

use serde::{Deserialize, Serialize};

/// What a Session does with the response body before it is handed to the
/// Next-filter connector.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// Untouched request body.
    #[default]
    Raw,
    /// JSON-re-serialised parsed body (canonical form).
    Parsed,
    /// Current log buffer, one newline-terminated JSON alert record per line.
    Log,
    /// Empty body.
    None,
}

impl FromStr for OutputType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "parsed" => Ok(Self::Parsed),
            "log" => Ok(Self::Log),
            "none" => Ok(Self::None),
            other => Err(anyhow::anyhow!("unknown output type '{other}'")),
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Parsed => "parsed",
            Self::Log => "log",
            Self::None => "none",
        })
    }
}

/// Logger verbosity, ordered the way the CLI `-l` flag accepts it.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    /// Implies `Debug` and disables daemonisation.
    Developer,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Warning
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "NOTICE" => Ok(Self::Notice),
            "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            "DEVELOPER" => Ok(Self::Developer),
            other => Err(anyhow::anyhow!("unknown log level '{other}'")),
        }
    }
}

impl LogLevel {
    /// Whether this level implies running in the foreground (no daemonise).
    pub fn is_developer(self) -> bool {
        matches!(self, Self::Developer)
    }

    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            Self::Debug | Self::Developer => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Notice | Self::Warning => tracing::Level::WARN,
            Self::Error | Self::Critical => tracing::Level::ERROR,
        }
    }
}

/// A destination that is either absent, a Unix domain socket path, a TCP
/// endpoint, or a UDP endpoint. Used for the Next-filter target, per the
/// original source's "either (a unix path) or (a (ip,port) pair) or 'no'"
/// pattern — mixed/partial specifications are rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    None,
    Unix(String),
    Tcp(SocketAddr),
    Udp(SocketAddr),
}

impl Endpoint {
    /// Parses a NEXT_FILTER-shaped argument: `"no"`, a filesystem path, or an
    /// `ip:port` pair. `is_udp` selects whether an `ip:port` parse produces a
    /// `Tcp` or `Udp` variant.
    pub fn parse(raw: &str, is_udp: bool) -> anyhow::Result<Self> {
        if raw == "no" {
            return Ok(Self::None);
        }
        if let Ok(addr) = raw.parse::<SocketAddr>() {
            return Ok(if is_udp { Self::Udp(addr) } else { Self::Tcp(addr) });
        }
        Ok(Self::Unix(raw.to_string()))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("no"),
            Self::Unix(path) => f.write_str(path),
            Self::Tcp(addr) => write!(f, "{addr}"),
            Self::Udp(addr) => write!(f, "{addr}"),
        }
    }
}

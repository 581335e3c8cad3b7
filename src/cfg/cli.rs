// SPDX-License-Identifier: AGPL-3.0-or-later

//! Parses the filter binary's positional-plus-flags command line:
//!
//! ```text
//! <filter-binary> NAME SOCKET CONFIG MON_SOCKET PID_FILE OUTPUT NEXT_FILTER \
//!     NB_THREADS CACHE_SIZE THRESHOLD [-l LEVEL] [-u] [-v] [-h]
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, bail, ensure};

use crate::cfg::enums::{Endpoint, LogLevel, OutputType};

pub const DEFAULT_THRESHOLD: u8 = 80;

#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Logger prefix for this filter.
    pub name: String,
    /// Socket (or `ip:port`) to listen on.
    pub socket: String,
    /// Path to the JSON filter configuration.
    pub config: PathBuf,
    /// Path to the monitor Unix socket.
    pub mon_socket: PathBuf,
    /// Path to the PID file written exclusively on startup.
    pub pid_file: PathBuf,
    /// How the response body is transformed before forwarding.
    pub output: OutputType,
    /// Downstream filter target.
    pub next_filter: Endpoint,
    /// Worker pool size.
    pub nb_threads: usize,
    /// LRU cache capacity (`0` disables the cache).
    pub cache_size: usize,
    /// Alert threshold, already normalised (>100 becomes `DEFAULT_THRESHOLD`).
    pub threshold: u8,
    /// Logger verbosity.
    pub log_level: LogLevel,
    /// Listen transport is UDP.
    pub listen_udp: bool,
    /// Next-filter transport is UDP.
    pub next_filter_udp: bool,
}

const USAGE: &str = "\
<filter-binary> NAME SOCKET CONFIG MON_SOCKET PID_FILE OUTPUT NEXT_FILTER \
NB_THREADS CACHE_SIZE THRESHOLD [-l LEVEL] [-u] [-v] [-h]";

/// Parses the raw process argument vector (excluding argv[0]).
pub fn parse_args<I, S>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut positionals = Vec::with_capacity(10);
    let mut log_level = LogLevel::default();
    let mut listen_udp = false;
    let mut next_filter_udp = false;

    let mut it = args.into_iter();
    while let Some(raw) = it.next() {
        let arg = raw.as_ref();
        match arg {
            "-h" => bail!("usage: {USAGE}"),
            "-u" => listen_udp = true,
            "-v" => next_filter_udp = true,
            "-l" => {
                let level = it
                    .next()
                    .context("-l requires a LEVEL argument")?;
                log_level = level.as_ref().parse()?;
            },
            other if other.starts_with("-l") && other.len() > 2 => {
                log_level = other[2..].parse()?;
            },
            other => positionals.push(other.to_string()),
        }
    }

    ensure!(
        positionals.len() == 10,
        "expected 10 positional arguments, got {}\nusage: {USAGE}",
        positionals.len()
    );

    let mut p = positionals.into_iter();
    let name = p.next().context("missing NAME")?;
    let socket = p.next().context("missing SOCKET")?;
    let config = PathBuf::from(p.next().context("missing CONFIG")?);
    let mon_socket = PathBuf::from(p.next().context("missing MON_SOCKET")?);
    let pid_file = PathBuf::from(p.next().context("missing PID_FILE")?);
    let output: OutputType = p.next().context("missing OUTPUT")?.parse()?;
    let next_filter_raw = p.next().context("missing NEXT_FILTER")?;
    let nb_threads: usize = p
        .next()
        .context("missing NB_THREADS")?
        .parse()
        .context("NB_THREADS must be a positive integer")?;
    let cache_size: usize = p
        .next()
        .context("missing CACHE_SIZE")?
        .parse()
        .context("CACHE_SIZE must be a non-negative integer")?;
    let threshold_raw: u16 = p
        .next()
        .context("missing THRESHOLD")?
        .parse()
        .context("THRESHOLD must be an integer")?;

    ensure!(nb_threads > 0, "NB_THREADS must be >= 1");

    let threshold = if threshold_raw > 100 {
        DEFAULT_THRESHOLD
    } else {
        threshold_raw as u8
    };

    let next_filter = Endpoint::parse(&next_filter_raw, next_filter_udp)?;

    Ok(CliArgs {
        name,
        socket,
        config,
        mon_socket,
        pid_file,
        output,
        next_filter,
        nb_threads,
        cache_size,
        threshold,
        log_level,
        listen_udp,
        next_filter_udp,
    })
}

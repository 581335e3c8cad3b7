// SPDX-License-Identifier: AGPL-3.0-or-later

//! Component I: process-global atomic counters and the filter status state
//! machine (§4.I). All increments are relaxed; nothing here ever blocks.

use std::{
    fmt,
    sync::atomic::{AtomicU64, AtomicU8, Ordering},
};

/// `filter_status ∈ {Starting, Configuring, Running, Stopping}`, monotonic,
/// no reversals (§3.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum FilterStatus {
    Starting = 0,
    Configuring = 1,
    Running = 2,
    Stopping = 3,
}

impl FilterStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Starting,
            1 => Self::Configuring,
            2 => Self::Running,
            _ => Self::Stopping,
        }
    }
}

impl fmt::Display for FilterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Starting => "starting",
            Self::Configuring => "configuring",
            Self::Running => "running",
            Self::Stopping => "stopping",
        })
    }
}

/// Process-global atomic counters, shared by the classification path and
/// the read-only Monitor.
#[derive(Debug)]
pub struct Counters {
    status: AtomicU8,
    clients_num: AtomicU64,
    received: AtomicU64,
    parse_error: AtomicU64,
    match_count: AtomicU64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            status: AtomicU8::new(FilterStatus::Starting as u8),
            clients_num: AtomicU64::new(0),
            received: AtomicU64::new(0),
            parse_error: AtomicU64::new(0),
            match_count: AtomicU64::new(0),
        }
    }
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> FilterStatus {
        FilterStatus::from_u8(self.status.load(Ordering::Relaxed))
    }

    /// Advances `filter_status`. Panics in debug builds if called with a
    /// status that would move backwards; this is a programmer error, not a
    /// runtime condition, so the check is a debug assertion only.
    pub fn set_status(&self, status: FilterStatus) {
        debug_assert!(
            status as u8 >= self.status.load(Ordering::Relaxed),
            "filter_status must not move backwards"
        );
        self.status.store(status as u8, Ordering::Relaxed);
    }

    pub fn client_connected(&self) {
        self.clients_num.fetch_add(1, Ordering::Relaxed);
    }

    pub fn client_disconnected(&self) {
        self.clients_num.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn clients_num(&self) -> u64 {
        self.clients_num.load(Ordering::Relaxed)
    }

    pub fn entry_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn parse_error(&self) {
        self.parse_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn parse_error_count(&self) -> u64 {
        self.parse_error.load(Ordering::Relaxed)
    }

    pub fn matched(&self) {
        self.match_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn match_count(&self) -> u64 {
        self.match_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_starts_at_starting() {
        let counters = Counters::new();
        assert_eq!(counters.status(), FilterStatus::Starting);
    }

    #[test]
    fn status_advances_monotonically() {
        let counters = Counters::new();
        counters.set_status(FilterStatus::Configuring);
        counters.set_status(FilterStatus::Running);
        counters.set_status(FilterStatus::Stopping);
        assert_eq!(counters.status(), FilterStatus::Stopping);
    }

    #[test]
    fn client_counter_tracks_connect_disconnect() {
        let counters = Counters::new();
        counters.client_connected();
        counters.client_connected();
        counters.client_disconnected();
        assert_eq!(counters.clients_num(), 1);
    }

    #[test]
    fn received_and_match_count_increment() {
        let counters = Counters::new();
        counters.entry_received();
        counters.entry_received();
        counters.matched();
        assert_eq!(counters.received(), 2);
        assert_eq!(counters.match_count(), 1);
    }
}

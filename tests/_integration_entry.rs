// SPDX-License-Identifier: AGPL-3.0-or-later
#![allow(clippy::all)]

mod integration_tests {
    pub mod cache_hit_path;
    pub mod common;
    pub mod downstream_outage_recovery;
    pub mod empty_control_frame;
    pub mod forward_and_reply;
    pub mod graceful_shutdown;
    pub mod monitor_under_load;
}

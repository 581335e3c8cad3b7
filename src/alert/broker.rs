// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Mutex;

use redis::{Client, Commands, Connection};
use thiserror::Error;

use crate::cfg::config::FilterConfigDocument;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("redis connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("broker sink has no reachable connection")]
    Disconnected,
}

/// The broker half of the alert manager: a Redis connection used to
/// `RPUSH` onto a list and/or `PUBLISH` onto a channel, whichever was
/// configured. Reuses the client's own internal synchronisation (§5:
/// "broker sink uses the broker client's own thread-safety").
pub struct BrokerSink {
    conn: Mutex<Connection>,
    list_name: Option<String>,
    channel_name: Option<String>,
}

impl BrokerSink {
    /// Builds a sink from the common configuration keys, if at least a
    /// socket path or an (ip, port) pair is present. Returns `None`
    /// otherwise, or if the initial connection attempt fails (logged, not
    /// fatal — the file sink may still carry alerts).
    pub fn from_config(config: &FilterConfigDocument) -> Option<Self> {
        let addr = if let Some(path) = &config.redis_socket_path {
            format!("redis+unix:///{path}")
        } else if let (Some(ip), Some(port)) = (config.redis_ip, config.redis_port) {
            format!("redis://{ip}:{port}")
        } else {
            return None;
        };

        if config.redis_list_name.is_none() && config.redis_channel_name.is_none() {
            tracing::warn!("broker address configured without a list or channel name");
        }

        match Client::open(addr).and_then(|client| client.get_connection()) {
            Ok(conn) => Some(Self {
                conn: Mutex::new(conn),
                list_name: config.redis_list_name.clone(),
                channel_name: config.redis_channel_name.clone(),
            }),
            Err(err) => {
                tracing::error!(%err, "failed to connect to alert broker");
                None
            },
        }
    }

    pub fn publish(&self, line: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.lock().map_err(|_| BrokerError::Disconnected)?;

        if let Some(list) = &self.list_name {
            conn.rpush::<_, _, ()>(list, line)?;
        }
        if let Some(channel) = &self.channel_name {
            conn.publish::<_, _, ()>(channel, line)?;
        }
        Ok(())
    }
}

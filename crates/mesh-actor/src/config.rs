//! Socket actor configuration, per `spec.md` §6.3.

use mesh_time::Duration;
use serde::{Deserialize, Serialize};

/// Tunables for the reconnect driver (C4) and heartbeat timer (C3), plus the
/// compile-time receive-buffer sizing also exposed here so one config struct
/// covers everything a caller can adjust.
///
/// Deserialises duration fields as either a plain integer (nanoseconds) or a
/// humantime string, following [`mesh_time::Duration`]'s `Deserialize` impl.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Delay between initial-phase connect attempts.
    pub init_reconn_period: Duration,
    /// Count of initial attempts before reporting failure to the originator.
    pub init_reconn_try: u32,
    /// Delay between steady-state reconnect attempts.
    pub reconn_period: Duration,
    /// Count of steady-state attempts between `NET_ERR` events.
    pub reconn_try: u32,
    /// Heartbeat tick interval.
    pub heartbeat_period: Duration,
    /// Missed-tick threshold before treating the peer as dead.
    pub heartbeat_count: u32,
    /// Receive buffer capacity.
    pub recv_cache_size: usize,
    /// Per-frame limit / compaction threshold.
    pub recv_max_size: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            init_reconn_period: Duration::from_secs(1),
            init_reconn_try: 3,
            reconn_period: Duration::from_secs(5),
            reconn_try: 3,
            heartbeat_period: Duration::from_secs(5),
            heartbeat_count: 3,
            recv_cache_size: 65535,
            recv_max_size: 60000,
        }
    }
}

impl SocketConfig {
    /// `MAX_MSG_SIZE` from `spec.md` §3: the per-frame payload bound, sized
    /// so one partial frame always fits in the tail region after compaction.
    pub fn max_msg_size(&self) -> usize {
        self.recv_cache_size - self.recv_max_size
    }
}

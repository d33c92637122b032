//! Plain-data configuration carried by the dispatch core. Loading these
//! values from a file, CLI flags, or environment is out of scope here; a
//! caller builds a `Config` and wraps it in an `Arc` the same way the
//! teacher crate's `RaftConfig` is built once and shared read-only across
//! every follower task.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of each follower's bounded queue.
    pub min_logs_in_memory: usize,

    /// Selects the transport path: `true` for fire-and-forget async RPCs,
    /// `false` for the synchronous client-pool path.
    pub use_async_server: bool,

    /// Gates emission of the `LOG_IN_QUEUE` / `FROM_CREATE_TO_END` timing
    /// samples. Disabled by default since computing elapsed nanoseconds on
    /// every entry is wasted work on a quiet cluster.
    pub enable_instrumenting: bool,

    /// Bound on the synchronous path's `wait_for_prev_log` call.
    pub wait_for_prev_log_timeout: Duration,

    /// Heartbeat cadence used by the surrounding Raft member; carried here
    /// only so a single `Config` covers everything a follower task reads.
    pub heartbeat_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_logs_in_memory: 256,
            use_async_server: true,
            enable_instrumenting: false,
            wait_for_prev_log_timeout: Duration::from_millis(1_000),
            heartbeat_interval: Duration::from_millis(150),
        }
    }
}

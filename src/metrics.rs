//! Timing sample emission, gated by `Config::enable_instrumenting`. Grounded
//! on the teacher crate's `ReplicationMetrics` plus its pervasive
//! `#[tracing::instrument]`/`tracing::debug!` usage: rather than a separate
//! metrics-collection dependency, this crate emits named `tracing` events
//! and leaves aggregation to whatever subscriber the binary installs.

use tracing::trace;

/// Elapsed nanoseconds between entry creation and the moment it was pulled
/// off a follower's queue, emitted on the single-entry path only (the
/// batched path's entries span a range rather than one instant).
pub fn record_log_in_queue(enabled: bool, follower: u64, log_index: u64, create_time_nanos: u64, now_nanos: u64) {
    if !enabled {
        return;
    }
    let elapsed = now_nanos.saturating_sub(create_time_nanos);
    trace!(sample = "LOG_IN_QUEUE", follower, log_index, elapsed_nanos = elapsed);
}

/// Elapsed nanoseconds between entry creation and the end of this worker's
/// dispatch attempt (success or failure both count -- this measures
/// latency through the dispatch core, not replication success).
pub fn record_from_create_to_end(enabled: bool, follower: u64, log_index: u64, create_time_nanos: u64, now_nanos: u64) {
    if !enabled {
        return;
    }
    let elapsed = now_nanos.saturating_sub(create_time_nanos);
    trace!(sample = "FROM_CREATE_TO_END", follower, log_index, elapsed_nanos = elapsed);
}

/// Monotonic nanosecond clock used throughout this crate for timestamping.
/// A thin wrapper over `std::time::Instant` anchored at process start, kept
/// in one place so tests can reason about it without reaching into
/// `std::time` directly everywhere.
pub fn now_nanos() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

//! The log entry type is opaque to this crate: it only needs an index, a
//! term, a creation timestamp for latency telemetry, and a way to produce
//! its wire bytes. A consumer's own log entry type implements this trait;
//! the dispatch core never constructs or inspects an entry beyond it.

use bytes::Bytes;

pub trait RaftLogEntry: Send + Sync + 'static {
    /// Monotonically increasing index of this entry within the log.
    fn index(&self) -> u64;

    /// Term in which this entry was created.
    fn term(&self) -> u64;

    /// Monotonic creation timestamp in nanoseconds, used only for the
    /// `LOG_IN_QUEUE` timing sample.
    fn create_time_nanos(&self) -> u64;

    /// Produce the entry's wire representation. Expected to be pure and
    /// deterministic: this crate may call it more than once for the same
    /// entry under concurrent fan-out and relies on repeated calls
    /// producing identical bytes (see `SendRequest::ensure_serialized`).
    fn serialize(&self) -> Bytes;
}

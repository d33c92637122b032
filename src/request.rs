//! `SendRequest`: the one data type that crosses from producer to every
//! follower's queue. A single instance is shared -- via `Arc` -- across up
//! to F queues at once (`SPEC_FULL.md` §3), so every field that more than
//! one follower's worker can touch concurrently is either atomic or
//! memoized exactly once.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;

use crate::collaborators::PreparedAppendEntry;
use crate::entry::RaftLogEntry;

pub struct SendRequest<L: RaftLogEntry> {
    pub log: Arc<L>,
    pub vote_counter: Arc<AtomicI64>,
    pub leadership_stale: Arc<AtomicBool>,
    pub new_leader_term: Arc<AtomicU64>,
    pub append_entry_request: PreparedAppendEntry,

    /// Last-write-wins across every successful enqueue of this shared
    /// object -- see `SPEC_FULL.md` §4.1's note on `enqueue_time`
    /// semantics. Coarse telemetry only, never a per-follower value.
    enqueue_time_nanos: AtomicU64,

    /// Memoized serialized entry bytes. More than one follower worker may
    /// race to dequeue this same shared request and call
    /// `ensure_serialized`; `log.serialize()` is pure, so the race is
    /// harmless, but this cell still guarantees the work happens once and
    /// every racer observes the same bytes (`SPEC_FULL.md` §3 invariant 5,
    /// §9 resolution).
    serialized: OnceLock<Bytes>,
}

impl<L: RaftLogEntry> SendRequest<L> {
    pub fn new(
        log: Arc<L>,
        vote_counter: Arc<AtomicI64>,
        leadership_stale: Arc<AtomicBool>,
        new_leader_term: Arc<AtomicU64>,
        append_entry_request: PreparedAppendEntry,
    ) -> Self {
        Self {
            log,
            vote_counter,
            leadership_stale,
            new_leader_term,
            append_entry_request,
            enqueue_time_nanos: AtomicU64::new(0),
            serialized: OnceLock::new(),
        }
    }

    /// Stamps `enqueue_time` with `now_nanos`. Called once per successful
    /// `offer` insert, so the final value is whichever follower's insert
    /// happened to land last.
    pub(crate) fn mark_enqueued(&self, now_nanos: u64) {
        self.enqueue_time_nanos.store(now_nanos, Ordering::Relaxed);
    }

    pub fn enqueue_time_nanos(&self) -> u64 {
        self.enqueue_time_nanos.load(Ordering::Relaxed)
    }

    /// Returns the entry's serialized bytes, computing them on first call
    /// and caching thereafter regardless of which follower worker calls
    /// first.
    pub fn ensure_serialized(&self) -> Bytes {
        self.serialized.get_or_init(|| self.log.serialize()).clone()
    }

    /// `append_entry_request` with its `entry` field filled in from the
    /// serialization memo. This is the payload the single-entry fast path
    /// hands to `RaftMember::send_log_to_follower` (`SPEC_FULL.md` §4.2
    /// step 2 / §4.2.1) -- `append_entry_request.entry` itself is never
    /// mutated in place since `SendRequest` is shared read-only across every
    /// follower's queue.
    pub fn prepared_append_entry(&self) -> PreparedAppendEntry {
        PreparedAppendEntry {
            prev_log_term: self.append_entry_request.prev_log_term,
            entry: self.ensure_serialized(),
        }
    }
}

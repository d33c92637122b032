//! Shared test fixtures, grounded on the teacher crate's own
//! `tests/fixtures/mod.rs`: a tracing-init helper plus small builders around
//! the in-crate mock `RaftMember`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use raft_dispatch::testing::{InMemoryLogEntry, MockRaftMember};
use raft_dispatch::{Config, PreparedAppendEntry, SendRequest};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64};
use tracing_subscriber::prelude::*;

/// Initialize the tracing system. Safe to call more than once across test
/// binaries; `set_global_default` failing because a subscriber is already
/// installed is not itself a test failure.
pub fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::Layer::default().with_ansi(false);
    let subscriber = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(fmt_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Builds a `SendRequest` for a fresh entry at `index`, with its own
/// independent vote-counting cells (the common case: one entry, its own
/// quorum state).
pub fn send_request(index: u64, term: u64) -> Arc<SendRequest<InMemoryLogEntry>> {
    Arc::new(SendRequest::new(
        Arc::new(InMemoryLogEntry::new(index, term)),
        Arc::new(AtomicI64::new(0)),
        Arc::new(AtomicBool::new(false)),
        Arc::new(AtomicU64::new(0)),
        PreparedAppendEntry::new(term),
    ))
}

/// A `send_request` whose `vote_counter` is shared with the caller, so a
/// test can observe how many followers voted yes for this one entry.
pub fn send_request_with_votes(
    index: u64,
    term: u64,
    vote_counter: Arc<AtomicI64>,
) -> Arc<SendRequest<InMemoryLogEntry>> {
    Arc::new(SendRequest::new(
        Arc::new(InMemoryLogEntry::new(index, term)),
        vote_counter,
        Arc::new(AtomicBool::new(false)),
        Arc::new(AtomicU64::new(0)),
        PreparedAppendEntry::new(term),
    ))
}

pub fn small_queue_config(capacity: usize, use_async_server: bool) -> Arc<Config> {
    Arc::new(Config {
        min_logs_in_memory: capacity,
        use_async_server,
        enable_instrumenting: false,
        wait_for_prev_log_timeout: Duration::from_millis(200),
        heartbeat_interval: Duration::from_millis(50),
    })
}

/// Accepts anything iterable over follower ids -- in particular a
/// `maplit::btreeset!{...}` literal at the call site, the same way the
/// teacher crate's own tests spell out cluster membership as a `btreeset!`
/// rather than a `Vec`.
pub fn member(this_node: u64, peers: impl IntoIterator<Item = u64>, term: u64) -> Arc<MockRaftMember> {
    Arc::new(MockRaftMember::new(this_node, peers.into_iter().collect(), term))
}

/// Polls `cond` until it returns `true` or `timeout` elapses, yielding the
/// runtime between polls so spawned worker tasks get a chance to run. Used
/// in place of a fixed sleep because how many poll ticks a worker needs to
/// drain and dispatch a batch is not itself part of the contract under test.
pub async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition did not become true within {:?}", timeout);
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

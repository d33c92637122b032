//! The boundary this crate consumes. Everything in this module is supplied
//! by "the surrounding Raft member" -- the full Raft state machine, its log
//! manager, its peer table, its transport clients -- none of which this
//! crate reimplements. Types here mirror the shapes the teacher crate's own
//! `raft.rs` and `storage.rs` expose (`AppendEntriesRequest`, a member
//! handle owning term/commit-index/peer lookups), generalized to the
//! dispatch core's narrower needs.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::entry::RaftLogEntry;

/// Cluster node identity. The teacher crate uses a bare `u64`; this crate
/// keeps the same convention since node identity here never needs more than
/// an opaque, `Copy`, totally-ordered key.
pub type NodeId = u64;

/// Opaque request header carried by `AppendEntries`, analogous to the
/// teacher crate's `RaftMsg` envelope metadata. Left as a byte blob because
/// its shape belongs to the surrounding cluster protocol, not this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header(pub Bytes);

/// Per-follower replication state external to this crate: match/next index.
/// Looked up (and lazily created) through `RaftMember::peer`.
#[derive(Debug)]
pub struct Peer {
    pub node: NodeId,
    pub match_index: AtomicU64,
    pub next_index: AtomicU64,
}

impl Peer {
    pub fn new(node: NodeId, init_index: u64) -> Self {
        Self {
            node,
            match_index: AtomicU64::new(0),
            next_index: AtomicU64::new(init_index),
        }
    }
}

/// A single-entry request payload the Raft member prepares ahead of time
/// for its fast path (`send_log_to_follower`) and which this crate reuses
/// as the prefix of metadata (`prev_log_term` in particular) for a rebuilt
/// multi-entry `AppendEntries` request. `entry` starts empty and is filled
/// in by the worker immediately before send -- see `SendRequest`.
#[derive(Debug, Clone)]
pub struct PreparedAppendEntry {
    pub prev_log_term: u64,
    pub entry: Bytes,
}

impl PreparedAppendEntry {
    pub fn new(prev_log_term: u64) -> Self {
        Self {
            prev_log_term,
            entry: Bytes::new(),
        }
    }
}

/// Wire shape of the existing Raft `AppendEntries` RPC. This crate only
/// ever constructs and sends these; it never needs to inspect one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendEntriesRequest {
    pub header: Option<Header>,
    pub leader: NodeId,
    pub term: u64,
    pub prev_log_index: u64,
    pub prev_log_term: u64,
    pub entries: Vec<Bytes>,
    pub leader_commit: u64,
}

/// Result reported back by a follower. `-1` is the generic failure
/// indicator the per-entry completion callbacks interpret (see
/// `BatchCompletionHandler`); any non-negative value is the follower's
/// reported term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntriesResponse(pub i64);

impl fmt::Display for AppendEntriesResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppendEntriesResponse({})", self.0)
    }
}

/// Fire-and-forget async transport: the worker invokes this and returns
/// immediately without awaiting the RPC to complete, handing the result to
/// a `BatchCompletionHandler` when it eventually arrives. Grounded on the
/// teacher crate's `RaftNetwork::append_entries`, generalized from
/// request/response to a plain async call the worker itself spawns and
/// forgets.
#[async_trait]
pub trait AsyncAppendEntriesClient<L: RaftLogEntry>: Send + Sync {
    async fn append_entries(&self, request: AppendEntriesRequest) -> anyhow::Result<AppendEntriesResponse>;
}

/// Blocking transport used by the synchronous path. Dispatched from inside
/// `tokio::task::spawn_blocking` so a slow follower cannot starve the async
/// runtime -- see `SPEC_FULL.md` §9's scheduling resolution.
pub trait SyncAppendEntriesClient<L: RaftLogEntry>: Send + Sync {
    fn append_entries(&self, request: AppendEntriesRequest) -> anyhow::Result<AppendEntriesResponse>;
}

/// Checkout/return discipline for synchronous clients. The worker must
/// return whatever it checks out on every exit path, success or failure.
#[async_trait]
pub trait SyncClientPool<L: RaftLogEntry>: Send + Sync {
    async fn checkout(&self, node: NodeId) -> anyhow::Result<Arc<dyn SyncAppendEntriesClient<L>>>;

    fn return_client(&self, node: NodeId, client: Arc<dyn SyncAppendEntriesClient<L>>);
}

/// Per-entry completion callback, bound at construction to one
/// `(log, vote_counter, receiver, leadership_stale, new_leader_term, peer)`
/// tuple by the handler factory below. `BatchCompletionHandler` fans a
/// single transport result out to one of these per entry in the batch.
pub trait PerEntryCompletion: Send + Sync {
    fn on_complete(&self, result: AppendEntriesResponse);
    fn on_error(&self, error: &anyhow::Error);
}

/// The "external handler factory" of `SPEC_FULL.md` §4.3: given the shared
/// per-entry fan-out state, produces the callback a `BatchCompletionHandler`
/// will drive. Supplying this is the surrounding Raft member's
/// responsibility; a reference implementation lives in `testing`.
pub trait CompletionFactory<L: RaftLogEntry>: Send + Sync {
    fn create(
        &self,
        log: Arc<L>,
        vote_counter: Arc<AtomicI64>,
        receiver: NodeId,
        leadership_stale: Arc<AtomicBool>,
        new_leader_term: Arc<AtomicU64>,
        peer: NodeId,
    ) -> Arc<dyn PerEntryCompletion>;
}

/// Snapshot of the leader's current term, taken under whatever lock the
/// surrounding Raft member uses to guard term transitions. Building an
/// `AppendEntries` request reads this rather than a lock-free load to avoid
/// a torn read against a concurrent term update (`SPEC_FULL.md` §4.2.2).
#[async_trait]
pub trait RaftMember<L: RaftLogEntry>: Send + Sync + 'static {
    /// All cluster nodes, including self.
    fn all_nodes(&self) -> Vec<NodeId>;

    fn this_node(&self) -> NodeId;

    fn header(&self) -> Option<Header>;

    async fn term(&self) -> u64;

    fn commit_index(&self) -> u64;

    /// Looked up lazily, created on first access initialized at the
    /// leader's current last-log-index.
    fn peer(&self, node: NodeId) -> Arc<Peer>;

    fn async_client(&self, node: NodeId) -> Arc<dyn AsyncAppendEntriesClient<L>>;

    fn sync_client_pool(&self) -> Arc<dyn SyncClientPool<L>>;

    /// Bounded wait for `peer` to be known-acknowledged up through `log`'s
    /// predecessor. Returns `false` on timeout.
    async fn wait_for_prev_log(&self, peer: &Peer, log: &Arc<L>) -> bool;

    /// Single-entry fast path: the member prepares and sends its own
    /// request using the already-built `append_entry_request` prefix.
    async fn send_log_to_follower(
        &self,
        log: Arc<L>,
        vote_counter: Arc<AtomicI64>,
        receiver: NodeId,
        leadership_stale: Arc<AtomicBool>,
        new_leader_term: Arc<AtomicU64>,
        append_entry_request: Arc<PreparedAppendEntry>,
    );

    fn completion_factory(&self) -> Arc<dyn CompletionFactory<L>>;
}

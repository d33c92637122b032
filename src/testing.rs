//! In-crate test harness, grounded on the teacher crate's
//! `tests/fixtures/mod.rs` (a hand-written `RaftRouter` mock plus a
//! `MemStore`). This module plays the same role: a mock `RaftMember`, mock
//! transports that record what they received so tests can assert on
//! ordering and batching, and a reference vote-counting `CompletionFactory`
//! exercising the shared-atomics fan-out described in `SPEC_FULL.md` §9.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use crate::collaborators::{
    AppendEntriesRequest, AppendEntriesResponse, AsyncAppendEntriesClient, CompletionFactory, Header,
    NodeId, Peer, PerEntryCompletion, PreparedAppendEntry, RaftMember, SyncAppendEntriesClient,
    SyncClientPool,
};
use crate::entry::RaftLogEntry;

/// Minimal concrete log entry used throughout this crate's own tests.
#[derive(Debug, Clone)]
pub struct InMemoryLogEntry {
    index: u64,
    term: u64,
    create_time_nanos: u64,
    payload: Bytes,
}

impl InMemoryLogEntry {
    pub fn new(index: u64, term: u64) -> Self {
        Self {
            index,
            term,
            create_time_nanos: 0,
            payload: Bytes::from(format!("entry-{}", index)),
        }
    }
}

impl RaftLogEntry for InMemoryLogEntry {
    fn index(&self) -> u64 {
        self.index
    }

    fn term(&self) -> u64 {
        self.term
    }

    fn create_time_nanos(&self) -> u64 {
        self.create_time_nanos
    }

    fn serialize(&self) -> Bytes {
        self.payload.clone()
    }
}

/// Records every `AppendEntries` request it receives, in arrival order.
#[derive(Default)]
pub struct RecordingTransport {
    pub received: Mutex<Vec<AppendEntriesRequest>>,
    /// When set, `append_entries` returns this error instead of recording.
    pub fail_with: Mutex<Option<String>>,
}

impl RecordingTransport {
    async fn handle(&self, request: AppendEntriesRequest) -> anyhow::Result<AppendEntriesResponse> {
        if let Some(msg) = self.fail_with.lock().await.clone() {
            return Err(anyhow::anyhow!(msg));
        }
        self.received.lock().await.push(request);
        Ok(AppendEntriesResponse(1))
    }
}

#[async_trait]
impl<L: RaftLogEntry> AsyncAppendEntriesClient<L> for RecordingTransport {
    async fn append_entries(&self, request: AppendEntriesRequest) -> anyhow::Result<AppendEntriesResponse> {
        self.handle(request).await
    }
}

impl<L: RaftLogEntry> SyncAppendEntriesClient<L> for RecordingTransport {
    fn append_entries(&self, request: AppendEntriesRequest) -> anyhow::Result<AppendEntriesResponse> {
        futures_lite_block_on(self.handle(request))
    }
}

/// Tiny current-thread block_on so the synchronous trait impl above can
/// reuse the same recording logic as the async one without duplicating it.
/// Only ever called from inside `tokio::task::spawn_blocking`, never on a
/// runtime worker thread, so blocking here is safe.
fn futures_lite_block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Handle::current().block_on(fut)
}

pub struct MockSyncClientPool {
    transports: HashMap<NodeId, Arc<RecordingTransport>>,
}

impl MockSyncClientPool {
    pub fn new(transports: HashMap<NodeId, Arc<RecordingTransport>>) -> Self {
        Self { transports }
    }
}

#[async_trait]
impl<L: RaftLogEntry> SyncClientPool<L> for MockSyncClientPool {
    async fn checkout(&self, node: NodeId) -> anyhow::Result<Arc<dyn SyncAppendEntriesClient<L>>> {
        let transport = self.transports.get(&node).ok_or_else(|| anyhow::anyhow!("unknown peer {}", node))?;
        Ok(transport.clone() as Arc<dyn SyncAppendEntriesClient<L>>)
    }

    fn return_client(&self, _node: NodeId, _client: Arc<dyn SyncAppendEntriesClient<L>>) {}
}

/// Reference completion factory: counts every `on_complete`/`on_error`
/// invocation and the last result seen, letting tests assert exactly-once
/// fan-out (`SPEC_FULL.md` §8 "Batch atomicity").
#[derive(Default)]
pub struct CountingCompletionFactory {
    pub complete_calls: Arc<AtomicI64>,
    pub error_calls: Arc<AtomicI64>,
    pub last_result: Arc<AtomicI64>,
}

struct CountingCompletion {
    complete_calls: Arc<AtomicI64>,
    error_calls: Arc<AtomicI64>,
    last_result: Arc<AtomicI64>,
}

impl PerEntryCompletion for CountingCompletion {
    fn on_complete(&self, result: AppendEntriesResponse) {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.last_result.store(result.0, Ordering::SeqCst);
    }

    fn on_error(&self, _error: &anyhow::Error) {
        self.error_calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl<L: RaftLogEntry> CompletionFactory<L> for CountingCompletionFactory {
    fn create(
        &self,
        _log: Arc<L>,
        _vote_counter: Arc<AtomicI64>,
        _receiver: NodeId,
        _leadership_stale: Arc<AtomicBool>,
        _new_leader_term: Arc<AtomicU64>,
        _peer: NodeId,
    ) -> Arc<dyn PerEntryCompletion> {
        Arc::new(CountingCompletion {
            complete_calls: self.complete_calls.clone(),
            error_calls: self.error_calls.clone(),
            last_result: self.last_result.clone(),
        })
    }
}

/// Reference vote-counting completion, exercising the actual §3/§9 shared
/// atomics contract: counts a YES vote when the follower's reported term
/// matches the leader's term observed at dispatch time, otherwise marks
/// leadership stale and records the higher term.
pub struct QuorumVoteCompletion {
    log: Arc<dyn std::any::Any + Send + Sync>,
    vote_counter: Arc<AtomicI64>,
    leadership_stale: Arc<AtomicBool>,
    new_leader_term: Arc<AtomicU64>,
    leader_term: u64,
}

impl PerEntryCompletion for QuorumVoteCompletion {
    fn on_complete(&self, result: AppendEntriesResponse) {
        let _ = &self.log;
        if result.0 < 0 {
            return;
        }
        let reported_term = result.0 as u64;
        if reported_term > self.leader_term {
            self.leadership_stale.store(true, Ordering::SeqCst);
            self.new_leader_term.fetch_max(reported_term, Ordering::SeqCst);
        } else {
            self.vote_counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_error(&self, _error: &anyhow::Error) {
        // Transport failure counts as no vote; Raft's normal retry path
        // will re-offer this entry.
    }
}

pub struct QuorumVoteCompletionFactory {
    pub leader_term: u64,
}

impl<L: RaftLogEntry + 'static> CompletionFactory<L> for QuorumVoteCompletionFactory {
    fn create(
        &self,
        log: Arc<L>,
        vote_counter: Arc<AtomicI64>,
        _receiver: NodeId,
        leadership_stale: Arc<AtomicBool>,
        new_leader_term: Arc<AtomicU64>,
        _peer: NodeId,
    ) -> Arc<dyn PerEntryCompletion> {
        Arc::new(QuorumVoteCompletion {
            log,
            vote_counter,
            leadership_stale,
            new_leader_term,
            leader_term: self.leader_term,
        })
    }
}

/// Mock Raft member: a fixed node set, a shared term, an in-memory commit
/// index, and one `RecordingTransport` per peer for both transports.
pub struct MockRaftMember {
    this_node: NodeId,
    nodes: Vec<NodeId>,
    term: AtomicU64,
    commit_index: AtomicU64,
    transports: HashMap<NodeId, Arc<RecordingTransport>>,
    completion_factory: Arc<QuorumVoteCompletionFactory>,
    /// Followers that should fail `wait_for_prev_log`.
    pub stalled_predecessors: Mutex<Vec<NodeId>>,
}

impl MockRaftMember {
    pub fn new(this_node: NodeId, peers: Vec<NodeId>, term: u64) -> Self {
        let mut nodes = peers.clone();
        nodes.push(this_node);
        let transports = peers
            .iter()
            .map(|&p| (p, Arc::new(RecordingTransport::default())))
            .collect();
        Self {
            this_node,
            nodes,
            term: AtomicU64::new(term),
            commit_index: AtomicU64::new(0),
            transports,
            completion_factory: Arc::new(QuorumVoteCompletionFactory { leader_term: term }),
            stalled_predecessors: Mutex::new(Vec::new()),
        }
    }

    pub fn transport(&self, node: NodeId) -> Arc<RecordingTransport> {
        self.transports.get(&node).expect("unknown peer").clone()
    }
}

#[async_trait]
impl<L: RaftLogEntry + 'static> RaftMember<L> for MockRaftMember {
    fn all_nodes(&self) -> Vec<NodeId> {
        self.nodes.clone()
    }

    fn this_node(&self) -> NodeId {
        self.this_node
    }

    fn header(&self) -> Option<Header> {
        None
    }

    async fn term(&self) -> u64 {
        self.term.load(Ordering::SeqCst)
    }

    fn commit_index(&self) -> u64 {
        self.commit_index.load(Ordering::SeqCst)
    }

    fn peer(&self, node: NodeId) -> Arc<Peer> {
        Arc::new(Peer::new(node, 0))
    }

    fn async_client(&self, node: NodeId) -> Arc<dyn AsyncAppendEntriesClient<L>> {
        self.transport(node) as Arc<dyn AsyncAppendEntriesClient<L>>
    }

    fn sync_client_pool(&self) -> Arc<dyn SyncClientPool<L>> {
        // Built fresh per call; every pool wraps the same underlying
        // `RecordingTransport`s, so tests can inspect `transport(node)`
        // regardless of whether the sync or async path was exercised.
        Arc::new(MockSyncClientPool::new(self.transports.clone()))
    }

    async fn wait_for_prev_log(&self, peer: &Peer, _log: &Arc<L>) -> bool {
        !self.stalled_predecessors.lock().await.contains(&peer.node)
    }

    async fn send_log_to_follower(
        &self,
        log: Arc<L>,
        vote_counter: Arc<AtomicI64>,
        receiver: NodeId,
        leadership_stale: Arc<AtomicBool>,
        new_leader_term: Arc<AtomicU64>,
        append_entry_request: Arc<PreparedAppendEntry>,
    ) {
        let transport = self.transport(receiver);
        let request = AppendEntriesRequest {
            header: None,
            leader: self.this_node,
            term: self.term.load(Ordering::SeqCst),
            prev_log_index: log.index().saturating_sub(1),
            prev_log_term: append_entry_request.prev_log_term,
            // Sourced from the prepared payload the worker filled in before
            // calling this method, not re-derived from `log` -- a mock that
            // re-serializes here would hide a worker that forgot to
            // populate `append_entry_request.entry`.
            entries: vec![append_entry_request.entry.clone()],
            leader_commit: self.commit_index.load(Ordering::SeqCst),
        };
        let factory: &dyn CompletionFactory<L> = self.completion_factory.as_ref();
        let handler = crate::completion::BatchCompletionHandler::new(
            &[Arc::new(crate::request::SendRequest::new(
                log,
                vote_counter,
                leadership_stale,
                new_leader_term,
                PreparedAppendEntry {
                    prev_log_term: append_entry_request.prev_log_term,
                    entry: Bytes::new(),
                },
            ))],
            receiver,
            factory,
        );
        match AsyncAppendEntriesClient::<L>::append_entries(transport.as_ref(), request).await {
            Ok(response) => handler.on_complete(response),
            Err(err) => handler.on_error(&err),
        }
    }

    fn completion_factory(&self) -> Arc<dyn CompletionFactory<L>> {
        self.completion_factory.clone()
    }
}

//! `LogDispatcher`: the facade producers talk to. Constructs one bounded
//! queue and one worker per follower, excluding self, and multicasts every
//! `offer` across all of them. Grounded on the teacher crate's
//! `LeaderState`, which owns one `ReplicationStream` per follower in a
//! `BTreeMap` and pushes the same `RaftEvent::Replicate` to every one of
//! them in `replicate_client_request` -- this crate's `offer` is that same
//! multicast, generalized to a bounded, drop-on-full queue per follower.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::collaborators::{NodeId, RaftMember};
use crate::config::Config;
use crate::entry::RaftLogEntry;
use crate::error::DispatchError;
use crate::metrics;
use crate::queue::{self, FollowerQueueHandle};
use crate::request::SendRequest;
use crate::worker::DispatcherWorker;

pub struct LogDispatcher<L: RaftLogEntry> {
    queues: BTreeMap<NodeId, FollowerQueueHandle<L>>,
    workers: Vec<JoinHandle<()>>,
}

impl<L: RaftLogEntry> LogDispatcher<L> {
    /// Enumerates `member`'s peers (excluding self), creates one
    /// fixed-capacity queue per peer sized by `config.min_logs_in_memory`,
    /// and spawns exactly one worker bound to each (peer, queue) pair.
    /// Returns `DispatchError::InvalidCapacity` if `min_logs_in_memory` is
    /// zero.
    pub fn new<M>(member: Arc<M>, config: Arc<Config>) -> Result<Self, DispatchError>
    where
        M: RaftMember<L> + 'static,
        L: 'static,
    {
        if config.min_logs_in_memory == 0 {
            return Err(DispatchError::InvalidCapacity(config.min_logs_in_memory));
        }

        let this_node = member.this_node();
        let mut queues = BTreeMap::new();
        let mut workers = Vec::new();

        for peer in member.all_nodes() {
            if peer == this_node {
                continue;
            }
            let (handle, consumer) = queue::bounded(config.min_logs_in_memory);
            let worker = DispatcherWorker::new(peer, consumer, member.clone(), config.clone());
            workers.push(worker.spawn());
            queues.insert(peer, handle);
        }

        Ok(Self { queues, workers })
    }

    /// Free slots left in `follower`'s queue right now, or
    /// `DispatchError::UnknownFollower` if `follower` isn't one of the peers
    /// this dispatcher was constructed with. Operator-facing gauge only --
    /// see `FollowerQueueHandle::remaining_capacity`.
    pub fn remaining_capacity(&self, follower: NodeId) -> Result<usize, DispatchError> {
        self.queues
            .get(&follower)
            .map(|queue| queue.remaining_capacity())
            .ok_or(DispatchError::UnknownFollower(follower))
    }

    /// Multicasts `request` across every follower's queue with a
    /// non-blocking insert. A queue that is full silently drops the
    /// request for that follower only -- Raft's own retransmission path
    /// covers the gap -- while every other follower still receives it.
    /// `enqueue_time` is stamped on every successful insert, last write
    /// wins (`SPEC_FULL.md` §4.1).
    #[instrument(level = "debug", skip(self, request))]
    pub fn offer(&self, request: Arc<SendRequest<L>>) {
        for (&follower, queue) in &self.queues {
            if queue.try_offer(request.clone()) {
                request.mark_enqueued(metrics::now_nanos());
            } else {
                debug!(follower, log_index = request.log.index(), "follower queue full, dropping entry");
            }
        }
    }

    /// Followers currently known to this dispatcher, in deterministic
    /// order. Exposed mainly for tests asserting fan-out breadth.
    pub fn followers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.queues.keys().copied()
    }

    /// Aborts every worker task. Queued-but-unsent requests are discarded;
    /// in-flight async RPCs already spawned are not cancelled
    /// (`SPEC_FULL.md` §5).
    pub fn shutdown(&mut self) {
        for worker in self.workers.drain(..) {
            worker.abort();
        }
        self.queues.clear();
    }
}

impl<L: RaftLogEntry> Drop for LogDispatcher<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

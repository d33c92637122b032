//! `DispatcherWorker`: the long-lived per-follower task. Grounded on the
//! teacher crate's `ReplicationCore::main`/`send_append_entries` -- a
//! `tokio::spawn`'d loop that takes work off a channel, builds an
//! `AppendEntries` request, and ships it -- generalized here to (a) drain
//! opportunistically before building the request and (b) choose between a
//! prebuilt single-entry fast path and a rebuilt batched path.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::collaborators::{AppendEntriesRequest, NodeId, RaftMember};
use crate::completion::BatchCompletionHandler;
use crate::config::Config;
use crate::entry::RaftLogEntry;
use crate::metrics;
use crate::queue::FollowerQueueConsumer;
use crate::request::SendRequest;

pub struct DispatcherWorker<L, M>
where
    L: RaftLogEntry,
    M: RaftMember<L>,
{
    follower: NodeId,
    consumer: FollowerQueueConsumer<L>,
    member: Arc<M>,
    config: Arc<Config>,
}

impl<L, M> DispatcherWorker<L, M>
where
    L: RaftLogEntry,
    M: RaftMember<L>,
{
    pub fn new(follower: NodeId, consumer: FollowerQueueConsumer<L>, member: Arc<M>, config: Arc<Config>) -> Self {
        Self {
            follower,
            consumer,
            member,
            config,
        }
    }

    /// Spawns this worker's loop onto the ambient runtime and returns its
    /// `JoinHandle`. The worker runs until its queue is closed (dispatcher
    /// shutdown) or its task is cancelled; either way it exits cleanly
    /// without propagating an error, per the error handling design in
    /// `SPEC_FULL.md` §7.
    pub fn spawn(mut self) -> JoinHandle<()>
    where
        L: 'static,
        M: 'static,
    {
        tokio::spawn(async move { self.run().await })
    }

    #[instrument(level = "debug", skip(self), fields(follower = self.follower))]
    async fn run(&mut self) {
        let mut batch: Vec<Arc<SendRequest<L>>> = Vec::new();
        loop {
            let first = match self.consumer.take().await {
                Some(req) => req,
                None => {
                    debug!(follower = self.follower, "queue closed, worker exiting");
                    return;
                }
            };
            first.ensure_serialized();

            batch.clear();
            batch.push(first);
            self.consumer.drain_to(&mut batch);

            if batch.len() == 1 {
                self.dispatch_single(&batch[0]).await;
            } else {
                self.dispatch_batch(&batch).await;
            }
        }
    }

    async fn dispatch_single(&self, request: &Arc<SendRequest<L>>) {
        let now = metrics::now_nanos();
        metrics::record_log_in_queue(
            self.config.enable_instrumenting,
            self.follower,
            request.log.index(),
            request.log.create_time_nanos(),
            now,
        );

        self.member
            .send_log_to_follower(
                request.log.clone(),
                request.vote_counter.clone(),
                self.follower,
                request.leadership_stale.clone(),
                request.new_leader_term.clone(),
                Arc::new(request.prepared_append_entry()),
            )
            .await;

        let end = metrics::now_nanos();
        metrics::record_from_create_to_end(
            self.config.enable_instrumenting,
            self.follower,
            request.log.index(),
            request.log.create_time_nanos(),
            end,
        );
    }

    async fn dispatch_batch(&self, batch: &[Arc<SendRequest<L>>]) {
        // `ensure_serialized` is idempotent and memoized (see `SendRequest`),
        // so it is safe to call here even if another follower's worker is
        // racing to serialize the same shared request concurrently.
        let entries: Vec<_> = batch.iter().map(|r| r.ensure_serialized()).collect();

        let first = &batch[0];
        let term = self.member.term().await;
        let request = AppendEntriesRequest {
            header: self.member.header(),
            leader: self.member.this_node(),
            term,
            prev_log_index: first.log.index().saturating_sub(1),
            prev_log_term: first.append_entry_request.prev_log_term,
            entries,
            leader_commit: self.member.commit_index(),
        };

        // Defensive copy: the handler outlives this function's borrow of
        // `batch`, and the async path's spawned completion task must own
        // its own list rather than reference the worker's buffer, which is
        // cleared on the next loop iteration.
        let batch_copy: Vec<Arc<SendRequest<L>>> = batch.to_vec();

        if self.config.use_async_server {
            self.dispatch_async(request, batch_copy).await;
        } else {
            self.dispatch_sync(request, batch_copy).await;
        }

        let end = metrics::now_nanos();
        for req in batch {
            metrics::record_from_create_to_end(
                self.config.enable_instrumenting,
                self.follower,
                req.log.index(),
                req.log.create_time_nanos(),
                end,
            );
        }
    }

    async fn dispatch_async(&self, request: AppendEntriesRequest, batch: Vec<Arc<SendRequest<L>>>)
    where
        L: 'static,
        M: 'static,
    {
        let client = self.member.async_client(self.follower);
        let factory = self.member.completion_factory();
        let follower = self.follower;

        tokio::spawn(async move {
            let handler = BatchCompletionHandler::new(&batch, follower, factory.as_ref());
            debug!(follower, batch_len = handler.len(), "dispatching batch over async transport");
            match client.append_entries(request).await {
                Ok(response) => handler.on_complete(response),
                Err(err) => {
                    warn!(follower, error = %err, "async append_entries failed");
                    handler.on_error(&err);
                }
            }
        });
    }

    async fn dispatch_sync(&self, request: AppendEntriesRequest, batch: Vec<Arc<SendRequest<L>>>) {
        let peer = self.member.peer(self.follower);
        let first_index = batch[0].log.index();

        if !self
            .member
            .wait_for_prev_log(peer.as_ref(), &batch[0].log)
            .await
        {
            warn!(follower = self.follower, first_index, "wait_for_prev_log timed out, abandoning batch");
            return;
        }

        let pool = self.member.sync_client_pool();
        let client = match pool.checkout(self.follower).await {
            Ok(client) => client,
            Err(err) => {
                error!(follower = self.follower, error = %err, "failed to check out sync client");
                return;
            }
        };

        let factory = self.member.completion_factory();
        let handler = BatchCompletionHandler::new(&batch, self.follower, factory.as_ref());
        debug!(
            follower = self.follower,
            first_index,
            batch_len = handler.len(),
            "dispatching batch over sync transport"
        );

        let sync_client = client.clone();
        let result = tokio::task::spawn_blocking(move || sync_client.append_entries(request))
            .await
            .unwrap_or_else(|join_err| Err(anyhow::anyhow!(join_err)));

        match result {
            Ok(response) => handler.on_complete(response),
            Err(err) => {
                error!(follower = self.follower, first_index, error = %err, "sync append_entries failed");
                handler.on_error(&err);
            }
        }

        pool.return_client(self.follower, client);
    }
}

//! `BoundedQueue<SendRequest>`: one fixed-capacity, multi-producer
//! single-consumer FIFO per follower. Built directly on
//! `tokio::sync::mpsc::channel`, the same channel primitive the teacher
//! crate uses for its per-follower `repl_tx`/`repl_rx` pair, except bounded
//! rather than unbounded -- this crate needs drop-on-full backpressure, the
//! teacher's replication stream does not.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::entry::RaftLogEntry;
use crate::request::SendRequest;

/// Producer-side handle. Cheap to clone; `LogDispatcher::offer` holds one
/// per follower and calls `try_offer` on each in turn.
#[derive(Clone)]
pub struct FollowerQueueHandle<L: RaftLogEntry> {
    tx: mpsc::Sender<Arc<SendRequest<L>>>,
}

impl<L: RaftLogEntry> FollowerQueueHandle<L> {
    /// Non-blocking insert. Returns `false` if the queue is full or the
    /// consumer has shut down -- the two cases are indistinguishable to the
    /// producer by design, since a full-and-never-draining worker and a
    /// shut-down worker both mean "this follower will not see this entry
    /// via this queue."
    pub fn try_offer(&self, item: Arc<SendRequest<L>>) -> bool {
        self.tx.try_send(item).is_ok()
    }

    /// Free slots left in this queue right now. Racy by nature -- another
    /// producer may fill or a drain may empty it before the caller acts on
    /// the number -- useful only as an operator-facing gauge.
    pub fn remaining_capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer-side handle, owned exclusively by the one `DispatcherWorker`
/// bound to this follower.
pub struct FollowerQueueConsumer<L: RaftLogEntry> {
    rx: mpsc::Receiver<Arc<SendRequest<L>>>,
}

impl<L: RaftLogEntry> FollowerQueueConsumer<L> {
    /// Blocks until an item is available or every producer handle (and the
    /// dispatcher itself) has been dropped, in which case it returns
    /// `None` and the worker exits.
    pub async fn take(&mut self) -> Option<Arc<SendRequest<L>>> {
        self.rx.recv().await
    }

    /// Non-blocking bulk drain: moves every item currently available into
    /// `into`, preserving FIFO order, without waiting for more to arrive.
    pub fn drain_to(&mut self, into: &mut Vec<Arc<SendRequest<L>>>) {
        while let Ok(item) = self.rx.try_recv() {
            into.push(item);
        }
    }
}

/// Creates one bounded queue with the given fixed capacity, returning the
/// producer handle and the consumer half.
pub fn bounded<L: RaftLogEntry>(capacity: usize) -> (FollowerQueueHandle<L>, FollowerQueueConsumer<L>) {
    let (tx, rx) = mpsc::channel(capacity);
    (FollowerQueueHandle { tx }, FollowerQueueConsumer { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::PreparedAppendEntry;
    use crate::testing::InMemoryLogEntry;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64};

    fn request(index: u64) -> Arc<SendRequest<InMemoryLogEntry>> {
        Arc::new(SendRequest::new(
            Arc::new(InMemoryLogEntry::new(index, 1)),
            Arc::new(AtomicI64::new(0)),
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicU64::new(0)),
            PreparedAppendEntry::new(1),
        ))
    }

    #[tokio::test]
    async fn drop_on_full_keeps_capacity_many_and_fifo_order() {
        let (tx, mut rx) = bounded::<InMemoryLogEntry>(4);
        let mut accepted = vec![];
        for i in 1..=6u64 {
            if tx.try_offer(request(i)) {
                accepted.push(i);
            }
        }
        assert_eq!(accepted, vec![1, 2, 3, 4]);

        let mut drained = vec![];
        rx.drain_to(&mut drained);
        let indices: Vec<u64> = drained.iter().map(|r| r.log.index()).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn take_returns_none_after_producer_dropped() {
        let (tx, mut rx) = bounded::<InMemoryLogEntry>(2);
        drop(tx);
        assert!(rx.take().await.is_none());
    }
}

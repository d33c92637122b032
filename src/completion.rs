//! `BatchCompletionHandler`: decomposes one transport acknowledgement (or
//! failure) for a whole batch into N per-entry completion callbacks,
//! exactly one invocation per entry (`SPEC_FULL.md` §3 invariant 3, §4.3).

use std::sync::Arc;

use crate::collaborators::{AppendEntriesResponse, CompletionFactory, NodeId, PerEntryCompletion};
use crate::entry::RaftLogEntry;
use crate::request::SendRequest;

pub struct BatchCompletionHandler {
    callbacks: Vec<Arc<dyn PerEntryCompletion>>,
}

impl BatchCompletionHandler {
    /// Builds one callback per request in `batch`, in batch order, via the
    /// supplied factory. `batch` is expected to be the defensive copy the
    /// worker took before clearing its buffer (`SPEC_FULL.md` §4.2.2 /
    /// §9).
    pub fn new<L: RaftLogEntry>(
        batch: &[Arc<SendRequest<L>>],
        receiver: NodeId,
        factory: &dyn CompletionFactory<L>,
    ) -> Self {
        let callbacks = batch
            .iter()
            .map(|req| {
                factory.create(
                    req.log.clone(),
                    req.vote_counter.clone(),
                    receiver,
                    req.leadership_stale.clone(),
                    req.new_leader_term.clone(),
                    receiver,
                )
            })
            .collect();
        Self { callbacks }
    }

    /// The batch is atomic: every per-entry callback sees the same result.
    pub fn on_complete(&self, result: AppendEntriesResponse) {
        for cb in &self.callbacks {
            cb.on_complete(result);
        }
    }

    /// No partial-success inference: every per-entry callback is told the
    /// whole batch failed.
    pub fn on_error(&self, error: &anyhow::Error) {
        for cb in &self.callbacks {
            cb.on_error(error);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::PreparedAppendEntry;
    use crate::testing::{CountingCompletionFactory, InMemoryLogEntry};
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

    fn request(index: u64) -> Arc<SendRequest<InMemoryLogEntry>> {
        Arc::new(SendRequest::new(
            Arc::new(InMemoryLogEntry::new(index, 1)),
            Arc::new(AtomicI64::new(0)),
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicU64::new(0)),
            PreparedAppendEntry::new(1),
        ))
    }

    #[test]
    fn on_complete_invokes_every_callback_exactly_once() {
        let batch: Vec<_> = (1..=3).map(request).collect();
        let factory = CountingCompletionFactory::default();
        let handler = BatchCompletionHandler::new(&batch, 7, &factory);
        handler.on_complete(AppendEntriesResponse(42));

        assert_eq!(factory.complete_calls.load(Ordering::SeqCst), 3);
        assert_eq!(factory.last_result.load(Ordering::SeqCst), 42);
        assert_eq!(factory.error_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn on_error_invokes_every_callback_exactly_once() {
        let batch: Vec<_> = (1..=2).map(request).collect();
        let factory = CountingCompletionFactory::default();
        let handler = BatchCompletionHandler::new(&batch, 7, &factory);
        handler.on_error(&anyhow::anyhow!("boom"));

        assert_eq!(factory.error_calls.load(Ordering::SeqCst), 2);
        assert_eq!(factory.complete_calls.load(Ordering::SeqCst), 0);
    }
}

//! Per-follower log dispatch core of a Raft leader.
//!
//! This crate turns a leader's stream of newly appended log entries into an
//! ordered, batched, per-follower delivery stream: one queue and one worker
//! task per follower, a facade that multicasts offers across them, and a
//! completion handler that fans a single transport acknowledgement back out
//! to one vote-counting callback per entry.
//!
//! The Raft state machine itself -- elections, term management, commit
//! index advancement, log persistence -- is not implemented here. It is
//! consumed through the [`RaftMember`](collaborators::RaftMember) trait.

pub mod collaborators;
pub mod completion;
pub mod config;
pub mod dispatcher;
pub mod entry;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod request;
pub mod worker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use collaborators::{
    AppendEntriesRequest, AppendEntriesResponse, AsyncAppendEntriesClient, CompletionFactory,
    Header, NodeId, Peer, PerEntryCompletion, PreparedAppendEntry, RaftMember,
    SyncAppendEntriesClient, SyncClientPool,
};
pub use completion::BatchCompletionHandler;
pub use config::Config;
pub use dispatcher::LogDispatcher;
pub use entry::RaftLogEntry;
pub use error::DispatchError;
pub use queue::{FollowerQueueConsumer, FollowerQueueHandle};
pub use request::SendRequest;
pub use worker::DispatcherWorker;

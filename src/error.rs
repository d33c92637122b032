//! Error types for the small set of calls in this crate that return a
//! `Result` at all. The steady-state worker loop never surfaces an error to
//! its caller -- see the error handling design notes in `SPEC_FULL.md` §7 --
//! it only ever logs and continues. `DispatchError` exists for construction
//! time and for the test harness.

use thiserror::Error;

use crate::collaborators::NodeId;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("min_logs_in_memory must be positive, got {0}")]
    InvalidCapacity(usize),

    #[error("follower {0:?} has no registered queue")]
    UnknownFollower(NodeId),
}

use std::io;
use thiserror::Error;

/// Errors surfaced by pool construction and submission.
#[derive(Error, Debug)]
pub enum PoolError {
    /// Rejected configuration (zero cap, zero lifetime, initial > cap).
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// The pool has been shut down; no new work is accepted.
    #[error("pool is closed")]
    Closed,

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Errors a `JoinHandle` can resolve to instead of the handler's output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The handler panicked while executing this item.
    #[error("handler panicked: {0}")]
    Panic(String),

    /// The result slot was dropped before fulfillment, which happens when
    /// the pool shuts down with this item still queued.
    #[error("result channel closed before fulfillment")]
    ChannelClosed,

    /// A timed wait on the handle elapsed. The item itself still runs.
    #[error("timed out waiting for result")]
    Timeout,
}

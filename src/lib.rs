//! Dynamically-sized worker pool with per-worker life budgets
//!
//! # Features
//! - Bounded growth: submissions spawn extra workers under load, up to a cap
//! - Organic churn: every worker retires after a fixed number of items
//! - Typed results via single-fulfillment [`JoinHandle`]s, or fire-and-forget
//! - Lock-free status counters for monitoring
//! - Panic-isolating handlers and a drain-to-zero shutdown protocol

pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod result;

mod queue;

pub use errors::{PoolError, TaskError};
pub use handle::{join_all, JoinHandle};
pub use model::PoolStatus;
pub use pool::{Config, DynamicPool, FirePool};
pub use result::TaskResult;

#![deny(missing_docs)]

//! A fixed-capacity, reusable worker-thread pool for synchronous batches.
//!
//! This library provides two synchronization patterns over one set of
//! long-lived worker threads: a fan-out batch, where every worker runs
//! the same routine exactly once, and a parallel-for loop, where a range
//! of indices is distributed dynamically across the workers. Threads are
//! spawned lazily and reused across calls; the caller always blocks
//! until the batch completes.

mod error;
mod job;
mod pool;
/// The wait/notify primitive used for boss/worker handshakes.
pub mod sync;

pub use error::{PoolError, Result};
pub use job::{BatchJob, ForBody, ParallelFor};
pub use pool::{suggested_workers, BatchPool, MAX_WORKERS};

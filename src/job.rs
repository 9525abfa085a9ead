use std::sync::atomic::{AtomicUsize, Ordering};

/// A unit of work executed once per worker in a batch.
///
/// Implementors must be [`Sync`]: a single job value is shared by
/// reference across every worker in the batch.
pub trait BatchJob: Sync {
    /// Runs this worker's share of the batch.
    ///
    /// Called exactly once per batch on each worker, with `worker_index`
    /// in `0..worker_count`.
    fn execute(&self, worker_index: usize, worker_count: usize);
}

impl<F> BatchJob for F
where
    F: Fn(usize, usize) + Sync,
{
    fn execute(&self, worker_index: usize, worker_count: usize) {
        self(worker_index, worker_count)
    }
}

/// The per-iteration routine of a parallel-for loop.
pub trait ForBody: Sync {
    /// Processes one iteration index.
    ///
    /// Which worker processes which index is not deterministic; callers
    /// needing isolation should partition output by `worker_index` or
    /// synchronize themselves.
    fn body(&self, iteration: usize, worker_index: usize, worker_count: usize);
}

impl<F> ForBody for F
where
    F: Fn(usize, usize, usize) + Sync,
{
    fn body(&self, iteration: usize, worker_index: usize, worker_count: usize) {
        self(iteration, worker_index, worker_count)
    }
}

/// Adapts a [`ForBody`] into a [`BatchJob`] that dynamically distributes
/// an index range across the workers of a batch.
///
/// Every worker pulls indices from a shared atomic cursor until the range
/// is exhausted, so faster workers naturally take more iterations.
pub struct ParallelFor<'a, B: ForBody + ?Sized> {
    body: &'a B,
    cursor: AtomicUsize,
    count: usize,
}

impl<'a, B: ForBody + ?Sized> ParallelFor<'a, B> {
    /// Creates a parallel-for job over `0..count` with the cursor at zero.
    pub fn new(body: &'a B, count: usize) -> Self {
        ParallelFor {
            body,
            cursor: AtomicUsize::new(0),
            count,
        }
    }
}

impl<B: ForBody + ?Sized> BatchJob for ParallelFor<'_, B> {
    fn execute(&self, worker_index: usize, worker_count: usize) {
        loop {
            let i = self.cursor.fetch_add(1, Ordering::Relaxed);
            if i >= self.count {
                break;
            }
            self.body.body(i, worker_index, worker_count);
        }
    }
}

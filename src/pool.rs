use std::mem;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error};

use crate::error::{PoolError, Result};
use crate::job::{BatchJob, ForBody, ParallelFor};
use crate::sync::Signal;

/// The largest worker count a pool will ever host.
pub const MAX_WORKERS: usize = 64;

/// Sleep interval for the boss's settle-polling loops.
const SETTLE_POLL: Duration = Duration::from_millis(1);

/// Returns a reasonable worker count for this machine.
///
/// Uses the available processor count, falling back to 1 when fewer
/// than two processors are reported.
pub fn suggested_workers() -> usize {
    let cpus = num_cpus::get();
    if cpus < 2 {
        1
    } else {
        cpus
    }
}

/// The lifecycle states of a worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum WorkerState {
    /// Context allocated, thread not yet in its loop.
    Init = 0,
    /// Ready to accept a batch, blocked on its wake signal.
    Idle,
    /// Executing the assigned job.
    Running,
    /// Shutdown requested by the pool.
    Done,
    /// Thread function has returned; the handle can be joined.
    Dead,
}

impl WorkerState {
    fn from_u8(raw: u8) -> WorkerState {
        match raw {
            0 => WorkerState::Init,
            1 => WorkerState::Idle,
            2 => WorkerState::Running,
            3 => WorkerState::Done,
            4 => WorkerState::Dead,
            _ => unreachable!("invalid worker state {raw}"),
        }
    }
}

/// Per-slot state the boss uses to communicate with one worker thread.
///
/// Allocated once when the pool grows to cover the slot, then reused by
/// every subsequent batch until teardown.
struct WorkerContext {
    /// Stable identity of this slot.
    index: usize,
    /// Worker count the next `execute` call will observe. Rewritten by
    /// the boss on pool growth and before every dispatch.
    worker_count: AtomicUsize,
    state: AtomicU8,
    /// Wakes this worker out of its idle wait.
    wake: Signal,
    /// The job for the current batch; `None` outside a batch.
    job: Mutex<Option<&'static dyn BatchJob>>,
}

impl WorkerContext {
    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// State shared between the boss and every worker of a batch.
struct BatchShared {
    /// Workers still running the current batch. The worker that brings
    /// this to zero releases the boss.
    active: AtomicUsize,
    /// Blocks the boss until the last worker of a batch finishes.
    batch_done: Signal,
}

/// The loop every spawned worker thread runs until teardown.
fn worker_loop(ctx: &WorkerContext, shared: &BatchShared) {
    loop {
        // Idle must be this thread's own announcement: the boss takes it
        // to mean the worker is (about to be) parked on its wake signal.
        ctx.set_state(WorkerState::Idle);
        ctx.wake.wait();

        match ctx.state() {
            WorkerState::Running => {
                let job = ctx.job.lock().expect("job slot poisoned").take();
                if let Some(job) = job {
                    job.execute(ctx.index, ctx.worker_count.load(Ordering::Acquire));
                }
                if shared.active.fetch_sub(1, Ordering::AcqRel) == 1 {
                    debug!("worker {} finished last, releasing the boss", ctx.index);
                    shared.batch_done.notify_one();
                }
            }
            WorkerState::Done => break,
            state => {
                // Stale notification; park again.
                debug!("worker {} woke in state {:?}, ignoring", ctx.index, state);
            }
        }
    }
    debug!("worker {} shutting down", ctx.index);
    ctx.set_state(WorkerState::Dead);
}

/// One spawned worker: its shared context plus the thread handle the
/// pool joins at teardown.
struct Worker {
    ctx: Arc<WorkerContext>,
    handle: JoinHandle<()>,
}

/// A fixed-capacity, reusable pool of worker threads for synchronous
/// batch execution.
///
/// Threads are spawned lazily up to the largest worker count ever
/// requested (the high-water mark) and reused across batches; the pool
/// never shrinks before [`shutdown`](BatchPool::shutdown). Each `run`
/// call blocks the caller until the whole batch has completed and every
/// worker has settled back to idle.
///
/// The pool is not reentrant: batches are driven one at a time through
/// `&mut self`.
pub struct BatchPool {
    workers: Vec<Worker>,
    shared: Arc<BatchShared>,
    retired: bool,
}

impl BatchPool {
    /// Creates an empty pool. No threads are spawned until the first
    /// batch that needs them.
    pub fn new() -> BatchPool {
        BatchPool {
            workers: Vec::new(),
            shared: Arc::new(BatchShared {
                active: AtomicUsize::new(0),
                batch_done: Signal::new(),
            }),
            retired: false,
        }
    }

    /// The number of worker threads currently alive: the high-water mark
    /// of all prior `run` calls.
    pub fn spawned(&self) -> usize {
        self.workers.len()
    }

    /// Runs `job` as a fan-out batch across `workers` workers, blocking
    /// until every worker has executed it exactly once.
    ///
    /// With `workers == 1` the job executes synchronously on the calling
    /// thread and no worker is spawned or woken. On return, all workers
    /// are idle and the pool is immediately reusable at any count up to
    /// its high-water mark.
    ///
    /// A panicking job routine is not caught: the batch never completes
    /// and the boss blocks indefinitely. Jobs are trusted not to fail.
    ///
    /// # Errors
    ///
    /// [`PoolError::ZeroWorkers`] if `workers` is zero,
    /// [`PoolError::TooManyWorkers`] if it exceeds [`MAX_WORKERS`], and
    /// [`PoolError::Retired`] if the pool has been shut down.
    pub fn run<J: BatchJob>(&mut self, job: &J, workers: usize) -> Result<()> {
        if self.retired {
            return Err(PoolError::Retired);
        }
        if workers == 0 {
            return Err(PoolError::ZeroWorkers);
        }
        if workers > MAX_WORKERS {
            return Err(PoolError::TooManyWorkers(workers));
        }

        // Trivial batch: run on the caller's thread, no dispatch overhead.
        if workers == 1 {
            job.execute(0, 1);
            return Ok(());
        }

        while self.workers.len() < workers {
            self.spawn_worker();
        }

        self.shared.active.store(workers, Ordering::Release);

        // Erase the borrow lifetime so the reference fits the job slots.
        // Sound: `run` does not return until every dispatched worker has
        // taken and finished the job and settled back to idle, so the
        // borrow outlives all uses.
        let job: &'static dyn BatchJob = unsafe { mem::transmute(job as &dyn BatchJob) };

        for worker in &self.workers[..workers] {
            let ctx = &worker.ctx;

            // A worker fresh from spawn or a previous wakeup must reach
            // its idle wait before it can take a new dispatch.
            while ctx.state() != WorkerState::Idle {
                thread::sleep(SETTLE_POLL);
            }

            *ctx.job.lock().expect("job slot poisoned") = Some(job);
            ctx.worker_count.store(workers, Ordering::Release);
            ctx.set_state(WorkerState::Running);
            ctx.wake.notify_one();
        }
        debug!("dispatched batch to {workers} workers");

        // The last worker to finish releases us.
        self.shared.batch_done.wait();

        // It signals before parking again, so wait for every dispatched
        // worker to report idle: the caller must observe a quiesced pool.
        loop {
            let settled = self.workers[..workers]
                .iter()
                .all(|w| w.ctx.state() == WorkerState::Idle);
            if settled {
                break;
            }
            thread::sleep(SETTLE_POLL);
        }

        Ok(())
    }

    /// Runs `body` for every index in `0..iterations`, distributing the
    /// indices dynamically across `workers` workers.
    ///
    /// Iteration-to-worker assignment is load-balanced and unordered;
    /// callers must not assume which worker handles which index. Blocks
    /// until the whole range is exhausted.
    ///
    /// # Errors
    ///
    /// Same contract checks as [`run`](BatchPool::run).
    pub fn run_for<B: ForBody + ?Sized>(
        &mut self,
        body: &B,
        iterations: usize,
        workers: usize,
    ) -> Result<()> {
        let job = ParallelFor::new(body, iterations);
        self.run(&job, workers)
    }

    /// Adds one worker thread at the next free slot.
    fn spawn_worker(&mut self) {
        let index = self.workers.len();
        debug_assert!(index < MAX_WORKERS);

        let ctx = Arc::new(WorkerContext {
            index,
            worker_count: AtomicUsize::new(0),
            state: AtomicU8::new(WorkerState::Init as u8),
            wake: Signal::new(),
            job: Mutex::new(None),
        });

        let thread_ctx = Arc::clone(&ctx);
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("pool-worker-{index}"))
            .spawn(move || worker_loop(&thread_ctx, &shared))
            .expect("failed to spawn worker thread");

        self.workers.push(Worker { ctx, handle });

        // Workers spawned at a smaller pool size must still see the
        // grown count.
        let spawned = self.workers.len();
        for worker in &self.workers {
            worker.ctx.worker_count.store(spawned, Ordering::Release);
        }
        debug!("spawned worker {index}, pool size now {spawned}");
    }

    /// Stops and joins every worker thread, from the highest slot down.
    ///
    /// Safe to call with no batch in flight (the common case — `run`
    /// never returns mid-batch). After shutdown the pool is retired:
    /// every later `run` call fails with [`PoolError::Retired`].
    pub fn shutdown(&mut self) {
        for worker in self.workers.drain(..).rev() {
            let ctx = &worker.ctx;
            while ctx.state() != WorkerState::Idle {
                thread::sleep(SETTLE_POLL);
            }
            ctx.set_state(WorkerState::Done);
            ctx.wake.notify_one();
            while ctx.state() != WorkerState::Dead {
                thread::sleep(SETTLE_POLL);
            }
            if worker.handle.join().is_err() {
                error!("worker {} panicked during shutdown", ctx.index);
            }
        }
        self.retired = true;
    }
}

impl Default for BatchPool {
    fn default() -> BatchPool {
        BatchPool::new()
    }
}

impl Drop for BatchPool {
    fn drop(&mut self) {
        if !self.retired {
            self.shutdown();
        }
    }
}

use std::process::exit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use clap::Parser;
use log::{error, info};

use batchpool::{suggested_workers, BatchPool, Result, MAX_WORKERS};

#[derive(Parser)]
#[command(
    name = "batchpool-demo",
    version,
    about = "Demonstrates fan-out and parallel-for batches"
)]
struct Cli {
    /// Number of worker threads (default: one per processor)
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Iteration count for the parallel-for phase
    #[arg(long, default_value_t = 50_000, value_name = "N")]
    iterations: usize,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let threads = cli.threads.unwrap_or_else(suggested_workers).min(MAX_WORKERS);

    info!("batchpool-demo {}", env!("CARGO_PKG_VERSION"));
    info!("Running with {} worker threads", threads);

    let mut pool = BatchPool::new();

    // Fan-out phase: every worker stamps its own slot once.
    let slots: Vec<AtomicUsize> = (0..threads).map(|_| AtomicUsize::new(usize::MAX)).collect();
    let start = Instant::now();
    pool.run(
        &|worker: usize, count: usize| {
            slots[worker].store(worker, Ordering::Relaxed);
            info!("worker {} of {} running", worker, count);
        },
        threads,
    )?;
    info!("fan-out batch took {:?}", start.elapsed());

    for (i, slot) in slots.iter().enumerate() {
        assert_eq!(slot.load(Ordering::Relaxed), i, "slot {i} was not stamped");
    }

    // Parallel-for phase: fill an array with the id of the worker that
    // produced each entry, then summarize the distribution.
    let filled: Vec<AtomicUsize> = (0..cli.iterations)
        .map(|_| AtomicUsize::new(usize::MAX))
        .collect();
    let start = Instant::now();
    pool.run_for(
        &|i: usize, worker: usize, _count: usize| {
            filled[i].store(worker, Ordering::Relaxed);
        },
        cli.iterations,
        threads,
    )?;
    info!(
        "parallel-for over {} iterations took {:?}",
        cli.iterations,
        start.elapsed()
    );

    let mut per_worker = vec![0usize; threads];
    for entry in &filled {
        let worker = entry.load(Ordering::Relaxed);
        assert!(worker < threads, "entry left unfilled");
        per_worker[worker] += 1;
    }
    for (worker, n) in per_worker.iter().enumerate() {
        info!("worker {} filled {} entries", worker, n);
    }

    pool.shutdown();
    Ok(())
}

use std::time::Instant;
use threadmill::{PoolMode, ThreadPool};

fn main() {
    let pool = ThreadPool::new();
    pool.set_mode(PoolMode::Cached).unwrap();
    pool.set_queue_capacity(64).unwrap();
    pool.set_max_threads(32).unwrap();
    pool.start().unwrap();

    let now = Instant::now();
    let handles: Vec<_> = (0..100_000u64)
        .map(|i| pool.submit(move || i * i))
        .collect();

    let sum: u64 = handles
        .into_iter()
        .map(|h| h.join().expect("task failed"))
        .sum();

    let metrics = pool.metrics();
    println!("sum: {sum}, elapsed: {:?}", now.elapsed());
    println!(
        "workers: {}, completed: {}, rejected: {}",
        metrics.current_threads, metrics.completed_tasks, metrics.rejected_tasks
    );

    pool.shutdown();
}

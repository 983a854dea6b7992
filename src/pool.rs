use super::{
    errors::{ConfigurationRejected, TaskError},
    handle::{Job, TaskHandle},
    model::{PoolMetrics, PoolMode},
};
use std::{
    any::Any,
    collections::{HashMap, VecDeque},
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam::channel;
use log::{debug, trace};
use parking_lot::{Condvar, Mutex};

/// How long `submit` may wait for queue space before giving up.
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(1);
/// How often a cached-mode worker re-checks its idle clock while fetching.
const FETCH_POLL_INTERVAL: Duration = Duration::from_secs(1);

const WORKER_NAME_PREFIX: &str = "threadmill-worker";

/// Pool configuration
///
/// Every field is frozen once the pool starts; the setters on
/// [`ThreadPool`] reject changes after that point.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: PoolMode,
    /// Capacity of the submission queue. A submission finding it full
    /// waits for space up to a fixed timeout, then resolves to
    /// [`TaskError::QueueFull`].
    pub queue_capacity: usize,
    /// Ceiling for elastic growth. Consulted in `Cached` mode only.
    pub max_threads: usize,
    /// Idle duration after which an above-floor cached worker retires.
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: PoolMode::Fixed,
            queue_capacity: 2,
            max_threads: 1024,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn cached() -> Self {
        Self {
            mode: PoolMode::Cached,
            ..Default::default()
        }
    }
}

/// State guarded by the one pool mutex. Queue contents, counters, and
/// the worker mapping only ever change while this is held, so growth and
/// reclaim decisions cannot race each other.
struct Inner {
    config: Config,
    running: bool,
    initial_threads: usize,
    next_worker_id: usize,
    queue: VecDeque<Job>,
    idle: usize,
    current: usize,
    workers: HashMap<usize, thread::JoinHandle<()>>,
    /// Handles of workers that already left the mapping, joined at
    /// teardown for deterministic resource release.
    retired: Vec<thread::JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<Inner>,
    not_full: Condvar,
    not_empty: Condvar,
    all_exited: Condvar,
    submitted_tasks: AtomicUsize,
    rejected_tasks: AtomicUsize,
    completed_tasks: Arc<AtomicUsize>,
    failed_tasks: Arc<AtomicUsize>,
}

impl Shared {
    /// Spawn one worker and account for it. The lock is held across the
    /// spawn so the new thread cannot observe the pool before its own
    /// mapping entry exists.
    fn spawn_worker(shared: &Arc<Shared>, inner: &mut Inner) {
        let id = inner.next_worker_id;
        inner.next_worker_id += 1;

        let cloned = Arc::clone(shared);
        let handle = thread::Builder::new()
            .name(format!("{WORKER_NAME_PREFIX}-{id}"))
            .spawn(move || cloned.worker_loop(id))
            .expect("failed to spawn worker thread");

        inner.workers.insert(id, handle);
        inner.current += 1;
        inner.idle += 1;
        trace!("worker {id} spawned");
    }

    /// The fetch-execute cycle every worker runs until it exits.
    fn worker_loop(&self, id: usize) {
        let mut last_active = Instant::now();

        loop {
            let job = {
                let mut inner = self.inner.lock();

                loop {
                    if !inner.running {
                        trace!("worker {id} exiting: pool stopping");
                        self.retire(&mut inner, id);
                        return;
                    }

                    if let Some(job) = inner.queue.pop_front() {
                        inner.idle -= 1;
                        trace!("worker {id} acquired a task ({} still queued)", inner.queue.len());

                        // Wake the remaining idle workers too when work is
                        // left over, and any submitter waiting for space.
                        if !inner.queue.is_empty() {
                            self.not_empty.notify_all();
                        }
                        self.not_full.notify_all();

                        break job;
                    }

                    trace!("worker {id} fetching");
                    match inner.config.mode {
                        PoolMode::Fixed => {
                            self.not_empty.wait(&mut inner);
                        }
                        PoolMode::Cached => {
                            let timed_out = self
                                .not_empty
                                .wait_for(&mut inner, FETCH_POLL_INTERVAL)
                                .timed_out();

                            if timed_out
                                && last_active.elapsed() >= inner.config.idle_timeout
                                && inner.current > inner.initial_threads
                            {
                                trace!("worker {id} exiting: idle past reclaim threshold");
                                self.retire(&mut inner, id);
                                return;
                            }
                        }
                    }
                }
            };

            job();

            let mut inner = self.inner.lock();
            inner.idle += 1;
            drop(inner);
            last_active = Instant::now();
        }
    }

    /// Remove the calling worker from the pool. Runs with the lock held,
    /// always from the fetch state, where the worker is counted idle.
    fn retire(&self, inner: &mut Inner, id: usize) {
        if let Some(handle) = inner.workers.remove(&id) {
            inner.retired.push(handle);
        }
        inner.current -= 1;
        inner.idle -= 1;
        self.all_exited.notify_all();
    }
}

/// A pool of OS worker threads executing submitted tasks in FIFO order.
///
/// Configure before [`start`](ThreadPool::start), then [`submit`] work and
/// [`join`](TaskHandle::join) the returned handles. Dropping the pool shuts
/// it down synchronously: in-flight tasks finish, queued-but-unstarted
/// tasks are discarded, and every worker thread is joined.
///
/// [`submit`]: ThreadPool::submit
pub struct ThreadPool {
    shared: Arc<Shared>,
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadPool {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        assert!(config.queue_capacity > 0, "queue capacity must be non-zero");
        assert!(config.max_threads > 0, "thread ceiling must be non-zero");

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    config,
                    running: false,
                    initial_threads: 0,
                    next_worker_id: 0,
                    queue: VecDeque::new(),
                    idle: 0,
                    current: 0,
                    workers: HashMap::new(),
                    retired: Vec::new(),
                }),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
                all_exited: Condvar::new(),
                submitted_tasks: AtomicUsize::new(0),
                rejected_tasks: AtomicUsize::new(0),
                completed_tasks: Arc::new(AtomicUsize::new(0)),
                failed_tasks: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Select `Fixed` or `Cached` sizing. Rejected once running.
    pub fn set_mode(&self, mode: PoolMode) -> Result<(), ConfigurationRejected> {
        let mut inner = self.shared.inner.lock();
        if inner.running {
            return Err(ConfigurationRejected);
        }
        inner.config.mode = mode;
        Ok(())
    }

    /// Set the submission queue capacity. Rejected once running.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn set_queue_capacity(&self, capacity: usize) -> Result<(), ConfigurationRejected> {
        assert!(capacity > 0, "queue capacity must be non-zero");
        let mut inner = self.shared.inner.lock();
        if inner.running {
            return Err(ConfigurationRejected);
        }
        inner.config.queue_capacity = capacity;
        Ok(())
    }

    /// Set the elastic-growth ceiling. Stored in any mode but only
    /// `Cached` growth consults it. Rejected once running.
    ///
    /// # Panics
    ///
    /// Panics if `max_threads` is zero.
    pub fn set_max_threads(&self, max_threads: usize) -> Result<(), ConfigurationRejected> {
        assert!(max_threads > 0, "thread ceiling must be non-zero");
        let mut inner = self.shared.inner.lock();
        if inner.running {
            return Err(ConfigurationRejected);
        }
        inner.config.max_threads = max_threads;
        Ok(())
    }

    /// Set how long an above-floor cached worker may idle before it
    /// retires. Rejected once running.
    pub fn set_idle_timeout(&self, idle_timeout: Duration) -> Result<(), ConfigurationRejected> {
        let mut inner = self.shared.inner.lock();
        if inner.running {
            return Err(ConfigurationRejected);
        }
        inner.config.idle_timeout = idle_timeout;
        Ok(())
    }

    /// Start with one worker per available CPU core.
    pub fn start(&self) -> Result<(), ConfigurationRejected> {
        self.start_with(num_cpus::get())
    }

    /// Start `initial_threads` workers. Restarting a running pool is
    /// rejected like any other configuration change.
    ///
    /// # Panics
    ///
    /// Panics if `initial_threads` is zero.
    pub fn start_with(&self, initial_threads: usize) -> Result<(), ConfigurationRejected> {
        assert!(initial_threads > 0, "initial thread count must be non-zero");

        let mut inner = self.shared.inner.lock();
        if inner.running {
            return Err(ConfigurationRejected);
        }

        inner.running = true;
        inner.initial_threads = initial_threads;
        for _ in 0..initial_threads {
            Shared::spawn_worker(&self.shared, &mut inner);
        }

        debug!(
            "pool started: {initial_threads} workers, {:?} mode, queue capacity {}",
            inner.config.mode, inner.config.queue_capacity
        );
        Ok(())
    }

    /// Submit a closure for execution and get a handle to its outcome.
    ///
    /// The handle always resolves to exactly one outcome: the closure's
    /// return value, [`TaskError::Panic`] if it panicked,
    /// [`TaskError::QueueFull`] if the queue stayed full past the
    /// submission timeout, or [`TaskError::PoolStopped`] if the pool was
    /// not running or was torn down before the task ran.
    pub fn submit<F, T>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        let handle = TaskHandle::new(rx);

        self.shared.submitted_tasks.fetch_add(1, Ordering::Relaxed);

        let completed = Arc::clone(&self.shared.completed_tasks);
        let failed = Arc::clone(&self.shared.failed_tasks);
        let result_tx = tx.clone();

        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f))
                .map_err(|payload| TaskError::Panic(panic_message(payload.as_ref())));

            if outcome.is_ok() {
                completed.fetch_add(1, Ordering::Relaxed);
            } else {
                failed.fetch_add(1, Ordering::Relaxed);
            }

            // The receiver may already be gone; delivery is best effort.
            let _ = result_tx.send(outcome);
        });

        if let Err(rejection) = self.enqueue(job) {
            self.shared.rejected_tasks.fetch_add(1, Ordering::Relaxed);
            let _ = tx.send(Err(rejection));
        }

        handle
    }

    /// Append a job to the queue, waiting up to the submission timeout
    /// for space. Elastic growth is judged here, per submission, under
    /// the same lock as the queue mutation.
    fn enqueue(&self, job: Job) -> Result<(), TaskError> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();

        if !inner.running {
            return Err(TaskError::PoolStopped);
        }

        let deadline = Instant::now() + ENQUEUE_TIMEOUT;
        while inner.queue.len() >= inner.config.queue_capacity {
            let now = Instant::now();
            if now >= deadline {
                debug!("submission rejected: queue still full after {ENQUEUE_TIMEOUT:?}");
                return Err(TaskError::QueueFull);
            }
            shared.not_full.wait_for(&mut inner, deadline - now);

            if !inner.running {
                return Err(TaskError::PoolStopped);
            }
        }

        inner.queue.push_back(job);
        shared.not_empty.notify_all();

        if inner.config.mode == PoolMode::Cached
            && inner.queue.len() > inner.idle
            && inner.current < inner.config.max_threads
        {
            debug!(
                "growing pool: {} queued tasks, {} idle of {} workers",
                inner.queue.len(),
                inner.idle,
                inner.current
            );
            Shared::spawn_worker(shared, &mut inner);
        }

        Ok(())
    }

    /// Stop the pool and block until every worker has exited.
    ///
    /// In-flight tasks run to completion first. Tasks still queued are
    /// discarded and their handles resolve to [`TaskError::PoolStopped`];
    /// this is the teardown contract, not an error. Idempotent, and
    /// invoked automatically when the pool is dropped.
    pub fn shutdown(&self) {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();

        if inner.running {
            inner.running = false;

            let discarded = inner.queue.len();
            inner.queue.clear();
            if discarded > 0 {
                debug!("shutdown discarding {discarded} queued tasks");
            }

            shared.not_empty.notify_all();
            shared.not_full.notify_all();
        }

        while !inner.workers.is_empty() {
            shared.all_exited.wait(&mut inner);
        }

        let retired = mem::take(&mut inner.retired);
        drop(inner);

        for handle in retired {
            let _ = handle.join();
        }
        debug!("pool shut down, all workers joined");
    }

    pub fn is_running(&self) -> bool {
        self.shared.inner.lock().running
    }

    /// Number of live worker threads.
    pub fn threads(&self) -> usize {
        self.shared.inner.lock().current
    }

    /// Number of tasks accepted but not yet picked up by a worker.
    pub fn queued_tasks(&self) -> usize {
        self.shared.inner.lock().queue.len()
    }

    pub fn metrics(&self) -> PoolMetrics {
        let shared = &self.shared;
        let inner = shared.inner.lock();
        PoolMetrics {
            current_threads: inner.current,
            idle_threads: inner.idle,
            queued_tasks: inner.queue.len(),
            submitted_tasks: shared.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: shared.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: shared.failed_tasks.load(Ordering::Relaxed),
            rejected_tasks: shared.rejected_tasks.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_owned()
    }
}

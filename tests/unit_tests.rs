#[cfg(test)]
mod tests {
    use threadmill::{
        errors::TaskError,
        model::PoolMode,
        pool::{Config, ThreadPool},
    };
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        thread,
        time::{Duration, Instant},
    };

    use crossbeam::channel;

    fn fixed_pool(workers: usize, queue_capacity: usize) -> ThreadPool {
        let pool = ThreadPool::with_config(Config {
            queue_capacity,
            ..Config::default()
        });
        pool.start_with(workers).unwrap();
        pool
    }

    #[test]
    fn test_each_task_runs_exactly_once() {
        let pool = fixed_pool(4, 32);
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let counter = Arc::clone(&counter);
                pool.submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    i
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join(), Ok(i));
        }

        assert_eq!(counter.load(Ordering::SeqCst), 100);
        let metrics = pool.metrics();
        assert_eq!(metrics.completed_tasks, 100);
        assert_eq!(metrics.failed_tasks, 0);
        assert_eq!(metrics.submitted_tasks, 100);
    }

    #[test]
    fn test_saturated_pool_delays_excess_task() {
        let pool = fixed_pool(4, 2);
        let start = Instant::now();

        let blockers: Vec<_> = (0..4)
            .map(|_| pool.submit(|| thread::sleep(Duration::from_millis(200))))
            .collect();
        let fifth = pool.submit(|| thread::sleep(Duration::from_millis(200)));

        for handle in blockers {
            assert!(handle.join().is_ok());
        }
        assert!(fifth.join().is_ok());

        // The fifth task cannot start until one of the first four worker
        // slots frees up, so two full batches must elapse.
        let elapsed = start.elapsed();
        println!("saturated batch elapsed: {elapsed:?}");
        assert!(elapsed >= Duration::from_millis(350), "finished too fast: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1500), "finished too slow: {elapsed:?}");
    }

    #[test]
    fn test_full_queue_surfaces_rejection_after_timeout() {
        let pool = fixed_pool(1, 1);
        let (release_tx, release_rx) = channel::bounded::<()>(1);

        let blocker = pool.submit(move || {
            release_rx.recv().ok();
        });
        // Give the worker time to occupy itself with the blocker.
        thread::sleep(Duration::from_millis(50));

        let queued = pool.submit(|| 1);

        let start = Instant::now();
        let rejected = pool.submit(|| 2);
        let waited = start.elapsed();

        assert_eq!(rejected.join(), Err(TaskError::QueueFull));
        assert!(waited >= Duration::from_millis(900), "gave up too early: {waited:?}");
        assert_eq!(pool.metrics().rejected_tasks, 1);

        release_tx.send(()).unwrap();
        assert!(blocker.join().is_ok());
        assert_eq!(queued.join(), Ok(1));
    }

    #[test]
    fn test_task_panic_is_captured_and_pool_survives() {
        let _ = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));

        let pool = fixed_pool(2, 8);

        let failing = pool.submit(|| -> u32 { panic!("boom at task level") });
        match failing.join() {
            Err(TaskError::Panic(message)) => assert!(message.contains("boom")),
            other => panic!("expected captured panic, got {other:?}"),
        }

        let healthy = pool.submit(|| 7);
        assert_eq!(healthy.join(), Ok(7));

        let metrics = pool.metrics();
        assert_eq!(metrics.failed_tasks, 1);
        assert_eq!(metrics.completed_tasks, 1);

        let _ = std::panic::take_hook();
    }

    #[test]
    fn test_single_worker_preserves_submission_order() {
        let pool = fixed_pool(1, 16);
        let order = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let order = Arc::clone(&order);
                pool.submit(move || order.lock().unwrap().push(i))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().is_ok());
        }

        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_configuration_rejected_once_running() {
        let pool = ThreadPool::new();
        pool.set_mode(PoolMode::Cached).unwrap();
        pool.set_queue_capacity(8).unwrap();
        pool.set_max_threads(16).unwrap();
        pool.set_idle_timeout(Duration::from_secs(5)).unwrap();

        pool.start_with(2).unwrap();

        assert!(pool.set_mode(PoolMode::Fixed).is_err());
        assert!(pool.set_queue_capacity(4).is_err());
        assert!(pool.set_max_threads(8).is_err());
        assert!(pool.set_idle_timeout(Duration::from_secs(1)).is_err());
        assert!(pool.start_with(2).is_err());

        // The rejected changes left the pool intact.
        assert_eq!(pool.threads(), 2);
        assert_eq!(pool.submit(|| 41 + 1).join(), Ok(42));
    }

    #[test]
    fn test_submit_before_start_resolves_stopped() {
        let pool = ThreadPool::new();
        let handle = pool.submit(|| 3);
        assert_eq!(handle.join(), Err(TaskError::PoolStopped));
    }

    #[test]
    fn test_teardown_discards_queued_tasks_and_joins_workers() {
        let pool = fixed_pool(1, 8);

        let in_flight = pool.submit(|| {
            thread::sleep(Duration::from_millis(200));
            "done"
        });
        thread::sleep(Duration::from_millis(50));

        let queued: Vec<_> = (0..5).map(|i| pool.submit(move || i)).collect();

        pool.shutdown();

        assert!(!pool.is_running());
        assert_eq!(pool.threads(), 0);
        assert_eq!(pool.queued_tasks(), 0);

        // The task a worker had already picked up ran to completion; the
        // rest never execute.
        assert_eq!(in_flight.join(), Ok("done"));
        for handle in queued {
            assert_eq!(handle.join(), Err(TaskError::PoolStopped));
        }
        assert_eq!(pool.metrics().completed_tasks, 1);

        let late = pool.submit(|| 9);
        assert_eq!(late.join(), Err(TaskError::PoolStopped));
    }

    #[test]
    fn test_join_timeout_elapses_while_task_still_completes() {
        let pool = fixed_pool(1, 4);
        let counter = Arc::new(AtomicUsize::new(0));

        let slow = {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(300));
                counter.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert_eq!(slow.join_timeout(Duration::from_millis(50)), Err(TaskError::Timeout));

        // Shutdown waits for the in-flight task, so the side effect is
        // visible afterwards even though the handle timed out.
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_try_join_polls_without_blocking() {
        let pool = fixed_pool(1, 4);

        let handle = pool.submit(|| {
            thread::sleep(Duration::from_millis(150));
            5
        });

        assert!(handle.try_join().is_none());
        thread::sleep(Duration::from_millis(400));
        assert_eq!(handle.try_join(), Some(Ok(5)));
    }

    #[test]
    fn test_fixed_mode_thread_count_never_changes() {
        let pool = fixed_pool(3, 16);

        let handles: Vec<_> = (0..50)
            .map(|i| pool.submit(move || i * 2))
            .collect();

        for _ in 0..10 {
            let metrics = pool.metrics();
            assert_eq!(metrics.current_threads, 3);
            assert!(metrics.idle_threads <= metrics.current_threads);
            thread::sleep(Duration::from_millis(5));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join(), Ok(i * 2));
        }
        assert_eq!(pool.threads(), 3);
    }
}

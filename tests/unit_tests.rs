#[cfg(test)]
mod tests {
    use dynpool::{
        errors::{PoolError, TaskError},
        pool::{Config, DynamicPool, FirePool},
    };
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    fn small_config() -> Config {
        Config {
            initial_workers: 2,
            max_workers: 4,
            lifetime: 100,
        }
    }

    /// Polls `cond` every 5 ms until it holds or `timeout` elapses.
    fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_config_validation() {
        let reject = |config: Config| {
            match DynamicPool::new(config, |x: u32| x) {
                Err(PoolError::InvalidConfig(_)) => {}
                Ok(_) => panic!("configuration should have been rejected"),
                Err(e) => panic!("unexpected error: {e:?}"),
            };
        };

        reject(Config {
            initial_workers: 0,
            max_workers: 0,
            lifetime: 10,
        });
        reject(Config {
            initial_workers: 0,
            max_workers: 4,
            lifetime: 0,
        });
        reject(Config {
            initial_workers: 8,
            max_workers: 4,
            lifetime: 10,
        });

        // Zero initial workers is a legal, purely growth-driven pool.
        let pool = DynamicPool::new(
            Config {
                initial_workers: 0,
                max_workers: 2,
                lifetime: 10,
            },
            |x: u32| x + 1,
        )
        .unwrap();
        assert_eq!(pool.status().workers, 0);
        assert_eq!(pool.submit(1).unwrap().wait(), Ok(2));
    }

    #[test]
    fn test_each_result_matches_its_item() {
        let pool = DynamicPool::new(small_config(), |x: u64| x * 2).unwrap();

        let handles: Vec<_> = (0..50u64).map(|i| pool.submit(i).unwrap()).collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.wait(), Ok(i as u64 * 2));
        }

        let status = pool.status();
        assert_eq!(status.completed, 50);
        assert_eq!(status.failed, 0);
    }

    #[test]
    fn test_submit_after_shutdown_fails_fast() {
        let pool = DynamicPool::new(small_config(), |x: u32| x).unwrap();
        pool.shutdown();

        match pool.submit(7) {
            Err(PoolError::Closed) => {}
            Ok(_) => panic!("submission after shutdown must be rejected"),
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }

    #[test]
    fn test_shutdown_drains_and_stops_execution() {
        let pool = DynamicPool::new(
            Config {
                initial_workers: 1,
                max_workers: 1,
                lifetime: 100,
            },
            |x: u32| {
                thread::sleep(Duration::from_millis(100));
                x
            },
        )
        .unwrap();

        let handles: Vec<_> = (0..10u32).map(|i| pool.submit(i).unwrap()).collect();
        pool.shutdown();

        // Drained: counter at zero, and nothing executes afterwards.
        assert_eq!(pool.status().workers, 0);
        let executed = pool.status().executed();
        thread::sleep(Duration::from_millis(250));
        assert_eq!(pool.status().executed(), executed);

        // Every handle resolves: either with its value or as dropped.
        let mut fulfilled = 0;
        let mut closed = 0;
        for handle in handles {
            match handle.wait() {
                Ok(_) => fulfilled += 1,
                Err(TaskError::ChannelClosed) => closed += 1,
                Err(e) => panic!("unexpected resolution: {e:?}"),
            }
        }
        assert_eq!(fulfilled + closed, 10);
        assert_eq!(fulfilled, executed);
        assert!(closed >= 1, "single slow worker cannot have drained the queue");
    }

    #[test]
    fn test_worker_retires_after_lifetime() {
        let pool = DynamicPool::new(
            Config {
                initial_workers: 1,
                max_workers: 1,
                lifetime: 3,
            },
            |x: u32| x + 1,
        )
        .unwrap();

        for i in 0..3u32 {
            assert_eq!(pool.submit(i).unwrap().wait(), Ok(i + 1));
        }

        // Life budget of 3 is spent; the worker retires and, with an empty
        // queue, no successor replaces it.
        assert!(
            wait_until(Duration::from_secs(2), || pool.status().workers == 0),
            "worker should retire after exactly `lifetime` items"
        );

        // The next submission revives the pool through the growth path.
        assert_eq!(pool.submit(9).unwrap().wait(), Ok(10));
        assert_eq!(pool.status().completed, 4);
    }

    #[test]
    fn test_growth_worker_has_short_fixed_budget() {
        let pool = DynamicPool::new(
            Config {
                initial_workers: 0,
                max_workers: 1,
                lifetime: 1_000,
            },
            |x: u32| x,
        )
        .unwrap();

        // First submission growth-spawns a worker whose budget is 10 items,
        // seeded item included, regardless of the configured lifetime.
        for i in 0..10u32 {
            assert_eq!(pool.submit(i).unwrap().wait(), Ok(i));
        }
        assert!(
            wait_until(Duration::from_secs(2), || pool.status().workers == 0),
            "growth-spawned worker should retire after its fixed budget"
        );
        assert_eq!(pool.status().completed, 10);
    }

    #[test]
    fn test_status_counters_stay_plausible() {
        let pool = DynamicPool::new(
            Config {
                initial_workers: 2,
                max_workers: 4,
                lifetime: 50,
            },
            |x: u32| {
                thread::sleep(Duration::from_millis(2));
                x
            },
        )
        .unwrap();

        let mut handles = Vec::new();
        for i in 0..200u32 {
            handles.push(pool.submit(i).unwrap());
            // The three counters are sampled independently; allow the
            // documented transient skew but nothing systematic.
            let status = pool.status();
            assert!(status.waiting + status.working <= status.workers + 8);
            // The cap bounds proactive growth, with transient slack while
            // retiring workers hand off to successors.
            assert!(status.workers <= 4 + 4);
        }

        for handle in handles {
            assert!(handle.wait().is_ok());
        }
    }

    #[test]
    fn test_idle_shutdown_is_prompt() {
        let pool = DynamicPool::new(small_config(), |x: u32| x).unwrap();

        let start = Instant::now();
        pool.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(pool.status().workers, 0);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = DynamicPool::new(small_config(), |x: u32| x).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.status().workers, 0);
        // Drop runs it a third time.
    }

    #[test]
    fn test_handler_panic_fails_item_not_worker() {
        let pool = DynamicPool::new(small_config(), |x: u32| {
            if x == 13 {
                panic!("boom at {x}");
            }
            x * 10
        })
        .unwrap();

        let unlucky = pool.submit(13).unwrap();
        match unlucky.wait() {
            Err(TaskError::Panic(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected a panic resolution, got {other:?}"),
        }

        // Workers survive their handler's panics.
        assert_eq!(pool.submit(4).unwrap().wait(), Ok(40));
        let status = pool.status();
        assert_eq!(status.failed, 1);
        assert_eq!(status.completed, 1);
    }

    #[test]
    fn test_fire_pool_hook_sees_outcomes() {
        let succeeded = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let (s, f) = (Arc::clone(&succeeded), Arc::clone(&failed));

        let pool = FirePool::with_hook(
            small_config(),
            |x: u32| x % 2 == 0,
            move |ok| {
                if ok {
                    s.fetch_add(1, Ordering::Relaxed);
                } else {
                    f.fetch_add(1, Ordering::Relaxed);
                }
            },
        )
        .unwrap();

        for i in 0..20u32 {
            pool.submit(i).unwrap();
        }
        assert!(wait_until(Duration::from_secs(5), || {
            succeeded.load(Ordering::Relaxed) + failed.load(Ordering::Relaxed) == 20
        }));

        assert_eq!(succeeded.load(Ordering::Relaxed), 10);
        assert_eq!(failed.load(Ordering::Relaxed), 10);
        let status = pool.status();
        assert_eq!(status.completed, 10);
        assert_eq!(status.failed, 10);
        assert!((status.success_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fire_pool_panic_counts_as_failure() {
        let pool = FirePool::new(small_config(), |x: u32| {
            if x == 0 {
                panic!("fire panic");
            }
            true
        })
        .unwrap();

        pool.submit(0).unwrap();
        pool.submit(1).unwrap();
        assert!(wait_until(Duration::from_secs(5), || pool.status().executed() == 2));
        assert_eq!(pool.status().failed, 1);
        assert_eq!(pool.status().completed, 1);
    }

    #[test]
    fn test_fire_pool_hook_panic_does_not_kill_worker() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let pool = FirePool::with_hook(
            Config {
                initial_workers: 1,
                max_workers: 1,
                lifetime: 100,
            },
            |_x: u32| true,
            move |_ok| {
                if seen.fetch_add(1, Ordering::Relaxed) == 0 {
                    panic!("hook boom");
                }
            },
        )
        .unwrap();

        pool.submit(1).unwrap();
        assert!(wait_until(Duration::from_secs(5), || pool.status().completed == 1));

        // The worker outlives its hook's panic and keeps executing; the
        // panicking hook does not fail the item it observed.
        pool.submit(2).unwrap();
        assert!(wait_until(Duration::from_secs(5), || pool.status().completed == 2));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(pool.status().failed, 0);

        // Counters stayed balanced, so the drain terminates.
        pool.shutdown();
        let status = pool.status();
        assert_eq!(status.workers, 0);
        assert_eq!(status.working, 0);
    }

    #[test]
    fn test_submit_racing_shutdown_never_strands_a_handle() {
        for _ in 0..20 {
            let pool = Arc::new(DynamicPool::new(small_config(), |x: u32| x).unwrap());

            let submitter = {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let mut handles = Vec::new();
                    for i in 0..200u32 {
                        match pool.submit(i) {
                            Ok(handle) => handles.push(handle),
                            Err(PoolError::Closed) => break,
                            Err(e) => panic!("unexpected submit error: {e:?}"),
                        }
                    }
                    handles
                })
            };

            thread::sleep(Duration::from_micros(50));
            pool.shutdown();
            let handles = submitter.join().unwrap();

            // Nothing slips into the queue behind the shutdown drain; every
            // accepted submission resolves, executed or dropped.
            assert_eq!(pool.pending(), 0);
            for handle in handles {
                match handle.wait() {
                    Ok(_) | Err(TaskError::ChannelClosed) => {}
                    Err(e) => panic!("unexpected resolution: {e:?}"),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_handles_are_futures() {
        let pool = DynamicPool::new(small_config(), |x: u64| x + 100).unwrap();

        let handles: Vec<_> = (0..100u64).map(|i| pool.submit(i).unwrap()).collect();
        let results = dynpool::join_all(handles).await;

        let mut values: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        values.sort_unstable();
        assert_eq!(values, (100..200u64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_wait_timeout_leaves_item_running() {
        let pool = DynamicPool::new(small_config(), |x: u32| {
            thread::sleep(Duration::from_millis(500));
            x
        })
        .unwrap();

        let handle = pool.submit(1).unwrap();
        let result = handle.wait_timeout(Duration::from_millis(50)).await;
        assert_eq!(result, Err(TaskError::Timeout));

        // The wait gave up; the execution did not.
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(pool.status().completed, 1);
    }
}

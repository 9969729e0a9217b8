use super::*;

use crate::error::ConfigError;
use crate::testkit;
use crate::testkit::MemoryBackend;

// -- Helpers --------------------------------------------------------------

type MemoryPool = ConnectionPool<MemoryBackend>;

fn build(backend: MemoryBackend, config: PoolConfig) -> (Arc<MemoryBackend>, Arc<MemoryPool>) {
    let backend = Arc::new(backend);
    let pool = ConnectionPool::new(Arc::clone(&backend), config).unwrap();
    (backend, pool)
}

fn assert_invariants(pool: &MemoryPool) {
    let stats = pool.stats();
    assert!(!stats.stale);
    assert!(stats.active <= stats.total, "{stats:?}");
    assert!(stats.total <= pool.config().max_size, "{stats:?}");
    assert!(stats.idle + stats.active <= stats.total, "{stats:?}");
}

const SECOND: Duration = Duration::from_secs(1);

// -- Config validation ----------------------------------------------------

#[test]
fn test_new_rejects_min_above_max() {
    let backend = Arc::new(MemoryBackend::new());
    let result = ConnectionPool::new(backend, testkit::config::pool(5, 2));
    assert!(matches!(
        result,
        Err(crate::error::Error::Config(ConfigError::InvalidValue {
            field: "min_size",
            ..
        }))
    ));
}

#[test]
fn test_new_rejects_zero_idle_check_interval() {
    let backend = Arc::new(MemoryBackend::new());
    let mut config = testkit::config::pool(1, 2);
    config.idle_check_interval_secs = 0;
    assert!(ConnectionPool::new(backend, config).is_err());
}

// -- Warmup and acquire ---------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_warmup_creates_min_size() {
    let (backend, pool) = build(MemoryBackend::new(), testkit::config::pool(3, 5));
    assert_eq!(pool.warmup().await, 3);

    let stats = pool.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.idle, 3);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.created, 3);
    assert_eq!(backend.connects(), 3);
    pool.close_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_warmup_skips_slots_that_cannot_be_created() {
    let backend = MemoryBackend::new();
    backend.set_connects_failing(true);
    let (_backend, pool) = build(backend, testkit::config::pool(2, 4));

    assert_eq!(pool.warmup().await, 0);
    let stats = pool.stats();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.created, 0);
    pool.close_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_acquire_prefers_most_recently_released() {
    let (_backend, pool) = build(MemoryBackend::new(), testkit::config::pool(0, 3));
    let a = pool.acquire("w1", SECOND).await.unwrap();
    let b = pool.acquire("w2", SECOND).await.unwrap();
    let (a_id, b_id) = (a.id(), b.id());
    pool.release(a).await;
    pool.release(b).await;

    let next = pool.acquire("w3", SECOND).await.unwrap();
    assert_eq!(next.id(), b_id);
    assert_ne!(next.id(), a_id);
    assert_eq!(next.acquired_by(), Some("w3"));
    assert!(next.acquired_at().is_some());
    pool.release(next).await;
}

#[tokio::test(start_paused = true)]
async fn test_fifth_acquire_waits_for_release() {
    let (_backend, pool) = build(MemoryBackend::new(), testkit::config::pool(0, 4));

    let mut held = Vec::new();
    for i in 0..4 {
        held.push(pool.acquire(&format!("w{i}"), SECOND).await.unwrap());
    }
    assert_eq!(pool.stats().active, 4);

    // Exhausted: times out.
    let err = pool.acquire("w4", SECOND).await.unwrap_err();
    assert!(matches!(err, PoolError::Timeout { .. }), "{err}");
    assert_invariants(&pool);

    // A release during the wait hands the connection over.
    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire("w4", Duration::from_secs(5)).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    let released = held.pop().unwrap();
    let released_id = released.id();
    pool.release(released).await;

    let handle = waiter.await.unwrap().unwrap();
    assert_eq!(handle.id(), released_id);
    assert_eq!(pool.stats().active, 4);
    assert_eq!(pool.stats().total, 4);
    assert_invariants(&pool);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_acquires_never_exceed_max() {
    let (backend, pool) = build(
        MemoryBackend::new().with_connect_latency(Duration::from_millis(5)),
        testkit::config::pool(0, 3),
    );

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..12 {
        let pool = Arc::clone(&pool);
        tasks.spawn(async move {
            let owner = format!("w{i}");
            for _ in 0..5 {
                let handle = pool.acquire(&owner, Duration::from_secs(30)).await.unwrap();
                let stats = pool.stats();
                assert!(stats.total <= 3);
                assert!(stats.active <= stats.total);
                tokio::time::sleep(Duration::from_millis(3)).await;
                pool.release(handle).await;
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    assert_eq!(backend.connects(), 3);
    assert_eq!(pool.stats().active, 0);
    assert_invariants(&pool);
}

#[tokio::test(start_paused = true)]
async fn test_expired_idle_connection_is_never_returned() {
    let mut config = testkit::config::pool(2, 4);
    config.max_lifetime_secs = 10;
    let (backend, pool) = build(MemoryBackend::new(), config);
    pool.warmup().await;

    tokio::time::advance(Duration::from_secs(11)).await;
    let handle = pool.acquire("w", SECOND).await.unwrap();
    assert!(!handle.is_expired(Duration::from_secs(10), Instant::now()));
    assert!(handle.age(Instant::now()) < Duration::from_secs(10));

    let stats = pool.stats();
    assert_eq!(stats.recycled, 2);
    assert_eq!(backend.closes(), 2);
    pool.release(handle).await;
    assert_invariants(&pool);
    pool.close_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_idle_connection_is_replaced() {
    let (backend, pool) = build(MemoryBackend::new(), testkit::config::pool(1, 2));
    pool.warmup().await;
    backend.invalidate_existing();

    let handle = pool.acquire("w", SECOND).await.unwrap();
    assert_eq!(handle.id().get(), 2);
    assert_eq!(backend.closes(), 1);
    assert_eq!(pool.stats().total, 1);
    pool.release(handle).await;
    pool.close_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_acquire_gives_up_after_repeated_validation_failures() {
    let (backend, pool) = build(MemoryBackend::new(), testkit::config::pool(5, 5));
    pool.warmup().await;
    backend.set_validation_failing(true);

    let err = pool.acquire("w", Duration::from_secs(30)).await.unwrap_err();
    assert!(
        matches!(err, PoolError::Unavailable { attempts } if attempts == ACQUIRE_ATTEMPTS + 1),
        "{err}"
    );
    // Four idle connections tried and destroyed; one left.
    assert_eq!(backend.closes(), 4);
    assert_eq!(pool.stats().total, 1);
    assert_invariants(&pool);
    pool.close_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_acquire_reports_creation_failure() {
    let backend = MemoryBackend::new();
    backend.set_connects_failing(true);
    let (backend, pool) = build(backend, testkit::config::pool(0, 2));

    let err = pool.acquire("w", Duration::from_secs(30)).await.unwrap_err();
    assert!(
        matches!(err, PoolError::CreationFailed { attempts: 3, .. }),
        "{err}"
    );
    assert_eq!(backend.connect_failures(), 3);
    assert_eq!(pool.stats().total, 0);
}

#[tokio::test(start_paused = true)]
async fn test_creation_recovers_within_retry_budget() {
    let backend = MemoryBackend::new();
    backend.fail_next_connects(2);
    let (backend, pool) = build(backend, testkit::config::pool(0, 2));

    let handle = pool.acquire("w", Duration::from_secs(30)).await.unwrap();
    assert_eq!(backend.connect_failures(), 2);
    assert_eq!(pool.stats().created, 1);
    pool.release(handle).await;
}

// -- Release and discard --------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_release_requeues_valid_connection() {
    let (backend, pool) = build(MemoryBackend::new(), testkit::config::pool(0, 2));
    let handle = pool.acquire("w", SECOND).await.unwrap();
    pool.release(handle).await;

    let stats = pool.stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.total, 1);
    assert_eq!(backend.closes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_release_destroys_invalid_connection() {
    let (backend, pool) = build(MemoryBackend::new(), testkit::config::pool(0, 2));
    let handle = pool.acquire("w", SECOND).await.unwrap();
    backend.invalidate_existing();
    pool.release(handle).await;

    let stats = pool.stats();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.idle, 0);
    assert_eq!(backend.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_release_recycles_expired_connection_and_replaces_it() {
    let mut config = testkit::config::pool(0, 2);
    config.max_lifetime_secs = 5;
    let (backend, pool) = build(MemoryBackend::new(), config);
    let handle = pool.acquire("w", SECOND).await.unwrap();
    let old_id = handle.id();

    tokio::time::advance(Duration::from_secs(6)).await;
    pool.release(handle).await;

    let stats = pool.stats();
    assert_eq!(stats.recycled, 1);
    assert_eq!(stats.total, 1);
    assert_eq!(stats.idle, 1);
    assert_eq!(backend.connects(), 2);

    let fresh = pool.acquire("w", SECOND).await.unwrap();
    assert_ne!(fresh.id(), old_id);
    pool.release(fresh).await;
}

#[tokio::test(start_paused = true)]
async fn test_discard_frees_slot_and_counts() {
    let (backend, pool) = build(MemoryBackend::new(), testkit::config::pool(0, 1));
    let handle = pool.acquire("w", SECOND).await.unwrap();
    pool.discard(handle).await;

    let stats = pool.stats();
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.total, 0);
    assert_eq!(stats.active, 0);
    assert_eq!(backend.closes(), 1);

    // The freed slot lets the next caller grow the pool again.
    let handle = pool.acquire("w", SECOND).await.unwrap();
    assert_eq!(pool.stats().total, 1);
    pool.release(handle).await;
}

#[tokio::test(start_paused = true)]
async fn test_discard_wakes_waiter() {
    let (_backend, pool) = build(MemoryBackend::new(), testkit::config::pool(0, 1));
    let handle = pool.acquire("w1", SECOND).await.unwrap();

    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire("w2", Duration::from_secs(5)).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    pool.discard(handle).await;

    let fresh = waiter.await.unwrap().unwrap();
    assert_eq!(fresh.acquired_by(), Some("w2"));
    assert_eq!(pool.stats().total, 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_errors_are_counted_not_fatal() {
    let (backend, pool) = build(MemoryBackend::new(), testkit::config::pool(0, 2));
    backend.set_close_failing(true);
    let handle = pool.acquire("w", SECOND).await.unwrap();
    pool.discard(handle).await;

    let stats = pool.stats();
    assert_eq!(stats.close_errors, 1);
    assert_eq!(stats.total, 0);
}

// -- Close ----------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_close_all_closes_idle_and_rejects_acquire() {
    let (backend, pool) = build(MemoryBackend::new(), testkit::config::pool(3, 4));
    pool.warmup().await;
    let outstanding = pool.acquire("w", SECOND).await.unwrap();

    pool.close_all().await;
    assert!(pool.is_closed());
    assert_eq!(backend.closes(), 2);
    let stats = pool.stats();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.active, 0);

    let err = pool.acquire("w", SECOND).await.unwrap_err();
    assert!(matches!(err, PoolError::Closed));

    // Late release closes the connection without disturbing the counters.
    pool.release(outstanding).await;
    assert_eq!(backend.open_connections(), 0);
    assert_eq!(pool.stats().total, 0);

    // Idempotent.
    pool.close_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_close_all_wakes_waiters_with_closed() {
    let (_backend, pool) = build(MemoryBackend::new(), testkit::config::pool(0, 1));
    let held = pool.acquire("w1", SECOND).await.unwrap();
    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire("w2", Duration::from_secs(60)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    pool.close_all().await;
    assert!(matches!(waiter.await.unwrap(), Err(PoolError::Closed)));
    pool.release(held).await;
}

// -- Stats ----------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_stats_do_not_block_under_contention() {
    let (_backend, pool) = build(MemoryBackend::new(), testkit::config::pool(2, 3));
    pool.warmup().await;

    let guard = pool.state.lock();
    let stats = pool.stats();
    drop(guard);

    assert!(stats.stale);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.idle, 2);
    assert!(!pool.stats().stale);
    pool.close_all().await;
}

// -- Health monitor -------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_leak_warned_once_per_sweep() {
    let mut config = testkit::config::pool(1, 2);
    config.leak_detection_threshold_secs = 5;
    let (_backend, pool) = build(MemoryBackend::new(), config);
    let handle = pool.acquire("slow-worker", SECOND).await.unwrap();

    tokio::time::advance(Duration::from_secs(3)).await;
    assert_eq!(pool.run_health_check().await.leaks, 0);

    tokio::time::advance(Duration::from_secs(3)).await;
    assert_eq!(pool.run_health_check().await.leaks, 1);
    assert_eq!(pool.stats().leak_warnings, 1);

    assert_eq!(pool.run_health_check().await.leaks, 1);
    assert_eq!(pool.stats().leak_warnings, 2);

    // Leaks are reported, never reclaimed.
    assert_eq!(pool.stats().active, 1);
    pool.release(handle).await;
    assert_eq!(pool.run_health_check().await.leaks, 0);
    assert_eq!(pool.stats().leak_warnings, 2);
}

#[tokio::test(start_paused = true)]
async fn test_idle_shrinks_back_to_min_size() {
    let mut config = testkit::config::pool(2, 6);
    config.idle_timeout_secs = 10;
    let (backend, pool) = build(MemoryBackend::new(), config);
    pool.warmup().await;

    let mut held = Vec::new();
    for i in 0..5 {
        held.push(pool.acquire(&format!("w{i}"), SECOND).await.unwrap());
    }
    for handle in held {
        pool.release(handle).await;
    }
    assert_eq!(pool.stats().total, 5);

    tokio::time::advance(Duration::from_secs(11)).await;
    let report = pool.run_health_check().await;
    assert_eq!(report.shrunk, 3);
    assert_eq!(report.created, 0);

    let stats = pool.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.idle, 2);
    assert_eq!(backend.closes(), 3);
    pool.close_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_sweep_recycles_expired_and_replaces() {
    let mut config = testkit::config::pool(2, 4);
    config.max_lifetime_secs = 20;
    let (backend, pool) = build(MemoryBackend::new(), config);
    pool.warmup().await;

    tokio::time::advance(Duration::from_secs(21)).await;
    let report = pool.run_health_check().await;
    assert_eq!(report.recycled, 2);
    assert_eq!(report.created, 2);

    let stats = pool.stats();
    assert_eq!(stats.recycled, 2);
    assert_eq!(stats.total, 2);
    assert_eq!(backend.connects(), 4);
    pool.close_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_replaces_dead_connections() {
    let mut config = testkit::config::pool(2, 4);
    config.keepalive_time_secs = 5;
    let (backend, pool) = build(MemoryBackend::new(), config);
    pool.warmup().await;

    tokio::time::advance(Duration::from_secs(6)).await;
    backend.invalidate_existing();
    let report = pool.run_health_check().await;
    assert_eq!(report.keepalive_checked, 2);
    assert_eq!(report.keepalive_failed, 2);
    assert_eq!(report.created, 2);
    assert_eq!(pool.stats().total, 2);

    // Survivors are refreshed and not re-checked until idle again.
    tokio::time::advance(Duration::from_secs(6)).await;
    let report = pool.run_health_check().await;
    assert_eq!(report.keepalive_checked, 2);
    assert_eq!(report.keepalive_failed, 0);
    let report = pool.run_health_check().await;
    assert_eq!(report.keepalive_checked, 0);
    pool.close_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_sweep_tops_up_to_min_size() {
    let (_backend, pool) = build(MemoryBackend::new(), testkit::config::pool(3, 4));
    let handle = pool.acquire("w", SECOND).await.unwrap();
    pool.discard(handle).await;
    assert_eq!(pool.stats().total, 0);

    let report = pool.run_health_check().await;
    assert_eq!(report.created, 3);
    assert_eq!(pool.stats().total, 3);
    assert_invariants(&pool);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_runs_on_interval() {
    let mut config = testkit::config::pool(1, 2);
    config.idle_check_interval_secs = 1;
    config.leak_detection_threshold_secs = 2;
    let (_backend, pool) = build(MemoryBackend::new(), config);
    pool.warmup().await;

    let handle = pool.acquire("w", SECOND).await.unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert!(pool.stats().leak_warnings >= 1);

    pool.release(handle).await;
    pool.close_all().await;
}

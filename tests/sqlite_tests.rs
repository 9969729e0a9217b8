//! SQLite backend driven through the pool and the orchestrator.
//!
//! These run on the real clock: Diesel calls execute on the blocking pool,
//! which paused time cannot see.

use std::sync::Arc;
use std::time::Duration;

use dbload::adapter::outbound::sqlite::SqliteBackend;
use dbload::app::{Orchestrator, Worker, WorkerConfig};
use dbload::domain::WorkloadMode;
use dbload::infrastructure::config::database::DatabaseConfig;
use dbload::infrastructure::limiter::RateLimiter;
use dbload::infrastructure::metrics::MetricsRegistry;
use dbload::infrastructure::pool::ConnectionPool;
use dbload::infrastructure::shutdown::ShutdownSignal;
use dbload::port::Backend;
use dbload::testkit;
use tempfile::TempDir;

fn database(dir: &TempDir) -> DatabaseConfig {
    DatabaseConfig {
        path: dir.path().join("load.db").to_string_lossy().into_owned(),
        busy_timeout_ms: 5000,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pooled_writers_share_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(SqliteBackend::new(&database(&dir)));
    let pool = ConnectionPool::new(Arc::clone(&backend), testkit::config::pool(2, 4)).unwrap();
    assert_eq!(pool.warmup().await, 2);

    let mut setup = pool.acquire("setup", Duration::from_secs(5)).await.unwrap();
    backend.setup_schema(setup.conn_mut()).await.unwrap();
    backend.commit(setup.conn_mut()).await.unwrap();
    pool.release(setup).await;

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..4 {
        let pool = Arc::clone(&pool);
        let backend = Arc::clone(&backend);
        tasks.spawn(async move {
            let owner = format!("writer-{i}");
            for _ in 0..25 {
                let mut handle = pool.acquire(&owner, Duration::from_secs(5)).await.unwrap();
                backend.insert(handle.conn_mut(), &owner, "x").await.unwrap();
                backend.commit(handle.conn_mut()).await.unwrap();
                pool.release(handle).await;
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    let mut check = pool.acquire("check", Duration::from_secs(5)).await.unwrap();
    assert_eq!(backend.max_id(check.conn_mut()).await.unwrap(), 100);
    backend.commit(check.conn_mut()).await.unwrap();
    pool.release(check).await;

    let stats = pool.stats();
    assert!(stats.total <= 4);
    assert_eq!(stats.active, 0);
    pool.close_all().await;
    assert!(pool.is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn insert_only_run_persists_every_committed_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = testkit::config::run(3, 1, WorkloadMode::InsertOnly);
    config.database = database(&dir);
    let backend = Arc::new(SqliteBackend::new(&config.database));

    let report = Orchestrator::new(config, Arc::clone(&backend))
        .run()
        .await
        .unwrap();

    assert_eq!(report.backend, "sqlite");
    assert!(report.stats.inserts > 0);

    let mut conn = backend.connect().await.unwrap();
    let max_id = backend.max_id(&mut conn).await.unwrap();
    backend.close(conn).await.unwrap();
    assert_eq!(max_id as u64, report.stats.inserts);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn full_cycle_run_leaves_table_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = testkit::config::run(2, 1, WorkloadMode::Full);
    config.database = database(&dir);
    let backend = Arc::new(SqliteBackend::new(&config.database));

    let report = Orchestrator::new(config, Arc::clone(&backend))
        .run()
        .await
        .unwrap();

    let stats = &report.stats;
    assert!(stats.total_transactions > 0);
    assert_eq!(stats.verification_failures, 0);
    assert_eq!(stats.inserts, stats.deletes);

    let mut conn = backend.connect().await.unwrap();
    let max_id = backend.max_id(&mut conn).await.unwrap();
    backend.close(conn).await.unwrap();
    assert_eq!(max_id, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn idle_reader_does_not_block_outside_writers() {
    let dir = tempfile::tempdir().unwrap();
    let mut database = database(&dir);
    database.busy_timeout_ms = 200;
    let backend = Arc::new(SqliteBackend::new(&database));
    let pool = ConnectionPool::new(Arc::clone(&backend), testkit::config::pool(1, 2)).unwrap();

    let mut setup = pool.acquire("setup", Duration::from_secs(5)).await.unwrap();
    backend.setup_schema(setup.conn_mut()).await.unwrap();
    backend.commit(setup.conn_mut()).await.unwrap();
    pool.release(setup).await;

    let end = tokio::time::Instant::now() + Duration::from_secs(3);
    let worker = Worker::new(
        WorkerConfig::new(1, WorkloadMode::SelectOnly, end),
        Arc::clone(&pool),
        Arc::new(MetricsRegistry::new()),
        Arc::new(RateLimiter::new(0.0)),
        ShutdownSignal::new(),
    );
    let task = tokio::spawn(worker.run());

    // The reader is pausing on the empty table by now.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let mut writer = backend.connect().await.unwrap();
    backend.insert(&mut writer, "outside", "x").await.unwrap();
    backend.commit(&mut writer).await.unwrap();
    backend.close(writer).await.unwrap();

    let summary = task.await.unwrap();
    assert_eq!(summary.errors, 0);
    assert!(summary.transactions > 0, "reader never saw the new row");

    // The idle pooled connection holds no lock after the run.
    let mut writer = backend.connect().await.unwrap();
    backend.insert(&mut writer, "outside", "y").await.unwrap();
    backend.commit(&mut writer).await.unwrap();
    backend.close(writer).await.unwrap();
    pool.close_all().await;
}

#[tokio::test]
async fn unreachable_database_fails_preparation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = testkit::config::run(1, 1, WorkloadMode::Full);
    config.database.path = dir
        .path()
        .join("missing")
        .join("load.db")
        .to_string_lossy()
        .into_owned();
    let backend = Arc::new(SqliteBackend::new(&config.database));

    let result = Orchestrator::new(config, backend).run().await;
    assert!(result.is_err());
}

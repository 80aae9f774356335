use super::*;

use crate::testkit;
use crate::testkit::db::ScriptedConnector;

// -- Helpers --------------------------------------------------------------

async fn open(connector: &ScriptedConnector, size: usize) -> ConnectionPool {
    ConnectionPool::open(
        PathName::from("test"),
        Arc::new(connector.clone()),
        testkit::config::pool_settings(size),
    )
    .await
    .unwrap()
}

fn lost() -> SessionError {
    SessionError::ConnectionLost("reset by peer".into())
}

// -- Config validation ----------------------------------------------------

#[tokio::test]
async fn test_open_rejects_zero_size() {
    let result = ConnectionPool::open(
        PathName::from("test"),
        Arc::new(ScriptedConnector::new()),
        testkit::config::pool_settings(0),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_open_rejects_zero_acquire_timeout() {
    let mut settings = testkit::config::pool_settings(2);
    settings.acquire_timeout = Duration::ZERO;
    let result = ConnectionPool::open(
        PathName::from("test"),
        Arc::new(ScriptedConnector::new()),
        settings,
    )
    .await;
    assert!(result.is_err());
}

// -- Acquire / release ----------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_open_fills_pool() {
    let connector = ScriptedConnector::new();
    let pool = open(&connector, 5).await;
    assert_eq!(connector.connect_count(), 5);
    assert_eq!(pool.stats().idle, 5);
    assert_eq!(pool.stats().size, 5);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_borrowers_get_distinct_connections() {
    let pool = open(&ScriptedConnector::new(), 2).await;

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(pool.stats().idle, 0);

    pool.release(a, true);
    pool.release(b, true);
    assert_eq!(pool.stats().idle, 2);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_times_out_as_exhausted() {
    let pool = open(&ScriptedConnector::new(), 1).await;
    let held = pool.acquire().await.unwrap();

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, PoolError::Exhausted { waited, .. } if waited == Duration::from_millis(200)));
    assert_eq!(pool.stats().exhausted, 1);

    pool.release(held, true);
    assert!(pool.acquire().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_healthy_release_reuses_connection() {
    let connector = ScriptedConnector::new();
    let pool = open(&connector, 1).await;

    let conn = pool.acquire().await.unwrap();
    let id = conn.id();
    pool.release(conn, true);

    let again = pool.acquire().await.unwrap();
    assert_eq!(again.id(), id);
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_waiting_acquirer_wakes_on_release() {
    let pool = Arc::new(open(&ScriptedConnector::new(), 1).await);
    let held = pool.acquire().await.unwrap();
    let held_id = held.id();

    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire().await.map(|c| c.id()) })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    pool.release(held, true);

    assert_eq!(waiter.await.unwrap().unwrap(), held_id);
}

// -- Replacement ----------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_unhealthy_release_is_replaced() {
    let connector = ScriptedConnector::new();
    let pool = open(&connector, 2).await;

    let conn = pool.acquire().await.unwrap();
    let discarded_id = conn.id();
    pool.release(conn, false);
    assert_eq!(pool.stats().idle, 1);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let stats = pool.stats();
    assert_eq!(stats.idle, 2);
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.replacements, 1);
    assert_eq!(connector.connect_count(), 3);

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert!(a.id() != discarded_id && b.id() != discarded_id);
}

#[tokio::test(start_paused = true)]
async fn test_closed_session_is_discarded_even_if_reported_healthy() {
    let connector = ScriptedConnector::new().with_op_results(vec![Err(lost())]);
    let pool = open(&connector, 1).await;

    let mut conn = pool.acquire().await.unwrap();
    assert!(conn.ping().await.is_err());
    assert!(conn.is_closed());
    pool.release(conn, true);

    assert_eq!(pool.stats().discarded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_replacement_retries_until_connect_succeeds() {
    let connector = ScriptedConnector::new().with_connect_results(vec![
        Ok(()),
        Err(lost()),
        Err(lost()),
        Ok(()),
    ]);
    let pool = open(&connector, 1).await;

    let conn = pool.acquire().await.unwrap();
    pool.release(conn, false);
    assert_eq!(pool.stats().idle, 0);

    tokio::time::sleep(Duration::from_secs(1)).await;

    let stats = pool.stats();
    assert_eq!(stats.replacement_failures, 2);
    assert_eq!(stats.replacements, 1);
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.pending_replacements, 0);
}

#[tokio::test(start_paused = true)]
async fn test_initial_fill_is_best_effort() {
    let connector = ScriptedConnector::new().with_connect_results(vec![Err(lost())]);
    let pool = open(&connector, 2).await;
    assert_eq!(pool.stats().idle, 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pool.stats().idle, 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_connection_counts_as_unhealthy() {
    let connector = ScriptedConnector::new();
    let pool = open(&connector, 1).await;

    let conn = pool.acquire().await.unwrap();
    drop(conn);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pool.stats().discarded, 1);
    assert_eq!(pool.stats().idle, 1);
    assert_eq!(connector.connect_count(), 2);
}

// -- Shutdown -------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_pool() {
    let pool = open(&ScriptedConnector::new(), 2).await;
    pool.shutdown();

    assert!(matches!(pool.acquire().await, Err(PoolError::Closed { .. })));
    assert_eq!(pool.stats().idle, 0);

    // Idempotent.
    pool.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_replacement_loop() {
    let connector = ScriptedConnector::new()
        .with_connect_results(vec![Ok(()), Err(lost()), Err(lost()), Err(lost())]);
    let pool = open(&connector, 1).await;

    let conn = pool.acquire().await.unwrap();
    pool.release(conn, false);
    tokio::time::sleep(Duration::from_millis(5)).await;
    pool.shutdown();

    let connects = connector.connect_count();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(connector.connect_count(), connects);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sessions_returned_during_shutdown_are_dropped() {
    for _ in 0..20 {
        let connector = ScriptedConnector::new();
        let pool = open(&connector, 1).await;
        let sessions = join_all((0..200).map(|_| connector.connect())).await;

        let inner = Arc::clone(&pool.inner);
        let returning = tokio::task::spawn_blocking(move || {
            for (offset, session) in sessions.into_iter().enumerate() {
                inner.push_idle(PooledSession {
                    id: 1_000 + offset as u64,
                    session: session.unwrap(),
                });
            }
        });
        tokio::task::yield_now().await;
        pool.shutdown();
        returning.await.unwrap();

        assert_eq!(pool.stats().idle, 0);
    }
}

// Exercise the Redis backend against a live server.
// Run with: REDIS_URL=redis://127.0.0.1:6379 cargo test -p lockstep-lock -- --ignored

use std::time::Duration;

use lockstep_core::config::{LockConfig, RedisOptions};
use lockstep_lock::redis_store::{connection_url, lock_key};
use lockstep_lock::{DistributedLock, RedisLock};
use redis::aio::ConnectionManager;
use tokio_util::sync::CancellationToken;

fn redis_opts() -> RedisOptions {
    let addr = std::env::var("REDIS_URL")
        .ok()
        .and_then(|url| url.strip_prefix("redis://").map(|s| s.trim_end_matches('/').to_string()))
        .unwrap_or_else(|| "127.0.0.1:6379".to_string());
    RedisOptions {
        addr,
        password: None,
        db: 0,
    }
}

async fn connect() -> RedisLock {
    RedisLock::connect(&redis_opts(), &LockConfig::default())
        .await
        .expect("redis must be reachable for ignored tests")
}

fn unique(name: &str) -> String {
    format!("{name}-{}", uuid::Uuid::new_v4())
}

#[tokio::test]
#[ignore = "requires a running redis"]
async fn two_connections_contend_for_one_name() {
    let a = connect().await;
    let b = connect().await;
    let cancel = CancellationToken::new();
    let name = unique("contend");

    let handle = a.acquire(&name, Duration::from_secs(5), &cancel).await.unwrap();
    let err = b.acquire(&name, Duration::from_secs(5), &cancel).await.unwrap_err();
    assert!(err.is_contention());

    a.release(handle, &cancel).await.unwrap();
    let again = b.acquire(&name, Duration::from_secs(5), &cancel).await.unwrap();
    b.release(again, &cancel).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running redis"]
async fn lock_expires_on_its_own() {
    let lock = connect().await;
    let cancel = CancellationToken::new();
    let name = unique("expire");

    let stale = lock.acquire(&name, Duration::from_millis(200), &cancel).await.unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;

    let fresh = lock.acquire(&name, Duration::from_secs(5), &cancel).await.unwrap();
    let err = lock.release(stale, &cancel).await.unwrap_err();
    assert_eq!(err.code(), "RELEASE_ERROR");
    lock.release(fresh, &cancel).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running redis"]
async fn injected_connection_is_shared_between_locks() {
    let client = redis::Client::open(connection_url(&redis_opts()).as_str()).unwrap();
    let mut conn = ConnectionManager::new(client).await.unwrap();
    let a = RedisLock::with_connection(conn.clone(), &LockConfig::default());
    let b = RedisLock::with_connection(conn.clone(), &LockConfig::default());
    let cancel = CancellationToken::new();
    let name = unique("injected");

    let handle = a.acquire(&name, Duration::from_secs(5), &cancel).await.unwrap();
    let stored: Option<String> = redis::cmd("GET")
        .arg(lock_key(&name))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(stored.as_deref(), Some(handle.token()));

    let err = b.acquire(&name, Duration::from_secs(5), &cancel).await.unwrap_err();
    assert!(err.is_contention());

    a.release(handle, &cancel).await.unwrap();
    let stored: Option<String> = redis::cmd("GET")
        .arg(lock_key(&name))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn unreachable_store_is_a_backing_store_error() {
    let opts = RedisOptions {
        // nothing listens on port 1
        addr: "127.0.0.1:1".to_string(),
        password: None,
        db: 0,
    };
    let err = match RedisLock::connect(&opts, &LockConfig::default()).await {
        Ok(_) => panic!("connect to a closed port should fail"),
        Err(e) => e,
    };
    assert_eq!(err.code(), "BACKING_STORE_ERROR");
}

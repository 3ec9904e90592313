//! Background maintenance: idle eviction, health checks, hot reload and resize

use lifecycle_pool::{ObjectPool, PoolConfiguration};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug)]
struct Connection {
    id: usize,
}

#[tokio::main]
async fn main() {
    println!("=== lifecycle_pool - Maintenance ===\n");

    let next_id = Arc::new(AtomicUsize::new(1));
    let backend_up = Arc::new(AtomicBool::new(true));

    let health = Arc::clone(&backend_up);
    let config = PoolConfiguration::new(move || {
        Ok(Connection {
            id: next_id.fetch_add(1, Ordering::Relaxed),
        })
    })
    .with_initial_size(4)
    .with_max_size(8)
    .with_min_size(2)
    .with_max_idle_time(Duration::from_millis(200))
    .with_health_check(Duration::from_millis(100), move |_conn: &Connection| {
        if health.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err("backend unreachable".into())
        }
    });

    let pool = ObjectPool::new(config.clone()).unwrap();

    // 1. Resize
    pool.resize(6).unwrap();
    println!("1. Resized up: {} connections", pool.len());
    pool.resize(4).unwrap();
    println!("   Resized down: {} connections\n", pool.len());

    // 2. Idle eviction keeps min_size
    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("2. After idling: {} connections (min 2)\n", pool.len());

    // 3. Health check
    let held = pool.acquire().unwrap();
    backend_up.store(false, Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(250)).await;
    println!(
        "3. Backend down: {} connections left, holding #{}",
        pool.len(),
        held.id
    );
    backend_up.store(true, Ordering::Relaxed);
    drop(held);
    println!();

    // 4. Hot reload
    pool.update_config(config.with_max_size(2).with_initial_size(2).without_health_check())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let stats = pool.stats();
    println!("4. Reloaded: max_size {}, size {}", stats.max_size, stats.current_size);

    pool.close(Duration::from_secs(1)).await.unwrap();
}

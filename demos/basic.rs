//! Basic usage examples for ObjectPool

use lifecycle_pool::{CancellationToken, ObjectPool, PoolConfiguration, PoolError};
use std::time::Duration;

#[tokio::main]
async fn main() {
    println!("=== lifecycle_pool - Basic Examples ===\n");

    // Example 1: Simple pool of buffers
    simple_pool();

    // Example 2: Backpressure
    backpressure();

    // Example 3: Validation and cancellation
    validation_and_cancellation();

    // Example 4: Metrics and health
    metrics_and_health();

    // Example 5: Closing
    closing().await;
}

fn buffers(max_size: usize) -> PoolConfiguration<Vec<u8>> {
    PoolConfiguration::new(|| Ok(Vec::with_capacity(4096)))
        .with_max_size(max_size)
        .with_reset(|buf| {
            buf.clear();
            Ok(())
        })
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = ObjectPool::new(buffers(4).with_initial_size(2)).unwrap();

    {
        let mut buf = pool.acquire().unwrap();
        buf.extend_from_slice(b"hello");
        println!("   Got buffer with {} bytes", buf.len());
        // Buffer automatically returned when dropped
    }

    println!("   Available after return: {}\n", pool.available_count());
}

fn backpressure() {
    println!("2. Backpressure:");
    let pool = ObjectPool::new(buffers(2)).unwrap();

    let first = pool.acquire().unwrap();
    let second = pool.acquire().unwrap();
    match pool.acquire() {
        Err(PoolError::Exhausted) => println!("   Third acquire: exhausted (no waiting)"),
        other => println!("   Third acquire: {:?}", other.map(|b| b.len())),
    }

    pool.release(first);
    let third = pool.acquire().unwrap();
    println!("   After a release: reused buffer, use count {}\n", third.use_count());
    drop((second, third));
}

fn validation_and_cancellation() {
    println!("3. Validation and Cancellation:");
    let pool = ObjectPool::new(buffers(4).with_initial_size(1).with_validation(|buf| {
        if buf.capacity() >= 4096 {
            Ok(())
        } else {
            Err("buffer shrank".into())
        }
    }))
    .unwrap();

    {
        let mut buf = pool.acquire().unwrap();
        buf.shrink_to(0);
    }
    let buf = pool.acquire().unwrap();
    println!(
        "   Shrunk buffer replaced, destroyed so far: {}",
        pool.stats().total_destroyed
    );
    drop(buf);

    let token = CancellationToken::new();
    token.cancel();
    println!(
        "   Acquire with cancelled token: {:?}\n",
        pool.acquire_with(&token).err()
    );
}

fn metrics_and_health() {
    println!("4. Metrics and Health:");
    let pool = ObjectPool::new(buffers(5).with_initial_size(5)).unwrap();

    let held: Vec<_> = (0..5).map(|_| pool.acquire().unwrap()).collect();
    let health = pool.health_status();
    println!("   Healthy: {}", health.is_healthy());
    for warning in &health.warnings {
        println!("   Warning: {warning}");
    }
    drop(held);

    let mut metrics: Vec<_> = pool.export_metrics().into_iter().collect();
    metrics.sort();
    for (key, value) in metrics {
        println!("   {key}: {value}");
    }
    println!();
}

async fn closing() {
    println!("5. Closing:");
    let pool = ObjectPool::new(buffers(3).with_initial_size(3)).unwrap();
    let held = pool.acquire().unwrap();

    pool.close(Duration::from_secs(1)).await.unwrap();
    println!("   Closed, destroyed idle: {}", pool.stats().total_destroyed);

    pool.release(held);
    println!("   Late release destroyed too: {}", pool.stats().total_destroyed);
    println!("   Acquire after close: {:?}", pool.acquire().err());
}

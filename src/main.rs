// lifecycle_pool demo binary
// The library lives in lib.rs; more walkthroughs under demos/
// Run with: RUST_LOG=lifecycle_pool=debug cargo run

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use lifecycle_pool::{ObjectPool, PoolConfiguration, PoolError};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Connection {
    id: usize,
    queries: usize,
}

#[tokio::main]
async fn main() -> Result<(), PoolError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let next_id = Arc::new(AtomicUsize::new(1));
    let config = PoolConfiguration::new(move || {
        Ok(Connection {
            id: next_id.fetch_add(1, Ordering::Relaxed),
            queries: 0,
        })
    })
    .with_initial_size(2)
    .with_max_size(3)
    .with_max_idle_time(Duration::from_secs(30))
    .with_reset(|conn: &mut Connection| {
        conn.queries = 0;
        Ok(())
    });

    let pool = ObjectPool::new(config)?;
    info!(stats = ?pool.stats(), "pool ready");

    let mut held = Vec::new();
    loop {
        match pool.acquire() {
            Ok(mut conn) => {
                conn.queries += 1;
                info!(id = conn.id, "checked out connection");
                held.push(conn);
            }
            Err(PoolError::Exhausted) => {
                info!(in_use = held.len(), "pool exhausted, backing off");
                break;
            }
            Err(err) => return Err(err),
        }
    }

    held.clear();
    info!(stats = ?pool.stats(), "connections returned");

    pool.close(Duration::from_secs(5)).await?;
    info!(stats = ?pool.stats(), "pool closed");
    Ok(())
}

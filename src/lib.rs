//! # lifecycle_pool
//!
//! Bounded, thread-safe object pool that recycles expensive resources
//! (connections, buffers, heavy structs) and keeps them healthy in the
//! background.
//!
//! ## Features
//!
//! - Lock-free store of idle objects with a hard upper bound on pool size
//! - Fail-fast backpressure: acquisition grows the pool or returns
//!   [`PoolError::Exhausted`], it never waits for another caller
//! - Automatic return of objects via RAII (Drop trait)
//! - Lifecycle callbacks: factory, reset, validate and health check
//! - Background idle eviction and health checking
//! - Hot configuration reload and dynamic resize
//! - Atomic metrics, health status and Prometheus export
//! - Registry of pools keyed by type or category
//!
//! ## Quick Start
//!
//! ```rust
//! use lifecycle_pool::{ObjectPool, PoolConfiguration};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = PoolConfiguration::new(|| Ok(Vec::<u8>::with_capacity(1024)))
//!     .with_initial_size(2)
//!     .with_max_size(8);
//! let pool = ObjectPool::new(config).unwrap();
//! {
//!     let mut buffer = pool.acquire().unwrap();
//!     buffer.extend_from_slice(b"payload");
//!     // Object automatically returned when `buffer` goes out of scope
//! }
//! assert_eq!(pool.stats().available, 2);
//! # }
//! ```

mod config;
mod errors;
mod health;
mod instance;
mod maintenance;
mod metrics;
mod pool;
mod registry;

pub use config::{CheckFn, Factory, PoolConfiguration, ResetFn};
pub use errors::{CallbackError, PoolError, PoolResult};
pub use health::HealthStatus;
#[cfg(feature = "prometheus")]
pub use metrics::MetricsExporter;
pub use metrics::PoolStats;
pub use pool::{ObjectPool, PooledObject};
pub use registry::PoolRegistry;
pub use tokio_util::sync::CancellationToken;

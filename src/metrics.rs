//! Metrics collection and export for object pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time snapshot of pool metrics
///
/// Values are copied out of independent counters, so a snapshot taken during a
/// concurrent transition may briefly show `current_size != available + in_use`.
///
/// # Examples
///
/// ```
/// use lifecycle_pool::{ObjectPool, PoolConfiguration};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = ObjectPool::new(PoolConfiguration::new(|| Ok(1u8)).with_initial_size(3)).unwrap();
///
/// {
///     let _obj = pool.acquire().unwrap();
///     let stats = pool.stats();
///     assert_eq!(stats.current_size, 3);
///     assert_eq!(stats.in_use, 1);
///     assert_eq!(stats.available, 2);
/// }
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolStats {
    /// Objects in existence (available + checked out)
    pub current_size: usize,

    /// Objects waiting in the store
    pub available: usize,

    /// Objects currently checked out
    pub in_use: usize,

    /// Objects ever created
    pub total_created: usize,

    /// Objects ever destroyed
    pub total_destroyed: usize,

    /// Reset callbacks run on idle objects at checkout
    pub total_resets: usize,

    /// Highest use count seen on any single object
    pub max_usage_observed: usize,

    /// Configured maximum size at the time of the snapshot
    pub max_size: usize,
}

impl PoolStats {
    /// Pool utilization ratio (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.max_size > 0 {
            self.in_use as f64 / self.max_size as f64
        } else {
            0.0
        }
    }

    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("current_size".to_string(), self.current_size.to_string());
        metrics.insert("available".to_string(), self.available.to_string());
        metrics.insert("in_use".to_string(), self.in_use.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("total_resets".to_string(), self.total_resets.to_string());
        metrics.insert(
            "max_usage_observed".to_string(),
            self.max_usage_observed.to_string(),
        );
        metrics.insert("max_size".to_string(), self.max_size.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization()));
        metrics
    }

    /// Sum two snapshots, used for registry-wide totals
    pub fn merge(&self, other: &PoolStats) -> PoolStats {
        PoolStats {
            current_size: self.current_size + other.current_size,
            available: self.available + other.available,
            in_use: self.in_use + other.in_use,
            total_created: self.total_created + other.total_created,
            total_destroyed: self.total_destroyed + other.total_destroyed,
            total_resets: self.total_resets + other.total_resets,
            max_usage_observed: self.max_usage_observed.max(other.max_usage_observed),
            max_size: self.max_size + other.max_size,
        }
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "prometheus")]
pub struct MetricsExporter;

#[cfg(feature = "prometheus")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use lifecycle_pool::{MetricsExporter, PoolStats};
    /// use std::collections::HashMap;
    ///
    /// let stats = PoolStats { current_size: 3, available: 2, in_use: 1, ..Default::default() };
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&stats, "my_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("objectpool_objects_in_use"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        stats: &PoolStats,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> prometheus::Result<String> {
        use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            labels.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let registry = Registry::new_custom(None, Some(labels))?;

        let gauges = [
            ("objectpool_objects_current", "Objects in existence", stats.current_size),
            ("objectpool_objects_available", "Objects waiting in the store", stats.available),
            ("objectpool_objects_in_use", "Objects currently checked out", stats.in_use),
            ("objectpool_objects_max", "Configured maximum pool size", stats.max_size),
            (
                "objectpool_usage_max_observed",
                "Highest use count of a single object",
                stats.max_usage_observed,
            ),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(Opts::new(name, help))?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge))?;
        }

        let counters = [
            ("objectpool_objects_created_total", "Objects created", stats.total_created),
            ("objectpool_objects_destroyed_total", "Objects destroyed", stats.total_destroyed),
            ("objectpool_resets_total", "Idle objects reset on checkout", stats.total_resets),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(Opts::new(name, help))?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Internal metrics block
///
/// Every counter is updated on its own; nothing wraps several updates in a
/// transaction.
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub current_size: AtomicUsize,
    pub available: AtomicUsize,
    pub in_use: AtomicUsize,
    pub total_created: AtomicUsize,
    pub total_destroyed: AtomicUsize,
    pub total_resets: AtomicUsize,
    pub max_usage_observed: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a slot for a new object if the pool is below `max_size`
    pub fn try_reserve(&self, max_size: usize) -> bool {
        self.current_size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |size| {
                (size < max_size).then_some(size + 1)
            })
            .is_ok()
    }

    /// Give back a slot claimed by `try_reserve` whose object never came to be
    pub fn cancel_reservation(&self) {
        self.current_size.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn record_created(&self) {
        self.total_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_destroyed(&self) {
        self.current_size.fetch_sub(1, Ordering::AcqRel);
        self.total_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an object as destroyed only if the pool stays at or above `min_size`
    pub fn try_retire(&self, min_size: usize) -> bool {
        let retired = self
            .current_size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |size| {
                (size > min_size).then(|| size - 1)
            })
            .is_ok();
        if retired {
            self.total_destroyed.fetch_add(1, Ordering::Relaxed);
        }
        retired
    }

    pub fn record_reset(&self) {
        self.total_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_usage(&self, use_count: usize) {
        self.max_usage_observed.fetch_max(use_count, Ordering::Relaxed);
    }

    pub fn snapshot(&self, max_size: usize) -> PoolStats {
        PoolStats {
            current_size: self.current_size.load(Ordering::Acquire),
            available: self.available.load(Ordering::Relaxed),
            in_use: self.in_use.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            total_resets: self.total_resets.load(Ordering::Relaxed),
            max_usage_observed: self.max_usage_observed.load(Ordering::Relaxed),
            max_size,
        }
    }
}

//! Health monitoring for object pools

use crate::metrics::PoolStats;

/// Utilization above which a pool is reported unhealthy
const HIGH_UTILIZATION: f64 = 0.9;

/// Health status of an object pool
///
/// # Examples
///
/// ```
/// use lifecycle_pool::{ObjectPool, PoolConfiguration};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = ObjectPool::new(PoolConfiguration::new(|| Ok(0u8)).with_initial_size(3)).unwrap();
///
/// let health = pool.health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.available_objects, 3);
/// # }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Current pool utilization (0.0 to 1.0)
    pub utilization: f64,

    /// Available objects count
    pub available_objects: usize,

    /// Checked-out objects count
    pub active_objects: usize,

    /// Configured maximum size
    pub total_capacity: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Derive a health status from a metrics snapshot
    pub fn new(stats: &PoolStats, closed: bool) -> Self {
        let utilization = stats.utilization();
        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if closed {
            warnings.push("Pool is closed".to_string());
            is_healthy = false;
        }

        if utilization > HIGH_UTILIZATION {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        // Not fatal: the pool can still grow on demand.
        if stats.available == 0 && stats.current_size >= stats.max_size && stats.max_size > 0 {
            warnings.push("Pool is at capacity with no idle objects".to_string());
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            available_objects: stats.available,
            active_objects: stats.in_use,
            total_capacity: stats.max_size,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(in_use: usize, available: usize, max_size: usize) -> PoolStats {
        PoolStats {
            current_size: in_use + available,
            available,
            in_use,
            max_size,
            ..Default::default()
        }
    }

    #[test]
    fn test_idle_pool_is_healthy() {
        let health = HealthStatus::new(&stats(0, 3, 10), false);

        assert!(health.is_healthy());
        assert_eq!(health.warning_count, 0);
    }

    #[test]
    fn test_saturated_pool_is_unhealthy() {
        let health = HealthStatus::new(&stats(10, 0, 10), false);

        assert!(!health.is_healthy());
        assert_eq!(health.warning_count, 2);
        assert!(health.warnings[0].starts_with("High utilization"));
    }

    #[test]
    fn test_closed_pool_is_unhealthy() {
        let health = HealthStatus::new(&stats(0, 0, 10), true);

        assert!(!health.is_healthy());
        assert_eq!(health.warnings, vec!["Pool is closed".to_string()]);
    }
}
